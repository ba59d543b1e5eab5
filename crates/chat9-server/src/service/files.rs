//! Local file layout and public links to source documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chat9_engine::Metadata;

use super::ServiceConfig;

/// Subdirectory of the output directory holding LlamaCloud downloads.
pub const LLAMACLOUD_DIR: &str = "llamacloud";

/// Subdirectory of the output directory holding private uploads.
pub const UPLOADED_DIR: &str = "uploaded";

/// Directories served to clients and the prefix used to link to them.
#[derive(Debug, Clone)]
pub struct FileServer {
    inner: Arc<FileServerInner>,
}

#[derive(Debug)]
struct FileServerInner {
    data_dir: PathBuf,
    output_dir: PathBuf,
    url_prefix: Option<String>,
}

impl FileServer {
    /// Creates a file server over the given directories.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        url_prefix: Option<String>,
    ) -> Self {
        let url_prefix = url_prefix
            .map(|prefix| prefix.trim_end_matches('/').to_owned())
            .filter(|prefix| !prefix.is_empty());

        Self {
            inner: Arc::new(FileServerInner {
                data_dir: data_dir.into(),
                output_dir: output_dir.into(),
                url_prefix,
            }),
        }
    }

    /// Creates a file server from the service configuration.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            &config.data_dir,
            &config.output_dir,
            config.fileserver_url_prefix.clone(),
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.inner.output_dir
    }

    /// Directory LlamaCloud files are downloaded into.
    pub fn llamacloud_dir(&self) -> PathBuf {
        self.inner.output_dir.join(LLAMACLOUD_DIR)
    }

    /// Public URL prefix without a trailing slash.
    pub fn url_prefix(&self) -> Option<&str> {
        self.inner.url_prefix.as_deref()
    }

    /// Builds the public link for a source node from its metadata.
    ///
    /// Nodes from a LlamaCloud pipeline link to their downloaded copy,
    /// private uploads link into the output directory and everything else
    /// links into the data directory. Without a configured prefix or a
    /// `file_name`, the node's own `URL` entry is used.
    pub fn node_url(&self, metadata: &Metadata) -> Option<String> {
        let file_name = metadata_str(metadata, "file_name");

        if let (Some(prefix), Some(file_name)) = (self.url_prefix(), file_name) {
            if let Some(pipeline_id) = metadata_str(metadata, "pipeline_id") {
                return Some(format!(
                    "{prefix}/output/{LLAMACLOUD_DIR}/{pipeline_id}${file_name}"
                ));
            }

            if metadata_str(metadata, "private") == Some("true") {
                return Some(format!("{prefix}/output/{UPLOADED_DIR}/{file_name}"));
            }

            return Some(format!("{prefix}/data/{file_name}"));
        }

        metadata_str(metadata, "URL").map(str::to_owned)
    }
}

fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|value| value.as_str())
}
