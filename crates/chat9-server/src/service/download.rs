//! Downloads of LlamaCloud pipeline files cited by chat answers.
//!
//! Nodes retrieved from a LlamaCloud pipeline carry `pipeline_id` and
//! `file_name` metadata. [`FileDownloadService`] resolves such a pair to a
//! signed content URL through the LlamaCloud REST API and stores the file
//! as `<output_dir>/llamacloud/<pipeline_id>$<file_name>`.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chat9_engine::NodeWithScore;
use serde::Deserialize;
use url::Url;

use super::{FileServer, ServiceConfig};
use crate::{Error, Result};

/// Tracing target for file downloads.
const TRACING_TARGET: &str = "chat9_server::service::download";

/// Name used for LlamaCloud in error messages.
const LLAMA_CLOUD: &str = "llamacloud";

/// A pipeline file referenced by a source node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DownloadTarget {
    pub pipeline_id: String,
    pub file_name: String,
}

impl DownloadTarget {
    /// Reads the target from node metadata, if the node came from a pipeline.
    pub fn from_node(node: &NodeWithScore) -> Option<Self> {
        let pipeline_id = node.metadata_str("pipeline_id")?;
        let file_name = node.metadata_str("file_name")?;

        Some(Self {
            pipeline_id: pipeline_id.to_owned(),
            file_name: file_name.to_owned(),
        })
    }

    /// Collects the distinct targets referenced by the nodes.
    pub fn from_nodes(nodes: &[NodeWithScore]) -> Vec<Self> {
        nodes
            .iter()
            .filter_map(Self::from_node)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// File name of the local copy.
    pub fn local_name(&self) -> String {
        format!("{}${}", self.pipeline_id, self.file_name)
    }

    fn is_safe(&self) -> bool {
        let is_plain = |part: &str| {
            !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
        };
        is_plain(&self.pipeline_id) && is_plain(&self.file_name)
    }
}

/// Outcome of a single download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was fetched and written to the path.
    Downloaded(PathBuf),
    /// A local copy already existed.
    AlreadyPresent(PathBuf),
}

#[derive(Debug, Deserialize)]
struct PipelineFile {
    #[serde(default)]
    name: Option<String>,
    file_id: String,
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    url: String,
}

/// LlamaCloud file downloader.
#[derive(Debug, Clone)]
pub struct FileDownloadService {
    inner: Arc<FileDownloadInner>,
}

#[derive(Debug)]
struct FileDownloadInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    download_dir: PathBuf,
}

impl FileDownloadService {
    /// Creates a downloader storing files in `download_dir`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        download_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::config(format!("invalid LlamaCloud base URL '{base_url}'")).with_source(e)
        })?;

        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "LlamaCloud base URL '{base_url}' cannot have a path"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config("failed to build HTTP client").with_source(e))?;

        Ok(Self {
            inner: Arc::new(FileDownloadInner {
                client,
                base_url,
                api_key: api_key.into(),
                download_dir: download_dir.into(),
            }),
        })
    }

    /// Creates the downloader when an API key is configured.
    pub fn from_config(config: &ServiceConfig, files: &FileServer) -> Result<Option<Self>> {
        if !config.downloads_enabled() {
            return Ok(None);
        }

        let api_key = config.llama_cloud_api_key.clone().unwrap_or_default();
        let service = Self::new(
            &config.llama_cloud_base_url,
            api_key,
            files.llamacloud_dir(),
            Duration::from_secs(config.download_timeout),
        )?;

        Ok(Some(service))
    }

    /// Directory the files are stored in.
    pub fn download_dir(&self) -> &Path {
        &self.inner.download_dir
    }

    /// Local path of the target's copy.
    pub fn local_path(&self, target: &DownloadTarget) -> PathBuf {
        self.inner.download_dir.join(target.local_name())
    }

    /// Downloads the target unless a local copy exists.
    pub async fn download(&self, target: &DownloadTarget) -> Result<DownloadOutcome> {
        if !target.is_safe() {
            return Err(Error::internal(format!(
                "refusing to download '{}' from pipeline '{}'",
                target.file_name, target.pipeline_id
            )));
        }

        let path = self.local_path(target);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(
                target: TRACING_TARGET,
                path = %path.display(),
                "File already downloaded"
            );
            return Ok(DownloadOutcome::AlreadyPresent(path));
        }

        let content_url = self.content_url(target).await?;
        let bytes = self
            .inner
            .client
            .get(&content_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::external(LLAMA_CLOUD, "file content request failed").with_source(e))?
            .bytes()
            .await
            .map_err(|e| Error::external(LLAMA_CLOUD, "file content read failed").with_source(e))?;

        tokio::fs::create_dir_all(&self.inner.download_dir)
            .await
            .map_err(|e| Error::file_system("cannot create download directory").with_source(e))?;

        let size = bytes.len();
        let download_dir = self.inner.download_dir.clone();
        let prefix = format!("{}.", target.local_name());
        let destination = path.clone();
        tokio::task::spawn_blocking(move || store(&download_dir, &prefix, &bytes, &destination))
            .await
            .map_err(|e| Error::internal("file writer task failed").with_source(e))??;

        tracing::info!(
            target: TRACING_TARGET,
            pipeline_id = %target.pipeline_id,
            file_name = %target.file_name,
            bytes = size,
            "Downloaded LlamaCloud file"
        );

        Ok(DownloadOutcome::Downloaded(path))
    }

    /// Resolves the signed content URL of a pipeline file.
    async fn content_url(&self, target: &DownloadTarget) -> Result<String> {
        let url = self.endpoint(&["api", "v1", "pipelines", &target.pipeline_id, "files"]);
        let files: Vec<PipelineFile> = self.get_json(url).await?;

        let file = files
            .into_iter()
            .find(|file| file.name.as_deref() == Some(target.file_name.as_str()))
            .ok_or_else(|| {
                Error::external(
                    LLAMA_CLOUD,
                    format!(
                        "file '{}' not found in pipeline '{}'",
                        target.file_name, target.pipeline_id
                    ),
                )
            })?;

        let mut url = self.endpoint(&["api", "v1", "files", &file.file_id, "content"]);
        if let Some(project_id) = &file.project_id {
            url.query_pairs_mut().append_pair("project_id", project_id);
        }

        let content: FileContent = self.get_json(url).await?;
        Ok(content.url)
    }

    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.inner
            .client
            .get(url)
            .bearer_auth(&self.inner.api_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::external(LLAMA_CLOUD, "request failed").with_source(e))?
            .json()
            .await
            .map_err(|e| Error::external(LLAMA_CLOUD, "unexpected response body").with_source(e))
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Writes `bytes` to a uniquely named partial file and moves it into place.
///
/// Concurrent downloads of the same target each write their own partial
/// file; the last one to finish replaces the others' identical copy.
fn store(dir: &Path, prefix: &str, bytes: &[u8], destination: &Path) -> Result<()> {
    let mut partial = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| Error::file_system("cannot create partial download file").with_source(e))?;

    partial
        .write_all(bytes)
        .map_err(|e| Error::file_system("cannot write downloaded file").with_source(e))?;

    partial
        .persist(destination)
        .map_err(|e| Error::file_system("cannot move downloaded file").with_source(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn pipeline_node(id: &str, pipeline_id: &str, file_name: &str) -> NodeWithScore {
        NodeWithScore::new(id, "text")
            .with_metadata_entry("pipeline_id", pipeline_id)
            .with_metadata_entry("file_name", file_name)
    }

    fn service(server: &MockServer, dir: &Path) -> anyhow::Result<FileDownloadService> {
        Ok(FileDownloadService::new(
            &server.uri(),
            "llx-test",
            dir,
            Duration::from_secs(5),
        )?)
    }

    #[test]
    fn targets_are_distinct_and_need_both_keys() {
        let nodes = vec![
            pipeline_node("n1", "p1", "a.pdf"),
            pipeline_node("n2", "p1", "a.pdf"),
            pipeline_node("n3", "p2", "b.pdf"),
            NodeWithScore::new("n4", "text").with_metadata_entry("file_name", "c.pdf"),
        ];

        let targets = DownloadTarget::from_nodes(&nodes);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].local_name(), "p1$a.pdf");
        assert_eq!(targets[1].local_name(), "p2$b.pdf");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let error = FileDownloadService::new("not a url", "key", "out", Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::Config);
    }

    #[tokio::test]
    async fn downloads_pipeline_file() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir()?;

        Mock::given(method("GET"))
            .and(path("/api/v1/pipelines/p1/files"))
            .and(header("authorization", "Bearer llx-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "other.pdf", "file_id": "f0", "project_id": "proj"},
                {"name": "report.pdf", "file_id": "f1", "project_id": "proj"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/files/f1/content"))
            .and(query_param("project_id", "proj"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"url": format!("{}/blob/f1", server.uri())})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blob/f1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let downloads = service(&server, dir.path())?;
        let target = DownloadTarget {
            pipeline_id: "p1".to_owned(),
            file_name: "report.pdf".to_owned(),
        };

        let outcome = downloads.download(&target).await?;
        let expected = dir.path().join("p1$report.pdf");
        assert_eq!(outcome, DownloadOutcome::Downloaded(expected.clone()));
        assert_eq!(tokio::fs::read(&expected).await?, b"%PDF-1.7");

        let outcome = downloads.download(&target).await?;
        assert_eq!(outcome, DownloadOutcome::AlreadyPresent(expected));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_downloads_of_one_target_all_succeed() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir()?;

        Mock::given(method("GET"))
            .and(path("/api/v1/pipelines/p1/files"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"name": "shared.pdf", "file_id": "f1"}])),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/files/f1/content"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"url": format!("{}/blob/f1", server.uri())})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blob/f1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![b'x'; 64 * 1024])
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;

        let downloads = service(&server, dir.path())?;
        let target = DownloadTarget {
            pipeline_id: "p1".to_owned(),
            file_name: "shared.pdf".to_owned(),
        };

        for _ in 0..10 {
            let _ = tokio::fs::remove_file(downloads.local_path(&target)).await;

            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let downloads = downloads.clone();
                    let target = target.clone();
                    tokio::spawn(async move { downloads.download(&target).await })
                })
                .collect();

            for task in tasks {
                task.await??;
            }

            let stored = tokio::fs::read(downloads.local_path(&target)).await?;
            assert_eq!(stored.len(), 64 * 1024);
        }

        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["p1$shared.pdf".to_owned()]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_an_external_error() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir()?;

        Mock::given(method("GET"))
            .and(path("/api/v1/pipelines/p1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let downloads = service(&server, dir.path())?;
        let target = DownloadTarget {
            pipeline_id: "p1".to_owned(),
            file_name: "gone.pdf".to_owned(),
        };

        let error = downloads.download(&target).await.unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::External);
        assert!(!dir.path().join("p1$gone.pdf").exists());
        Ok(())
    }

    #[tokio::test]
    async fn path_traversal_is_refused() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir()?;
        let downloads = service(&server, dir.path())?;

        let target = DownloadTarget {
            pipeline_id: "p1".to_owned(),
            file_name: "../escape.txt".to_owned(),
        };

        let error = downloads.download(&target).await.unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::Internal);
        Ok(())
    }
}
