//! Static file routes for source documents and generated output.

use axum::Router;
use tower_http::services::ServeDir;

use crate::service::FileServer;

/// Tracing target for static file routes.
const TRACING_TARGET: &str = "chat9_server::handler::files";

/// Mount point of the data directory.
pub const DATA_FILES_PATH: &str = "/api/files/data";

/// Mount point of the output directory.
pub const OUTPUT_FILES_PATH: &str = "/api/files/output";

/// Extension trait for `axum::`[`Router`] to serve the file server's directories.
pub trait RouterFilesExt<S> {
    /// Serves the data and output directories.
    ///
    /// A directory that does not exist at startup is not mounted.
    fn with_static_files(self, files: &FileServer) -> Self;
}

impl<S> RouterFilesExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_static_files(self, files: &FileServer) -> Self {
        let mut router = self;

        for (path, dir) in [
            (DATA_FILES_PATH, files.data_dir()),
            (OUTPUT_FILES_PATH, files.output_dir()),
        ] {
            if dir.is_dir() {
                tracing::info!(
                    target: TRACING_TARGET,
                    path,
                    dir = %dir.display(),
                    "Serving static files"
                );
                router = router.nest_service(path, ServeDir::new(dir));
            } else {
                tracing::debug!(
                    target: TRACING_TARGET,
                    path,
                    dir = %dir.display(),
                    "Directory not found, static files not served"
                );
            }
        }

        router
    }
}
