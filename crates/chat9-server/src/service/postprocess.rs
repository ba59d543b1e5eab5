//! Background follow-up work for the source nodes of an answer.

use std::time::Duration;

use chat9_engine::NodeWithScore;
use tokio_util::task::TaskTracker;

use super::download::{DownloadOutcome, DownloadTarget, FileDownloadService};

/// Tracing target for post-processing.
const TRACING_TARGET: &str = "chat9_server::service::postprocess";

/// What [`PostProcessor::process_response_nodes`] did with a node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessing {
    /// No download service is configured.
    Skipped,
    /// The given number of downloads were scheduled.
    Scheduled(usize),
}

/// Schedules downloads of files cited by chat answers.
///
/// The download service is decided once at startup. Scheduled tasks are
/// tracked so shutdown can wait for them.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    downloads: Option<FileDownloadService>,
    tracker: TaskTracker,
}

impl PostProcessor {
    /// Creates a post-processor with an optional download service.
    pub fn new(downloads: Option<FileDownloadService>) -> Self {
        Self {
            downloads,
            tracker: TaskTracker::new(),
        }
    }

    /// Creates a post-processor that never schedules work.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Returns true if a download service is configured.
    pub fn is_enabled(&self) -> bool {
        self.downloads.is_some()
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Schedules downloads for every pipeline file among `nodes`.
    ///
    /// Never fails and never waits: download errors are logged inside the
    /// spawned tasks.
    pub fn process_response_nodes(&self, nodes: &[NodeWithScore]) -> PostProcessing {
        let Some(downloads) = &self.downloads else {
            tracing::debug!(
                target: TRACING_TARGET,
                node_count = nodes.len(),
                "File download service is not configured, skipping post processing of nodes"
            );
            return PostProcessing::Skipped;
        };

        let targets = DownloadTarget::from_nodes(nodes);
        let scheduled = targets.len();

        for target in targets {
            let downloads = downloads.clone();
            self.tracker.spawn(async move {
                match downloads.download(&target).await {
                    Ok(DownloadOutcome::Downloaded(path)) => {
                        tracing::debug!(
                            target: TRACING_TARGET,
                            path = %path.display(),
                            "Source file downloaded"
                        );
                    }
                    Ok(DownloadOutcome::AlreadyPresent(_)) => {}
                    Err(error) => {
                        tracing::error!(
                            target: TRACING_TARGET,
                            pipeline_id = %target.pipeline_id,
                            file_name = %target.file_name,
                            error = %error,
                            "Failed to download source file"
                        );
                    }
                }
            });
        }

        if scheduled > 0 {
            tracing::debug!(
                target: TRACING_TARGET,
                node_count = nodes.len(),
                scheduled,
                "Scheduled source file downloads"
            );
        }

        PostProcessing::Scheduled(scheduled)
    }

    /// Stops accepting work and waits up to `timeout` for running tasks.
    ///
    /// Returns false if tasks were still running when the timeout elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();

        if pending > 0 {
            tracing::info!(
                target: TRACING_TARGET,
                pending,
                "Waiting for background downloads"
            );
        }

        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<NodeWithScore> {
        vec![
            NodeWithScore::new("n1", "first")
                .with_metadata_entry("pipeline_id", "p1")
                .with_metadata_entry("file_name", "a.pdf"),
            NodeWithScore::new("n2", "second"),
        ]
    }

    #[tokio::test]
    async fn disabled_processor_is_a_no_op() {
        let processor = PostProcessor::disabled();
        assert!(!processor.is_enabled());
        assert_eq!(
            processor.process_response_nodes(&nodes()),
            PostProcessing::Skipped
        );
        assert_eq!(processor.pending(), 0);
        assert!(processor.shutdown(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn failed_downloads_stay_in_the_background() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // Nothing listens on port 9, so every download fails.
        let downloads = FileDownloadService::new(
            "http://127.0.0.1:9",
            "llx-test",
            dir.path(),
            Duration::from_secs(1),
        )?;

        let processor = PostProcessor::new(Some(downloads));
        assert_eq!(
            processor.process_response_nodes(&nodes()),
            PostProcessing::Scheduled(1)
        );
        assert!(processor.shutdown(Duration::from_secs(5)).await);
        assert!(!dir.path().join("p1$a.pdf").exists());
        Ok(())
    }

    #[tokio::test]
    async fn nodes_without_pipeline_files_schedule_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let downloads = FileDownloadService::new(
            "http://127.0.0.1:9",
            "llx-test",
            dir.path(),
            Duration::from_secs(1),
        )?;

        let processor = PostProcessor::new(Some(downloads));
        let nodes = vec![NodeWithScore::new("n1", "text")];
        assert_eq!(
            processor.process_response_nodes(&nodes),
            PostProcessing::Scheduled(0)
        );
        Ok(())
    }
}
