//! Progress Reporter — periodic status heartbeats while the LLM call is in
//! flight, purely for polling-client feedback.
//!
//! Progress advances monotonically inside a fixed band and a small set of
//! human-readable phrases rotates underneath it. The reporter is stopped
//! the instant the LLM call resolves, so it can never race a terminal
//! status write.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::jobs::store::JobStore;
use crate::jobs::types::JobStatus;

const TICK: Duration = Duration::from_secs(3);
const BAND_START: u8 = 30;
const BAND_CEILING: u8 = 85;
const STEP: u8 = 5;

const PHRASES: [&str; 5] = [
    "Analyzing document structure...",
    "Extracting candidate profile...",
    "Reading work experience...",
    "Collecting projects and education...",
    "Organizing skills and sections...",
];

pub struct ProgressReporter {
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Spawns the heartbeat task. The first write happens immediately at
    /// the start of the band.
    pub fn start(store: Arc<dyn JobStore>, job_id: String) -> Self {
        let handle = tokio::spawn(async move {
            let mut progress = BAND_START;
            let mut ticker = tokio::time::interval(TICK);
            for phrase in PHRASES.iter().cycle() {
                ticker.tick().await;
                if let Err(e) = store
                    .set_status(&job_id, JobStatus::Processing, progress, phrase)
                    .await
                {
                    warn!(%job_id, error = %e, "progress heartbeat write failed");
                }
                progress = progress.saturating_add(STEP).min(BAND_CEILING);
            }
        });
        Self { handle }
    }

    /// Stops the heartbeat. Also triggered by drop, so early error returns
    /// in the handler cannot leave a stale reporter running.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    use crate::jobs::testing::MemoryJobStore;

    #[tokio::test(start_paused = true)]
    async fn test_progress_advances_within_band() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.enqueue("resume_parse", Value::Null).await.unwrap();

        let reporter = ProgressReporter::start(store.clone(), id.clone());
        tokio::time::sleep(Duration::from_secs(10)).await;

        let status = store.get_status(&id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Processing);
        assert!(status.progress >= BAND_START);
        assert!(status.progress <= BAND_CEILING);
        assert!(!status.message.is_empty());

        reporter.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_caps_at_band_ceiling() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.enqueue("resume_parse", Value::Null).await.unwrap();

        let reporter = ProgressReporter::start(store.clone(), id.clone());
        tokio::time::sleep(Duration::from_secs(120)).await;

        let status = store.get_status(&id).await.unwrap().unwrap();
        assert_eq!(status.progress, BAND_CEILING);

        reporter.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_heartbeats() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.enqueue("resume_parse", Value::Null).await.unwrap();

        let reporter = ProgressReporter::start(store.clone(), id.clone());
        tokio::time::sleep(Duration::from_secs(7)).await;
        reporter.stop();
        tokio::task::yield_now().await;

        let frozen = store.get_status(&id).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        let later = store.get_status(&id).await.unwrap().unwrap();
        assert_eq!(later.progress, frozen.progress);
        assert_eq!(later.message, frozen.message);
    }
}
