//! Collaborators shared by the sweep, the fast path and deferred tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::filter::FilterConfigHandle;
use crate::metrics;
use crate::pending::{PendingError, PendingStatus, PendingStore, StatusUpdate};
use crate::torrent_client::{AddTorrentRequest, AddTorrentResult, TorrentClient, TorrentClientError};

use super::config::OrchestratorConfig;

/// Cheap to clone; every clone talks to the same store and client.
#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) config: Arc<OrchestratorConfig>,
    pub(crate) store: Arc<dyn PendingStore>,
    pub(crate) client: Arc<dyn TorrentClient>,
    pub(crate) filter: FilterConfigHandle,
}

impl Context {
    /// Run a client call under the configured timeout, recording metrics.
    pub(crate) async fn call<T, F>(
        &self,
        operation: &'static str,
        fut: F,
    ) -> Result<T, TorrentClientError>
    where
        F: Future<Output = Result<T, TorrentClientError>>,
    {
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.client_timeout_secs);

        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TorrentClientError::Timeout),
        };

        let status = match &result {
            Ok(_) => "success",
            Err(TorrentClientError::Timeout) => "timeout",
            Err(_) => "error",
        };
        metrics::CLIENT_REQUESTS
            .with_label_values(&[operation, status])
            .inc();
        metrics::CLIENT_DURATION
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    /// Compare-and-set a row's status. Losing the race is not an error.
    pub(crate) fn transition(
        &self,
        hash: &str,
        from: &[PendingStatus],
        update: StatusUpdate,
    ) -> Result<bool, PendingError> {
        let to = update.status;
        let won = self.store.transition(hash, from, update)?;
        if won {
            debug!(hash = %hash, to = %to, "Status transition");
            metrics::STATUS_TRANSITIONS
                .with_label_values(&[to.as_str()])
                .inc();
        } else {
            debug!(hash = %hash, to = %to, "Status transition lost the race");
        }
        Ok(won)
    }

    /// Delete a torrent from the client; failures are only logged.
    pub(crate) async fn remove_best_effort(&self, hash: &str, delete_files: bool) {
        if let Err(e) = self
            .call("remove", self.client.remove_torrent(hash, delete_files))
            .await
        {
            if !e.is_not_found() {
                warn!(hash = %hash, error = %e, "Failed to remove torrent from client");
            }
        }
    }

    /// Hand a magnet to the client without starting the download.
    pub(crate) async fn add_paused(
        &self,
        magnet: &str,
        save_path: Option<&str>,
        category: Option<&str>,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let mut request = AddTorrentRequest::magnet(magnet).with_paused(true);
        if let Some(path) = save_path {
            request = request.with_save_path(path);
        }
        if let Some(category) = category {
            request = request.with_category(category);
        }
        self.call("add", self.client.add_torrent(request)).await
    }

    pub(crate) async fn resume_best_effort(&self, hash: &str) {
        if let Err(e) = self.call("resume", self.client.resume_torrent(hash)).await {
            warn!(hash = %hash, error = %e, "Failed to resume torrent");
        }
    }

    pub(crate) async fn pause_best_effort(&self, hash: &str) {
        if let Err(e) = self.call("pause", self.client.pause_torrent(hash)).await {
            warn!(hash = %hash, error = %e, "Failed to pause torrent");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::filter::FilterConfig;
    use crate::pending::{CreatePendingRequest, SqlitePendingStore, TorrentSource};
    use crate::testing::MockTorrentClient;

    pub(crate) struct Harness {
        pub ctx: Context,
        pub store: Arc<SqlitePendingStore>,
        pub client: Arc<MockTorrentClient>,
    }

    pub(crate) fn harness_with(config: OrchestratorConfig, filter: FilterConfig) -> Harness {
        let store = Arc::new(SqlitePendingStore::in_memory().unwrap());
        let client = Arc::new(MockTorrentClient::new());
        let ctx = Context {
            config: Arc::new(config),
            store: store.clone(),
            client: client.clone(),
            filter: FilterConfigHandle::new(filter),
        };
        Harness { ctx, store, client }
    }

    pub(crate) fn harness() -> Harness {
        harness_with(OrchestratorConfig::default(), FilterConfig::default())
    }

    pub(crate) fn create_row(store: &SqlitePendingStore, hash: &str, max_retries: u32) {
        store
            .create_if_absent(CreatePendingRequest {
                hash: hash.to_string(),
                magnet: crate::testing::fixtures::magnet(hash),
                save_path: Some("/downloads".to_string()),
                category: None,
                num: None,
                source: TorrentSource::Subscribe,
                max_retries,
            })
            .unwrap();
    }
}
