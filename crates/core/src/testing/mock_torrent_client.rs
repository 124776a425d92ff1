//! Mock torrent client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::torrent_client::{
    extract_hash_from_magnet, AddTorrentRequest, AddTorrentResult, FilePriority, TorrentClient,
    TorrentClientError, TorrentContentFile, TorrentFilters, TorrentInfo, TorrentState,
};

/// Client operations, used to target failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Add,
    List,
    GetTorrent,
    GetFiles,
    SetPriorities,
    Pause,
    Resume,
    Remove,
}

/// A recorded client call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Add { hash: String, paused: bool },
    List,
    GetTorrent(String),
    GetFiles(String),
    SetPriorities {
        hash: String,
        priorities: Vec<FilePriority>,
    },
    Pause(String),
    Resume(String),
    Remove { hash: String, delete_files: bool },
}

impl ClientCall {
    fn hash(&self) -> Option<&str> {
        match self {
            ClientCall::Add { hash, .. }
            | ClientCall::SetPriorities { hash, .. }
            | ClientCall::Remove { hash, .. } => Some(hash),
            ClientCall::GetTorrent(hash)
            | ClientCall::GetFiles(hash)
            | ClientCall::Pause(hash)
            | ClientCall::Resume(hash) => Some(hash),
            ClientCall::List => None,
        }
    }
}

/// Files a torrent will reveal once its metadata resolves.
#[derive(Debug, Clone)]
struct ScriptedMetadata {
    files: Vec<(String, u64)>,
    /// Metadata probes (get_torrent/get_files) answered before resolving.
    resolve_after: u32,
}

/// Internal state for a mock torrent.
#[derive(Debug, Clone)]
struct MockTorrentState {
    info: TorrentInfo,
    files: Vec<TorrentContentFile>,
    paused: bool,
    probes: u32,
}

impl MockTorrentState {
    fn resolve(&mut self, files: &[(String, u64)]) {
        self.files = files
            .iter()
            .enumerate()
            .map(|(index, (name, size))| TorrentContentFile {
                index,
                name: name.clone(),
                size: *size,
                priority: FilePriority::Normal,
            })
            .collect();

        let name = files
            .first()
            .map(|(path, _)| path.split(['/', '\\']).next().unwrap_or(path).to_string())
            .unwrap_or_else(|| format!("release-{}", self.info.hash));
        let save_path = self.info.save_path.clone().unwrap_or_default();

        self.info.content_path = Some(format!("{}/{}", save_path.trim_end_matches('/'), name));
        self.info.name = name;
        self.info.size_bytes = files.iter().map(|(_, size)| size).sum();
        self.info.state = self.current_state();
    }

    fn current_state(&self) -> TorrentState {
        if self.paused {
            TorrentState::Paused
        } else if self.files.is_empty() {
            TorrentState::FetchingMetadata
        } else {
            TorrentState::Downloading
        }
    }
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Script when a torrent's metadata resolves and what files it has
/// - Record every call for assertions
/// - Simulate failures, once or per operation, and slow responses
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
///
/// // The file list shows up on the third metadata probe
/// client.script_metadata("abc123", vec![("Movie/movie.mkv", 2_000_000_000)], 2).await;
/// client.add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:abc123")).await?;
///
/// // What did the pipeline ask the client to do?
/// assert_eq!(client.remove_count("abc123").await, 0);
/// ```
#[derive(Debug)]
pub struct MockTorrentClient {
    /// Every call, in order.
    calls: Arc<RwLock<Vec<ClientCall>>>,
    /// Current torrent states by hash.
    torrents: Arc<RwLock<HashMap<String, MockTorrentState>>>,
    /// Metadata to reveal per hash, applied when probed.
    scripted: Arc<RwLock<HashMap<String, ScriptedMetadata>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    /// Operations that fail every time until cleared.
    failures: Arc<RwLock<HashMap<MockOperation, TorrentClientError>>>,
    /// Artificial latency applied to every call.
    stall: Arc<RwLock<Option<Duration>>>,
    /// Default save path for new torrents.
    default_save_path: String,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            torrents: Arc::new(RwLock::new(HashMap::new())),
            scripted: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            failures: Arc::new(RwLock::new(HashMap::new())),
            stall: Arc::new(RwLock::new(None)),
            default_save_path: "/mock/downloads".to_string(),
        }
    }

    /// Create a mock client with a custom save path.
    pub fn with_save_path(save_path: impl Into<String>) -> Self {
        Self {
            default_save_path: save_path.into(),
            ..Self::new()
        }
    }

    /// Script the files a torrent reveals, after `resolve_after` metadata
    /// probes. Applies to torrents added later and to one already present.
    pub async fn script_metadata(&self, hash: &str, files: Vec<(&str, u64)>, resolve_after: u32) {
        let script = ScriptedMetadata {
            files: files
                .into_iter()
                .map(|(name, size)| (name.to_string(), size))
                .collect(),
            resolve_after,
        };

        let mut torrents = self.torrents.write().await;
        if let Some(torrent) = torrents.get_mut(hash) {
            if torrent.probes >= resolve_after {
                torrent.resolve(&script.files);
            }
        }
        self.scripted.write().await.insert(hash.to_string(), script);
    }

    /// Resolve a torrent's metadata right now.
    pub async fn resolve_metadata(&self, hash: &str, files: Vec<(&str, u64)>) {
        self.script_metadata(hash, files, 0).await;
    }

    /// Pre-populate a torrent whose metadata is already known (a duplicate
    /// submission, or a torrent added outside the pipeline).
    pub async fn add_resolved_torrent(&self, hash: &str, files: Vec<(&str, u64)>) {
        let mut state = self.new_state(hash, Some(self.default_save_path.clone()), None, false);
        let files: Vec<(String, u64)> = files
            .into_iter()
            .map(|(name, size)| (name.to_string(), size))
            .collect();
        state.resolve(&files);
        self.torrents.write().await.insert(hash.to_string(), state);
    }

    /// Pre-populate a torrent (for testing get/list operations).
    pub async fn add_mock_torrent(&self, info: TorrentInfo) {
        let hash = info.hash.clone();
        self.torrents.write().await.insert(
            hash,
            MockTorrentState {
                paused: info.state == TorrentState::Paused,
                info,
                files: Vec::new(),
                probes: 0,
            },
        );
    }

    /// Drop a torrent as if someone removed it from the client by hand.
    pub async fn forget_torrent(&self, hash: &str) {
        self.torrents.write().await.remove(hash);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Make every call of `operation` fail until cleared.
    pub async fn fail_operation(&self, operation: MockOperation, error: TorrentClientError) {
        self.failures.write().await.insert(operation, error);
    }

    /// Stop failing `operation`.
    pub async fn clear_failure(&self, operation: MockOperation) {
        self.failures.write().await.remove(&operation);
    }

    /// Delay every response by `delay`.
    pub async fn set_stall(&self, delay: Option<Duration>) {
        *self.stall.write().await = delay;
    }

    /// All recorded calls.
    pub async fn calls(&self) -> Vec<ClientCall> {
        self.calls.read().await.clone()
    }

    /// Recorded calls concerning one torrent.
    pub async fn calls_for(&self, hash: &str) -> Vec<ClientCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| call.hash() == Some(hash))
            .cloned()
            .collect()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Number of remove calls issued for a torrent.
    pub async fn remove_count(&self, hash: &str) -> usize {
        self.calls_for(hash)
            .await
            .iter()
            .filter(|call| matches!(call, ClientCall::Remove { .. }))
            .count()
    }

    /// Number of add calls issued for a torrent.
    pub async fn add_count(&self, hash: &str) -> usize {
        self.calls_for(hash)
            .await
            .iter()
            .filter(|call| matches!(call, ClientCall::Add { .. }))
            .count()
    }

    /// Last committed priorities for a torrent.
    pub async fn priorities(&self, hash: &str) -> Option<Vec<FilePriority>> {
        let torrents = self.torrents.read().await;
        let torrent = torrents.get(hash)?;
        if torrent.files.is_empty() {
            return None;
        }
        Some(torrent.files.iter().map(|f| f.priority).collect())
    }

    /// Whether a torrent is currently paused.
    pub async fn is_paused(&self, hash: &str) -> Option<bool> {
        self.torrents.read().await.get(hash).map(|t| t.paused)
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.contains_key(hash)
    }

    /// Get the number of torrents.
    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    fn new_state(
        &self,
        hash: &str,
        save_path: Option<String>,
        category: Option<String>,
        paused: bool,
    ) -> MockTorrentState {
        let save_path = save_path.unwrap_or_else(|| self.default_save_path.clone());
        let mut state = MockTorrentState {
            info: TorrentInfo {
                hash: hash.to_string(),
                name: hash.to_string(),
                state: TorrentState::FetchingMetadata,
                progress: 0.0,
                size_bytes: 0,
                content_path: Some(save_path.clone()),
                save_path: Some(save_path),
                category,
                added_at: Some(Utc::now()),
            },
            files: Vec::new(),
            paused,
            probes: 0,
        };
        state.info.state = state.current_state();
        state
    }

    /// Record the call, apply latency, then surface any injected error.
    async fn enter(&self, operation: MockOperation, call: ClientCall) -> Result<(), TorrentClientError> {
        self.calls.write().await.push(call);

        let stall = *self.stall.read().await;
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(err) = self.failures.read().await.get(&operation) {
            return Err(err.clone());
        }
        Ok(())
    }

    /// Count a metadata probe and resolve the torrent if its script says so.
    async fn probe(&self, hash: &str) -> Result<MockTorrentState, TorrentClientError> {
        let scripted = self.scripted.read().await.get(hash).cloned();
        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .get_mut(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;

        if let Some(script) = scripted {
            if torrent.files.is_empty() && torrent.probes >= script.resolve_after {
                torrent.resolve(&script.files);
            }
        }
        torrent.probes += 1;

        Ok(torrent.clone())
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let hash = extract_hash_from_magnet(&request.uri)
            .ok_or_else(|| TorrentClientError::InvalidMagnet(request.uri.clone()))?;

        self.enter(
            MockOperation::Add,
            ClientCall::Add {
                hash: hash.clone(),
                paused: request.paused,
            },
        )
        .await?;

        let mut torrents = self.torrents.write().await;
        if !torrents.contains_key(&hash) {
            let state = self.new_state(&hash, request.save_path, request.category, request.paused);
            torrents.insert(hash.clone(), state);
        }

        Ok(AddTorrentResult { hash, name: None })
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        self.enter(MockOperation::List, ClientCall::List).await?;

        let torrents = self.torrents.read().await;
        Ok(torrents
            .values()
            .map(|t| &t.info)
            .filter(|info| filters.state.is_none_or(|state| info.state == state))
            .filter(|info| {
                filters
                    .category
                    .as_ref()
                    .is_none_or(|cat| info.category.as_ref() == Some(cat))
            })
            .filter(|info| filters.hashes.is_empty() || filters.hashes.contains(&info.hash))
            .cloned()
            .collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        self.enter(MockOperation::GetTorrent, ClientCall::GetTorrent(hash.to_string()))
            .await?;
        Ok(self.probe(hash).await?.info)
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError> {
        self.enter(MockOperation::GetFiles, ClientCall::GetFiles(hash.to_string()))
            .await?;
        Ok(self.probe(hash).await?.files)
    }

    async fn set_file_priorities(
        &self,
        hash: &str,
        priorities: &[FilePriority],
    ) -> Result<(), TorrentClientError> {
        self.enter(
            MockOperation::SetPriorities,
            ClientCall::SetPriorities {
                hash: hash.to_string(),
                priorities: priorities.to_vec(),
            },
        )
        .await?;

        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .get_mut(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;

        if torrent.files.len() != priorities.len() {
            return Err(TorrentClientError::ApiError(format!(
                "expected {} priorities, got {}",
                torrent.files.len(),
                priorities.len()
            )));
        }
        for (file, priority) in torrent.files.iter_mut().zip(priorities) {
            file.priority = *priority;
        }

        Ok(())
    }

    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.enter(MockOperation::Pause, ClientCall::Pause(hash.to_string()))
            .await?;
        self.set_paused(hash, true).await
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.enter(MockOperation::Resume, ClientCall::Resume(hash.to_string()))
            .await?;
        self.set_paused(hash, false).await
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        self.enter(
            MockOperation::Remove,
            ClientCall::Remove {
                hash: hash.to_string(),
                delete_files,
            },
        )
        .await?;

        self.torrents
            .write()
            .await
            .remove(hash)
            .map(|_| ())
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }
}

impl MockTorrentClient {
    async fn set_paused(&self, hash: &str, paused: bool) -> Result<(), TorrentClientError> {
        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .get_mut(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        torrent.paused = paused;
        torrent.info.state = torrent.current_state();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGNET: &str = "magnet:?xt=urn:btih:abc123def456&dn=Test";

    #[tokio::test]
    async fn test_add_and_get_torrent() {
        let client = MockTorrentClient::new();

        let result = client
            .add_torrent(AddTorrentRequest::magnet(MAGNET).with_paused(true))
            .await
            .unwrap();

        assert_eq!(result.hash, "abc123def456");

        let info = client.get_torrent("abc123def456").await.unwrap();
        assert_eq!(info.state, TorrentState::Paused);
        assert_eq!(info.name, "abc123def456");
        assert!(!info.has_metadata());
        assert_eq!(client.is_paused("abc123def456").await, Some(true));
    }

    #[tokio::test]
    async fn test_invalid_magnet() {
        let client = MockTorrentClient::new();
        let result = client
            .add_torrent(AddTorrentRequest::magnet("http://example.com/file.torrent"))
            .await;
        assert!(matches!(result, Err(TorrentClientError::InvalidMagnet(_))));
    }

    #[tokio::test]
    async fn test_scripted_metadata_resolves_after_probes() {
        let client = MockTorrentClient::new();
        client
            .script_metadata("abc123def456", vec![("Release/movie.mkv", 1000), ("Release/info.nfo", 10)], 2)
            .await;
        client
            .add_torrent(AddTorrentRequest::magnet(MAGNET))
            .await
            .unwrap();

        assert!(client.get_files("abc123def456").await.unwrap().is_empty());
        assert!(client.get_files("abc123def456").await.unwrap().is_empty());

        let files = client.get_files("abc123def456").await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].index, 1);

        let info = client.get_torrent("abc123def456").await.unwrap();
        assert_eq!(info.name, "Release");
        assert_eq!(info.size_bytes, 1010);
        assert!(info.has_metadata());
    }

    #[tokio::test]
    async fn test_resolve_existing_torrent() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(AddTorrentRequest::magnet(MAGNET))
            .await
            .unwrap();
        assert!(client.get_files("abc123def456").await.unwrap().is_empty());

        client
            .resolve_metadata("abc123def456", vec![("movie.mp4", 500)])
            .await;
        assert_eq!(client.get_files("abc123def456").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_priorities() {
        let client = MockTorrentClient::new();
        client
            .add_resolved_torrent("abc", vec![("a.mkv", 1), ("b.nfo", 1)])
            .await;

        client
            .set_file_priorities("abc", &[FilePriority::Normal, FilePriority::Skip])
            .await
            .unwrap();
        assert_eq!(
            client.priorities("abc").await,
            Some(vec![FilePriority::Normal, FilePriority::Skip])
        );

        let wrong_len = client
            .set_file_priorities("abc", &[FilePriority::Normal])
            .await;
        assert!(wrong_len.is_err());
    }

    #[tokio::test]
    async fn test_recorded_calls() {
        let client = MockTorrentClient::new();

        client
            .add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:one"))
            .await
            .unwrap();
        client
            .add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:two"))
            .await
            .unwrap();
        client.remove_torrent("one", true).await.unwrap();

        assert_eq!(client.calls().await.len(), 3);
        assert_eq!(client.remove_count("one").await, 1);
        assert_eq!(client.remove_count("two").await, 0);
        assert_eq!(
            client.calls_for("one").await.last(),
            Some(&ClientCall::Remove {
                hash: "one".to_string(),
                delete_files: true
            })
        );
        assert!(!client.has_torrent("one").await);
        assert_eq!(client.torrent_count().await, 1);
    }

    #[tokio::test]
    async fn test_error_injection() {
        let client = MockTorrentClient::new();

        client
            .set_next_error(TorrentClientError::ConnectionFailed("test".into()))
            .await;

        let result = client
            .add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:err"))
            .await;
        assert!(result.is_err());

        // Next call should succeed
        let result = client
            .add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:err"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_operation_failure_persists() {
        let client = MockTorrentClient::new();
        client.add_resolved_torrent("abc", vec![("a.mkv", 1)]).await;
        client
            .fail_operation(MockOperation::Resume, TorrentClientError::Timeout)
            .await;

        assert!(client.resume_torrent("abc").await.is_err());
        assert!(client.resume_torrent("abc").await.is_err());
        assert!(client.pause_torrent("abc").await.is_ok());

        client.clear_failure(MockOperation::Resume).await;
        assert!(client.resume_torrent("abc").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_torrent_is_not_found() {
        let client = MockTorrentClient::new();
        let err = client.get_torrent("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(client.get_files("missing").await.unwrap_err().is_not_found());
        assert!(client.remove_torrent("missing", true).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:one").with_category("jav"))
            .await
            .unwrap();
        client
            .add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:two"))
            .await
            .unwrap();

        let all = client.list_torrents(&TorrentFilters::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let jav = client
            .list_torrents(&TorrentFilters {
                category: Some("jav".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(jav.len(), 1);
        assert_eq!(jav[0].hash, "one");
    }
}
