//! qBittorrent torrent client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{
    extract_hash_from_magnet, AddTorrentRequest, AddTorrentResult, FilePriority,
    TorrentClient, TorrentClientError, TorrentContentFile, TorrentFilters, TorrentInfo,
    TorrentState,
};

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Session marker (cleared on auth failure).
    session: Arc<RwLock<Option<String>>>,
    /// Stop/start endpoint flavour, detected on first use.
    lifecycle: RwLock<Option<LifecycleApi>>,
}

/// Endpoints that stop and start torrents. WebAPI 2.11 (qBittorrent 5)
/// renamed pause/resume to stop/start and dropped the old names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleApi {
    StartStop,
    PauseResume,
}

impl LifecycleApi {
    /// From the `/api/v2/app/webapiVersion` body, e.g. `2.11.2`.
    fn from_webapi_version(version: &str) -> Self {
        let mut parts = version
            .trim()
            .split('.')
            .map(|part| part.parse::<u32>().unwrap_or(0));
        let major = parts.next().unwrap_or(0);
        let minor = parts.next().unwrap_or(0);

        if (major, minor) >= (2, 11) {
            Self::StartStop
        } else {
            Self::PauseResume
        }
    }

    fn endpoint(self, running: bool) -> &'static str {
        match (self, running) {
            (Self::StartStop, true) => "/api/v2/torrents/start",
            (Self::StartStop, false) => "/api/v2/torrents/stop",
            (Self::PauseResume, true) => "/api/v2/torrents/resume",
            (Self::PauseResume, false) => "/api/v2/torrents/pause",
        }
    }

    fn other(self) -> Self {
        match self {
            Self::StartStop => Self::PauseResume,
            Self::PauseResume => Self::StartStop,
        }
    }
}

/// A request that can be re-sent after re-authenticating.
enum Payload<'a> {
    Get,
    Form(&'a [(&'a str, &'a str)]),
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
            lifecycle: RwLock::new(None),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            // Session cookie is stored by the cookie jar
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    async fn send(
        &self,
        url: &str,
        payload: &Payload<'_>,
    ) -> Result<reqwest::Response, TorrentClientError> {
        let request = match payload {
            Payload::Get => self.client.get(url),
            Payload::Form(params) => self.client.post(url).form(params),
        };
        request.send().await.map_err(map_send_error)
    }

    /// Make an authenticated request, re-authenticating once on 403.
    ///
    /// `hash` names the torrent the endpoint is about, so a 404 can be
    /// reported as `TorrentNotFound`.
    async fn request(
        &self,
        endpoint: &str,
        payload: Payload<'_>,
        hash: Option<&str>,
    ) -> Result<String, TorrentClientError> {
        let response = self.send_authenticated(endpoint, &payload).await?;
        read_body(response, hash).await
    }

    async fn send_authenticated(
        &self,
        endpoint: &str,
        payload: &Payload<'_>,
    ) -> Result<reqwest::Response, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let mut response = self.send(&url, payload).await?;

        if response.status() == StatusCode::FORBIDDEN {
            // Session expired, retry after login
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;
            response = self.send(&url, payload).await?;
        }

        Ok(response)
    }

    /// Stop or start a torrent on whichever endpoint pair the server has.
    async fn set_running(&self, hash: &str, running: bool) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let params = [("hashes", hash_lower.as_str())];
        let payload = Payload::Form(&params);

        let api = self.lifecycle_api().await;
        let mut response = self
            .send_authenticated(api.endpoint(running), &payload)
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            let fallback = api.other();
            debug!(
                missing = api.endpoint(running),
                fallback = fallback.endpoint(running),
                "qBittorrent lacks lifecycle endpoint, switching"
            );
            *self.lifecycle.write().await = Some(fallback);
            response = self
                .send_authenticated(fallback.endpoint(running), &payload)
                .await?;
        }

        read_body(response, Some(hash)).await?;
        Ok(())
    }

    async fn lifecycle_api(&self) -> LifecycleApi {
        if let Some(api) = *self.lifecycle.read().await {
            return api;
        }

        match self
            .request("/api/v2/app/webapiVersion", Payload::Get, None)
            .await
        {
            Ok(version) => {
                let api = LifecycleApi::from_webapi_version(&version);
                debug!(version = %version.trim(), ?api, "Detected qBittorrent WebAPI version");
                *self.lifecycle.write().await = Some(api);
                api
            }
            Err(e) => {
                debug!(error = %e, "Could not read WebAPI version, trying stop/start first");
                LifecycleApi::StartStop
            }
        }
    }

    /// Make an authenticated POST request with multipart data.
    async fn post_multipart(
        &self,
        endpoint: &str,
        form: multipart::Form,
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }

    async fn fetch_info(&self, endpoint: &str) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let response = self.request(endpoint, Payload::Get, None).await?;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&response).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        Ok(torrents.into_iter().map(|t| t.into_torrent_info()).collect())
    }
}

async fn read_body(
    response: reqwest::Response,
    hash: Option<&str>,
) -> Result<String, TorrentClientError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        if let Some(hash) = hash {
            return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
        }
    }
    if !status.is_success() {
        return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
    }

    response
        .text()
        .await
        .map_err(|e| TorrentClientError::ApiError(e.to_string()))
}

fn map_send_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    size: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            save_path: non_empty(self.save_path),
            content_path: non_empty(self.content_path),
            category: non_empty(self.category),
            added_at: timestamp_to_datetime(self.added_on),
        }
    }
}

/// qBittorrent file entry response.
#[derive(Debug, Deserialize)]
struct QBFileEntry {
    #[serde(default)]
    index: Option<usize>,
    name: String,
    size: i64,
    priority: i64,
}

impl QBFileEntry {
    fn into_content_file(self, position: usize) -> TorrentContentFile {
        TorrentContentFile {
            index: self.index.unwrap_or(position),
            name: self.name,
            size: self.size.max(0) as u64,
            priority: if self.priority == 0 {
                FilePriority::Skip
            } else {
                FilePriority::Normal
            },
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Parse qBittorrent state string to TorrentState.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "metaDL" | "forcedMetaDL" => TorrentState::FetchingMetadata,
        "downloading" | "forcedDL" | "allocating" => TorrentState::Downloading,
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" | "stalledUP" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

/// Group file indices by priority as pipe-joined id lists for `filePrio`.
fn priority_groups(priorities: &[FilePriority]) -> Vec<(FilePriority, String)> {
    [FilePriority::Normal, FilePriority::Skip]
        .into_iter()
        .filter_map(|wanted| {
            let ids: Vec<String> = priorities
                .iter()
                .enumerate()
                .filter(|(_, p)| **p == wanted)
                .map(|(i, _)| i.to_string())
                .collect();
            if ids.is_empty() {
                None
            } else {
                Some((wanted, ids.join("|")))
            }
        })
        .collect()
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let hash = extract_hash_from_magnet(&request.uri)
            .ok_or_else(|| TorrentClientError::InvalidMagnet(request.uri.clone()))?;

        let mut form = multipart::Form::new().text("urls", request.uri.clone());

        if let Some(path) = request
            .save_path
            .as_ref()
            .or(self.config.download_path.as_ref())
        {
            form = form.text("savepath", path.clone());
        }
        if let Some(cat) = request.category {
            form = form.text("category", cat);
        }
        if request.paused {
            // qBittorrent 5 renamed the flag; older versions ignore the new one
            form = form.text("paused", "true").text("stopped", "true");
        }

        let body = self.post_multipart("/api/v2/torrents/add", form).await?;
        if body.contains("Fails.") {
            return Err(TorrentClientError::ApiError(format!(
                "qBittorrent rejected magnet for {}",
                hash
            )));
        }

        Ok(AddTorrentResult {
            hash,
            name: None, // Name not known until metadata is downloaded
        })
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let mut endpoint = "/api/v2/torrents/info".to_string();
        let mut query_parts = Vec::new();

        if let Some(state) = &filters.state {
            let filter = match state {
                TorrentState::Downloading => "downloading",
                TorrentState::Seeding => "seeding",
                TorrentState::Paused => "paused",
                TorrentState::Stalled => "stalled",
                TorrentState::Checking => "checking",
                TorrentState::Error => "errored",
                _ => "all",
            };
            if filter != "all" {
                query_parts.push(format!("filter={}", filter));
            }
        }

        if let Some(category) = &filters.category {
            query_parts.push(format!("category={}", urlencoding::encode(category)));
        }

        if !filters.hashes.is_empty() {
            let hashes: Vec<String> = filters.hashes.iter().map(|h| h.to_lowercase()).collect();
            query_parts.push(format!("hashes={}", hashes.join("|")));
        }

        if !query_parts.is_empty() {
            endpoint.push('?');
            endpoint.push_str(&query_parts.join("&"));
        }

        self.fetch_info(&endpoint).await
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let endpoint = format!("/api/v2/torrents/info?hashes={}", hash_lower);

        self.fetch_info(&endpoint)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let endpoint = format!("/api/v2/torrents/files?hash={}", hash_lower);
        let response = self.request(&endpoint, Payload::Get, Some(hash)).await?;

        let files: Vec<QBFileEntry> = serde_json::from_str(&response).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(position, f)| f.into_content_file(position))
            .collect())
    }

    async fn set_file_priorities(
        &self,
        hash: &str,
        priorities: &[FilePriority],
    ) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();

        for (priority, ids) in priority_groups(priorities) {
            let value = priority.as_u8().to_string();
            self.request(
                "/api/v2/torrents/filePrio",
                Payload::Form(&[("hash", &hash_lower), ("id", &ids), ("priority", &value)]),
                Some(hash),
            )
            .await?;
        }

        Ok(())
    }

    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.set_running(hash, false).await
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.set_running(hash, true).await
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };

        self.request(
            "/api/v2/torrents/delete",
            Payload::Form(&[("hashes", &hash_lower), ("deleteFiles", delete_str)]),
            Some(hash),
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_qb_state_metadata() {
        assert_eq!(parse_qb_state("metaDL"), TorrentState::FetchingMetadata);
        assert_eq!(parse_qb_state("forcedMetaDL"), TorrentState::FetchingMetadata);
    }

    #[test]
    fn test_parse_qb_state_downloading() {
        assert_eq!(parse_qb_state("downloading"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("forcedDL"), TorrentState::Downloading);
    }

    #[test]
    fn test_parse_qb_state_paused() {
        assert_eq!(parse_qb_state("pausedDL"), TorrentState::Paused);
        assert_eq!(parse_qb_state("pausedUP"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedDL"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedUP"), TorrentState::Paused);
    }

    #[test]
    fn test_parse_qb_state_other() {
        assert_eq!(parse_qb_state("uploading"), TorrentState::Seeding);
        assert_eq!(parse_qb_state("checkingResumeData"), TorrentState::Checking);
        assert_eq!(parse_qb_state("queuedDL"), TorrentState::Queued);
        assert_eq!(parse_qb_state("stalledDL"), TorrentState::Stalled);
        assert_eq!(parse_qb_state("missingFiles"), TorrentState::Error);
        assert_eq!(parse_qb_state("something_else"), TorrentState::Unknown);
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let dt = timestamp_to_datetime(1703980800).unwrap();
        assert_eq!(dt.year(), 2023);
        assert!(timestamp_to_datetime(-1).is_none());
        assert!(timestamp_to_datetime(0).is_none());
    }

    #[test]
    fn test_qb_torrent_info_conversion() {
        let json = r#"{
            "hash": "ABC123",
            "name": "Test Torrent",
            "state": "pausedDL",
            "progress": 0.0,
            "size": 1000000,
            "added_on": 1703980800,
            "save_path": "/downloads/",
            "content_path": "/downloads/Test Torrent",
            "category": ""
        }"#;
        let qb_info: QBTorrentInfo = serde_json::from_str(json).unwrap();

        let info = qb_info.into_torrent_info();
        assert_eq!(info.hash, "abc123"); // lowercase
        assert_eq!(info.state, TorrentState::Paused);
        assert_eq!(info.size_bytes, 1000000);
        assert_eq!(info.category, None);
        assert_eq!(info.content_path, Some("/downloads/Test Torrent".to_string()));
        assert!(info.has_metadata());
    }

    #[test]
    fn test_qb_info_before_metadata() {
        let json = r#"{
            "hash": "abc123",
            "name": "abc123",
            "state": "metaDL",
            "progress": 0.0,
            "size": -1,
            "save_path": "/downloads",
            "content_path": "/downloads"
        }"#;
        let info: TorrentInfo = serde_json::from_str::<QBTorrentInfo>(json)
            .unwrap()
            .into_torrent_info();
        assert_eq!(info.size_bytes, 0);
        assert!(!info.has_metadata());
    }

    #[test]
    fn test_qb_file_entry_conversion() {
        let json = r#"[
            {"index": 0, "name": "Release/movie.mkv", "size": 1000, "priority": 1},
            {"name": "Release/info.nfo", "size": 10, "priority": 0}
        ]"#;
        let entries: Vec<QBFileEntry> = serde_json::from_str(json).unwrap();
        let files: Vec<TorrentContentFile> = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.into_content_file(i))
            .collect();

        assert_eq!(files[0].index, 0);
        assert_eq!(files[0].priority, FilePriority::Normal);
        assert_eq!(files[1].index, 1);
        assert_eq!(files[1].priority, FilePriority::Skip);
    }

    #[test]
    fn test_lifecycle_api_from_webapi_version() {
        assert_eq!(
            LifecycleApi::from_webapi_version("2.11.2\n"),
            LifecycleApi::StartStop
        );
        assert_eq!(
            LifecycleApi::from_webapi_version("2.11"),
            LifecycleApi::StartStop
        );
        assert_eq!(
            LifecycleApi::from_webapi_version("3.0"),
            LifecycleApi::StartStop
        );
        assert_eq!(
            LifecycleApi::from_webapi_version("2.10.4"),
            LifecycleApi::PauseResume
        );
        assert_eq!(
            LifecycleApi::from_webapi_version("2.9.3"),
            LifecycleApi::PauseResume
        );
        assert_eq!(
            LifecycleApi::from_webapi_version("garbage"),
            LifecycleApi::PauseResume
        );
    }

    #[test]
    fn test_lifecycle_endpoints() {
        assert_eq!(LifecycleApi::StartStop.endpoint(false), "/api/v2/torrents/stop");
        assert_eq!(LifecycleApi::StartStop.endpoint(true), "/api/v2/torrents/start");
        assert_eq!(LifecycleApi::PauseResume.endpoint(false), "/api/v2/torrents/pause");
        assert_eq!(LifecycleApi::PauseResume.endpoint(true), "/api/v2/torrents/resume");

        // A 404 on one flavour retries on the other
        assert_eq!(LifecycleApi::StartStop.other(), LifecycleApi::PauseResume);
        assert_eq!(LifecycleApi::PauseResume.other(), LifecycleApi::StartStop);
    }

    #[test]
    fn test_priority_groups() {
        let groups = priority_groups(&[
            FilePriority::Normal,
            FilePriority::Skip,
            FilePriority::Normal,
            FilePriority::Skip,
        ]);
        assert_eq!(
            groups,
            vec![
                (FilePriority::Normal, "0|2".to_string()),
                (FilePriority::Skip, "1|3".to_string()),
            ]
        );

        let all_normal = priority_groups(&[FilePriority::Normal, FilePriority::Normal]);
        assert_eq!(all_normal, vec![(FilePriority::Normal, "0|1".to_string())]);

        assert!(priority_groups(&[]).is_empty());
    }

    #[test]
    fn test_new_client_from_config() {
        let client = QBittorrentClient::new(QBittorrentConfig {
            url: "http://localhost:8080/".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            timeout_secs: 10,
            download_path: None,
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.name(), "qbittorrent");
    }
}
