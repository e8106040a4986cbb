use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::datetime;
use crate::time_entry::TimeEntry;

/// Toggl APIのベースURL。
pub const TOGGL_API_URL: &str = "https://api.track.toggl.com/api/v9";

/// タイムエントリー作成時に`created_with`として送るクライアント名。
const CREATED_WITH: &str = "alfred-toggl";

/// Toggl APIのレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglTimeEntry {
    id: i64,
    workspace_id: i64,
    description: Option<String>,
    start: String,
    stop: Option<String>,
    duration: i64,
}

impl TogglTimeEntry {
    /// APIのレスポンスを`TimeEntry`に変換する。
    fn into_time_entry(self) -> Result<TimeEntry> {
        let start = DateTime::parse_from_rfc3339(&self.start)
            .with_context(|| format!("Failed to parse start time: {}", self.start))?
            .to_utc();
        let stop = self
            .stop
            .map(|stop| {
                DateTime::parse_from_rfc3339(&stop)
                    .map(|stop| stop.to_utc())
                    .with_context(|| format!("Failed to parse stop time: {}", stop))
            })
            .transpose()?;

        Ok(TimeEntry {
            id: self.id,
            workspace_id: self.workspace_id,
            description: self.description.unwrap_or_default(),
            start,
            stop,
            duration: self.duration,
        })
    }
}

/// Toggl APIのユーザー情報をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglMe {
    default_workspace_id: i64,
}

/// タイムエントリーを開始するリクエストのボディ。
#[derive(Debug, Serialize)]
struct NewTimeEntry<'a> {
    created_with: &'a str,
    description: &'a str,
    workspace_id: i64,
    start: String,
    duration: i64,
}

/// Togglのタイムエントリーを読み書きするためのリポジトリ。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TogglRepository: Send + Sync {
    /// 指定された期間に開始したタイムエントリーを取得する。
    async fn read_time_entries(
        &self,
        start_at: &DateTime<Utc>,
        end_at: &DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>>;

    /// 最近のタイムエントリーを取得する。
    async fn read_recent_time_entries(&self) -> Result<Vec<TimeEntry>>;

    /// 実行中のタイムエントリーを取得する。
    async fn read_current_time_entry(&self) -> Result<Option<TimeEntry>>;

    /// 新しいタイマーを開始する。
    async fn start_time_entry(&self, description: &str) -> Result<TimeEntry>;

    /// タイマーを停止する。
    async fn stop_time_entry(&self, workspace_id: i64, id: i64) -> Result<TimeEntry>;
}

/// Toggl APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TogglClient::new("api token", None);
/// let time_entries = client.read_recent_time_entries().await.unwrap();
/// ```
pub struct TogglClient {
    client: Client,
    api_url: String,
    api_token: String,
    workspace_id: Option<i64>,
}

impl TogglClient {
    /// 新しい`TogglClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `api_token` - TogglのAPIトークン
    /// * `workspace_id` - タイマーを開始するワークスペース。`None`の場合はユーザーのデフォルトを使う
    pub fn new(api_token: &str, workspace_id: Option<i64>) -> Self {
        Self::with_api_url(TOGGL_API_URL, api_token, workspace_id)
    }

    /// 接続先を指定して新しい`TogglClient`を返す。
    pub fn with_api_url(api_url: &str, api_token: &str, workspace_id: Option<i64>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            workspace_id,
        }
    }

    /// 認証情報を付けたリクエストを作る。
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .basic_auth(&self.api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
    }

    /// リクエストを送信し、レスポンスをデシリアライズする。
    async fn send<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        request
            .send()
            .await
            .with_context(|| format!("Failed to send request to Toggl API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<T>()
            .await
            .context("Failed to deserialize response")
    }

    /// タイマーを開始するワークスペースを返す。
    async fn workspace_id(&self) -> Result<i64> {
        if let Some(workspace_id) = self.workspace_id {
            return Ok(workspace_id);
        }
        let me: TogglMe = self
            .send(self.request(reqwest::Method::GET, "/me"))
            .await
            .context("Failed to get user information from toggl")?;
        debug!("default workspace: {}", me.default_workspace_id);
        Ok(me.default_workspace_id)
    }
}

fn to_time_entries(entries: Vec<TogglTimeEntry>) -> Result<Vec<TimeEntry>> {
    entries
        .into_iter()
        .map(TogglTimeEntry::into_time_entry)
        .collect()
}

#[async_trait]
impl TogglRepository for TogglClient {
    async fn read_time_entries(
        &self,
        start_at: &DateTime<Utc>,
        end_at: &DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>> {
        let request = self.request(reqwest::Method::GET, "/me/time_entries").query(&[
            ("start_date", start_at.to_rfc3339()),
            ("end_date", end_at.to_rfc3339()),
        ]);
        let entries: Vec<TogglTimeEntry> = self.send(request).await?;
        info!("length of time entries: {}", entries.len());

        to_time_entries(entries)
    }

    async fn read_recent_time_entries(&self) -> Result<Vec<TimeEntry>> {
        let entries: Vec<TogglTimeEntry> = self
            .send(self.request(reqwest::Method::GET, "/me/time_entries"))
            .await?;
        info!("length of time entries: {}", entries.len());

        to_time_entries(entries)
    }

    async fn read_current_time_entry(&self) -> Result<Option<TimeEntry>> {
        let entry: Option<TogglTimeEntry> = self
            .send(self.request(reqwest::Method::GET, "/me/time_entries/current"))
            .await?;

        entry.map(TogglTimeEntry::into_time_entry).transpose()
    }

    async fn start_time_entry(&self, description: &str) -> Result<TimeEntry> {
        let workspace_id = self.workspace_id().await?;
        let body = NewTimeEntry {
            created_with: CREATED_WITH,
            description,
            workspace_id,
            start: datetime::now().to_utc().to_rfc3339(),
            duration: -1,
        };
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("/workspaces/{}/time_entries", workspace_id),
            )
            .json(&body);
        let entry: TogglTimeEntry = self
            .send(request)
            .await
            .with_context(|| format!("Unable to start timer: {}", description))?;
        info!("started time entry {}", entry.id);

        entry.into_time_entry()
    }

    async fn stop_time_entry(&self, workspace_id: i64, id: i64) -> Result<TimeEntry> {
        let request = self.request(
            reqwest::Method::PATCH,
            &format!("/workspaces/{}/time_entries/{}/stop", workspace_id, id),
        );
        let entry: TogglTimeEntry = self
            .send(request)
            .await
            .with_context(|| format!("Unable to stop timer: {}", id))?;
        info!("stopped time entry {}", entry.id);

        entry.into_time_entry()
    }
}
