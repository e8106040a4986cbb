use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// ワークフローの名前。設定やキャッシュのディレクトリ名に使う。
const WORKFLOW_NAME: &str = "alfred-toggl";

/// 設定ファイルの先頭に書き込むコメント。読み込み時には取り除く。
const CONFIG_HEADER: &str = "\
This file may only contain valid JSON syntax (aside from this header
comment, which is stripped when the file is read).

The config file understands the following keys:

    api_key : string
        This is your Toggl API key.

    use_notifier : boolean
        Set to true to enable the menu bar notifier.

    log_level : string
        This sets how detailed the messages in the workflow's debug
        log will be. It will accept values \"DEBUG\", \"INFO\", \"WARNING\",
        \"ERROR\", or \"CRITICAL\". Its value is \"INFO\" by default.

    workspace_id : number
        The workspace new timers are started in. Your default Toggl
        workspace is used when this is not set.

Note that any changes to comments (including adding new ones) will be
ignored.";

/// Alfredから渡されるワークフローのディレクトリ。
#[derive(Clone, Debug)]
pub struct WorkflowDirs {
    pub data: PathBuf,
    pub cache: PathBuf,
}

impl WorkflowDirs {
    /// Alfredが設定する環境変数からディレクトリを決める。
    ///
    /// `alfred_workflow_data`、`alfred_workflow_cache`が設定されていない場合は
    /// OSのデータディレクトリ、キャッシュディレクトリを使う。
    pub fn from_env() -> Result<Self> {
        let data = match env::var_os("alfred_workflow_data") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .context("Failed to find the data directory")?
                .join(WORKFLOW_NAME),
        };
        let cache = match env::var_os("alfred_workflow_cache") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir()
                .context("Failed to find the cache directory")?
                .join(WORKFLOW_NAME),
        };

        Ok(Self { data, cache })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data.join("config.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data.join("debug.log")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache.join("cache.json")
    }
}

/// ワークフローの設定。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub use_notifier: bool,
    pub log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<i64>,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            use_notifier: false,
            log_level: "INFO".to_string(),
            workspace_id: None,
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// 設定ファイルを読み込む。ファイルが存在しない場合はデフォルトの設定を返す。
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(strip_header(&contents))
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            Self::default()
        };
        config.path = path.to_path_buf();

        Ok(config)
    }

    /// 設定ファイルに書き込む。
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.path, format!("/*\n{}\n*/\n{}\n", CONFIG_HEADER, json))
            .with_context(|| format!("Failed to write config {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// APIキーを返す。
    ///
    /// 設定ファイルにない場合は環境変数`TOGGL_API_TOKEN`を使う。
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var("TOGGL_API_TOKEN").ok().filter(|key| !key.is_empty()))
    }

    /// ログレベルを返す。不明な値の場合は`Info`とする。
    pub fn level_filter(&self) -> LevelFilter {
        match self.log_level.to_uppercase().as_str() {
            "DEBUG" => LevelFilter::Debug,
            "INFO" => LevelFilter::Info,
            "WARNING" | "WARN" => LevelFilter::Warn,
            "ERROR" | "CRITICAL" => LevelFilter::Error,
            _ => LevelFilter::Info,
        }
    }
}

/// 先頭の`/* ... */`コメントを取り除く。
fn strip_header(contents: &str) -> &str {
    let trimmed = contents.trim_start();
    match trimmed.strip_prefix("/*").and_then(|rest| rest.split_once("*/")) {
        Some((_, json)) => json,
        None => trimmed,
    }
}

/// 環境変数を書き換えるテストを直列に実行するためのロック。
#[cfg(test)]
pub(crate) static ENV_LOCK: once_cell::sync::Lazy<std::sync::Mutex<()>> =
    once_cell::sync::Lazy::new(|| std::sync::Mutex::new(()));
