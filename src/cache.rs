use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::time_entry::TimeEntry;

/// キャッシュしたタイムエントリーを使い続ける秒数。
pub const CACHE_LIFETIME: i64 = 300;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheData {
    #[serde(default)]
    time: i64,
    #[serde(default)]
    time_entries: Option<Vec<TimeEntry>>,
    #[serde(default)]
    disable_cache: bool,
}

/// 最近のタイムエントリーを保存するJSONファイル。
pub struct Cache {
    path: PathBuf,
    data: CacheData,
}

impl Cache {
    /// キャッシュファイルを読み込む。
    ///
    /// ファイルが存在しない、または壊れている場合は空のキャッシュを返す。
    pub fn load(path: &Path) -> Self {
        let data = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring unreadable cache {}: {}", path.display(), e);
                CacheData::default()
            }),
            Err(e) => {
                debug!("No cache at {}: {}", path.display(), e);
                CacheData::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            data,
        }
    }

    /// キャッシュファイルに書き込む。
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string(&self.data).context("Failed to serialize the cache")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write cache {}", self.path.display()))
    }

    /// 有効期限内のタイムエントリーを返す。再取得が必要な場合は`None`を返す。
    pub fn fresh_entries(&self, now: DateTime<Utc>) -> Option<&[TimeEntry]> {
        if self.data.disable_cache {
            debug!("cache is disabled");
            return None;
        }
        // 空のリストは取得し直す
        let entries = self
            .data
            .time_entries
            .as_deref()
            .filter(|entries| !entries.is_empty())?;
        let age = now.timestamp() - self.data.time;
        debug!("cache age is {} seconds", age);
        (age <= CACHE_LIFETIME).then_some(entries)
    }

    /// 取得したタイムエントリーを保存する。
    pub fn store(&mut self, entries: &[TimeEntry], now: DateTime<Utc>) -> Result<()> {
        self.data.time = now.timestamp();
        self.data.time_entries = Some(entries.to_vec());
        self.save()
    }

    /// 次回の問い合わせで再取得させる。
    pub fn schedule_refresh(&mut self) -> Result<()> {
        self.data.time = 0;
        self.save()
    }

    /// キャッシュしたタイムエントリーを破棄する。
    pub fn force_refresh(&mut self) -> Result<()> {
        self.data.time_entries = None;
        self.save()
    }
}
