use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Togglのタイムエントリー。
///
/// 停止済みのエントリーでは`duration`は`stop - start`の秒数となる。
/// 実行中のエントリーでは`duration`は負の値となる。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    pub workspace_id: i64,
    pub description: String,
    pub start: DateTime<Utc>,
    pub stop: Option<DateTime<Utc>>,
    pub duration: i64,
}

impl TimeEntry {
    /// タイマーが実行中かどうかを返す。
    pub fn is_running(&self) -> bool {
        self.duration < 0
    }

    /// 終了日時を返す。
    ///
    /// 実行中の場合は`now`を返す。
    /// APIが終了日時を返さなかった場合は`start + duration`から求める。
    pub fn stop_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.is_running() {
            return now;
        }
        self.stop
            .unwrap_or_else(|| self.start + Duration::seconds(self.duration))
    }

    /// 経過秒数を返す。
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.stop_time(now) - self.start).num_seconds()
    }
}
