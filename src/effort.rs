use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::time_entry::TimeEntry;

/// 同じdescriptionを持つタイムエントリーのまとまり。
#[derive(Clone, Debug, PartialEq)]
pub struct Effort {
    pub description: String,
    pub entries: Vec<TimeEntry>,
    pub seconds: i64,
}

impl Effort {
    /// 開始日時が最も新しいエントリーを返す。
    pub fn newest_entry(&self) -> Option<&TimeEntry> {
        self.entries.iter().max_by_key(|entry| entry.start)
    }

    /// 開始日時が最も古いエントリーを返す。
    pub fn oldest_entry(&self) -> Option<&TimeEntry> {
        self.entries.iter().min_by_key(|entry| entry.start)
    }

    pub fn is_running(&self) -> bool {
        self.newest_entry()
            .map(TimeEntry::is_running)
            .unwrap_or(false)
    }
}

/// タイムエントリーをdescriptionごとにまとめ、合計秒数を計算する。
///
/// `start`、`end`が指定された場合、各エントリーの区間をその範囲に切り詰めて集計する。
/// 実行中のエントリーは`now`までを集計する。
/// 結果は最新のエントリーの開始日時が新しい順に並ぶ。
///
/// # Arguments
///
/// * `time_entries` - 集計するタイムエントリー
/// * `start` - 集計範囲の開始日時
/// * `end` - 集計範囲の終了日時
/// * `now` - 現在日時
pub fn group_efforts(
    time_entries: &[TimeEntry],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<Effort> {
    let grouped: HashMap<String, Effort> =
        time_entries
            .iter()
            .fold(HashMap::new(), |mut accumulate, entry| {
                let effort = accumulate
                    .entry(entry.description.clone())
                    .or_insert_with(|| Effort {
                        description: entry.description.clone(),
                        entries: vec![],
                        seconds: 0,
                    });
                effort.seconds += clipped_seconds(entry, start, end, now);
                effort.entries.push(entry.clone());
                accumulate
            });

    let mut efforts: Vec<Effort> = grouped.into_values().collect();
    efforts.sort_by_key(|effort| std::cmp::Reverse(effort.newest_entry().map(|e| e.start)));
    efforts
}

/// エントリーの区間を`[start, end]`に切り詰めた秒数を返す。
fn clipped_seconds(
    entry: &TimeEntry,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    if start.is_none() && end.is_none() {
        return entry.elapsed_seconds(now).max(0);
    }
    let from = match start {
        Some(start) => entry.start.max(start),
        None => entry.start,
    };
    let stop = entry.stop_time(now);
    let to = match end {
        Some(end) => stop.min(end),
        None => stop,
    };
    (to - from).num_seconds().max(0)
}

/// 秒数を時間に変換する。
///
/// 15分単位で切り上げた時間と、切り上げ前の時間を返す。
pub fn to_hours(seconds: i64) -> (f64, f64) {
    let exact_hours = seconds as f64 / 3600.0;
    let hours = (exact_hours * 4.0).ceil() / 4.0;
    (hours, exact_hours)
}

/// 経過時間を大まかな表現にする。
pub fn to_approximate_time(delta: Duration) -> String {
    let days = delta.num_days();
    if days == 1 {
        return "yesterday".to_string();
    }
    if days > 1 {
        return format!("{} days", days);
    }

    let seconds = delta.num_seconds();
    if seconds > 60 * 60 {
        format!("{:.0} hours", seconds as f64 / 3600.0)
    } else if seconds > 60 {
        format!("{:.0} minutes", seconds as f64 / 60.0)
    } else {
        format!("{} seconds", seconds)
    }
}
