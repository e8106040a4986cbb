use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};

#[cfg(not(test))]
/// 現在のローカル時間を取得する。
pub fn now() -> DateTime<Local> {
    Local::now()
}


#[cfg(test)]
pub use mock_datetime::now;

/// ローカルタイムゾーンで指定日の00:00:00を返す。
///
/// 夏時間の切り替えで00:00が2回ある場合は早い方を使う。
pub fn local_midnight(date: NaiveDate) -> Result<DateTime<Local>> {
    let naive_datetime = date
        .and_hms_opt(0, 0, 0)
        .context("Failed to set hour, minute, and second")?;
    Local
        .from_local_datetime(&naive_datetime)
        .earliest()
        .with_context(|| format!("Failed to convert {} to DateTime<Local>", date))
}
