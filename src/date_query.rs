use anyhow::{bail, Context, Result};
use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday,
};

use crate::datetime::local_midnight;

/// 日付を指定する引数の例。使い方のヒントとして表示する。
pub const DATE_EXAMPLES: &str = "9/2, 9/2/13, 2013-9-2T22:00-04:00, yesterday, monday, ...";

/// `<`や`@`コマンドで指定される日付の問い合わせ。
#[derive(Clone, Debug, PartialEq)]
pub enum DateQuery {
    Today,
    Yesterday,
    ThisWeek,
    Weekday(Weekday),
    Date(NaiveDate),
    DateTime(DateTime<Local>),
    Time(NaiveTime),
}

impl DateQuery {
    /// 文字列をパースする。
    ///
    /// 年を省略した日付(`9/2`)は`today`の年として扱う。
    pub fn parse(query: &str, today: NaiveDate) -> Result<Self> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            bail!("Empty date query");
        }

        match query.as_str() {
            "today" => return Ok(Self::Today),
            "yesterday" => return Ok(Self::Yesterday),
            "this week" => return Ok(Self::ThisWeek),
            _ => {}
        }

        if let Some(weekday) = parse_weekday(&query) {
            return Ok(Self::Weekday(weekday));
        }
        if let Some(date) = parse_slash_date(&query, today) {
            return Ok(Self::Date(date));
        }
        if let Ok(date) = NaiveDate::parse_from_str(&query, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }
        if let Some(datetime) = parse_datetime(&query)? {
            return Ok(Self::DateTime(datetime));
        }
        if let Some(time) = parse_time(&query) {
            return Ok(Self::Time(time));
        }

        bail!("Unrecognized date: {}", query)
    }

    /// 集計範囲の開始日時を返す。
    pub fn start(&self, now: DateTime<Local>) -> Result<DateTime<Local>> {
        let today = now.date_naive();
        match self {
            Self::Today => local_midnight(today),
            Self::Yesterday => local_midnight(today - Duration::days(1)),
            Self::ThisWeek => {
                let days_from_monday = today.weekday().num_days_from_monday() as i64;
                local_midnight(today - Duration::days(days_from_monday))
            }
            Self::Weekday(weekday) => local_midnight(last_weekday(today, *weekday)),
            Self::Date(date) => local_midnight(*date),
            Self::DateTime(datetime) => Ok(*datetime),
            Self::Time(time) => Local
                .from_local_datetime(&today.and_time(*time))
                .earliest()
                .with_context(|| format!("Failed to convert {} to DateTime<Local>", time)),
        }
    }

    /// 集計範囲の終了日時を返す。
    ///
    /// 日付の場合は翌日の0時、日時や時刻の場合は開始から24時間後までとする。
    /// 開始が今日の0時の場合は`now`までとする。
    pub fn end(&self, now: DateTime<Local>) -> Result<DateTime<Local>> {
        let today = now.date_naive();
        match self {
            Self::Today | Self::ThisWeek => Ok(now),
            Self::Yesterday => local_midnight(today),
            Self::Weekday(weekday) => {
                local_midnight(last_weekday(today, *weekday) + Duration::days(1))
            }
            Self::Date(date) => {
                if *date == today {
                    Ok(now)
                } else {
                    local_midnight(*date + Duration::days(1))
                }
            }
            Self::DateTime(_) | Self::Time(_) => {
                let start = self.start(now)?;
                if start == local_midnight(today)? {
                    Ok(now)
                } else {
                    Ok(start + Duration::days(1))
                }
            }
        }
    }
}

/// 先頭3文字が曜日名の場合にその曜日を返す。
fn parse_weekday(query: &str) -> Option<Weekday> {
    let prefix = query.get(..3)?;
    let (weekday, name) = match prefix {
        "mon" => (Weekday::Mon, "monday"),
        "tue" => (Weekday::Tue, "tuesday"),
        "wed" => (Weekday::Wed, "wednesday"),
        "thu" => (Weekday::Thu, "thursday"),
        "fri" => (Weekday::Fri, "friday"),
        "sat" => (Weekday::Sat, "saturday"),
        "sun" => (Weekday::Sun, "sunday"),
        _ => return None,
    };
    // "monthly"は曜日ではない
    name.starts_with(query).then_some(weekday)
}

/// `today`より前で直近の指定曜日を返す。今日と同じ曜日の場合は1週間前となる。
fn last_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let today_index = today.weekday().num_days_from_monday() as i64;
    let target_index = weekday.num_days_from_monday() as i64;
    let mut days_back = (today_index - target_index).rem_euclid(7);
    if days_back == 0 {
        days_back = 7;
    }
    today - Duration::days(days_back)
}

/// `M/D`、`M/D/YY`、`M/D/YYYY`形式の日付をパースする。
fn parse_slash_date(query: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parts = query
        .split('/')
        .map(|part| part.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [month, day] => NaiveDate::from_ymd_opt(today.year(), *month, *day),
        [month, day, year] if *year < 100 => {
            NaiveDate::from_ymd_opt(2000 + *year as i32, *month, *day)
        }
        [month, day, year] => NaiveDate::from_ymd_opt(*year as i32, *month, *day),
        _ => None,
    }
}

/// 日時をパースする。タイムゾーンを省略した場合はローカル時間として扱う。
fn parse_datetime(query: &str) -> Result<Option<DateTime<Local>>> {
    let query = query.to_uppercase();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(&query) {
        return Ok(Some(datetime.with_timezone(&Local)));
    }
    for format in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%:z"] {
        if let Ok(datetime) = DateTime::parse_from_str(&query, format) {
            return Ok(Some(datetime.with_timezone(&Local)));
        }
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&query, format) {
            let datetime = Local
                .from_local_datetime(&naive)
                .earliest()
                .with_context(|| format!("Failed to convert {} to DateTime<Local>", naive))?;
            return Ok(Some(datetime));
        }
    }
    Ok(None)
}

/// `HH:MM`、`H:MMam`形式の時刻をパースする。
fn parse_time(query: &str) -> Option<NaiveTime> {
    let compact = query.replace(' ', "");
    ["%H:%M", "%I:%M%p"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&compact, format).ok())
}
