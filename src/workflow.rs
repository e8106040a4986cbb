use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Local, Utc};
use log::{debug, info, warn};

use crate::alfred::{fuzzy_filter, Item, LINE};
use crate::cache::{Cache, CACHE_LIFETIME};
use crate::config::Config;
use crate::date_query::{DateQuery, DATE_EXAMPLES};
use crate::datetime;
use crate::effort::{group_efforts, to_approximate_time, to_hours, Effort};
use crate::notifier::Notifier;
use crate::time_entry::TimeEntry;
use crate::toggl::TogglRepository;

const DATE_FORMAT: &str = "%m/%d";
const RUNNING_ICON: &str = "running.png";
const TOGGL_URL: &str = "https://track.toggl.com/timer";
const TOGGL_ERROR: &str = "Problem talking to toggl.com";

/// Alfredから呼び出されるワークフロー本体。
///
/// `tell`でscript filterの結果を返し、`do_action`で選択された結果を実行する。
pub struct TogglWorkflow<T: TogglRepository, N: Notifier> {
    toggl: T,
    notifier: N,
    config: Config,
    cache: Cache,
    log_file: PathBuf,
}

impl<T: TogglRepository, N: Notifier> TogglWorkflow<T, N> {
    /// 新しい`TogglWorkflow`を返す。
    ///
    /// # Arguments
    ///
    /// * `toggl` - Toggl APIと通信するためのリポジトリ
    /// * `notifier` - メニューバーのnotifierアプリ
    /// * `config` - ワークフローの設定
    /// * `cache` - 最近のタイムエントリーのキャッシュ
    /// * `log_file` - コマンド一覧から開くログファイル
    pub fn new(toggl: T, notifier: N, config: Config, cache: Cache, log_file: PathBuf) -> Self {
        Self {
            toggl,
            notifier,
            config,
            cache,
            log_file,
        }
    }

    /// クエリの先頭の1文字でコマンドを選び、結果を返す。
    pub async fn tell(&mut self, query: &str) -> Result<Vec<Item>> {
        info!("tell({:?})", query);
        if self.config.api_key().is_none() {
            return Ok(tell_api_key(query));
        }

        let mut chars = query.trim_start().chars();
        let command = chars.next();
        let rest = chars.as_str();
        match command {
            Some('/') => match rest.strip_prefix('/') {
                Some(filter) => {
                    debug!("forcing a cache refresh");
                    self.cache.force_refresh()?;
                    self.tell_query(filter, None).await
                }
                None => self.tell_query(rest, None).await,
            },
            Some('<') => self.tell_since(rest).await,
            Some('@') => self.tell_on(rest).await,
            Some('+') => Ok(tell_start(rest)),
            Some('>') => Ok(self.tell_commands(rest)),
            _ => Ok(tell_help()),
        }
    }

    /// 指定日時以降のタイムエントリーを集計して返す。
    pub async fn tell_since(&mut self, query: &str) -> Result<Vec<Item>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![Item::new("Enter a start time").subtitle(
                "This can be a time, date, datetime, \"yesterday\", \"tuesday\", ...",
            )]);
        }

        let now = datetime::now();
        let start = match DateQuery::parse(query, now.date_naive()).and_then(|q| q.start(now)) {
            Ok(start) => start,
            Err(e) => {
                warn!("{:#}", e);
                return Ok(vec![invalid_date(query)]);
            }
        };
        self.tell_query("", Some((start, None))).await
    }

    /// 指定された期間のタイムエントリーを集計して返す。
    pub async fn tell_on(&mut self, query: &str) -> Result<Vec<Item>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![
                Item::new("Enter a date").subtitle("9/8, yesterday, monday, ...")
            ]);
        }

        let now = datetime::now();
        let range = DateQuery::parse(query, now.date_naive())
            .and_then(|q| Ok((q.start(now)?, q.end(now)?)));
        let (start, end) = match range {
            Ok(range) => range,
            Err(e) => {
                warn!("{:#}", e);
                return Ok(vec![invalid_date(query)]);
            }
        };
        self.tell_query("", Some((start, Some(end)))).await
    }

    /// タイムエントリーをdescriptionごとにまとめて返す。
    ///
    /// 期間が指定されない場合はキャッシュした最近のタイムエントリーを使う。
    /// `filter`が空でなければタイトルで絞り込む。
    ///
    /// # Arguments
    ///
    /// * `filter` - 絞り込みの文字列
    /// * `range` - 集計範囲の開始日時と終了日時
    pub async fn tell_query(
        &mut self,
        filter: &str,
        range: Option<(DateTime<Local>, Option<DateTime<Local>>)>,
    ) -> Result<Vec<Item>> {
        info!("tell_query({:?}, {:?})", filter, range);
        let now = datetime::now().to_utc();
        let start = range.map(|(start, _)| start.to_utc());
        let end = range.and_then(|(_, end)| end).map(|end| end.to_utc());

        let entries = match start {
            None => self.recent_entries(now).await?,
            Some(start) => {
                // 範囲の開始前から続いているエントリーも含めるため1日前から取得する
                let fetch_start = start - Duration::days(1);
                let fetch_end = end.unwrap_or(now) + Duration::days(1);
                let mut entries = self
                    .toggl
                    .read_time_entries(&fetch_start, &fetch_end)
                    .await
                    .context(TOGGL_ERROR)?;
                // 1日より前に開始して実行中のエントリーは取得範囲に入らない
                let current = self
                    .toggl
                    .read_current_time_entry()
                    .await
                    .context(TOGGL_ERROR)?;
                if let Some(current) = current {
                    if entries.iter().all(|entry| entry.id != current.id) {
                        entries.push(current);
                    }
                }
                entries
                    .into_iter()
                    .filter(|entry| {
                        entry.stop_time(now) > start
                            && end.map(|end| entry.start < end).unwrap_or(true)
                    })
                    .collect()
            }
        };
        debug!("{} entries", entries.len());

        let efforts = group_efforts(&entries, start, end, now);
        let mut items = vec![];

        if let Some((range_start, _)) = range {
            if efforts.is_empty() {
                items.push(Item::new("Nothing to report"));
            } else {
                let hours: f64 = efforts.iter().map(|effort| to_hours(effort.seconds).0).sum();
                debug!("total hours: {}", hours);
                let preposition = if end.is_some() { "on" } else { "from" };
                items.push(
                    Item::new(format!(
                        "{:.2} hours {} {}",
                        hours,
                        preposition,
                        range_start.format(DATE_FORMAT)
                    ))
                    .subtitle(LINE),
                );
            }
        }

        items.extend(
            efforts
                .iter()
                .filter_map(|effort| effort_item(effort, start.is_some(), now)),
        );

        if !filter.trim().is_empty() {
            items = fuzzy_filter(filter, items);
        }
        if items.is_empty() {
            items.push(Item::new("Nothing found"));
        }

        Ok(items)
    }

    /// ワークフローの設定などを操作するコマンドの一覧を返す。
    pub fn tell_commands(&self, filter: &str) -> Vec<Item> {
        info!("tell_commands({:?})", filter);
        let mut items = vec![
            Item::new("Open toggl.com")
                .subtitle("Open a browser tab for toggl.com")
                .arg(format!("open|{}", TOGGL_URL)),
            Item::new("Open the workflow config file")
                .subtitle("Change workflow options here, like the debug log level")
                .arg(format!("open|{}", self.config.path().display())),
            Item::new("Open the debug log")
                .subtitle("Open the workflow's debug log")
                .arg(format!("open|{}", self.log_file.display())),
        ];

        if self.config.use_notifier {
            items.push(
                Item::new("Disable the menubar notifier")
                    .subtitle("Exit and disable the menubar notifier")
                    .arg("disable_notifier"),
            );
        } else {
            items.push(
                Item::new("Enable the menubar notifier")
                    .subtitle("Start and enable the menubar notifier")
                    .arg("enable_notifier"),
            );
        }

        items.push(
            Item::new("Clear the cache")
                .subtitle("Force a cache refresh on the next query")
                .arg("force_refresh"),
        );

        if self.config.api_key.is_some() {
            items.push(
                Item::new("Forget your API key")
                    .subtitle("Forget your stored API key, allowing you to change it")
                    .arg("clear_key"),
            );
        }

        if !filter.trim().is_empty() {
            items = fuzzy_filter(filter, items);
        }
        if items.is_empty() {
            items.push(Item::new("Invalid command"));
        }

        items
    }

    /// 選択された結果のアクションを実行し、通知に表示するメッセージを返す。
    ///
    /// アクションは`コマンド|引数`の形式で渡される。
    pub async fn do_action(&mut self, action: &str) -> Result<String> {
        info!("do_action({:?})", action);
        let (command, arg) = action.split_once('|').unwrap_or((action, ""));

        match command {
            "start" => {
                self.start_timer(arg).await?;
                Ok(format!("Started {}", arg))
            }
            "continue" => {
                let (_, description) = arg.split_once('|').unwrap_or(("", arg));
                self.start_timer(description).await?;
                Ok(format!("Continued {}", description))
            }
            "stop" => {
                let mut parts = arg.splitn(3, '|');
                let workspace_id = parse_id(parts.next())?;
                let id = parse_id(parts.next())?;
                let description = parts.next().unwrap_or_default();

                self.toggl
                    .stop_time_entry(workspace_id, id)
                    .await
                    .context(TOGGL_ERROR)?;
                self.cache.schedule_refresh()?;
                if self.config.use_notifier {
                    log_notifier_error(self.notifier.timer_stopped());
                }
                Ok(format!("Stopped {}", description))
            }
            "enable_notifier" => {
                self.config.use_notifier = true;
                self.config.save()?;
                log_notifier_error(self.notifier.activate());
                if let Some(api_key) = self.config.api_key() {
                    log_notifier_error(self.notifier.set_api_key(&api_key));
                }
                Ok("Notifier enabled".to_string())
            }
            "disable_notifier" => {
                self.config.use_notifier = false;
                self.config.save()?;
                log_notifier_error(self.notifier.quit());
                Ok("Notifier disabled".to_string())
            }
            "set_key" => {
                let api_key = arg.trim();
                if api_key.is_empty() {
                    bail!("No API key was given");
                }
                self.config.api_key = Some(api_key.to_string());
                self.config.save()?;
                if self.config.use_notifier {
                    log_notifier_error(self.notifier.set_api_key(api_key));
                }
                Ok("Your key has been set!".to_string())
            }
            "clear_key" => {
                self.config.api_key = None;
                self.config.save()?;
                log_notifier_error(self.notifier.quit());
                Ok("Cleared API key".to_string())
            }
            "force_refresh" => {
                self.cache.force_refresh()?;
                Ok("Cache cleared".to_string())
            }
            "open" => {
                let config_path = self.config.path();
                if Path::new(arg) == config_path && !config_path.exists() {
                    self.config.save()?;
                }
                open(arg)?;
                Ok(String::new())
            }
            _ => Ok(format!("Unknown command \"{}\"", command)),
        }
    }

    /// 実行中のタイムエントリーを返す。notifierアプリが状態を問い合わせるために使う。
    pub async fn status(&self) -> Result<Option<TimeEntry>> {
        if self.config.api_key().is_none() {
            bail!("No Toggl API key has been set");
        }
        self.toggl
            .read_current_time_entry()
            .await
            .context(TOGGL_ERROR)
    }

    async fn start_timer(&mut self, description: &str) -> Result<()> {
        let entry = self
            .toggl
            .start_time_entry(description)
            .await
            .context(TOGGL_ERROR)?;
        self.cache.schedule_refresh()?;
        if self.config.use_notifier {
            log_notifier_error(self.notifier.set_active_timer(entry.id, description));
        }
        Ok(())
    }

    /// 最近のタイムエントリーを返す。キャッシュが有効期限内であればそれを使う。
    async fn recent_entries(&mut self, now: DateTime<Utc>) -> Result<Vec<TimeEntry>> {
        if let Some(entries) = self.cache.fresh_entries(now) {
            debug!("using cached data");
            return Ok(entries.to_vec());
        }

        debug!("refreshing cache");
        let entries = self
            .toggl
            .read_recent_time_entries()
            .await
            .context(TOGGL_ERROR)?;
        self.cache.store(&entries, now)?;
        Ok(entries)
    }
}

/// effortを1行の結果にする。
fn effort_item(effort: &Effort, ranged: bool, now: DateTime<Utc>) -> Option<Item> {
    let newest = effort.newest_entry()?;
    let title = if effort.description.is_empty() {
        "(no description)"
    } else {
        effort.description.as_str()
    };
    let item = Item::new(title).uid(newest.id.to_string());

    if effort.is_running() {
        let total = if effort.seconds > 0 {
            let (hours, exact_hours) = to_hours(effort.seconds);
            format!(" ({:.2} ({:.2}) hours total)", hours, exact_hours)
        } else {
            String::new()
        };
        Some(
            item.icon(RUNNING_ICON)
                .subtitle(format!(
                    "Running for {}{}",
                    to_approximate_time(now - newest.start),
                    total
                ))
                .arg(format!(
                    "stop|{}|{}|{}",
                    newest.workspace_id, newest.id, effort.description
                )),
        )
    } else {
        let (hours, exact_hours) = to_hours(effort.seconds);
        let subtitle = if ranged {
            format!("{:.2} ({:.2}) hours", hours, exact_hours)
        } else {
            let since = effort
                .oldest_entry()
                .map(|oldest| oldest.start.with_timezone(&Local).format(DATE_FORMAT))
                .map(|since| since.to_string())
                .unwrap_or_default();
            format!("{:.2} ({:.2}) hours since {}", hours, exact_hours, since)
        };
        Some(
            item.subtitle(subtitle)
                .arg(format!("continue|{}|{}", newest.id, effort.description)),
        )
    }
}

/// APIキーが設定されていない場合の結果を返す。
fn tell_api_key(query: &str) -> Vec<Item> {
    let api_key = query.trim();
    if api_key.is_empty() {
        return vec![Item::new("First things first...").subtitle(
            "Type your Toggl API key to use this workflow. \
             You can find it on your Profile page at toggl.com",
        )];
    }
    vec![Item::new(format!("Set API key to \"{}\"", api_key))
        .subtitle("Press enter to store your Toggl API key")
        .arg(format!("set_key|{}", api_key))]
}

/// タイマーを開始する結果を返す。
fn tell_start(query: &str) -> Vec<Item> {
    info!("tell_start({:?})", query);
    let description = query.trim();
    if description.is_empty() {
        return vec![Item::new("Waiting for description...")];
    }
    vec![Item::new(format!("Creating timer \"{}\"...", description))
        .arg(format!("start|{}", description))]
}

fn tell_help() -> Vec<Item> {
    vec![
        Item::new("Use '/' to list existing timers")
            .subtitle("Type some text to filter the results")
            .autocomplete("/"),
        Item::new("Use '//' to force a cache refresh")
            .subtitle(format!(
                "Data from Toggl is normally cached for {} seconds",
                CACHE_LIFETIME
            ))
            .autocomplete("//"),
        Item::new("Use '<' to list timers started since a time")
            .subtitle(DATE_EXAMPLES)
            .autocomplete("<"),
        Item::new("Use '@' to list time spent on a particular date")
            .subtitle(DATE_EXAMPLES)
            .autocomplete("@"),
        Item::new("Use '+' to start a new timer")
            .subtitle("Type a description after the '+'")
            .autocomplete("+"),
        Item::new("Use '>' to access other commands")
            .subtitle("Enable menubar icon, go to toggl.com, ...")
            .autocomplete(">"),
        Item::new("Select an existing timer to toggle it"),
    ]
}

fn invalid_date(query: &str) -> Item {
    Item::new(format!("Invalid date \"{}\"", query)).subtitle(DATE_EXAMPLES)
}

fn parse_id(value: Option<&str>) -> Result<i64> {
    let value = value.unwrap_or_default();
    value
        .parse()
        .with_context(|| format!("Invalid time entry id: {:?}", value))
}

/// notifierアプリへの通知に失敗してもアクション自体は失敗させない。
fn log_notifier_error(result: Result<()>) {
    if let Err(e) = result {
        warn!("Failed to notify the menubar notifier: {:#}", e);
    }
}

/// URLやファイルを既定のアプリケーションで開く。
fn open(target: &str) -> Result<()> {
    let status = Command::new("open")
        .arg(target)
        .status()
        .with_context(|| format!("Failed to open {}", target))?;
    if !status.success() {
        bail!("open {} exited with {}", target, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::env;

    use anyhow::anyhow;
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    use super::TogglWorkflow;
    use crate::cache::Cache;
    use crate::config::{Config, ENV_LOCK};
    use crate::datetime::mock_datetime;
    use crate::effort::to_hours;
    use crate::notifier::MockNotifier;
    use crate::time_entry::TimeEntry;
    use crate::toggl::MockTogglRepository;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap()
    }

    fn entry(
        id: i64,
        description: &str,
        start: DateTime<Utc>,
        seconds: Option<i64>,
    ) -> TimeEntry {
        TimeEntry {
            id,
            workspace_id: 77,
            description: description.to_string(),
            start,
            stop: seconds.map(|seconds| start + Duration::seconds(seconds)),
            duration: seconds.unwrap_or(-1),
        }
    }

    fn workflow(
        toggl: MockTogglRepository,
        notifier: MockNotifier,
        dir: &TempDir,
        use_notifier: bool,
    ) -> TogglWorkflow<MockTogglRepository, MockNotifier> {
        mock_datetime::set_mock_time(now());
        let mut config = Config::load(&dir.path().join("config.json")).unwrap();
        config.api_key = Some("secret".to_string());
        config.use_notifier = use_notifier;
        let cache = Cache::load(&dir.path().join("cache.json"));
        TogglWorkflow::new(toggl, notifier, config, cache, dir.path().join("debug.log"))
    }

    fn titles(items: &[crate::alfred::Item]) -> Vec<&str> {
        items.iter().map(|item| item.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_tell_help_for_empty_query() {
        let dir = tempdir().unwrap();
        let mut workflow = workflow(MockTogglRepository::new(), MockNotifier::new(), &dir, false);

        let items = workflow.tell("").await.unwrap();

        assert_eq!(items.len(), 7);
        assert_eq!(items[0].title, "Use '/' to list existing timers");
        assert_eq!(items[0].autocomplete.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_tell_start() {
        let dir = tempdir().unwrap();
        let mut workflow = workflow(MockTogglRepository::new(), MockNotifier::new(), &dir, false);

        let items = workflow.tell("+ write docs").await.unwrap();
        let waiting = workflow.tell("+").await.unwrap();

        assert_eq!(items[0].title, "Creating timer \"write docs\"...");
        assert_eq!(items[0].arg.as_deref(), Some("start|write docs"));
        assert!(items[0].valid);
        assert_eq!(titles(&waiting), ["Waiting for description..."]);
        assert!(!waiting[0].valid);
    }

    #[tokio::test]
    async fn test_tell_query_lists_efforts_and_uses_cache() {
        let dir = tempdir().unwrap();
        let review = entry(1, "review", now() - Duration::hours(4), Some(3600));
        let coding = entry(2, "coding", now() - Duration::minutes(30), None);
        let expected_since = review.start.with_timezone(&Local).format("%m/%d").to_string();
        let entries = vec![review, coding];
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_recent_time_entries()
            .times(1)
            .returning(move || Ok(entries.clone()));
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let items = workflow.tell("/").await.unwrap();
        let cached = workflow.tell("/").await.unwrap();

        assert_eq!(titles(&items), ["coding", "review"]);
        assert_eq!(
            items[0].subtitle.as_deref(),
            Some("Running for 30 minutes (0.50 (0.50) hours total)")
        );
        assert_eq!(items[0].arg.as_deref(), Some("stop|77|2|coding"));
        assert_eq!(
            items[0].icon.as_ref().map(|icon| icon.path.as_str()),
            Some("running.png")
        );
        assert_eq!(
            items[1].subtitle,
            Some(format!("1.00 (1.00) hours since {}", expected_since))
        );
        assert_eq!(items[1].arg.as_deref(), Some("continue|1|review"));
        assert_eq!(cached, items);
    }

    #[tokio::test]
    async fn test_tell_query_with_filter() {
        let dir = tempdir().unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl.expect_read_recent_time_entries().returning(|| {
            Ok(vec![
                entry(1, "review", now() - Duration::hours(4), Some(3600)),
                entry(2, "coding", now() - Duration::hours(2), Some(1800)),
            ])
        });
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let items = workflow.tell("/rev").await.unwrap();
        let nothing = workflow.tell("/zzz").await.unwrap();

        assert_eq!(titles(&items), ["review"]);
        assert_eq!(titles(&nothing), ["Nothing found"]);
    }

    #[tokio::test]
    async fn test_double_slash_forces_refresh() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::load(&dir.path().join("cache.json"));
        cache
            .store(&[entry(1, "stale", now() - Duration::hours(1), Some(60))], now())
            .unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_recent_time_entries()
            .times(1)
            .returning(|| Ok(vec![entry(2, "fresh", now() - Duration::hours(1), Some(60))]));
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let items = workflow.tell("//").await.unwrap();

        assert_eq!(titles(&items), ["fresh"]);
    }

    #[tokio::test]
    async fn test_tell_query_reports_toggl_errors() {
        let dir = tempdir().unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_recent_time_entries()
            .returning(|| Err(anyhow!("connection refused")));
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let error = workflow.tell("/").await.unwrap_err();

        assert_eq!(
            format!("{:#}", error),
            "Problem talking to toggl.com: connection refused"
        );
    }

    #[tokio::test]
    async fn test_tell_since_with_invalid_date() {
        let dir = tempdir().unwrap();
        let mut workflow = workflow(MockTogglRepository::new(), MockNotifier::new(), &dir, false);

        let items = workflow.tell("< someday").await.unwrap();
        let prompt = workflow.tell("<").await.unwrap();

        assert_eq!(titles(&items), ["Invalid date \"someday\""]);
        assert_eq!(titles(&prompt), ["Enter a start time"]);
    }

    #[tokio::test]
    async fn test_tell_on_yesterday() {
        let dir = tempdir().unwrap();
        let yesterday = now().with_timezone(&Local).date_naive() - Duration::days(1);
        let yesterday_start = crate::datetime::local_midnight(yesterday).unwrap().to_utc();
        let worked = entry(5, "planning", yesterday_start + Duration::hours(1), Some(3600));
        let outside = entry(6, "today", yesterday_start + Duration::hours(25), Some(3600));
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_time_entries()
            .withf(move |start, end| *start < yesterday_start && *end > yesterday_start)
            .times(1)
            .returning(move |_, _| Ok(vec![worked.clone(), outside.clone()]));
        toggl.expect_read_current_time_entry().returning(|| Ok(None));
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let items = workflow.tell("@yesterday").await.unwrap();

        assert_eq!(
            titles(&items),
            [
                format!("1.00 hours on {}", yesterday.format("%m/%d")).as_str(),
                "planning"
            ]
        );
        assert_eq!(items[1].subtitle.as_deref(), Some("1.00 (1.00) hours"));
    }

    #[tokio::test]
    async fn test_tell_since_with_nothing_to_report() {
        let dir = tempdir().unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_time_entries()
            .returning(|_, _| Ok(vec![]));
        toggl.expect_read_current_time_entry().returning(|| Ok(None));
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let items = workflow.tell("<today").await.unwrap();

        assert_eq!(titles(&items), ["Nothing to report"]);
    }

    #[tokio::test]
    async fn test_tell_on_datetime_covers_a_day() {
        let dir = tempdir().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap();
        let next_evening = entry(7, "deploy", start + Duration::hours(22), Some(3600));
        let after = entry(8, "retro", start + Duration::hours(25), Some(3600));
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_time_entries()
            .withf(move |from, to| *from < start && *to > start + Duration::days(1))
            .times(1)
            .returning(move |_, _| Ok(vec![next_evening.clone(), after.clone()]));
        toggl.expect_read_current_time_entry().returning(|| Ok(None));
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let items = workflow.tell("@2024-03-10T22:00+00:00").await.unwrap();

        let on = start.with_timezone(&Local).format("%m/%d").to_string();
        assert_eq!(
            titles(&items),
            [format!("1.00 hours on {}", on).as_str(), "deploy"]
        );
    }

    #[tokio::test]
    async fn test_tell_since_includes_long_running_timer() {
        let dir = tempdir().unwrap();
        let overnight = entry(4, "overnight", now() - Duration::hours(30), None);
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_time_entries()
            .returning(|_, _| Ok(vec![]));
        toggl
            .expect_read_current_time_entry()
            .times(1)
            .returning(move || Ok(Some(overnight.clone())));
        let mut workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let items = workflow.tell("<today").await.unwrap();

        let today = now().with_timezone(&Local).date_naive();
        let midnight = crate::datetime::local_midnight(today).unwrap();
        let (hours, _) = to_hours((now() - midnight.to_utc()).num_seconds());
        assert_eq!(
            titles(&items),
            [
                format!("{:.2} hours from {}", hours, midnight.format("%m/%d")).as_str(),
                "overnight"
            ]
        );
        assert_eq!(items[1].arg.as_deref(), Some("stop|77|4|overnight"));
    }

    #[tokio::test]
    async fn test_tell_commands() {
        let dir = tempdir().unwrap();
        let mut workflow = workflow(MockTogglRepository::new(), MockNotifier::new(), &dir, false);

        let items = workflow.tell(">").await.unwrap();
        let filtered = workflow.tell(">cache").await.unwrap();
        let invalid = workflow.tell(">qqq").await.unwrap();

        assert_eq!(items.len(), 6);
        assert_eq!(items[3].arg.as_deref(), Some("enable_notifier"));
        assert_eq!(titles(&filtered)[0], "Clear the cache");
        assert_eq!(titles(&invalid), ["Invalid command"]);
    }

    #[test]
    fn test_tell_without_api_key() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::remove_var("TOGGL_API_TOKEN");
        let dir = tempdir().unwrap();
        let mut workflow = workflow(MockTogglRepository::new(), MockNotifier::new(), &dir, false);
        workflow.config.api_key = None;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let (prompt, items) = runtime.block_on(async {
            (
                workflow.tell("").await.unwrap(),
                workflow.tell("abc123").await.unwrap(),
            )
        });

        assert_eq!(titles(&prompt), ["First things first..."]);
        assert_eq!(items[0].arg.as_deref(), Some("set_key|abc123"));
    }

    #[tokio::test]
    async fn test_do_start_notifies() {
        let dir = tempdir().unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_start_time_entry()
            .withf(|description| description == "write docs")
            .times(1)
            .returning(|description| Ok(entry(9, description, now(), None)));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_set_active_timer()
            .withf(|id, description| *id == 9 && description == "write docs")
            .times(1)
            .returning(|_, _| Ok(()));
        let mut workflow = workflow(toggl, notifier, &dir, true);

        let message = workflow.do_action("start|write docs").await.unwrap();

        assert_eq!(message, "Started write docs");
    }

    #[tokio::test]
    async fn test_do_continue_ignores_notifier_failure() {
        let dir = tempdir().unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_start_time_entry()
            .withf(|description| description == "a|b")
            .returning(|description| Ok(entry(10, description, now(), None)));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_set_active_timer()
            .returning(|_, _| Err(anyhow!("osascript not found")));
        let mut workflow = workflow(toggl, notifier, &dir, true);

        let message = workflow.do_action("continue|3|a|b").await.unwrap();

        assert_eq!(message, "Continued a|b");
    }

    #[tokio::test]
    async fn test_do_stop() {
        let dir = tempdir().unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_stop_time_entry()
            .withf(|workspace_id, id| *workspace_id == 77 && *id == 2)
            .times(1)
            .returning(|_, id| Ok(entry(id, "coding", now(), Some(60))));
        let mut notifier = MockNotifier::new();
        notifier.expect_timer_stopped().times(0);
        let mut workflow = workflow(toggl, notifier, &dir, false);

        let message = workflow.do_action("stop|77|2|coding").await.unwrap();
        let invalid = workflow.do_action("stop|77|x|coding").await;

        assert_eq!(message, "Stopped coding");
        assert!(invalid.is_err());
    }

    #[tokio::test]
    async fn test_do_set_and_clear_key() {
        let dir = tempdir().unwrap();
        let mut notifier = MockNotifier::new();
        notifier.expect_quit().times(1).returning(|| Ok(()));
        let mut workflow = workflow(MockTogglRepository::new(), notifier, &dir, false);
        let config_path = dir.path().join("config.json");

        let set = workflow.do_action("set_key|new-key").await.unwrap();
        let stored = Config::load(&config_path).unwrap();
        let cleared = workflow.do_action("clear_key").await.unwrap();

        assert_eq!(set, "Your key has been set!");
        assert_eq!(stored.api_key.as_deref(), Some("new-key"));
        assert_eq!(cleared, "Cleared API key");
        assert_eq!(Config::load(&config_path).unwrap().api_key, None);
        assert!(workflow.do_action("set_key| ").await.is_err());
    }

    #[tokio::test]
    async fn test_do_toggle_notifier() {
        let dir = tempdir().unwrap();
        let mut notifier = MockNotifier::new();
        notifier.expect_activate().times(1).returning(|| Ok(()));
        notifier
            .expect_set_api_key()
            .withf(|api_key| api_key == "secret")
            .times(1)
            .returning(|_| Ok(()));
        notifier.expect_quit().times(1).returning(|| Ok(()));
        let mut workflow = workflow(MockTogglRepository::new(), notifier, &dir, false);
        let config_path = dir.path().join("config.json");

        let enabled = workflow.do_action("enable_notifier").await.unwrap();
        let stored = Config::load(&config_path).unwrap();
        let disabled = workflow.do_action("disable_notifier").await.unwrap();

        assert_eq!(enabled, "Notifier enabled");
        assert!(stored.use_notifier);
        assert_eq!(disabled, "Notifier disabled");
        assert!(!Config::load(&config_path).unwrap().use_notifier);
    }

    #[tokio::test]
    async fn test_do_unknown_command() {
        let dir = tempdir().unwrap();
        let mut workflow = workflow(MockTogglRepository::new(), MockNotifier::new(), &dir, false);

        let message = workflow.do_action("dance|now").await.unwrap();

        assert_eq!(message, "Unknown command \"dance\"");
    }

    #[tokio::test]
    async fn test_status() {
        let dir = tempdir().unwrap();
        let mut toggl = MockTogglRepository::new();
        toggl
            .expect_read_current_time_entry()
            .returning(|| Ok(Some(entry(2, "coding", now(), None))));
        let workflow = workflow(toggl, MockNotifier::new(), &dir, false);

        let current = workflow.status().await.unwrap();

        assert_eq!(current.map(|entry| entry.id), Some(2));
    }
}
