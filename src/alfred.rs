use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

/// 合計時間などの見出しの下に表示する区切り線。
pub const LINE: &str = "────────────────────────────────────────";

/// Alfredのscript filterの結果に表示する1行。
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Icon {
    pub path: String,
}

impl Item {
    /// 選択できない`Item`を返す。
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// エラーを表示する`Item`を返す。
    pub fn error(error: &anyhow::Error) -> Self {
        Self::new("Error").subtitle(format!("{:#}", error))
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// 選択時にアクションへ渡す引数を設定し、選択可能にする。
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self.valid = true;
        self
    }

    pub fn autocomplete(mut self, autocomplete: impl Into<String>) -> Self {
        self.autocomplete = Some(autocomplete.into());
        self
    }

    pub fn icon(mut self, path: impl Into<String>) -> Self {
        self.icon = Some(Icon { path: path.into() });
        self
    }
}

/// Alfredに結果を表示するためのtrait。
pub trait AlfredPresenter {
    /// 結果の一覧を表示する。
    ///
    /// # Arguments
    ///
    /// * `items` - 表示する結果
    fn show_items(&mut self, items: &[Item]) -> Result<()>;
}

/// 結果をscript filterのJSON形式で出力する。
pub struct AlfredJson<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> AlfredJson<'a, W> {
    /// 新しい`AlfredJson`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

#[derive(Serialize)]
struct ScriptFilter<'a> {
    items: &'a [Item],
}

impl<'a, W: Write> AlfredPresenter for AlfredJson<'a, W> {
    fn show_items(&mut self, items: &[Item]) -> Result<()> {
        serde_json::to_writer(&mut *self.writer, &ScriptFilter { items })
            .context("Failed to write script filter items")?;
        writeln!(self.writer).context("Failed to write script filter items")?;
        Ok(())
    }
}

/// タイトルにクエリの文字が順番通りに含まれる`Item`だけを残す。
///
/// 大文字小文字は区別しない。連続して一致するもの、単語の先頭で一致するものほど前に並ぶ。
pub fn fuzzy_filter(query: &str, items: Vec<Item>) -> Vec<Item> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items;
    }

    let mut scored: Vec<(i64, Item)> = items
        .into_iter()
        .filter_map(|item| fuzzy_score(&query, &item.title).map(|score| (score, item)))
        .collect();
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
    scored.into_iter().map(|(_, item)| item).collect()
}

fn fuzzy_score(query: &str, title: &str) -> Option<i64> {
    let title: Vec<char> = title.to_lowercase().chars().collect();
    let mut score = 0;
    let mut position = 0;
    let mut previous: Option<usize> = None;

    for wanted in query.chars() {
        let found = (position..title.len()).find(|&i| title[i] == wanted)?;
        score += 1;
        if previous.map(|p| p + 1 == found).unwrap_or(false) {
            score += 2;
        }
        if found == 0 || !title[found - 1].is_alphanumeric() {
            score += 3;
        }
        previous = Some(found);
        position = found + 1;
    }

    Some(score)
}
