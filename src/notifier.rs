use std::process::Command;

use anyhow::{bail, Context, Result};
use log::debug;

/// メニューバーのnotifierアプリの名前。
const NOTIFIER_APP: &str = "TogglNotifier";

/// タイマーの状態をnotifierアプリに伝えるためのtrait。
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    /// notifierアプリを起動する。
    fn activate(&self) -> Result<()>;

    /// notifierアプリを終了する。
    fn quit(&self) -> Result<()>;

    /// notifierアプリがTogglに問い合わせるためのAPIキーを設定する。
    fn set_api_key(&self, api_key: &str) -> Result<()>;

    /// 実行中のタイマーを伝える。
    fn set_active_timer(&self, id: i64, description: &str) -> Result<()>;

    /// タイマーが停止したことを伝える。
    fn timer_stopped(&self) -> Result<()>;
}

/// `osascript`でnotifierアプリにAppleScriptのメッセージを送る。
pub struct AppleScriptNotifier {
    app_name: String,
}

impl Default for AppleScriptNotifier {
    fn default() -> Self {
        Self {
            app_name: NOTIFIER_APP.to_string(),
        }
    }
}

impl AppleScriptNotifier {
    fn script(&self, command: &str) -> String {
        format!("tell application \"{}\" to {}", quote(&self.app_name), command)
    }

    fn run_script(&self, command: &str) -> Result<()> {
        let script = self.script(command);
        debug!("running script: {}", script);
        let output = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .context("Failed to run osascript")?;
        if !output.status.success() {
            bail!(
                "osascript exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

impl Notifier for AppleScriptNotifier {
    fn activate(&self) -> Result<()> {
        self.run_script("activate")
    }

    fn quit(&self) -> Result<()> {
        self.run_script("quit")
    }

    fn set_api_key(&self, api_key: &str) -> Result<()> {
        self.run_script(&format!("set api key to \"{}\"", quote(api_key)))
    }

    fn set_active_timer(&self, id: i64, description: &str) -> Result<()> {
        self.run_script(&format!(
            "set active timer to \"{}|{}\"",
            id,
            quote(description)
        ))
    }

    fn timer_stopped(&self) -> Result<()> {
        self.run_script("be stopped")
    }
}

/// AppleScriptの文字列リテラルに埋め込めるようにエスケープする。
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
