use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use log::{debug, LevelFilter};

/// ロガーを初期化する。
///
/// 標準出力はAlfredへの結果の出力に使うため、ログはファイルと標準エラー出力に書き込む。
///
/// # Arguments
///
/// * `level` - 出力するログレベル
/// * `log_file` - ログファイルのパス
pub fn initialize(level: LevelFilter, log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let colors = ColoredLevelConfig::new()
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    Dispatch::new()
        .level(level)
        .chain(
            Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "[{} - {}] {} [{}]",
                        Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message,
                        record.target(),
                    ))
                })
                .chain(file),
        )
        .chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    out.finish(format_args!(
                        "[{}] {}",
                        colors.color(record.level()),
                        message,
                    ))
                })
                .chain(std::io::stderr()),
        )
        .apply()
        .context("Failed to initialize logger")?;

    debug!("Logger initialized: level={}, file={}", level, log_file.display());

    Ok(())
}
