use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::error;

mod alfred;
mod cache;
mod config;
mod date_query;
mod datetime;
mod effort;
mod logger;
mod notifier;
mod time_entry;
mod toggl;
mod workflow;

use alfred::{AlfredJson, AlfredPresenter, Item};
use cache::Cache;
use config::{Config, WorkflowDirs};
use notifier::AppleScriptNotifier;
use toggl::TogglClient;
use workflow::TogglWorkflow;

/// Toggl Alfred workflow.
///
/// # Examples
/// ```
/// $ alfred-toggl tell "/"
/// $ alfred-toggl tell "<yesterday"
/// $ alfred-toggl do "start|write docs"
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Print script filter results for a query
    Tell {
        #[clap(default_value = "")]
        query: String,
    },
    /// Run the action of a selected result
    #[clap(name = "do")]
    Do { action: String },
    /// Print the running time entry as JSON
    Status,
}

type Workflow = TogglWorkflow<TogglClient, AppleScriptNotifier>;

/// 設定を読み込み、ワークフローを組み立てる。
fn build_workflow(dirs: &WorkflowDirs) -> Result<Workflow> {
    let config = Config::load(&dirs.config_file())?;
    logger::initialize(config.level_filter(), &dirs.log_file())?;

    let toggl = TogglClient::new(
        &config.api_key().unwrap_or_default(),
        config.workspace_id,
    );
    let cache = Cache::load(&dirs.cache_file());
    Ok(TogglWorkflow::new(
        toggl,
        AppleScriptNotifier::default(),
        config,
        cache,
        dirs.log_file(),
    ))
}

/// script filterの結果を表示する。エラーの場合はエラーの`Item`を表示する。
fn show_results<P: AlfredPresenter>(presenter: &mut P, result: Result<Vec<Item>>) -> Result<()> {
    let items = result.unwrap_or_else(|e| {
        error!("{:?}", e);
        vec![Item::error(&e)]
    });
    presenter.show_items(&items)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 設定の読み込みに失敗した場合もAlfredに結果を返す
    let workflow = WorkflowDirs::from_env().and_then(|dirs| build_workflow(&dirs));

    match args.subcommand {
        SubCommands::Tell { query } => {
            let result = match workflow {
                Ok(mut workflow) => workflow.tell(&query).await,
                Err(e) => Err(e),
            };
            let mut stdout = io::stdout().lock();
            show_results(&mut AlfredJson::new(&mut stdout), result)?;
        }
        SubCommands::Do { action } => {
            let result = match workflow {
                Ok(mut workflow) => workflow.do_action(&action).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(message) => println!("{}", message),
                Err(e) => {
                    error!("{:?}", e);
                    println!("Error: {:#}", e);
                    return Err(e);
                }
            }
        }
        SubCommands::Status => {
            let current = workflow?.status().await?;
            let status = match current {
                Some(entry) => serde_json::json!({
                    "running": true,
                    "id": entry.id,
                    "description": entry.description,
                    "start": entry.start,
                }),
                None => serde_json::json!({ "running": false }),
            };
            println!("{}", status);
        }
    }

    Ok(())
}
