use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use driveconv::config::RunConfig;
use driveconv::credentials::TokenProvider;
use driveconv::provision::{provision, snapshot};
use driveconv::remote::{RemoteDrive, UploadConverter};
use driveconv::store::StateStore;
use driveconv::trace::SheetTrace;
use driveconv::traverse::engine::TraversalEngine;
use driveconv::traverse::queue::FolderQueue;
use driveconv::traverse::stack::FolderStack;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Provision(Vec<String>),
    Run,
    Status { json: bool },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(CliMode::Help);
    };
    let rest: Vec<String> = args.collect();
    let mode = match command.as_str() {
        "--help" | "-h" | "help" => CliMode::Help,
        "provision" => {
            if rest.is_empty() {
                anyhow::bail!("provision needs at least one folder URL or ID");
            }
            CliMode::Provision(rest)
        }
        "status" => match rest.as_slice() {
            [] => CliMode::Status { json: false },
            [flag] if flag == "--json" => CliMode::Status { json: true },
            [other, ..] => anyhow::bail!("unexpected argument: {other}"),
        },
        "run" if !rest.is_empty() => anyhow::bail!("unexpected argument: {}", rest[0]),
        "run" => CliMode::Run,
        other => anyhow::bail!("unknown argument: {other}"),
    };
    Ok(mode)
}

fn init_logging() {
    let filter = std::env::var("DRIVECONV_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_help() {
    println!("Usage: driveconv <command>");
    println!("  provision <folder>...   Queue folder URLs or IDs for traversal");
    println!("  run                     Walk queued folders, resuming any interrupted run");
    println!("  status [--json]         Show queued and staged folders");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        print_help();
        return Ok(());
    }

    let config = RunConfig::from_env()?;
    let state = StateStore::open_path(&config.state_db)
        .await
        .with_context(|| format!("failed to open state at {}", config.state_db.display()))?;

    let result = match mode {
        CliMode::Provision(locators) => provision(&state, &locators)
            .await
            .map(|added| println!("queued {added} folder(s)"))
            .context("failed to provision folder queue"),
        CliMode::Status { json } => print_status(&state, json).await,
        CliMode::Run => run(&config, &state).await,
        CliMode::Help => Ok(()),
    };
    state.close().await;
    result
}

async fn print_status(state: &StateStore, json: bool) -> anyhow::Result<()> {
    let snapshot = snapshot(state).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    println!("queued folders: {}", snapshot.queued.len());
    for locator in &snapshot.queued {
        println!("  {locator}");
    }
    println!("folder stack (\"> \" marks folders in progress): {}", snapshot.staged.len());
    for folder_id in &snapshot.staged {
        println!("  {folder_id}");
    }
    Ok(())
}

async fn run(config: &RunConfig, state: &StateStore) -> anyhow::Result<()> {
    let queue = FolderQueue::open(state).await?;
    let stack = FolderStack::open(state).await?;
    if queue.is_empty().await? && stack.is_empty().await? {
        info!("nothing queued; add folders with `driveconv provision <folder>`");
        return Ok(());
    }

    let mut tokens = TokenProvider::from_env()?;
    let token = tokens
        .valid_access_token()
        .await
        .context("failed to obtain an access token")?;
    let drive = RemoteDrive::new(config.drive_client(token)?).with_page_size(config.page_size);
    let converter = UploadConverter::new(drive.clone());
    let (trace, trace_path) = SheetTrace::create_in(&config.trace_dir)
        .with_context(|| format!("failed to create trace in {}", config.trace_dir.display()))?;
    info!(
        trace = %trace_path.display(),
        convert = config.convert,
        "starting traversal"
    );

    let mut engine =
        TraversalEngine::new(drive, converter, trace, queue, stack, config.engine_config());
    tokio::select! {
        result = engine.run() => {
            result.context("traversal failed; run again to resume")?;
        }
        _ = budget_elapsed(config.max_runtime) => {
            warn!("runtime budget exhausted; progress is saved, run again to continue");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; progress is saved, run again to continue");
        }
    }
    Ok(())
}

async fn budget_elapsed(budget: Option<Duration>) {
    match budget {
        Some(budget) => tokio::time::sleep(budget).await,
        None => std::future::pending().await,
    }
}
