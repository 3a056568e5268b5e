

use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use bulkops::accounts::{AccountAction, AccountActionResponse, AccountOperation, AccountsClient};
use bulkops::core::batch::{BatchCallbacks, BatchScheduler, BatchSummary, WithTimeout};
use bulkops::core::guard::{
    bind, detach, take_interrupted, FileMarkerStore, MarkerStore, ReloadGuard, UnloadDecision,
};
use bulkops::BulkOpsConfig;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct Args {
    action: Option<String>,
    ids: Vec<String>,
    batch_size: Option<usize>,
    delay_ms: Option<u64>,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let args: Vec<String> = env::args().collect();

    let mut parsed = Args {
        action: None,
        ids: Vec::new(),
        batch_size: None,
        delay_ms: None,
        config: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--batch-size" | "-b" => {
                let value = args.get(i + 1).context("--batch-size needs a value")?;
                parsed.batch_size = Some(value.parse().context("invalid --batch-size")?);
                i += 1;
            }
            "--delay-ms" | "-d" => {
                let value = args.get(i + 1).context("--delay-ms needs a value")?;
                parsed.delay_ms = Some(value.parse().context("invalid --delay-ms")?);
                i += 1;
            }
            "--config" | "-c" => {
                let value = args.get(i + 1).context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(value));
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            arg if parsed.action.is_none() => parsed.action = Some(arg.to_string()),
            arg => parsed.ids.push(arg.to_string()),
        }
        i += 1;
    }

    Ok(Some(parsed))
}

fn read_ids_from_stdin() -> anyhow::Result<Vec<String>> {
    let mut ids = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

fn callbacks() -> BatchCallbacks<String, AccountActionResponse> {
    BatchCallbacks::<String, AccountActionResponse>::new()
        .on_batch_start(|ids: &[String]| info!("Starting batch: {}", ids.join(", ")))
        .on_item_complete(|id: &String, result| {
            if let Some(response) = result.data() {
                info!("{} {}: {}", response.action, id, response.message);
            }
        })
        .on_error(|err, id: &String| warn!("{} failed: {}", id, err))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,bulkops=info")),
        )
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let action_name = args.action.context("missing action; see --help")?;
    let action = AccountAction::from_str(&action_name)
        .with_context(|| format!("unknown action '{}'", action_name))?;

    let mut config = BulkOpsConfig::load(args.config.as_deref())?;
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.delay_between_batches_ms = delay_ms;
    }
    config.validate()?;

    let ids = if args.ids.is_empty() {
        read_ids_from_stdin()?
    } else {
        args.ids
    };
    let expected = ids.len();

    let store: Arc<dyn MarkerStore> = Arc::new(FileMarkerStore::new(&config.marker_dir));
    if let Some(marker) = take_interrupted(store.as_ref(), config.interrupted_marker_max_age()) {
        warn!(
            "The previous run was interrupted at {}; some accounts may not have been processed",
            marker.timestamp
        );
    }

    let client = Arc::new(AccountsClient::from_config(&config)?);
    let operation = WithTimeout::new(AccountOperation::new(client, action), config.request_timeout());
    let scheduler = BatchScheduler::new(operation, config.batch_config())?.with_callbacks(callbacks());
    let cancel = scheduler.cancel_handle();

    let guard = Arc::new(ReloadGuard::new(store));
    let mut binding = Some(bind(Arc::clone(&guard), scheduler.subscribe()));

    let results = {
        let run = scheduler.process(ids);
        tokio::pin!(run);
        let mut prompted = false;

        loop {
            tokio::select! {
                results = &mut run => break results,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    if !prompted && guard.handle_before_unload() == UnloadDecision::Prompt {
                        prompted = true;
                        eprintln!("Work in progress. Press Ctrl-C again to stop after the current batch.");
                        continue;
                    }
                    // Keep the interruption marker for the next run.
                    if let Some(binding) = binding.take() {
                        detach(binding).await;
                    }
                    cancel.cancel();
                }
            }
        }
    };

    drop(cancel);
    drop(scheduler);
    if let Some(binding) = binding {
        let _ = binding.await;
    }

    let summary = BatchSummary::from_results(&results, expected);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.is_complete() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_help() {
    println!("bulkops - run an account action over many accounts in batches");
    println!();
    println!("USAGE:");
    println!("    bulkops <login|sync|delete> [ACCOUNT_ID...] [OPTIONS]");
    println!();
    println!("Account ids are read from stdin, one per line, when none are given.");
    println!();
    println!("OPTIONS:");
    println!("    -b, --batch-size <N>    Accounts per batch (default: 5)");
    println!("    -d, --delay-ms <MS>     Pause between batches (default: 0)");
    println!("    -c, --config <PATH>     Configuration file");
    println!("    -h, --help              Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    BULKOPS_API_BASE_URL, BULKOPS_ACCESS_TOKEN, BULKOPS_BATCH_SIZE, ...");
    println!("    RUST_LOG                Log filter (default: warn,bulkops=info)");
}
