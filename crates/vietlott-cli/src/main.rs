mod config;
mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vietlott_core::{evaluate_rules, is_sorted, load_rules_or_empty, sort_draws};
use vietlott_store::DatasetStore;
use vietlott_sync::{DrawClient, LogNotifier, Notifier, WebhookNotifier, crawl, dispatch_alerts};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "vietlott", version, about = "Scrape Vietlott draw results and watch non-big-win streaks")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "VIETLOTT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding `<game>.jsonl` datasets.
    #[arg(long, global = true, env = "VIETLOTT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch result pages and merge new draws into the dataset.
    Crawl {
        #[arg(long)]
        game: String,
        /// Newest page to fetch (0 is the latest results page).
        #[arg(long, default_value_t = 0)]
        from: u32,
        /// Oldest page to fetch, inclusive. Defaults to the game's configured bound.
        #[arg(long)]
        to: Option<u32>,
    },
    /// Evaluate streak rules against the stored dataset and send alerts.
    Evaluate {
        #[arg(long)]
        game: String,
        /// Rule file (JSONL). Defaults to the configured rules path.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Log alerts instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },
    /// List known games.
    Games,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Command::Crawl { game, from, to } => run_crawl(&config, &game, from, to).await,
        Command::Evaluate {
            game,
            rules,
            dry_run,
        } => run_evaluate(&config, &game, rules, dry_run).await,
        Command::Games => {
            let games = config
                .game_names()
                .iter()
                .map(|name| config.game(name))
                .collect::<anyhow::Result<Vec<_>>>()?;
            print!("{}", display::render_games(&games));
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_crawl(
    config: &AppConfig,
    name: &str,
    from: u32,
    to: Option<u32>,
) -> anyhow::Result<()> {
    let game = config.game(name)?;
    let store = DatasetStore::for_game(&config.data_dir, &game);
    let client = DrawClient::new(config.http.timeout(), config.http.cookies.as_deref())
        .context("building HTTP client")?;

    info!(game = %game.name, "vietlott v{}", env!("CARGO_PKG_VERSION"));
    let report = crawl(Arc::new(client), &store, &game, from, to)
        .await
        .with_context(|| format!("crawling {}", game.name))?;
    print!("{}", display::render_merge_report(&report));
    Ok(())
}

async fn run_evaluate(
    config: &AppConfig,
    name: &str,
    rules: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let game = config.game(name)?;
    let store = DatasetStore::for_game(&config.data_dir, &game);
    let mut history = store
        .load()
        .with_context(|| format!("reading dataset {}", store.path().display()))?;
    if !is_sorted(&history) {
        warn!(path = %store.path().display(), "dataset out of order; sorting before evaluation");
        sort_draws(&mut history);
    }

    let rules = load_rules_or_empty(&rules.unwrap_or_else(|| config.rules_path()));
    let evaluations = evaluate_rules(&history, &rules, &config.streak.big_win_rule());

    let notifier: Box<dyn Notifier> = match (&config.notify.webhook_url, dry_run) {
        (Some(url), false) => Box::new(WebhookNotifier::new(url.clone(), config.notify.token())),
        _ => Box::new(LogNotifier),
    };
    let dispatch = dispatch_alerts(
        notifier.as_ref(),
        &config.notify.recipients,
        &game.name,
        &evaluations,
    )
    .await;

    print!(
        "{}",
        display::render_evaluations(&game.name, history.len(), &evaluations, dispatch)
    );
    Ok(())
}
