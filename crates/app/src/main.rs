use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use services::{AppServices, Clock};

mod cli;
mod commands;
mod db;
mod runner;

use cli::{Cli, Command};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Open + migrate SQLite here so services stay storage-agnostic.
    let db_url = db::normalize_sqlite_url(&cli.db);
    db::prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system())
        .await
        .with_context(|| format!("opening {db_url}"))?;
    tracing::debug!(%db_url, "storage ready");

    let mut stdout = std::io::stdout();
    match cli.command {
        Command::Run(args) => {
            let mut engine = services.exam_engine();
            if let Some(seed) = args.seed {
                engine = engine.with_rng(StdRng::seed_from_u64(seed));
            }
            let count = usize::try_from(args.count).unwrap_or(usize::MAX);
            let stdin = BufReader::new(tokio::io::stdin());
            // One engine for the whole session so the attempt tracker carries
            // over between exams.
            runner::run_session(
                &mut engine,
                &args.filter(),
                count,
                args.time_limit(),
                stdin,
                &mut stdout,
            )
            .await?;
        }
        Command::History { limit } => commands::history(&services, limit, &mut stdout).await?,
        Command::Add { input } => commands::add(&services, &input, &mut stdout).await?,
        Command::Export { out } => commands::export(&services, &out, &mut stdout).await?,
        Command::Restore { input } => commands::restore(&services, &input, &mut stdout).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(err) = run(cli).await {
        // Binary glue: report once and exit.
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}
