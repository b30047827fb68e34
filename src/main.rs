// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! browserk CLI
//!
//! Crawl a target, replay recorded paths, inspect the crawl database, or
//! run a full crawl + attack pass with a JSON report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use browserk::browser::{BrowserPool, ChromePool, Launcher, TabConfig};
use browserk::report::render_console_summary;
use browserk::{
    render_dot, render_navigations, render_summary, Config, Context, CrawlGraph, Id,
    MemoryReporter, PluginStore, Replayer, Reporter, ScanReport, Scanner,
};

#[derive(Parser)]
#[command(name = "browserk", version, about = "Browser-driven DAST engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the target without attacking it
    Crawl {
        #[command(flatten)]
        target: TargetArgs,
        /// Print the navigation graph in dot format afterwards
        #[arg(long)]
        dot: bool,
        /// Print per-state navigation counts afterwards
        #[arg(long)]
        summary: bool,
    },
    /// Replay the recorded path ending at a navigation
    Replay {
        #[command(flatten)]
        target: TargetArgs,
        /// Navigation id (hex)
        #[arg(long = "navID", value_name = "HEX")]
        nav_id: Option<String>,
        /// List navigations instead of replaying
        #[arg(long)]
        list: bool,
    },
    /// Summarise the crawl database
    Db {
        #[arg(long, default_value = "browserk_data")]
        datadir: PathBuf,
        /// List every navigation
        #[arg(long)]
        navs: bool,
    },
    /// Crawl, attack and report
    Run {
        #[command(flatten)]
        target: TargetArgs,
        /// Write a JSON report
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
        /// Crawl only, no active plugins
        #[arg(long)]
        crawl: bool,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Target URL
    #[arg(long)]
    url: Option<String>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Data directory for the crawl and plugin stores
    #[arg(long)]
    datadir: Option<PathBuf>,
    /// Log span timings
    #[arg(long)]
    profile: bool,
    #[arg(long)]
    numbrowsers: Option<usize>,
    #[arg(long)]
    maxdepth: Option<usize>,
}

impl TargetArgs {
    /// File values first, flags override
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(dir) = &self.datadir {
            config.data_path = dir.clone();
        }
        if let Some(n) = self.numbrowsers {
            config.num_browsers = n;
        }
        if let Some(depth) = self.maxdepth {
            config.max_depth = depth;
        }
        Ok(config.finalize()?)
    }
}

fn init_tracing(profile: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("browserk=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if profile {
        builder.with_span_events(FmtSpan::CLOSE).init();
    } else {
        builder.init();
    }
}

/// Cancel `token` on SIGINT; a second timer forces exit after the grace period
fn on_interrupt(token: CancellationToken, grace: std::time::Duration) -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!(grace_secs = grace.as_secs(), "interrupted, stopping");
        flag.store(true, Ordering::SeqCst);
        token.cancel();
        tokio::time::sleep(grace).await;
        error!("shutdown grace period elapsed");
        std::process::exit(1);
    });
    interrupted
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let profile = match &cli.command {
        Command::Crawl { target, .. } | Command::Replay { target, .. } | Command::Run { target, .. } => {
            target.profile
        }
        Command::Db { .. } => false,
    };
    init_tracing(profile);

    let outcome = match cli.command {
        Command::Crawl { target, dot, summary } => crawl(target, dot, summary).await,
        Command::Replay { target, nav_id, list } => replay(target, nav_id, list).await,
        Command::Db { datadir, navs } => db(datadir, navs),
        Command::Run { target, report, crawl } => run(target, report, crawl).await,
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn scan(config: Config, attack: bool) -> anyhow::Result<(Scanner, bool)> {
    let grace = config.timeouts.shutdown_grace();
    let scanner = Scanner::from_config(config, attack).context("initialising scanner")?;
    let interrupted = on_interrupt(scanner.context().cancel.clone(), grace);
    let summary = scanner.run().await;
    scanner.shutdown().await?;
    let summary = summary?;
    info!(
        paths = summary.paths,
        new_navs = summary.new_navs,
        attacks = summary.attacks,
        "done"
    );
    Ok((scanner, interrupted.load(Ordering::SeqCst)))
}

fn exit_code(interrupted: bool) -> ExitCode {
    if interrupted {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

async fn crawl(target: TargetArgs, dot: bool, summary: bool) -> anyhow::Result<ExitCode> {
    let config = target.config()?;
    let (scanner, interrupted) = scan(config, false).await?;
    let graph = &scanner.context().crawl;
    if dot {
        print!("{}", render_dot(graph)?);
    }
    if summary {
        print!("{}", render_summary(graph)?);
    }
    Ok(exit_code(interrupted))
}

async fn run(target: TargetArgs, report: Option<PathBuf>, crawl_only: bool) -> anyhow::Result<ExitCode> {
    let config = target.config()?;
    let started = Utc::now();
    let url = config.url.clone();
    let (scanner, interrupted) = scan(config, !crawl_only).await?;

    let ctx = scanner.context();
    let findings = ctx.reporter.reports()?;
    print!("{}", render_console_summary(&findings));
    if let Some(path) = report {
        ScanReport::build(&url, started, &ctx.crawl, findings)?
            .write(&path)
            .with_context(|| format!("writing report {}", path.display()))?;
    }
    Ok(exit_code(interrupted))
}

async fn replay(target: TargetArgs, nav_id: Option<String>, list: bool) -> anyhow::Result<ExitCode> {
    let config = target.config()?;
    let crawl = CrawlGraph::open_read_only(&config.crawl_db_path(), config.max_depth)
        .context("opening crawl database")?;
    let crawl = Arc::new(crawl);
    if list {
        print!("{}", render_navigations(&crawl)?);
        return Ok(ExitCode::SUCCESS);
    }
    let Some(hex) = nav_id else {
        bail!("replay needs --navID or --list");
    };
    let nav_id = Id::from_hex(&hex)?;

    let pool: Arc<dyn BrowserPool> = Arc::new(ChromePool::new(
        Arc::new(Launcher::new(config.browser.clone())),
        TabConfig::from_config(&config),
        1,
    ));
    let grace = config.timeouts.shutdown_grace();
    let ctx = Context::new(config, Arc::new(MemoryReporter::new()), crawl)?;
    let interrupted = on_interrupt(ctx.cancel.clone(), grace);

    let steps = Replayer::new(ctx, Arc::clone(&pool)).replay(&nav_id).await;
    pool.shutdown().await?;
    for (i, step) in steps?.iter().enumerate() {
        println!(
            "{:>2} {} -> {}{}",
            i + 1,
            step.navigation.describe(),
            step.result.end_url,
            if step.result.was_error {
                format!(" [{}]", step.result.errors.join("; "))
            } else {
                String::new()
            }
        );
        for nav in &step.discovered {
            println!("     + {} {}", nav.id.short(), nav.describe());
        }
    }
    Ok(exit_code(interrupted.load(Ordering::SeqCst)))
}

fn db(datadir: PathBuf, navs: bool) -> anyhow::Result<ExitCode> {
    let config = Config::default().data_path(datadir);
    let crawl_path = config.crawl_db_path();
    if !crawl_path.exists() {
        bail!("no crawl database at {}", crawl_path.display());
    }
    let graph = CrawlGraph::open_read_only(&crawl_path, config.max_depth)?;
    print!("{}", render_summary(&graph)?);
    if navs {
        print!("{}", render_navigations(&graph)?);
    }
    let plugin_path = config.plugin_db_path();
    if plugin_path.exists() {
        let store = PluginStore::open_read_only(&plugin_path)?;
        print!("{}", render_console_summary(&store.reports()?));
    }
    Ok(ExitCode::SUCCESS)
}
