// 🧹 Portfolio Dedup CLI - Run the duplicate merge jobs against a database

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use portfolio_dedup::{
    merge_duplicate_accounts, merge_duplicate_papers, MergeStats, DEFAULT_BATCH_SIZE,
    DEFAULT_PARALLELISM,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Papers,
    Accounts,
    All,
}

struct Config {
    db_path: PathBuf,
    job: Job,
    batch_size: usize,
    parallelism: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = parse_args(env::args().skip(1).collect())?;

    println!("🧹 Portfolio Dedup v{}", portfolio_dedup::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  database:    {}", config.db_path.display());
    println!("  batch size:  {}", config.batch_size);
    println!("  parallelism: {}", config.parallelism);

    let mut total = MergeStats::default();

    if config.job == Job::Papers || config.job == Job::All {
        println!("\n📈 Merging duplicate security papers...");
        let stats =
            merge_duplicate_papers(&config.db_path, config.batch_size, config.parallelism)
                .context("merging duplicate security papers failed")?;
        println!("✓ papers: {} merged, {} not merged", stats.merged, stats.not_merged);
        total += stats;
    }

    if config.job == Job::Accounts || config.job == Job::All {
        println!("\n🏦 Merging duplicate accounts...");
        let stats =
            merge_duplicate_accounts(&config.db_path, config.batch_size, config.parallelism)
                .context("merging duplicate accounts failed")?;
        println!("✓ accounts: {} merged, {} not merged", stats.merged, stats.not_merged);
        total += stats;
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Done: {} merged, {} not merged", total.merged, total.not_merged);

    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Config> {
    let mut db_path: Option<PathBuf> = None;
    let mut job = Job::All;
    let mut batch_size = DEFAULT_BATCH_SIZE;
    let mut parallelism = DEFAULT_PARALLELISM;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--batch-size" => {
                let value = iter.next().context("--batch-size needs a value")?;
                batch_size = value.parse().context("--batch-size must be a number")?;
            }
            "--parallelism" => {
                let value = iter.next().context("--parallelism needs a value")?;
                parallelism = value.parse().context("--parallelism must be a number")?;
            }
            "papers" => job = Job::Papers,
            "accounts" => job = Job::Accounts,
            "all" => job = Job::All,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if db_path.is_none() && !other.starts_with('-') => {
                db_path = Some(PathBuf::from(other));
            }
            other => bail!("unknown argument: {}", other),
        }
    }

    let Some(db_path) = db_path else {
        print_usage();
        bail!("missing database path");
    };
    Ok(Config {
        db_path,
        job,
        batch_size,
        parallelism,
    })
}

fn print_usage() {
    eprintln!("Usage: portfolio-dedup <DB_PATH> [papers|accounts|all]");
    eprintln!("  --batch-size N    entities per worker batch (default {})", DEFAULT_BATCH_SIZE);
    eprintln!("  --parallelism N   worker threads (default {})", DEFAULT_PARALLELISM);
}
