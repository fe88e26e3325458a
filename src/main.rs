use anyhow::{Context, Result};
use clap::Parser;
use recent_games::apptweak::rest::AppTweakRest;
use recent_games::catalog::{Catalog, RunParameters};
use recent_games::config::Config;
use recent_games::export;
use recent_games::pacing::{FixedDelay, NoDelay, Pacer};
use recent_games::pipeline::Pipeline;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "recent-games",
    about = "Export the top free iPhone games released in the last 9 months",
    version,
    long_about = None
)]
struct Args {
    /// Country name or two-letter code (menu if omitted)
    country: Option<String>,

    /// Game category name or genre id (menu if omitted)
    category: Option<String>,

    /// Path to config file (default: ./config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the CSV export (overrides export.output_dir)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Skip the pause between requests (only for mock endpoints)
    #[arg(long)]
    no_delay: bool,
}

/// Numbered menu on stdin; returns the chosen index.
fn choose(label: &str, options: &[&str]) -> Result<usize> {
    println!();
    println!("  {}:", label);
    for (i, name) in options.iter().enumerate() {
        println!("    {:>2}) {}", i + 1, name);
    }
    print!("  {} > ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let input = input.trim();
    match input.parse::<usize>() {
        Ok(n) if (1..=options.len()).contains(&n) => Ok(n - 1),
        _ => options
            .iter()
            .position(|o| o.eq_ignore_ascii_case(input))
            .with_context(|| format!("'{}' is not a valid choice", input)),
    }
}

fn select_params(catalog: &Catalog, args: &Args) -> Result<RunParameters> {
    let country = match &args.country {
        Some(q) => q.clone(),
        None => {
            let names: Vec<&str> = catalog.countries().iter().map(|c| c.name.as_str()).collect();
            names[choose("Select country", &names)?].to_string()
        }
    };
    let category = match &args.category {
        Some(q) => q.clone(),
        None => {
            let names: Vec<&str> = catalog.categories().iter().map(|c| c.name.as_str()).collect();
            names[choose("Select game category", &names)?].to_string()
        }
    };
    catalog.params(&country, &category)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recent_games=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    // Load saved key from .env (real env vars take precedence)
    Config::load_env_file();

    println!();
    println!("  iOS Top Free Games: releases in the last {} days", config.pipeline.window_days);
    println!("  ==================================================");

    let catalog = Catalog::builtin();
    let params = select_params(&catalog, &args)?;
    let api_key = Config::api_key()?;

    let api = AppTweakRest::new(&api_key, &config.apptweak)?;
    let pacer: Box<dyn Pacer> = if args.no_delay {
        Box::new(NoDelay)
    } else {
        Box::new(FixedDelay::from_millis(config.pipeline.request_delay_ms))
    };
    let mut pipeline = Pipeline::new(api, pacer, config.pipeline.clone(), config.apptweak.device.clone())?;

    println!();
    println!(
        "  Fetching top {} free {} games for {} ...",
        config.pipeline.max_apps, params.category.name, params.country.name
    );

    let report = pipeline.run(&params).await?;

    let out_dir = args.out.unwrap_or_else(|| config.export.output_dir.clone());
    let path = export::export(&out_dir, &params, &report.rows)?;

    println!();
    println!("  Finished!");
    println!("  Start: {}", report.started_at.format("%H:%M:%S"));
    println!("  End: {}", report.finished_at.format("%H:%M:%S"));
    println!("  Total Time: {} seconds", report.elapsed.as_secs());
    println!();
    println!(
        "  Found {} games released in last 9 months ({} skipped pages, {} skipped batches).",
        report.rows.len(),
        report.stats.pages_skipped,
        report.stats.batches_skipped
    );
    println!("  Saved to {}", path.display());

    Ok(())
}
