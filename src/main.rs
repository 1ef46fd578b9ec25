//! Binary entry point: opens the corpus database and dispatches one
//! subcommand. Logs go to stderr so composed songs can be piped from stdout.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use rhymadex::config::default_db_path;
use rhymadex::{
    compose_song_book, delete_source, ingest_file, list_sources, open_store, run_browser,
    CmuDictOracle, ComposerConfig, RhymePoolBuilder, SongTemplate,
};

/// Build a rhyme-linked line corpus and compose songs from it.
#[derive(Parser)]
#[command(name = "rhymadex", version)]
struct Cli {
    /// Corpus database to use instead of ~/.rhymadex/rhymadex.sqlite
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest text files, replacing any earlier lines of the same sources
    Ingest {
        /// CMU pronouncing dictionary used for rhymes and syllable counts
        #[arg(long)]
        dict: PathBuf,
        /// Source name; defaults to the file stem. Only valid with one file
        #[arg(long)]
        name: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate a song book from a JSON template
    Compose {
        template: PathBuf,
        /// Maximum number of rhyme pool combinations to try
        #[arg(long)]
        pools: Option<usize>,
        /// Attempts per pool combination
        #[arg(long)]
        variations: Option<usize>,
        /// Quota multiplier applied to each rhyme group's occurrence count
        #[arg(long)]
        multiplier: Option<u32>,
        /// Allowed syllable distance from each slot's target
        #[arg(long)]
        tolerance: Option<u32>,
        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
        /// Browse the result in the terminal instead of printing it
        #[arg(long)]
        browse: bool,
    },
    /// List ingested sources with their line counts
    Sources,
    /// Delete a source and all of its lines
    RemoveSource { name: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rhymadex=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    let conn = open_store(&db_path)?;

    match cli.command {
        Command::Ingest { dict, name, files } => run_ingest(&conn, &dict, name.as_deref(), &files),
        Command::Compose {
            template,
            pools,
            variations,
            multiplier,
            tolerance,
            seed,
            browse,
        } => {
            let mut config = ComposerConfig::default();
            if let Some(pools) = pools {
                config.max_pool_combinations = pools;
            }
            if let Some(variations) = variations {
                config.variations_per_combination = variations;
            }
            if let Some(multiplier) = multiplier {
                config.quota_multiplier = multiplier;
            }
            if let Some(tolerance) = tolerance {
                config.syllable_tolerance = tolerance;
            }
            config.seed = seed;
            run_compose(&conn, &template, &config, browse)
        }
        Command::Sources => {
            for summary in list_sources(&conn)? {
                println!(
                    "{}\t{} lines\t{}",
                    summary.source.name, summary.line_count, summary.source.created_at
                );
            }
            Ok(())
        }
        Command::RemoveSource { name } => {
            if !delete_source(&conn, &name)? {
                bail!("no source named \"{name}\"");
            }
            println!("removed {name}");
            Ok(())
        }
    }
}

fn run_ingest(
    conn: &Connection,
    dict: &Path,
    name: Option<&str>,
    files: &[PathBuf],
) -> Result<()> {
    if name.is_some() && files.len() > 1 {
        bail!("--name can only be used with a single file");
    }

    let oracle = CmuDictOracle::load(dict)?;
    let builder = RhymePoolBuilder::load(conn, &oracle, &oracle)?;

    for path in files {
        let report = ingest_file(conn, &builder, path, name)?;
        let rejected = report.rejected;
        println!(
            "{}: {} accepted, {} rejected (empty {}, too long {}, too short {}, unrhymeable {}, duplicate {}), {} previous lines removed",
            path.display(),
            report.accepted,
            rejected.total(),
            rejected.empty,
            rejected.too_long,
            rejected.too_short,
            rejected.unrhymeable,
            rejected.duplicate,
            report.removed_previous,
        );
    }

    let stats = builder.stats()?;
    tracing::info!(
        oracle_calls = stats.oracle_calls,
        pools_created = stats.pools_created,
        known_words = stats.known_words,
        "rhyme pools updated"
    );
    Ok(())
}

fn run_compose(
    conn: &Connection,
    template_path: &Path,
    config: &ComposerConfig,
    browse: bool,
) -> Result<()> {
    let json = fs::read_to_string(template_path)
        .with_context(|| format!("failed to read {}", template_path.display()))?;
    let template = SongTemplate::from_json(&json)
        .with_context(|| format!("failed to parse template {}", template_path.display()))?;

    // First Ctrl-C stops after the current attempt and keeps the songs so
    // far. A second one exits at once.
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .context("failed to install Ctrl-C handler")?;
    let book = compose_song_book(conn, &template, config, &cancel)?;

    if browse {
        return run_browser(&book);
    }
    for (i, song) in book.songs.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{song}");
    }
    Ok(())
}
