use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use seed_sieve::error::{Result, SieveError};
use seed_sieve::index::SampleIndex;
use seed_sieve::mcs::Mcs;
use seed_sieve::search::{write_results, KMismatchSearch};
use seed_sieve::utils::{cputime, read_queries, read_text, realtime};

#[derive(Parser)]
#[command(name = "seed-sieve")]
#[command(about = "Approximate string matching under Hamming distance", long_about = None)]
#[command(version)]
struct Cli {
    /// Text file to search in ("-" for stdin, .gz accepted)
    #[arg(short = 't', long = "text", value_name = "FILE")]
    text: PathBuf,

    /// Queries file, one query per line (.gz accepted)
    #[arg(short = 'q', long = "queries", value_name = "FILE")]
    queries: PathBuf,

    /// Maximum number of mismatches allowed
    #[arg(short = 'm', long = "mismatches", value_name = "INT")]
    mismatches: usize,

    /// Load a previously saved MCS instead of building one
    #[arg(long = "load-mcs", value_name = "FILE")]
    load_mcs: Option<PathBuf>,

    /// Load a previously saved index (requires --load-mcs)
    #[arg(long = "load-index", value_name = "FILE")]
    load_index: Option<PathBuf>,

    /// Save the MCS after the search
    #[arg(long = "save-mcs", value_name = "FILE")]
    save_mcs: Option<PathBuf>,

    /// Save the index after the search
    #[arg(long = "save-index", value_name = "FILE")]
    save_index: Option<PathBuf>,

    /// Write results here instead of stdout
    #[arg(long = "save-results", value_name = "FILE")]
    save_results: Option<PathBuf>,

    /// Number of threads (default: all available cores)
    #[arg(long, value_name = "INT")]
    threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    // Exit 1 on usage errors (clap defaults to 2); help and version stay 0.
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(if e.use_stderr() { 1 } else { 0 });
    });

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.load_index.is_some() && cli.load_mcs.is_none() {
        return Err(SieveError::InvalidArgument(
            "--load-index requires --load-mcs: an index is only valid for the MCS that built it"
                .into(),
        ));
    }

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| SieveError::InvalidArgument(format!("thread pool: {e}")))?;
        log::info!("Using {} threads", threads);
    }

    let start_real = realtime();
    let start_cpu = cputime();

    let text = read_text(&cli.text)?;
    let queries = read_queries(&cli.queries)?;
    log::info!(
        "Read {} bytes of text and {} queries",
        text.len(),
        queries.len()
    );

    let mut search = if let Some(mcs_path) = &cli.load_mcs {
        let mcs = Mcs::load(mcs_path)?;
        log::info!("Loaded MCS with {} forms", mcs.forms().len());
        if let Some(index_path) = &cli.load_index {
            let index = SampleIndex::load(index_path)?;
            log::info!("Loaded index with {} keys", index.len());
            KMismatchSearch::with_mcs_and_index(text, queries, mcs, index)
        } else {
            KMismatchSearch::with_mcs(text, queries, mcs)
        }
    } else {
        let search = KMismatchSearch::new(text, queries, cli.mismatches)?;
        log::info!("Built MCS with {} forms", search.mcs().forms().len());
        search
    };

    let result = search.mcs_search(cli.mismatches);

    if let Some(path) = &cli.save_mcs {
        search.mcs().save(path)?;
        log::info!("Saved MCS to {}", path.display());
    }
    if let Some(path) = &cli.save_index {
        search.index().save(path)?;
        log::info!("Saved index to {}", path.display());
    }

    match &cli.save_results {
        Some(path) => {
            let file = File::create(path).map_err(|e| SieveError::io(path, e))?;
            let mut out = BufWriter::new(file);
            write_results(&result, &mut out)
                .and_then(|()| out.flush())
                .map_err(|e| SieveError::io(path, e))?;
        }
        None => {
            let stdout = io::stdout().lock();
            let mut out = BufWriter::new(stdout);
            write_results(&result, &mut out)
                .and_then(|()| out.flush())
                .map_err(|e| SieveError::io(std::path::Path::new("<stdout>"), e))?;
        }
    }

    log::info!(
        "Matched {} queries in {:.2} sec real, {:.2} sec CPU",
        result.len(),
        realtime() - start_real,
        cputime() - start_cpu
    );
    Ok(())
}
