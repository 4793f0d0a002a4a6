use clap::{Args, Parser, Subcommand, ValueEnum};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use zonewalk::dictionary::{DictionaryMatcher, attach_matches, read_wordlist};
use zonewalk::dnssec::Nsec3Parameters;
use zonewalk::output::{OutputWriter, ZoneTextWriter, load_scan_result, save_scan_result};
use zonewalk::provider::{Denial, QueryProvider, RateLimitedProvider, StaticZone};
use zonewalk::scan::EXIT_FATAL;
use zonewalk::sink::JsonlSink;
use zonewalk::{DomainName, Result, ScanType, Scanner, WalkConfig, cancel_pair};

#[derive(Parser)]
#[command(name = "zonewalk", version, about = "Enumerate DNSSEC zones through their NSEC and NSEC3 chains")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a zone served from a listing file
    Walk(WalkArgs),
    /// Recover NSEC3 owner names of a saved scan from a word list
    Match(MatchArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum DenialKind {
    Nsec,
    Nsec3,
    None,
}

#[derive(Args)]
struct WalkArgs {
    /// Zone apex
    zone: String,

    /// Owner names of the zone, one per line with optional record types
    #[arg(short, long, value_name = "FILE")]
    listing: PathBuf,

    #[arg(long, value_enum, default_value = "nsec")]
    denial: DenialKind,

    /// NSEC3 hash iterations
    #[arg(long, default_value_t = 0)]
    iterations: u16,

    /// NSEC3 salt in hex, `-` for none
    #[arg(long, default_value = "-")]
    salt: String,

    /// auto, nsec or nsec3
    #[arg(long, default_value = "auto")]
    scan_type: ScanType,

    /// Write records in zone-file format here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Save the scan result as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Append scan rows to a JSON-lines file
    #[arg(long, value_name = "FILE")]
    sink: Option<PathBuf>,

    /// Maximum queries per second
    #[arg(long, value_name = "QPS")]
    rate_limit: Option<NonZeroU32>,

    /// Override the no-progress retry bound
    #[arg(long)]
    max_no_progress_retries: Option<u32>,

    /// Override the number of detection probes (0 = unlimited)
    #[arg(long)]
    detect_attempts: Option<u32>,
}

#[derive(Args)]
struct MatchArgs {
    /// Scan result written by `walk --json`
    scan: PathBuf,

    /// Candidate labels, one per line
    #[arg(short, long, value_name = "FILE")]
    wordlist: PathBuf,

    /// Blocking worker tasks (0 = available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Save the scan result with recovered names
    #[arg(long, value_name = "FILE")]
    write: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::from(EXIT_FATAL as u8);
        }
    };

    let outcome = match cli.command {
        Command::Walk(args) => walk(args, config).await,
        Command::Match(args) => run_match(args, config).await,
    };

    match outcome {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(EXIT_FATAL as u8)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<WalkConfig> {
    let mut config = match path {
        Some(path) => WalkConfig::from_file(path)?,
        None => WalkConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

async fn walk(args: WalkArgs, mut config: WalkConfig) -> Result<i32> {
    if let Some(retries) = args.max_no_progress_retries {
        config.max_no_progress_retries = retries;
    }
    if let Some(attempts) = args.detect_attempts {
        config.detect_attempts = attempts;
    }
    config.validate()?;

    let apex: DomainName = args.zone.parse()?;
    let denial = match args.denial {
        DenialKind::Nsec => Denial::Nsec,
        DenialKind::Nsec3 => Denial::Nsec3(Nsec3Parameters::sha1(
            args.iterations,
            Nsec3Parameters::parse_salt(&args.salt)?,
        )),
        DenialKind::None => Denial::None,
    };

    let listing = std::fs::read_to_string(&args.listing)?;
    let mut builder = StaticZone::builder(apex.clone(), denial);
    let names = builder.add_listing(&listing)?;
    info!("Loaded {} names for {} from {}", names, apex, args.listing.display());
    let zone = builder.build()?;

    let provider: Arc<dyn QueryProvider> = match args.rate_limit {
        Some(qps) => Arc::new(RateLimitedProvider::new(zone, qps)),
        None => Arc::new(zone),
    };

    let mut scanner = Scanner::new(provider, config);
    if let Some(path) = &args.sink {
        scanner = scanner.with_sink(Arc::new(JsonlSink::create(path)?));
    }

    let output: Box<dyn OutputWriter> = match &args.output {
        Some(path) => Box::new(ZoneTextWriter::create(path)?),
        None => Box::new(ZoneTextWriter::new(std::io::stdout())),
    };

    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current probe");
            handle.cancel();
        }
    });

    let result = scanner
        .run(&apex, args.scan_type, Some(output), token)
        .await?;

    if let Some(path) = &args.json {
        save_scan_result(&result, path)?;
    }
    Ok(result.exit_code())
}

async fn run_match(args: MatchArgs, mut config: WalkConfig) -> Result<i32> {
    if let Some(workers) = args.workers {
        config.dictionary_workers = workers;
    }
    config.validate()?;
    let workers = config.effective_workers();

    let mut result = load_scan_result(&args.scan)?;
    let words = read_wordlist(&args.wordlist)?;

    let matchers = DictionaryMatcher::from_scan(&result)?;
    if matchers.is_empty() {
        warn!("{} holds no NSEC3 records", args.scan.display());
    }

    let mut matches = Vec::new();
    for matcher in &matchers {
        info!(
            "Matching {} candidates against {} digests ({})",
            words.len(),
            matcher.digest_count(),
            matcher.parameters()
        );
        matches.extend(matcher.run(words.clone(), workers).await?);
    }

    for m in &matches {
        println!("{}\t{}", m.hashed_owner, m.name);
    }
    let updated = attach_matches(&mut result.records, &matches);
    info!("Recovered {} owner names", updated);

    if let Some(path) = &args.write {
        save_scan_result(&result, path)?;
    }
    Ok(0)
}
