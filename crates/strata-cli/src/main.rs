//! strata: encrypted, deduplicating chunk repository CLI
//!
//! Commands:
//!   keygen                          - create the repository key file
//!   put <file|->                    - store a stream, print its root address and level
//!   get <address> --level N [-o F]  - reassemble a stream to a file or stdout
//!   verify <address> --level N      - decrypt and check every chunk of a stream
//!   count                           - number of stored chunks
//!   collection show <ns> <name>     - replay a collection
//!   config show                     - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use strata_chunks::ReaderByteSource;
use strata_core::config::StrataConfig;
use strata_core::Address;
use strata_crypto::RepositoryKeys;
use strata_repo::{Repository, StreamWriteResult};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Encrypted, deduplicating chunk repository",
    long_about = "strata: store byte streams as encrypted, content-addressed chunk trees"
)]
struct Cli {
    /// Path to strata.toml configuration file
    #[arg(long, short = 'c', env = "STRATA_CONFIG", default_value = "strata.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "STRATA_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "STRATA_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new key-encryption key and address key
    Keygen,

    /// Store a file (or stdin with `-`) as a chunk tree
    Put {
        /// Input path, `-` for stdin
        input: PathBuf,
    },

    /// Reassemble a stream from its root address
    Get {
        /// Root address (hex)
        address: Address,
        /// Root level printed by `put`
        #[arg(long, short = 'l')]
        level: usize,
        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Fetch, decrypt, and verify every chunk of a stream
    Verify {
        address: Address,
        #[arg(long, short = 'l')]
        level: usize,
    },

    /// Count stored chunks
    Count,

    /// Collection inspection
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum CollectionAction {
    /// Print the entries of a collection
    Show {
        namespace: String,
        name: String,
        /// Replay only up to this version
        #[arg(long)]
        version: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = read_config(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match &cli.log_format {
        Some(f) => f.clone(),
        None if config.log.format == "json" => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(&level, &format);
    if !found {
        warn!(path = %cli.config.display(), "config file not found (using defaults)");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Keygen => cmd_keygen(&config),
        Commands::Put { input } => cmd_put(&config, &input, &cancel).await,
        Commands::Get {
            address,
            level,
            output,
        } => cmd_get(&config, address, level, output.as_deref(), &cancel).await,
        Commands::Verify { address, level } => cmd_verify(&config, address, level, &cancel).await,
        Commands::Count => cmd_count(&config).await,
        Commands::Collection {
            action:
                CollectionAction::Show {
                    namespace,
                    name,
                    version,
                },
        } => cmd_collection_show(&config, &namespace, &name, version, &cancel).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

/// Load the config file, or defaults when it is absent. The second value
/// says whether a file was read; the caller warns once logging is up.
fn read_config(path: &Path) -> Result<(StrataConfig, bool)> {
    if !path.exists() {
        return Ok((StrataConfig::default(), false));
    }
    let config = StrataConfig::load(path)
        .with_context(|| format!("loading config: {}", path.display()))?;
    Ok((config, true))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `get` can stream plaintext to stdout
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_repository(config: &StrataConfig) -> Result<Repository> {
    Repository::open(config).with_context(|| {
        format!(
            "opening repository (key file: {}, storage: {} {})",
            config.keys.key_file.display(),
            config.storage.backend,
            config.storage.root.display()
        )
    })
}

// ── `strata keygen` ───────────────────────────────────────────────────────────

fn cmd_keygen(config: &StrataConfig) -> Result<()> {
    let path = &config.keys.key_file;
    RepositoryKeys::generate()
        .save(path)
        .with_context(|| format!("writing key file: {}", path.display()))?;
    println!("Wrote repository keys to {}", path.display());
    println!("Back this file up: without it the repository cannot be read.");
    Ok(())
}

// ── `strata put` ──────────────────────────────────────────────────────────────

async fn cmd_put(config: &StrataConfig, input: &Path, cancel: &CancellationToken) -> Result<()> {
    let repo = open_repository(config)?;
    let streams = repo.streams();

    let result = if input == Path::new("-") {
        streams
            .write(ReaderByteSource::new(std::io::stdin().lock()), cancel)
            .await
            .context("storing stdin")?
    } else {
        let file = std::fs::File::open(input)
            .with_context(|| format!("opening {}", input.display()))?;
        streams
            .write(ReaderByteSource::new(file), cancel)
            .await
            .with_context(|| format!("storing {}", input.display()))?
    };
    repo.storage().flush().await.context("flushing storage")?;

    print_write_result(&result);
    Ok(())
}

fn print_write_result(result: &StreamWriteResult) {
    let s = &result.stats;
    println!("root:    {}", result.root);
    println!("level:   {}", result.level);
    println!(
        "chunks:  {} ({} leaf, {} index)",
        s.total_chunks(),
        s.leaf_chunks,
        s.index_chunks
    );
    println!(
        "stored:  {} new, {} deduplicated",
        s.stored_chunks, s.deduplicated_chunks
    );
    println!(
        "bytes:   {} plaintext, {} written",
        s.plaintext_bytes, s.stored_bytes
    );
}

// ── `strata get` ──────────────────────────────────────────────────────────────

async fn cmd_get(
    config: &StrataConfig,
    address: Address,
    level: usize,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    let repo = open_repository(config)?;
    let streams = repo.streams();

    let written = match output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            streams
                .read_to_writer(level, address, &mut file, cancel)
                .await
                .with_context(|| format!("reading stream {address}"))?
        }
        None => {
            let mut stdout = tokio::io::stdout();
            streams
                .read_to_writer(level, address, &mut stdout, cancel)
                .await
                .with_context(|| format!("reading stream {address}"))?
        }
    };
    info!(root = %address, level, bytes = written, "stream restored");
    Ok(())
}

// ── `strata verify` ───────────────────────────────────────────────────────────

async fn cmd_verify(
    config: &StrataConfig,
    address: Address,
    level: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let repo = open_repository(config)?;
    let report = repo
        .streams()
        .verify(level, address, cancel)
        .await
        .with_context(|| format!("verifying stream {address}"))?;
    println!(
        "OK: {} chunks, {} plaintext bytes",
        report.chunks, report.plaintext_bytes
    );
    Ok(())
}

// ── `strata count` ────────────────────────────────────────────────────────────

async fn cmd_count(config: &StrataConfig) -> Result<()> {
    let repo = open_repository(config)?;
    let count = strata_storage::check_health(repo.storage().as_ref())
        .await
        .context("counting chunks")?;
    println!("{count}");
    Ok(())
}

// ── `strata collection show` ──────────────────────────────────────────────────

async fn cmd_collection_show(
    config: &StrataConfig,
    namespace: &str,
    name: &str,
    version: Option<u64>,
    cancel: &CancellationToken,
) -> Result<()> {
    let repo = open_repository(config)?;
    let collection = repo.collection(namespace, name);
    let snapshot = match version {
        Some(v) => collection.values_at(v, cancel).await,
        None => collection.values(cancel).await,
    }
    .with_context(|| format!("replaying collection {namespace}/{name}"))?;

    match snapshot.version {
        Some(v) => println!("# {namespace}/{name} at version {v}"),
        None => println!("# {namespace}/{name}: no versions"),
    }
    for (key, value) in &snapshot.entries {
        println!(
            "{}\t{}",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        );
    }
    Ok(())
}

// ── `strata config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &StrataConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
