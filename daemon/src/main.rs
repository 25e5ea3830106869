//! BSQ daemon: entry point for parsing a chain into the BSQ ledger.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use bsq_ledger::{Block, LedgerStore, SnapshotManager};
use bsq_node::{
    init_logging, BlockParser, ChainDump, FullNodeParser, JsonChainSource, LiteNodeParser,
    NodeConfig, ParseSummary, ParserMetrics, ShutdownController,
};
use bsq_store::SnapshotStore;
use bsq_store_lmdb::LmdbEnvironment;
use bsq_types::{NetworkId, TxId};

const LMDB_MAX_DBS: u32 = 4;
const LMDB_MAP_SIZE: usize = 4 * 1024 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "bsq-daemon", about = "BSQ colored-coin indexer")]
struct Cli {
    /// Network to index: "mainnet", "testnet" or "regtest".
    /// When a config file is provided, defaults to the file's network value.
    #[arg(long, env = "BSQ_NETWORK")]
    network: Option<String>,

    /// Data directory for snapshot storage.
    #[arg(long, env = "BSQ_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level filter, e.g. "info" or "debug,bsq_node=trace".
    #[arg(long, env = "BSQ_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "BSQ_LOG_FORMAT")]
    log_format: Option<String>,

    /// Print Prometheus metrics after parsing.
    #[arg(long, env = "BSQ_ENABLE_METRICS")]
    metrics: bool,

    /// Keep the ledger in memory only.
    #[arg(long, env = "BSQ_DISABLE_SNAPSHOTS")]
    no_snapshots: bool,

    /// Re-parse served blocks instead of reading raw chain data.
    #[arg(long, env = "BSQ_LITE_MODE")]
    lite: bool,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "BSQ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Parse a JSON block dump, resuming from the latest snapshot.
    Parse {
        /// Path to the dump file.
        #[arg(long)]
        dump: PathBuf,
    },
    /// Look up a transaction in the latest snapshot.
    Query {
        /// Transaction id, hex.
        tx_id: String,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Serialize)]
struct ParseReport {
    network: &'static str,
    #[serde(flatten)]
    summary: ParseSummary,
    chain_head_height: u32,
    unspent_outputs: usize,
    total_burnt_fee: u64,
}

#[derive(Serialize)]
struct QueryReport {
    tx_id: TxId,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    burnt_fee: Option<u64>,
    chain_head_height: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format()?, &config.log_level)?;

    match cli.command {
        Command::Parse { ref dump } => parse(&config, dump).await?,
        Command::Query { ref tx_id } => query(&config, tx_id)?,
        Command::Config => print!("{}", config.to_toml_string()?),
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(network) = &cli.network {
        config.network = network.parse::<NetworkId>()?;
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.enable_metrics |= cli.metrics;
    config.lite_mode |= cli.lite;
    if cli.no_snapshots {
        config.enable_snapshots = false;
    }
    Ok(config)
}

/// An LMDB-backed ledger, or an in-memory one when snapshots are disabled.
fn open_ledger(config: &NodeConfig) -> anyhow::Result<Arc<LedgerStore>> {
    let params = config.consensus_params()?;
    if !config.enable_snapshots {
        let manager =
            SnapshotManager::new(params.genesis.block_height, params.snapshot_grid).disabled();
        return Ok(Arc::new(LedgerStore::with_snapshot_manager(params, manager)));
    }

    let dir = config.snapshot_dir();
    let env = LmdbEnvironment::open(&dir, LMDB_MAX_DBS, LMDB_MAP_SIZE)
        .with_context(|| format!("opening snapshot store at {}", dir.display()))?;
    let store: Arc<dyn SnapshotStore> = Arc::new(env.snapshot_store());
    Ok(Arc::new(LedgerStore::open(params, store)?))
}

async fn parse(config: &NodeConfig, dump: &Path) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    tracing::info!(
        network = config.network.as_str(),
        resume = ledger.next_block_height()?,
        lite = config.lite_mode,
        "starting parse"
    );

    let metrics = if config.enable_metrics {
        Some(Arc::new(ParserMetrics::new()?))
    } else {
        None
    };
    let mut parser = BlockParser::new(Arc::clone(&ledger));
    if let Some(metrics) = &metrics {
        parser = parser.with_metrics(Arc::clone(metrics));
    }
    let parser = Arc::new(parser);

    let shutdown = ShutdownController::new();
    let summary = if config.lite_mode {
        let blocks = served_blocks(dump, ledger.next_block_height()?)?;
        let lite = LiteNodeParser::spawn(parser, shutdown.subscribe());
        let summary = tokio::select! {
            result = lite.parse_blocks(blocks) => result?,
            _ = shutdown.wait_for_signal() => ParseSummary::default(),
        };
        lite.shutdown().await;
        summary
    } else {
        let source = Arc::new(
            JsonChainSource::from_file(dump)
                .with_context(|| format!("reading dump {}", dump.display()))?,
        );
        let full = FullNodeParser::spawn(parser, source, shutdown.subscribe());
        let summary = tokio::select! {
            result = full.parse_to_head() => result?,
            _ = shutdown.wait_for_signal() => ParseSummary::default(),
        };
        full.shutdown().await;
        summary
    };

    if let Some(height) = ledger.flush_snapshot()? {
        tracing::info!(height, "flushed snapshot on exit");
    }

    let report = ParseReport {
        network: config.network.as_str(),
        summary,
        chain_head_height: ledger.chain_head_height()?,
        unspent_outputs: ledger.unspent_count()?,
        total_burnt_fee: ledger.total_burnt_fee()?.sat(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(metrics) = metrics {
        print!("{}", metrics.encode_text()?);
    }
    Ok(())
}

/// Dump blocks from `from` on, as a full node would serve them.
fn served_blocks(dump: &Path, from: u32) -> anyhow::Result<Vec<Block>> {
    let contents = std::fs::read_to_string(dump)
        .with_context(|| format!("reading dump {}", dump.display()))?;
    let dump: ChainDump = serde_json::from_str(&contents)?;
    Ok(dump
        .blocks
        .into_iter()
        .filter(|b| b.height >= from)
        .map(|b| {
            let mut block = Block::new(b.height, b.hash, b.prev_hash);
            block.txs = b
                .txs
                .into_iter()
                .map(|tx| tx.into_tx(b.height, b.hash))
                .collect();
            block
        })
        .collect())
}

fn query(config: &NodeConfig, tx_id: &str) -> anyhow::Result<()> {
    let tx_id: TxId = tx_id.parse()?;
    let ledger = open_ledger(config)?;
    let tx = ledger.get_tx(&tx_id)?;

    let report = QueryReport {
        tx_id,
        found: tx.is_some(),
        block_height: tx.as_ref().map(|t| t.block_height),
        tx_type: tx.as_ref().and_then(|t| t.tx_type).map(|t| t.as_str()),
        burnt_fee: tx.as_ref().and_then(|t| t.burnt_fee).map(|fee| fee.sat()),
        chain_head_height: ledger.chain_head_height()?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
