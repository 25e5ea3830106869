//! BSQ parser node.
//!
//! Turns raw Bitcoin blocks into the BSQ ledger:
//! - Classifies every transaction of a block against the ledger view
//! - Resolves spends between transactions of the same block
//! - Interprets OP_RETURN consensus payloads
//! - Commits whole blocks and captures periodic snapshots
//! - Drives full-node parsing from a chain source and lite-node re-parsing

pub mod chain_source;
pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod parser;
pub mod resolver;
pub mod shutdown;

pub use chain_source::{
    ChainDump, ChainSourceError, DumpBlock, JsonChainSource, RawBlock, RawChainSource, RawTx,
    RawTxOutput,
};
pub use classifier::{Classification, ClassifiedTx, TransactionClassifier};
pub use config::NodeConfig;
pub use error::NodeError;
pub use event::{EventBus, ParseEvent};
pub use logging::{init_logging, LogFormat};
pub use metrics::ParserMetrics;
pub use orchestrator::{FullNodeParser, LiteNodeParser};
pub use parser::{BlockInput, BlockParser, ParseSummary, ParsedBlock};
pub use resolver::{IntraBlockDependencyResolver, ResolveStats};
pub use shutdown::ShutdownController;
