//! Prometheus metrics for block parsing.
//!
//! [`ParserMetrics`] owns a dedicated [`Registry`] that an embedding process
//! can encode into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct ParserMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub blocks_parsed: IntCounter,
    /// Transactions recorded in the ledger, genesis and issuance included.
    pub token_txs: IntCounter,
    /// OP_RETURN payloads in metadata position that were not accepted.
    pub rejected_payloads: IntCounter,
    pub non_connecting_blocks: IntCounter,
    pub snapshots_persisted: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub chain_head_height: IntGauge,
    pub unspent_outputs: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Classification plus commit time per block, in milliseconds.
    pub block_parse_time_ms: Histogram,
}

impl ParserMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let blocks_parsed = register_int_counter_with_registry!(
            Opts::new("bsq_blocks_parsed_total", "Total blocks parsed"),
            registry
        )?;
        let token_txs = register_int_counter_with_registry!(
            Opts::new("bsq_token_txs_total", "Total BSQ transactions recorded"),
            registry
        )?;
        let rejected_payloads = register_int_counter_with_registry!(
            Opts::new(
                "bsq_rejected_payloads_total",
                "OP_RETURN payloads rejected by the consensus verifiers"
            ),
            registry
        )?;
        let non_connecting_blocks = register_int_counter_with_registry!(
            Opts::new(
                "bsq_non_connecting_blocks_total",
                "Blocks that did not connect to the chain head"
            ),
            registry
        )?;
        let snapshots_persisted = register_int_counter_with_registry!(
            Opts::new(
                "bsq_snapshots_persisted_total",
                "Chain state snapshots written to storage"
            ),
            registry
        )?;

        let chain_head_height = register_int_gauge_with_registry!(
            Opts::new("bsq_chain_head_height", "Height of the last parsed block"),
            registry
        )?;
        let unspent_outputs = register_int_gauge_with_registry!(
            Opts::new("bsq_unspent_outputs", "Current number of unspent BSQ outputs"),
            registry
        )?;

        // 0.1 ms to ~1.6 s
        let block_parse_time_ms = register_histogram_with_registry!(
            HistogramOpts::new("bsq_block_parse_time_ms", "Block parse time in milliseconds")
                .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_parsed,
            token_txs,
            rejected_payloads,
            non_connecting_blocks,
            snapshots_persisted,
            chain_head_height,
            unspent_outputs,
            block_parse_time_ms,
        })
    }

    /// Render every metric in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_metric() {
        let metrics = ParserMetrics::new().unwrap();
        metrics.blocks_parsed.inc();
        metrics.chain_head_height.set(1441);
        metrics.block_parse_time_ms.observe(2.5);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("bsq_blocks_parsed_total 1"));
        assert!(text.contains("bsq_chain_head_height 1441"));
        assert!(text.contains("bsq_block_parse_time_ms_count 1"));
        assert_eq!(metrics.registry.gather().len(), 8);
    }

    #[test]
    fn instances_are_independent() {
        let a = ParserMetrics::new().unwrap();
        let b = ParserMetrics::new().unwrap();
        a.token_txs.inc_by(3);
        assert_eq!(a.token_txs.get(), 3);
        assert_eq!(b.token_txs.get(), 0);
    }
}
