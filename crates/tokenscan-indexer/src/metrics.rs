use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Indexer counters and gauges, exported in Prometheus text format from
/// the ops endpoint.
pub struct IndexerMetrics {
    pub blocks_indexed: Counter,
    pub transfers_indexed: Counter,
    pub last_indexed_block: Gauge,
    pub indexing_latency_ms: Gauge,
    pub errors: Counter,
    registry: Registry,
}

impl Default for IndexerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let blocks_indexed = Counter::default();
        registry.register(
            "tokenscan_blocks_indexed",
            "Blocks scanned for Transfer logs",
            blocks_indexed.clone(),
        );

        let transfers_indexed = Counter::default();
        registry.register(
            "tokenscan_transfers_indexed",
            "Transfers inserted into the store",
            transfers_indexed.clone(),
        );

        let last_indexed_block = Gauge::default();
        registry.register(
            "tokenscan_last_indexed_block",
            "Highest block advanced past by any token watermark",
            last_indexed_block.clone(),
        );

        let indexing_latency_ms = Gauge::default();
        registry.register(
            "tokenscan_indexing_latency_ms",
            "Duration of the most recent indexing tick in milliseconds",
            indexing_latency_ms.clone(),
        );

        let errors = Counter::default();
        registry.register(
            "tokenscan_errors",
            "Failed indexing ticks and tasks",
            errors.clone(),
        );

        Self {
            blocks_indexed,
            transfers_indexed,
            last_indexed_block,
            indexing_latency_ms,
            errors,
            registry,
        }
    }

    pub fn record_batch(&self, blocks: u64, transfers: u64, last_block: i64) {
        self.blocks_indexed.inc_by(blocks);
        self.transfers_indexed.inc_by(transfers);
        self.last_indexed_block.set(last_block);
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buf = String::new();
        if let Err(e) = encode(&mut buf, &self.registry) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        buf
    }
}
