//! Prometheus metrics and tracing span helpers.
//!
//! Both halves are feature-gated: `metrics` builds the OpenTelemetry
//! instruments behind [`METRICS`], `tracing` provides the spans entered at
//! operation and transaction boundaries.

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::{InventoryMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        metrics::{Counter, Histogram, MeterProvider},
        KeyValue,
    };
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<InventoryMetrics> = Lazy::new(InventoryMetrics::init);

    pub struct InventoryMetrics {
        pub registry: Registry,
        pub provider: SdkMeterProvider,
        pub storages_created: Counter<u64>,
        pub cells_created: Counter<u64>,
        pub items_placed: Counter<u64>,
        pub conflicts: Counter<u64>,
        pub searches: Counter<u64>,
        pub transaction_duration: Histogram<f64>,
    }

    impl InventoryMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("trayhouse");

            let storages_created = meter
                .u64_counter("trayhouse_storages_created_total")
                .with_description("Storages created with their partitions and cells")
                .build();

            let cells_created = meter
                .u64_counter("trayhouse_cells_created_total")
                .with_description("Cells inserted by committed hierarchy transactions")
                .build();

            let items_placed = meter
                .u64_counter("trayhouse_items_placed_total")
                .with_description("Items placed into cells")
                .build();

            let conflicts = meter
                .u64_counter("trayhouse_conflicts_total")
                .with_description("Writes rejected by an address or code uniqueness rule")
                .build();

            let searches = meter
                .u64_counter("trayhouse_searches_total")
                .with_description("Inventory searches served")
                .build();

            let transaction_duration = meter
                .f64_histogram("trayhouse_transaction_duration_seconds")
                .with_description("Duration of store transactions from begin to commit or rollback")
                .build();

            Self {
                registry,
                provider,
                storages_created,
                cells_created,
                items_placed,
                conflicts,
                searches,
                transaction_duration,
            }
        }

        /// Current values in the Prometheus text exposition format.
        pub fn render(&self) -> String {
            let mut out = String::new();
            if let Err(err) = TextEncoder::new().encode_utf8(&self.registry.gather(), &mut out) {
                log::warn!("failed to encode metrics: {err}");
            }
            out
        }

        pub fn record_storage_created(&self, cells: usize) {
            self.storages_created.add(1, &[]);
            self.cells_created.add(cells as u64, &[]);
        }

        pub fn record_partition_added(&self, cells: usize) {
            self.cells_created.add(cells as u64, &[]);
        }

        pub fn record_item_placed(&self) {
            self.items_placed.add(1, &[]);
        }

        pub fn record_conflict(&self) {
            self.conflicts.add(1, &[]);
        }

        pub fn record_search(&self) {
            self.searches.add(1, &[]);
        }

        pub fn record_transaction(&self, elapsed: Duration, committed: bool) {
            let outcome = if committed { "commit" } else { "rollback" };
            self.transaction_duration
                .record(elapsed.as_secs_f64(), &[KeyValue::new("outcome", outcome)]);
        }
    }

}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{debug_span, info_span, Span};

    pub fn transaction_span(operation: &'static str) -> Span {
        info_span!("trayhouse.transaction", operation)
    }

    pub fn begin_transaction_span() -> Span {
        debug_span!("trayhouse.begin")
    }

    pub fn commit_transaction_span() -> Span {
        debug_span!("trayhouse.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        debug_span!("trayhouse.rollback")
    }

    pub fn execute_query_span(query: &str) -> Span {
        debug_span!("trayhouse.query", sql = query)
    }

    pub fn create_storage_span(code: &str, partitions: usize) -> Span {
        info_span!("trayhouse.create_storage", code, partitions)
    }

    pub fn add_partition_span(storage_id: i64, code: &str) -> Span {
        info_span!("trayhouse.add_partition", storage_id, code)
    }

    pub fn place_item_span(cell_id: i64) -> Span {
        info_span!("trayhouse.place_item", cell_id)
    }

    pub fn search_span(query: &str, limit: usize) -> Span {
        info_span!("trayhouse.search", query, limit)
    }
}
