//! Observability: structured logging and usage metrics

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{MetricEvent, MetricsCollector, MetricsSink, MetricsSnapshot, NoopMetrics, Phase};

pub use logging::{command_span, dispatch_span};
