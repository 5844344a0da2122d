// Observability: stage metrics

pub mod metrics;

pub use metrics::{init, write_snapshot};
