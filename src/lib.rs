pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod regression;
pub mod report;
pub mod spatial;
pub mod synthetic;
pub mod types;

pub use config::Config;
pub use error::{AnalysisError, Result};
pub use pipeline::Pipeline;
pub use report::AnalysisReport;
