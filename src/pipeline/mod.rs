// Analysis pipeline: ingestion, processing, and the stage runner

pub mod ingestion;
pub mod processing;
pub mod runner;

pub use runner::Pipeline;
