// Concurrent multi-timeframe orchestration
pub mod aggregator;
pub mod analysis_engine;
pub mod fetcher;
pub mod pipeline;
pub mod setup_scorer;

pub use analysis_engine::AnalysisEngine;
