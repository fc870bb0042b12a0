// Application layer: indicator math, per-timeframe analysis and the engine
pub mod analysis;
pub mod engine;
pub mod market_data;
