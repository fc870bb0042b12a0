// Market data domain
pub mod candle;
pub mod market_structure;
pub mod timeframe;
