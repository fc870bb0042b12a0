// Price data provider adapters
pub mod binance;
pub mod core;
pub mod csv_replay;
pub mod mock;

pub use binance::BinanceCandleProvider;
pub use csv_replay::CsvReplayProvider;
pub use mock::InMemoryCandleProvider;
