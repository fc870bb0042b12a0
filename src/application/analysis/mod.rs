// Per-timeframe analysis stages
pub mod level_detector;
pub mod pattern_recognizer;
pub mod signal_fuser;
pub mod trend_analyzer;
