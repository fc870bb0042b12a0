// Value types produced by the analysis pipeline
pub mod indicators;
pub mod levels;
pub mod patterns;
pub mod report;
pub mod signal;
pub mod trend;
