// Analysis result types
pub mod analysis;

// Market data domain
pub mod market;

// Port interfaces
pub mod ports;

// Candle integrity checks
pub mod validation;

// Domain-specific error types
pub mod errors;
