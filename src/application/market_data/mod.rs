// Indicator math and assembly
pub mod indicator_calculator;
pub mod indicators;
