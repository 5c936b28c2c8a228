//! Domain types for tx-pipeline
//!
//! These types provide exact arithmetic and proper serialization for token values.

pub mod fixed_decimal;

pub use fixed_decimal::{FixedDecimal, WEI_DECIMALS};
