//! Multi-step DeFi transaction pipeline: permit signing, contract calls and
//! the loan math shown alongside them.

pub mod config;
pub mod contracts;
pub mod domain_types;
pub mod math;
pub mod permit;
pub mod pipeline;
pub mod rpc;
pub mod wallet;
