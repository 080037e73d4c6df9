//! 거래소 커넥터.

pub mod bithumb;

pub use bithumb::{BithumbClient, BithumbConfig, BithumbFactory};
