//! 테스트용 거래소 구현.

pub mod mock;

pub use mock::{MockExchange, MockFactory, MockResponse};
