//! 도메인 타입.

pub mod account;
pub mod order;
pub mod result;

pub use account::*;
pub use order::*;
pub use result::*;
