//! 거래소 연결 계층.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Exchange trait: 오케스트레이션 코어가 의존하는 통합 거래소 인터페이스
//! - ExchangeFactory trait: 계정별 클라이언트 생성
//! - 빗썸 커넥터 (REST, 서명 요청)
//! - 재시도 유틸리티 (지수 백오프)
//! - Mock 거래소 (테스트용)

pub mod connector;
pub mod error;
pub mod provider;
pub mod retry;
pub mod traits;

pub use connector::{BithumbClient, BithumbConfig, BithumbFactory};
pub use error::*;
pub use provider::{MockExchange, MockFactory, MockResponse};
pub use retry::{with_retry, RetryConfig};
pub use traits::*;
