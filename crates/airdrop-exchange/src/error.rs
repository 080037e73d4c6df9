//! 거래소 에러 타입.

use rust_decimal::Decimal;
use thiserror::Error;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 인증/권한 에러 (잘못된 API 키 등)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: String, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 최소 주문 금액 미만
    #[error("Order amount {amount} KRW below minimum {minimum} KRW")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    /// 잔고 부족
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 자산을 찾을 수 없음
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 인증 실패를 제외한 API 에러 상태는 일시적 장애로 간주하고
    /// 재시도 대상에 포함합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::ParseError(_)
                | ExchangeError::ApiError { .. }
        )
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::NetworkError(_) => Some(1000),
            ExchangeError::Timeout(_) => Some(500),
            _ => None,
        }
    }

    /// 재시도하면 안 되는 치명적 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unauthorized(_)
                | ExchangeError::BelowMinimum { .. }
                | ExchangeError::InsufficientBalance(_)
        )
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::NetworkError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}
