//! 심볼 정의.
//!
//! 거래 가능한 마켓을 나타내는 심볼 타입을 정의합니다.
//! 심볼은 기준 자산과 호가 통화로 구성됩니다 (예: BTC/KRW).

use serde::{Deserialize, Serialize};
use std::fmt;

/// 호가 통화. 이벤트 마켓은 전부 원화 마켓입니다.
pub const QUOTE_CURRENCY: &str = "KRW";

/// 거래 마켓을 나타내는 심볼.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// 기준 자산 (예: BTC, XRP)
    pub base: String,
    /// 호가 통화 (예: KRW)
    pub quote: String,
}

impl Symbol {
    /// 새 심볼을 생성합니다. 기준 자산과 호가 통화는 대문자로 정규화됩니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().trim().to_uppercase(),
            quote: quote.into().trim().to_uppercase(),
        }
    }

    /// 원화 마켓 심볼을 생성합니다.
    pub fn krw(base: impl Into<String>) -> Self {
        Self::new(base, QUOTE_CURRENCY)
    }

    /// 사용자 입력에서 심볼을 파싱합니다.
    ///
    /// `BTC`와 `BTC/KRW` 형식을 모두 받으며, 호가 통화가 생략되면
    /// 원화 마켓으로 해석합니다. 빈 입력은 `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        match s.split_once('/') {
            Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
                Some(Self::new(base, quote))
            }
            Some(_) => None,
            None => Some(Self::krw(s)),
        }
    }

    /// 빗썸 API 마켓 형식을 반환합니다 (예: BTC_KRW).
    pub fn market_code(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
