//! 주문 타입.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Symbol;

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// 미체결
    Open,
    /// 체결 완료
    Closed,
    /// 취소됨
    Canceled,
}

/// 체결된 주문 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    /// 거래소 주문 ID
    pub id: String,
    /// 거래 심볼
    pub symbol: Symbol,
    /// 주문 방향
    pub side: Side,
    /// 주문 수량
    pub amount: Decimal,
    /// 체결 수량
    pub filled: Decimal,
    /// 주문 상태
    pub status: OrderStatus,
}

impl OrderResult {
    /// 시장가 주문 결과를 생성합니다.
    ///
    /// 빗썸 시장가 주문은 접수 즉시 체결되므로 주문 수량 전체를
    /// 체결 수량으로 기록합니다.
    pub fn market(id: impl Into<String>, symbol: Symbol, side: Side, amount: Decimal) -> Self {
        Self {
            id: id.into(),
            symbol,
            side,
            amount,
            filled: amount,
            status: OrderStatus::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_order_is_closed() {
        let order = OrderResult::market("1234", Symbol::krw("BTC"), Side::Buy, dec!(0.001));

        assert_eq!(order.status, OrderStatus::Closed);
        assert_eq!(order.filled, order.amount);
        assert_eq!(order.side.to_string(), "buy");
    }
}
