//! 거래 결과 타입.
//!
//! 시퀀서와 오케스트레이터가 주고받는 결과 값을 정의합니다.
//! 실패는 항상 값으로 표현되며 작업 경계를 넘어 전파되지 않습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::order::OrderResult;
use crate::types::Symbol;

/// 한 (계정, 심볼) 거래 시퀀스의 결과.
///
/// 성공이면 매수/매도 주문이 모두 존재하고, 실패면 에러 메시지와 함께
/// 시퀀스가 진행된 만큼의 주문만 존재합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    /// 계정 식별자
    pub account: String,
    /// 거래 심볼
    pub symbol: Symbol,
    /// 성공 여부
    pub success: bool,
    /// 매수 주문 (진행된 경우)
    pub buy_order: Option<OrderResult>,
    /// 매도 주문 (성공한 경우)
    pub sell_order: Option<OrderResult>,
    /// 실패 사유
    pub error: Option<String>,
}

impl TradeResult {
    /// 성공 결과를 생성합니다. 매수/매도 주문이 모두 필요합니다.
    pub fn success(
        account: impl Into<String>,
        symbol: Symbol,
        buy_order: OrderResult,
        sell_order: OrderResult,
    ) -> Self {
        Self {
            account: account.into(),
            symbol,
            success: true,
            buy_order: Some(buy_order),
            sell_order: Some(sell_order),
            error: None,
        }
    }

    /// 실패 결과를 생성합니다.
    ///
    /// `buy_order`는 시퀀스가 매수까지 진행된 경우에만 전달합니다.
    pub fn failure(
        account: impl Into<String>,
        symbol: Symbol,
        error: impl Into<String>,
        buy_order: Option<OrderResult>,
    ) -> Self {
        Self {
            account: account.into(),
            symbol,
            success: false,
            buy_order,
            sell_order: None,
            error: Some(error.into()),
        }
    }
}

/// 정리 대상으로 판정된 소액 보유 코인.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmallHolding {
    /// 코인 심볼
    pub coin: String,
    /// 보유 수량
    pub amount: Decimal,
    /// 평가 금액 (KRW)
    pub value_krw: Decimal,
}

/// 한 계정의 소액 코인 정리 결과.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupResult {
    /// 정리에 성공한 코인
    pub cleaned_coins: Vec<String>,
    /// 정리에 실패한 코인
    pub failed_coins: Vec<String>,
    /// 정리 성공 수 (cleaned_coins 길이와 항상 일치)
    pub total_cleaned: usize,
}

impl CleanupResult {
    /// 정리 성공을 기록합니다.
    pub fn record_cleaned(&mut self, coin: impl Into<String>) {
        self.cleaned_coins.push(coin.into());
        self.total_cleaned = self.cleaned_coins.len();
    }

    /// 정리 실패를 기록합니다.
    pub fn record_failed(&mut self, coin: impl Into<String>) {
        self.failed_coins.push(coin.into());
    }
}

/// 심볼별 성공/실패 집계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTally {
    /// 성공 수
    pub success: usize,
    /// 실패 수
    pub fail: usize,
}

/// 한 번의 실행에 대한 전체 집계.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// 전체 성공 수
    pub success: usize,
    /// 전체 실패 수
    pub fail: usize,
    /// 기준 자산별 집계
    pub per_symbol: HashMap<String, SymbolTally>,
}

impl RunSummary {
    /// 거래 결과 하나를 집계에 반영합니다.
    pub fn record(&mut self, result: &TradeResult) {
        let tally = self
            .per_symbol
            .entry(result.symbol.base.clone())
            .or_default();

        if result.success {
            self.success += 1;
            tally.success += 1;
        } else {
            self.fail += 1;
            tally.fail += 1;
        }
    }

    /// 집계된 결과 총 수를 반환합니다.
    pub fn total(&self) -> usize {
        self.success + self.fail
    }
}
