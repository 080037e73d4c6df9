//! 거래소 trait 정의.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use airdrop_core::{Account, OrderResult, Side, Symbol, QUOTE_CURRENCY};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 자산의 잔고 정보.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    /// 사용 가능한 잔고
    pub free: Decimal,
    /// 주문에 묶인 잔고
    pub used: Decimal,
    /// 총 잔고
    pub total: Decimal,
}

/// 자산 심볼 → 잔고 매핑.
pub type BalanceMap = HashMap<String, Balance>;

/// 현재 시세 정보.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    /// 최근 체결가
    pub last: Decimal,
    /// 최우선 매수 호가
    pub bid: Decimal,
    /// 최우선 매도 호가
    pub ask: Decimal,
    /// 24시간 거래량
    pub volume: Decimal,
}

/// 보유 코인 평가 정보.
#[derive(Debug, Clone)]
pub struct Holding {
    /// 코인 심볼
    pub currency: String,
    /// 보유 수량
    pub amount: Decimal,
    /// 평가 금액 (KRW)
    pub value_krw: Decimal,
}

/// 계정 잔액 요약.
#[derive(Debug, Clone, Default)]
pub struct BalanceSummary {
    /// 원화 잔액
    pub krw: Decimal,
    /// 총 평가금액 (원화 + 코인 평가액)
    pub total_krw: Decimal,
    /// 보유 코인 목록
    pub holdings: Vec<Holding>,
}

/// 오케스트레이션 코어가 의존하는 통합 거래소 인터페이스.
///
/// 각 거래소별로 이 trait를 구현하여 코어가 특정 거래소 구현에
/// 의존하지 않도록 합니다. 테스트에서는 Mock 구현을 사용합니다.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 전체 자산 잔고 조회.
    async fn get_balances(&self) -> ExchangeResult<BalanceMap>;

    /// 특정 자산의 잔고 조회.
    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance>;

    /// 심볼의 현재 시세 조회.
    async fn get_ticker(&self, symbol: &Symbol) -> ExchangeResult<Ticker>;

    /// 전체 원화 마켓의 현재가를 한 번에 조회.
    ///
    /// 소액 코인 정리에서 보유 자산 평가에 사용합니다.
    async fn get_all_prices(&self) -> ExchangeResult<HashMap<String, Decimal>>;

    /// 원화 금액 기준 시장가 매수.
    ///
    /// 최소 주문 금액 미만이면 요청을 보내지 않고
    /// `ExchangeError::BelowMinimum`을 반환해야 합니다.
    async fn market_buy_quote(
        &self,
        symbol: &Symbol,
        krw_amount: Decimal,
    ) -> ExchangeResult<OrderResult>;

    /// 수량 기준 시장가 주문.
    async fn create_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> ExchangeResult<OrderResult>;

    /// 계정 잔액 요약 조회.
    ///
    /// 원화 잔액과 보유 코인별 평가 금액을 집계합니다.
    /// 시세 조회에 실패한 코인은 평가에서 제외됩니다.
    async fn balance_summary(&self) -> ExchangeResult<BalanceSummary> {
        let balances = self.get_balances().await?;

        let mut summary = BalanceSummary::default();
        for (currency, balance) in &balances {
            if currency == QUOTE_CURRENCY {
                summary.krw = balance.total;
                summary.total_krw += balance.total;
                continue;
            }
            if balance.total <= Decimal::ZERO {
                continue;
            }

            let symbol = Symbol::krw(currency);
            match self.get_ticker(&symbol).await {
                Ok(ticker) => {
                    let value_krw = balance.total * ticker.last;
                    summary.total_krw += value_krw;
                    summary.holdings.push(Holding {
                        currency: currency.clone(),
                        amount: balance.total,
                        value_krw,
                    });
                }
                Err(e) => {
                    warn!(currency = %currency, error = %e, "시세 조회 실패, 평가에서 제외");
                }
            }
        }

        Ok(summary)
    }
}

/// 계정별 거래소 클라이언트 팩토리.
///
/// 계정 자격증명은 해당 계정의 클라이언트 인스턴스에만 전달되며
/// 계정 간에 공유되지 않습니다.
pub trait ExchangeFactory: Send + Sync {
    /// 계정 자격증명으로 거래소 클라이언트를 생성합니다.
    fn create(&self, account: &Account) -> ExchangeResult<Arc<dyn Exchange>>;
}
