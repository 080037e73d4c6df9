//! Mock 거래소 구현.
//!
//! 실제 네트워크 없이 오케스트레이션 코어를 검증하기 위한 가상 거래소입니다.
//! 잔고 스냅샷 시퀀스와 주문 응답을 스크립트로 지정할 수 있고,
//! 호출 횟수와 매도 수량을 기록합니다.
//!
//! # 거래소 중립성
//!
//! Mock 거래소는 실제 거래소(빗썸)와 동일한 `Exchange` 인터페이스를
//! 제공하므로 코어 코드는 거래소 종류와 무관하게 동일하게 동작합니다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use airdrop_core::{Account, OrderResult, Side, Symbol};

use crate::traits::{Balance, BalanceMap, Exchange, ExchangeFactory, ExchangeResult, Ticker};
use crate::ExchangeError;

/// 스크립트된 주문 응답.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// 주문 성공
    Success,
    /// API 에러 반환
    ApiError(String),
    /// 인증 실패 반환
    Unauthorized,
}

impl MockResponse {
    fn to_result(&self, order: OrderResult) -> ExchangeResult<OrderResult> {
        match self {
            MockResponse::Success => Ok(order),
            MockResponse::ApiError(message) => Err(ExchangeError::ApiError {
                code: "5600".to_string(),
                message: message.clone(),
            }),
            MockResponse::Unauthorized => {
                Err(ExchangeError::Unauthorized("Invalid Apikey".to_string()))
            }
        }
    }
}

/// 호출 횟수 기록.
#[derive(Debug, Default)]
pub struct MockCalls {
    /// 잔고 조회 횟수
    pub balance: AtomicUsize,
    /// 시세 조회 횟수
    pub ticker: AtomicUsize,
    /// 매수 주문 횟수
    pub buy: AtomicUsize,
    /// 매도 주문 횟수
    pub sell: AtomicUsize,
    /// 시세 테이블 조회 횟수
    pub prices: AtomicUsize,
}

/// 스크립트 가능한 Mock 거래소.
pub struct MockExchange {
    /// 잔고 조회 시 순서대로 반환할 스냅샷 (소진되면 마지막 값 반복)
    balance_script: Mutex<VecDeque<BalanceMap>>,
    current_balance: Mutex<BalanceMap>,
    prices: HashMap<String, Decimal>,
    fail_balances: bool,
    fail_prices: bool,
    ticker: Ticker,
    buy_response: MockResponse,
    sell_response: MockResponse,
    order_seq: AtomicUsize,
    /// 매도 주문으로 들어온 수량 기록
    pub sold_amounts: Mutex<Vec<Decimal>>,
    /// 호출 횟수
    pub calls: MockCalls,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    /// 기본 Mock 거래소 생성 (현재가 100 KRW, 잔고 없음).
    pub fn new() -> Self {
        Self {
            balance_script: Mutex::new(VecDeque::new()),
            current_balance: Mutex::new(BalanceMap::new()),
            prices: HashMap::new(),
            fail_balances: false,
            fail_prices: false,
            ticker: Ticker {
                last: Decimal::new(100, 0),
                bid: Decimal::new(99, 0),
                ask: Decimal::new(101, 0),
                volume: Decimal::ZERO,
            },
            buy_response: MockResponse::Success,
            sell_response: MockResponse::Success,
            order_seq: AtomicUsize::new(0),
            sold_amounts: Mutex::new(Vec::new()),
            calls: MockCalls::default(),
        }
    }

    /// 고정 잔고 항목 추가.
    pub fn with_balance(self, currency: impl Into<String>, free: Decimal) -> Self {
        let currency = currency.into();
        self.current_balance.lock().unwrap().insert(
            currency,
            Balance {
                free,
                used: Decimal::ZERO,
                total: free,
            },
        );
        self
    }

    /// 잔고 스냅샷 시퀀스 지정 (조회마다 하나씩 소비, 소진 시 마지막 반복).
    pub fn with_balance_script(self, snapshots: Vec<BalanceMap>) -> Self {
        *self.balance_script.lock().unwrap() = snapshots.into();
        self
    }

    /// 시세 테이블 항목 추가 (소액 정리용).
    pub fn with_price(mut self, coin: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(coin.into(), price);
        self
    }

    /// 현재가 지정.
    pub fn with_ticker_price(mut self, last: Decimal) -> Self {
        self.ticker.last = last;
        self
    }

    /// 잔고 조회를 실패하도록 설정.
    pub fn fail_balances(mut self) -> Self {
        self.fail_balances = true;
        self
    }

    /// 시세 테이블 조회를 실패하도록 설정.
    pub fn fail_prices(mut self) -> Self {
        self.fail_prices = true;
        self
    }

    /// 매수 주문 응답 지정.
    pub fn with_buy_response(mut self, response: MockResponse) -> Self {
        self.buy_response = response;
        self
    }

    /// 매도 주문 응답 지정.
    pub fn with_sell_response(mut self, response: MockResponse) -> Self {
        self.sell_response = response;
        self
    }

    fn next_order_id(&self, side: Side) -> String {
        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst);
        format!("mock-{}-{}", side, seq)
    }

    fn snapshot_balances(&self) -> BalanceMap {
        let mut script = self.balance_script.lock().unwrap();
        if let Some(next) = script.pop_front() {
            *self.current_balance.lock().unwrap() = next;
        }
        self.current_balance.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_balances(&self) -> ExchangeResult<BalanceMap> {
        self.calls.balance.fetch_add(1, Ordering::SeqCst);
        if self.fail_balances {
            return Err(ExchangeError::NetworkError("mock: 잔고 조회 실패".to_string()));
        }
        Ok(self.snapshot_balances())
    }

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance> {
        let balances = self.get_balances().await?;
        Ok(balances.get(currency).cloned().unwrap_or_default())
    }

    async fn get_ticker(&self, _symbol: &Symbol) -> ExchangeResult<Ticker> {
        self.calls.ticker.fetch_add(1, Ordering::SeqCst);
        Ok(self.ticker.clone())
    }

    async fn get_all_prices(&self) -> ExchangeResult<HashMap<String, Decimal>> {
        self.calls.prices.fetch_add(1, Ordering::SeqCst);
        if self.fail_prices {
            return Err(ExchangeError::NetworkError("mock: 시세 조회 실패".to_string()));
        }
        Ok(self.prices.clone())
    }

    async fn market_buy_quote(
        &self,
        symbol: &Symbol,
        krw_amount: Decimal,
    ) -> ExchangeResult<OrderResult> {
        self.calls.buy.fetch_add(1, Ordering::SeqCst);
        let units = (krw_amount / self.ticker.last).round_dp(8);
        let order = OrderResult::market(self.next_order_id(Side::Buy), symbol.clone(), Side::Buy, units);
        self.buy_response.to_result(order)
    }

    async fn create_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> ExchangeResult<OrderResult> {
        let order = OrderResult::market(self.next_order_id(side), symbol.clone(), side, amount);
        match side {
            Side::Buy => {
                self.calls.buy.fetch_add(1, Ordering::SeqCst);
                self.buy_response.to_result(order)
            }
            Side::Sell => {
                self.calls.sell.fetch_add(1, Ordering::SeqCst);
                let result = self.sell_response.to_result(order);
                if result.is_ok() {
                    self.sold_amounts.lock().unwrap().push(amount);
                }
                result
            }
        }
    }
}

/// Mock 거래소 팩토리.
///
/// 기본 거래소 하나를 모든 계정에 공유하거나, 계정별로 다른
/// 거래소를 지정할 수 있습니다. 지정된 계정의 클라이언트 생성을
/// 실패시켜 팩토리 오류 경로도 검증할 수 있습니다.
pub struct MockFactory {
    default: Arc<MockExchange>,
    per_account: HashMap<String, Arc<MockExchange>>,
    fail_accounts: HashSet<String>,
}

impl MockFactory {
    /// 모든 계정이 같은 Mock 거래소를 사용하는 팩토리 생성.
    pub fn new(default: Arc<MockExchange>) -> Self {
        Self {
            default,
            per_account: HashMap::new(),
            fail_accounts: HashSet::new(),
        }
    }

    /// 특정 계정에 별도 거래소 지정.
    pub fn with_account(mut self, account_id: impl Into<String>, exchange: Arc<MockExchange>) -> Self {
        self.per_account.insert(account_id.into(), exchange);
        self
    }

    /// 특정 계정의 클라이언트 생성을 실패시킴.
    pub fn fail_for(mut self, account_id: impl Into<String>) -> Self {
        self.fail_accounts.insert(account_id.into());
        self
    }
}

impl ExchangeFactory for MockFactory {
    fn create(&self, account: &Account) -> ExchangeResult<Arc<dyn Exchange>> {
        if self.fail_accounts.contains(&account.account_id) {
            return Err(ExchangeError::Unauthorized(format!(
                "mock: {} 클라이언트 생성 실패",
                account.account_id
            )));
        }
        if let Some(exchange) = self.per_account.get(&account.account_id) {
            return Ok(exchange.clone());
        }
        Ok(self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_balance_script_consumes_in_order() {
        let empty = BalanceMap::new();
        let mut filled = BalanceMap::new();
        filled.insert(
            "BTC".to_string(),
            Balance {
                free: dec!(0.001),
                used: Decimal::ZERO,
                total: dec!(0.001),
            },
        );

        let exchange = MockExchange::new().with_balance_script(vec![empty, filled]);

        // 첫 조회는 빈 잔고, 두 번째부터는 매수 반영
        assert!(exchange.get_balances().await.unwrap().is_empty());
        let second = exchange.get_balances().await.unwrap();
        assert_eq!(second["BTC"].free, dec!(0.001));
        // 스크립트 소진 후에는 마지막 스냅샷 반복
        let third = exchange.get_balances().await.unwrap();
        assert_eq!(third["BTC"].free, dec!(0.001));
    }

    #[tokio::test]
    async fn test_scripted_buy_failure() {
        let exchange =
            MockExchange::new().with_buy_response(MockResponse::ApiError("주문 거부".to_string()));

        let result = exchange
            .market_buy_quote(&Symbol::krw("BTC"), dec!(5500))
            .await;

        assert!(matches!(result, Err(ExchangeError::ApiError { .. })));
        assert_eq!(exchange.calls.buy.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_balance_summary_values_holdings() {
        let exchange = MockExchange::new()
            .with_balance("KRW", dec!(10000))
            .with_balance("XRP", dec!(10))
            .with_ticker_price(dec!(400));

        let summary = exchange.balance_summary().await.unwrap();

        assert_eq!(summary.krw, dec!(10000));
        assert_eq!(summary.holdings.len(), 1);
        assert_eq!(summary.holdings[0].value_krw, dec!(4000));
        assert_eq!(summary.total_krw, dec!(14000));
    }

    #[tokio::test]
    async fn test_factory_fail_for_account() {
        let factory = MockFactory::new(Arc::new(MockExchange::new())).fail_for("account_2");

        let ok = factory.create(&Account::new("account_1", "k", "s"));
        let err = factory.create(&Account::new("account_2", "k", "s"));

        assert!(ok.is_ok());
        assert!(matches!(err, Err(ExchangeError::Unauthorized(_))));
    }
}
