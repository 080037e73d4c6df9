//! 계정별 거래 시퀀서.
//!
//! 한 (계정, 심볼) 쌍에 대해 매수 → 대기 → 잔고 확인 → 전량 매도
//! 순서를 실행합니다. 모든 실패는 `TradeResult` 값으로 변환되며
//! 호출자에게 에러가 전파되지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use airdrop_core::{Account, EventConfig, Side, Symbol, TradeResult, QUOTE_CURRENCY};
use airdrop_exchange::{Exchange, ExchangeFactory};

/// 한 계정으로 이벤트에 참여합니다.
///
/// 계정 자격증명으로 전용 거래소 클라이언트를 만들어 매수/매도
/// 시퀀스를 실행합니다. 매도 실패는 단일 시도로 종료되며, 이 경우
/// 매수로 생긴 포지션이 남는다는 사실이 결과에 그대로 드러납니다.
pub async fn run_trade(
    factory: Arc<dyn ExchangeFactory>,
    account: Account,
    symbol: Symbol,
    config: &EventConfig,
) -> TradeResult {
    let account_id = account.account_id.clone();
    info!(account = %account_id, symbol = %symbol, "에어드랍 이벤트 시작");

    // 계정 전용 클라이언트 생성
    let exchange = match factory.create(&account) {
        Ok(exchange) => exchange,
        Err(e) => {
            error!(account = %account_id, error = %e, "거래소 클라이언트 생성 실패");
            return TradeResult::failure(
                account_id,
                symbol,
                format!("거래소 클라이언트 생성 실패: {}", e),
                None,
            );
        }
    };

    log_krw_balance(exchange.as_ref(), &account_id, "초기").await;

    // 1. 시장가 매수
    info!(
        account = %account_id,
        symbol = %symbol,
        amount = %config.trade_amount_krw,
        "매수 시작"
    );
    let buy_order = match exchange.market_buy_quote(&symbol, config.trade_amount_krw).await {
        Ok(order) => {
            info!(account = %account_id, order_id = %order.id, "매수 완료");
            order
        }
        Err(e) => {
            error!(account = %account_id, symbol = %symbol, error = %e, "매수 실패");
            return TradeResult::failure(account_id, symbol, format!("매수 실패: {}", e), None);
        }
    };

    // 2. 잔고 반영 대기
    sleep(Duration::from_secs(config.wait_secs)).await;

    // 3. 잔고 확인 (최대 N회 재시도)
    let available = wait_for_balance(exchange.as_ref(), &symbol.base, config).await;
    if available <= Decimal::ZERO {
        error!(account = %account_id, coin = %symbol.base, "매도할 잔고 없음");
        return TradeResult::failure(account_id, symbol, "매도할 잔고 없음", Some(buy_order));
    }

    // 4. 전량 매도
    info!(
        account = %account_id,
        symbol = %symbol,
        amount = %available,
        "매도 시작"
    );
    let sell_order = match exchange
        .create_market_order(&symbol, Side::Sell, available)
        .await
    {
        Ok(order) => {
            info!(account = %account_id, order_id = %order.id, "매도 완료");
            order
        }
        Err(e) => {
            error!(account = %account_id, symbol = %symbol, error = %e, "매도 실패");
            return TradeResult::failure(
                account_id,
                symbol,
                format!("매도 실패: {}", e),
                Some(buy_order),
            );
        }
    };

    log_krw_balance(exchange.as_ref(), &account_id, "최종").await;
    info!(account = %account_id, symbol = %symbol, "에어드랍 이벤트 완료 ✅");

    TradeResult::success(account_id, symbol, buy_order, sell_order)
}

/// 매수 후 기준 자산 잔고를 확인합니다.
///
/// 양수 잔고가 확인되면 즉시 반환하고, 모든 시도에서 잔고가 없으면
/// 0을 반환합니다.
async fn wait_for_balance(exchange: &dyn Exchange, coin: &str, config: &EventConfig) -> Decimal {
    for attempt in 0..config.balance_poll_attempts {
        match exchange.get_balance(coin).await {
            Ok(balance) if balance.free > Decimal::ZERO => return balance.free,
            Ok(_) => {
                debug!(coin = %coin, attempt = attempt + 1, "잔고 미반영, 재확인 예정");
            }
            Err(e) => {
                warn!(coin = %coin, attempt = attempt + 1, error = %e, "잔고 조회 실패");
            }
        }

        if attempt + 1 < config.balance_poll_attempts {
            sleep(Duration::from_secs(config.balance_poll_delay_secs)).await;
        }
    }

    Decimal::ZERO
}

/// 원화 잔고를 로깅합니다. 조회 실패는 시퀀스에 영향을 주지 않습니다.
async fn log_krw_balance(exchange: &dyn Exchange, account_id: &str, label: &str) {
    match exchange.get_balance(QUOTE_CURRENCY).await {
        Ok(balance) => {
            info!(account = %account_id, krw = %balance.free, "{} KRW 잔고", label);
        }
        Err(e) => {
            debug!(account = %account_id, error = %e, "KRW 잔고 조회 실패");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use airdrop_exchange::{Balance, BalanceMap, MockExchange, MockFactory, MockResponse};
    use rust_decimal_macros::dec;

    fn test_config() -> EventConfig {
        EventConfig {
            wait_secs: 0,
            balance_poll_delay_secs: 0,
            ..Default::default()
        }
    }

    fn account() -> Account {
        Account::new("account_1", "key", "secret")
    }

    fn balance_map(entries: &[(&str, Decimal)]) -> BalanceMap {
        entries
            .iter()
            .map(|(coin, free)| {
                (
                    coin.to_string(),
                    Balance {
                        free: *free,
                        used: Decimal::ZERO,
                        total: *free,
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_success_returns_both_orders() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("KRW", dec!(100000))
                .with_balance("BTC", dec!(0.001)),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = run_trade(factory, account(), Symbol::krw("BTC"), &test_config()).await;

        assert!(result.success);
        assert!(result.buy_order.is_some());
        assert!(result.sell_order.is_some());
        assert!(result.error.is_none());
        // 확인된 잔고 전량이 매도됨
        assert_eq!(*exchange.sold_amounts.lock().unwrap(), vec![dec!(0.001)]);
    }

    #[tokio::test]
    async fn test_buy_failure_stops_sequence() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_buy_response(MockResponse::ApiError("주문 거부".to_string())),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = run_trade(factory, account(), Symbol::krw("BTC"), &test_config()).await;

        assert!(!result.success);
        assert!(result.buy_order.is_none());
        assert!(result.sell_order.is_none());
        assert!(result.error.as_deref().unwrap().starts_with("매수 실패"));
        // 매도는 시도하지 않음
        assert_eq!(exchange.calls.sell.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_balance_after_three_polls() {
        // 매수는 성공하지만 잔고가 끝까지 반영되지 않는 경우
        let exchange = Arc::new(MockExchange::new().with_balance("KRW", dec!(100000)));
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = run_trade(factory, account(), Symbol::krw("BTC"), &test_config()).await;

        assert!(!result.success);
        assert!(result.buy_order.is_some());
        assert!(result.sell_order.is_none());
        assert_eq!(result.error.as_deref(), Some("매도할 잔고 없음"));
        // 초기 KRW 조회 1회 + 잔고 폴링 3회
        assert_eq!(exchange.calls.balance.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_balance_appears_on_second_poll() {
        // 스냅샷 순서: 초기 KRW 로그 → 1차 폴링(미반영) → 2차 폴링(반영)
        let snapshots = vec![
            balance_map(&[("KRW", dec!(100000))]),
            balance_map(&[("KRW", dec!(94500))]),
            balance_map(&[("KRW", dec!(94500)), ("XRP", dec!(13.75))]),
        ];
        let exchange = Arc::new(MockExchange::new().with_balance_script(snapshots));
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = run_trade(factory, account(), Symbol::krw("XRP"), &test_config()).await;

        assert!(result.success);
        assert_eq!(*exchange.sold_amounts.lock().unwrap(), vec![dec!(13.75)]);
    }

    #[tokio::test]
    async fn test_sell_failure_keeps_buy_order() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("BTC", dec!(0.001))
                .with_sell_response(MockResponse::ApiError("주문 거부".to_string())),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = run_trade(factory, account(), Symbol::krw("BTC"), &test_config()).await;

        assert!(!result.success);
        assert!(result.buy_order.is_some());
        assert!(result.sell_order.is_none());
        assert!(result.error.as_deref().unwrap().starts_with("매도 실패"));
    }

    #[tokio::test]
    async fn test_factory_failure_becomes_result() {
        let factory = Arc::new(MockFactory::new(Arc::new(MockExchange::new())).fail_for("account_1"));

        let result = run_trade(factory, account(), Symbol::krw("BTC"), &test_config()).await;

        assert!(!result.success);
        assert!(result.buy_order.is_none());
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .starts_with("거래소 클라이언트 생성 실패"));
    }
}
