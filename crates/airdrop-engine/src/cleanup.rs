//! 소액 코인 정리 시퀀서.
//!
//! 최소 주문 금액 미만이라 직접 매도할 수 없는 소액 잔고를,
//! 최소 금액 이상으로 추가 매수한 뒤 전량 매도하는 방식으로
//! 정리합니다. 빗썸의 최소 주문 금액 정책을 전제로 합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use airdrop_core::{Account, CleanupResult, EventConfig, Side, SmallHolding, Symbol, QUOTE_CURRENCY};
use airdrop_exchange::{BalanceMap, Exchange, ExchangeFactory};

/// 잔고에서 정리 대상 소액 코인을 식별합니다.
///
/// 호가 통화(KRW)와 보유량이 없는 자산은 제외하고, 시세 항목이 없는
/// 코인은 경고 후 건너뜁니다. 평가 금액이 0 초과, 기준 금액 미만인
/// 코인만 정리 대상입니다. 결과는 코인명 순으로 정렬됩니다.
pub fn identify_small_holdings(
    balances: &BalanceMap,
    prices: &HashMap<String, Decimal>,
    threshold: Decimal,
) -> Vec<SmallHolding> {
    let mut holdings = Vec::new();

    for (coin, balance) in balances {
        if coin == QUOTE_CURRENCY {
            continue;
        }
        if balance.free <= Decimal::ZERO {
            continue;
        }

        let Some(price) = prices.get(&coin.to_uppercase()) else {
            warn!(coin = %coin, amount = %balance.free, "시세 정보 없음, 건너뜀");
            continue;
        };

        let value_krw = balance.free * price;
        info!(
            coin = %coin,
            amount = %balance.free,
            price = %price,
            value_krw = %value_krw,
            "보유 코인 평가"
        );

        if value_krw > Decimal::ZERO && value_krw < threshold {
            info!(coin = %coin, value_krw = %value_krw, "⚠️ 소액 코인 발견");
            holdings.push(SmallHolding {
                coin: coin.clone(),
                amount: balance.free,
                value_krw,
            });
        }
    }

    holdings.sort_by(|a, b| a.coin.cmp(&b.coin));
    holdings
}

/// 한 계정의 소액 코인을 정리합니다.
///
/// 잔고나 시세 조회에 실패하면 빈 결과로 종료하고, 개별 코인의
/// 정리 실패는 해당 코인만 실패로 기록한 채 다음 코인으로
/// 진행합니다.
pub async fn cleanup_account(
    factory: Arc<dyn ExchangeFactory>,
    account: &Account,
    config: &EventConfig,
) -> CleanupResult {
    let account_id = &account.account_id;
    let mut result = CleanupResult::default();

    info!(account = %account_id, "소액 코인 정리 시작");

    let exchange = match factory.create(account) {
        Ok(exchange) => exchange,
        Err(e) => {
            error!(account = %account_id, error = %e, "거래소 클라이언트 생성 실패");
            return result;
        }
    };

    let balances = match exchange.get_balances().await {
        Ok(balances) if !balances.is_empty() => balances,
        Ok(_) => {
            error!(account = %account_id, "잔고 조회 결과 없음");
            return result;
        }
        Err(e) => {
            error!(account = %account_id, error = %e, "잔고 조회 실패");
            return result;
        }
    };
    info!(
        account = %account_id,
        coins = balances.len().saturating_sub(1),
        "보유 코인 검사 중 (KRW 제외)"
    );

    let prices = match exchange.get_all_prices().await {
        Ok(prices) => prices,
        Err(e) => {
            error!(account = %account_id, error = %e, "시세 조회 실패");
            return result;
        }
    };

    let holdings =
        identify_small_holdings(&balances, &prices, config.small_holding_threshold_krw);
    if holdings.is_empty() {
        info!(account = %account_id, "정리할 소액 코인이 없습니다");
        return result;
    }
    info!(account = %account_id, count = holdings.len(), "발견된 소액 코인");

    for holding in &holdings {
        info!(account = %account_id, coin = %holding.coin, "정리 중...");

        if liquidate_coin(exchange.as_ref(), account_id, &holding.coin, config).await {
            result.record_cleaned(&holding.coin);
        } else {
            result.record_failed(&holding.coin);
        }

        // 다음 코인 처리 전 대기
        sleep(Duration::from_secs(config.coin_pause_secs)).await;
    }

    info!(
        account = %account_id,
        cleaned = result.cleaned_coins.len(),
        failed = result.failed_coins.len(),
        "소액 코인 정리 완료"
    );
    result
}

/// 단일 코인에 대해 추가 매수 후 전량 매도를 수행합니다.
///
/// 정리 매수는 같은 계정의 잔고 상태를 바꾸므로 코인별로 순차
/// 실행해야 합니다.
async fn liquidate_coin(
    exchange: &dyn Exchange,
    account_id: &str,
    coin: &str,
    config: &EventConfig,
) -> bool {
    let symbol = Symbol::krw(coin);

    // 최소 주문 금액 이상으로 추가 매수
    match exchange
        .market_buy_quote(&symbol, config.cleanup_buy_amount_krw)
        .await
    {
        Ok(_) => {
            info!(
                account = %account_id,
                coin = %coin,
                amount_krw = %config.cleanup_buy_amount_krw,
                "추가 매수 완료"
            );
        }
        Err(e) => {
            error!(account = %account_id, coin = %coin, error = %e, "추가 매수 실패");
            return false;
        }
    }

    // 잔고 반영 대기
    sleep(Duration::from_secs(config.balance_poll_delay_secs)).await;

    // 잔고 재확인
    let balance = match exchange.get_balance(coin).await {
        Ok(balance) => balance,
        Err(e) => {
            error!(account = %account_id, coin = %coin, error = %e, "잔고 재확인 실패");
            return false;
        }
    };
    if balance.free <= Decimal::ZERO {
        error!(account = %account_id, coin = %coin, "매도 가능 수량 없음");
        return false;
    }

    // 전량 매도
    match exchange
        .create_market_order(&symbol, Side::Sell, balance.free)
        .await
    {
        Ok(_) => {
            info!(account = %account_id, coin = %coin, amount = %balance.free, "전량 매도 완료");
            true
        }
        Err(e) => {
            error!(account = %account_id, coin = %coin, error = %e, "매도 실패");
            false
        }
    }
}

/// 모든 계정의 소액 코인을 정리하고 정리된 총 코인 수를 반환합니다.
pub async fn cleanup_all(
    factory: Arc<dyn ExchangeFactory>,
    accounts: &[Account],
    config: &EventConfig,
) -> usize {
    info!("=== 모든 계정 소액 코인 정리 시작 ===");
    info!(accounts = accounts.len(), "정리할 계정 수");

    if accounts.is_empty() {
        return 0;
    }

    let permits = config.max_concurrency.max(1).min(accounts.len());
    let semaphore = Arc::new(Semaphore::new(permits));

    let mut join_set = JoinSet::new();
    for account in accounts {
        let factory = factory.clone();
        let semaphore = semaphore.clone();
        let config = config.clone();
        let account = account.clone();

        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return CleanupResult::default();
            };
            cleanup_account(factory, &account, &config).await
        });
    }

    let mut total_cleaned = 0;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => total_cleaned += result.total_cleaned,
            Err(e) => error!(error = %e, "정리 작업 실행 중 오류"),
        }
    }

    info!(total_cleaned, "=== 소액 정리 완료 ===");
    total_cleaned
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use airdrop_exchange::{Balance, MockExchange, MockFactory, MockResponse};
    use rust_decimal_macros::dec;

    fn test_config() -> EventConfig {
        EventConfig {
            balance_poll_delay_secs: 0,
            coin_pause_secs: 0,
            ..Default::default()
        }
    }

    fn balance(free: Decimal) -> Balance {
        Balance {
            free,
            used: Decimal::ZERO,
            total: free,
        }
    }

    fn account() -> Account {
        Account::new("account_1", "key", "secret")
    }

    #[test]
    fn test_identify_small_holdings_fixture() {
        // KRW 제외, BTC는 기준 초과(6000), NO_PRICE는 시세 없음 → XRP만 소액
        let mut balances = BalanceMap::new();
        balances.insert("KRW".to_string(), balance(dec!(10000)));
        balances.insert("XRP".to_string(), balance(dec!(10)));
        balances.insert("BTC".to_string(), balance(dec!(0.01)));
        balances.insert("NO_PRICE".to_string(), balance(dec!(1)));

        let mut prices = HashMap::new();
        prices.insert("XRP".to_string(), dec!(400));
        prices.insert("BTC".to_string(), dec!(600000));

        let holdings = identify_small_holdings(&balances, &prices, dec!(5000));

        assert_eq!(
            holdings,
            vec![SmallHolding {
                coin: "XRP".to_string(),
                amount: dec!(10),
                value_krw: dec!(4000),
            }]
        );
    }

    #[test]
    fn test_identify_skips_zero_amounts() {
        let mut balances = BalanceMap::new();
        balances.insert("XRP".to_string(), balance(Decimal::ZERO));

        let mut prices = HashMap::new();
        prices.insert("XRP".to_string(), dec!(400));

        assert!(identify_small_holdings(&balances, &prices, dec!(5000)).is_empty());
    }

    #[test]
    fn test_identify_sorted_by_coin() {
        let mut balances = BalanceMap::new();
        balances.insert("XRP".to_string(), balance(dec!(1)));
        balances.insert("ADA".to_string(), balance(dec!(1)));

        let mut prices = HashMap::new();
        prices.insert("XRP".to_string(), dec!(400));
        prices.insert("ADA".to_string(), dec!(700));

        let coins: Vec<String> = identify_small_holdings(&balances, &prices, dec!(5000))
            .into_iter()
            .map(|h| h.coin)
            .collect();
        assert_eq!(coins, vec!["ADA".to_string(), "XRP".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_account_full_cycle() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("KRW", dec!(50000))
                .with_balance("XRP", dec!(10))
                .with_price("XRP", dec!(400)),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = cleanup_account(factory, &account(), &test_config()).await;

        assert_eq!(result.cleaned_coins, vec!["XRP".to_string()]);
        assert_eq!(result.total_cleaned, 1);
        assert!(result.failed_coins.is_empty());
        // 추가 매수 1회 + 전량 매도 1회
        assert_eq!(exchange.calls.buy.load(Ordering::SeqCst), 1);
        assert_eq!(exchange.calls.sell.load(Ordering::SeqCst), 1);
        assert_eq!(*exchange.sold_amounts.lock().unwrap(), vec![dec!(10)]);
    }

    #[tokio::test]
    async fn test_cleanup_aborts_when_prices_unavailable() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("XRP", dec!(10))
                .fail_prices(),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = cleanup_account(factory, &account(), &test_config()).await;

        assert_eq!(result.total_cleaned, 0);
        assert!(result.cleaned_coins.is_empty());
        assert_eq!(exchange.calls.buy.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cleanup_aborts_when_balances_unavailable() {
        let exchange = Arc::new(MockExchange::new().fail_balances());
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = cleanup_account(factory, &account(), &test_config()).await;

        assert_eq!(result.total_cleaned, 0);
        assert_eq!(exchange.calls.prices.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_per_coin_failure_continues_batch() {
        // 매수가 실패하므로 두 소액 코인 모두 실패로 기록되지만
        // 배치는 끝까지 진행됨
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("XRP", dec!(10))
                .with_balance("ADA", dec!(2))
                .with_price("XRP", dec!(400))
                .with_price("ADA", dec!(700))
                .with_buy_response(MockResponse::ApiError("주문 거부".to_string())),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));

        let result = cleanup_account(factory, &account(), &test_config()).await;

        assert_eq!(result.total_cleaned, 0);
        assert_eq!(
            result.failed_coins,
            vec!["ADA".to_string(), "XRP".to_string()]
        );
        // 코인마다 매수 시도
        assert_eq!(exchange.calls.buy.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cleanup_all_sums_cleaned() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("XRP", dec!(10))
                .with_price("XRP", dec!(400)),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));
        let accounts = vec![
            Account::new("account_1", "k", "s"),
            Account::new("account_2", "k", "s"),
        ];

        let total = cleanup_all(factory, &accounts, &test_config()).await;
        assert_eq!(total, 2);
    }
}
