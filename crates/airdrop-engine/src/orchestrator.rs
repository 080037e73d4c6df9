//! 동시 실행 오케스트레이터.
//!
//! 계정 × 심볼 조합을 독립 작업으로 만들어 제한된 동시성으로
//! 실행합니다. 작업 간 공유 상태는 결과 채널 하나뿐이며,
//! 한 작업의 실패가 다른 작업을 중단시키지 않습니다.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use airdrop_core::{Account, EventConfig, RunSummary, Symbol, TradeResult};
use airdrop_exchange::ExchangeFactory;

use crate::aggregator;
use crate::sequencer;

/// 모든 (계정, 심볼) 조합을 동시 실행하고 결과 채널을 반환합니다.
///
/// 반환 시점에는 모든 작업이 완료되어 있으며, 채널에는 조합당
/// 하나의 `TradeResult`가 들어 있습니다. 계정이나 심볼이 비어 있으면
/// 아무 작업도 수행하지 않습니다.
pub async fn run_all(
    factory: Arc<dyn ExchangeFactory>,
    accounts: &[Account],
    symbols: &[Symbol],
    config: &EventConfig,
) -> mpsc::UnboundedReceiver<TradeResult> {
    let (tx, rx) = mpsc::unbounded_channel();

    let tasks: Vec<(Account, Symbol)> = accounts
        .iter()
        .flat_map(|account| {
            symbols
                .iter()
                .map(move |symbol| (account.clone(), symbol.clone()))
        })
        .collect();

    if tasks.is_empty() {
        warn!("실행할 작업이 없습니다");
        return rx;
    }

    // 워커 수는 설정값과 작업 수 중 작은 쪽으로 제한
    let permits = config.max_concurrency.max(1).min(tasks.len());
    let semaphore = Arc::new(Semaphore::new(permits));
    info!(tasks = tasks.len(), workers = permits, "작업 실행 시작");

    let mut join_set = JoinSet::new();
    for (account, symbol) in tasks {
        let factory = factory.clone();
        let tx = tx.clone();
        let semaphore = semaphore.clone();
        let config = config.clone();

        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                // 세마포어는 닫히지 않으므로 도달하지 않음
                return;
            };

            let account_id = account.account_id.clone();
            let symbol_label = symbol.clone();
            let result = sequencer::run_trade(factory, account, symbol, &config).await;

            if tx.send(result).is_err() {
                warn!(account = %account_id, symbol = %symbol_label, "결과 수신자가 닫힘");
            }
        });
    }
    drop(tx);

    // 모든 작업 완료 대기. 개별 작업의 실행 오류(패닉 등)는 기록만 하고
    // 나머지 작업은 계속 진행합니다.
    while let Some(joined) = join_set.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "작업 실행 중 오류");
        }
    }

    rx
}

/// 선택된 계정 전체로 이벤트에 참여하고 결과를 집계합니다.
pub async fn participate_all(
    factory: Arc<dyn ExchangeFactory>,
    accounts: &[Account],
    symbols: &[Symbol],
    config: &EventConfig,
) -> RunSummary {
    info!("=== 다중 계정 에어드랍 시작 ===");
    info!(
        accounts = accounts.len(),
        symbols = %symbols
            .iter()
            .map(|s| s.base.clone())
            .collect::<Vec<_>>()
            .join(", "),
        amount_krw = %config.trade_amount_krw,
        "참여 설정"
    );

    if accounts.is_empty() || symbols.is_empty() {
        error!("참여할 계정 또는 심볼이 없습니다");
        return RunSummary::default();
    }

    let mut rx = run_all(factory, accounts, symbols, config).await;

    info!("=== 실행 결과 ===");
    let summary = aggregator::drain(&mut rx);
    aggregator::log_summary(accounts.len(), symbols, &summary);
    summary
}
