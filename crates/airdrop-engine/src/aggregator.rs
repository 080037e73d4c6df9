//! 결과 집계기.
//!
//! 오케스트레이터가 채운 결과 채널을 비우면서 전체/심볼별
//! 성공·실패를 집계합니다. 모든 작업이 끝난 뒤 단일 소비자가
//! 호출하며, 빈 채널을 다시 비우면 0이 나옵니다.

use tokio::sync::mpsc;
use tracing::{error, info};

use airdrop_core::{RunSummary, Symbol, TradeResult};

/// 결과 채널을 비우고 집계를 반환합니다.
///
/// 결과 하나하나를 성공/실패 로그로 남기므로 어떤 결과도 조용히
/// 사라지지 않습니다.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<TradeResult>) -> RunSummary {
    let mut summary = RunSummary::default();

    while let Ok(result) = rx.try_recv() {
        if result.success {
            info!(
                account = %result.account,
                symbol = %result.symbol.base,
                "✅ 성공"
            );
        } else {
            error!(
                account = %result.account,
                symbol = %result.symbol.base,
                error = %result.error.as_deref().unwrap_or("알 수 없는 오류"),
                "❌ 실패"
            );
        }
        summary.record(&result);
    }

    summary
}

/// 실행 결과 요약을 로깅합니다.
pub fn log_summary(account_count: usize, symbols: &[Symbol], summary: &RunSummary) {
    info!("=== 전체 결과 요약 ===");
    info!(
        total_tasks = account_count * symbols.len(),
        accounts = account_count,
        coins = symbols.len(),
        success = summary.success,
        fail = summary.fail,
        "실행 집계"
    );

    if symbols.len() > 1 {
        for symbol in symbols {
            if let Some(tally) = summary.per_symbol.get(&symbol.base) {
                info!(
                    symbol = %symbol.base,
                    success = tally.success,
                    fail = tally.fail,
                    "코인별 결과"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_core::{OrderResult, Side};
    use rust_decimal_macros::dec;

    fn order(side: Side) -> OrderResult {
        OrderResult::market("1", Symbol::krw("BTC"), side, dec!(0.001))
    }

    #[tokio::test]
    async fn test_drain_tallies_results() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(TradeResult::success(
            "account_1",
            Symbol::krw("BTC"),
            order(Side::Buy),
            order(Side::Sell),
        ))
        .unwrap();
        tx.send(TradeResult::failure(
            "account_2",
            Symbol::krw("BTC"),
            "매수 실패",
            None,
        ))
        .unwrap();
        drop(tx);

        let summary = drain(&mut rx);

        assert_eq!(summary.success, 1);
        assert_eq!(summary.fail, 1);
        assert_eq!(summary.per_symbol["BTC"].success, 1);
        assert_eq!(summary.per_symbol["BTC"].fail, 1);
    }

    #[tokio::test]
    async fn test_drain_empty_channel_returns_zeros() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TradeResult>();
        drop(tx);

        let summary = drain(&mut rx);
        assert_eq!(summary.success, 0);
        assert_eq!(summary.fail, 0);
        assert!(summary.per_symbol.is_empty());
    }

    #[tokio::test]
    async fn test_second_drain_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(TradeResult::failure(
            "account_1",
            Symbol::krw("XRP"),
            "매수 실패",
            None,
        ))
        .unwrap();
        drop(tx);

        let first = drain(&mut rx);
        let second = drain(&mut rx);

        assert_eq!(first.total(), 1);
        assert_eq!(second.total(), 0);
        assert!(second.per_symbol.is_empty());
    }
}
