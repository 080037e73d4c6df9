//! 다일 이벤트 스케줄러.
//!
//! 여러 날에 걸친 이벤트를 KST 고정 시각에 재실행합니다.
//! 1일차는 즉시 실행하고, 2일차부터는 무인 실행이므로 설정과
//! 무관하게 짧은 고정 대기 시간을 사용합니다. 대기는 짧은 조각으로
//! 나누어 수행하므로 중단 신호에 즉시 반응할 수 있습니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::{Asia::Seoul, Tz};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use airdrop_core::{Account, EventConfig, Symbol};
use airdrop_exchange::ExchangeFactory;

use crate::cleanup;
use crate::orchestrator;

/// 대기 루프의 최대 sleep 조각 (초).
const MAX_SLEEP_CHUNK_SECS: u64 = 60;

/// 다일 이벤트 실행 계획.
#[derive(Debug, Clone)]
pub struct SchedulePlan {
    /// 이벤트 진행 일수 (1이면 1회만 실행)
    pub event_days: u32,
    /// 소액 코인 정리 여부 (전체 일정에서 최대 1회)
    pub cleanup: bool,
}

/// 현재 KST 시각.
fn kst_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&Seoul)
}

/// 다음 스케줄 실행 시각을 반환합니다.
///
/// 오늘의 트리거 시각이 아직 지나지 않았으면 오늘, 지났으면 내일
/// 같은 시각입니다.
pub fn next_run_time(now: DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    // 범위 보정 후에는 항상 유효한 시각
    let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap();
    let scheduled = now
        .timezone()
        .from_local_datetime(&now.date_naive().and_time(time))
        .single()
        // KST는 DST가 없어 로컬 시각이 항상 단일 해석됨
        .unwrap_or(now);

    if scheduled <= now {
        scheduled + chrono::Duration::days(1)
    } else {
        scheduled
    }
}

/// 목표 시각까지 대기합니다.
///
/// 남은 시간을 매 조각마다 다시 계산하면서 최대 60초 단위로
/// 나누어 잠들기 때문에, 중단 신호가 오면 곧바로 반환합니다.
///
/// # Returns
/// * `true` - 목표 시각 도달
/// * `false` - 중단 신호로 대기 종료
pub async fn wait_until(target: DateTime<Tz>, shutdown: &CancellationToken) -> bool {
    loop {
        let now = kst_now();
        let remaining = (target - now).num_seconds();
        if remaining <= 0 {
            return true;
        }

        // 정각마다 남은 시간 안내
        let hours_until = remaining / 3600;
        let minutes_until = (remaining % 3600) / 60;
        if now.minute() == 0 && hours_until >= 1 {
            info!(
                hours = hours_until,
                minutes = minutes_until,
                "다음 실행까지 남은 시간"
            );
        }

        let chunk = Duration::from_secs((remaining as u64).min(MAX_SLEEP_CHUNK_SECS));
        tokio::select! {
            _ = shutdown.cancelled() => {
                warn!("대기 중단 신호 수신");
                return false;
            }
            _ = tokio::time::sleep(chunk) => {}
        }
    }
}

/// 다음 날 실행 시각까지의 대기를 담당하는 게이트.
///
/// 스케줄 루프가 벽시계에 직접 묶이지 않도록 분리한 경계로,
/// 테스트에서는 즉시 통과하는 구현으로 대체합니다.
#[async_trait]
pub trait DayGate: Send + Sync {
    /// 다음 실행 시각까지 대기합니다. 중단되면 `false`.
    async fn wait_next(&self, shutdown: &CancellationToken) -> bool;
}

/// KST 고정 시각 게이트.
pub struct KstDayGate {
    /// 실행 시각 (시)
    pub hour: u32,
    /// 실행 시각 (분)
    pub minute: u32,
}

impl KstDayGate {
    /// 설정의 스케줄 시각으로 게이트를 생성합니다.
    pub fn from_config(config: &EventConfig) -> Self {
        Self {
            hour: config.schedule_hour,
            minute: config.schedule_minute,
        }
    }
}

#[async_trait]
impl DayGate for KstDayGate {
    async fn wait_next(&self, shutdown: &CancellationToken) -> bool {
        let target = next_run_time(kst_now(), self.hour, self.minute);
        info!(
            next_run = %target.format("%Y-%m-%d %H:%M:%S"),
            "다음 실행까지 대기 중... (중단: Ctrl+C)"
        );
        wait_until(target, shutdown).await
    }
}

/// 해당 일차에 적용할 설정을 반환합니다.
///
/// 1일차는 설정된 대기 시간을 그대로 쓰고, 2일차부터는 짧은
/// 고정 대기 시간으로 바꿉니다.
fn day_config(config: &EventConfig, day: u32) -> EventConfig {
    if day <= 1 {
        config.clone()
    } else {
        config.scheduled_run()
    }
}

/// 이벤트 일정 전체를 실행합니다.
///
/// 마지막 일차 실행이 끝나면 더 이상 스케줄을 잡지 않습니다.
/// 일차 사이 대기 중 중단 신호가 오면 남은 일정을 포기하고
/// 반환하며, 실행 중인 계정 작업은 끝까지 진행됩니다.
#[allow(clippy::too_many_arguments)]
pub async fn run_schedule(
    factory: Arc<dyn ExchangeFactory>,
    accounts: &[Account],
    symbols: &[Symbol],
    plan: &SchedulePlan,
    config: &EventConfig,
    gate: &dyn DayGate,
    shutdown: &CancellationToken,
) {
    let event_days = plan.event_days.max(1);
    let mut cleanup_pending = plan.cleanup;

    for day in 1..=event_days {
        info!(
            day,
            total_days = event_days,
            now = %kst_now().format("%Y-%m-%d %H:%M:%S"),
            "=== 일차 실행 ==="
        );

        let day_config = day_config(config, day);
        if day > 1 {
            info!(wait_secs = day_config.wait_secs, "스케줄 실행: 대기 시간 조정");
        }

        orchestrator::participate_all(factory.clone(), accounts, symbols, &day_config).await;

        // 소액 정리는 전체 일정에서 한 번만
        if cleanup_pending {
            info!("=== 소액 코인 정리 시작 ===");
            cleanup::cleanup_all(factory.clone(), accounts, &day_config).await;
            cleanup_pending = false;
        }

        if day >= event_days {
            info!(total_days = event_days, "=== 모든 이벤트 완료 ===");
            break;
        }

        if !gate.wait_next(shutdown).await {
            info!("사용자에 의해 중단되었습니다");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use airdrop_exchange::{MockExchange, MockFactory};
    use rust_decimal_macros::dec;

    struct TestGate {
        calls: AtomicU32,
    }

    impl TestGate {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DayGate for TestGate {
        async fn wait_next(&self, _shutdown: &CancellationToken) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn test_config() -> EventConfig {
        EventConfig {
            wait_secs: 0,
            scheduled_wait_secs: 0,
            balance_poll_delay_secs: 0,
            coin_pause_secs: 0,
            ..Default::default()
        }
    }

    fn trading_mock() -> Arc<MockExchange> {
        Arc::new(
            MockExchange::new()
                .with_balance("KRW", dec!(100000))
                .with_balance("BTC", dec!(0.001)),
        )
    }

    #[test]
    fn test_next_run_time_today_when_future() {
        let now = Seoul.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let next = next_run_time(now, 23, 30);

        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!(next.hour(), 23);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn test_next_run_time_tomorrow_when_passed() {
        let now = Seoul.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let next = next_run_time(now, 0, 1);

        assert_eq!(next.date_naive(), now.date_naive() + chrono::Duration::days(1));
        assert_eq!(next.hour(), 0);
        assert_eq!(next.minute(), 1);
    }

    #[test]
    fn test_day_config_shortens_wait_from_day_two() {
        let config = EventConfig {
            wait_secs: 30,
            scheduled_wait_secs: 2,
            ..Default::default()
        };

        assert_eq!(day_config(&config, 1).wait_secs, 30);
        assert_eq!(day_config(&config, 2).wait_secs, 2);
        assert_eq!(day_config(&config, 3).wait_secs, 2);
    }

    #[tokio::test]
    async fn test_wait_until_past_target_returns_immediately() {
        let shutdown = CancellationToken::new();
        let target = kst_now() - chrono::Duration::seconds(10);

        assert!(wait_until(target, &shutdown).await);
    }

    #[tokio::test]
    async fn test_wait_until_stops_on_cancellation() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let target = kst_now() + chrono::Duration::seconds(3600);

        assert!(!wait_until(target, &shutdown).await);
    }

    #[tokio::test]
    async fn test_single_day_never_waits() {
        let exchange = trading_mock();
        let factory = Arc::new(MockFactory::new(exchange.clone()));
        let gate = TestGate::new();
        let plan = SchedulePlan {
            event_days: 1,
            cleanup: false,
        };
        let accounts = vec![Account::new("account_1", "k", "s")];

        run_schedule(
            factory,
            &accounts,
            &[Symbol::krw("BTC")],
            &plan,
            &test_config(),
            &gate,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(gate.calls.load(Ordering::SeqCst), 0);
        assert_eq!(exchange.calls.buy.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_three_days_runs_three_times() {
        let exchange = trading_mock();
        let factory = Arc::new(MockFactory::new(exchange.clone()));
        let gate = TestGate::new();
        let plan = SchedulePlan {
            event_days: 3,
            cleanup: false,
        };
        let accounts = vec![Account::new("account_1", "k", "s")];

        run_schedule(
            factory,
            &accounts,
            &[Symbol::krw("BTC")],
            &plan,
            &test_config(),
            &gate,
            &CancellationToken::new(),
        )
        .await;

        // 일차 사이 대기 2회, 실행 3회
        assert_eq!(gate.calls.load(Ordering::SeqCst), 2);
        assert_eq!(exchange.calls.buy.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cleanup_runs_once_across_schedule() {
        // 소액 정리는 첫 일차에만 실행되어야 함
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("KRW", dec!(100000))
                .with_balance("BTC", dec!(0.001)),
        );
        let factory = Arc::new(MockFactory::new(exchange.clone()));
        let gate = TestGate::new();
        let plan = SchedulePlan {
            event_days: 3,
            cleanup: true,
        };
        let accounts = vec![Account::new("account_1", "k", "s")];

        run_schedule(
            factory,
            &accounts,
            &[Symbol::krw("BTC")],
            &plan,
            &test_config(),
            &gate,
            &CancellationToken::new(),
        )
        .await;

        // 정리 패스의 시세 테이블 조회는 계정당 1회, 일정 전체에서 1회만
        assert_eq!(exchange.calls.prices.load(Ordering::SeqCst), 1);
    }
}
