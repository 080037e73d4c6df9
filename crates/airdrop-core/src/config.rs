//! 설정 관리.
//!
//! 이벤트 참여 설정을 정의하고 로드합니다. 기본값에서 시작해
//! 선택적 TOML 파일과 `AIRDROP__` 접두사 환경 변수로 오버라이드합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 이벤트 참여 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventConfig {
    /// 계정·코인당 매수 금액 (KRW)
    pub trade_amount_krw: Decimal,
    /// 매수 후 잔고 반영 대기 시간 (초)
    pub wait_secs: u64,
    /// 동시 실행할 최대 계정 작업 수
    pub max_concurrency: usize,
    /// 소액 코인 판정 기준 금액 (KRW, 미만이면 소액)
    pub small_holding_threshold_krw: Decimal,
    /// 소액 정리 시 추가 매수 금액 (KRW)
    pub cleanup_buy_amount_krw: Decimal,
    /// 매수 후 잔고 확인 최대 시도 횟수
    pub balance_poll_attempts: u32,
    /// 잔고 확인 시도 간 대기 시간 (초)
    pub balance_poll_delay_secs: u64,
    /// 소액 정리 시 코인 간 대기 시간 (초)
    pub coin_pause_secs: u64,
    /// 2일차 이후 스케줄 실행 시각 (KST, 시)
    pub schedule_hour: u32,
    /// 2일차 이후 스케줄 실행 시각 (KST, 분)
    pub schedule_minute: u32,
    /// 스케줄 실행(2일차 이후)에 적용할 대기 시간 (초)
    pub scheduled_wait_secs: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            trade_amount_krw: Decimal::new(5500, 0),
            wait_secs: 2,
            max_concurrency: 5,
            small_holding_threshold_krw: Decimal::new(5000, 0),
            cleanup_buy_amount_krw: Decimal::new(5500, 0),
            balance_poll_attempts: 3,
            balance_poll_delay_secs: 2,
            coin_pause_secs: 1,
            schedule_hour: 0,
            schedule_minute: 1,
            scheduled_wait_secs: 2,
        }
    }
}

impl EventConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값 위에 환경 변수만 적용됩니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let builder = config::Config::builder()
            .set_default("trade_amount_krw", defaults.trade_amount_krw.to_string())?
            .set_default("wait_secs", defaults.wait_secs)?
            .set_default("max_concurrency", defaults.max_concurrency as u64)?
            .set_default(
                "small_holding_threshold_krw",
                defaults.small_holding_threshold_krw.to_string(),
            )?
            .set_default(
                "cleanup_buy_amount_krw",
                defaults.cleanup_buy_amount_krw.to_string(),
            )?
            .set_default("balance_poll_attempts", defaults.balance_poll_attempts as u64)?
            .set_default("balance_poll_delay_secs", defaults.balance_poll_delay_secs)?
            .set_default("coin_pause_secs", defaults.coin_pause_secs)?
            .set_default("schedule_hour", defaults.schedule_hour as u64)?
            .set_default("schedule_minute", defaults.schedule_minute as u64)?
            .set_default("scheduled_wait_secs", defaults.scheduled_wait_secs)?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("AIRDROP")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 레거시 환경 변수를 반영한 설정을 반환합니다.
    ///
    /// `DEFAULT_TRADE_AMOUNT`와 `WAIT_TIME_SECONDS`는 .env 시절의
    /// 키 이름으로, 설정 파일보다 우선합니다.
    pub fn with_legacy_env(mut self) -> Self {
        if let Some(amount) = std::env::var("DEFAULT_TRADE_AMOUNT")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
        {
            self.trade_amount_krw = amount;
        }
        if let Some(secs) = std::env::var("WAIT_TIME_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.wait_secs = secs;
        }
        self
    }

    /// 스케줄 실행용 설정을 반환합니다 (2일차 이후).
    ///
    /// 무인 실행이므로 수동으로 조정된 긴 대기 시간 대신
    /// 고정된 짧은 대기 시간을 사용합니다.
    pub fn scheduled_run(&self) -> Self {
        Self {
            wait_secs: self.scheduled_wait_secs,
            ..self.clone()
        }
    }
}
