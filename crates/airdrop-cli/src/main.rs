//! 에어드랍 이벤트 봇 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 대화형 실행 (계정/심볼/일수 프롬프트)
//! airdrop
//!
//! # 비대화형 실행: 전 계정으로 BTC, ETH를 3일간
//! airdrop --symbols BTC,ETH --days 3 --accounts all --yes
//!
//! # 거래 없이 지갑 잔액만 확인
//! airdrop --balance-only
//! ```

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use chrono_tz::Asia::Seoul;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use airdrop_core::{init_logging, Account, EventConfig, LogConfig, Symbol};
use airdrop_engine::{run_schedule, KstDayGate, SchedulePlan};
use airdrop_exchange::{BithumbFactory, Exchange, ExchangeFactory};

mod accounts;
mod prompt;

#[derive(Parser)]
#[command(name = "airdrop")]
#[command(about = "빗썸 에어드랍 이벤트(사고 팔기) 자동 참여 시스템", long_about = None)]
#[command(version)]
struct Cli {
    /// 거래할 코인 심볼 (쉼표 구분, 예: BTC,ETH). 생략 시 대화형 입력
    #[arg(short, long)]
    symbols: Option<String>,

    /// 이벤트 진행 일수 (1이면 1회만 실행)
    #[arg(short, long)]
    days: Option<u32>,

    /// 동시 실행할 최대 계정 수
    #[arg(short = 'n', long)]
    concurrency: Option<usize>,

    /// 사용할 계정 선택 (all, 1,3, 1-3)
    #[arg(short, long)]
    accounts: Option<String>,

    /// 5천원 이하 소액 코인 정리 활성화
    #[arg(long)]
    cleanup: bool,

    /// 거래 없이 지갑 잔액만 확인
    #[arg(long)]
    balance_only: bool,

    /// 설정 확인 질문 생략
    #[arg(short = 'y', long)]
    yes: bool,

    /// 설정 파일 경로
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let mut log_config = LogConfig::from_env();
    if let Some(format) = &cli.log_format {
        log_config.format = format
            .parse()
            .map_err(|e: String| anyhow::anyhow!("로그 형식 오류: {}", e))?;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    info!("=== 에어드랍 이벤트(사고 팔기) 자동 참여 시스템 ===");
    info!("(빗썸 전용)");

    let all_accounts = accounts::load_accounts();
    if all_accounts.is_empty() {
        error!("등록된 계정이 없습니다.");
        info!(".env 파일에 다음 형식으로 API 키를 추가하세요:");
        info!("  BITHUMB_API_KEY_1=your_api_key_1");
        info!("  BITHUMB_SECRET_KEY_1=your_secret_key_1");
        info!("  BITHUMB_API_KEY_2=your_api_key_2");
        info!("  BITHUMB_SECRET_KEY_2=your_secret_key_2");
        info!("  (번호 키가 없으면 BITHUMB_API_KEY / BITHUMB_SECRET_KEY 사용)");
        return Ok(());
    }

    info!(count = all_accounts.len(), "=== 사용 가능한 계정 ===");
    for (idx, account) in all_accounts.iter().enumerate() {
        info!("  {}. {}", idx + 1, account.account_id);
    }

    let selected_accounts = match &cli.accounts {
        Some(selection) => prompt::select_accounts_from(&all_accounts, selection),
        None => prompt::select_accounts(&all_accounts)?,
    };

    let mut config = EventConfig::load(&cli.config)
        .context("설정 로드 실패")?
        .with_legacy_env();

    let factory: Arc<dyn ExchangeFactory> = Arc::new(BithumbFactory);

    // 잔액 확인 모드: 거래 없이 종료
    let interactive = cli.symbols.is_none();
    let balance_only = cli.balance_only
        || (interactive
            && !cli.yes
            && prompt::prompt_yes_no("\n지갑 잔액만 확인하시겠습니까? (y/n): ", false)?);
    if balance_only {
        report_balances(factory.as_ref(), &selected_accounts).await;
        return Ok(());
    }

    let symbols = match &cli.symbols {
        Some(raw) => {
            let symbols = prompt::parse_symbols(raw);
            anyhow::ensure!(!symbols.is_empty(), "유효한 심볼이 없습니다: {}", raw);
            symbols
        }
        None => prompt::prompt_symbols()?,
    };

    let event_days = match cli.days {
        Some(days) => days.max(1),
        None if interactive => {
            prompt::prompt_int("이벤트 진행 일수 (1회만 실행: 1): ", 1, 1, None)? as u32
        }
        None => 1,
    };

    if let Some(concurrency) = cli.concurrency {
        config.max_concurrency = concurrency.max(1);
    } else if interactive && selected_accounts.len() > 1 {
        config.max_concurrency = prompt::prompt_int(
            &format!(
                "동시 실행할 최대 계정 수 (기본: {}, 최대: {}): ",
                config.max_concurrency,
                selected_accounts.len()
            ),
            config.max_concurrency,
            1,
            Some(selected_accounts.len()),
        )?;
    }

    let cleanup = cli.cleanup
        || (interactive
            && prompt::prompt_yes_no("\n대기 중 5천원 이하 코인 정리를 하시겠습니까? (y/n): ", false)?);

    log_settings(&config, &selected_accounts, &symbols, event_days, cleanup);

    if !cli.yes && !prompt::prompt_yes_no("\n위 설정으로 진행하시겠습니까? (y/n): ", false)? {
        info!("취소되었습니다.");
        return Ok(());
    }

    info!("=== 프로그램을 시작합니다 ===");
    info!(
        now = %Utc::now().with_timezone(&Seoul).format("%Y-%m-%d %H:%M:%S"),
        "현재 시간 (KST)"
    );

    // Ctrl+C는 대기 루프를 멈추되, 실행 중인 계정 작업은 끝까지 진행
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("중단 신호 수신, 진행 중인 작업 완료 후 종료합니다");
                shutdown.cancel();
            }
        });
    }

    let plan = SchedulePlan {
        event_days,
        cleanup,
    };
    let gate = KstDayGate::from_config(&config);

    run_schedule(
        factory,
        &selected_accounts,
        &symbols,
        &plan,
        &config,
        &gate,
        &shutdown,
    )
    .await;

    info!("=== 모든 작업 완료! ===");
    info!(
        now = %Utc::now().with_timezone(&Seoul).format("%Y-%m-%d %H:%M:%S"),
        "종료 시간 (KST)"
    );
    Ok(())
}

/// 실행 전 설정 요약을 로깅합니다.
fn log_settings(
    config: &EventConfig,
    accounts: &[Account],
    symbols: &[Symbol],
    event_days: u32,
    cleanup: bool,
) {
    info!("=== 설정 확인 ===");
    info!("거래소: bithumb");
    info!(count = accounts.len(), "선택된 계정");
    for account in accounts {
        info!("  - {}", account.account_id);
    }
    info!(
        symbols = %symbols
            .iter()
            .map(|s| s.base.clone())
            .collect::<Vec<_>>()
            .join(", "),
        "심볼"
    );
    info!(amount_krw = %config.trade_amount_krw, "거래 금액 (코인당)");
    info!(wait_secs = config.wait_secs, "대기 시간");
    info!(days = event_days, "이벤트 기간");
    if event_days > 1 {
        info!(
            hour = config.schedule_hour,
            minute = config.schedule_minute,
            "2일차부터 매일 지정 시각(KST)에 자동 실행"
        );
    }
    if accounts.len() > 1 {
        info!(workers = config.max_concurrency, "동시 실행 계정 수");
    }
    if cleanup {
        info!(threshold_krw = %config.small_holding_threshold_krw, "소액 코인 정리: 활성화");
    }
}

/// 선택된 계정들의 지갑 잔액을 조회해 출력합니다.
async fn report_balances(factory: &dyn ExchangeFactory, accounts: &[Account]) {
    info!("=== 지갑 잔액 확인 중... ===");

    for account in accounts {
        let exchange = match factory.create(account) {
            Ok(exchange) => exchange,
            Err(e) => {
                error!(account = %account.account_id, error = %e, "클라이언트 생성 실패");
                continue;
            }
        };

        match exchange.balance_summary().await {
            Ok(summary) => {
                info!(
                    account = %account.account_id,
                    krw = %summary.krw,
                    total_krw = %summary.total_krw,
                    "잔액 정보"
                );
                for holding in &summary.holdings {
                    info!(
                        "  • {}: {} (평가: {} KRW)",
                        holding.currency, holding.amount, holding.value_krw
                    );
                }
            }
            Err(e) => {
                error!(account = %account.account_id, error = %e, "잔액 조회 실패");
            }
        }
    }

    info!("=== 잔액 확인 완료 ===");
}
