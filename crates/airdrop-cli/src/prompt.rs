//! 대화형 입력 처리.
//!
//! 계정 선택, 심볼 입력 등 운영자 프롬프트를 처리합니다.
//! 파싱 로직은 입출력과 분리되어 있어 단위 테스트가 가능합니다.

use std::io::{self, Write};

use tracing::{info, warn};

use airdrop_core::{Account, Symbol};

/// 프롬프트를 출력하고 한 줄을 읽습니다.
fn read_line(prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// y/n 질문.
pub fn prompt_yes_no(prompt: &str, default: bool) -> io::Result<bool> {
    let raw = read_line(prompt)?.to_lowercase();
    if raw.is_empty() {
        return Ok(default);
    }
    Ok(matches!(raw.as_str(), "y" | "yes"))
}

/// 정수 입력 (범위 검증, 빈 입력은 기본값).
pub fn prompt_int(
    prompt: &str,
    default: usize,
    min_value: usize,
    max_value: Option<usize>,
) -> io::Result<usize> {
    loop {
        let raw = read_line(prompt)?;
        let value = if raw.is_empty() {
            default
        } else {
            match raw.parse::<usize>() {
                Ok(value) => value,
                Err(_) => {
                    warn!(input = %raw, "숫자를 입력하세요");
                    continue;
                }
            }
        };

        if value < min_value {
            warn!(min = min_value, "{} 이상 입력하세요", min_value);
            continue;
        }
        if let Some(max) = max_value {
            if value > max {
                warn!(max, "{} 이하 입력하세요", max);
                continue;
            }
        }
        return Ok(value);
    }
}

/// 쉼표로 구분된 심볼 목록을 파싱합니다 (중복 제거, 순서 유지).
pub fn parse_symbols(input: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for part in input.split(',') {
        let Some(symbol) = Symbol::parse(part) else {
            continue;
        };
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

/// 거래할 심볼 목록을 입력받습니다. 하나 이상 입력할 때까지 반복합니다.
pub fn prompt_symbols() -> io::Result<Vec<Symbol>> {
    loop {
        let raw = read_line("\n거래할 코인 심볼을 입력하세요 (단일: BTC / 여러개: BTC,ETH,XRP): ")?;
        let symbols = parse_symbols(&raw);
        if !symbols.is_empty() {
            return Ok(symbols);
        }
        warn!("심볼을 하나 이상 입력하세요");
    }
}

/// 계정 선택 문자열을 1부터 시작하는 인덱스 목록으로 파싱합니다.
///
/// 쉼표 목록(`1,3`)과 범위(`1-3`)를 지원하며, 범위 밖이거나 잘못된
/// 항목은 경고 후 무시합니다. 결과는 중복 없이 정렬됩니다.
pub fn parse_account_indices(selection: &str, max_index: usize) -> Vec<usize> {
    let mut indices = std::collections::BTreeSet::new();

    for part in selection.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start_raw, end_raw)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start_raw.trim().parse::<usize>(), end_raw.trim().parse::<usize>())
            else {
                warn!(part = %part, "잘못된 범위");
                continue;
            };

            let (start, end) = if start > end { (end, start) } else { (start, end) };
            indices.extend((start..=end).filter(|i| (1..=max_index).contains(i)));
            continue;
        }

        match part.parse::<usize>() {
            Ok(index) if (1..=max_index).contains(&index) => {
                indices.insert(index);
            }
            Ok(_) => {}
            Err(_) => warn!(part = %part, "잘못된 숫자"),
        }
    }

    indices.into_iter().collect()
}

/// 선택 문자열로 계정을 고릅니다.
///
/// `all` 또는 빈 입력은 전체 계정을 의미하고, 유효한 선택이 없으면
/// 경고 후 전체 계정으로 되돌아갑니다.
pub fn select_accounts_from(accounts: &[Account], selection: &str) -> Vec<Account> {
    let selection = selection.trim().to_lowercase();
    if selection.is_empty() || selection == "all" {
        return accounts.to_vec();
    }

    let indices = parse_account_indices(&selection, accounts.len());
    if indices.is_empty() {
        warn!("유효한 계정이 선택되지 않았습니다. 모든 계정을 사용합니다.");
        return accounts.to_vec();
    }

    let selected: Vec<Account> = indices.into_iter().map(|i| accounts[i - 1].clone()).collect();
    info!(count = selected.len(), "선택된 계정");
    for account in &selected {
        info!("  - {}", account.account_id);
    }
    selected
}

/// 사용할 계정을 대화형으로 선택합니다.
pub fn select_accounts(accounts: &[Account]) -> io::Result<Vec<Account>> {
    if accounts.len() <= 1 {
        return Ok(accounts.to_vec());
    }

    info!("계정을 선택하세요:");
    info!("  - all: 모든 계정 사용");
    info!("  - 숫자: 특정 계정 선택 (예: 1 또는 1,3)");
    info!("  - 범위: 계정 범위 선택 (예: 1-3)");

    let choice = read_line("\n계정 선택 (기본: all): ")?;
    Ok(select_accounts_from(accounts, &choice))
}
