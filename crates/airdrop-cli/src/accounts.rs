//! 환경 변수 기반 계정 로딩.
//!
//! `.env`의 `BITHUMB_API_KEY_1` / `BITHUMB_SECRET_KEY_1` 형식 번호 키를
//! 순서대로 읽어 다중 계정을 구성합니다. 번호 키가 하나도 없으면
//! 번호 없는 레거시 키를 단일 계정으로 사용합니다.

use tracing::info;

use airdrop_core::Account;

const ENV_PREFIX: &str = "BITHUMB";

/// 환경 변수에서 계정 목록을 로드합니다.
pub fn load_accounts() -> Vec<Account> {
    load_accounts_with_prefix(ENV_PREFIX)
}

/// 지정한 접두사의 환경 변수에서 계정 목록을 로드합니다.
pub fn load_accounts_with_prefix(prefix: &str) -> Vec<Account> {
    let mut accounts = Vec::new();

    let mut account_num = 1;
    loop {
        let key_name = format!("{}_API_KEY_{}", prefix, account_num);
        let secret_name = format!("{}_SECRET_KEY_{}", prefix, account_num);
        let Some((api_key, api_secret)) = env_credentials(&key_name, &secret_name) else {
            break;
        };

        accounts.push(Account::new(
            format!("account_{}", account_num),
            api_key,
            api_secret,
        ));
        account_num += 1;
    }

    // 번호 키가 없을 때만 레거시 단일 계정 키 사용
    if accounts.is_empty() {
        let key_name = format!("{}_API_KEY", prefix);
        let secret_name = format!("{}_SECRET_KEY", prefix);
        if let Some((api_key, api_secret)) = env_credentials(&key_name, &secret_name) {
            accounts.push(Account::new("account_1", api_key, api_secret));
        }
    }

    info!(count = accounts.len(), "로드된 계정 수");
    accounts
}

fn env_credentials(key_name: &str, secret_name: &str) -> Option<(String, String)> {
    let api_key = std::env::var(key_name).ok()?;
    let api_secret = std::env::var(secret_name).ok()?;

    let api_key = strip_quotes(&api_key);
    let api_secret = strip_quotes(&api_secret);
    if api_key.is_empty() || api_secret.is_empty() {
        return None;
    }

    Some((api_key, api_secret))
}

/// .env에 따옴표째로 들어간 값을 정리합니다.
fn strip_quotes(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}
