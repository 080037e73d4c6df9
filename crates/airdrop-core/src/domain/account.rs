//! 계정 타입.

use std::fmt;

/// 거래소 API 계정.
///
/// 프로세스 시작 시 자격증명 소스에서 한 번 생성되며 이후 변경되지 않습니다.
/// 각 계정의 자격증명은 해당 계정의 거래소 클라이언트에만 전달됩니다.
#[derive(Clone)]
pub struct Account {
    /// 계정 식별자 (예: account_1)
    pub account_id: String,
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: String,
}

impl Account {
    /// 새 계정을 생성합니다.
    pub fn new(
        account_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("account_id", &self.account_id)
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_credentials() {
        let account = Account::new("account_1", "real_key", "real_secret");
        let output = format!("{:?}", account);

        assert!(output.contains("account_1"));
        assert!(!output.contains("real_key"));
        assert!(!output.contains("real_secret"));
    }
}
