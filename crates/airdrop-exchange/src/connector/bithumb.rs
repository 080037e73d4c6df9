//! 빗썸 거래소 커넥터.
//!
//! 빗썸 REST API 구현. 공개 시세 조회와 서명이 필요한
//! 잔고/주문 API를 제공합니다.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha512;
use tracing::{debug, error, info};

use airdrop_core::{Account, OrderResult, Side, Symbol, QUOTE_CURRENCY};

use crate::retry::{with_retry, RetryConfig};
use crate::traits::{Balance, BalanceMap, Exchange, ExchangeFactory, ExchangeResult, Ticker};
use crate::ExchangeError;

type HmacSha512 = Hmac<Sha512>;

const API_URL: &str = "https://api.bithumb.com";
/// 빗썸 최소 주문 금액 (KRW).
const MIN_ORDER_KRW: i64 = 5500;
/// 수량 소수점 자릿수 (빗썸 기준 8자리).
const UNITS_SCALE: u32 = 8;
/// API 키 오류 상태 코드.
const STATUS_INVALID_KEY: &str = "5100";
const STATUS_OK: &str = "0000";

// ============================================================================
// 설정
// ============================================================================

/// 빗썸 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`)를 마스킹합니다.
#[derive(Clone)]
pub struct BithumbConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: String,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl fmt::Debug for BithumbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BithumbConfig")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl BithumbConfig {
    /// 새 설정 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: API_URL.to_string(),
            timeout_secs: 10,
        }
    }

    /// 계정 자격증명에서 설정 생성.
    pub fn from_account(account: &Account) -> Self {
        Self::new(account.api_key.clone(), account.api_secret.clone())
    }

    /// 기본 URL 변경 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BithumbTickerData {
    closing_price: String,
    #[serde(rename = "units_traded_24H")]
    units_traded_24h: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BithumbOrderbookEntry {
    price: String,
}

#[derive(Debug, Deserialize)]
struct BithumbOrderbookData {
    #[serde(default)]
    bids: Vec<BithumbOrderbookEntry>,
    #[serde(default)]
    asks: Vec<BithumbOrderbookEntry>,
}

// ============================================================================
// 서명
// ============================================================================

/// 인증 요청 서명을 생성합니다.
///
/// `endpoint + NUL + urlencoded 파라미터 + NUL + nonce`를 API 시크릿으로
/// HMAC-SHA512 서명한 뒤, 16진수 다이제스트를 base64로 인코딩합니다.
/// 동일한 입력에 대해 항상 동일한 서명을 반환합니다.
fn sign_request(api_secret: &str, endpoint: &str, encoded_params: &str, nonce: &str) -> String {
    let payload = format!("{}\0{}\0{}", endpoint, encoded_params, nonce);

    let mut mac = HmacSha512::new_from_slice(api_secret.as_bytes()).expect("HMAC key");
    mac.update(payload.as_bytes());

    let hex_digest = hex::encode(mac.finalize().into_bytes());
    BASE64.encode(hex_digest)
}

/// 요청 nonce 생성 (밀리초 타임스탬프, 단조 증가).
fn nonce_ms() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis()
        .to_string()
}

// ============================================================================
// 빗썸 클라이언트
// ============================================================================

/// 빗썸 거래소 클라이언트.
///
/// 인스턴스 하나가 계정 하나의 자격증명을 소유합니다.
/// 계정 간에 클라이언트를 공유하지 않습니다.
pub struct BithumbClient {
    config: BithumbConfig,
    client: Client,
    retry: RetryConfig,
}

impl BithumbClient {
    /// 새 빗썸 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BithumbConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            retry: RetryConfig::default(),
        })
    }

    /// 재시도 설정 변경 (테스트용).
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 공개 API 요청 (인증 불필요).
    ///
    /// `{status, data}` 응답 봉투를 검사하고 `data`를 역직렬화합니다.
    async fn public_get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url, path);

        let envelope = with_retry(&self.retry, || async {
            debug!("GET {}", url);
            let response = self.client.get(&url).send().await?;
            self.read_envelope(response).await
        })
        .await?;

        let data = envelope
            .get("data")
            .ok_or_else(|| ExchangeError::ParseError("응답에 data 필드 없음".to_string()))?;
        serde_json::from_value(data.clone()).map_err(Into::into)
    }

    /// 서명된 API 요청 (인증 필요).
    ///
    /// 시도마다 새 nonce와 서명을 생성하여 form 본문으로 전송합니다.
    async fn private_post(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<serde_json::Value> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| ExchangeError::ParseError(e.to_string()))?;
        let url = format!("{}{}", self.config.base_url, endpoint);

        with_retry(&self.retry, || async {
            let nonce = nonce_ms();
            let signature = sign_request(&self.config.api_secret, endpoint, &encoded, &nonce);

            debug!("POST (signed) {}", endpoint);

            let response = self
                .client
                .post(&url)
                .header("Api-Key", &self.config.api_key)
                .header("Api-Sign", signature)
                .header("Api-Nonce", nonce)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(encoded.clone())
                .send()
                .await?;

            self.read_envelope(response).await
        })
        .await
    }

    /// API 응답 봉투 처리.
    ///
    /// HTTP 에러와 빗썸 상태 코드를 에러 분류에 맞게 변환합니다.
    /// API 키 오류(5100)는 치명적 에러로 재시도하지 않습니다.
    async fn read_envelope(&self, response: reqwest::Response) -> ExchangeResult<serde_json::Value> {
        let http_status = response.status();
        let body = response.text().await?;

        if !http_status.is_success() {
            return Err(ExchangeError::ApiError {
                code: http_status.as_u16().to_string(),
                message: body,
            });
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            error!("응답 파싱 실패: {} - Body: {}", e, body);
            ExchangeError::ParseError(e.to_string())
        })?;

        let status = value
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or_default()
            .to_string();

        if status == STATUS_INVALID_KEY {
            let message = field_string(&value, "message");
            error!("API 키 오류: {}", message);
            return Err(ExchangeError::Unauthorized(message));
        }
        if status != STATUS_OK {
            return Err(ExchangeError::ApiError {
                code: status,
                message: field_string(&value, "message"),
            });
        }

        Ok(value)
    }

    /// 시장가 주문 공통 처리.
    async fn submit_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        units: Decimal,
    ) -> ExchangeResult<OrderResult> {
        let (order_type, endpoint) = match side {
            Side::Buy => ("bid", "/trade/market_buy"),
            Side::Sell => ("ask", "/trade/market_sell"),
        };

        let params = [
            ("order_currency", symbol.base.clone()),
            ("payment_currency", symbol.quote.clone()),
            ("units", units.normalize().to_string()),
            ("type", order_type.to_string()),
        ];

        let response = self.private_post(endpoint, &params).await?;
        let order_id = field_string(&response, "order_id");
        if order_id.is_empty() {
            return Err(ExchangeError::ParseError(
                "주문 응답에 order_id 없음".to_string(),
            ));
        }

        info!(
            order_id = %order_id,
            symbol = %symbol,
            side = %side,
            units = %units,
            "시장가 주문 성공"
        );

        Ok(OrderResult::market(order_id, symbol.clone(), side, units))
    }
}

/// 응답 필드를 문자열로 추출합니다 (숫자 필드도 문자열화).
fn field_string(value: &serde_json::Value, key: &str) -> String {
    match value.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// 잔고 응답의 숫자 필드를 파싱합니다 (없거나 파싱 불가 시 0).
fn decimal_field(data: &serde_json::Value, key: &str) -> Decimal {
    match data.get(key) {
        Some(serde_json::Value::String(s)) => Decimal::from_str(s).unwrap_or_default(),
        Some(serde_json::Value::Number(n)) => {
            Decimal::from_str(&n.to_string()).unwrap_or_default()
        }
        _ => Decimal::ZERO,
    }
}

// ============================================================================
// Exchange 구현
// ============================================================================

#[async_trait]
impl Exchange for BithumbClient {
    fn name(&self) -> &str {
        "bithumb"
    }

    async fn get_balances(&self) -> ExchangeResult<BalanceMap> {
        let params = [("currency", "ALL".to_string())];
        let response = self.private_post("/info/balance", &params).await?;

        let data = response
            .get("data")
            .ok_or_else(|| ExchangeError::ParseError("잔고 응답에 data 없음".to_string()))?;
        let entries = data
            .as_object()
            .ok_or_else(|| ExchangeError::ParseError("잔고 응답 형식 오류".to_string()))?;

        let mut balances = BalanceMap::new();
        for key in entries.keys() {
            let Some(coin) = key.strip_prefix("total_") else {
                continue;
            };

            let total = decimal_field(data, key);
            let currency = coin.to_uppercase();
            // 원화는 항상 포함, 코인은 보유 수량이 있을 때만
            if currency != QUOTE_CURRENCY && total <= Decimal::ZERO {
                continue;
            }

            balances.insert(
                currency,
                Balance {
                    free: decimal_field(data, &format!("available_{}", coin)),
                    used: decimal_field(data, &format!("in_use_{}", coin)),
                    total,
                },
            );
        }

        Ok(balances)
    }

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance> {
        let currency_upper = currency.to_uppercase();
        let params = [("currency", currency_upper.clone())];
        let response = self.private_post("/info/balance", &params).await?;

        let data = response
            .get("data")
            .ok_or_else(|| ExchangeError::ParseError("잔고 응답에 data 없음".to_string()))?;

        let suffix = currency_upper.to_lowercase();
        let total = decimal_field(data, &format!("total_{}", suffix));
        Ok(Balance {
            free: decimal_field(data, &format!("available_{}", suffix)),
            used: decimal_field(data, &format!("in_use_{}", suffix)),
            total,
        })
    }

    async fn get_ticker(&self, symbol: &Symbol) -> ExchangeResult<Ticker> {
        let ticker: BithumbTickerData = self
            .public_get(&format!("/public/ticker/{}", symbol.market_code()))
            .await?;

        let last = Decimal::from_str(&ticker.closing_price)
            .map_err(|e| ExchangeError::ParseError(format!("closing_price 파싱 실패: {}", e)))?;
        let volume = ticker
            .units_traded_24h
            .as_deref()
            .and_then(|v| Decimal::from_str(v).ok())
            .unwrap_or_default();

        // 최우선 호가는 호가창에서 조회
        let orderbook: BithumbOrderbookData = self
            .public_get(&format!("/public/orderbook/{}", symbol.market_code()))
            .await?;

        let bid = orderbook
            .bids
            .first()
            .and_then(|e| Decimal::from_str(&e.price).ok())
            .unwrap_or_default();
        let ask = orderbook
            .asks
            .first()
            .and_then(|e| Decimal::from_str(&e.price).ok())
            .unwrap_or_default();

        Ok(Ticker {
            last,
            bid,
            ask,
            volume,
        })
    }

    async fn get_all_prices(&self) -> ExchangeResult<HashMap<String, Decimal>> {
        let data: serde_json::Value = self
            .public_get(&format!("/public/ticker/ALL_{}", QUOTE_CURRENCY))
            .await?;

        let entries = data
            .as_object()
            .ok_or_else(|| ExchangeError::ParseError("시세 테이블 형식 오류".to_string()))?;

        let mut prices = HashMap::new();
        for (coin, info) in entries {
            if coin == "date" {
                continue;
            }
            // 종가 없는 항목은 건너뜀
            let Some(price) = info
                .get("closing_price")
                .and_then(|p| p.as_str())
                .and_then(|p| Decimal::from_str(p).ok())
            else {
                continue;
            };
            prices.insert(coin.to_uppercase(), price);
        }

        Ok(prices)
    }

    async fn market_buy_quote(
        &self,
        symbol: &Symbol,
        krw_amount: Decimal,
    ) -> ExchangeResult<OrderResult> {
        let minimum = Decimal::from(MIN_ORDER_KRW);
        if krw_amount < minimum {
            error!(
                amount = %krw_amount,
                minimum = %minimum,
                "주문 금액이 최소 주문 금액 미만"
            );
            return Err(ExchangeError::BelowMinimum {
                amount: krw_amount,
                minimum,
            });
        }

        // 현재가 조회하여 수량 계산
        let ticker = self.get_ticker(symbol).await?;
        if ticker.last <= Decimal::ZERO {
            return Err(ExchangeError::ParseError(format!(
                "{} 현재가가 유효하지 않음: {}",
                symbol, ticker.last
            )));
        }

        let units = (krw_amount / ticker.last).round_dp(UNITS_SCALE);
        info!(
            symbol = %symbol,
            krw = %krw_amount,
            price = %ticker.last,
            units = %units,
            "시장가 매수 시작"
        );

        self.submit_market_order(symbol, Side::Buy, units).await
    }

    async fn create_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> ExchangeResult<OrderResult> {
        self.submit_market_order(symbol, side, amount).await
    }
}

// ============================================================================
// 팩토리
// ============================================================================

/// 빗썸 클라이언트 팩토리.
#[derive(Debug, Default)]
pub struct BithumbFactory;

impl ExchangeFactory for BithumbFactory {
    fn create(&self, account: &Account) -> ExchangeResult<Arc<dyn Exchange>> {
        let client = BithumbClient::new(BithumbConfig::from_account(account))?;
        Ok(Arc::new(client))
    }
}
