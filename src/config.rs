//! Configuration types for ema-trader

use crate::exchange::{RestConfig, RetryPolicy, KRAKEN_REST_URL};
use crate::execution::ExecutorConfig;
use crate::indicator::IndicatorSettings;
use crate::market::{MarketError, Symbol, SymbolCodes, SymbolTable};
use crate::strategy::EngineConfig;
use crate::telemetry::LogFormat;
use crate::ws::WsConfig;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Kraken WebSocket v2 endpoint
pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com/v2";

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "KRKN_API_KEY";
/// Environment variable holding the base64 API secret
pub const API_SECRET_VAR: &str = "KRKN_API_SECRET";
/// Environment variable holding the Telegram bot token
pub const TELEGRAM_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the operator's Telegram chat id
pub const TELEGRAM_CHAT_VAR: &str = "TELEGRAM_OPERATOR_CHAT_ID";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
}

/// Exchange endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rest_url() -> String {
    KRAKEN_REST_URL.to_string()
}
fn default_ws_url() -> String {
    KRAKEN_WS_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            ws_url: default_ws_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Ticker stream connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Backoff base; the delay after failure `n` is `base * 2^n`
    #[serde(default = "default_reconnect_base_secs")]
    pub reconnect_base_secs: u64,
    /// Upper bound on the reconnect delay
    #[serde(default = "default_reconnect_cap_secs")]
    pub reconnect_cap_secs: u64,
    /// Consecutive failures before giving up (0 = never)
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
    /// Capacity of the tick channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_reconnect_base_secs() -> u64 {
    5
}
fn default_reconnect_cap_secs() -> u64 {
    30
}
fn default_ping_interval_secs() -> u64 {
    30
}
fn default_pong_timeout_secs() -> u64 {
    10
}
fn default_channel_capacity() -> usize {
    1024
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_base_secs: default_reconnect_base_secs(),
            reconnect_cap_secs: default_reconnect_cap_secs(),
            max_reconnect_attempts: 0,
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamConfig {
    /// WebSocket client settings for `url`
    pub fn ws_config(&self, url: &str) -> WsConfig {
        WsConfig::new(url)
            .with_backoff(
                Duration::from_secs(self.reconnect_base_secs),
                Duration::from_secs(self.reconnect_cap_secs),
            )
            .max_reconnects(self.max_reconnect_attempts)
            .keepalive(
                Duration::from_secs(self.ping_interval_secs),
                Duration::from_secs(self.pong_timeout_secs),
            )
            .channel_capacity(self.channel_capacity)
    }
}

/// EMA indicator settings
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
    /// Candle interval in minutes
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Use only the most recent N closes (None = whole lookback)
    #[serde(default)]
    pub history_window: Option<usize>,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,
}

fn default_fast_period() -> usize {
    10
}
fn default_slow_period() -> usize {
    20
}
fn default_interval_minutes() -> u32 {
    15
}
fn default_refresh_interval_secs() -> u64 {
    900
}
fn default_lookback_days() -> u64 {
    15
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            interval_minutes: default_interval_minutes(),
            refresh_interval_secs: default_refresh_interval_secs(),
            history_window: None,
            lookback_days: default_lookback_days(),
        }
    }
}

/// Decision engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Minimum spacing between accepted signals
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Holdings below this count as flat
    #[serde(default = "default_flat_epsilon")]
    pub flat_epsilon: Decimal,
}

fn default_debounce_ms() -> u64 {
    100
}
fn default_flat_epsilon() -> Decimal {
    Decimal::new(1, 6) // 0.000001
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            flat_epsilon: default_flat_epsilon(),
        }
    }
}

/// Trade execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Limit price buffer: buys at `price * (1 + slippage)`, sells at `price * (1 - slippage)`
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
    /// Time after an order completes before the symbol may trade again
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Balance code of the quote currency that funds buys
    #[serde(default = "default_quote_code")]
    pub quote_code: String,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Passed to AddOrder as `expiretm`
    #[serde(default = "default_order_expiry")]
    pub order_expiry: String,
}

fn default_slippage() -> Decimal {
    Decimal::new(5, 4) // 0.0005
}
fn default_cooldown_secs() -> u64 {
    10
}
fn default_quote_code() -> String {
    "ZUSD".to_string()
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_order_expiry() -> String {
    "+10".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage: default_slippage(),
            cooldown_secs: default_cooldown_secs(),
            quote_code: default_quote_code(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            order_expiry: default_order_expiry(),
        }
    }
}

impl ExecutionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// State file location
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

/// Notification channels
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Deliver through Telegram instead of the log only
    #[serde(default)]
    pub telegram: bool,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Optional append-only log file
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Serve Prometheus metrics on this port
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            log_file: None,
            metrics_port: None,
        }
    }
}

/// One `[[symbols]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    pub id: String,
    /// Pair code for AddOrder, e.g. "BTCUSD"
    pub order_code: String,
    /// Pair code for OHLC, e.g. "XBTUSD"
    pub data_code: String,
    /// Currency code in the balance map, e.g. "XXBT"
    pub balance_code: String,
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
}

fn default_price_decimals() -> u32 {
    2
}

impl SymbolConfig {
    pub fn to_symbol(&self) -> Symbol {
        Symbol::new(
            self.id.clone(),
            SymbolCodes {
                order: self.order_code.clone(),
                data: self.data_code.clone(),
                balance: self.balance_code.clone(),
            },
            self.price_decimals,
        )
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings the bot cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indicator.fast_period == 0 {
            return Err(ConfigError::Invalid("fast_period must be positive".into()));
        }
        if self.indicator.fast_period >= self.indicator.slow_period {
            return Err(ConfigError::Invalid(format!(
                "fast_period ({}) must be below slow_period ({})",
                self.indicator.fast_period, self.indicator.slow_period
            )));
        }
        if let Some(window) = self.indicator.history_window {
            if window < self.indicator.slow_period {
                return Err(ConfigError::Invalid(format!(
                    "history_window ({}) is shorter than slow_period ({})",
                    window, self.indicator.slow_period
                )));
            }
        }
        if self.execution.slippage < Decimal::ZERO || self.execution.slippage >= Decimal::ONE {
            return Err(ConfigError::Invalid(format!(
                "slippage must be in [0, 1), got {}",
                self.execution.slippage
            )));
        }
        if self.execution.quote_code.trim().is_empty() {
            return Err(ConfigError::Invalid("quote_code must not be empty".into()));
        }
        if self.indicator.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be positive".into(),
            ));
        }
        if self.stream.ping_interval_secs == 0 || self.stream.pong_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ping_interval_secs and pong_timeout_secs must be positive".into(),
            ));
        }
        if self.stream.reconnect_base_secs > self.stream.reconnect_cap_secs {
            return Err(ConfigError::Invalid(
                "reconnect_base_secs exceeds reconnect_cap_secs".into(),
            ));
        }
        // Duplicate ids, missing codes and pair mismatches
        SymbolTable::new(self.to_symbols())?;
        Ok(())
    }

    /// Configured symbols, flat and without indicator data
    pub fn to_symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(SymbolConfig::to_symbol).collect()
    }

    pub fn indicator_settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            fast_period: self.indicator.fast_period,
            slow_period: self.indicator.slow_period,
            interval_minutes: self.indicator.interval_minutes,
            history_window: self.indicator.history_window,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            debounce: Duration::from_millis(self.strategy.debounce_ms),
            flat_epsilon: self.strategy.flat_epsilon,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            slippage: self.execution.slippage,
            cooldown: self.execution.cooldown(),
            quote_code: self.execution.quote_code.clone(),
            flat_epsilon: self.strategy.flat_epsilon,
        }
    }

    /// Interval between indicator refresh cycles
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.indicator.refresh_interval_secs)
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.exchange.rest_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.exchange.timeout_secs),
            lookback: Duration::from_secs(self.indicator.lookback_days * 24 * 60 * 60),
            order_expiry: self.execution.order_expiry.clone(),
        }
    }
}

/// Exchange API credentials
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };
        Ok(Self {
            api_key: read(API_KEY_VAR)?,
            api_secret: read(API_SECRET_VAR)?,
        })
    }
}

/// Telegram bot settings from the environment
#[derive(Debug, Clone)]
pub struct TelegramEnv {
    pub token: String,
    pub operator_chat_id: i64,
}

impl TelegramEnv {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup(TELEGRAM_TOKEN_VAR).ok_or(ConfigError::MissingEnv(TELEGRAM_TOKEN_VAR))?;
        let chat = lookup(TELEGRAM_CHAT_VAR).ok_or(ConfigError::MissingEnv(TELEGRAM_CHAT_VAR))?;
        let operator_chat_id = chat.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: TELEGRAM_CHAT_VAR,
            value: chat.clone(),
        })?;
        Ok(Self {
            token,
            operator_chat_id,
        })
    }
}

/// Load an optional dotenv file into the process environment.
///
/// Returns whether the file existed; a missing file is not an error.
/// Variables already set in the environment win.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
