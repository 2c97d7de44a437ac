//! WebSocket types and configuration

use std::time::Duration;

/// Exponential reconnect backoff: `min(cap, base * 2^failures)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
    /// Consecutive failures tolerated before giving up (0 = never give up)
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            cap: Duration::from_secs(30),
            max_attempts: 0,
        }
    }
}

impl Backoff {
    /// Wait after the `failures`-th consecutive failure, counting from 0
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.cap)
            .min(self.cap)
    }

    /// Whether `failures` consecutive failures exhaust the budget
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts > 0 && failures >= self.max_attempts
    }
}

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub backoff: Backoff,
    /// Keepalive ping period
    pub ping_interval: Duration,
    /// A ping unanswered for this long drops the connection
    pub pong_timeout: Duration,
    /// Inbound event buffer
    pub channel_capacity: usize,
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: Backoff::default(),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            channel_capacity: 1024,
        }
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff.base = base;
        self.backoff.cap = cap;
        self
    }

    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.backoff.max_attempts = n;
        self
    }

    pub fn keepalive(mut self, ping_interval: Duration, pong_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.pong_timeout = pong_timeout;
        self
    }

    pub fn channel_capacity(mut self, n: usize) -> Self {
        self.channel_capacity = n.max(1);
        self
    }
}

/// Events delivered to the consumer of a [`super::WsClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    /// Handshake completed; any subscription must be (re)sent now
    Connected,
    /// Terminal: the client will not reconnect
    Disconnected,
    /// Connection lost, next attempt after `delay`. `attempt` restarts at 1
    /// after every successful connect.
    Reconnecting {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WsError {
    #[error("connect failed: {0}")]
    ConnectionFailed(String),

    #[error("closed by server: {0}")]
    AbnormalClose(String),

    #[error("no pong within timeout")]
    PongTimeout,

    #[error("gave up after too many reconnect attempts")]
    MaxReconnectsExceeded,

    #[error("send failed: {0}")]
    SendFailed(String),
}
