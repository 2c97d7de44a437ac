//! Bot wiring
//!
//! Builds every component from configuration, runs the live loop, and owns
//! the shutdown and fatal-error paths.

use crate::balance::BalanceTracker;
use crate::config::{Config, Credentials, TelegramEnv};
use crate::data::{JsonStateStore, PersistedState, StateStore, StoreError, SubscriberState};
use crate::exchange::{ExchangeApi, KrakenClient, Retrying};
use crate::execution::{TradeExecutor, TradeReport};
use crate::feed::{KrakenTickerFeed, PriceFeed};
use crate::indicator::{IndicatorStore, RefreshReport};
use crate::market::SymbolTable;
use crate::notify::{LogNotifier, Notifier, TelegramConfig, TelegramNotifier};
use crate::strategy::DecisionEngine;
use anyhow::Context;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Buffered trade reports awaiting a state save
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// External collaborators the bot is built around
pub struct Services {
    pub exchange: Arc<dyn ExchangeApi>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn StateStore>,
    pub subscribers: Arc<RwLock<SubscriberState>>,
}

/// A fully wired trading bot
pub struct Bot {
    config: Config,
    table: SymbolTable,
    exchange: Arc<dyn ExchangeApi>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    subscribers: Arc<RwLock<SubscriberState>>,
    balances: Arc<BalanceTracker>,
}

impl Bot {
    pub fn new(config: Config, services: Services) -> anyhow::Result<Self> {
        let table = SymbolTable::new(config.to_symbols())?;
        let balances = Arc::new(BalanceTracker::new(services.exchange.clone(), table.clone()));
        Ok(Self {
            config,
            table,
            exchange: services.exchange,
            notifier: services.notifier,
            store: services.store,
            subscribers: services.subscribers,
            balances,
        })
    }

    /// Build against the live exchange using credentials from the environment,
    /// then merge any saved state into the configured symbols.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let credentials = Credentials::from_env()?;

        let store: Arc<dyn StateStore> =
            Arc::new(JsonStateStore::new(&config.persistence.state_dir));
        let persisted = store.load().await.context("failed to load saved state")?;
        let subscribers = Arc::new(RwLock::new(persisted.subscribers.clone()));

        let notifier = build_notifier(&config, subscribers.clone())?;

        let client = KrakenClient::new(config.rest_config())?
            .with_credentials(credentials.api_key, &credentials.api_secret)?;
        let exchange: Arc<dyn ExchangeApi> = Arc::new(Retrying::new(
            client,
            config.execution.retry_policy(),
            notifier.clone(),
        ));

        let bot = Self::new(
            config,
            Services {
                exchange,
                notifier,
                store,
                subscribers,
            },
        )?;
        bot.restore(&persisted);
        Ok(bot)
    }

    /// Merge saved holdings and indicators into the configured symbols
    pub fn restore(&self, persisted: &PersistedState) -> usize {
        let restored = self.table.restore(&persisted.symbols);
        tracing::info!(
            restored,
            subscribers = persisted.subscribers.subscribers.len(),
            "Saved state restored"
        );
        restored
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn balances(&self) -> &Arc<BalanceTracker> {
        &self.balances
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn indicator_store(&self) -> IndicatorStore {
        IndicatorStore::new(
            self.exchange.clone(),
            self.table.clone(),
            self.config.indicator_settings(),
        )
    }

    /// Executor sharing this bot's table, balances and notifier
    pub fn executor(&self, reports: Option<mpsc::Sender<TradeReport>>) -> TradeExecutor {
        let config = self.config.executor_config();
        match reports {
            Some(reports) => TradeExecutor::with_reports(
                self.exchange.clone(),
                self.balances.clone(),
                self.table.clone(),
                self.notifier.clone(),
                config,
                reports,
            ),
            None => TradeExecutor::new(
                self.exchange.clone(),
                self.balances.clone(),
                self.table.clone(),
                self.notifier.clone(),
                config,
            ),
        }
    }

    pub fn feed(&self, token: CancellationToken) -> KrakenTickerFeed {
        let ws = self.config.stream.ws_config(&self.config.exchange.ws_url);
        KrakenTickerFeed::new(ws, self.table.stream_pairs(), token)
            .with_notifier(self.notifier.clone())
    }

    pub async fn save_state(&self) -> Result<(), StoreError> {
        let state = PersistedState {
            symbols: self.table.snapshot(),
            subscribers: self.subscribers.read().clone(),
        };
        self.store.save(&state).await
    }

    async fn save_or_log(&self) {
        if let Err(e) = self.save_state().await {
            tracing::error!(error = %e, "Failed to save state");
        }
    }

    /// Trade until `shutdown` resolves or the tick stream dies.
    ///
    /// Balances are refreshed once before anything else starts; state is saved
    /// after every indicator cycle, after every completed trade, and on the
    /// way out.
    pub async fn run<S>(&self, shutdown: S) -> anyhow::Result<()>
    where
        S: Future<Output = ()>,
    {
        self.balances
            .refresh()
            .await
            .context("initial balance refresh failed")?;

        let token = CancellationToken::new();
        let (report_tx, mut report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let executor = self.executor(Some(report_tx));
        let engine = DecisionEngine::new(
            self.table.clone(),
            Arc::new(executor.clone()),
            self.config.engine_config(),
        );

        let feed = self.feed(token.child_token());
        let ticks = feed.subscribe().await?;
        let indicators = self.indicator_store();

        tracing::info!(
            symbols = ?self.table.ids(),
            refresh_secs = self.config.indicator.refresh_interval_secs,
            "Bot started"
        );

        let watch_shutdown = async {
            tokio::select! {
                _ = shutdown => tracing::info!("Shutdown requested"),
                _ = token.cancelled() => {}
            }
            token.cancel();
            feed.disconnect();
        };

        let refresh = indicators.run(self.config.refresh_interval(), token.clone(), |report| {
            async move {
                log_refresh(&report);
                self.save_or_log().await;
            }
        });

        let decide = async {
            engine.run(ticks, token.clone()).await;
            let stream_died = !token.is_cancelled();
            token.cancel();
            stream_died
        };

        let persist_trades = async {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    report = report_rx.recv() => match report {
                        Some(report) => {
                            tracing::debug!(
                                symbol = %report.order.symbol_id,
                                side = %report.order.side,
                                "Saving state after trade"
                            );
                            self.save_or_log().await;
                        }
                        None => break,
                    },
                }
            }
        };

        let ((), (), stream_died, ()) = tokio::join!(watch_shutdown, refresh, decide, persist_trades);
        executor.drain().await;

        self.save_state()
            .await
            .context("failed to save state at shutdown")?;

        if stream_died {
            anyhow::bail!("market data stream ended unexpectedly");
        }
        tracing::info!("Bot stopped");
        Ok(())
    }

    /// Fatal-error path: best-effort save, then tell the operator
    pub async fn abort(&self, error: &anyhow::Error) {
        tracing::error!(error = %format!("{:#}", error), "Fatal error, shutting down");
        self.save_or_log().await;
        self.notifier
            .notify_operator(&format!("Bot stopped on fatal error: {:#}", error))
            .await;
    }
}

fn log_refresh(report: &RefreshReport) {
    for (symbol, ema) in &report.updated {
        tracing::debug!(symbol = %symbol, fast = %ema.fast, slow = %ema.slow, "EMA updated");
    }
    for failure in &report.failed {
        tracing::warn!(error = %failure, "Indicator refresh failed");
    }
}

fn build_notifier(
    config: &Config,
    subscribers: Arc<RwLock<SubscriberState>>,
) -> anyhow::Result<Arc<dyn Notifier>> {
    if !config.notify.telegram {
        return Ok(Arc::new(LogNotifier));
    }
    let env = TelegramEnv::from_env()?;
    let notifier = TelegramNotifier::new(
        TelegramConfig::new(env.token, env.operator_chat_id),
        subscribers,
    )?;
    Ok(Arc::new(notifier))
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
