//! Read-only commands

use crate::bot::Bot;
use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct BalanceArgs {
    /// Include currencies with a zero balance
    #[arg(long)]
    pub all: bool,
}

impl BalanceArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let bot = Bot::from_config(config).await?;
        bot.balances().refresh().await?;

        let snapshot = bot.balances().snapshot();
        let mut rows: Vec<_> = snapshot
            .iter()
            .filter(|(_, amount)| self.all || !amount.is_zero())
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));

        println!("Balances:");
        for (code, amount) in rows {
            println!("  {:<8} {}", code, amount);
        }
        println!("Holdings:");
        for symbol in bot.table().snapshot() {
            println!("  {:<8} {}", symbol.id, symbol.holding);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct IndicatorsArgs {}

impl IndicatorsArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let bot = Bot::from_config(config).await?;
        let report = bot.indicator_store().refresh_all().await;

        let settings = bot.config().indicator_settings();
        println!(
            "EMA({}/{}) on {}m candles:",
            settings.fast_period, settings.slow_period, settings.interval_minutes
        );
        for (symbol, ema) in &report.updated {
            let trend = if ema.fast > ema.slow { "above" } else { "below" };
            println!(
                "  {:<8} fast={} slow={} ({})",
                symbol, ema.fast, ema.slow, trend
            );
        }
        for failure in &report.failed {
            println!("  failed: {}", failure);
        }
        bot.save_state().await?;

        if !report.is_complete() {
            anyhow::bail!("{} symbol(s) failed to refresh", report.failed.len());
        }
        Ok(())
    }
}

/// Print the configuration summary
pub fn print_config(config: &Config) {
    println!("Current configuration:");
    println!("  REST: {}", config.exchange.rest_url);
    println!("  Stream: {}", config.exchange.ws_url);
    println!(
        "  Indicator: EMA {}/{} on {}m candles, refresh every {}s",
        config.indicator.fast_period,
        config.indicator.slow_period,
        config.indicator.interval_minutes,
        config.indicator.refresh_interval_secs
    );
    println!(
        "  Strategy: debounce {}ms, flat below {}",
        config.strategy.debounce_ms, config.strategy.flat_epsilon
    );
    println!(
        "  Execution: slippage {}, cooldown {}s, quote {}, {} attempts",
        config.execution.slippage,
        config.execution.cooldown_secs,
        config.execution.quote_code,
        config.execution.retry_attempts
    );
    println!("  State: {}", config.persistence.state_dir.display());
    println!(
        "  Telegram: {}",
        if config.notify.telegram { "on" } else { "off" }
    );
    println!("  Symbols:");
    for symbol in &config.symbols {
        println!(
            "    {:<6} order={} data={} balance={} decimals={}",
            symbol.id, symbol.order_code, symbol.data_code, symbol.balance_code, symbol.price_decimals
        );
    }
}
