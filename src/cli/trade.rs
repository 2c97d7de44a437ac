//! Manual trade command

use crate::bot::Bot;
use crate::config::Config;
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct TradeArgs {
    /// Symbol id, e.g. BTC
    #[arg(long)]
    pub symbol: String,

    /// buy or sell
    #[arg(long)]
    pub side: String,

    /// Reference price; slippage is applied on top
    #[arg(long)]
    pub price: Decimal,
}

impl TradeArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let bot = Bot::from_config(config).await?;
        bot.balances().refresh().await?;

        let report = bot
            .executor(None)
            .execute_manual(&self.symbol, &self.side, self.price)
            .await?;

        println!(
            "{} {} {} at {}",
            report.order.side, report.order.volume, report.order.symbol_id, report.order.price
        );
        for txid in &report.result.txids {
            println!("  txid: {}", txid);
        }
        if let Some(description) = &report.result.description {
            println!("  {}", description);
        }
        bot.save_state().await?;
        Ok(())
    }
}
