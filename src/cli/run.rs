//! Run command implementation

use crate::bot::{shutdown_signal, Bot};
use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {}

impl RunArgs {
    /// Run until Ctrl-C/SIGTERM; any fault on the way saves state and alerts
    /// the operator before it is returned
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let bot = Bot::from_config(config).await?;
        if let Err(e) = bot.run(shutdown_signal()).await {
            bot.abort(&e).await;
            return Err(e);
        }
        Ok(())
    }
}
