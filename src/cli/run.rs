//! Run command implementation

use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        tracing::info!("Starting paper trading");
        crate::engine::run(config).await
    }
}
