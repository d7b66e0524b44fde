//! 设备端 CLI 入口：注册、展示配对码、轮询换发并保存凭证。

mod banner;
mod cli;
mod client;
mod config;
mod poll;
mod token_file;

use tracing_subscriber::EnvFilter;

#[tokio::main]
/// 启动设备端 CLI。
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let args = std::env::args().skip(1).collect::<Vec<String>>();
    cli::dispatch(&args, config::DeviceConfig::from_env()).await
}
