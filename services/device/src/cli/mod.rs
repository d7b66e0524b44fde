//! 设备端 CLI 分发：`pair`、`refresh`、`whoami`、`logout`、`version`。

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow, bail};
use st_shared_protocol::{TokenData, now_rfc3339_nanos};
use tracing::info;

use crate::{
    client::PairingClient,
    config::DeviceConfig,
    poll::pair_device,
    token_file::{self, StoredToken},
};

/// 设备端命令。
#[derive(Debug, PartialEq, Eq)]
enum DeviceCommand {
    Pair { force: bool },
    Refresh,
    Whoami,
    Logout,
    Version,
    Help,
}

/// 解析命令行参数。
fn parse_command(args: &[String]) -> anyhow::Result<DeviceCommand> {
    let Some(first) = args.first() else {
        return Ok(DeviceCommand::Help);
    };
    let rest = &args[1..];
    let command = match first.trim() {
        "pair" => match rest {
            [] => DeviceCommand::Pair { force: false },
            [flag] if flag == "--force" => DeviceCommand::Pair { force: true },
            _ => bail!("usage: st-device pair [--force]"),
        },
        "refresh" => DeviceCommand::Refresh,
        "whoami" => DeviceCommand::Whoami,
        "logout" => DeviceCommand::Logout,
        "version" => DeviceCommand::Version,
        "" | "-h" | "--help" | "help" => DeviceCommand::Help,
        other => {
            return Err(anyhow!(
                "unknown command: {other}; run `st-device --help` for usage"
            ));
        }
    };
    if !matches!(command, DeviceCommand::Pair { .. }) && !rest.is_empty() {
        bail!("unexpected arguments after `{}`", first.trim());
    }
    Ok(command)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

fn stored_token(device_id: String, data: TokenData) -> StoredToken {
    StoredToken {
        device_id,
        token: data.token,
        expires_at: data.expires_at,
        saved_at: now_rfc3339_nanos(),
    }
}

/// 读取本地凭证，不存在时提示先配对。
fn require_token(config: &DeviceConfig) -> anyhow::Result<StoredToken> {
    token_file::load(&config.token_path)?
        .ok_or_else(|| anyhow!("device not paired; run `st-device pair` first"))
}

/// 解析并执行设备端 CLI。
pub(crate) async fn dispatch(args: &[String], config: DeviceConfig) -> anyhow::Result<()> {
    match parse_command(args)? {
        DeviceCommand::Help => {
            print_root_help();
            Ok(())
        }
        DeviceCommand::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        DeviceCommand::Pair { force } => run_pair(&config, force).await,
        DeviceCommand::Refresh => run_refresh(&config).await,
        DeviceCommand::Whoami => run_whoami(&config).await,
        DeviceCommand::Logout => {
            if token_file::remove(&config.token_path)? {
                println!("device token removed: {}", config.token_path.display());
            } else {
                println!("no device token stored");
            }
            Ok(())
        }
    }
}

async fn run_pair(config: &DeviceConfig, force: bool) -> anyhow::Result<()> {
    if !force {
        let existing = token_file::load(&config.token_path)?;
        if let Some(existing) = existing.filter(|token| !token.is_expired(unix_now())) {
            println!(
                "device {} already paired; use `st-device pair --force` to pair again",
                existing.device_id
            );
            return Ok(());
        }
    }

    let client = PairingClient::new(&config.pairing_url)?;
    let (device_id, data) = pair_device(&client).await?;
    let stored = stored_token(device_id, data);
    token_file::save(&config.token_path, &stored)?;
    info!("device token saved to {}", config.token_path.display());
    println!(
        "paired device {} (token expires at {})",
        stored.device_id, stored.expires_at
    );
    Ok(())
}

async fn run_refresh(config: &DeviceConfig) -> anyhow::Result<()> {
    let current = require_token(config)?;
    let client = PairingClient::new(&config.pairing_url)?;
    let data = client
        .refresh(&current.token)
        .await
        .context("refresh failed; run `st-device pair --force` if the token is no longer valid")?;
    let stored = stored_token(current.device_id, data);
    token_file::save(&config.token_path, &stored)?;
    println!("token refreshed (expires at {})", stored.expires_at);
    Ok(())
}

async fn run_whoami(config: &DeviceConfig) -> anyhow::Result<()> {
    let current = require_token(config)?;
    let client = PairingClient::new(&config.pairing_url)?;
    let session = client
        .session(&current.token)
        .await
        .context("session check failed")?;
    println!("deviceId: {}", session.device_id);
    println!("userId: {}", session.user_id);
    println!("issuedAt: {}", session.issued_at);
    println!("expiresAt: {}", session.expires_at);
    Ok(())
}

/// 打印 root help。
fn print_root_help() {
    println!("st-device usage:");
    println!("  st-device pair [--force]");
    println!("  st-device refresh");
    println!("  st-device whoami");
    println!("  st-device logout");
    println!("  st-device version");
}
