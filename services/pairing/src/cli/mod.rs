//! 配对服务 CLI 分发：`run`、`doctor`、`version`。

use anyhow::anyhow;
use serde_json::{Value, json};

use crate::{api::types::MIN_SECRET_LEN, config::Config};

/// CLI 分发结果。
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CliDispatch {
    /// 继续进入服务主循环。
    Run,
    /// 命令已处理完成，主程序应退出。
    Exit,
}

/// 解析并执行配对服务 CLI。
pub(crate) fn dispatch(args: &[String]) -> anyhow::Result<CliDispatch> {
    let Some(first) = args.first() else {
        return Ok(CliDispatch::Run);
    };

    let cmd = first.trim();
    if cmd.is_empty() || cmd == "run" {
        return Ok(CliDispatch::Run);
    }

    if matches!(cmd, "-h" | "--help" | "help") {
        print_root_help();
        return Ok(CliDispatch::Exit);
    }

    match cmd {
        "doctor" => {
            let format = parse_doctor_format(&args[1..])?;
            run_doctor(format);
            Ok(CliDispatch::Exit)
        }
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(CliDispatch::Exit)
        }
        other => Err(anyhow!(
            "unknown command: {other}; run `st-pairing --help` for usage"
        )),
    }
}

/// `doctor` 输出格式。
#[derive(Debug, PartialEq, Eq)]
enum DoctorFormat {
    Text,
    Json,
}

/// 解析 doctor 的 `--format` 参数。
fn parse_doctor_format(args: &[String]) -> anyhow::Result<DoctorFormat> {
    if args.is_empty() {
        return Ok(DoctorFormat::Text);
    }
    if args.len() == 2 && args[0] == "--format" {
        return match args[1].as_str() {
            "text" => Ok(DoctorFormat::Text),
            "json" => Ok(DoctorFormat::Json),
            other => Err(anyhow!("unsupported doctor format: {other}")),
        };
    }
    Err(anyhow!("usage: st-pairing doctor [--format text|json]"))
}

/// 已存在的密钥文件是否可用。
fn secret_file_usable(config: &Config) -> bool {
    std::fs::read_to_string(&config.secret_path)
        .is_ok_and(|raw| raw.trim().len() >= MIN_SECRET_LEN)
}

/// 签名密钥来源描述。
fn secret_source(config: &Config) -> String {
    match config.token_secret.as_deref() {
        Some(secret) if secret.len() >= MIN_SECRET_LEN => "env".to_string(),
        Some(_) => "env (too short)".to_string(),
        None if !config.secret_path.exists() => {
            format!("file:{} (will be created)", config.secret_path.display())
        }
        None if secret_file_usable(config) => format!("file:{}", config.secret_path.display()),
        None => format!("file:{} (too short)", config.secret_path.display()),
    }
}

/// Link 调用方身份来源描述。
fn link_identity_mode(config: &Config) -> &'static str {
    if config.upstream_secret.is_some() {
        "upstream-secret"
    } else if config.dev_trust_user_header {
        "dev-bare-header"
    } else {
        "unconfigured (link disabled)"
    }
}

/// 有效配置摘要（不含任何密钥内容）。
fn doctor_report(config: &Config) -> Value {
    json!({
        "addr": config.addr,
        "codeTtlSec": config.code_ttl_sec,
        "tokenTtlSec": config.token_ttl_sec,
        "pollIntervalSec": config.poll_interval_sec,
        "sweepIntervalSec": config.sweep_interval.as_secs(),
        "registerLimitPerMin": config.register_limit_per_min,
        "rateLimitPerMin": config.rate_limit_per_min,
        "trustForwarded": config.trust_forwarded,
        "storePath": config.store_path.as_ref().map(|path| path.display().to_string()),
        "secretSource": secret_source(config),
        "userHeader": config.user_header,
        "linkIdentity": link_identity_mode(config),
    })
}

/// 密钥不可用或 Link 身份未配置时视为不健康。
fn doctor_healthy(config: &Config) -> bool {
    let secret_ok = match config.token_secret.as_deref() {
        Some(secret) => secret.len() >= MIN_SECRET_LEN,
        None => !config.secret_path.exists() || secret_file_usable(config),
    };
    let identity_ok = config.upstream_secret.is_some() || config.dev_trust_user_header;
    secret_ok && identity_ok
}

/// 打印 doctor 信息并按健康度设置退出码。
fn run_doctor(format: DoctorFormat) {
    let config = Config::from_env();
    let report = doctor_report(&config);

    match format {
        DoctorFormat::Text => {
            if let Some(fields) = report.as_object() {
                for (key, value) in fields {
                    let text = match value {
                        Value::String(raw) => raw.clone(),
                        Value::Null => "-".to_string(),
                        other => other.to_string(),
                    };
                    println!("{key}: {text}");
                }
            }
        }
        DoctorFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }

    if !doctor_healthy(&config) {
        std::process::exit(1);
    }
}

/// 打印 root help。
fn print_root_help() {
    println!("st-pairing usage:");
    println!("  st-pairing run");
    println!("  st-pairing doctor [--format text|json]");
    println!("  st-pairing version");
}
