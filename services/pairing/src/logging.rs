//! 日志系统模块职责：
//! 1. 初始化 stdout + 文件双通道 tracing 日志。
//! 2. 将运行日志按天滚动写入 `logs/raw` 目录。

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// 默认日志根目录（相对当前工作目录）。
const DEFAULT_LOG_DIR: &str = "logs";
/// 日志原始文件目录名。
const RAW_DIR_NAME: &str = "raw";
/// 日志目录环境变量。
const LOG_DIR_ENV: &str = "PAIRING_LOG_DIR";
/// 文件日志级别环境变量（独立于 `RUST_LOG`）。
const FILE_LOG_LEVEL_ENV: &str = "PAIRING_FILE_LOG_LEVEL";
/// stdout 默认日志过滤。
const DEFAULT_STDOUT_FILTER: &str = "info";

/// 日志运行时守卫，防止 non-blocking writer 提前析构。
pub(crate) struct LogRuntime {
    _stdout_guard: WorkerGuard,
    _file_guard: WorkerGuard,
}

/// 初始化配对服务日志系统。
pub(crate) fn init(service_name: &str) -> Result<LogRuntime> {
    let raw_dir = resolve_log_root(std::env::var(LOG_DIR_ENV).ok()).join(RAW_DIR_NAME);
    fs::create_dir_all(&raw_dir)
        .with_context(|| format!("create raw log dir: {}", raw_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&raw_dir, format!("{service_name}.log"));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(stdout_writer)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(resolve_stdout_env_filter());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(parse_file_level(
            std::env::var(FILE_LOG_LEVEL_ENV).ok().as_deref(),
        ));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;

    Ok(LogRuntime {
        _stdout_guard: stdout_guard,
        _file_guard: file_guard,
    })
}

/// stdout 过滤：优先 `RUST_LOG`，回退默认摘要级别。
fn resolve_stdout_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_STDOUT_FILTER))
}

/// 文件日志级别，默认 `debug`。
fn parse_file_level(raw: Option<&str>) -> LevelFilter {
    raw.and_then(|value| value.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::DEBUG)
}

/// 将日志目录解析为绝对路径。
fn resolve_log_root(raw: Option<String>) -> PathBuf {
    let path = raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(path),
        Err(_) => path,
    }
}
