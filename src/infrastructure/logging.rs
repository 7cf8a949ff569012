//! 日志系统配置模块
//! 支持结构化日志、日志级别配置和按天轮转的文件日志

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_LOG_FILE: &str = "ironledger.log";

/// 初始化日志系统
///
/// 启用文件日志时返回 writer guard，调用方需持有到进程退出，否则缓冲日志会丢失
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    // RUST_LOG 优先于配置中的级别
    let filter = build_filter(&config.level);

    if config.format == "json" {
        init_json_logging(filter, config)
    } else {
        init_text_logging(filter, config)
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// 日志目录与文件名
fn log_target(config: &LoggingConfig) -> (PathBuf, String) {
    let Some(path) = config.log_file_path.as_deref().map(Path::new) else {
        return (PathBuf::from(DEFAULT_LOG_DIR), DEFAULT_LOG_FILE.to_string());
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
    (dir, file)
}

fn file_writer(config: &LoggingConfig) -> Result<(non_blocking::NonBlocking, WorkerGuard)> {
    let (dir, file) = log_target(config);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {:?}", dir))?;
    Ok(non_blocking(rolling::daily(dir, file)))
}

/// 初始化JSON格式日志（结构化日志）
fn init_json_logging(filter: EnvFilter, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    if config.enable_file_logging {
        let (writer, guard) = file_writer(config)?;

        let file_layer = fmt::layer()
            .json()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339());
        let stdout_layer = fmt::layer().json().with_timer(ChronoUtc::rfc_3339());

        Registry::default()
            .with(filter)
            .with(file_layer)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install JSON subscriber")?;
        Ok(Some(guard))
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
            .try_init()
            .context("Failed to install JSON subscriber")?;
        Ok(None)
    }
}

/// 初始化文本格式日志
fn init_text_logging(filter: EnvFilter, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    if config.enable_file_logging {
        let (writer, guard) = file_writer(config)?;

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false);
        let stdout_layer = fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true);

        Registry::default()
            .with(filter)
            .with(file_layer)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install text subscriber")?;
        Ok(Some(guard))
    } else {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(true),
            )
            .try_init()
            .context("Failed to install text subscriber")?;
        Ok(None)
    }
}
