use anyhow::Context;
use clap::Parser;
use photosync_lib::cli::Cli;
use photosync_lib::logging::{LogConfig, SizeRotatingWriter};
use photosync_lib::ReconcileEngine;
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

/// 初始化日志系统
fn init_logging(config: &LogConfig, log_dir: Option<&Path>) {
    // 创建日志级别过滤器
    let env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(config.tracing_level().into());

    // 控制台日志层，输出到 stderr，stdout 留给报告
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    // 文件日志层 - 只在指定日志目录时启用
    let file_layer = log_dir.filter(|_| config.enabled).and_then(|dir| {
        match SizeRotatingWriter::new(dir, config.max_size_mb) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            ),
            Err(e) => {
                eprintln!("无法创建日志文件 {}: {}", dir.display(), e);
                None
            }
        }
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // Ctrl+C 时取消当前任务，已开始的移动会先完成
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，正在停止...");
            signal_token.cancel();
        }
    });

    let engine = ReconcileEngine::new(cli.reconcile_config()).with_cancel(cancel);
    let report = engine.run().await.context("对账失败")?;

    report.log_summary();
    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("序列化报告失败")?;
        println!("{json}");
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version 正常退出，其余参数错误退出码为 1
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_logging(&cli.log_config(), cli.log_dir.as_deref());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("无法启动运行时: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
