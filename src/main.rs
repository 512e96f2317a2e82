//! Pacer 演示宿主
//!
//! 入口：日志写入文件（TUI 占用终端），加载配置，运行脚本化回放。

use anyhow::Context;
use pacer::{config::load_config, observability, ui::run_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 终端由 TUI 独占，日志写文件；RUST_LOG 可覆盖级别
    observability::init_to_file("pacer.log").context("Failed to open log file")?;

    let cfg = load_config(None).context("Failed to load config")?;
    tracing::info!(
        phase_min_ms = cfg.reveal.phase_min_ms,
        frame_ms = cfg.scheduler.frame_interval_ms,
        "Config loaded"
    );

    run_app(cfg).await.context("App run failed")?;

    Ok(())
}
