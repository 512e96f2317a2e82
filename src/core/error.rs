//! 错误类型
//!
//! 揭示核心本身不会失败（越界游标被钳制、阶段回退请求被忽略）；
//! 只有配置加载/校验与调度器通道这些边缘路径会返回 RevealError。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevealError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// 调度器已卸载（取消），无法再推送输入
    #[error("Scheduler closed")]
    SchedulerClosed,
}

pub type RevealResult<T> = Result<T, RevealError>;
