//! Pacer - 流式子问题树的节奏化揭示
//!
//! 后端以任意节奏突发推送子问题数据，本库把它转成有节奏的逐步揭示：
//! 先流式显示问题，再依次进入子查询、参考文档、回答阶段，兄弟问题按顺序推进。
//!
//! 模块划分：
//! - **config**: 节奏配置加载（TOML + 环境变量）
//! - **core**: 阶段与排序表、错误类型、关闭信号
//! - **feed**: 片段组装与脚本化片段源
//! - **observability**: tracing 订阅器
//! - **reveal**: 分层流式揭示（每条记录的阶段状态机、文本步进、回调）
//! - **scheduler**: 帧循环（tokio 任务 + watch/broadcast 通道）
//! - **throttle**: 阶段队列节流器与状态徽标
//! - **ui**: Ratatui 演示宿主

pub mod config;
pub mod core;
pub mod feed;
pub mod observability;
pub mod reveal;
pub mod scheduler;
pub mod throttle;
pub mod ui;

pub use config::{load_config, PacerConfig};
pub use core::{Phase, PhaseTable, RevealError, RevealResult};
pub use reveal::{DynamicSubQuestionRecord, HierarchicalStreamReveal, SubQuestionRecord};
pub use throttle::{PhaseQueueThrottler, StatusBadge, ThrottleVariant};
