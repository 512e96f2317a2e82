//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PACER__*` 覆盖（双下划线表示嵌套，如 `PACER__REVEAL__ANSWER_STEP=5`）。
//! 所有键都有默认值，默认值即产品内固定的节奏常量。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::{RevealError, RevealResult};

/// 配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PacerConfig {
    pub throttle: ThrottleSection,
    pub reveal: RevealSection,
    pub badge: BadgeSection,
    pub scheduler: SchedulerSection,
}

/// [throttle] 段：两种阶段节流器的最短停留时间
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleSection {
    /// 列表节流器（逐条累积显示阶段）
    #[serde(default = "default_list_min_delay_ms")]
    pub list_min_delay_ms: u64,
    /// 文案节流器（状态徽标）
    #[serde(default = "default_label_min_delay_ms")]
    pub label_min_delay_ms: u64,
}

fn default_list_min_delay_ms() -> u64 {
    300
}

fn default_label_min_delay_ms() -> u64 {
    1000
}

impl Default for ThrottleSection {
    fn default() -> Self {
        Self {
            list_min_delay_ms: default_list_min_delay_ms(),
            label_min_delay_ms: default_label_min_delay_ms(),
        }
    }
}

impl ThrottleSection {
    pub fn list_min_delay(&self) -> Duration {
        Duration::from_millis(self.list_min_delay_ms)
    }

    pub fn label_min_delay(&self) -> Duration {
        Duration::from_millis(self.label_min_delay_ms)
    }
}

/// [reveal] 段：单条记录阶段停留、逐字步长与文档去抖
#[derive(Debug, Clone, Deserialize)]
pub struct RevealSection {
    #[serde(default = "default_phase_min_ms")]
    pub phase_min_ms: u64,
    /// 问题文本每步字符数
    #[serde(default = "default_question_step")]
    pub question_step: usize,
    /// 回答文本每步最多字符数
    #[serde(default = "default_answer_step")]
    pub answer_step: usize,
    #[serde(default = "default_sub_query_step")]
    pub sub_query_step: usize,
    /// 两次文本推进之间的最短间隔（约一帧）
    #[serde(default = "default_text_interval_ms")]
    pub text_interval_ms: u64,
    /// 后到文档批次的去抖时间
    #[serde(default = "default_doc_debounce_ms")]
    pub doc_debounce_ms: u64,
}

fn default_phase_min_ms() -> u64 {
    800
}

fn default_question_step() -> usize {
    1
}

fn default_answer_step() -> usize {
    10
}

fn default_sub_query_step() -> usize {
    2
}

fn default_text_interval_ms() -> u64 {
    16
}

fn default_doc_debounce_ms() -> u64 {
    100
}

impl Default for RevealSection {
    fn default() -> Self {
        Self {
            phase_min_ms: default_phase_min_ms(),
            question_step: default_question_step(),
            answer_step: default_answer_step(),
            sub_query_step: default_sub_query_step(),
            text_interval_ms: default_text_interval_ms(),
            doc_debounce_ms: default_doc_debounce_ms(),
        }
    }
}

/// [badge] 段
#[derive(Debug, Clone, Deserialize)]
pub struct BadgeSection {
    /// 显示 Complete 之后多久隐藏徽标
    #[serde(default = "default_auto_hide_ms")]
    pub auto_hide_ms: u64,
}

fn default_auto_hide_ms() -> u64 {
    800
}

impl Default for BadgeSection {
    fn default() -> Self {
        Self {
            auto_hide_ms: default_auto_hide_ms(),
        }
    }
}

/// [scheduler] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// 帧间隔，约等于 60Hz 刷新率
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl SchedulerSection {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl PacerConfig {
    /// 拒绝会让揭示停滞的取值（步长为 0、帧间隔为 0）
    pub fn validate(&self) -> RevealResult<()> {
        let steps = [
            ("reveal.question_step", self.reveal.question_step),
            ("reveal.answer_step", self.reveal.answer_step),
            ("reveal.sub_query_step", self.reveal.sub_query_step),
        ];
        for (field, value) in steps {
            if value == 0 {
                return Err(RevealError::InvalidConfig {
                    field,
                    reason: "step must be at least 1 character".to_string(),
                });
            }
        }
        if self.scheduler.frame_interval_ms == 0 {
            return Err(RevealError::InvalidConfig {
                field: "scheduler.frame_interval_ms",
                reason: "frame interval must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 PACER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PACER__*（双下划线表示嵌套键）
///
/// 加载后执行 `validate`。
pub fn load_config(config_path: Option<PathBuf>) -> RevealResult<PacerConfig> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PACER")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: PacerConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}
