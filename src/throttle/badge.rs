//! 状态徽标：后端布尔信号 → 目标阶段 → Label 节流器 → 文案
//!
//! 显示到 Complete 后再停留 `auto_hide` 时长即隐藏。

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::PacerConfig;
use crate::core::Phase;

use super::{PhaseQueueThrottler, ThrottleVariant};

/// 后端状态摘要（由外部片段组装器给出）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSignals {
    pub has_sub_queries: bool,
    pub has_context_docs: bool,
    pub has_answer: bool,
    pub is_complete: bool,
}

/// 由布尔信号推导目标阶段：取已成立的最靠后阶段
pub fn derive_target_phase(signals: &BackendSignals) -> Phase {
    if signals.is_complete {
        Phase::Complete
    } else if signals.has_answer {
        Phase::Answer
    } else if signals.has_context_docs {
        Phase::ContextDocs
    } else if signals.has_sub_queries {
        Phase::SubQueries
    } else {
        Phase::Waiting
    }
}

#[derive(Debug, Clone)]
pub struct StatusBadge {
    throttler: PhaseQueueThrottler,
    auto_hide: Duration,
    completed_at: Option<Instant>,
    hidden: bool,
}

impl StatusBadge {
    pub fn new(min_delay: Duration, auto_hide: Duration, now: Instant) -> Self {
        Self {
            throttler: PhaseQueueThrottler::new(ThrottleVariant::Label, min_delay, now),
            auto_hide,
            completed_at: None,
            hidden: false,
        }
    }

    pub fn from_config(cfg: &PacerConfig, now: Instant) -> Self {
        Self::new(
            cfg.throttle.label_min_delay(),
            Duration::from_millis(cfg.badge.auto_hide_ms),
            now,
        )
    }

    /// 输入新的后端摘要；目标阶段只进不退
    pub fn update(&mut self, signals: &BackendSignals) {
        self.throttler.advance(derive_target_phase(signals));
    }

    /// 每帧调用；返回本帧新显示的阶段
    pub fn tick(&mut self, now: Instant) -> Option<Phase> {
        let shown = self.throttler.tick(now);
        if shown == Some(Phase::Complete) {
            self.completed_at = Some(now);
        }
        if let Some(done) = self.completed_at {
            if !self.hidden && now.saturating_duration_since(done) >= self.auto_hide {
                self.hidden = true;
                tracing::debug!("Status badge hidden");
            }
        }
        shown
    }

    pub fn phase(&self) -> Phase {
        self.throttler.displayed_phase()
    }

    pub fn label(&self) -> &'static str {
        self.throttler.label()
    }

    pub fn visible(&self) -> bool {
        !self.hidden
    }

    pub fn throttler(&self) -> &PhaseQueueThrottler {
        &self.throttler
    }
}
