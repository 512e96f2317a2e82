//! 阶段节流：PhaseQueueThrottler 与状态徽标
//!
//! 外部信号（目标阶段）单调不减但可能一次跳过多个阶段；节流器把跳过的每个中间阶段
//! 依次入队，再按最短停留时间每次出队一个，保证显示序列严格递增、不跳步、不重复。

pub mod badge;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::ThrottleSection;
use crate::core::{Phase, PhaseTable};

pub use badge::{derive_target_phase, BackendSignals, StatusBadge};

/// 两种节流器实例：共享同一算法，只在排序表、停留时间与对外暴露方式上不同
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleVariant {
    /// 多阶段列表：累积显示所有已经过的阶段（7 阶段全表，默认 300ms）
    List,
    /// 单一文案：只显示当前阶段（5 阶段子集，默认 1000ms）
    Label,
}

impl ThrottleVariant {
    pub fn table(self) -> PhaseTable {
        match self {
            ThrottleVariant::List => PhaseTable::FULL,
            ThrottleVariant::Label => PhaseTable::BADGE,
        }
    }

    pub fn min_delay(self, cfg: &ThrottleSection) -> Duration {
        match self {
            ThrottleVariant::List => cfg.list_min_delay(),
            ThrottleVariant::Label => cfg.label_min_delay(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhaseQueueThrottler {
    variant: ThrottleVariant,
    table: PhaseTable,
    min_delay: Duration,
    /// 尚未显示的阶段（FIFO，严格递增）
    queue: VecDeque<Phase>,
    /// 已显示的阶段（严格递增，末元素为当前显示阶段）
    displayed: Vec<Phase>,
    last_display_at: Instant,
}

impl PhaseQueueThrottler {
    /// 创建节流器；初始阶段（Waiting）视为在 `now` 开始显示
    pub fn new(variant: ThrottleVariant, min_delay: Duration, now: Instant) -> Self {
        let table = variant.table();
        Self {
            variant,
            table,
            min_delay,
            queue: VecDeque::new(),
            displayed: vec![table.first()],
            last_display_at: now,
        }
    }

    pub fn from_config(variant: ThrottleVariant, cfg: &ThrottleSection, now: Instant) -> Self {
        Self::new(variant, variant.min_delay(cfg), now)
    }

    pub fn variant(&self) -> ThrottleVariant {
        self.variant
    }

    /// 最近一次入队或显示的阶段
    fn last_known(&self) -> Phase {
        self.queue
            .back()
            .or_else(|| self.displayed.last())
            .copied()
            .unwrap_or_else(|| self.table.first())
    }

    /// 外部目标阶段变化时调用；不前进（含回退）时为 no-op，返回新入队的阶段数
    pub fn advance(&mut self, target: Phase) -> usize {
        let last = self.last_known();
        let pending = self.table.span(last, target);
        if pending.is_empty() {
            if target < last {
                tracing::trace!(?target, ?last, "Ignoring phase regression");
            }
            return 0;
        }
        tracing::debug!(variant = ?self.variant, from = ?last, to = ?target, queued = pending.len(), "Phases queued");
        self.queue.extend(pending.iter().copied());
        pending.len()
    }

    /// 每帧调用一次：队列非空且距上次出队已满 `min_delay` 时弹出恰好一个阶段
    ///
    /// 同一时刻重复调用是幂等的。
    pub fn tick(&mut self, now: Instant) -> Option<Phase> {
        if self.queue.is_empty() {
            return None;
        }
        if now.saturating_duration_since(self.last_display_at) < self.min_delay {
            return None;
        }
        let phase = self.queue.pop_front()?;
        self.displayed.push(phase);
        self.last_display_at = now;
        tracing::debug!(variant = ?self.variant, ?phase, "Phase displayed");
        Some(phase)
    }

    /// 当前显示的阶段（Label 变体的输出）
    pub fn displayed_phase(&self) -> Phase {
        self.displayed
            .last()
            .copied()
            .unwrap_or_else(|| self.table.first())
    }

    /// 已显示的所有阶段（List 变体的输出）
    pub fn displayed_phases(&self) -> &[Phase] {
        &self.displayed
    }

    pub fn label(&self) -> &'static str {
        self.displayed_phase().label()
    }

    pub fn last_display_at(&self) -> Instant {
        self.last_display_at
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// 队列已空且显示到终止阶段：帧循环可以空转
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.displayed_phase().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::phase::FULL_ORDER;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// 以 16ms 为帧，驱动到队列耗尽，记录每次出队的 (阶段, 时刻)
    fn drain(t: &mut PhaseQueueThrottler, start: Instant) -> Vec<(Phase, Instant)> {
        let mut out = Vec::new();
        let mut now = start;
        for _ in 0..2000 {
            now += ms(16);
            if let Some(p) = t.tick(now) {
                out.push((p, now));
            }
            if t.pending() == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn test_jump_to_complete_replays_every_phase() {
        let t0 = Instant::now();
        let mut t = PhaseQueueThrottler::new(ThrottleVariant::List, ms(300), t0);
        assert_eq!(t.advance(Phase::Complete), 6);

        let shown = drain(&mut t, t0);
        let phases: Vec<Phase> = shown.iter().map(|(p, _)| *p).collect();
        assert_eq!(
            phases,
            vec![
                Phase::SubQueries,
                Phase::ContextDocs,
                Phase::Evaluate,
                Phase::Answer,
                Phase::Compare,
                Phase::Complete
            ]
        );
        assert_eq!(t.displayed_phases(), FULL_ORDER);

        let mut prev = t0;
        for (_, at) in shown {
            assert!(at.duration_since(prev) >= ms(300));
            prev = at;
        }
        assert!(t.is_idle());
    }

    #[test]
    fn test_label_variant_uses_badge_subset() {
        let t0 = Instant::now();
        let mut t = PhaseQueueThrottler::new(ThrottleVariant::Label, ms(1000), t0);
        t.advance(Phase::Complete);
        let shown: Vec<Phase> = drain(&mut t, t0).into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            shown,
            vec![Phase::SubQueries, Phase::ContextDocs, Phase::Answer, Phase::Complete]
        );
        assert_eq!(t.label(), "Done");
    }

    #[test]
    fn test_no_skip_when_waiting_jumps_to_answer() {
        let t0 = Instant::now();
        let mut t = PhaseQueueThrottler::new(ThrottleVariant::Label, ms(1000), t0);
        t.advance(Phase::Answer);
        let shown: Vec<Phase> = drain(&mut t, t0).into_iter().map(|(p, _)| p).collect();
        assert_eq!(shown, vec![Phase::SubQueries, Phase::ContextDocs, Phase::Answer]);
    }

    #[test]
    fn test_regression_and_repeat_are_noops() {
        let t0 = Instant::now();
        let mut t = PhaseQueueThrottler::new(ThrottleVariant::List, ms(300), t0);
        assert_eq!(t.advance(Phase::ContextDocs), 2);
        assert_eq!(t.advance(Phase::ContextDocs), 0);
        assert_eq!(t.advance(Phase::SubQueries), 0);
        assert_eq!(t.advance(Phase::Waiting), 0);
        assert_eq!(t.pending(), 2);
        // 增量推进只追加新阶段，不重复
        assert_eq!(t.advance(Phase::Answer), 2);
        assert_eq!(t.pending(), 4);
    }

    #[test]
    fn test_min_delay_holds_first_dequeue() {
        let t0 = Instant::now();
        let mut t = PhaseQueueThrottler::new(ThrottleVariant::List, ms(300), t0);
        t.advance(Phase::SubQueries);
        assert_eq!(t.tick(t0 + ms(299)), None);
        assert_eq!(t.displayed_phase(), Phase::Waiting);
        assert_eq!(t.tick(t0 + ms(300)), Some(Phase::SubQueries));
    }

    #[test]
    fn test_tick_idempotent_at_same_instant() {
        let t0 = Instant::now();
        let mut t = PhaseQueueThrottler::new(ThrottleVariant::List, ms(300), t0);
        t.advance(Phase::Complete);
        let at = t0 + ms(400);
        assert_eq!(t.tick(at), Some(Phase::SubQueries));
        assert_eq!(t.tick(at), None);
        assert_eq!(t.tick(at), None);
        assert_eq!(t.displayed_phases().len(), 2);
    }

    #[test]
    fn test_advance_while_draining_keeps_order() {
        let t0 = Instant::now();
        let mut t = PhaseQueueThrottler::new(ThrottleVariant::Label, ms(1000), t0);
        t.advance(Phase::SubQueries);
        assert_eq!(t.tick(t0 + ms(1000)), Some(Phase::SubQueries));
        // 徽标表不含 Evaluate：投影为 ContextDocs
        t.advance(Phase::Evaluate);
        t.advance(Phase::Complete);
        let shown: Vec<Phase> = drain(&mut t, t0 + ms(1000)).into_iter().map(|(p, _)| p).collect();
        assert_eq!(shown, vec![Phase::ContextDocs, Phase::Answer, Phase::Complete]);
    }
}
