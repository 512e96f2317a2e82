//! HierarchicalStreamReveal：兄弟子问题的顺序揭示编排
//!
//! 每帧一次 `tick(records, now)`：
//! 1. 在整个兄弟集合中最多流式一个问题的一个步长（从左到右，前一条问题完成后才轮到下一条）；
//! 2. 若没有待流式的问题文本，按顺序对每条记录推进阶段状态机；
//! 3. 重新生成完整的影子数组快照；
//! 4. 所有问题文本揭示完毕且本帧无流式输出时，触发一次 on_complete。
//!
//! 权威记录每帧以只读切片传入，引擎从不修改它；RevealProgress 按 RecordKey 存放，由本实例独占。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PacerConfig;
use crate::core::Phase;

use super::events::{RevealEvent, TickReport};
use super::progress::{paced, RevealProgress, RevealTiming};
use super::record::{DynamicSubQuestionRecord, RecordKey, SubQuestionRecord};

/// 宿主回调（allow_streaming / on_complete），每个实例各触发至多一次
pub type RevealCallback = Box<dyn FnMut() + Send>;

/// 影子数组快照：每帧整体替换，渲染层只读
pub type RevealSnapshot = Arc<Vec<DynamicSubQuestionRecord>>;

pub struct HierarchicalStreamReveal {
    timing: RevealTiming,
    progress: HashMap<RecordKey, RevealProgress>,
    snapshot: RevealSnapshot,
    last_question_step_at: Option<Instant>,
    allow_streaming_fired: bool,
    complete_fired: bool,
    mounted: bool,
    on_allow_streaming: Option<RevealCallback>,
    on_complete: Option<RevealCallback>,
}

impl std::fmt::Debug for HierarchicalStreamReveal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchicalStreamReveal")
            .field("timing", &self.timing)
            .field("records", &self.progress.len())
            .field("allow_streaming_fired", &self.allow_streaming_fired)
            .field("complete_fired", &self.complete_fired)
            .field("mounted", &self.mounted)
            .finish()
    }
}

impl Default for HierarchicalStreamReveal {
    fn default() -> Self {
        Self::new(RevealTiming::default())
    }
}

impl HierarchicalStreamReveal {
    pub fn new(timing: RevealTiming) -> Self {
        Self {
            timing,
            progress: HashMap::new(),
            snapshot: Arc::new(Vec::new()),
            last_question_step_at: None,
            allow_streaming_fired: false,
            complete_fired: false,
            mounted: true,
            on_allow_streaming: None,
            on_complete: None,
        }
    }

    pub fn from_config(cfg: &PacerConfig) -> Self {
        Self::new(RevealTiming::from(&cfg.reveal))
    }

    /// 最后一条顶层子问题完成时调用
    pub fn with_allow_streaming(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_allow_streaming = Some(Box::new(callback));
        self
    }

    /// 所有问题文本揭示完毕时调用
    pub fn with_on_complete(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn timing(&self) -> &RevealTiming {
        &self.timing
    }

    /// 最近一次发布的快照
    pub fn snapshot(&self) -> RevealSnapshot {
        Arc::clone(&self.snapshot)
    }

    pub fn progress(&self, key: RecordKey) -> Option<&RevealProgress> {
        self.progress.get(&key)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// 卸载：之后的 tick 全部为 no-op，回调不再触发
    pub fn unmount(&mut self) {
        if self.mounted {
            tracing::debug!(records = self.progress.len(), "Reveal instance unmounted");
        }
        self.mounted = false;
        self.on_allow_streaming = None;
        self.on_complete = None;
    }

    /// 影子数组是否已与权威数组完全一致且全部记录到达 Complete
    pub fn is_converged(&self, records: &[SubQuestionRecord]) -> bool {
        let ordered = ordered(records);
        ordered.len() == self.snapshot.len()
            && ordered
                .iter()
                .zip(self.snapshot.iter())
                .all(|(src, dynamic)| dynamic.phase.is_terminal() && dynamic.matches_source(src))
    }

    /// 同层前一兄弟的阶段；每层首条记录没有前驱
    fn predecessor_phase(&self, ordered: &[&SubQuestionRecord], idx: usize) -> Option<Phase> {
        let current = ordered[idx];
        let prev = idx.checked_sub(1).map(|i| ordered[i])?;
        if prev.level != current.level {
            return None;
        }
        self.progress.get(&prev.key()).map(|p| p.phase())
    }

    /// 完成的记录是否为当前顶层（level 0）中序号最大的一条
    fn is_last_top_level(ordered: &[&SubQuestionRecord], key: RecordKey) -> bool {
        key.level == 0
            && ordered
                .iter()
                .filter(|r| r.level == 0)
                .map(|r| r.level_question_num)
                .max()
                == Some(key.level_question_num)
    }

    fn fire_allow_streaming(&mut self, events: &mut Vec<RevealEvent>) {
        if self.allow_streaming_fired {
            return;
        }
        self.allow_streaming_fired = true;
        tracing::info!("Last top-level sub-question complete, allowing answer streaming");
        events.push(RevealEvent::AllowStreaming);
        if let Some(cb) = self.on_allow_streaming.as_mut() {
            cb();
        }
    }

    fn fire_complete(&mut self, events: &mut Vec<RevealEvent>) {
        if self.complete_fired {
            return;
        }
        self.complete_fired = true;
        tracing::info!(records = self.progress.len(), "All sub-question text revealed");
        events.push(RevealEvent::QuestionsComplete);
        if let Some(cb) = self.on_complete.as_mut() {
            cb();
        }
    }

    /// 为新出现的记录惰性创建进度，并钳制已有游标
    fn sync_progress(&mut self, ordered: &[&SubQuestionRecord], now: Instant) {
        for src in ordered {
            self.progress
                .entry(src.key())
                .or_insert_with(|| {
                    tracing::debug!(record = %src.key(), "Tracking new sub-question");
                    RevealProgress::new(src.key(), now)
                })
                .clamp_to(src);
        }
    }

    fn record_transition(
        &mut self,
        ordered: &[&SubQuestionRecord],
        key: RecordKey,
        (from, to): (Phase, Phase),
        events: &mut Vec<RevealEvent>,
    ) {
        events.push(RevealEvent::PhaseChanged { key, from, to });
        if to.is_terminal() && Self::is_last_top_level(ordered, key) {
            self.fire_allow_streaming(events);
        }
    }

    fn publish(&mut self, ordered: &[&SubQuestionRecord]) {
        let records: Vec<DynamicSubQuestionRecord> = ordered
            .iter()
            .filter_map(|src| self.progress.get(&src.key()).map(|p| p.snapshot(src)))
            .collect();
        self.snapshot = Arc::new(records);
    }

    /// 每帧调用一次；同一时刻、同一输入下重复调用产生相同快照
    pub fn tick(&mut self, records: &[SubQuestionRecord], now: Instant) -> TickReport {
        let mut report = TickReport::default();
        if !self.mounted {
            return report;
        }

        let ordered = ordered(records);
        if ordered.is_empty() {
            // 权威记录尚未出现：下一帧再试
            return report;
        }
        self.sync_progress(&ordered, now);

        for src in &ordered {
            if let Some(p) = self.progress.get_mut(&src.key()) {
                let was_done = p.question_done;
                if p.refresh_question_done(src) && !was_done {
                    report.events.push(RevealEvent::QuestionDone { key: src.key() });
                }
            }
        }

        // 1. 问题文本：只处理第一条尚未完成的问题
        let pending_question = ordered.iter().find(|src| {
            self.progress
                .get(&src.key())
                .map_or(false, |p| !p.question_done)
        });
        let mut question_pending = false;
        if let Some(src) = pending_question {
            let key = src.key();
            // 停止的记录轮到它时整段显示问题
            let step = if src.is_stopped {
                usize::MAX
            } else {
                self.timing.question_step
            };
            if let Some(p) = self.progress.get_mut(&key) {
                if p.question_pending(src) {
                    question_pending = true;
                    if paced(&mut self.last_question_step_at, now, self.timing.text_interval) {
                        p.step_question(src, step);
                        report.streamed = true;
                        if p.question_done {
                            report.events.push(RevealEvent::QuestionDone { key });
                        }
                    }
                }
            }
        }

        // 2. 阶段状态机：按兄弟顺序推进
        if !question_pending {
            for idx in 0..ordered.len() {
                let src = ordered[idx];
                let key = src.key();
                let predecessor = self.predecessor_phase(&ordered, idx);
                let Some(p) = self.progress.get_mut(&key) else {
                    continue;
                };
                let outcome = p.advance(src, predecessor, now, &self.timing);
                if outcome.docs_revealed > 0 {
                    report.events.push(RevealEvent::DocsRevealed { key, count: outcome.docs_revealed });
                }
                if let Some(t) = outcome.transition {
                    self.record_transition(&ordered, key, t, &mut report.events);
                }
            }
        }

        // 3. 发布快照
        self.publish(&ordered);

        // 4. 问题文本全部揭示完毕
        let all_questions_done = ordered
            .iter()
            .all(|src| self.progress.get(&src.key()).map_or(false, |p| p.question_done));
        if all_questions_done && !report.streamed {
            self.fire_complete(&mut report.events);
        }

        report
    }

    /// 快进：立即把影子数组揭示到权威数组的当前全部内容
    ///
    /// 用于上游判定流已停滞或提前结束的情形；满足条件时照常触发回调。
    pub fn fast_forward(&mut self, records: &[SubQuestionRecord], now: Instant) -> TickReport {
        let mut report = TickReport::default();
        if !self.mounted {
            return report;
        }
        let ordered = ordered(records);
        if ordered.is_empty() {
            return report;
        }
        self.sync_progress(&ordered, now);
        tracing::info!(records = ordered.len(), "Fast-forwarding reveal to authoritative state");

        for src in &ordered {
            let key = src.key();
            let Some(p) = self.progress.get_mut(&key) else {
                continue;
            };
            let was_done = p.question_done;
            let transition = p.fast_forward(src, now);
            if p.question_done && !was_done {
                report.events.push(RevealEvent::QuestionDone { key });
            }
            if let Some(t) = transition {
                self.record_transition(&ordered, key, t, &mut report.events);
            }
        }

        self.publish(&ordered);
        let all_questions_done = ordered
            .iter()
            .all(|src| self.progress.get(&src.key()).map_or(false, |p| p.question_done));
        if all_questions_done {
            self.fire_complete(&mut report.events);
        }
        report
    }
}

/// 按 (level, level_question_num) 排序；重复身份只保留首次出现的一条
fn ordered(records: &[SubQuestionRecord]) -> Vec<&SubQuestionRecord> {
    let mut out: Vec<&SubQuestionRecord> = records.iter().collect();
    out.sort_by_key(|r| r.key());
    out.dedup_by_key(|r| r.key());
    out
}
