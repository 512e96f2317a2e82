//! 单条记录的揭示进度与阶段状态机
//!
//! 状态：Waiting → SubQueries → ContextDocs → Answer → Complete（徽标 5 阶段子集）。
//! 每条转移同时要求数据就绪与最短停留时间；只有 Waiting → SubQueries 可以仅凭时间发生
//! （但 i > 0 的记录还要等前一兄弟到达 Answer）。游标始终不超过权威长度。

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::config::RevealSection;
use crate::core::Phase;

use super::record::{
    char_len, char_prefix, ContextDoc, DynamicSubQuestionRecord, RecordKey, SubQuery,
    SubQuestionRecord,
};

/// 揭示节奏参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    pub phase_min: Duration,
    pub question_step: usize,
    pub answer_step: usize,
    pub sub_query_step: usize,
    pub text_interval: Duration,
    pub doc_debounce: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self::from(&RevealSection::default())
    }
}

impl From<&RevealSection> for RevealTiming {
    fn from(cfg: &RevealSection) -> Self {
        Self {
            phase_min: Duration::from_millis(cfg.phase_min_ms),
            question_step: cfg.question_step.max(1),
            answer_step: cfg.answer_step.max(1),
            sub_query_step: cfg.sub_query_step.max(1),
            text_interval: Duration::from_millis(cfg.text_interval_ms),
            doc_debounce: Duration::from_millis(cfg.doc_debounce_ms),
        }
    }
}

/// 一次 `advance` 的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub transition: Option<(Phase, Phase)>,
    pub docs_revealed: usize,
}

/// 距 `last` 已满 `interval` 时记录 `now` 并返回 true；同一时刻重复调用只会成功一次
pub(crate) fn paced(last: &mut Option<Instant>, now: Instant, interval: Duration) -> bool {
    match *last {
        Some(prev) if now.saturating_duration_since(prev) < interval || now == prev => false,
        _ => {
            *last = Some(now);
            true
        }
    }
}

#[derive(Debug, Clone)]
pub struct RevealProgress {
    key: RecordKey,
    pub question_char_index: usize,
    pub answer_char_index: usize,
    /// 已消费的权威文档数（去重后实际展示的可能更少）
    pub doc_index: usize,
    pub sub_query_index: usize,
    pub sub_query_char_index: usize,
    pub current_phase: Phase,
    pub phase_started_at: Instant,
    /// 问题文本已完整揭示且已定稿；兄弟间问题流式的顺序依据
    pub question_done: bool,
    revealed_docs: Vec<ContextDoc>,
    revealed_doc_ids: HashSet<String>,
    docs_seen: usize,
    docs_changed_at: Instant,
    last_body_step_at: Option<Instant>,
}

impl RevealProgress {
    pub fn new(key: RecordKey, now: Instant) -> Self {
        Self {
            key,
            question_char_index: 0,
            answer_char_index: 0,
            doc_index: 0,
            sub_query_index: 0,
            sub_query_char_index: 0,
            current_phase: Phase::Waiting,
            phase_started_at: now,
            question_done: false,
            revealed_docs: Vec::new(),
            revealed_doc_ids: HashSet::new(),
            docs_seen: 0,
            docs_changed_at: now,
            last_body_step_at: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        self.key
    }

    pub fn phase(&self) -> Phase {
        self.current_phase
    }

    fn dwell_elapsed(&self, now: Instant, min: Duration) -> bool {
        now.saturating_duration_since(self.phase_started_at) >= min
    }

    fn enter(&mut self, to: Phase, now: Instant) -> (Phase, Phase) {
        let from = self.current_phase;
        self.current_phase = to;
        self.phase_started_at = now;
        tracing::debug!(record = %self.key, ?from, ?to, "Record phase transition");
        (from, to)
    }

    /// 把所有游标钳制到权威长度以内（竞态下的自我修复，不报错）
    pub fn clamp_to(&mut self, src: &SubQuestionRecord) {
        self.question_char_index = self.question_char_index.min(char_len(&src.question));
        self.answer_char_index = self.answer_char_index.min(char_len(&src.answer));
        self.doc_index = self.doc_index.min(src.context_docs.len());
        let last_query = src.sub_queries.len().saturating_sub(1);
        self.sub_query_index = self.sub_query_index.min(last_query);
        let query_len = src
            .sub_queries
            .get(self.sub_query_index)
            .map(|q| char_len(&q.query))
            .unwrap_or(0);
        self.sub_query_char_index = self.sub_query_char_index.min(query_len);
    }

    /// 问题文本是否还有未揭示的字符
    pub fn question_pending(&self, src: &SubQuestionRecord) -> bool {
        self.question_char_index < char_len(&src.question)
    }

    /// 问题游标前进一步；返回是否真的前进了
    pub fn step_question(&mut self, src: &SubQuestionRecord, step: usize) -> bool {
        let len = char_len(&src.question);
        if self.question_char_index >= len {
            return false;
        }
        self.question_char_index = self.question_char_index.saturating_add(step).min(len);
        tracing::trace!(record = %self.key, index = self.question_char_index, "Question advanced");
        self.refresh_question_done(src);
        true
    }

    /// 重新计算 question_done；一旦为 true 不再回退
    pub fn refresh_question_done(&mut self, src: &SubQuestionRecord) -> bool {
        if !self.question_done
            && self.question_char_index >= char_len(&src.question)
            && src.question_settled()
        {
            self.question_done = true;
        }
        self.question_done
    }

    /// 当前可用的 sub query 是否已全部揭示
    pub fn sub_queries_caught_up(&self, src: &SubQuestionRecord) -> bool {
        match src.sub_queries.len() {
            0 => true,
            n => {
                self.sub_query_index + 1 >= n
                    && self.sub_query_char_index >= char_len(&src.sub_queries[n - 1].query)
            }
        }
    }

    fn step_sub_queries(&mut self, src: &SubQuestionRecord, step: usize) {
        while let Some(current) = src.sub_queries.get(self.sub_query_index) {
            let len = char_len(&current.query);
            if self.sub_query_char_index < len {
                self.sub_query_char_index = (self.sub_query_char_index + step).min(len);
                return;
            }
            if self.sub_query_index + 1 >= src.sub_queries.len() {
                return;
            }
            self.sub_query_index += 1;
            self.sub_query_char_index = 0;
        }
    }

    fn step_answer(&mut self, src: &SubQuestionRecord, step: usize) {
        let len = char_len(&src.answer);
        if self.answer_char_index < len {
            self.answer_char_index = (self.answer_char_index + step).min(len);
            tracing::trace!(record = %self.key, index = self.answer_char_index, "Answer advanced");
        }
    }

    /// 一次性复制当前可用的全部文档（只追加，按 document_id 去重）
    fn reveal_doc_batch(&mut self, src: &SubQuestionRecord, now: Instant) -> usize {
        let mut added = 0;
        for doc in &src.context_docs[self.doc_index..] {
            if self.revealed_doc_ids.insert(doc.document_id.clone()) {
                self.revealed_docs.push(doc.clone());
                added += 1;
            }
        }
        self.doc_index = src.context_docs.len();
        self.docs_seen = self.doc_index;
        self.docs_changed_at = now;
        added
    }

    /// 进入 ContextDocs 之后到达的文档：数量稳定满去抖时长后再整批追加
    fn reveal_late_docs(&mut self, src: &SubQuestionRecord, now: Instant, debounce: Duration) -> usize {
        let available = src.context_docs.len();
        if available <= self.doc_index {
            return 0;
        }
        if available != self.docs_seen {
            self.docs_seen = available;
            self.docs_changed_at = now;
            return 0;
        }
        if now.saturating_duration_since(self.docs_changed_at) < debounce {
            return 0;
        }
        self.reveal_doc_batch(src, now)
    }

    /// 推进游标并评估至多一次阶段转移
    ///
    /// `predecessor` 为同层前一兄弟的当前阶段；首条记录传 None。
    pub fn advance(
        &mut self,
        src: &SubQuestionRecord,
        predecessor: Option<Phase>,
        now: Instant,
        timing: &RevealTiming,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if self.current_phase.is_terminal() {
            return outcome;
        }

        if src.is_stopped {
            // 停止的记录同样排队：问题已按顺序揭示完毕且前一兄弟已到 Answer 后才定格
            let predecessor_ready = predecessor.map_or(true, |p| p.is_at_least(Phase::Answer));
            if predecessor_ready && self.question_done {
                outcome.docs_revealed = self.finalize(src, now);
                outcome.transition = Some(self.enter(Phase::Complete, now));
            }
            return outcome;
        }

        let phase = self.current_phase;
        if phase.is_at_least(Phase::ContextDocs) {
            outcome.docs_revealed = self.reveal_late_docs(src, now, timing.doc_debounce);
        }
        if phase.is_at_least(Phase::SubQueries) && paced(&mut self.last_body_step_at, now, timing.text_interval) {
            self.step_sub_queries(src, timing.sub_query_step);
            if phase.is_at_least(Phase::Answer) {
                self.step_answer(src, timing.answer_step);
            }
        }

        let dwell = self.dwell_elapsed(now, timing.phase_min);
        let next = match phase {
            Phase::Waiting => {
                let predecessor_ready = predecessor.map_or(true, |p| p.is_at_least(Phase::Answer));
                (predecessor_ready && dwell).then_some(Phase::SubQueries)
            }
            Phase::SubQueries => {
                let has_material = !src.context_docs.is_empty() || !src.answer.is_empty();
                (has_material && dwell && self.sub_queries_caught_up(src)).then_some(Phase::ContextDocs)
            }
            Phase::ContextDocs if !src.answer.is_empty() => {
                if src.context_docs.is_empty() {
                    // 没有文档可等：下一帧直接进入 Answer
                    self.dwell_elapsed(now, timing.text_interval).then_some(Phase::Answer)
                } else {
                    (dwell && self.doc_index >= src.context_docs.len()).then_some(Phase::Answer)
                }
            }
            Phase::Answer => {
                // 进入终止阶段后不再推进任何游标，所以这里要求全部内容都已追平
                let caught_up = self.answer_char_index >= char_len(&src.answer)
                    && self.sub_queries_caught_up(src)
                    && self.doc_index >= src.context_docs.len();
                (caught_up && src.is_complete && dwell).then_some(Phase::Complete)
            }
            _ => None,
        };

        if let Some(to) = next {
            outcome.transition = Some(self.enter(to, now));
            if to == Phase::ContextDocs {
                outcome.docs_revealed += self.reveal_doc_batch(src, now);
            }
        }
        outcome
    }

    /// 直接揭示到权威记录的当前全部内容（停止的记录、快进时使用）；返回新揭示的文档数
    pub fn finalize(&mut self, src: &SubQuestionRecord, now: Instant) -> usize {
        self.question_char_index = char_len(&src.question);
        self.answer_char_index = char_len(&src.answer);
        if let Some(last) = src.sub_queries.last() {
            self.sub_query_index = src.sub_queries.len() - 1;
            self.sub_query_char_index = char_len(&last.query);
        }
        let docs = self.reveal_doc_batch(src, now);
        self.refresh_question_done(src);
        docs
    }

    /// 快进：游标到底，阶段跳到数据所支持的最远处
    pub fn fast_forward(&mut self, src: &SubQuestionRecord, now: Instant) -> Option<(Phase, Phase)> {
        self.finalize(src, now);
        let target = if src.is_complete || src.is_stopped {
            Phase::Complete
        } else if !src.answer.is_empty() {
            Phase::Answer
        } else if !src.context_docs.is_empty() {
            Phase::ContextDocs
        } else if !src.sub_queries.is_empty() {
            Phase::SubQueries
        } else {
            Phase::Waiting
        };
        (target > self.current_phase).then(|| self.enter(target, now))
    }

    /// 由游标构建影子记录
    pub fn snapshot(&self, src: &SubQuestionRecord) -> DynamicSubQuestionRecord {
        let phase = self.current_phase;
        let sub_queries = if phase.is_at_least(Phase::SubQueries) {
            self.revealed_sub_queries(src)
        } else {
            Vec::new()
        };
        let answer = if phase.is_at_least(Phase::Answer) {
            char_prefix(&src.answer, self.answer_char_index).to_string()
        } else {
            String::new()
        };
        DynamicSubQuestionRecord {
            level: src.level,
            level_question_num: src.level_question_num,
            question: char_prefix(&src.question, self.question_char_index).to_string(),
            answer,
            sub_queries,
            context_docs: self.revealed_docs.clone(),
            is_complete: phase.is_terminal() && src.is_complete,
            is_stopped: phase.is_terminal() && src.is_stopped,
            phase,
        }
    }

    fn revealed_sub_queries(&self, src: &SubQuestionRecord) -> Vec<SubQuery> {
        let mut out: Vec<SubQuery> = src.sub_queries.iter().take(self.sub_query_index).cloned().collect();
        if let Some(current) = src.sub_queries.get(self.sub_query_index) {
            if self.sub_query_char_index > 0 || current.query.is_empty() {
                out.push(SubQuery {
                    query: char_prefix(&current.query, self.sub_query_char_index).to_string(),
                    query_id: current.query_id,
                });
            }
        }
        out
    }
}
