//! 脚本化片段源：模拟后端按任意节奏突发推送子问题片段
//!
//! FragmentAssembler 把片段组装成权威记录（遵守只追加约定）；ScriptedFeed 按时间表吐出片段。
//! 演示宿主与集成测试用它代替真实传输层。

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reveal::{ContextDoc, RecordKey, SubQuery, SubQuestionRecord};
use crate::throttle::BackendSignals;

/// 后端片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fragment {
    Question { key: RecordKey, text: String },
    SubQuery { key: RecordKey, query_id: u32, text: String },
    Docs { key: RecordKey, docs: Vec<ContextDoc> },
    Answer { key: RecordKey, text: String },
    Complete { key: RecordKey },
    Stop { key: RecordKey },
}

impl Fragment {
    pub fn key(&self) -> RecordKey {
        match self {
            Fragment::Question { key, .. }
            | Fragment::SubQuery { key, .. }
            | Fragment::Docs { key, .. }
            | Fragment::Answer { key, .. }
            | Fragment::Complete { key }
            | Fragment::Stop { key } => *key,
        }
    }
}

/// 片段组装器：维护权威记录树
#[derive(Debug, Default, Clone)]
pub struct FragmentAssembler {
    records: BTreeMap<RecordKey, SubQuestionRecord>,
}

impl FragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, fragment: Fragment) {
        let key = fragment.key();
        let record = self
            .records
            .entry(key)
            .or_insert_with(|| SubQuestionRecord::new(key.level, key.level_question_num));
        match fragment {
            Fragment::Question { text, .. } => record.question.push_str(&text),
            Fragment::SubQuery { query_id, text, .. } => {
                match record.sub_queries.iter_mut().find(|q| q.query_id == query_id) {
                    Some(q) => q.query.push_str(&text),
                    None => record.sub_queries.push(SubQuery { query: text, query_id }),
                }
            }
            Fragment::Docs { docs, .. } => record.context_docs.extend(docs),
            Fragment::Answer { text, .. } => record.answer.push_str(&text),
            Fragment::Complete { .. } => record.is_complete = true,
            Fragment::Stop { .. } => record.is_stopped = true,
        }
    }

    /// 全部记录（按身份排序）
    pub fn records(&self) -> Vec<SubQuestionRecord> {
        self.records.values().cloned().collect()
    }

    /// 某一层的记录
    pub fn level(&self, level: u32) -> Vec<SubQuestionRecord> {
        self.records
            .values()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// 供状态徽标使用的后端摘要
    pub fn signals(&self) -> BackendSignals {
        let any = |f: fn(&SubQuestionRecord) -> bool| self.records.values().any(f);
        BackendSignals {
            has_sub_queries: any(|r| !r.sub_queries.is_empty()),
            has_context_docs: any(|r| !r.context_docs.is_empty()),
            has_answer: any(|r| !r.answer.is_empty()),
            is_complete: !self.records.is_empty()
                && self.records.values().all(|r| r.is_complete || r.is_stopped),
        }
    }
}

/// 按时间表回放片段
#[derive(Debug, Clone)]
pub struct ScriptedFeed {
    script: Vec<(Duration, Fragment)>,
    cursor: usize,
}

impl ScriptedFeed {
    /// `script` 中的时间为相对起点的偏移，会按时间稳定排序
    pub fn new(mut script: Vec<(Duration, Fragment)>) -> Self {
        script.sort_by_key(|(at, _)| *at);
        Self { script, cursor: 0 }
    }

    /// 取出到 `elapsed` 为止到期的所有片段
    pub fn due(&mut self, elapsed: Duration) -> Vec<Fragment> {
        let start = self.cursor;
        while self
            .script
            .get(self.cursor)
            .map_or(false, |(at, _)| *at <= elapsed)
        {
            self.cursor += 1;
        }
        self.script[start..self.cursor]
            .iter()
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.script.len()
    }
}

fn key(level: u32, num: u32) -> RecordKey {
    RecordKey {
        level,
        level_question_num: num,
    }
}

/// 把一段文本切成若干片段，模拟逐 token 推送
fn chunked(
    out: &mut Vec<(Duration, Fragment)>,
    start_ms: u64,
    every_ms: u64,
    text: &str,
    chunk: usize,
    make: impl Fn(String) -> Fragment,
) -> u64 {
    let chars: Vec<char> = text.chars().collect();
    let mut at = start_ms;
    for piece in chars.chunks(chunk.max(1)) {
        out.push((Duration::from_millis(at), make(piece.iter().collect())));
        at += every_ms;
    }
    at
}

/// 演示脚本：两个顶层子问题（后到的先出数据）加一个二级子问题
pub fn demo_script() -> Vec<(Duration, Fragment)> {
    let mut s = Vec::new();
    let (q0, q1, q2) = (key(0, 0), key(0, 1), key(1, 0));

    chunked(&mut s, 0, 30, "What does the borrow checker enforce?", 6, |text| {
        Fragment::Question { key: q0, text }
    });
    // 第二个问题的数据与第一个并发到达
    chunked(&mut s, 100, 25, "How do lifetimes relate to references?", 8, |text| {
        Fragment::Question { key: q1, text }
    });
    s.push((Duration::from_millis(300), Fragment::SubQuery { key: q0, query_id: 0, text: "borrow checker rules".into() }));
    s.push((Duration::from_millis(320), Fragment::SubQuery { key: q1, query_id: 1, text: "lifetime elision".into() }));
    s.push((Duration::from_millis(350), Fragment::SubQuery { key: q0, query_id: 2, text: "aliasing xor mutation".into() }));
    s.push((
        Duration::from_millis(400),
        Fragment::Docs {
            key: q1,
            docs: vec![
                ContextDoc::new("nomicon-lifetimes", "The Rustonomicon: Lifetimes"),
                ContextDoc::new("book-ch10-03", "The Book 10.3: Validating References"),
            ],
        },
    ));
    s.push((
        Duration::from_millis(600),
        Fragment::Docs {
            key: q0,
            docs: vec![
                ContextDoc::new("book-ch04-02", "The Book 4.2: References and Borrowing"),
                ContextDoc::new("reference-borrow", "Reference: Borrow expressions"),
            ],
        },
    ));
    let end = chunked(
        &mut s,
        700,
        40,
        "Lifetimes name the region a reference is valid for; the compiler checks every borrow \
         against them so no reference outlives its referent.",
        12,
        |text| Fragment::Answer { key: q1, text },
    );
    s.push((Duration::from_millis(end), Fragment::Complete { key: q1 }));
    s.push((
        Duration::from_millis(900),
        Fragment::Docs {
            key: q0,
            docs: vec![ContextDoc::new("blog-nll", "Non-lexical lifetimes explained")],
        },
    ));
    let end = chunked(
        &mut s,
        1200,
        50,
        "At any point you may hold either one mutable reference or any number of shared \
         references, and every reference must stay valid for as long as it is used.",
        10,
        |text| Fragment::Answer { key: q0, text },
    );
    s.push((Duration::from_millis(end + 200), Fragment::Complete { key: q0 }));

    chunked(&mut s, 2500, 30, "Does NLL change these rules?", 5, |text| {
        Fragment::Question { key: q2, text }
    });
    s.push((Duration::from_millis(2800), Fragment::SubQuery { key: q2, query_id: 3, text: "non-lexical lifetimes".into() }));
    s.push((Duration::from_millis(3000), Fragment::Answer { key: q2, text: "No; NLL only makes the checker more precise about where a borrow ends.".into() }));
    s.push((Duration::from_millis(3100), Fragment::Complete { key: q2 }));
    s
}
