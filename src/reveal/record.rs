//! 子问题记录：权威记录（外部拥有、只追加）与影子记录（揭示引擎输出）

use serde::{Deserialize, Serialize};

use crate::core::Phase;

/// 记录身份：(level, level_question_num) 在一次回答内稳定且唯一
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub level: u32,
    pub level_question_num: u32,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.level, self.level_question_num)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuery {
    pub query: String,
    pub query_id: u32,
}

/// 检索到的文档；以 document_id 去重
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDoc {
    pub document_id: String,
    pub semantic_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub blurb: String,
}

impl ContextDoc {
    pub fn new(document_id: impl Into<String>, semantic_identifier: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            semantic_identifier: semantic_identifier.into(),
            link: None,
            blurb: String::new(),
        }
    }
}

/// 权威子问题记录
///
/// 约定：question / answer / 每条 sub query 只在末尾追加；列表只增长、不重排；
/// is_complete / is_stopped 只会 false → true。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestionRecord {
    pub level: u32,
    pub level_question_num: u32,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sub_queries: Vec<SubQuery>,
    #[serde(default)]
    pub context_docs: Vec<ContextDoc>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub is_stopped: bool,
}

impl SubQuestionRecord {
    pub fn new(level: u32, level_question_num: u32) -> Self {
        Self {
            level,
            level_question_num,
            ..Default::default()
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            level: self.level,
            level_question_num: self.level_question_num,
        }
    }

    /// 问题文本是否已定稿：后端已开始输出后续内容，或记录已结束
    pub fn question_settled(&self) -> bool {
        !self.sub_queries.is_empty()
            || !self.context_docs.is_empty()
            || !self.answer.is_empty()
            || self.is_complete
            || self.is_stopped
    }
}

/// 影子记录：与权威记录同形，只包含已揭示的前缀；每帧整体替换，渲染层只读
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicSubQuestionRecord {
    pub level: u32,
    pub level_question_num: u32,
    pub question: String,
    pub answer: String,
    pub sub_queries: Vec<SubQuery>,
    pub context_docs: Vec<ContextDoc>,
    pub is_complete: bool,
    pub is_stopped: bool,
    /// 该记录当前所处的揭示阶段
    pub phase: Phase,
}

impl DynamicSubQuestionRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            level: self.level,
            level_question_num: self.level_question_num,
        }
    }

    /// 结构与文本是否已与权威记录完全一致（文档按 document_id 去重后比较）
    pub fn matches_source(&self, source: &SubQuestionRecord) -> bool {
        self.level == source.level
            && self.level_question_num == source.level_question_num
            && self.question == source.question
            && self.answer == source.answer
            && self.sub_queries == source.sub_queries
            && self.context_docs.iter().eq(unique_docs(&source.context_docs))
            && self.is_complete == source.is_complete
            && self.is_stopped == source.is_stopped
    }
}

/// 按 document_id 去重，保留首次出现的顺序
pub(crate) fn unique_docs(docs: &[ContextDoc]) -> impl Iterator<Item = &ContextDoc> {
    let mut seen = std::collections::HashSet::new();
    docs.iter().filter(move |&d| seen.insert(d.document_id.as_str()))
}

/// 字符数（非字节数）
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 前 n 个字符构成的切片；n 超长时返回整串
pub(crate) fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((byte, _)) => &s[..byte],
        None => s,
    }
}
