//! 揭示过程事件：每帧 tick 的可观察副作用，可序列化为 JSON 供宿主转发

use serde::Serialize;

use crate::core::Phase;

use super::record::RecordKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RevealEvent {
    /// 某条记录的阶段前进
    PhaseChanged { key: RecordKey, from: Phase, to: Phase },
    /// 某条记录新揭示了一批文档
    DocsRevealed { key: RecordKey, count: usize },
    /// 某条记录的问题文本揭示完毕
    QuestionDone { key: RecordKey },
    /// 最后一条顶层子问题已完成，允许顶层回答开始流式输出
    AllowStreaming,
    /// 所有问题文本都已揭示完毕
    QuestionsComplete,
}

/// 单次 tick 的报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 本帧是否流式输出了问题文本
    pub streamed: bool,
    pub events: Vec<RevealEvent>,
}

impl TickReport {
    pub fn transitions(&self) -> impl Iterator<Item = (RecordKey, Phase, Phase)> + '_ {
        self.events.iter().filter_map(|e| match e {
            RevealEvent::PhaseChanged { key, from, to } => Some((*key, *from, *to)),
            _ => None,
        })
    }
}
