//! 阶段定义与全序表
//!
//! Phase 是封闭枚举，顺序由 `ordinal()` 显式给出，不依赖数组下标或声明顺序。
//! 规范排序表只有一张：`FULL_ORDER`（7 个阶段）；徽标与单条记录状态机使用的
//! `BADGE_ORDER` 是它的 5 元素子集，两张表在共同元素上的相对顺序一致。

use serde::{Deserialize, Serialize};

/// 回答进度阶段（全序：Waiting < SubQueries < ContextDocs < Evaluate < Answer < Compare < Complete）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    SubQueries,
    ContextDocs,
    Evaluate,
    Answer,
    Compare,
    Complete,
}

impl Phase {
    /// 在全序中的位置
    pub const fn ordinal(self) -> u8 {
        match self {
            Phase::Waiting => 0,
            Phase::SubQueries => 1,
            Phase::ContextDocs => 2,
            Phase::Evaluate => 3,
            Phase::Answer => 4,
            Phase::Compare => 5,
            Phase::Complete => 6,
        }
    }

    pub fn is_at_least(self, other: Phase) -> bool {
        self.ordinal() >= other.ordinal()
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Complete
    }

    /// 状态徽标上显示的文案
    pub fn label(self) -> &'static str {
        match self {
            Phase::Waiting => "Thinking",
            Phase::SubQueries => "Searching",
            Phase::ContextDocs => "Reading",
            Phase::Evaluate => "Evaluating",
            Phase::Answer => "Answering",
            Phase::Compare => "Comparing",
            Phase::Complete => "Done",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Waiting
    }
}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Phase {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 规范全序表（列表节流器使用）
pub const FULL_ORDER: &[Phase] = &[
    Phase::Waiting,
    Phase::SubQueries,
    Phase::ContextDocs,
    Phase::Evaluate,
    Phase::Answer,
    Phase::Compare,
    Phase::Complete,
];

/// 5 阶段子集（徽标节流器与单条记录状态机使用）
pub const BADGE_ORDER: &[Phase] = &[
    Phase::Waiting,
    Phase::SubQueries,
    Phase::ContextDocs,
    Phase::Answer,
    Phase::Complete,
];

/// 一张排序表的只读视图：首元素为初始阶段，末元素为终止阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseTable {
    phases: &'static [Phase],
}

impl PhaseTable {
    pub const FULL: PhaseTable = PhaseTable { phases: FULL_ORDER };
    pub const BADGE: PhaseTable = PhaseTable { phases: BADGE_ORDER };

    pub fn phases(&self) -> &'static [Phase] {
        self.phases
    }

    pub fn first(&self) -> Phase {
        self.phases[0]
    }

    pub fn last(&self) -> Phase {
        self.phases[self.phases.len() - 1]
    }

    /// 阶段在本表中的下标；不在表内返回 None
    pub fn position(&self, phase: Phase) -> Option<usize> {
        self.phases.iter().position(|p| *p == phase)
    }

    /// 将任意阶段投影到本表：取序号不超过它的最大表内阶段
    ///
    /// 例如徽标表收到 Evaluate 时投影为 ContextDocs，收到 Compare 时投影为 Answer。
    pub fn project(&self, phase: Phase) -> Phase {
        self.phases
            .iter()
            .rev()
            .find(|p| p.ordinal() <= phase.ordinal())
            .copied()
            .unwrap_or_else(|| self.first())
    }

    /// 表内下一阶段；已是终止阶段返回 None
    pub fn next(&self, phase: Phase) -> Option<Phase> {
        let idx = self.position(self.project(phase))?;
        self.phases.get(idx + 1).copied()
    }

    /// `after` 之后（不含）直到 `target`（含）的所有表内阶段，按顺序返回
    pub fn span(&self, after: Phase, target: Phase) -> &'static [Phase] {
        let from = self.position(self.project(after)).unwrap_or(0);
        let to = self.position(self.project(target)).unwrap_or(0);
        if to <= from {
            return &[];
        }
        &self.phases[from + 1..=to]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_matches_full_order() {
        for (i, p) in FULL_ORDER.iter().enumerate() {
            assert_eq!(p.ordinal() as usize, i);
        }
        assert!(Phase::Answer > Phase::ContextDocs);
        assert!(Phase::Complete.is_at_least(Phase::Answer));
    }

    #[test]
    fn test_badge_order_is_subsequence_of_full() {
        let mut last = None;
        for p in BADGE_ORDER {
            assert!(FULL_ORDER.contains(p));
            if let Some(prev) = last {
                assert!(*p > prev);
            }
            last = Some(*p);
        }
    }

    #[test]
    fn test_project_onto_badge() {
        let t = PhaseTable::BADGE;
        assert_eq!(t.project(Phase::Evaluate), Phase::ContextDocs);
        assert_eq!(t.project(Phase::Compare), Phase::Answer);
        assert_eq!(t.project(Phase::Complete), Phase::Complete);
    }

    #[test]
    fn test_span_includes_every_intermediate() {
        let t = PhaseTable::FULL;
        assert_eq!(
            t.span(Phase::Waiting, Phase::Answer),
            &[Phase::SubQueries, Phase::ContextDocs, Phase::Evaluate, Phase::Answer]
        );
        assert!(t.span(Phase::Answer, Phase::SubQueries).is_empty());
        assert!(t.span(Phase::Answer, Phase::Answer).is_empty());
        assert_eq!(
            PhaseTable::BADGE.span(Phase::Waiting, Phase::Complete),
            &[Phase::SubQueries, Phase::ContextDocs, Phase::Answer, Phase::Complete]
        );
    }

    #[test]
    fn test_next() {
        assert_eq!(PhaseTable::BADGE.next(Phase::ContextDocs), Some(Phase::Answer));
        assert_eq!(PhaseTable::FULL.next(Phase::ContextDocs), Some(Phase::Evaluate));
        assert_eq!(PhaseTable::FULL.next(Phase::Complete), None);
    }
}
