//! 渐进式揭示：权威子问题树 → 影子树
//!
//! - **record**: 权威记录与影子记录
//! - **progress**: 单条记录的游标与阶段状态机
//! - **engine**: HierarchicalStreamReveal，兄弟间顺序编排与快照发布
//! - **events**: 每帧 tick 的事件与报告

pub mod engine;
pub mod events;
pub mod progress;
pub mod record;

pub use engine::{HierarchicalStreamReveal, RevealCallback, RevealSnapshot};
pub use events::{RevealEvent, TickReport};
pub use progress::{RevealProgress, RevealTiming, StepOutcome};
pub use record::{ContextDoc, DynamicSubQuestionRecord, RecordKey, SubQuery, SubQuestionRecord};
