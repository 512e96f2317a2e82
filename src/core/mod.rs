//! 核心层：阶段全序、错误类型、帧循环的取消与关闭

pub mod error;
pub mod phase;
pub mod shutdown;

pub use error::{RevealError, RevealResult};
pub use phase::{Phase, PhaseTable, BADGE_ORDER, FULL_ORDER};
pub use shutdown::{ShutdownManager, ShutdownReason};
