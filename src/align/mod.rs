//! 比对：窗口打分模型、广义 DP 以及末端重叠驱动

pub mod dp;
pub mod overlap;
pub mod scoring;

pub use dp::{align, align_with_buf, Alignment, AlignmentPiece, AlignmentType, DpBuffer};
pub use overlap::{end_alignment, Overlap};
pub use scoring::{AsymmetricRule, ScoringModel, SymmetricRule};
