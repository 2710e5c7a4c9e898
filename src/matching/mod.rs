//! 匹配表示：编辑脚本、带编辑日志的查询副本、位置映射与质谱纠错

pub mod local_sequence;
pub mod mass_spec;
pub mod piece;
pub mod sequence_match;

pub use local_sequence::{LocalSequence, SequenceEdit};
pub use mass_spec::MassSpecTable;
pub use piece::MatchPiece;
pub use sequence_match::{DetailedScores, SequenceMatch};
