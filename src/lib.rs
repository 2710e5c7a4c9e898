//! # pepstitch
//!
//! 从大量带噪声、相互重叠的肽段读段重建蛋白共识序列。
//!
//! 读段逐条比对到一个或多个参考模板上，比对结果按模板位置合并，
//! 得到带覆盖深度的共识序列。主要组成：
//!
//! - **窗口打分**：把最多 `size` 个连续残基视为一个可替换单元，表达质谱无法区分的等质量组合
//! - **广义 DP 比对**：每一步可从两侧各消耗一个变长窗口，支持 Global / GlobalForB / Local / EndAlignment / ReadAlign
//! - **匹配表示**：CIGAR 风格编辑脚本、位置映射以及常见质谱错误的原位修正
//! - **模板共识**：线程安全地累积匹配，封存后计算对齐视图、合并视图与共识序列
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pepstitch::{align, AlignmentType, Read, ScoringModel, SequenceMatch, Template};
//!
//! let model = ScoringModel::default_model()?;
//! let alphabet = model.alphabet().clone();
//!
//! let alignment = align(b"AFGGW", b"AFNW", &model, AlignmentType::Local)?;
//! println!("{} {}", alignment.score, alignment.short_path());
//!
//! let template = Template::new("heavy", 0, Arc::new(Read::new("t", b"EVQLVESGGGLVQ", &alphabet)?), 0.0, true);
//! let read = Arc::new(Read::new("r", b"VESGGG", &alphabet)?);
//! let m = SequenceMatch::align(template.read(), &read, &model, AlignmentType::ReadAlign)?;
//! template.add_match(m, false);
//!
//! let finalized = template.finalize();
//! println!("{}", finalized.consensus_sequence().sequence_str());
//! # Ok::<(), pepstitch::Error>(())
//! ```
//!
//! ## 模块说明
//!
//! - [`util`]：字母表与 `AminoAcidSet`
//! - [`align`]：打分模型、DP 比对、末端重叠
//! - [`matching`]：编辑脚本、局部序列编辑日志、`SequenceMatch`、质谱纠错
//! - [`template`]：模板、共识视图与并行分配读段的 `Segment`
//! - [`io`]：FASTA 读写与 JSON 报告
//! - [`config`]：运行配置

pub mod align;
pub mod config;
pub mod error;
pub mod io;
pub mod matching;
pub mod read;
pub mod template;
pub mod util;

pub use align::{align, end_alignment, Alignment, AlignmentType, ScoringModel};
pub use config::{MatchConfig, RunConfig, ScoringConfig};
pub use error::{Error, Result};
pub use matching::{MassSpecTable, MatchPiece, SequenceMatch};
pub use read::Read;
pub use template::{Consensus, FinalizedTemplate, Segment, Template};
pub use util::{Alphabet, AminoAcidSet};
