//! 文件读写：FASTA 序列与 JSON 运行报告

pub mod fasta;
pub mod report;

pub use fasta::{read_peptides, write_record, FastaReader, FastaRecord};
pub use report::{MatchReport, RunReport, TemplateReport};
