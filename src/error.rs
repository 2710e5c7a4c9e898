use thiserror::Error;

/// 库内统一错误类型
#[derive(Debug, Error)]
pub enum Error {
    #[error("symbol '{}' is not part of the alphabet", char::from(*.0))]
    UnknownSymbol(u8),

    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),

    #[error("scoring matrix is {rows}x{columns} but the alphabet has {symbols} symbols")]
    MatrixDimension {
        rows: usize,
        columns: usize,
        symbols: usize,
    },

    #[error("invalid scoring parameters: {0}")]
    InvalidParams(String),

    #[error("amino acid set holds at most {capacity} residues, got {len}")]
    SetCapacity { len: usize, capacity: usize },

    #[error("confidence has {confidence} values for a sequence of {sequence} residues")]
    ConfidenceLength { confidence: usize, sequence: usize },

    #[error("edit at offset {offset} removing {removed} residues exceeds sequence length {len}")]
    EditOutOfBounds {
        offset: usize,
        removed: usize,
        len: usize,
    },

    #[error("invalid CIGAR string: {0}")]
    InvalidCigar(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
