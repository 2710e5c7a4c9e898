use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::align::dp::AlignmentPiece;
use crate::error::{Error, Result};

/// CIGAR 风格的编辑操作
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MatchPiece {
    /// 模板与查询各消耗 `n` 个残基
    Match(usize),
    /// 查询多出的残基（模板上的间隙）
    Insertion(usize),
    /// 模板多出的残基（查询上的间隙）
    Deletion(usize),
}

impl MatchPiece {
    #[inline]
    pub fn len(self) -> usize {
        match self {
            MatchPiece::Match(n) | MatchPiece::Insertion(n) | MatchPiece::Deletion(n) => n,
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// 在模板上占用的长度
    #[inline]
    pub fn template_len(self) -> usize {
        match self {
            MatchPiece::Match(n) | MatchPiece::Deletion(n) => n,
            MatchPiece::Insertion(_) => 0,
        }
    }

    /// 在查询上占用的长度
    #[inline]
    pub fn query_len(self) -> usize {
        match self {
            MatchPiece::Match(n) | MatchPiece::Insertion(n) => n,
            MatchPiece::Deletion(_) => 0,
        }
    }

    pub fn op(self) -> char {
        match self {
            MatchPiece::Match(_) => 'M',
            MatchPiece::Insertion(_) => 'I',
            MatchPiece::Deletion(_) => 'D',
        }
    }

    pub fn with_len(self, n: usize) -> Self {
        match self {
            MatchPiece::Match(_) => MatchPiece::Match(n),
            MatchPiece::Insertion(_) => MatchPiece::Insertion(n),
            MatchPiece::Deletion(_) => MatchPiece::Deletion(n),
        }
    }

    fn same_kind(self, other: Self) -> bool {
        self.op() == other.op()
    }
}

impl fmt::Display for MatchPiece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len(), self.op())
    }
}

/// 单遍合并相邻同类操作并删除长度为 0 的操作
pub fn simplify(pieces: &mut Vec<MatchPiece>) {
    let mut out: Vec<MatchPiece> = Vec::with_capacity(pieces.len());
    for &p in pieces.iter() {
        if p.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.same_kind(p) => *last = last.with_len(last.len() + p.len()),
            _ => out.push(p),
        }
    }
    *pieces = out;
}

/// 把 DP 路径转换为编辑脚本，多残基窗口 `S[a,b]` 拆成 Match(min) 加上长度差
pub fn from_path(path: &[AlignmentPiece]) -> Vec<MatchPiece> {
    let mut out = Vec::with_capacity(path.len());
    for p in path {
        let (a, b) = (p.step_a as usize, p.step_b as usize);
        match (a, b) {
            (0, 0) => {}
            (0, n) => out.push(MatchPiece::Insertion(n)),
            (n, 0) => out.push(MatchPiece::Deletion(n)),
            _ => {
                out.push(MatchPiece::Match(a.min(b)));
                if a > b {
                    out.push(MatchPiece::Deletion(a - b));
                } else if b > a {
                    out.push(MatchPiece::Insertion(b - a));
                }
            }
        }
    }
    simplify(&mut out);
    out
}

pub fn to_cigar(pieces: &[MatchPiece]) -> String {
    let mut cigar = String::new();
    for p in pieces {
        let _ = write!(&mut cigar, "{}", p);
    }
    cigar
}

pub fn parse_cigar(cigar: &str) -> Result<Vec<MatchPiece>> {
    let mut result = Vec::new();
    let mut num: Option<usize> = None;
    for ch in cigar.chars() {
        if let Some(d) = ch.to_digit(10) {
            num = Some(num.unwrap_or(0) * 10 + d as usize);
            continue;
        }
        let n = num.take().ok_or_else(|| Error::InvalidCigar(cigar.to_string()))?;
        result.push(match ch {
            'M' | '=' | 'X' => MatchPiece::Match(n),
            'I' => MatchPiece::Insertion(n),
            'D' => MatchPiece::Deletion(n),
            _ => return Err(Error::InvalidCigar(cigar.to_string())),
        });
    }
    if num.is_some() {
        return Err(Error::InvalidCigar(cigar.to_string()));
    }
    Ok(result)
}
