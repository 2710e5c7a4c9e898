use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::util::alphabet::Alphabet;

/// 单个窗口允许的最大残基数
pub const MAX_WINDOW: usize = 8;

/// 启用交换奖励时的最大窗口；更长的窗口会让交换表按排列数爆炸
pub const MAX_SWAP_WINDOW: usize = 4;

/// 对称规则：同一组内互为等质量的残基串，两两之间赋同一分值。
///
/// `groups` 中每一项是一组互相等价的残基串，例如 `[["I", "L"], ["GG", "N"]]`。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricRule {
    pub score: i8,
    pub groups: Vec<Vec<String>>,
}

/// 非对称规则（修饰）：只设置 `from → to` 方向的分值
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsymmetricRule {
    pub score: i8,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

/// 以窗口编码寻址的打分模型。
///
/// 单残基对存放在稠密表中；多残基窗口只有被规则覆盖的组合才有分值，
/// 因此存放在稀疏表里。未定义的组合得分为 0，比对时跳过。
#[derive(Clone, Debug)]
pub struct ScoringModel {
    alphabet: Alphabet,
    base: u64,
    single: Vec<i8>,
    windows: HashMap<(u64, u64), i8>,
    gap_start: i8,
    gap_extend: i8,
    swap: i8,
    size: usize,
    dimension: u64,
}

impl ScoringModel {
    /// 以 identity/mismatch 生成单残基表，再叠加规则
    pub fn build(
        alphabet: Alphabet,
        symmetric: &[SymmetricRule],
        asymmetric: &[AsymmetricRule],
        identity: i8,
        mismatch: i8,
        gap_start: i8,
        gap_extend: i8,
        swap: i8,
        size: usize,
    ) -> Result<Self> {
        let n = alphabet.len();
        let matrix: Vec<Vec<i8>> = (0..n)
            .map(|x| (0..n).map(|y| if x == y { identity } else { mismatch }).collect())
            .collect();
        Self::with_matrix(alphabet, &matrix, symmetric, asymmetric, gap_start, gap_extend, swap, size)
    }

    /// 以显式的单残基方阵构建
    pub fn with_matrix(
        alphabet: Alphabet,
        matrix: &[Vec<i8>],
        symmetric: &[SymmetricRule],
        asymmetric: &[AsymmetricRule],
        gap_start: i8,
        gap_extend: i8,
        swap: i8,
        size: usize,
    ) -> Result<Self> {
        let n = alphabet.len();
        if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
            return Err(Error::MatrixDimension {
                rows: matrix.len(),
                columns: matrix.iter().map(Vec::len).max().unwrap_or(0),
                symbols: n,
            });
        }
        if size == 0 || size > MAX_WINDOW {
            return Err(Error::InvalidParams(format!(
                "window size {} outside 1..={}",
                size, MAX_WINDOW
            )));
        }
        if swap != 0 && size > MAX_SWAP_WINDOW {
            return Err(Error::InvalidParams(format!(
                "swap bonus needs a window size of at most {}, got {}",
                MAX_SWAP_WINDOW, size
            )));
        }
        if gap_start > 0 || gap_extend > 0 {
            return Err(Error::InvalidParams(format!(
                "gap penalties must not be positive (start {}, extend {})",
                gap_start, gap_extend
            )));
        }
        let base = alphabet.base();
        let dimension = base
            .checked_pow(size as u32)
            .and_then(|d| d.checked_add(1))
            .ok_or_else(|| {
                Error::InvalidParams(format!(
                    "window codes for {} symbols with size {} overflow",
                    n, size
                ))
            })?;

        let mut model = Self {
            base,
            single: vec![0; (base * base) as usize],
            windows: HashMap::new(),
            gap_start,
            gap_extend,
            swap,
            size,
            dimension,
            alphabet,
        };

        // (1) single residue pairs
        for (x, row) in matrix.iter().enumerate() {
            for (y, &s) in row.iter().enumerate() {
                model.single[(x + 1) * base as usize + (y + 1)] = s;
            }
        }

        // (2) symmetric rules: every ordered pair of distinct runs within a group
        for rule in symmetric {
            for group in &rule.groups {
                let runs = model.runs(group)?;
                for pair in runs.iter().permutations(2) {
                    model.set_permutations(pair[0], pair[1], rule.score)?;
                }
            }
        }

        // (3) asymmetric rules: from -> to only
        for rule in asymmetric {
            let from = model.runs(&rule.from)?;
            let to = model.runs(&rule.to)?;
            for x in &from {
                for y in &to {
                    model.set_permutations(x, y, rule.score)?;
                }
            }
        }

        // (4) swaps: each multiset once, every ordered pair of its orderings
        if swap != 0 {
            let symbols = model.alphabet.symbols().to_vec();
            for len in (2..=size).rev() {
                let score = (len as i32 * i32::from(swap)).clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8;
                for set in symbols.iter().copied().combinations_with_replacement(len) {
                    if set.iter().all(|&s| s == set[0]) {
                        continue;
                    }
                    let codes = model.orderings(&set)?;
                    for &a in &codes {
                        for &b in &codes {
                            model.set_code(a, b, score);
                        }
                    }
                }
            }
        }

        Ok(model)
    }

    /// 默认肽段模型：同位素等质量规则、Q→E 脱酰胺、窗口 3，参数见 [`ScoringConfig::default`]
    pub fn default_model() -> Result<Self> {
        ScoringConfig::default().build()
    }

    /// BLOSUM62，窗口 1，无规则
    pub fn blosum62() -> Result<Self> {
        let matrix: Vec<Vec<i8>> = BLOSUM62.iter().map(|row| row.to_vec()).collect();
        Self::with_matrix(
            Alphabet::new(b"ARNDCQEGHILKMFPSTWYVBZX.")?,
            &matrix,
            &[],
            &[],
            -12,
            -1,
            -1,
            1,
        )
    }

    /// 查询两个窗口的分值，窗口长度必须在 `1..=size` 内
    pub fn score(&self, a: &[u8], b: &[u8]) -> Result<i8> {
        for w in [a, b] {
            if w.is_empty() || w.len() > self.size {
                return Err(Error::InvalidParams(format!(
                    "window of length {} outside 1..={}",
                    w.len(),
                    self.size
                )));
            }
        }
        Ok(self.score_code(self.alphabet.window_code(a)?, self.alphabet.window_code(b)?))
    }

    #[inline]
    pub(crate) fn score_code(&self, a: u64, b: u64) -> i8 {
        if a < self.base && b < self.base {
            self.single[(a * self.base + b) as usize]
        } else {
            self.windows.get(&(a, b)).copied().unwrap_or(0)
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    #[inline]
    pub fn gap_start(&self) -> i8 {
        self.gap_start
    }

    #[inline]
    pub fn gap_extend(&self) -> i8 {
        self.gap_extend
    }

    pub fn swap(&self) -> i8 {
        self.swap
    }

    /// 最大窗口长度
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn base(&self) -> u64 {
        self.base
    }

    /// 名义表维度：`(|alphabet| + 1)^size + 1`
    pub fn dimension(&self) -> u64 {
        self.dimension
    }

    fn runs(&self, group: &[String]) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::with_capacity(group.len());
        for run in group {
            let bytes: Vec<u8> = run.bytes().map(|b| b.to_ascii_uppercase()).collect();
            self.alphabet.validate(&bytes)?;
            if !bytes.is_empty() && bytes.len() <= self.size {
                out.push(bytes);
            }
        }
        Ok(out)
    }

    /// 一个残基串所有不同排列的窗口编码
    fn orderings(&self, run: &[u8]) -> Result<Vec<u64>> {
        let mut codes = run
            .iter()
            .copied()
            .permutations(run.len())
            .map(|p| self.alphabet.window_code(&p))
            .collect::<Result<Vec<_>>>()?;
        codes.sort_unstable();
        codes.dedup();
        Ok(codes)
    }

    fn set_permutations(&mut self, a: &[u8], b: &[u8], score: i8) -> Result<()> {
        let codes_b = self.orderings(b)?;
        for ca in self.orderings(a)? {
            for &cb in &codes_b {
                self.set_code(ca, cb, score);
            }
        }
        Ok(())
    }

    fn set_code(&mut self, a: u64, b: u64, score: i8) {
        if a < self.base && b < self.base {
            self.single[(a * self.base + b) as usize] = score;
        } else {
            self.windows.insert((a, b), score);
        }
    }
}

#[rustfmt::skip]
const BLOSUM62: [[i8; 24]; 24] = [
    [4, -1, -2, -2, 0, -1, -1, 0, -2, -1, -1, -1, -1, -2, -1, 1, 0, -3, -2, 0, -2, -1, 1, -4],
    [-1, 5, 0, -2, -3, 1, 0, -2, 0, -3, -2, 2, -1, -3, -2, -1, -1, -3, -2, -3, -1, 0, 1, -4],
    [-2, 0, 6, 1, -3, 0, 0, 0, 1, -3, -3, 0, -2, -3, -2, 1, 0, -4, -2, -3, 3, 0, 1, -4],
    [-2, -2, 1, 6, -3, 0, 2, -1, -1, -3, -4, -1, -3, -3, -1, 0, -1, -4, -3, -3, 4, 1, 1, -4],
    [0, -3, -3, -3, 9, -3, -4, -3, -3, -1, -1, -3, -1, -2, -3, -1, -1, -2, -2, -1, -3, -3, 1, -4],
    [-1, 1, 0, 0, -3, 5, 2, -2, 0, -3, -2, 1, 0, -3, -1, 0, -1, -2, -1, -2, 0, 3, 1, -4],
    [-1, 0, 0, 2, -4, 2, 5, -2, 0, -3, -3, 1, -2, -3, -1, 0, -1, -3, -2, -2, 1, 4, 1, -4],
    [0, -2, 0, -1, -3, -2, -2, 6, -2, -4, -4, -2, -3, -3, -2, 0, -2, -2, -3, -3, -1, -2, 1, -4],
    [-2, 0, 1, -1, -3, 0, 0, -2, 8, -3, -3, -1, -2, -1, -2, -1, -2, -2, 2, -3, 0, 0, 1, -4],
    [-1, -3, -3, -3, -1, -3, -3, -4, -3, 4, 2, -3, 1, 0, -3, -2, -1, -3, -1, 3, -3, -3, 1, -4],
    [-1, -2, -3, -4, -1, -2, -3, -4, -3, 2, 4, -2, 2, 0, -3, -2, -1, -2, -1, 1, -4, -3, 1, -4],
    [-1, 2, 0, -1, -3, 1, 1, -2, -1, -3, -2, 5, -1, -3, -1, 0, -1, -3, -2, -2, 0, 1, 1, -4],
    [-1, -1, -2, -3, -1, 0, -2, -3, -2, 1, 2, -1, 5, 0, -2, -1, -1, -1, -1, 1, -3, -1, 1, -4],
    [-2, -3, -3, -3, -2, -3, -3, -3, -1, 0, 0, -3, 0, 6, -4, -2, -2, 1, 3, -1, -3, -3, 1, -4],
    [-1, -2, -2, -1, -3, -1, -1, -2, -2, -3, -3, -1, -2, -4, 7, -1, -1, -4, -3, -2, -2, -1, 1, -4],
    [1, -1, 1, 0, -1, 0, 0, 0, -1, -2, -2, 0, -1, -2, -1, 4, 1, -3, -2, -2, 0, 0, 1, -4],
    [0, -1, 0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -2, -1, 1, 5, -2, -2, 0, -1, -1, 1, -4],
    [-3, -3, -4, -4, -2, -2, -3, -2, -2, -3, -2, -3, -1, 1, -4, -3, -2, 11, 2, -3, -4, -3, 1, -4],
    [-2, -2, -2, -3, -2, -1, -2, -3, 2, -1, -1, -2, -1, 3, -3, -2, -2, 2, 7, -1, -3, -2, 1, -4],
    [0, -3, -3, -3, -1, -2, -2, -3, -3, 3, 1, -2, 1, -1, -2, -2, 0, -3, -1, 4, -3, -2, 1, -4],
    [-2, -1, 3, 4, -3, 0, 1, -1, 0, -3, -4, 0, -3, -3, -2, 0, -1, -4, -3, -3, 4, 1, 1, -4],
    [-1, 0, 0, 1, -3, 3, 4, -2, 0, -3, -3, 1, -1, -3, -1, 0, -1, -3, -2, -2, 1, 4, 1, -4],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -4],
    [-4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, 1],
];
