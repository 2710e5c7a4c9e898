use std::fmt;

use crate::error::{Error, Result};
use crate::util::alphabet::Alphabet;

/// 每个残基占用的比特数
const BITS: u32 = 6;
const MASK: u64 = (1 << BITS) - 1;

/// 最多编码 10 个残基（10 × 6 = 60 bit）
pub const CAPACITY: usize = 10;

/// 将一小段残基编码为单个整数的集合键。
///
/// 每个残基占 6 bit，值为字母表位置 + 1；`sorted` 构造的集合与残基顺序无关，
/// 可作为等质量组合 / 修饰规则的哈希键。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AminoAcidSet(u64);

impl AminoAcidSet {
    /// 按给定顺序编码
    pub fn new(alphabet: &Alphabet, residues: &[u8]) -> Result<Self> {
        let digits = Self::digits(alphabet, residues)?;
        Ok(Self::pack(&digits))
    }

    /// 先排序再编码，`AB` 与 `BA` 得到同一个值
    pub fn sorted(alphabet: &Alphabet, residues: &[u8]) -> Result<Self> {
        let mut digits = Self::digits(alphabet, residues)?;
        digits.sort_unstable();
        Ok(Self::pack(&digits))
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn len(self) -> usize {
        let mut v = self.0;
        let mut n = 0;
        while v != 0 {
            n += 1;
            v >>= BITS;
        }
        n
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 解码回残基序列
    pub fn residues(self, alphabet: &Alphabet) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        let mut v = self.0;
        while v != 0 {
            let digit = (v & MASK) as usize;
            if let Some(s) = alphabet.symbol(digit - 1) {
                out.push(s);
            }
            v >>= BITS;
        }
        out.reverse();
        out
    }

    fn digits(alphabet: &Alphabet, residues: &[u8]) -> Result<Vec<u8>> {
        if residues.len() > CAPACITY {
            return Err(Error::SetCapacity {
                len: residues.len(),
                capacity: CAPACITY,
            });
        }
        if alphabet.len() as u64 > MASK {
            return Err(Error::InvalidAlphabet(format!(
                "{} symbols do not fit in a {}-bit residue slot",
                alphabet.len(),
                BITS
            )));
        }
        alphabet.digits(residues)
    }

    fn pack(digits: &[u8]) -> Self {
        Self(
            digits
                .iter()
                .fold(0u64, |acc, &d| (acc << BITS) | u64::from(d)),
        )
    }
}

impl fmt::Display for AminoAcidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}
