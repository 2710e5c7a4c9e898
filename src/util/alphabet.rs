use crate::error::{Error, Result};

/// 缺失残基 / 间隙字符
pub const GAP_CHAR: u8 = b'.';
/// 终止密码子字符
pub const STOP_CHAR: u8 = b'*';
/// 未知残基
pub const UNKNOWN: u8 = b'X';

/// 默认打分模型使用的字母表（20 种氨基酸 + B/Z/X + 间隙 + 终止）
pub const DEFAULT_SYMBOLS: &[u8] = b"ARNDCQEGHILKMFPSTWYVBZX.*";

/// 有序残基字母表。
///
/// 每个符号映射到其位置；窗口编码使用 `位置 + 1` 作为数字，0 保留给“空”。
#[derive(Clone, Debug)]
pub struct Alphabet {
    symbols: Vec<u8>,
    // 0 = not in alphabet, otherwise position + 1
    lookup: [u8; 256],
}

impl Alphabet {
    pub fn new(symbols: &[u8]) -> Result<Self> {
        if symbols.is_empty() {
            return Err(Error::InvalidAlphabet("alphabet is empty".to_string()));
        }
        if symbols.len() > u8::MAX as usize - 1 {
            return Err(Error::InvalidAlphabet(format!(
                "alphabet has {} symbols",
                symbols.len()
            )));
        }
        let mut lookup = [0u8; 256];
        for (i, &s) in symbols.iter().enumerate() {
            let s = s.to_ascii_uppercase();
            if lookup[s as usize] != 0 {
                return Err(Error::InvalidAlphabet(format!(
                    "symbol '{}' occurs twice",
                    s as char
                )));
            }
            lookup[s as usize] = (i + 1) as u8;
        }
        Ok(Self {
            symbols: symbols.iter().map(u8::to_ascii_uppercase).collect(),
            lookup,
        })
    }

    pub fn default_amino_acids() -> Self {
        let mut lookup = [0u8; 256];
        for (i, &s) in DEFAULT_SYMBOLS.iter().enumerate() {
            lookup[s as usize] = (i + 1) as u8;
        }
        Self {
            symbols: DEFAULT_SYMBOLS.to_vec(),
            lookup,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    #[inline]
    pub fn contains(&self, b: u8) -> bool {
        self.lookup[b as usize] != 0
    }

    #[inline]
    pub fn position(&self, b: u8) -> Option<usize> {
        match self.lookup[b as usize] {
            0 => None,
            d => Some(d as usize - 1),
        }
    }

    #[inline]
    pub fn symbol(&self, position: usize) -> Option<u8> {
        self.symbols.get(position).copied()
    }

    /// 窗口编码的数字（位置 + 1）
    #[inline]
    pub fn digit(&self, b: u8) -> Result<u8> {
        match self.lookup[b as usize] {
            0 => Err(Error::UnknownSymbol(b)),
            d => Ok(d),
        }
    }

    /// 将整条序列转换为数字序列，遇到字母表外的符号即报错
    pub fn digits(&self, seq: &[u8]) -> Result<Vec<u8>> {
        seq.iter().map(|&b| self.digit(b)).collect()
    }

    /// 窗口编码的基数
    #[inline]
    pub fn base(&self) -> u64 {
        self.symbols.len() as u64 + 1
    }

    /// `code = fold(acc * base + digit)`，空窗口编码为 0
    pub fn window_code(&self, window: &[u8]) -> Result<u64> {
        let base = self.base();
        window
            .iter()
            .try_fold(0u64, |acc, &b| Ok(acc * base + u64::from(self.digit(b)?)))
    }

    pub fn validate(&self, seq: &[u8]) -> Result<()> {
        match seq.iter().find(|&&b| !self.contains(b)) {
            Some(&b) => Err(Error::UnknownSymbol(b)),
            None => Ok(()),
        }
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::default_amino_acids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_positions() {
        let a = Alphabet::default();
        assert_eq!(a.len(), 25);
        assert_eq!(a.position(b'A'), Some(0));
        assert_eq!(a.position(b'*'), Some(24));
        assert_eq!(a.position(b'J'), None);
        assert_eq!(a.symbol(3), Some(b'D'));
        assert!(a.contains(GAP_CHAR));
    }

    #[test]
    fn alphabet_rejects_duplicates() {
        assert!(Alphabet::new(b"ACA").is_err());
        assert!(Alphabet::new(b"").is_err());
    }

    #[test]
    fn window_codes_are_positional() {
        let a = Alphabet::new(b"AB").unwrap();
        assert_eq!(a.base(), 3);
        assert_eq!(a.window_code(b"").unwrap(), 0);
        assert_eq!(a.window_code(b"A").unwrap(), 1);
        assert_eq!(a.window_code(b"B").unwrap(), 2);
        assert_eq!(a.window_code(b"AB").unwrap(), 5);
        assert_eq!(a.window_code(b"BA").unwrap(), 7);
        assert!(matches!(a.window_code(b"AC"), Err(Error::UnknownSymbol(b'C'))));
    }
}
