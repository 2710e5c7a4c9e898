use serde::Serialize;

use crate::error::{Error, Result};
use crate::util::alphabet::Alphabet;

/// 一条肽段读段：残基序列、逐残基置信度、标识符与总峰面积
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Read {
    pub id: String,
    sequence: Vec<u8>,
    confidence: Vec<f64>,
    /// 仅用于报告，不参与打分
    pub total_area: f64,
}

impl Read {
    /// 校验序列中的每个符号都在字母表内，置信度默认为 1.0
    pub fn new(id: impl Into<String>, sequence: &[u8], alphabet: &Alphabet) -> Result<Self> {
        let sequence: Vec<u8> = sequence.iter().map(u8::to_ascii_uppercase).collect();
        alphabet.validate(&sequence)?;
        Ok(Self {
            id: id.into(),
            confidence: vec![1.0; sequence.len()],
            sequence,
            total_area: 0.0,
        })
    }

    /// 空置信度视为均匀 1.0，其余长度必须与序列一致
    pub fn with_confidence(mut self, confidence: Vec<f64>) -> Result<Self> {
        if confidence.is_empty() {
            self.confidence = vec![1.0; self.sequence.len()];
            return Ok(self);
        }
        if confidence.len() != self.sequence.len() {
            return Err(Error::ConfidenceLength {
                confidence: confidence.len(),
                sequence: self.sequence.len(),
            });
        }
        self.confidence = confidence;
        Ok(self)
    }

    pub fn with_total_area(mut self, total_area: f64) -> Self {
        self.total_area = total_area;
        self
    }

    #[inline]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    #[inline]
    pub fn confidence(&self) -> &[f64] {
        &self.confidence
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn sequence_str(&self) -> String {
        String::from_utf8_lossy(&self.sequence).into_owned()
    }
}
