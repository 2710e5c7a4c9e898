use serde::Serialize;

use crate::error::{Error, Result};
use crate::read::Read;

/// 编辑日志中的一条记录
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SequenceEdit {
    pub offset: usize,
    pub removed: Vec<u8>,
    pub inserted: Vec<u8>,
    pub reason: String,
}

/// 查询序列的局部副本：原始序列不可变，修改以追加日志的形式记录。
///
/// 当前序列与置信度总是等于把日志依次应用到原始序列上的结果（见 [`replay`](Self::replay)）。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocalSequence {
    original: Vec<u8>,
    original_confidence: Vec<f64>,
    sequence: Vec<u8>,
    confidence: Vec<f64>,
    edits: Vec<SequenceEdit>,
}

impl LocalSequence {
    pub fn new(sequence: Vec<u8>, confidence: Vec<f64>) -> Result<Self> {
        let confidence = if confidence.is_empty() {
            vec![1.0; sequence.len()]
        } else {
            confidence
        };
        if confidence.len() != sequence.len() {
            return Err(Error::ConfidenceLength {
                confidence: confidence.len(),
                sequence: sequence.len(),
            });
        }
        Ok(Self {
            original: sequence.clone(),
            original_confidence: confidence.clone(),
            sequence,
            confidence,
            edits: Vec::new(),
        })
    }

    pub fn from_read(read: &Read) -> Self {
        let sequence = read.sequence().to_vec();
        let confidence = read.confidence().to_vec();
        Self {
            original: sequence.clone(),
            original_confidence: confidence.clone(),
            sequence,
            confidence,
            edits: Vec::new(),
        }
    }

    #[inline]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    #[inline]
    pub fn confidence(&self) -> &[f64] {
        &self.confidence
    }

    pub fn original(&self) -> &[u8] {
        &self.original
    }

    pub fn edits(&self) -> &[SequenceEdit] {
        &self.edits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        !self.edits.is_empty()
    }

    /// 用 `insert` 替换 `offset` 起的 `delete` 个残基，并记录原因。
    /// 被替换区域的平均置信度均匀赋给插入的残基。
    pub fn update(&mut self, offset: usize, delete: usize, insert: &[u8], reason: impl Into<String>) -> Result<()> {
        if offset + delete > self.sequence.len() {
            return Err(Error::EditOutOfBounds {
                offset,
                removed: delete,
                len: self.sequence.len(),
            });
        }
        let edit = SequenceEdit {
            offset,
            removed: self.sequence[offset..offset + delete].to_vec(),
            inserted: insert.to_vec(),
            reason: reason.into(),
        };
        let (sequence, confidence) = apply(&self.sequence, &self.confidence, &edit);
        self.sequence = sequence;
        self.confidence = confidence;
        self.edits.push(edit);
        Ok(())
    }

    /// 从原始序列重放全部编辑
    pub fn replay(&self) -> (Vec<u8>, Vec<f64>) {
        self.edits.iter().fold(
            (self.original.clone(), self.original_confidence.clone()),
            |(seq, conf), edit| apply(&seq, &conf, edit),
        )
    }

    /// 当前序列上“被修改 / 未修改”的连续区段
    pub fn change_profile(&self) -> Vec<(bool, usize)> {
        let mut changed = vec![false; self.original.len()];
        for edit in &self.edits {
            let end = (edit.offset + edit.removed.len()).min(changed.len());
            let start = edit.offset.min(end);
            changed.splice(start..end, std::iter::repeat(true).take(edit.inserted.len()));
        }
        let mut out: Vec<(bool, usize)> = Vec::new();
        for flag in changed {
            match out.last_mut() {
                Some((last, n)) if *last == flag => *n += 1,
                _ => out.push((flag, 1)),
            }
        }
        out
    }
}

fn apply(sequence: &[u8], confidence: &[f64], edit: &SequenceEdit) -> (Vec<u8>, Vec<f64>) {
    let end = edit.offset + edit.removed.len();
    let mut seq = Vec::with_capacity(sequence.len() + edit.inserted.len());
    seq.extend_from_slice(&sequence[..edit.offset]);
    seq.extend_from_slice(&edit.inserted);
    seq.extend_from_slice(&sequence[end..]);

    let replaced = &confidence[edit.offset..end];
    let average = if replaced.is_empty() {
        0.0
    } else {
        replaced.iter().sum::<f64>() / replaced.len() as f64
    };
    let mut conf = Vec::with_capacity(seq.len());
    conf.extend_from_slice(&confidence[..edit.offset]);
    conf.extend(std::iter::repeat(average).take(edit.inserted.len()));
    conf.extend_from_slice(&confidence[end..]);
    (seq, conf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalSequence {
        LocalSequence::new(b"ACDEFG".to_vec(), vec![1.0, 0.5, 0.3, 0.9, 0.8, 0.7]).unwrap()
    }

    #[test]
    fn update_replaces_window() {
        let mut l = local();
        l.update(1, 2, b"NGG", "test").unwrap();
        assert_eq!(l.sequence(), b"ANGGEFG");
        assert_eq!(l.original(), b"ACDEFG");
        assert_eq!(l.edits().len(), 1);
        assert_eq!(l.edits()[0].removed, b"CD");
        let avg = (0.5 + 0.3) / 2.0;
        assert_eq!(l.confidence(), &[1.0, avg, avg, avg, 0.9, 0.8, 0.7]);
    }

    #[test]
    fn update_pure_insertion_gets_zero_confidence() {
        let mut l = local();
        l.update(2, 0, b"W", "insert").unwrap();
        assert_eq!(l.sequence(), b"ACWDEFG");
        assert_eq!(l.confidence()[2], 0.0);
    }

    #[test]
    fn update_out_of_bounds() {
        let mut l = local();
        assert!(matches!(l.update(5, 2, b"A", "x"), Err(Error::EditOutOfBounds { .. })));
        assert!(!l.is_modified());
    }

    #[test]
    fn replay_matches_current_state() {
        let mut l = local();
        l.update(0, 1, b"L", "first").unwrap();
        l.update(3, 2, b"Q", "second").unwrap();
        let (seq, conf) = l.replay();
        assert_eq!(seq, l.sequence());
        assert_eq!(conf, l.confidence());
    }

    #[test]
    fn change_profile_runs() {
        let mut l = local();
        l.update(2, 1, b"GG", "split").unwrap();
        assert_eq!(l.change_profile(), vec![(false, 2), (true, 2), (false, 3)]);
    }

    #[test]
    fn confidence_defaults_and_checks() {
        let l = LocalSequence::new(b"AC".to_vec(), vec![]).unwrap();
        assert_eq!(l.confidence(), &[1.0, 1.0]);
        assert!(LocalSequence::new(b"AC".to_vec(), vec![1.0]).is_err());
    }
}
