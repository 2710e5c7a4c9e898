use crate::align::dp::{fill, Alignment, AlignmentType, DpBuffer};
use crate::align::scoring::ScoringModel;
use crate::error::Result;

/// 末端重叠比对结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overlap {
    /// 最佳重叠的比对，`start_a` 已换算到完整 A 的坐标
    pub alignment: Alignment,
    /// 最佳重叠长度，0 表示没有可比对的重叠
    pub overlap: usize,
    /// `scores[k - 1]` 为重叠长度 `k` 的 Global 得分
    pub scores: Vec<i32>,
}

/// 把 A 的末尾 `k` 个残基与 B 的前 `k` 个残基做 Global 比对，
/// `k` 取 `1..=min(max_overlap, |A|, |B|)`，保留得分最高（并列取最短）的重叠。
pub fn end_alignment(a: &[u8], b: &[u8], model: &ScoringModel, max_overlap: usize) -> Result<Overlap> {
    let da = model.alphabet().digits(a)?;
    let db = model.alphabet().digits(b)?;
    Ok(best_overlap(&da, &db, model, max_overlap, &mut DpBuffer::new()))
}

pub(crate) fn best_overlap(
    a: &[u8],
    b: &[u8],
    model: &ScoringModel,
    max_overlap: usize,
    buf: &mut DpBuffer,
) -> Overlap {
    let limit = max_overlap.min(a.len()).min(b.len());
    let mut scores = Vec::with_capacity(limit);
    let mut best: Option<(usize, Alignment)> = None;

    for k in 1..=limit {
        let offset = a.len() - k;
        let mut aln = fill(&a[offset..], &b[..k], model, AlignmentType::Global, buf);
        aln.start_a += offset;
        scores.push(aln.score);
        if best.as_ref().map_or(true, |(_, cur)| aln.score > cur.score) {
            best = Some((k, aln));
        }
    }

    let (overlap, mut alignment) = best.unwrap_or((0, Alignment::empty(AlignmentType::EndAlignment)));
    alignment.mode = AlignmentType::EndAlignment;
    Overlap {
        alignment,
        overlap,
        scores,
    }
}
