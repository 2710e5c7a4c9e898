use std::fmt;
use std::sync::Arc;

use crate::align::dp::{align, Alignment, AlignmentType};
use crate::align::scoring::ScoringModel;
use crate::error::Result;
use crate::matching::local_sequence::LocalSequence;
use crate::matching::mass_spec::{self, MassSpecTable};
use crate::matching::piece::{self, MatchPiece};
use crate::read::Read;
use crate::util::alphabet::{GAP_CHAR, UNKNOWN};

/// 按匹配列统计的明细
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetailedScores {
    pub matches: usize,
    pub mismatches: usize,
    pub gap_in_query: usize,
    pub gap_in_template: usize,
}

/// 一条读段（query）在模板上的匹配，以编辑脚本保存。
///
/// 查询序列保存在 [`LocalSequence`] 中，质谱纠错会修改该副本并同步改写脚本，
/// 所有位置映射都基于修改后的副本。
#[derive(Clone, Debug)]
pub struct SequenceMatch {
    pub template: Arc<Read>,
    pub query: Arc<Read>,
    pub start_template: usize,
    pub start_query: usize,
    pub score: i32,
    pub unique: bool,
    pieces: Vec<MatchPiece>,
    local: LocalSequence,
    length_on_template: usize,
    length_on_query: usize,
    total_matches: usize,
}

impl SequenceMatch {
    /// 由比对结果构建，A 为模板，B 为查询
    pub fn new(alignment: &Alignment, template: Arc<Read>, query: Arc<Read>) -> Self {
        let pieces = piece::from_path(&alignment.path);
        Self::from_parts(
            alignment.start_a,
            alignment.start_b,
            alignment.score,
            pieces,
            template,
            query,
        )
    }

    pub fn from_parts(
        start_template: usize,
        start_query: usize,
        score: i32,
        pieces: Vec<MatchPiece>,
        template: Arc<Read>,
        query: Arc<Read>,
    ) -> Self {
        let local = LocalSequence::from_read(&query);
        let mut m = Self {
            template,
            query,
            start_template,
            start_query,
            score,
            unique: false,
            pieces,
            local,
            length_on_template: 0,
            length_on_query: 0,
            total_matches: 0,
        };
        m.simplify();
        m
    }

    /// 比对并包装为匹配
    pub fn align(template: &Arc<Read>, query: &Arc<Read>, model: &ScoringModel, mode: AlignmentType) -> Result<Self> {
        let alignment = align(template.sequence(), query.sequence(), model, mode)?;
        Ok(Self::new(&alignment, Arc::clone(template), Arc::clone(query)))
    }

    pub fn pieces(&self) -> &[MatchPiece] {
        &self.pieces
    }

    pub fn cigar(&self) -> String {
        piece::to_cigar(&self.pieces)
    }

    pub fn local_sequence(&self) -> &LocalSequence {
        &self.local
    }

    /// 当前（可能已修正的）查询序列
    #[inline]
    pub fn query_sequence(&self) -> &[u8] {
        self.local.sequence()
    }

    #[inline]
    pub fn query_confidence(&self) -> &[f64] {
        self.local.confidence()
    }

    #[inline]
    pub fn length_on_template(&self) -> usize {
        self.length_on_template
    }

    #[inline]
    pub fn length_on_query(&self) -> usize {
        self.length_on_query
    }

    /// Match 操作覆盖的列数
    #[inline]
    pub fn total_matches(&self) -> usize {
        self.total_matches
    }

    /// 模板上的结束位置（不含）
    #[inline]
    pub fn end_template(&self) -> usize {
        self.start_template + self.length_on_template
    }

    #[inline]
    pub fn end_query(&self) -> usize {
        self.start_query + self.length_on_query
    }

    pub fn simplify(&mut self) {
        piece::simplify(&mut self.pieces);
        self.length_on_template = self.pieces.iter().map(|p| p.template_len()).sum();
        self.length_on_query = self.pieces.iter().map(|p| p.query_len()).sum();
        self.total_matches = self
            .pieces
            .iter()
            .filter(|p| matches!(p, MatchPiece::Match(_)))
            .map(|p| p.len())
            .sum();
    }

    pub(crate) fn replace_pieces(&mut self, pieces: Vec<MatchPiece>) {
        self.pieces = pieces;
        self.simplify();
    }

    /// 匹配列对应的模板残基全部是 `X`（被屏蔽）时返回 true
    pub fn is_masked(&self) -> bool {
        let template = self.template.sequence();
        let mut tp = self.start_template;
        for p in &self.pieces {
            if let MatchPiece::Match(n) = *p {
                if template[tp..tp + n].iter().any(|&c| c != UNKNOWN) {
                    return false;
                }
            }
            tp += p.template_len();
        }
        true
    }

    /// 模板位置 `tp` 处的查询残基；删除区域返回紧随其后的查询残基
    pub fn get_at_template_index(&self, tp: usize) -> Option<u8> {
        let q = self.get_query_position(tp)?;
        let seq = self.query_sequence();
        seq.get(q.min(seq.len().checked_sub(1)?)).copied()
    }

    /// 模板位置 `tp` 之后紧跟的插入长度；`start - 1` 处报告前导插入
    pub fn get_gap_at_template_index(&self, tp: usize) -> usize {
        let junction = tp + 1;
        if junction < self.start_template || junction > self.end_template() {
            return 0;
        }
        let mut pos = self.start_template;
        for p in &self.pieces {
            match *p {
                MatchPiece::Insertion(n) if pos == junction => return n,
                MatchPiece::Insertion(_) => {}
                _ => {
                    pos += p.template_len();
                    if pos > junction {
                        return 0;
                    }
                }
            }
        }
        0
    }

    /// 与模板位置 `tp` 对齐的查询位置，超出匹配范围返回 None。
    /// 删除区域返回间隙之后的查询位置。
    pub fn get_query_position(&self, tp: usize) -> Option<usize> {
        if tp < self.start_template || tp >= self.end_template() {
            return None;
        }
        let mut pos = self.start_template;
        let mut q = self.start_query;
        for p in &self.pieces {
            match *p {
                MatchPiece::Match(n) => {
                    if tp < pos + n {
                        return Some(q + (tp - pos));
                    }
                    pos += n;
                    q += n;
                }
                MatchPiece::Deletion(n) => {
                    if tp < pos + n {
                        return Some(q);
                    }
                    pos += n;
                }
                MatchPiece::Insertion(n) => q += n,
            }
        }
        None
    }

    /// 重建与模板窗口 `[start, start + len)` 对齐的查询内容。
    ///
    /// 返回带间隙的字符串（未覆盖或被删除的列用 `.` 填充，插入原样保留）
    /// 以及只含查询残基的数组。窗口内部的插入总是包含；前导 / 尾随插入
    /// 只有当窗口边界正好是本匹配的起点 / 终点时才包含。
    pub fn get_query_sub_match(&self, start: usize, len: usize) -> (String, Vec<u8>) {
        let end = start + len;
        let seq = self.query_sequence();
        let mut gapped = String::with_capacity(len);
        let mut residues = Vec::with_capacity(len);

        let mut pos = self.start_template;
        let mut q = self.start_query;
        if pos > start {
            let pad = (pos - start).min(len);
            gapped.extend(std::iter::repeat(GAP_CHAR as char).take(pad));
        }

        for p in &self.pieces {
            if pos > end {
                break;
            }
            match *p {
                MatchPiece::Match(n) => {
                    let lo = pos.max(start);
                    let hi = (pos + n).min(end);
                    if lo < hi {
                        let from = q + (lo - pos);
                        let to = (q + (hi - pos)).min(seq.len());
                        if from < to {
                            gapped.extend(seq[from..to].iter().map(|&c| c as char));
                            residues.extend_from_slice(&seq[from..to]);
                        }
                    }
                    pos += n;
                    q += n;
                }
                MatchPiece::Deletion(n) => {
                    let lo = pos.max(start);
                    let hi = (pos + n).min(end);
                    if lo < hi {
                        gapped.extend(std::iter::repeat(GAP_CHAR as char).take(hi - lo));
                    }
                    pos += n;
                }
                MatchPiece::Insertion(n) => {
                    let after_start = pos > start || (pos == start && pos == self.start_template);
                    let before_end = pos < end || (pos == end && pos == self.end_template());
                    if after_start && before_end {
                        let to = (q + n).min(seq.len());
                        gapped.extend(seq[q.min(to)..to].iter().map(|&c| c as char));
                        residues.extend_from_slice(&seq[q.min(to)..to]);
                    }
                    q += n;
                }
            }
        }

        if pos < end {
            let pad = (end - pos.max(start)).min(len);
            gapped.extend(std::iter::repeat(GAP_CHAR as char).take(pad));
        }
        (gapped, residues)
    }

    pub fn detailed_scores(&self) -> DetailedScores {
        let template = self.template.sequence();
        let query = self.query_sequence();
        let mut out = DetailedScores::default();
        let mut tp = self.start_template;
        let mut q = self.start_query;
        for p in &self.pieces {
            match *p {
                MatchPiece::Match(n) => {
                    for i in 0..n {
                        if template.get(tp + i) == query.get(q + i) {
                            out.matches += 1;
                        } else {
                            out.mismatches += 1;
                        }
                    }
                    tp += n;
                    q += n;
                }
                MatchPiece::Deletion(n) => {
                    out.gap_in_template += n;
                    tp += n;
                }
                MatchPiece::Insertion(n) => {
                    out.gap_in_query += n;
                    q += n;
                }
            }
        }
        out
    }

    /// 修改查询副本的一个窗口并记录原因，不改动脚本；
    /// 长度变化时调用方必须随后用 `replace_pieces` 重写脚本
    pub(crate) fn update_sequence(&mut self, offset: usize, delete: usize, insert: &[u8], reason: impl Into<String>) -> Result<()> {
        self.local.update(offset, delete, insert, reason)
    }

    /// 修正常见的质谱错误（等质量组合、修饰、I/L），返回修正次数
    pub fn fix_mass_spec_errors(&mut self, table: &MassSpecTable) -> Result<usize> {
        mass_spec::fix_common_errors(self, table)
    }
}

impl fmt::Display for SequenceMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} on {}: template {} query {} score {} cigar {}",
            self.query.id,
            self.template.id,
            self.start_template,
            self.start_query,
            self.score,
            self.cigar()
        )?;
        let template = self.template.sequence();
        let query = self.query_sequence();
        let mut line_t = String::new();
        let mut line_q = String::new();
        let mut tp = self.start_template;
        let mut q = self.start_query;
        for p in &self.pieces {
            let n = p.len();
            match p {
                MatchPiece::Match(_) => {
                    line_t.extend(template[tp..tp + n].iter().map(|&c| c as char));
                    line_q.extend(query[q..q + n].iter().map(|&c| c as char));
                }
                MatchPiece::Insertion(_) => {
                    line_t.extend(std::iter::repeat('-').take(n));
                    line_q.extend(query[q..q + n].iter().map(|&c| c as char));
                }
                MatchPiece::Deletion(_) => {
                    line_t.extend(template[tp..tp + n].iter().map(|&c| c as char));
                    line_q.extend(std::iter::repeat('-').take(n));
                }
            }
            tp += p.template_len();
            q += p.query_len();
        }
        writeln!(f, "{}", line_t)?;
        write!(f, "{}", line_q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::alphabet::Alphabet;
    use MatchPiece::*;

    fn read(id: &str, seq: &[u8]) -> Arc<Read> {
        Arc::new(Read::new(id, seq, &Alphabet::default()).unwrap())
    }

    // template AFGGEWKL, query FGGDEW aligned as F G G - E W with one extra D
    fn sample() -> SequenceMatch {
        let template = read("t", b"AFGGEWKL");
        let query = read("q", b"FGGDEW");
        SequenceMatch::from_parts(1, 0, 30, vec![Match(3), Insertion(1), Match(2)], template, query)
    }

    #[test]
    fn match_totals() {
        let m = sample();
        assert_eq!(m.length_on_template(), 5);
        assert_eq!(m.length_on_query(), 6);
        assert_eq!(m.total_matches(), 5);
        assert_eq!(m.end_template(), 6);
        assert_eq!(m.cigar(), "3M1I2M");
    }

    #[test]
    fn match_position_mapping() {
        let m = sample();
        assert_eq!(m.get_at_template_index(0), None);
        assert_eq!(m.get_at_template_index(1), Some(b'F'));
        assert_eq!(m.get_at_template_index(4), Some(b'E'));
        assert_eq!(m.get_at_template_index(5), Some(b'W'));
        assert_eq!(m.get_at_template_index(6), None);
        assert_eq!(m.get_query_position(4), Some(4));
        assert_eq!(m.get_gap_at_template_index(3), 1);
        assert_eq!(m.get_gap_at_template_index(2), 0);
        assert_eq!(m.get_gap_at_template_index(7), 0);
    }

    #[test]
    fn match_deletion_maps_to_next_residue() {
        let template = read("t", b"ACDEF");
        let query = read("q", b"ACEF");
        let m = SequenceMatch::from_parts(0, 0, 10, vec![Match(2), Deletion(1), Match(2)], template, query);
        assert_eq!(m.get_at_template_index(2), Some(b'E'));
        assert_eq!(m.get_query_position(2), Some(2));
        let (gapped, aa) = m.get_query_sub_match(1, 3);
        assert_eq!(gapped, "C.E");
        assert_eq!(aa, b"CE");
    }

    #[test]
    fn query_sub_match_pads_uncovered() {
        let m = sample();
        let (gapped, aa) = m.get_query_sub_match(0, 8);
        assert_eq!(gapped, ".FGGDEW..");
        assert_eq!(aa, b"FGGDEW");
        let (gapped, aa) = m.get_query_sub_match(2, 2);
        assert_eq!(gapped, "GG");
        assert_eq!(aa, b"GG");
    }

    #[test]
    fn query_sub_match_round_trip() {
        let m = sample();
        let (_, aa) = m.get_query_sub_match(m.start_template, m.length_on_template());
        assert_eq!(aa, &m.query_sequence()[m.start_query..m.end_query()]);
    }

    #[test]
    fn round_trip_from_alignment() {
        let model = ScoringModel::default_model().unwrap();
        let template = read("t", b"SSAFGGEWKK");
        let query = read("q", b"AFNDEWK");
        let m = SequenceMatch::align(&template, &query, &model, AlignmentType::ReadAlign).unwrap();
        let (gapped, aa) = m.get_query_sub_match(m.start_template, m.length_on_template());
        assert_eq!(aa, &m.query_sequence()[m.start_query..m.end_query()]);
        let non_gap: Vec<u8> = gapped.bytes().filter(|&c| c != GAP_CHAR).collect();
        assert_eq!(non_gap, aa);
    }

    #[test]
    fn detailed_scores_count_columns() {
        let template = read("t", b"ACDEF");
        let query = read("q", b"ACQEFW");
        let m = SequenceMatch::from_parts(0, 0, 10, vec![Match(5), Insertion(1)], template, query);
        let s = m.detailed_scores();
        assert_eq!(s.matches, 4);
        assert_eq!(s.mismatches, 1);
        assert_eq!(s.gap_in_query, 1);
        assert_eq!(s.gap_in_template, 0);
    }

    #[test]
    fn masked_template_detection() {
        let template = read("t", b"XXXXACD");
        let query = read("q", b"WWWW");
        let m = SequenceMatch::from_parts(0, 0, 10, vec![Match(4)], Arc::clone(&template), Arc::clone(&query));
        assert!(m.is_masked());
        let m = SequenceMatch::from_parts(2, 0, 10, vec![Match(3)], template, query);
        assert!(!m.is_masked());
    }

    #[test]
    fn display_renders_alignment() {
        let text = sample().to_string();
        assert!(text.contains("3M1I2M"));
        assert!(text.ends_with("FGG-EW\nFGGDEW"));
    }
}
