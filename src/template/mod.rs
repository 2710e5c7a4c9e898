//! 模板与共识：并发累积匹配，封存后按需计算三个视图

pub mod consensus;
pub mod segment;

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::debug;

use crate::align::dp::{align, Alignment, AlignmentType};
use crate::align::scoring::ScoringModel;
use crate::error::Result;
use crate::matching::SequenceMatch;
use crate::read::Read;

pub use consensus::{
    AlignedInsertion, AlignedPosition, AlignedResidue, CombinedPosition, Consensus, Insert, InsertionVote,
};
pub use segment::{MatchSummary, Segment};

/// 模板生命周期
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateState {
    Empty,
    Accumulating,
    Finalized,
}

#[derive(Debug, Default)]
struct Accumulator {
    matches: Vec<SequenceMatch>,
    score: i64,
    total_area: f64,
    unique_score: i64,
    unique_area: f64,
    unique_matches: usize,
}

/// 正在接收匹配的模板。
///
/// `add_match` 可以在多个线程上同时调用；共识视图只存在于
/// [`finalize`](Self::finalize) 产生的 [`FinalizedTemplate`] 上。
#[derive(Debug)]
pub struct Template {
    pub name: String,
    pub index: usize,
    read: Arc<Read>,
    cutoff: f64,
    force_germline_isoleucine: bool,
    state: Mutex<Accumulator>,
}

impl Template {
    pub fn new(name: impl Into<String>, index: usize, read: Arc<Read>, cutoff: f64, force_germline_isoleucine: bool) -> Self {
        Self {
            name: name.into(),
            index,
            read,
            cutoff,
            force_germline_isoleucine,
            state: Mutex::new(Accumulator::default()),
        }
    }

    pub fn read(&self) -> &Arc<Read> {
        &self.read
    }

    #[inline]
    pub fn sequence(&self) -> &[u8] {
        self.read.sequence()
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn state(&self) -> TemplateState {
        if self.lock().matches.is_empty() {
            TemplateState::Empty
        } else {
            TemplateState::Accumulating
        }
    }

    pub fn match_count(&self) -> usize {
        self.lock().matches.len()
    }

    /// 得分不低于 `cutoff × sqrt(查询长度)` 且不全落在屏蔽残基上时接受匹配，返回是否接受
    pub fn add_match(&self, mut m: SequenceMatch, unique: bool) -> bool {
        let threshold = self.cutoff * (m.query.len() as f64).sqrt();
        if f64::from(m.score) < threshold {
            debug!(
                "template {}: rejected {} (score {} < {:.2})",
                self.read.id, m.query.id, m.score, threshold
            );
            return false;
        }
        if m.is_masked() {
            debug!("template {}: rejected {} (masked region)", self.read.id, m.query.id);
            return false;
        }

        let mut acc = self.lock();
        acc.score += i64::from(m.score);
        acc.total_area += m.query.total_area;
        if unique {
            m.unique = true;
            acc.unique_score += i64::from(m.score);
            acc.unique_area += m.query.total_area;
            acc.unique_matches += 1;
        }
        acc.matches.push(m);
        true
    }

    /// 封存模板；匹配按 Match 列数降序排列，长读段优先
    pub fn finalize(self) -> FinalizedTemplate {
        let mut acc = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        acc.matches.sort_by(|a, b| {
            b.total_matches()
                .cmp(&a.total_matches())
                .then_with(|| a.query.id.cmp(&b.query.id))
                .then_with(|| a.start_template.cmp(&b.start_template))
        });
        FinalizedTemplate {
            name: self.name,
            index: self.index,
            read: self.read,
            force_germline_isoleucine: self.force_germline_isoleucine,
            matches: acc.matches,
            score: acc.score,
            total_area: acc.total_area,
            unique_score: acc.unique_score,
            unique_area: acc.unique_area,
            unique_matches: acc.unique_matches,
            aligned: OnceLock::new(),
            combined: OnceLock::new(),
            consensus: OnceLock::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Accumulator> {
        // the accumulator is only ever updated as a whole
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 封存后的模板，三个视图各自最多计算一次
#[derive(Debug)]
pub struct FinalizedTemplate {
    pub name: String,
    pub index: usize,
    read: Arc<Read>,
    force_germline_isoleucine: bool,
    matches: Vec<SequenceMatch>,
    pub score: i64,
    pub total_area: f64,
    pub unique_score: i64,
    pub unique_area: f64,
    pub unique_matches: usize,
    aligned: OnceLock<Vec<AlignedPosition>>,
    combined: OnceLock<Vec<CombinedPosition>>,
    consensus: OnceLock<Consensus>,
}

impl FinalizedTemplate {
    pub fn state(&self) -> TemplateState {
        TemplateState::Finalized
    }

    pub fn read(&self) -> &Arc<Read> {
        &self.read
    }

    #[inline]
    pub fn sequence(&self) -> &[u8] {
        self.read.sequence()
    }

    pub fn matches(&self) -> &[SequenceMatch] {
        &self.matches
    }

    pub fn aligned_sequences(&self) -> &[AlignedPosition] {
        self.aligned
            .get_or_init(|| consensus::aligned_sequences(self.read.sequence(), &self.matches))
    }

    pub fn combined_sequence(&self) -> &[CombinedPosition] {
        self.combined
            .get_or_init(|| consensus::combined_sequence(self.read.sequence(), self.aligned_sequences()))
    }

    pub fn consensus_sequence(&self) -> &Consensus {
        self.consensus
            .get_or_init(|| consensus::consensus(self.combined_sequence(), self.force_germline_isoleucine))
    }

    /// 覆盖深度大于 0 的模板位置比例
    pub fn coverage_fraction(&self) -> f64 {
        let combined = self.combined_sequence();
        if combined.is_empty() {
            return 0.0;
        }
        let covered = combined.iter().filter(|p| p.depth() > 0.0).count();
        covered as f64 / combined.len() as f64
    }

    /// 把共识序列全局比对回模板
    pub fn align_consensus_with_template(&self, model: &ScoringModel) -> Result<Alignment> {
        align(
            self.read.sequence(),
            &self.consensus_sequence().sequence,
            model,
            AlignmentType::Global,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchPiece::*;
    use crate::util::alphabet::Alphabet;
    use std::thread;

    fn read(id: &str, seq: &[u8]) -> Arc<Read> {
        Arc::new(Read::new(id, seq, &Alphabet::default()).unwrap())
    }

    fn template(seq: &[u8], cutoff: f64) -> Template {
        Template::new("seg", 0, read("t", seq), cutoff, true)
    }

    #[test]
    fn add_match_applies_cutoff() {
        let t = template(b"ACDEFGHIK", 10.0);
        let q = read("q", b"ACDE");
        // threshold is 10 * sqrt(4) = 20
        let low = SequenceMatch::from_parts(0, 0, 19, vec![Match(4)], Arc::clone(t.read()), Arc::clone(&q));
        let ok = SequenceMatch::from_parts(0, 0, 20, vec![Match(4)], Arc::clone(t.read()), q);
        assert_eq!(t.state(), TemplateState::Empty);
        assert!(!t.add_match(low, false));
        assert_eq!(t.state(), TemplateState::Empty);
        assert!(t.add_match(ok, false));
        assert_eq!(t.state(), TemplateState::Accumulating);
        assert_eq!(t.match_count(), 1);
    }

    #[test]
    fn add_match_rejects_masked() {
        let t = template(b"XXXXACD", 0.0);
        let m = SequenceMatch::from_parts(0, 0, 30, vec![Match(4)], Arc::clone(t.read()), read("q", b"WWWW"));
        assert!(!t.add_match(m, false));
    }

    #[test]
    fn unique_bookkeeping() {
        let t = template(b"ACDEF", 0.0);
        let q = Arc::new(Read::new("q", b"ACDEF", &Alphabet::default()).unwrap().with_total_area(2.5));
        let m = SequenceMatch::from_parts(0, 0, 40, vec![Match(5)], Arc::clone(t.read()), Arc::clone(&q));
        assert!(t.add_match(m.clone(), true));
        assert!(t.add_match(m, false));
        let f = t.finalize();
        assert_eq!(f.score, 80);
        assert_eq!(f.total_area, 5.0);
        assert_eq!(f.unique_score, 40);
        assert_eq!(f.unique_area, 2.5);
        assert_eq!(f.unique_matches, 1);
        assert_eq!(f.matches().iter().filter(|m| m.unique).count(), 1);
        assert_eq!(f.state(), TemplateState::Finalized);
    }

    #[test]
    fn concurrent_add_match() {
        let t = Arc::new(template(b"ACDEFGHIK", 0.0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let t = Arc::clone(&t);
                thread::spawn(move || {
                    for j in 0..25 {
                        let q = read(&format!("q{i}-{j}"), b"ACDEFGHIK");
                        let m = SequenceMatch::from_parts(0, 0, 72, vec![Match(9)], Arc::clone(t.read()), q);
                        assert!(t.add_match(m, false));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let t = Arc::try_unwrap(t).unwrap();
        let f = t.finalize();
        assert_eq!(f.matches().len(), 200);
        assert_eq!(f.score, 200 * 72);
        let c = f.consensus_sequence();
        assert_eq!(c.sequence, b"ACDEFGHIK");
        assert!(c.coverage.iter().all(|&d| d == 200.0));
    }

    #[test]
    fn finalize_orders_longest_first() {
        let t = template(b"ACDEFGHIK", 0.0);
        let short = SequenceMatch::from_parts(2, 0, 20, vec![Match(3)], Arc::clone(t.read()), read("a", b"DEF"));
        let long = SequenceMatch::from_parts(0, 0, 50, vec![Match(7)], Arc::clone(t.read()), read("b", b"ACDEFGH"));
        t.add_match(short, false);
        t.add_match(long, false);
        let f = t.finalize();
        assert_eq!(f.matches()[0].query.id, "b");
        assert_eq!(f.aligned_sequences()[2].residues[0].match_index, 0);
    }

    #[test]
    fn views_are_memoised() {
        let t = template(b"ACDEF", 0.0);
        t.add_match(
            SequenceMatch::from_parts(0, 0, 40, vec![Match(5)], Arc::clone(t.read()), read("q", b"ACDEF")),
            false,
        );
        let f = t.finalize();
        let first = f.consensus_sequence() as *const Consensus;
        let second = f.consensus_sequence() as *const Consensus;
        assert_eq!(first, second);
        assert_eq!(f.combined_sequence().len(), 5);
        assert!((f.coverage_fraction() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn consensus_aligns_back_to_template() {
        let model = ScoringModel::default_model().unwrap();
        let t = template(b"ACDEFGHIK", 0.0);
        t.add_match(
            SequenceMatch::from_parts(0, 0, 72, vec![Match(9)], Arc::clone(t.read()), read("q", b"ACDEFGHIK")),
            false,
        );
        let f = t.finalize();
        let aln = f.align_consensus_with_template(&model).unwrap();
        assert_eq!(aln.score, 72);
        assert_eq!(aln.short_path(), "MMMMMMMMM");
    }

    #[test]
    fn empty_template_has_template_consensus() {
        let f = template(b"ACD", 0.0).finalize();
        assert_eq!(f.consensus_sequence().sequence, b"ACD");
        assert_eq!(f.coverage_fraction(), 0.0);
    }
}
