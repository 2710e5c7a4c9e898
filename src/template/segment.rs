use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::align::dp::{align_with_buf, DpBuffer};
use crate::align::scoring::ScoringModel;
use crate::config::MatchConfig;
use crate::error::Result;
use crate::matching::{MassSpecTable, SequenceMatch};
use crate::read::Read;
use crate::template::{FinalizedTemplate, Template};

/// 一轮匹配的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub reads: usize,
    /// 经过唯一性过滤后提交给模板的匹配数
    pub candidates: usize,
    pub accepted: usize,
    pub unique: usize,
    pub corrections: usize,
}

#[derive(Default)]
struct ReadOutcome {
    candidates: usize,
    accepted: usize,
    unique: bool,
    corrections: usize,
}

/// 一组模板，读段在其中并行寻找位置
#[derive(Debug)]
pub struct Segment {
    pub name: String,
    templates: Vec<Template>,
}

impl Segment {
    pub fn new(name: impl Into<String>, templates: Vec<Template>) -> Self {
        Self {
            name: name.into(),
            templates,
        }
    }

    /// 以同一组参数从序列构建模板
    pub fn from_reads(name: impl Into<String>, reads: Vec<Arc<Read>>, config: &MatchConfig) -> Self {
        let name = name.into();
        let templates = reads
            .into_iter()
            .enumerate()
            .map(|(i, read)| {
                Template::new(
                    name.clone(),
                    i,
                    read,
                    config.cutoff,
                    config.force_germline_isoleucine,
                )
            })
            .collect();
        Self { name, templates }
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// 每条读段与每个模板比对，过滤后并行提交给模板。
    ///
    /// 每个工作线程复用自己的 DP 缓冲区；模板是唯一共享的可变状态。
    pub fn match_reads(&self, reads: &[Arc<Read>], model: &ScoringModel, config: &MatchConfig) -> Result<MatchSummary> {
        let table = if config.fix_mass_spec_errors {
            Some(MassSpecTable::new(model.alphabet())?)
        } else {
            None
        };

        let pool = rayon::ThreadPoolBuilder::new().num_threads(config.threads).build()?;
        let outcomes: Vec<ReadOutcome> = pool.install(|| {
            reads
                .par_iter()
                .map_init(DpBuffer::new, |buf, read| self.place_read(read, model, config, table.as_ref(), buf))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut summary = MatchSummary {
            reads: reads.len(),
            ..MatchSummary::default()
        };
        for o in &outcomes {
            summary.candidates += o.candidates;
            summary.accepted += o.accepted;
            summary.unique += usize::from(o.unique);
            summary.corrections += o.corrections;
        }
        info!(
            "segment {}: {} reads, {} candidate matches, {} accepted, {} unique",
            self.name, summary.reads, summary.candidates, summary.accepted, summary.unique
        );
        Ok(summary)
    }

    fn place_read(
        &self,
        read: &Arc<Read>,
        model: &ScoringModel,
        config: &MatchConfig,
        table: Option<&MassSpecTable>,
        buf: &mut DpBuffer,
    ) -> Result<ReadOutcome> {
        let mut candidates = Vec::with_capacity(self.templates.len());
        for (ti, template) in self.templates.iter().enumerate() {
            let alignment = align_with_buf(template.sequence(), read.sequence(), model, config.alignment, buf)?;
            candidates.push((ti, SequenceMatch::new(&alignment, Arc::clone(template.read()), Arc::clone(read))));
        }

        let unique = if config.enforce_unique > 0.0 {
            let kept = enforce_unique(&mut candidates, config.enforce_unique);
            kept == 1
        } else {
            false
        };

        let mut outcome = ReadOutcome {
            candidates: candidates.len(),
            unique,
            ..ReadOutcome::default()
        };
        for (ti, mut m) in candidates {
            if let Some(table) = table {
                let fixed = m.fix_mass_spec_errors(table)?;
                if fixed > 0 {
                    debug!("{}: {} mass spec corrections on {}", read.id, fixed, m.template.id);
                }
                outcome.corrections += fixed;
            }
            if self.templates[ti].add_match(m, unique) {
                outcome.accepted += 1;
            }
        }
        Ok(outcome)
    }

    /// 封存全部模板
    pub fn finalize(self) -> Vec<FinalizedTemplate> {
        self.templates.into_iter().map(Template::finalize).collect()
    }
}

/// 只保留得分不低于 `threshold × 最高分` 的候选，返回保留数量
fn enforce_unique(candidates: &mut Vec<(usize, SequenceMatch)>, threshold: f64) -> usize {
    let best = candidates.iter().map(|(_, m)| m.score).max().unwrap_or(0).max(0);
    let floor = f64::from(best) * threshold;
    candidates.retain(|(_, m)| m.score > 0 && f64::from(m.score) >= floor);
    candidates.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::dp::AlignmentType;
    use crate::util::alphabet::Alphabet;

    fn read(id: &str, seq: &[u8]) -> Arc<Read> {
        Arc::new(Read::new(id, seq, &Alphabet::default()).unwrap())
    }

    fn config() -> MatchConfig {
        MatchConfig {
            cutoff: 0.0,
            threads: 2,
            ..MatchConfig::default()
        }
    }

    #[test]
    fn reads_land_on_best_template() {
        let model = ScoringModel::default_model().unwrap();
        let cfg = MatchConfig {
            enforce_unique: 0.9,
            ..config()
        };
        let segment = Segment::from_reads(
            "heavy",
            vec![read("t1", b"EVQLVESGGGLVQPGGSLRLSCAAS"), read("t2", b"WKPRTYHHCMNFDWKPRTYHMCFW")],
            &cfg,
        );
        let reads = vec![read("r1", b"ESGGGLVQPG"), read("r2", b"QPGGSLRLSC"), read("r3", b"GLVQPGGS")];
        let summary = segment.match_reads(&reads, &model, &cfg).unwrap();
        assert_eq!(summary.reads, 3);
        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.unique, 3);

        let finalized = segment.finalize();
        assert_eq!(finalized[0].matches().len(), 3);
        assert!(finalized[0].matches().iter().all(|m| m.unique));
        assert!(finalized[1].matches().is_empty());
        assert_eq!(finalized[0].consensus_sequence().sequence, b"EVQLVESGGGLVQPGGSLRLSCAAS");
    }

    #[test]
    fn without_uniqueness_every_template_is_offered() {
        let model = ScoringModel::default_model().unwrap();
        let cfg = config();
        let segment = Segment::from_reads("s", vec![read("t1", b"ACDEFGHIK"), read("t2", b"ACDEFGHIK")], &cfg);
        let summary = segment.match_reads(&[read("r", b"CDEFG")], &model, &cfg).unwrap();
        assert_eq!(summary.candidates, 2);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.unique, 0);
    }

    #[test]
    fn ambiguous_read_is_not_unique() {
        let model = ScoringModel::default_model().unwrap();
        let cfg = MatchConfig {
            enforce_unique: 0.9,
            ..config()
        };
        let segment = Segment::from_reads("s", vec![read("t1", b"ACDEFGHIK"), read("t2", b"ACDEFGHIK")], &cfg);
        let summary = segment.match_reads(&[read("r", b"CDEFG")], &model, &cfg).unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.unique, 0);
    }

    #[test]
    fn cutoff_scales_with_read_length() {
        let model = ScoringModel::default_model().unwrap();
        let cfg = MatchConfig {
            cutoff: 100.0,
            ..config()
        };
        let segment = Segment::from_reads("s", vec![read("t", b"ACDEFGHIK")], &cfg);
        let summary = segment.match_reads(&[read("r", b"CDEFG")], &model, &cfg).unwrap();
        assert_eq!(summary.accepted, 0);
        assert_eq!(segment.templates()[0].match_count(), 0);
    }

    #[test]
    fn mass_spec_fix_runs_during_matching() {
        let model = ScoringModel::default_model().unwrap();
        let cfg = MatchConfig {
            fix_mass_spec_errors: true,
            alignment: AlignmentType::ReadAlign,
            ..config()
        };
        let segment = Segment::from_reads("s", vec![read("t", b"SSAFGGEWKK")], &cfg);
        let summary = segment.match_reads(&[read("r", b"AFNEWK")], &model, &cfg).unwrap();
        assert_eq!(summary.accepted, 1);
        assert!(summary.corrections >= 1);
        let finalized = segment.finalize();
        let m = &finalized[0].matches()[0];
        assert_eq!(m.query_sequence(), b"AFGGEWK");
        assert!(m.local_sequence().is_modified());
    }

    #[test]
    fn enforce_unique_filter() {
        let t = read("t", b"ACDEF");
        let q = read("q", b"ACDEF");
        let mk = |score| (0, SequenceMatch::from_parts(0, 0, score, vec![], Arc::clone(&t), Arc::clone(&q)));
        let mut v = vec![mk(10), mk(40), mk(37), mk(0)];
        assert_eq!(enforce_unique(&mut v, 0.9), 2);
        assert_eq!(v.iter().map(|(_, m)| m.score).collect::<Vec<_>>(), vec![40, 37]);
    }
}
