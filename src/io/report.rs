//! JSON 运行报告

use std::io::Write;

use serde::Serialize;

use crate::align::scoring::ScoringModel;
use crate::config::RunConfig;
use crate::error::Result;
use crate::matching::{SequenceEdit, SequenceMatch};
use crate::template::{FinalizedTemplate, MatchSummary};

#[derive(Debug, Serialize)]
pub struct MatchReport {
    pub query: String,
    pub start_template: usize,
    pub start_query: usize,
    pub score: i32,
    pub cigar: String,
    pub unique: bool,
    pub edits: Vec<SequenceEdit>,
}

impl From<&SequenceMatch> for MatchReport {
    fn from(m: &SequenceMatch) -> Self {
        Self {
            query: m.query.id.clone(),
            start_template: m.start_template,
            start_query: m.start_query,
            score: m.score,
            cigar: m.cigar(),
            unique: m.unique,
            edits: m.local_sequence().edits().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateReport {
    pub segment: String,
    pub id: String,
    pub index: usize,
    pub score: i64,
    pub unique_score: i64,
    pub total_area: f64,
    pub unique_area: f64,
    pub unique_matches: usize,
    pub consensus: String,
    pub coverage: Vec<f64>,
    pub covered_fraction: f64,
    /// 共识序列与模板全局比对的一致性百分比
    pub identity_to_template: f64,
    pub matches: Vec<MatchReport>,
}

impl TemplateReport {
    pub fn new(template: &FinalizedTemplate, model: &ScoringModel) -> Result<Self> {
        let consensus = template.consensus_sequence();
        let alignment = template.align_consensus_with_template(model)?;
        Ok(Self {
            segment: template.name.clone(),
            id: template.read().id.clone(),
            index: template.index,
            score: template.score,
            unique_score: template.unique_score,
            total_area: template.total_area,
            unique_area: template.unique_area,
            unique_matches: template.unique_matches,
            consensus: consensus.sequence_str(),
            coverage: consensus.coverage.clone(),
            covered_fraction: template.coverage_fraction(),
            identity_to_template: alignment.percent_identity(),
            matches: template.matches().iter().map(MatchReport::from).collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub created: String,
    pub config: &'a RunConfig,
    pub summary: MatchSummary,
    pub templates: Vec<TemplateReport>,
}

impl<'a> RunReport<'a> {
    pub fn new(
        config: &'a RunConfig,
        summary: MatchSummary,
        templates: &[FinalizedTemplate],
        model: &ScoringModel,
    ) -> Result<Self> {
        Ok(Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            created: chrono::Utc::now().to_rfc3339(),
            config,
            summary,
            templates: templates
                .iter()
                .map(|t| TemplateReport::new(t, model))
                .collect::<Result<_>>()?,
        })
    }

    pub fn write<W: Write>(&self, out: W) -> Result<()> {
        serde_json::to_writer_pretty(out, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchPiece;
    use crate::read::Read;
    use crate::template::Template;
    use crate::util::alphabet::Alphabet;
    use std::sync::Arc;

    #[test]
    fn report_serialises_templates() {
        let alp = Alphabet::default();
        let model = ScoringModel::default_model().unwrap();
        let t = Template::new("seg", 0, Arc::new(Read::new("t1", b"ACDEFGH", &alp).unwrap()), 0.0, true);
        let q = Arc::new(Read::new("q1", b"CDEF", &alp).unwrap());
        let m = SequenceMatch::from_parts(1, 0, 32, vec![MatchPiece::Match(4)], Arc::clone(t.read()), q);
        assert!(t.add_match(m, true));
        let finalized = vec![t.finalize()];

        let config = RunConfig::default();
        let summary = MatchSummary {
            reads: 1,
            candidates: 1,
            accepted: 1,
            unique: 1,
            corrections: 0,
        };
        let report = RunReport::new(&config, summary, &finalized, &model).unwrap();
        let mut out = Vec::new();
        report.write(&mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["tool"], "pepstitch");
        assert_eq!(value["templates"][0]["consensus"], "ACDEFGH");
        assert_eq!(value["templates"][0]["matches"][0]["cigar"], "4M");
        assert_eq!(value["templates"][0]["unique_matches"], 1);
        assert_eq!(value["templates"][0]["identity_to_template"], 100.0);
        assert!(value["created"].as_str().unwrap().contains('T'));
    }
}
