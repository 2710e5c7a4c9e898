//! 运行配置：打分模型参数与模板匹配策略，可从 JSON 文件加载

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::align::dp::AlignmentType;
use crate::align::scoring::{AsymmetricRule, ScoringModel, SymmetricRule};
use crate::error::Result;
use crate::util::alphabet::{Alphabet, DEFAULT_SYMBOLS};

/// 单残基表的来源
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatrixKind {
    /// identity / mismatch 生成
    #[default]
    Identity,
    /// 内置 BLOSUM62，忽略其余打分字段
    Blosum62,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub matrix: MatrixKind,
    pub alphabet: String,
    pub identity: i8,
    pub mismatch: i8,
    pub gap_start: i8,
    pub gap_extend: i8,
    pub swap: i8,
    pub window: usize,
    pub isomass: Vec<SymmetricRule>,
    pub modifications: Vec<AsymmetricRule>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            matrix: MatrixKind::Identity,
            alphabet: String::from_utf8_lossy(DEFAULT_SYMBOLS).into_owned(),
            identity: 8,
            mismatch: -1,
            gap_start: -5,
            gap_extend: -5,
            swap: 2,
            window: 3,
            isomass: vec![SymmetricRule {
                score: 5,
                groups: vec![
                    vec!["I".into(), "L".into()],
                    vec!["GG".into(), "N".into()],
                    vec!["EV".into(), "DL".into(), "DI".into()],
                ],
            }],
            modifications: vec![AsymmetricRule {
                score: 3,
                from: vec!["Q".into()],
                to: vec!["E".into()],
            }],
        }
    }
}

impl ScoringConfig {
    pub fn build(&self) -> Result<ScoringModel> {
        match self.matrix {
            MatrixKind::Blosum62 => ScoringModel::blosum62(),
            MatrixKind::Identity => ScoringModel::build(
                Alphabet::new(self.alphabet.as_bytes())?,
                &self.isomass,
                &self.modifications,
                self.identity,
                self.mismatch,
                self.gap_start,
                self.gap_extend,
                self.swap,
                self.window,
            ),
        }
    }
}

/// 读段分配到模板的策略
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// 接受阈值为 `cutoff × sqrt(读段长度)`
    pub cutoff: f64,
    /// 只保留得分不低于 `enforce_unique × 最高分` 的匹配；0 表示关闭
    pub enforce_unique: f64,
    pub force_germline_isoleucine: bool,
    pub fix_mass_spec_errors: bool,
    pub alignment: AlignmentType,
    /// 0 表示使用 rayon 的默认线程数
    pub threads: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            cutoff: 10.0,
            enforce_unique: 0.0,
            force_germline_isoleucine: true,
            fix_mass_spec_errors: false,
            alignment: AlignmentType::ReadAlign,
            threads: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub scoring: ScoringConfig,
    pub matching: MatchConfig,
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scoring_matches_default_model() {
        let built = ScoringConfig::default().build().unwrap();
        let reference = ScoringModel::default_model().unwrap();
        let pairs: [(&[u8], &[u8]); 5] = [(b"A", b"A"), (b"GG", b"N"), (b"Q", b"E"), (b"E", b"Q"), (b"I", b"L")];
        for (a, b) in pairs {
            assert_eq!(built.score(a, b).unwrap(), reference.score(a, b).unwrap());
        }
        assert_eq!(built.size(), 3);
        assert_eq!(built.gap_start(), -5);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = RunConfig::from_json(r#"{"matching": {"cutoff": 4.5, "alignment": "local"}}"#).unwrap();
        assert_eq!(cfg.matching.cutoff, 4.5);
        assert_eq!(cfg.matching.alignment, AlignmentType::Local);
        assert!(cfg.matching.force_germline_isoleucine);
        assert_eq!(cfg.scoring, ScoringConfig::default());
    }

    #[test]
    fn blosum_preset() {
        let cfg = RunConfig::from_json(r#"{"scoring": {"matrix": "blosum62"}}"#).unwrap();
        let model = cfg.scoring.build().unwrap();
        assert_eq!(model.score(b"W", b"W").unwrap(), 11);
        assert_eq!(model.size(), 1);
    }

    #[test]
    fn invalid_window_is_rejected() {
        let cfg = ScoringConfig {
            window: 0,
            ..ScoringConfig::default()
        };
        assert!(cfg.build().is_err());
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(RunConfig::from_json("{"), Err(crate::error::Error::Config(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            RunConfig::load("/nonexistent/pepstitch.json"),
            Err(crate::error::Error::Io(_))
        ));
    }
}
