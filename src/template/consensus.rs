use std::collections::BTreeMap;

use serde::Serialize;

use crate::matching::{MatchPiece, SequenceMatch};
use crate::util::alphabet::GAP_CHAR;

/// 某一列之后的插入内容；`None` 表示该读段在此处没有插入
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Insert {
    None,
    Residues(Vec<u8>),
}

impl Insert {
    pub fn residues(&self) -> &[u8] {
        match self {
            Insert::None => &[],
            Insert::Residues(r) => r,
        }
    }
}

/// 一条匹配在某个模板列上放置的残基，删除以 `.` 表示
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlignedResidue {
    pub match_index: usize,
    pub residue: u8,
    /// 删除列为 None
    pub query_position: Option<usize>,
    pub confidence: f64,
}

/// 一条匹配在某列之后的插入投票
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlignedInsertion {
    pub match_index: usize,
    pub insert: Insert,
    pub coverage: Vec<f64>,
    /// 匹配两端的悬挂部分为 false，不参与投票
    pub in_sequence: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AlignedPosition {
    pub residues: Vec<AlignedResidue>,
    pub insertions: Vec<AlignedInsertion>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InsertionVote {
    pub count: usize,
    pub coverage: Vec<f64>,
}

/// 单个模板位置上的加权残基分布与插入分布
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedPosition {
    pub template: u8,
    pub residues: BTreeMap<u8, f64>,
    pub insertions: BTreeMap<Insert, InsertionVote>,
}

impl CombinedPosition {
    /// 该位置所有残基（含删除）的权重之和
    pub fn depth(&self) -> f64 {
        self.residues.values().sum()
    }
}

/// 共识序列与逐残基覆盖深度
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Consensus {
    pub sequence: Vec<u8>,
    pub coverage: Vec<f64>,
}

impl Consensus {
    pub fn sequence_str(&self) -> String {
        String::from_utf8_lossy(&self.sequence).into_owned()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// 把每条匹配展开到模板列上。
///
/// 每条匹配在它覆盖的每一列上放一个残基（或删除标记），并在每列之后放一个插入投票。
/// `matches` 的顺序即优先级，调用方负责排序。
pub fn aligned_sequences(template: &[u8], matches: &[SequenceMatch]) -> Vec<AlignedPosition> {
    let mut out = vec![AlignedPosition::default(); template.len()];
    if template.is_empty() {
        return out;
    }
    let last_column = template.len() - 1;

    for (mi, m) in matches.iter().enumerate() {
        let seq = m.query_sequence();
        let conf = m.query_confidence();
        let pieces = m.pieces();
        let last_piece = pieces.len().saturating_sub(1);
        let mut tp = m.start_template;
        let mut q = m.start_query;

        for (pi, piece) in pieces.iter().enumerate() {
            match *piece {
                MatchPiece::Match(n) => {
                    for i in 0..n {
                        if tp > last_column || q >= seq.len() {
                            break;
                        }
                        out[tp].residues.push(AlignedResidue {
                            match_index: mi,
                            residue: seq[q],
                            query_position: Some(q),
                            confidence: conf[q],
                        });
                        // the last column of a match cannot vote on what follows it
                        out[tp].insertions.push(AlignedInsertion {
                            match_index: mi,
                            insert: Insert::None,
                            coverage: Vec::new(),
                            in_sequence: pi < last_piece || i + 1 < n,
                        });
                        tp += 1;
                        q += 1;
                    }
                }
                MatchPiece::Deletion(n) => {
                    let confidence = conf.get(q).or(conf.last()).copied().unwrap_or(1.0);
                    for _ in 0..n {
                        if tp > last_column {
                            break;
                        }
                        out[tp].residues.push(AlignedResidue {
                            match_index: mi,
                            residue: GAP_CHAR,
                            query_position: None,
                            confidence,
                        });
                        out[tp].insertions.push(AlignedInsertion {
                            match_index: mi,
                            insert: Insert::None,
                            coverage: Vec::new(),
                            in_sequence: true,
                        });
                        tp += 1;
                    }
                }
                MatchPiece::Insertion(n) => {
                    let from = q.min(seq.len());
                    let end = (q + n).min(seq.len());
                    let vote = AlignedInsertion {
                        match_index: mi,
                        insert: Insert::Residues(seq[from..end].to_vec()),
                        coverage: conf[from..end].to_vec(),
                        in_sequence: pi > 0 && pi < last_piece,
                    };
                    q = end;
                    // replaces the "no insertion" vote of the column before
                    let at = tp.saturating_sub(1).min(last_column);
                    let previous = if tp > m.start_template {
                        out[at].insertions.iter().rposition(|v| v.match_index == mi)
                    } else {
                        None
                    };
                    match previous {
                        Some(idx) => out[at].insertions[idx] = vote,
                        None => out[at].insertions.push(vote),
                    }
                }
            }
        }
    }
    out
}

/// 把逐匹配的放置结果归并为每列的加权分布，悬挂插入不计入
pub fn combined_sequence(template: &[u8], aligned: &[AlignedPosition]) -> Vec<CombinedPosition> {
    template
        .iter()
        .zip(aligned)
        .map(|(&t, position)| {
            let mut residues: BTreeMap<u8, f64> = BTreeMap::new();
            for r in &position.residues {
                *residues.entry(r.residue).or_insert(0.0) += r.confidence;
            }
            let mut insertions: BTreeMap<Insert, InsertionVote> = BTreeMap::new();
            for ins in position.insertions.iter().filter(|i| i.in_sequence) {
                let vote = insertions.entry(ins.insert.clone()).or_default();
                vote.count += 1;
                if vote.coverage.len() < ins.coverage.len() {
                    vote.coverage.resize(ins.coverage.len(), 0.0);
                }
                for (acc, c) in vote.coverage.iter_mut().zip(&ins.coverage) {
                    *acc += c;
                }
            }
            CombinedPosition {
                template: t,
                residues,
                insertions,
            }
        })
        .collect()
}

/// 逐列选出权重最大的残基，再选出票数最多的插入。
///
/// 平局时：模板残基在最大集合中则保留模板残基；开启 `force_germline_isoleucine`
/// 且最大集合只有 L、模板为 I 时保留 I；否则取最大集合中按残基字节序的第一个非间隙残基。
/// 最大集合只有间隙时该列不输出；没有任何覆盖的列回退到模板残基。
pub fn consensus(combined: &[CombinedPosition], force_germline_isoleucine: bool) -> Consensus {
    let mut out = Consensus::default();
    let mut options: Vec<u8> = Vec::new();

    for position in combined {
        options.clear();
        let mut max = 0.0;
        for (&residue, &weight) in &position.residues {
            if weight > max {
                options.clear();
                options.push(residue);
                max = weight;
            } else if weight == max && max > 0.0 {
                options.push(residue);
            }
        }
        let depth = position.depth();

        let chosen = if options.is_empty() {
            Some(position.template)
        } else if options == [GAP_CHAR] {
            None
        } else if options.contains(&position.template) {
            Some(position.template)
        } else if force_germline_isoleucine && options == [b'L'] && position.template == b'I' {
            Some(position.template)
        } else {
            options.iter().copied().find(|&r| r != GAP_CHAR)
        };
        if let Some(residue) = chosen {
            out.sequence.push(residue);
            out.coverage.push(depth);
        }

        let mut best: Option<(&Insert, &InsertionVote)> = None;
        for (insert, vote) in &position.insertions {
            if vote.count > best.map_or(0, |(_, b)| b.count) {
                best = Some((insert, vote));
            }
        }
        if let Some((Insert::Residues(residues), vote)) = best {
            out.sequence.extend_from_slice(residues);
            out.coverage.extend_from_slice(&vote.coverage);
        }
    }
    out
}
