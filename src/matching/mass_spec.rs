//! 常见质谱错误：等质量残基组合、脱酰胺修饰以及 I/L 同分异构。

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::error::Result;
use crate::matching::piece::MatchPiece;
use crate::matching::sequence_match::SequenceMatch;
use crate::util::aa_set::AminoAcidSet;
use crate::util::alphabet::Alphabet;

/// 纠错时考虑的最大窗口长度
pub const MAX_LENGTH: usize = 2;

/// 判定质量相等的容差（Da）
pub const MASS_TOLERANCE: f64 = 0.005;

/// 单同位素残基质量
const MONOISOTOPIC: [(u8, f64); 20] = [
    (b'G', 57.02146),
    (b'A', 71.03711),
    (b'S', 87.03203),
    (b'P', 97.05276),
    (b'V', 99.06841),
    (b'T', 101.04768),
    (b'C', 103.00919),
    (b'L', 113.08406),
    (b'I', 113.08406),
    (b'N', 114.04293),
    (b'D', 115.02694),
    (b'Q', 128.05858),
    (b'K', 128.09496),
    (b'E', 129.04259),
    (b'M', 131.04049),
    (b'H', 137.05891),
    (b'F', 147.06841),
    (b'R', 156.10111),
    (b'Y', 163.06333),
    (b'W', 186.07931),
];

/// 模板残基 → 观测到的查询残基
const MODIFICATIONS: [(u8, u8, &str); 2] = [(b'N', b'D', "deamidation"), (b'Q', b'E', "deamidation")];

pub fn monoisotopic_mass(residue: u8) -> Option<f64> {
    MONOISOTOPIC
        .iter()
        .find(|(r, _)| *r == residue.to_ascii_uppercase())
        .map(|&(_, m)| m)
}

/// 预先计算的等质量组合表
#[derive(Clone, Debug)]
pub struct MassSpecTable {
    alphabet: Alphabet,
    group_of: HashMap<AminoAcidSet, usize>,
    groups: Vec<Vec<Vec<u8>>>,
}

impl MassSpecTable {
    /// 枚举长度不超过 [`MAX_LENGTH`] 的残基多重集，按质量排序后把相邻差值在容差内的归为一组
    pub fn new(alphabet: &Alphabet) -> Result<Self> {
        let residues: Vec<(u8, f64)> = alphabet
            .symbols()
            .iter()
            .filter_map(|&s| monoisotopic_mass(s).map(|m| (s, m)))
            .collect();

        let mut multisets: Vec<(Vec<u8>, f64)> = Vec::new();
        let mut stack: Vec<(Vec<u8>, f64, usize)> = vec![(Vec::new(), 0.0, 0)];
        while let Some((run, mass, from)) = stack.pop() {
            if !run.is_empty() {
                multisets.push((run.clone(), mass));
            }
            if run.len() == MAX_LENGTH {
                continue;
            }
            for (i, &(r, m)) in residues.iter().enumerate().skip(from) {
                let mut next = run.clone();
                next.push(r);
                stack.push((next, mass + m, i));
            }
        }
        multisets.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut groups: Vec<Vec<Vec<u8>>> = Vec::new();
        let mut current: Vec<Vec<u8>> = Vec::new();
        let mut last_mass = f64::NEG_INFINITY;
        for (run, mass) in multisets {
            if mass - last_mass > MASS_TOLERANCE && !current.is_empty() {
                if current.len() > 1 {
                    groups.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            current.push(run);
            last_mass = mass;
        }
        if current.len() > 1 {
            groups.push(current);
        }

        let mut group_of = HashMap::new();
        for (id, group) in groups.iter().enumerate() {
            for run in group {
                group_of.insert(AminoAcidSet::sorted(alphabet, run)?, id);
            }
        }
        Ok(Self {
            alphabet: alphabet.clone(),
            group_of,
            groups,
        })
    }

    /// 所有包含多个成员的等质量组
    pub fn groups(&self) -> &[Vec<Vec<u8>>] {
        &self.groups
    }

    /// 两个窗口是否组成不同但等质量的残基多重集
    pub fn equal_mass(&self, a: &[u8], b: &[u8]) -> bool {
        let (Ok(x), Ok(y)) = (
            AminoAcidSet::sorted(&self.alphabet, a),
            AminoAcidSet::sorted(&self.alphabet, b),
        ) else {
            return false;
        };
        x != y && matches!((self.group_of.get(&x), self.group_of.get(&y)), (Some(g), Some(h)) if g == h)
    }

    /// 判断观测窗口 `query` 能否解释为模板窗口 `template` 的质谱错误，返回修正原因
    pub fn classify(&self, template: &[u8], query: &[u8]) -> Option<String> {
        if template == query {
            return None;
        }
        let t = String::from_utf8_lossy(template);
        let q = String::from_utf8_lossy(query);

        let only_il = template.len() == query.len()
            && template.iter().zip(query).all(|(&a, &b)| {
                a == b || matches!((a, b), (b'I', b'L') | (b'L', b'I'))
            });
        if only_il {
            return Some(format!("isobaric I/L: {} -> {}", q, t));
        }

        let same_composition = matches!(
            (AminoAcidSet::sorted(&self.alphabet, template), AminoAcidSet::sorted(&self.alphabet, query)),
            (Ok(x), Ok(y)) if x == y
        );
        if same_composition {
            return Some(format!("swap: {} -> {}", q, t));
        }

        // IS / SL: a swap once I and L are read as one residue
        if template.len() == query.len() && folded_composition(template) == folded_composition(query) {
            return Some(format!("swap with I/L: {} -> {}", q, t));
        }

        if let [tr] = template {
            if let [qr] = query {
                if let Some((_, _, name)) = MODIFICATIONS.iter().find(|(from, to, _)| from == tr && to == qr) {
                    return Some(format!("{}: {} -> {}", name, q, t));
                }
            }
        }

        if self.equal_mass(template, query) {
            return Some(format!("equal mass: {} -> {}", q, t));
        }
        None
    }
}

/// I 记作 L 后的有序残基
fn folded_composition(window: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = window.iter().map(|&r| if r == b'I' { b'L' } else { r }).collect();
    out.sort_unstable();
    out
}

/// 依次扫描 Match 区段内的错配列，命中时把查询窗口改写为模板窗口，
/// 并在窗口长度不同时改写脚本保持坐标一致。
pub(crate) fn fix_common_errors(m: &mut SequenceMatch, table: &MassSpecTable) -> Result<usize> {
    let mut fixed = 0usize;
    let mut resume = m.start_template;

    while let Some((index, k, tp, qp)) = next_mismatch(m, resume) {
        let end_t = m.end_template();
        let end_q = m.end_query();
        let mut hit = None;
        'search: for tl in 1..=MAX_LENGTH {
            for ql in 1..=MAX_LENGTH {
                if tp + tl > end_t || qp + ql > end_q {
                    continue;
                }
                let template = &m.template.sequence()[tp..tp + tl];
                let query = &m.query_sequence()[qp..qp + ql];
                if let Some(reason) = table.classify(template, query) {
                    hit = Some((tl, ql, template.to_vec(), reason));
                    break 'search;
                }
            }
        }

        match hit {
            Some((tl, ql, replacement, reason)) => {
                debug!("{} on {} at {}: {}", m.query.id, m.template.id, tp, reason);
                m.update_sequence(qp, ql, &replacement, reason)?;
                let pieces = splice(m.pieces(), index, k, tl, ql);
                m.replace_pieces(pieces);
                fixed += 1;
                resume = tp + tl;
            }
            None => resume = tp + 1,
        }
    }
    Ok(fixed)
}

/// 在模板位置 `>= resume` 处找到第一个 Match 内的错配列：(piece 下标, 列在 piece 内偏移, 模板位置, 查询位置)
fn next_mismatch(m: &SequenceMatch, resume: usize) -> Option<(usize, usize, usize, usize)> {
    let template = m.template.sequence();
    let query = m.query_sequence();
    let mut tp = m.start_template;
    let mut qp = m.start_query;
    for (index, p) in m.pieces().iter().enumerate() {
        if let MatchPiece::Match(n) = *p {
            for k in 0..n {
                if tp + k >= resume && template.get(tp + k) != query.get(qp + k) {
                    return Some((index, k, tp + k, qp + k));
                }
            }
        }
        tp += p.template_len();
        qp += p.query_len();
    }
    None
}

/// 用 `Match(tl)` 替换从 `pieces[index]` 的第 `k` 列开始、覆盖模板 `tl` 与查询 `ql` 个残基的区域
fn splice(pieces: &[MatchPiece], index: usize, k: usize, tl: usize, ql: usize) -> Vec<MatchPiece> {
    let mut out: Vec<MatchPiece> = pieces[..index].to_vec();
    out.push(MatchPiece::Match(k));

    let mut rest: VecDeque<MatchPiece> = pieces[index..].iter().copied().collect();
    if let Some(first) = rest.front_mut() {
        *first = MatchPiece::Match(first.len() - k);
    }

    let (mut ct, mut cq) = (0usize, 0usize);
    while ct < tl || cq < ql {
        let Some(p) = rest.pop_front() else {
            break;
        };
        let take = match p {
            MatchPiece::Match(n) => n.min(tl.saturating_sub(ct).max(ql.saturating_sub(cq))),
            MatchPiece::Insertion(n) if cq < ql => n.min(ql - cq),
            MatchPiece::Deletion(n) if ct < tl => n.min(tl - ct),
            other => other.len(),
        };
        ct += p.template_len().min(take);
        cq += p.query_len().min(take);
        if p.len() > take {
            rest.push_front(p.with_len(p.len() - take));
        }
    }

    let st = ct.saturating_sub(tl);
    let sq = cq.saturating_sub(ql);
    let both = st.min(sq);
    out.push(MatchPiece::Match(tl + both));
    out.push(MatchPiece::Deletion(st - both));
    out.push(MatchPiece::Insertion(sq - both));
    out.extend(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::Read;
    use std::sync::Arc;
    use MatchPiece::*;

    fn table() -> MassSpecTable {
        MassSpecTable::new(&Alphabet::default()).unwrap()
    }

    fn read(id: &str, seq: &[u8]) -> Arc<Read> {
        Arc::new(Read::new(id, seq, &Alphabet::default()).unwrap())
    }

    fn contains(groups: &[Vec<Vec<u8>>], members: &[&[u8]]) -> bool {
        groups
            .iter()
            .any(|g| members.iter().all(|m| g.iter().any(|r| r.as_slice() == *m)))
    }

    #[test]
    fn equal_mass_groups() {
        let t = table();
        let g = t.groups();
        assert!(contains(g, &[b"I", b"L"]));
        assert!(contains(g, &[b"GG", b"N"]));
        assert!(contains(g, &[b"AG", b"Q"]));
        assert!(contains(g, &[b"AD", b"EG"]));
        assert!(contains(g, &[b"EV", b"DL", b"DI"]));
        assert!(!contains(g, &[b"K", b"Q"]));
        assert!(t.equal_mass(b"GG", b"N"));
        assert!(t.equal_mass(b"VE", b"LD"));
        assert!(!t.equal_mass(b"GG", b"GG"));
    }

    #[test]
    fn classify_rules() {
        let t = table();
        assert!(t.classify(b"I", b"L").unwrap().starts_with("isobaric"));
        assert!(t.classify(b"IL", b"LI").unwrap().starts_with("isobaric"));
        assert!(t.classify(b"FG", b"GF").unwrap().starts_with("swap"));
        assert!(t.classify(b"N", b"D").unwrap().starts_with("deamidation"));
        assert!(t.classify(b"D", b"N").is_none());
        assert!(t.classify(b"N", b"GG").unwrap().starts_with("equal mass"));
        assert!(t.classify(b"A", b"W").is_none());
        assert!(t.classify(b"A", b"A").is_none());
    }

    #[test]
    fn swap_across_isoleucine_and_leucine() {
        let t = table();
        assert_eq!(t.classify(b"IS", b"SL").as_deref(), Some("swap with I/L: SL -> IS"));
        assert_eq!(t.classify(b"LS", b"SI").as_deref(), Some("swap with I/L: SI -> LS"));
        assert!(t.classify(b"IS", b"SI").unwrap().starts_with("swap:"));
        // different residues besides I/L are still not a swap
        assert!(!t.classify(b"IS", b"TL").is_some_and(|r| r.starts_with("swap")));
    }

    #[test]
    fn fix_swap_across_isoleucine_and_leucine() {
        let template = read("t", b"KISW");
        let query = read("q", b"KSLW");
        let mut m = SequenceMatch::from_parts(0, 0, 30, vec![Match(4)], template, query);
        assert_eq!(m.fix_mass_spec_errors(&table()).unwrap(), 1);
        assert_eq!(m.query_sequence(), b"KISW");
        assert!(m.local_sequence().edits()[0].reason.starts_with("swap with I/L"));
    }

    #[test]
    fn length_changing_fix_keeps_views_consistent() {
        let template = read("t", b"AFNWK");
        let query = read("q", b"AFGGWK");
        let mut m = SequenceMatch::from_parts(0, 0, 30, vec![Match(3), Insertion(1), Match(2)], template, query);
        m.fix_mass_spec_errors(&table()).unwrap();
        assert_eq!(m.end_query(), m.query_sequence().len());
        assert!(!m.is_masked());
        let shown = m.to_string();
        assert!(shown.ends_with("AFNWK\nAFNWK"));
    }

    #[test]
    fn fix_isomass_insertion() {
        // template N aligned against query GG as 1M + 1I
        let template = read("t", b"AFNWK");
        let query = read("q", b"AFGGWK");
        let mut m = SequenceMatch::from_parts(0, 0, 30, vec![Match(3), Insertion(1), Match(2)], template, query);
        let fixed = m.fix_mass_spec_errors(&table()).unwrap();
        assert_eq!(fixed, 1);
        assert_eq!(m.query_sequence(), b"AFNWK");
        assert_eq!(m.pieces(), &[Match(5)]);
        assert_eq!(m.local_sequence().edits().len(), 1);
        assert_eq!(m.local_sequence().original(), b"AFGGWK");
        assert_eq!(m.detailed_scores().mismatches, 0);
    }

    #[test]
    fn fix_two_for_two_window() {
        let template = read("t", b"KDLVQ");
        let query = read("q", b"KEVVQ");
        let mut m = SequenceMatch::from_parts(0, 0, 30, vec![Match(5)], template, query);
        assert_eq!(m.fix_mass_spec_errors(&table()).unwrap(), 1);
        assert_eq!(m.query_sequence(), b"KDLVQ");
        assert_eq!(m.pieces(), &[Match(5)]);
    }

    #[test]
    fn fix_single_residue_rules() {
        let template = read("t", b"ANQIK");
        let query = read("q", b"ADELK");
        let mut m = SequenceMatch::from_parts(0, 0, 30, vec![Match(5)], template, query);
        assert_eq!(m.fix_mass_spec_errors(&table()).unwrap(), 3);
        assert_eq!(m.query_sequence(), b"ANQIK");
        let reasons: Vec<&str> = m.local_sequence().edits().iter().map(|e| e.reason.as_str()).collect();
        assert!(reasons[0].starts_with("deamidation"));
        assert!(reasons[2].starts_with("isobaric"));
    }

    #[test]
    fn unexplained_mismatch_is_kept() {
        let template = read("t", b"ACDEF");
        let query = read("q", b"ACWEF");
        let mut m = SequenceMatch::from_parts(0, 0, 30, vec![Match(5)], template, query);
        assert_eq!(m.fix_mass_spec_errors(&table()).unwrap(), 0);
        assert_eq!(m.query_sequence(), b"ACWEF");
        assert!(!m.local_sequence().is_modified());
    }

    #[test]
    fn splice_keeps_offsets_for_shorter_query() {
        // template GG replaced over query N: 1M + 1D
        let pieces = splice(&[Match(2), Deletion(1), Match(2)], 0, 1, 2, 1);
        let mut pieces = pieces;
        crate::matching::piece::simplify(&mut pieces);
        assert_eq!(pieces, vec![Match(4)]);
    }
}
