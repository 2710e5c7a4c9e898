use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::align::overlap;
use crate::align::scoring::ScoringModel;
use crate::error::{Error, Result};
use crate::util::alphabet::GAP_CHAR;

/// 比对模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentType {
    /// 两条序列都必须完整消耗
    Global,
    /// B 必须完整消耗，A 两端可自由悬挂
    GlobalForB,
    Local,
    /// A 的末端与 B 的起始重叠
    EndAlignment,
    /// 较短的一条完整比对到较长的一条上
    ReadAlign,
}

impl fmt::Display for AlignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlignmentType::Global => "global",
            AlignmentType::GlobalForB => "global-for-b",
            AlignmentType::Local => "local",
            AlignmentType::EndAlignment => "end-alignment",
            AlignmentType::ReadAlign => "read-align",
        };
        f.write_str(s)
    }
}

impl FromStr for AlignmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "global" => Ok(AlignmentType::Global),
            "global-for-b" | "globalforb" => Ok(AlignmentType::GlobalForB),
            "local" => Ok(AlignmentType::Local),
            "end-alignment" | "endalignment" | "end" => Ok(AlignmentType::EndAlignment),
            "read-align" | "readalign" | "read" => Ok(AlignmentType::ReadAlign),
            other => Err(Error::InvalidParams(format!("unknown alignment type '{}'", other))),
        }
    }
}

/// DP 单元：累计得分、本步得分以及两侧消耗的残基数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlignmentPiece {
    pub score: i32,
    pub local_score: i8,
    pub step_a: u8,
    pub step_b: u8,
}

impl AlignmentPiece {
    /// `M` / `I` / `D` / `S[a,b]`，原点为 `*`
    pub fn short_path(&self) -> String {
        match (self.step_a, self.step_b) {
            (0, 0) => "*".to_string(),
            (0, 1) => "I".to_string(),
            (1, 0) => "D".to_string(),
            (1, 1) => "M".to_string(),
            (a, b) => format!("S[{},{}]", a, b),
        }
    }
}

/// 比对结果，构造后不可变
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alignment {
    pub score: i32,
    pub path: Vec<AlignmentPiece>,
    pub start_a: usize,
    pub start_b: usize,
    pub len_a: usize,
    pub len_b: usize,
    pub identical: usize,
    pub mismatches: usize,
    pub similar: usize,
    pub gap_in_a: usize,
    pub gap_in_b: usize,
    pub mode: AlignmentType,
}

impl Alignment {
    pub fn empty(mode: AlignmentType) -> Self {
        Self {
            score: 0,
            path: Vec::new(),
            start_a: 0,
            start_b: 0,
            len_a: 0,
            len_b: 0,
            identical: 0,
            mismatches: 0,
            similar: 0,
            gap_in_a: 0,
            gap_in_b: 0,
            mode,
        }
    }

    pub fn short_path(&self) -> String {
        self.path.iter().map(AlignmentPiece::short_path).collect()
    }

    /// 游程压缩的路径，例如 `2M1I2M`
    pub fn very_short_path(&self) -> String {
        let mut out = String::new();
        let mut iter = self.path.iter().map(AlignmentPiece::short_path);
        let Some(mut cur) = iter.next() else {
            return out;
        };
        let mut len = 1usize;
        for op in iter {
            if op == cur {
                len += 1;
            } else {
                let _ = write!(&mut out, "{}{}", len, cur);
                cur = op;
                len = 1;
            }
        }
        let _ = write!(&mut out, "{}{}", len, cur);
        out
    }

    /// 相同残基占 A 侧比对长度的比例
    pub fn percent_identity(&self) -> f64 {
        if self.len_a == 0 {
            return 0.0;
        }
        self.identical as f64 / self.len_a as f64 * 100.0
    }

    /// 两行对齐视图，间隙用 `-` 表示，窗口长度不等时短的一侧用 `·` 左补齐
    pub fn aligned(&self, a: &[u8], b: &[u8]) -> (String, String) {
        let mut line_a = String::new();
        let mut line_b = String::new();
        let mut pa = self.start_a;
        let mut pb = self.start_b;
        for piece in &self.path {
            let width = piece.step_a.max(piece.step_b) as usize;
            render_step(&mut line_a, a, pa, piece.step_a as usize, width);
            render_step(&mut line_b, b, pb, piece.step_b as usize, width);
            pa += piece.step_a as usize;
            pb += piece.step_b as usize;
        }
        (line_a, line_b)
    }

    pub fn summary(&self, a: &[u8], b: &[u8]) -> String {
        let (line_a, line_b) = self.aligned(a, b);
        format!(
            "mode: {}\nscore: {}\npath: {}\nstart: A {} B {}\nlength: A {} B {}\nidentity: {:.1}% ({} identical, {} mismatches, {} similar)\ngaps: A {} B {}\n{}\n{}",
            self.mode,
            self.score,
            self.very_short_path(),
            self.start_a,
            self.start_b,
            self.len_a,
            self.len_b,
            self.percent_identity(),
            self.identical,
            self.mismatches,
            self.similar,
            self.gap_in_a,
            self.gap_in_b,
            line_a,
            line_b
        )
    }

    /// 交换 A/B 两侧的角色
    pub(crate) fn mirrored(mut self) -> Self {
        for p in &mut self.path {
            std::mem::swap(&mut p.step_a, &mut p.step_b);
        }
        std::mem::swap(&mut self.start_a, &mut self.start_b);
        std::mem::swap(&mut self.len_a, &mut self.len_b);
        std::mem::swap(&mut self.gap_in_a, &mut self.gap_in_b);
        self
    }
}

fn render_step(out: &mut String, seq: &[u8], pos: usize, step: usize, width: usize) {
    if step == 0 {
        out.extend(std::iter::repeat('-').take(width));
        return;
    }
    out.extend(std::iter::repeat('·').take(width - step));
    out.extend(seq[pos..pos + step].iter().map(|&c| c as char));
}

/// DP 工作缓冲区，可跨调用复用
#[derive(Debug, Default)]
pub struct DpBuffer {
    cells: Vec<AlignmentPiece>,
    codes_a: Vec<u64>,
    codes_b: Vec<u64>,
}

impl DpBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(&mut self, a: &[u8], b: &[u8], model: &ScoringModel) {
        let size = (a.len() + 1) * (b.len() + 1);
        self.cells.clear();
        self.cells.resize(size, AlignmentPiece::default());
        window_codes(a, model.base(), model.size(), &mut self.codes_a);
        window_codes(b, model.base(), model.size(), &mut self.codes_b);
    }
}

/// `codes[i * (size + 1) + len]` 为以 `i` 结尾、长度为 `len` 的窗口编码
fn window_codes(digits: &[u8], base: u64, size: usize, out: &mut Vec<u64>) {
    let stride = size + 1;
    out.clear();
    out.resize((digits.len() + 1) * stride, 0);
    for i in 1..=digits.len() {
        let mut pow = 1u64;
        for len in 1..=size.min(i) {
            out[i * stride + len] = u64::from(digits[i - len]) * pow + out[i * stride + len - 1];
            pow *= base;
        }
    }
}

/// 按给定模式比对两条残基序列
pub fn align(a: &[u8], b: &[u8], model: &ScoringModel, mode: AlignmentType) -> Result<Alignment> {
    align_with_buf(a, b, model, mode, &mut DpBuffer::new())
}

pub fn align_with_buf(
    a: &[u8],
    b: &[u8],
    model: &ScoringModel,
    mode: AlignmentType,
    buf: &mut DpBuffer,
) -> Result<Alignment> {
    let da = model.alphabet().digits(a)?;
    let db = model.alphabet().digits(b)?;
    let mut result = match mode {
        AlignmentType::Global | AlignmentType::GlobalForB | AlignmentType::Local => {
            fill(&da, &db, model, mode, buf)
        }
        AlignmentType::ReadAlign => {
            if db.len() <= da.len() {
                fill(&da, &db, model, AlignmentType::GlobalForB, buf)
            } else {
                fill(&db, &da, model, AlignmentType::GlobalForB, buf).mirrored()
            }
        }
        AlignmentType::EndAlignment => overlap::best_overlap(&da, &db, model, usize::MAX, buf).alignment,
    };
    result.mode = mode;
    Ok(result)
}

fn boundary_gap(n: usize, model: &ScoringModel, step_a: u8, step_b: u8) -> AlignmentPiece {
    let start = i32::from(model.gap_start());
    let extend = i32::from(model.gap_extend());
    AlignmentPiece {
        score: start + (n as i32 - 1) * extend,
        local_score: if n == 1 { model.gap_start() } else { model.gap_extend() },
        step_a,
        step_b,
    }
}

/// 核心填表与回溯，`mode` 只可能是 Global / GlobalForB / Local。
/// 输入为字母表数字序列。
pub(crate) fn fill(
    a: &[u8],
    b: &[u8],
    model: &ScoringModel,
    mode: AlignmentType,
    buf: &mut DpBuffer,
) -> Alignment {
    let n = a.len();
    let m = b.len();
    let cols = m + 1;
    let size = model.size();
    let stride = size + 1;
    let local = mode == AlignmentType::Local;
    let gap_digit = model.alphabet().digit(GAP_CHAR).ok();
    let (gap_start, gap_extend) = (model.gap_start(), model.gap_extend());

    buf.prepare(a, b, model);
    let DpBuffer { cells, codes_a, codes_b } = buf;

    if matches!(mode, AlignmentType::Global | AlignmentType::GlobalForB) {
        for j in 1..=m {
            cells[j] = boundary_gap(j, model, 0, 1);
        }
    }
    if mode == AlignmentType::Global {
        for i in 1..=n {
            cells[i * cols] = boundary_gap(i, model, 1, 0);
        }
    }

    let mut high = (0i32, 0usize, 0usize);
    for i in 1..=n {
        for j in 1..=m {
            let mut value = AlignmentPiece::default();
            let mut changed = false;
            for la in 0..=size.min(i) {
                for lb in 0..=size.min(j) {
                    if (la == 0 && lb != 1) || (lb == 0 && la != 1) {
                        continue;
                    }
                    let prev = cells[(i - la) * cols + (j - lb)];
                    let score = if la == 0 {
                        if (prev.step_a == 0 && prev.step_b == 1) || Some(a[i - 1]) == gap_digit {
                            gap_extend
                        } else {
                            gap_start
                        }
                    } else if lb == 0 {
                        if (prev.step_a == 1 && prev.step_b == 0) || Some(b[j - 1]) == gap_digit {
                            gap_extend
                        } else {
                            gap_start
                        }
                    } else {
                        model.score_code(codes_a[i * stride + la], codes_b[j * stride + lb])
                    };
                    if score == 0 {
                        continue;
                    }
                    let total = prev.score + i32::from(score);
                    if value.score < total || (!changed && !local) {
                        value = AlignmentPiece {
                            score: total,
                            local_score: score,
                            step_a: la as u8,
                            step_b: lb as u8,
                        };
                        changed = true;
                    }
                }
            }
            if value.score > high.0 {
                high = (value.score, i, j);
            }
            cells[i * cols + j] = value;
        }
    }

    let (score, mut i, mut j) = match mode {
        AlignmentType::Global => (cells[n * cols + m].score, n, m),
        AlignmentType::GlobalForB => {
            let mut best = (cells[m].score, 0usize);
            for r in 1..=n {
                let s = cells[r * cols + m].score;
                if s > best.0 {
                    best = (s, r);
                }
            }
            (best.0, best.1, m)
        }
        _ => high,
    };

    // backtrack
    let mut path = Vec::new();
    while i != 0 || j != 0 {
        let piece = cells[i * cols + j];
        if piece.step_a == 0 && piece.step_b == 0 {
            break;
        }
        path.push(piece);
        i -= piece.step_a as usize;
        j -= piece.step_b as usize;
    }
    path.reverse();

    let mut result = Alignment {
        score,
        start_a: i,
        start_b: j,
        ..Alignment::empty(mode)
    };
    for piece in &path {
        if piece.step_a == 1 && piece.step_b == 1 {
            if a[result.start_a + result.len_a] == b[result.start_b + result.len_b] {
                result.identical += 1;
            } else {
                result.mismatches += 1;
            }
        }
        if piece.step_a != 0 && piece.step_b != 0 {
            result.similar += 1;
        }
        if piece.step_a == 0 {
            result.gap_in_a += 1;
        }
        if piece.step_b == 0 {
            result.gap_in_b += 1;
        }
        result.len_a += piece.step_a as usize;
        result.len_b += piece.step_b as usize;
    }
    result.path = path;
    result
}
