//! 演示如何在 library 模式下使用 pepstitch 构建共识序列。
//!
//! 运行方式：
//! ```bash
//! cargo run --example consensus_demo
//! ```

use std::sync::Arc;

use pepstitch::{align, end_alignment, AlignmentType, MatchConfig, Read, ScoringModel, Segment};

fn main() -> pepstitch::Result<()> {
    // 1. 默认打分模型（窗口 3，等质量与脱酰胺规则）
    let model = ScoringModel::default_model()?;
    let alphabet = model.alphabet().clone();
    println!("字母表大小: {}，窗口: {}", alphabet.len(), model.size());

    // 2. 带等质量替换的局部比对
    let a = b"AFGGW";
    let b = b"AFNW";
    let aln = align(a, b, &model, AlignmentType::Local)?;
    println!("\n局部比对 AFGGW / AFNW:");
    println!("{}", aln.summary(a, b));

    // 3. 两条读段的末端重叠
    let overlap = end_alignment(b"KLVQPGGSL", b"PGGSLRLSC", &model, 8)?;
    println!("\n末端重叠: 长度 {}，得分 {}", overlap.overlap, overlap.alignment.score);

    // 4. 读段分配到模板并求共识
    let config = MatchConfig {
        cutoff: 2.0,
        enforce_unique: 0.9,
        fix_mass_spec_errors: true,
        ..MatchConfig::default()
    };
    let template = Arc::new(Read::new("IGHV3", b"EVQLVESGGGLVQPGGSLRLSCAASGFTFS", &alphabet)?);
    let segment = Segment::from_reads("heavy", vec![template], &config);

    let sequences: [&[u8]; 7] = [
        b"EVQLVESGGG",
        b"VESNGLVQPG",
        b"LVQPGGSLRL",
        b"PGGSLRLSCAA",
        b"SCAASGFTFS",
        b"LVEPGGSLRL",
        b"LVEPGGSLRL",
    ];
    let reads: Vec<Arc<Read>> = sequences
        .iter()
        .enumerate()
        .map(|(i, s)| Read::new(format!("read{}", i + 1), s, &alphabet).map(Arc::new))
        .collect::<pepstitch::Result<_>>()?;

    let summary = segment.match_reads(&reads, &model, &config)?;
    println!(
        "\n读段 {}，接受 {}，唯一 {}，质谱修正 {}",
        summary.reads, summary.accepted, summary.unique, summary.corrections
    );

    for t in segment.finalize() {
        let consensus = t.consensus_sequence();
        println!("\n模板 {}: {}", t.read().id, t.read().sequence_str());
        println!("共识:     {}", consensus.sequence_str());
        let depth: Vec<String> = consensus.coverage.iter().map(|d| format!("{:.0}", d)).collect();
        println!("覆盖深度: {}", depth.join(" "));
        for m in t.matches() {
            println!("  {} @{} {} score={}", m.query.id, m.start_template, m.cigar(), m.score);
        }
    }

    println!("\n完成！");
    Ok(())
}
