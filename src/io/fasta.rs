use std::io::{BufRead, Write};

use log::warn;

use crate::error::Result;
use crate::read::Read;
use crate::util::alphabet::Alphabet;

/// 一条 FASTA 记录，序列已去除空白并转为大写
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    line: String,
    pending_header: Option<String>,
    done: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            pending_header: None,
            done: false,
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        if n == 0 {
            self.done = true;
        }
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => loop {
                if self.done || !self.read_line()? {
                    return Ok(None);
                }
                if let Some(h) = self.line.strip_prefix('>') {
                    break h.trim().to_string();
                }
            },
        };

        let (id, desc) = match header.split_once(char::is_whitespace) {
            Some((id, rest)) => {
                let rest = rest.trim();
                (id.to_string(), (!rest.is_empty()).then(|| rest.to_string()))
            }
            None => (header.clone(), None),
        };

        let mut seq = Vec::new();
        while !self.done && self.read_line()? {
            if let Some(h) = self.line.strip_prefix('>') {
                self.pending_header = Some(h.trim().to_string());
                break;
            }
            seq.extend(
                self.line
                    .bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(|b| b.to_ascii_uppercase()),
            );
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// 读取全部记录并按字母表校验为读段，空记录跳过
pub fn read_peptides<R: BufRead>(reader: R, alphabet: &Alphabet) -> Result<Vec<Read>> {
    let mut reads = Vec::new();
    for record in FastaReader::new(reader) {
        let record = record?;
        if record.seq.is_empty() {
            warn!("skipping empty FASTA record '{}'", record.id);
            continue;
        }
        reads.push(Read::new(record.id, &record.seq, alphabet)?);
    }
    Ok(reads)
}

/// 按 `width` 个残基换行写出一条记录，`width` 为 0 时不换行
pub fn write_record<W: Write>(out: &mut W, id: &str, desc: Option<&str>, seq: &[u8], width: usize) -> Result<()> {
    match desc {
        Some(d) => writeln!(out, ">{} {}", id, d)?,
        None => writeln!(out, ">{}", id)?,
    }
    if seq.is_empty() {
        return Ok(());
    }
    let width = if width == 0 { seq.len() } else { width };
    for chunk in seq.chunks(width) {
        out.write_all(chunk)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
