use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, warn};

use pepstitch::io::{fasta, RunReport};
use pepstitch::{align, AlignmentType, RunConfig, Segment};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "pepstitch",
    author,
    version,
    about = "Peptide read alignment and template consensus",
    arg_required_else_help = true
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// JSON run configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Align two peptide sequences and print the alignment
    Align {
        a: String,
        b: String,
        #[arg(short, long, default_value = "local")]
        mode: AlignmentType,
    },
    /// Place reads on templates and write the consensus sequences
    Assemble {
        /// Template FASTA file
        #[arg(long)]
        templates: PathBuf,
        /// Reads FASTA file
        #[arg(long)]
        reads: PathBuf,
        /// Consensus FASTA path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// JSON report path
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long, default_value = "segment")]
        name: String,
        #[arg(long)]
        cutoff: Option<f64>,
        #[arg(long = "enforce-unique")]
        enforce_unique: Option<f64>,
        #[arg(long)]
        alignment: Option<AlignmentType>,
        #[arg(long = "fix-mass-spec")]
        fix_mass_spec: bool,
        #[arg(long = "no-force-isoleucine")]
        no_force_isoleucine: bool,
        #[arg(short = 't', long = "threads")]
        threads: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path).with_context(|| format!("cannot load config '{}'", path.display()))?,
        None => RunConfig::default(),
    };

    match cli.command {
        Commands::Align { a, b, mode } => run_align(&config, &a, &b, mode),
        Commands::Assemble {
            templates,
            reads,
            out,
            report,
            name,
            cutoff,
            enforce_unique,
            alignment,
            fix_mass_spec,
            no_force_isoleucine,
            threads,
        } => {
            let m = &mut config.matching;
            if let Some(v) = cutoff {
                m.cutoff = v;
            }
            if let Some(v) = enforce_unique {
                m.enforce_unique = v;
            }
            if let Some(v) = alignment {
                m.alignment = v;
            }
            if let Some(v) = threads {
                m.threads = v;
            }
            m.fix_mass_spec_errors |= fix_mass_spec;
            if no_force_isoleucine {
                m.force_germline_isoleucine = false;
            }
            run_assemble(&config, &name, &templates, &reads, out.as_deref(), report.as_deref())
        }
    }
}

fn run_align(config: &RunConfig, a: &str, b: &str, mode: AlignmentType) -> Result<()> {
    let model = config.scoring.build().context("invalid scoring configuration")?;
    let a = a.to_ascii_uppercase();
    let b = b.to_ascii_uppercase();
    let alignment = align(a.as_bytes(), b.as_bytes(), &model, mode)?;
    println!("{}", alignment.summary(a.as_bytes(), b.as_bytes()));
    Ok(())
}

fn load_fasta(path: &Path, alphabet: &pepstitch::Alphabet) -> Result<Vec<Arc<pepstitch::Read>>> {
    let fh = File::open(path).with_context(|| format!("cannot open FASTA '{}'", path.display()))?;
    let reads = fasta::read_peptides(BufReader::new(fh), alphabet)
        .with_context(|| format!("cannot parse FASTA '{}'", path.display()))?;
    if reads.is_empty() {
        anyhow::bail!("FASTA file '{}' contains no sequences", path.display());
    }
    Ok(reads.into_iter().map(Arc::new).collect())
}

fn run_assemble(
    config: &RunConfig,
    name: &str,
    templates_path: &Path,
    reads_path: &Path,
    out_path: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let model = config.scoring.build().context("invalid scoring configuration")?;
    let templates = load_fasta(templates_path, model.alphabet())?;
    let reads = load_fasta(reads_path, model.alphabet())?;
    info!("templates: {}, reads: {}", templates.len(), reads.len());

    let segment = Segment::from_reads(name, templates, &config.matching);
    let summary = segment.match_reads(&reads, &model, &config.matching)?;
    if summary.accepted == 0 {
        warn!("no read was placed on any template; consensus equals the templates");
    }
    let finalized = segment.finalize();

    let mut out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("cannot create output '{}'", p.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    for t in &finalized {
        let consensus = t.consensus_sequence();
        let desc = format!(
            "segment={} score={} matches={} unique={} covered={:.3}",
            t.name,
            t.score,
            t.matches().len(),
            t.unique_matches,
            t.coverage_fraction()
        );
        fasta::write_record(&mut out, &t.read().id, Some(&desc), &consensus.sequence, 60)?;
    }
    out.flush()?;

    if let Some(p) = report_path {
        let report = RunReport::new(config, summary, &finalized, &model)?;
        let fh = File::create(p).with_context(|| format!("cannot create report '{}'", p.display()))?;
        report.write(BufWriter::new(fh))?;
        info!("report written: {}", p.display());
    }
    Ok(())
}
