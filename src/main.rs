//! CLI entry point for proxmap.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn, Level};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use proxmap::compare::{interval_estimates, significance};
use proxmap::config::{Config, EngineKind, SignalRegion};
use proxmap::corpus::{assemble, load_corpus, load_sets};
use proxmap::engine::{geometry_engine, signal_engine};
use proxmap::output::{Schema, TableWriter};
use proxmap::parser::{load_manifest, sequence_lengths};
use proxmap::random::{write_random_bed, DEFAULT_SEED};
use proxmap::resolver::{NearestFeatureResolver, SignalResolver};
use proxmap::types::{AnnotationSource, AnnotationSourceKind, GroupClass, IntervalSet};
use proxmap::BucketScheme;

/// Nearest-feature mapping and distribution comparison for genomic intervals.
#[derive(Parser, Debug)]
#[command(name = "proxmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output", global = true)]
    output: Option<PathBuf>,

    /// Output field delimiter (use '\t' for tabs)
    #[arg(short = 'd', long = "delimiter", default_value = ",", global = true)]
    delimiter: String,

    /// Number of worker threads (0 = auto-detect)
    #[arg(short = 'j', long = "threads", default_value = "1", global = true)]
    threads: usize,

    /// Engine for nearest-feature and signal queries: external or native
    #[arg(long = "engine", default_value = "external", global = true)]
    engine: EngineKind,

    /// Deadline in seconds for each external tool call (0 = none)
    #[arg(long = "timeout", default_value = "0", global = true)]
    timeout: u64,

    /// Path to the bedtools binary
    #[arg(long = "bedtools", default_value = "bedtools", global = true)]
    bedtools: PathBuf,

    /// Path to the bigWigAverageOverBed binary
    #[arg(long = "bigwig-average", default_value = "bigWigAverageOverBed", global = true)]
    bigwig_average: PathBuf,

    /// Let features overlapping a record count as its nearest (distance 0)
    #[arg(long = "allow-overlaps", global = true)]
    allow_overlaps: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Map every record to its nearest annotated feature
    Proximity(ProximityArgs),
    /// Report record lengths per class and tissue
    Lengths(LengthsArgs),
    /// Bin record start positions into fixed-width windows
    Positions(PositionsArgs),
    /// Map Ubiquitous records onto Tissue-Specific records and onto a random background
    RandomProximity(RandomProximityArgs),
    /// Per-position confidence intervals over vectorized records
    VectorError(VectorErrorArgs),
    /// Rank-sum tests between Tissue-Specific and Ubiquitous vectors
    Similarity(ManifestArgs),
}

#[derive(Args, Debug)]
struct ManifestArgs {
    /// TOML manifest listing the BED files of the run
    #[arg(short = 'c', long = "config")]
    manifest: PathBuf,
}

#[derive(Args, Debug)]
struct ProximityArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Annotation file (GTF or BED)
    #[arg(short = 'a', long = "annot")]
    annot: PathBuf,

    /// Annotation layout, when the extension does not tell
    #[arg(long = "annot-kind")]
    annot_kind: Option<AnnotationSourceKind>,

    /// Average each set's signal tracks
    #[arg(short = 's', long = "signals")]
    signals: bool,

    /// Region averaged for signals: hit or self
    #[arg(long = "signal-region", default_value = "hit")]
    signal_region: SignalRegion,

    /// Keep records that could not be paired with a feature
    #[arg(long = "keep-unpaired")]
    keep_unpaired: bool,

    /// GTF tag for gene ID
    #[arg(short = 'G', long = "gene", default_value = "gene_id")]
    gene_tag: String,
}

#[derive(Args, Debug)]
struct LengthsArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Report the sorted distinct lengths per class instead of one row per record
    #[arg(short = 'u', long = "unique")]
    unique: bool,
}

#[derive(Args, Debug)]
struct PositionsArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    #[arg(long = "start", default_value = "0")]
    start: i64,

    #[arg(long = "stop", default_value = "10000000")]
    stop: i64,

    #[arg(long = "step", default_value = "500000")]
    step: i64,
}

#[derive(Args, Debug)]
struct RandomProximityArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Genome sequence for random placement (default: the Tissue-Specific entry's fasta)
    #[arg(short = 'f', long = "fasta")]
    fasta: Option<PathBuf>,

    /// Random seed
    #[arg(long = "seed", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Keep the generated random BED at this path
    #[arg(long = "random-bed")]
    random_bed: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct VectorErrorArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Confidence level in (0, 1)
    #[arg(long = "conf", default_value = "0.95")]
    conf: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.global.verbose {
        0 => Level::Warn,
        1 => Level::Info,
        _ => Level::Debug,
    };
    simple_logger::init_with_level(level).context("Failed to initialise logging")?;

    match run(cli) {
        Err(e) if is_interrupted(&e) => Ok(()),
        other => other,
    }
}

/// A closed stdout or an interrupted write ends the run quietly.
fn is_interrupted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let io_err = cause.downcast_ref::<io::Error>().or_else(|| {
            match cause.downcast_ref::<proxmap::Error>() {
                Some(proxmap::Error::Io(e)) => Some(e),
                _ => None,
            }
        });
        matches!(
            io_err.map(|e| e.kind()),
            Some(io::ErrorKind::BrokenPipe) | Some(io::ErrorKind::Interrupted)
        )
    })
}

fn build_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = Config::new();
    config.threads = global.threads;
    config.engine = global.engine;
    config.set_timeout_secs(global.timeout);
    config.set_delimiter(&global.delimiter)?;
    config.bedtools = global.bedtools.clone();
    config.bigwig_average = global.bigwig_average.clone();
    config.ignore_overlaps = !global.allow_overlaps;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let mut config = build_config(&cli.global)?;
    match &cli.command {
        Command::Proximity(args) => {
            config.signal_region = args.signal_region;
            config.gene_id_tag = args.gene_tag.clone();
        }
        Command::VectorError(args) => config.set_confidence(args.conf)?,
        _ => {}
    }

    let num_threads = config.thread_count();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to create thread pool")?;
    info!("Using {} worker threads", num_threads);

    let sink: Box<dyn Write + Send> = match &cli.global.output {
        Some(path) => {
            info!("Writing output to: {}", path.display());
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut out = TableWriter::new(sink, config.delimiter);

    let started = Instant::now();
    let rows = pool.install(|| match &cli.command {
        Command::Proximity(args) => run_proximity(args, &config, &mut out),
        Command::Lengths(args) => run_lengths(args, &mut out),
        Command::Positions(args) => run_positions(args, &mut out),
        Command::RandomProximity(args) => run_random_proximity(args, &config, &mut out),
        Command::VectorError(args) => run_vector_error(args, &config, &mut out),
        Command::Similarity(args) => run_similarity(args, &mut out),
    })?;
    out.flush()?;

    info!("Done! {} rows in {:.2?}", rows, started.elapsed());
    Ok(())
}

fn run_proximity<W: Write>(args: &ProximityArgs, config: &Config, out: &mut TableWriter<W>) -> Result<usize> {
    let source = AnnotationSource::resolve(args.annot.clone(), args.annot_kind)?;
    let mut sets = load_sets(&load_manifest(&args.manifest.manifest)?)?;

    let engine = geometry_engine(config);
    NearestFeatureResolver::new(engine.as_ref(), &config.buckets, &config.gene_id_tag)
        .resolve_all(&mut sets, &source)?;

    if args.signals {
        let engine = signal_engine(config);
        SignalResolver::new(engine.as_ref(), config.signal_region).resolve_all(&mut sets)?;
    }

    let corpus = assemble(sets)?;
    let unpaired = corpus.records().iter().filter(|r| !r.has_valid_distance()).count();
    if unpaired > 0 && !args.keep_unpaired {
        warn!("{} records had no feature on their chromosome and were left out", unpaired);
    }

    let rows = corpus
        .records()
        .iter()
        .filter(|r| args.keep_unpaired || r.has_valid_distance());
    Ok(out.write_records(&Schema::proximity(args.signals), rows)?)
}

fn run_lengths<W: Write>(args: &LengthsArgs, out: &mut TableWriter<W>) -> Result<usize> {
    let corpus = load_corpus(&args.manifest.manifest)?;
    if !args.unique {
        return Ok(out.write_records(&Schema::lengths(), corpus.records())?);
    }

    let mut rows = 0;
    out.write_row(["Class", "Length"])?;
    for class in [GroupClass::TissueSpecific, GroupClass::Ubiquitous] {
        let lengths: BTreeSet<i64> = corpus.by_class(class).map(|r| r.length()).collect();
        for length in lengths {
            out.write_row([class.to_string(), length.to_string()])?;
            rows += 1;
        }
    }
    Ok(rows)
}

fn run_positions<W: Write>(args: &PositionsArgs, out: &mut TableWriter<W>) -> Result<usize> {
    if args.step <= 0 || args.stop <= args.start {
        bail!("Positions need --step > 0 and --stop > --start.");
    }
    let mut sets = load_sets(&load_manifest(&args.manifest.manifest)?)?;
    BucketScheme::positional(args.start, args.stop, args.step).bin_positions(&mut sets);

    let corpus = assemble(sets)?;
    Ok(out.write_records(&Schema::positions(), corpus.records())?)
}

/// Pick the single Tissue-Specific and single Ubiquitous set of the run.
fn split_classes(sets: Vec<IntervalSet>) -> Result<(IntervalSet, IntervalSet)> {
    if sets.len() != 2 {
        bail!(
            "random-proximity needs exactly two BED entries (one per class), found {}",
            sets.len()
        );
    }
    let (ts, ub): (Vec<IntervalSet>, Vec<IntervalSet>) = sets
        .into_iter()
        .partition(|s| s.class == GroupClass::TissueSpecific);
    match (ts.into_iter().next(), ub.into_iter().next()) {
        (Some(ts), Some(ub)) => Ok((ts, ub)),
        _ => bail!("random-proximity needs one Tissue-Specific and one Ubiquitous entry"),
    }
}

fn run_random_proximity<W: Write>(
    args: &RandomProximityArgs,
    config: &Config,
    out: &mut TableWriter<W>,
) -> Result<usize> {
    let (ts, ub) = split_classes(load_sets(&load_manifest(&args.manifest.manifest)?)?)?;

    let fasta = match args.fasta.as_ref().or(ts.fasta.as_ref()) {
        Some(f) => f.clone(),
        None => bail!(
            "No genome sequence for random placement: pass --fasta or set fasta on {}",
            ts.path.display()
        ),
    };
    let genome = sequence_lengths(&fasta)?;

    let (random_path, keep) = match &args.random_bed {
        Some(p) => (p.clone(), true),
        None => (
            std::env::temp_dir().join(format!("proxmap_random_{}.bed", std::process::id())),
            false,
        ),
    };
    write_random_bed(&ts, &genome, args.seed, &random_path)?;

    let result = map_onto_references(&ts, &ub, &random_path, config, out);
    if !keep {
        if let Err(e) = std::fs::remove_file(&random_path) {
            warn!("Could not remove {}: {}", random_path.display(), e);
        }
    }
    result
}

/// Map the Ubiquitous set onto the Tissue-Specific file and onto the random file.
fn map_onto_references<W: Write>(
    ts: &IntervalSet,
    ub: &IntervalSet,
    random_path: &Path,
    config: &Config,
    out: &mut TableWriter<W>,
) -> Result<usize> {
    let engine = geometry_engine(config);
    let resolver = NearestFeatureResolver::new(engine.as_ref(), &config.buckets, &config.gene_id_tag);
    let references = [
        AnnotationSource::new(ts.path.clone(), AnnotationSourceKind::Bed),
        AnnotationSource::new(random_path.to_path_buf(), AnnotationSourceKind::Bed),
    ];
    let labels = [
        AnnotationSource::new(ts.path.clone(), AnnotationSourceKind::Bed).label(),
        "random".to_string(),
    ];

    let mut rows = 0;
    for (i, (reference, label)) in references.iter().zip(labels).enumerate() {
        let mut mapped = ub.clone();
        resolver.resolve(&mut mapped, reference)?;

        let schema = Schema::proximity(false).with_label("Annotation", label);
        if i == 0 {
            out.write_header(&schema)?;
        }
        rows += out.write_rows(&schema, mapped.records.iter().filter(|r| r.has_valid_distance()))?;
    }
    Ok(rows)
}

fn run_vector_error<W: Write>(args: &VectorErrorArgs, config: &Config, out: &mut TableWriter<W>) -> Result<usize> {
    let corpus = load_corpus(&args.manifest.manifest)?;
    if corpus.records().iter().all(|r| r.vector.is_none()) {
        warn!("No vectorized records in {}", args.manifest.manifest.display());
    }
    let rows = interval_estimates(&corpus, config.confidence);
    Ok(out.write_table(&rows)?)
}

fn run_similarity<W: Write>(args: &ManifestArgs, out: &mut TableWriter<W>) -> Result<usize> {
    let corpus = load_corpus(&args.manifest)?;
    let rows = significance(&corpus);
    if rows.is_empty() {
        warn!("No tissue has vectorized records of both classes");
    }
    Ok(out.write_table(&rows)?)
}
