use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};
use facebench_core::{
    ExtractorKind, LandmarkFinder, LandmarkStrategy, PreprocessMode, Preprocessor, ReductorKind,
    VerificationPipeline, VerifierKind,
};
use facebench_data::LfwDataset;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod eval;
mod report;

use eval::{FsImageSource, Protocol};
use report::RunReport;

/// Distance from the image border landmarks are clamped to.
const LANDMARK_CLAMP_MARGIN: usize = 2;

#[derive(Parser)]
#[command(
    name = "facebench",
    about = "LFW pairs-protocol face verification benchmark",
    disable_help_flag = true
)]
struct Cli {
    /// Path to the dataset root (folder holding pairs.txt and the images)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Extractor index (see --help for the list)
    #[arg(short, long, default_value_t = 2)]
    ext: usize,

    /// Reductor index
    #[arg(short, long, default_value_t = 1)]
    red: usize,

    /// Classifier index
    #[arg(short, long, default_value_t = 0)]
    cls: usize,

    /// Preprocessing mode index
    #[arg(short = 'P', long, default_value_t = 0)]
    pre: usize,

    /// Border pixels cut from the 250x250 canonical image (80 -> 90x90)
    #[arg(short = 'C', long, default_value_t = 80)]
    crop: usize,

    /// Also train on a horizontally flipped copy of each image
    #[arg(short, long)]
    flip: bool,

    /// Cross-validation protocol
    #[arg(short, long, value_enum, default_value = "dev")]
    train: Protocol,

    /// Landmark strategy for the align preprocessing mode
    #[arg(long, value_enum, default_value = "detector")]
    landmarks: LandmarkArg,

    /// Write the run report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Show usage and the selector tables
    #[arg(short, long)]
    help: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LandmarkArg {
    /// Parts-based detector, falling back to the reference table
    Detector,
    /// Constant reference table only
    Table,
}

/// Print the selector tables the way the indices are accepted, five per row.
fn print_options() {
    eprintln!("[extractors]  :");
    print_table(ExtractorKind::ALL.iter().map(|k| k.name()));
    eprintln!("\n[reductors]   :");
    print_table(ReductorKind::ALL.iter().map(|k| k.name()));
    eprintln!("\n[classifiers] :");
    print_table(VerifierKind::ALL.iter().map(|k| k.name()));
    eprintln!("\n[preproc]     :");
    print_table(PreprocessMode::ALL.iter().map(|k| k.name()));
}

fn print_table<'a>(names: impl Iterator<Item = &'a str>) {
    for (i, name) in names.enumerate() {
        if i % 5 == 0 {
            eprintln!();
        }
        eprint!("{name:>10}({i:2})");
    }
    eprintln!();
}

fn selector<T: Copy>(
    what: &str,
    index: usize,
    all_len: usize,
    from_index: impl Fn(usize) -> Option<T>,
) -> Result<T> {
    match from_index(index) {
        Some(v) => Ok(v),
        None => bail!("invalid {what} index {index}, valid range is 0..{}", all_len),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let path = match cli.path.filter(|_| !cli.help) {
        Some(path) if path.is_dir() => path,
        _ => {
            Cli::command().print_help()?;
            print_options();
            std::process::exit(2);
        }
    };

    let extractor = selector("extractor", cli.ext, ExtractorKind::ALL.len(), ExtractorKind::from_index)?;
    let reductor = selector("reductor", cli.red, ReductorKind::ALL.len(), ReductorKind::from_index)?;
    let classifier = selector("classifier", cli.cls, VerifierKind::ALL.len(), VerifierKind::from_index)?;
    let mode = selector("preprocessing", cli.pre, PreprocessMode::ALL.len(), PreprocessMode::from_index)?;

    let strategy = match cli.landmarks {
        LandmarkArg::Detector => LandmarkStrategy::Detector,
        LandmarkArg::Table => LandmarkStrategy::Table,
    };

    println!(
        "{} {} {} {} {} {} {}",
        extractor.name(),
        reductor.name(),
        classifier.name(),
        mode.name(),
        cli.crop,
        cli.flip,
        cli.train.name()
    );

    let dataset = LfwDataset::load(&path)?;
    let source = FsImageSource::new(path);

    let finder = LandmarkFinder::new(strategy, LANDMARK_CLAMP_MARGIN);
    let preprocessor = Preprocessor::new(mode, cli.crop, finder);
    let mut pipeline =
        VerificationPipeline::new(preprocessor, extractor, reductor, classifier, cli.flip);

    let result = eval::run(&dataset, &source, &mut pipeline, cli.train)?;

    let run_report = RunReport::new(
        extractor.name(),
        reductor.name(),
        classifier.name(),
        mode.name(),
        cli.train.name(),
        cli.crop,
        cli.flip,
        &result,
    );

    eprintln!("{}", run_report.summary_line());

    if let Some(json_path) = &cli.json {
        run_report.write_json(json_path)?;
        tracing::info!(path = %json_path.display(), "report written");
    }

    Ok(())
}
