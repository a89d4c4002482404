//! Command line entry point: sort the reads of one sample into a tRNA profile.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use colored::Colorize;
use log::{error, info, Level};
use simple_logger::init_with_level;

use trnasort::errors::*;
use trnasort::*;

#[derive(Parser, Debug)]
#[command(version, about = "Sort sequencing reads into tRNAs", long_about = None)]
struct Args {
    #[arg(value_name = "PATH", help = "Input FASTA/FASTQ file, optionally gzip compressed")]
    input: PathBuf,

    #[arg(
        short = 's',
        long = "sample-name",
        required = true,
        value_name = "NAME",
        help = "Sample name, used as the prefix of every read ID and output file"
    )]
    sample_name: String,

    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "PATH",
        help = "Path to output directory",
        default_value = "."
    )]
    output_dir: PathBuf,

    #[arg(
        short = 'r',
        long = "rules",
        value_name = "YAML",
        help = "Filter rules; switches to rule-driven sorting with per-rule diagnostics"
    )]
    rules: Option<PathBuf>,

    #[arg(
        short = 't',
        long = "threads",
        help = "Number of threads",
        value_name = "THREADS",
        default_value_t = 1
    )]
    threads: usize,

    #[arg(
        long = "batch-size",
        help = "Profile rows kept in memory between writes",
        value_name = "ROWS",
        default_value_t = 10_000
    )]
    batch_size: usize,

    #[arg(
        long = "subseq-match",
        help = "Give reads without an anticodon the anticodon of a read containing them",
        action = ArgAction::SetTrue
    )]
    subseq_match: bool,

    #[arg(
        long = "gzip",
        help = "Gzip compress the profile table",
        action = ArgAction::SetTrue
    )]
    gzip: bool,
}

struct Outputs {
    profile: PathBuf,
    stats: PathBuf,
    report: PathBuf,
    diagnostics: PathBuf,
}

impl Args {
    /// Validate arguments before anything is read or written.
    fn check(&mut self) -> Result<Outputs> {
        self.sample_name = check_sample_name(&self.sample_name)?;

        if !self.input.is_file() {
            return Err(Error::config(format!(
                "input \"{}\" is not a file",
                self.input.display()
            )));
        }

        if self.threads == 0 {
            return Err(Error::config("--threads must be at least 1"));
        }

        ensure_output_dir(&self.output_dir)?;

        let ext = if self.gzip { "tsv.gz" } else { "tsv" };
        let outputs = Outputs {
            profile: self
                .output_dir
                .join(format!("{}_profile.{ext}", self.sample_name)),
            stats: self.output_dir.join(format!("{}_stats.tsv", self.sample_name)),
            report: self.output_dir.join(format!("{}_stats.txt", self.sample_name)),
            diagnostics: self.output_dir.join("filtered_sequences"),
        };

        for path in [&outputs.profile, &outputs.stats, &outputs.report] {
            check_output_absent(path)?;
        }

        Ok(outputs)
    }
}

fn create(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path).map_err(|e| Error::FileIo {
        file: path.display().to_string(),
        source: Box::new(e),
    })
}

fn sort(mut args: Args) -> Result<()> {
    let outputs = args.check()?;

    let mode = match &args.rules {
        Some(path) => {
            let rules = FilterRuleSet::from_file(path)?;
            info!("Using filter rules from \"{}\"", path.display());
            SortMode::Rules(rules)
        }
        None => SortMode::Canonical,
    };

    info!("Sample name: {}", args.sample_name);
    info!("Input: {}", args.input.display());

    let input = FastaInput::from_file(args.input.to_string_lossy())?;
    let sorter = Sorter::new(args.sample_name.clone(), mode).with_diagnostics_writer(
        DiagnosticsWriter::new(&outputs.diagnostics, DIAGNOSTICS_FLUSH_BYTES),
    );
    let profile_path = outputs.profile.to_string_lossy().into_owned();

    let summary = if args.subseq_match {
        let mut profile = MemoryProfile::new();
        let mut summary = sorter.run(&input, &mut profile, args.threads)?;

        let matched = assign_by_subsequence(profile.records_mut());
        summary.stats.add(SUBSEQ_MATCH, matched as u64);
        info!("Assigned {matched} anticodons by subsequence");

        let mut writer = TsvProfileWriter::from_file(&profile_path, args.batch_size)?;
        writer.append(profile.into_records())?;
        writer.finish()?;
        summary
    } else {
        let mut writer = TsvProfileWriter::from_file(&profile_path, args.batch_size)?;
        sorter.run(&input, &mut writer, args.threads)?
    };

    summary.stats.write_tsv(create(&outputs.stats)?)?;
    summary.stats.write_report(create(&outputs.report)?)?;

    let stats = &summary.stats;
    eprintln!();
    eprintln!(
        "{} {}",
        "Total raw seqs processed".bold(),
        stats.get(TOTAL_SEQS)
    );
    eprintln!(
        "{} {}",
        "Total tRNA seqs recovered".bold(),
        stats.get(TOTAL_PASSED).to_string().green()
    );
    eprintln!(
        "{} {}",
        "Total full length tRNA seqs".bold(),
        stats.get(TOTAL_FULL_LENGTH).to_string().green()
    );
    eprintln!("{} {}", "Output profile".bold(), profile_path.cyan());
    eprintln!(
        "{} {}",
        "Output stats".bold(),
        outputs.report.display().to_string().cyan()
    );

    Ok(())
}

fn main() {
    let start = std::time::Instant::now();
    init_with_level(Level::Info).unwrap();

    let args: Args = Args::parse();

    sort(args).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);
}
