use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::parser::MatrixConversion;
use crate::record::{KmerSet, Metric};
use crate::taxonomy::DEFAULT_ACCESSION_COLUMN;

/// Taxmetrics: normalization and fusion of pairwise genome distance metrics per taxon
#[derive(Debug, Parser)]
#[command(author, version, about)]
#[command(styles=get_styles())]
#[command(arg_required_else_help(true))]
#[clap(name = "taxmetrics", version)]
pub struct App {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse, aggregate and fuse tool outputs for every taxon
    Run(RunArgs),
    /// Fuse persisted metric tables into per-taxon summaries
    Fuse(FuseArgs),
    /// Create taxon workspaces and move stray tool outputs into them
    Organize(OrganizeArgs),
    /// Count genomes per taxon directory
    Census(CensusArgs),
    /// Alignment fraction tables from skani and fastANI outputs
    AlignmentFraction(AlignmentFractionArgs),
}

/// Metrics and k-mer sizes on both axes of the fusion
#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Metric on the first axis
    #[arg(long, short = 'x', help_heading = "Metric selection")]
    pub metric_x: Metric,
    /// K-mer sizes accepted for the first metric (comma-separated)
    ///
    /// Applies to tools with a k-mer size in their output file name.
    /// Parameter-free tools are always included. All sizes are
    /// accepted when omitted.
    #[arg(long, value_parser = parse_kmer_set, help_heading = "Metric selection")]
    pub kmers_x: Option<KmerSet>,
    /// Metric on the second axis
    #[arg(long, short = 'y', help_heading = "Metric selection")]
    pub metric_y: Metric,
    /// K-mer sizes accepted for the second metric (comma-separated)
    #[arg(long, value_parser = parse_kmer_set, help_heading = "Metric selection")]
    pub kmers_y: Option<KmerSet>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Working directory with one subdirectory per taxon
    #[arg(long, short = 'w', value_parser = validate_dir)]
    pub workdir: PathBuf,
    /// Genome source directory with one subdirectory per taxon
    ///
    /// Taxa are taken from the source directory when provided, otherwise
    /// from the subdirectories of the working directory.
    #[arg(long, short = 's', value_parser = validate_dir)]
    pub source: Option<PathBuf>,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Taxonomy reference table (.csv) to resolve genome identifiers
    #[arg(long, short = 't', value_parser = validate_file, help_heading = "Taxonomy options")]
    pub taxonomy: Option<PathBuf>,
    /// Column of the taxonomy reference holding genome accessions
    #[arg(long, default_value = DEFAULT_ACCESSION_COLUMN, help_heading = "Taxonomy options")]
    pub taxonomy_column: String,
    /// Conversion of sketch similarity matrices into distances
    #[arg(long, default_value = "euclidean")]
    pub sketch_matrix: MatrixConversion,
    /// Print formatted run report to console
    #[clap(long, short = 'T')]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct FuseArgs {
    /// Working directory with persisted metric tables per taxon
    #[arg(long, short = 'w', value_parser = validate_dir)]
    pub workdir: PathBuf,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Print formatted run report to console
    #[clap(long, short = 'T')]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct OrganizeArgs {
    /// Working directory with stray tool outputs
    #[arg(long, short = 'w', value_parser = validate_dir)]
    pub workdir: PathBuf,
    /// Genome source directory with one subdirectory per taxon
    #[arg(long, short = 's', value_parser = validate_dir)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CensusArgs {
    /// Genome source directory with one subdirectory per taxon
    #[arg(long, short = 's', value_parser = validate_dir)]
    pub source: PathBuf,
    /// Output table of genome counts per taxon (.csv)
    #[arg(long, short = 'o', default_value = "genome_census.csv")]
    pub output: PathBuf,
    /// Keep taxa with more genomes than this
    #[arg(long, short = 'm', default_value = "10")]
    pub min_genomes: usize,
    /// Print formatted table to console
    #[clap(long, short = 'T')]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct AlignmentFractionArgs {
    /// Working directory with one subdirectory per taxon
    #[arg(long, short = 'w', value_parser = validate_dir)]
    pub workdir: PathBuf,
    /// Genome source directory with one subdirectory per taxon
    #[arg(long, short = 's', value_parser = validate_dir)]
    pub source: Option<PathBuf>,
}

fn parse_kmer_set(value: &str) -> Result<KmerSet, String> {
    value.parse::<KmerSet>().map_err(|e| e.to_string())
}

fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(file);

    if !path.exists() {
        return Err(format!("File not found: {}", file));
    }

    if !path.is_file() {
        return Err(format!("Not a valid file: {}", file));
    }

    Ok(path)
}

fn validate_dir(dir: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(dir);

    if !path.exists() {
        return Err(format!("Directory not found: {}", dir));
    }

    if !path.is_dir() {
        return Err(format!("Not a valid directory: {}", dir));
    }

    Ok(path)
}

pub fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
}
