use anyhow::Result;
use clap::Parser;

use taxmetrics::alignment::alignment_fractions;
use taxmetrics::census::GenomeCensus;
use taxmetrics::config::PipelineConfig;
use taxmetrics::terminal::{App, Commands};
use taxmetrics::utils::init_logger;
use taxmetrics::workspace::{organize, print_reports, Pipeline};

/// Taxmetrics application
///
/// Run the application from arguments provided
/// by the command line interface
#[cfg(not(tarpaulin_include))]
fn main() -> Result<()> {
    init_logger();

    let cli = App::parse();

    match &cli.command {
        Commands::Run(args) => {
            let pipeline = Pipeline::from_config(PipelineConfig::from_run_args(args))?;
            let reports = pipeline.run()?;
            if args.table {
                print_reports(&reports)
            }
        }
        Commands::Fuse(args) => {
            let pipeline = Pipeline::from_config(PipelineConfig::from_fuse_args(args))?;
            let reports = pipeline.fuse_persisted()?;
            if args.table {
                print_reports(&reports)
            }
        }
        Commands::Organize(args) => {
            let workspaces = organize(&args.workdir, args.source.as_deref())?;
            log::info!("Organized {} taxon workspaces in {}", workspaces.len(), args.workdir.display());
        }
        Commands::Census(args) => {
            let census = GenomeCensus::from_source(&args.source)?.filter_min(args.min_genomes);
            census.write_csv(&args.output)?;
            if args.table {
                census.print_table()
            }
        }
        Commands::AlignmentFraction(args) => {
            let written = alignment_fractions(&args.workdir, args.source.as_deref())?;
            log::info!("Wrote alignment fraction tables for {written} taxa");
        }
    }

    Ok(())
}
