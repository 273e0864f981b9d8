use anyhow::Result;
use clap::Parser;

use reclass::logging::init_logger;

mod commands;

use commands::{run_analyze, AnalyzeArgs, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Analyze {
            reads,
            matches,
            trees,
            config,
            use_lca,
            disable,
            output,
            summary,
        } => run_analyze(AnalyzeArgs {
            reads,
            matches,
            trees,
            config,
            use_lca,
            disable,
            output,
            summary,
        }),
    }
}
