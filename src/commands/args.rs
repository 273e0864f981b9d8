//! Command-line argument definitions for the reclass CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reclass")]
#[command(about = "Streaming read classification from precomputed alignment matches")]
#[command(
    long_about = "Reclass: assign every read of a sample a class in one or more
classification spaces (taxonomy plus functional schemes) from its
precomputed alignment matches, and write per-read assignments plus
per-class aggregate counts.

INPUT FORMATS:
  Tab-separated tables; .gz files are decompressed transparently.
  reads:   name <TAB> length <TAB> weight <TAB> complexity <TAB> mate ('-' = none)
  matches: read <TAB> bitScore <TAB> expected <TAB> percentIdentity
           <TAB> queryStart <TAB> queryEnd <TAB> Name=id;Name=id;...
  trees:   id <TAB> parent <TAB> name <TAB> rank

OUTPUT:
  Per-read assignment table (TSV) and a per-class summary, both
  deterministic for identical inputs and parameters."
)]
#[command(after_help = "EXAMPLES:
  # Taxonomic analysis with default parameters
  reclass analyze --reads reads.tsv --matches matches.tsv \\
      --tree Taxonomy=tax.tsv -o assignments.tsv

  # Add a functional classification, assigned by LCA instead of best hit
  reclass analyze --reads reads.tsv --matches matches.tsv \\
      --tree Taxonomy=tax.tsv --tree KEGG=kegg.tsv --use-lca KEGG

  # Long-read sample with coverage gate and custom thresholds
  reclass analyze --reads ont.tsv.gz --matches ont_matches.tsv.gz \\
      --tree Taxonomy=tax.tsv --config longread_params.toml

  # Suppress assignments to specific taxa
  reclass analyze --reads reads.tsv --matches matches.tsv \\
      --tree Taxonomy=tax.tsv --disable Taxonomy=9606,32630")]
pub struct Cli {
    /// Verbose progress output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify all reads of a sample and write the assignment tables
    Analyze {
        /// Read table (TSV, optionally gzipped)
        #[arg(long)]
        reads: PathBuf,

        /// Match table (TSV, optionally gzipped)
        #[arg(long)]
        matches: PathBuf,

        /// Classification tree as Name=path; repeat per classification.
        /// The name "Taxonomy" selects the taxonomic pipeline.
        #[arg(long = "tree", required = true)]
        trees: Vec<String>,

        /// Analysis parameters (TOML); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Assign this functional classification by LCA instead of best
        /// hit; repeatable
        #[arg(long = "use-lca")]
        use_lca: Vec<String>,

        /// Disabled ids as Name=id,id,...; repeatable
        #[arg(long = "disable")]
        disable: Vec<String>,

        /// Per-read assignment output (TSV); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-class summary output (TSV)
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },
}
