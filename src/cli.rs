///! CLI commands for edgegrid

use anyhow::{bail, ensure, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{EdgeType, GridConfig};
use crate::convert;
use crate::preprocess;
use crate::stats;
use crate::validate;

#[derive(Parser)]
#[command(name = "edgegrid")]
#[command(about = "Out-of-core edge grid preprocessor for streaming graph engines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the P x P edge grid from a binary edge file
    Preprocess {
        /// Input binary edge file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (wiped and recreated)
        #[arg(short, long)]
        outdir: PathBuf,

        /// Number of vertices
        #[arg(short, long)]
        vertices: u32,

        /// Number of partitions per axis (default: vertices / CHUNK_SIZE)
        #[arg(short, long)]
        partitions: Option<usize>,

        /// Edge type: 0 = unweighted, 1 = weighted
        #[arg(short = 't', long, default_value = "0")]
        edge_type: u8,
    },

    /// Convert an ASCII edge list into fixed-width binary records
    Convert {
        /// Input text file, one `src dst [weight]` per line
        input: PathBuf,

        /// Output binary edge file
        output: PathBuf,

        /// Edge type: 0 = unweighted, 1 = weighted
        #[arg(short = 't', long, default_value = "0")]
        edge_type: u8,
    },

    /// Check the invariants of a generated grid
    Validate {
        /// Grid directory produced by `preprocess`
        dir: PathBuf,
    },

    /// Report the block size distribution of a generated grid
    Stats {
        /// Grid directory produced by `preprocess`
        dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Preprocess {
            input,
            outdir,
            vertices,
            partitions,
            edge_type,
        } => {
            let edge_type = EdgeType::from_code(edge_type)?;
            let partitions =
                partitions.unwrap_or_else(|| GridConfig::default_partitions(vertices));
            ensure!(partitions >= 1, "partition count must be at least 1");
            let config = GridConfig {
                input,
                outdir,
                vertices,
                partitions,
                edge_type,
            };
            preprocess::run(&config)
        }

        Commands::Convert {
            input,
            output,
            edge_type,
        } => {
            let edge_type = EdgeType::from_code(edge_type)?;
            let report = convert::run(&input, &output, edge_type)?;
            println!("✓ {} edges written to {}", report.edges, output.display());
            match report.max_vertex {
                Some(max) => println!("  vertex count for preprocessing: {}", max as u64 + 1),
                None => println!("  no edges found"),
            }
            Ok(())
        }

        Commands::Validate { dir } => {
            let result = validate::validate_grid(&dir)?;
            if !result.passed {
                bail!("validation failed with {} error(s)", result.errors.len());
            }
            Ok(())
        }

        Commands::Stats { dir } => {
            let stats = stats::collect(&dir)?;
            stats::print(&stats);
            Ok(())
        }
    }
}
