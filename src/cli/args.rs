//! Command line arguments
//!
//! - batchstore seed <NAME> [--initial N] [--note TEXT]
//! - batchstore next <NAME> [--count N]
//! - batchstore list <JOB_EXECUTION_ID> --instance <ID>
//! - batchstore show <JOB_EXECUTION_ID> <STEP_ID> --instance <ID>

use batchstore::SequenceStrategy;
use batchstore::config::DEFAULT_SEQUENCE_COLLECTION;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and maintain a batch step execution repository
#[derive(Parser, Debug)]
#[command(name = "batchstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the collection snapshots
    #[arg(long, default_value = "./batchstore-data")]
    pub data_dir: PathBuf,

    /// Collection holding sequence counters
    #[arg(long, default_value = DEFAULT_SEQUENCE_COLLECTION)]
    pub sequence_collection: String,

    /// How sequence values are allocated (atomic-increment | compare-and-swap)
    #[arg(long, default_value_t = SequenceStrategy::AtomicIncrement)]
    pub strategy: SequenceStrategy,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a sequence counter unless it already exists
    Seed {
        name: String,
        #[arg(long, default_value_t = 0)]
        initial: i64,
        #[arg(long)]
        note: Option<String>,
    },

    /// Allocate values from a sequence
    Next {
        name: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// List the step executions of a job execution
    List {
        job_execution_id: i64,
        #[arg(long)]
        instance: i64,
    },

    /// Print one step execution as JSON
    Show {
        job_execution_id: i64,
        step_id: i64,
        #[arg(long)]
        instance: i64,
    },
}
