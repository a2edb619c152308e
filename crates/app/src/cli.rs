use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use exam_core::model::QuestionFilter;

/// Multiple-choice exams drawn from a local question bank.
#[derive(Parser, Debug)]
#[command(name = "exam", version, about)]
pub struct Cli {
    /// SQLite database holding questions and exam history
    #[arg(long, global = true, env = "EXAM_DB_URL", default_value = "sqlite://exam.sqlite3")]
    pub db: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take interactive exams, one after another
    Run(RunArgs),
    /// List recent exam results
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Add questions from a JSON array of question drafts
    Add {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },
    /// Write the question bank and history to a backup file
    Export {
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Load a backup file written by `export`
    Restore {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long)]
    pub subject: Option<String>,
    #[arg(long)]
    pub chapter: Option<String>,
    #[arg(long)]
    pub topic: Option<String>,
    #[arg(long)]
    pub difficulty: Option<String>,

    /// Number of questions to draw
    #[arg(
        long,
        env = "EXAM_DEFAULT_COUNT",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub count: u32,

    /// Submit automatically after this many seconds
    #[arg(long, value_name = "SECS")]
    pub time_limit: Option<u64>,

    /// Seed for a reproducible question draw
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RunArgs {
    #[must_use]
    pub fn filter(&self) -> QuestionFilter {
        QuestionFilter::new(
            self.subject.clone(),
            self.chapter.clone(),
            self.topic.clone(),
            self.difficulty.clone(),
        )
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit.map(Duration::from_secs)
    }
}
