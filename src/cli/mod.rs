// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments, builds the classifier once, hands off to
// the application layer and prints what comes back. Nothing
// here touches the model or the CSV files directly.

pub mod commands;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use commands::{ClassifyArgs, Commands, RunArgs};

use crate::application::{
    classifier::{load_classifier, ClassifierConfig},
    corpus_run::{CorpusRun, RunConfig},
};
use crate::domain::classification::ClassificationInput;

#[derive(Parser, Debug)]
#[command(
    name = "stance-stream",
    version,
    about = "Classify the stance of every sentence in a large argument corpus."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args)      => run_corpus(args),
            Commands::Classify(args) => run_classify(args),
        }
    }
}

fn run_corpus(args: RunArgs) -> Result<()> {
    let config: RunConfig = args.into();
    config.validate().context("invalid run parameters")?;

    let classifier = load_classifier(&config.classifier).context("cannot build classifier")?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            if stop.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            eprintln!("Stopping after the current group (press Ctrl-C again to abort now)");
        })
        .context("cannot install Ctrl-C handler")?;
    }

    let summary = CorpusRun::new(&classifier, config)
        .with_stop_flag(stop)
        .execute()
        .context("corpus run failed")?;

    println!(
        "Done: {} rows written from {} groups ({} skipped, {} malformed).",
        summary.rows_written,
        summary.groups_processed,
        summary.groups_skipped,
        summary.groups_malformed,
    );
    if summary.stopped_early {
        println!("Stopped early. Resume with --resume-offset {}", summary.next_offset);
    }
    Ok(())
}

fn run_classify(args: ClassifyArgs) -> Result<()> {
    let config: ClassifierConfig = args.model.into();
    let classifier = load_classifier(&config).context("cannot build classifier")?;

    let inputs: Vec<ClassificationInput> = args
        .sentences
        .iter()
        .map(|s| ClassificationInput::new(args.topic.clone(), s.clone()))
        .collect();

    for result in classifier.classify_batch(&inputs)? {
        println!("{result}");
    }
    Ok(())
}
