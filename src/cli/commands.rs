// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands:
//   run      — classify every sentence of a grouped corpus CSV
//   classify — classify a handful of sentences against one topic

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::classifier::ClassifierConfig;
use crate::application::corpus_run::{MalformedPolicy, RunConfig};
use crate::data::corpus_reader::CorpusColumns;
use crate::ml::engine::DevicePreference;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a corpus CSV through the classifier into an output CSV
    Run(RunArgs),

    /// Classify one or more sentences against a topic
    Classify(ClassifyArgs),
}

/// Flags shared by every command that loads the model.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Directory holding tokenizer.json, manifest.json and model.mpk.gz
    #[arg(long, default_value = "bert_output/argument_classification_ukp_all_data")]
    pub model_dir: PathBuf,

    /// Where to run the model
    #[arg(long, value_enum, default_value_t = DevicePreference::Auto)]
    pub device: DevicePreference,

    /// Token budget per (topic, sentence) pair, including [CLS]/[SEP]
    #[arg(long, default_value_t = 64)]
    pub max_seq_length: usize,

    /// Pairs sent to the model in one forward pass
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,
}

impl From<ModelArgs> for ClassifierConfig {
    fn from(a: ModelArgs) -> Self {
        ClassifierConfig {
            model_dir:      a.model_dir,
            device:         a.device,
            max_seq_length: a.max_seq_length,
            batch_size:     a.batch_size,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input CSV with one topic and its serialised sentences per row
    #[arg(long, default_value = "args_processed.csv")]
    pub input: PathBuf,

    /// Output CSV (sent_id, topic_text, predicted_stance, sent_text)
    #[arg(long, default_value = "args_with_bert_stance.csv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Skip this many input rows before classifying (overrides --checkpoint)
    #[arg(long)]
    pub resume_offset: Option<usize>,

    /// Expected number of input rows, for percent and runtime estimates
    #[arg(long)]
    pub total_groups: Option<usize>,

    /// Count input rows before starting when --total-groups is not given
    #[arg(long)]
    pub count_groups: bool,

    /// Print a progress block every N input rows
    #[arg(long, default_value_t = 1000)]
    pub progress_every: usize,

    /// What to do with a row whose sentence list can't be decoded
    #[arg(long, value_enum, default_value_t = MalformedPolicy::Abort)]
    pub on_malformed: MalformedPolicy,

    /// File recording how many rows are done; used to resume automatically.
    /// It is saved after a group's rows are flushed, so a crash between the
    /// two writes that group again on resume
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Column holding the group identifier
    #[arg(long, default_value = "id")]
    pub group_column: String,

    /// Column holding the topic text
    #[arg(long, default_value = "conclusion")]
    pub topic_column: String,

    /// Column holding the serialised sentence list
    #[arg(long, default_value = "sentences")]
    pub sentences_column: String,
}

impl From<RunArgs> for RunConfig {
    fn from(a: RunArgs) -> Self {
        RunConfig {
            input:          a.input,
            output:         a.output,
            classifier:     a.model.into(),
            resume_offset:  a.resume_offset,
            total_groups:   a.total_groups,
            count_groups:   a.count_groups,
            progress_every: a.progress_every,
            on_malformed:   a.on_malformed,
            checkpoint:     a.checkpoint,
            columns:        CorpusColumns {
                group:     a.group_column,
                topic:     a.topic_column,
                sentences: a.sentences_column,
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Topic the sentences are judged against
    #[arg(long)]
    pub topic: String,

    /// Sentence to classify; repeat for several
    #[arg(long = "sentence", required = true)]
    pub sentences: Vec<String>,

    #[command(flatten)]
    pub model: ModelArgs,
}
