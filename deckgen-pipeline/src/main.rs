//! deckgen - vocabulary deck generator
//!
//! Runs the enrichment stages for one job against the local language model,
//! speech command, ffmpeg and the dictionary sites, then packages decks.
//! Interrupted runs resume from the last checkpoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deckgen_common::config::{load_toml_config, resolve_root_folder, TomlConfig};
use deckgen_common::logging::init_tracing;
use deckgen_common::RootLayout;
use deckgen_pipeline::collaborators::{
    CommandSpeech, ConjugationFetcher, DeclensionFetcher, FfmpegTranscoder, OllamaModel,
    SqliteDeckWriter,
};
use deckgen_pipeline::stages::DeckSplit;
use deckgen_pipeline::throttle::{DelayPolicy, RetryPolicy};
use deckgen_pipeline::{
    classify, Collaborators, JobSettings, PipelineController, RunOptions, SentenceLayout,
    SourceList, StageKind,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for deckgen
#[derive(Parser, Debug)]
#[command(name = "deckgen")]
#[command(about = "Checkpointed vocabulary deck generator")]
#[command(version)]
struct Args {
    /// Root folder for stores, media and decks
    #[arg(long, env = "DECKGEN_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Bootstrap configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run pipeline stages for a job
    Run(RunArgs),

    /// Print the word type inferred from a word and its translation
    Classify {
        #[arg(long)]
        word: String,
        #[arg(long)]
        translation: String,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Job name; names the store, media folder and decks
    #[arg(long)]
    job: String,

    /// Source dataset (.json, .tsv, .txt or .csv)
    #[arg(long)]
    source: PathBuf,

    /// one-sentence or two-sentence (default from config)
    #[arg(long)]
    layout: Option<String>,

    /// Comma-separated stages (default: all)
    #[arg(long, value_delimiter = ',')]
    stages: Vec<String>,

    /// Recompute items that are already complete
    #[arg(long)]
    force: bool,

    /// Package rows even when required columns are empty
    #[arg(long)]
    force_all: bool,

    /// Cards per packaged sub-deck
    #[arg(long)]
    cards_per_deck: Option<usize>,

    /// Number of sub-decks
    #[arg(long)]
    decks: Option<usize>,

    /// First source item (inclusive)
    #[arg(long)]
    from: Option<usize>,

    /// Last source item (exclusive)
    #[arg(long)]
    to: Option<usize>,
}

fn collaborators(config: &TomlConfig, root: &RootLayout) -> Result<Collaborators> {
    let retry = RetryPolicy::from(&config.retry);

    let speech: BTreeMap<_, _> = ["de", "en"]
        .into_iter()
        .filter_map(|lang| config.speech_command(lang).map(|cmd| (lang.to_string(), cmd)))
        .collect();

    Ok(Collaborators {
        model: Box::new(OllamaModel::new(&config.llm, retry).context("Failed to build language model client")?),
        speech: Box::new(CommandSpeech::new(speech)),
        transcoder: Box::new(FfmpegTranscoder::new(&config.transcoder)),
        conjugations: Box::new(
            ConjugationFetcher::new(&config.grammar, retry).context("Failed to build conjugation client")?,
        ),
        declensions: Box::new(
            DeclensionFetcher::new(&config.grammar, retry).context("Failed to build declension client")?,
        ),
        deck_writer: Box::new(SqliteDeckWriter::new(root.decks_dir())),
    })
}

async fn run(args: RunArgs, config: TomlConfig, root: RootLayout) -> Result<()> {
    let layout: SentenceLayout = args
        .layout
        .as_deref()
        .unwrap_or(&config.pipeline.layout)
        .parse()?;

    let stages = if args.stages.is_empty() {
        StageKind::ALL.to_vec()
    } else {
        args.stages
            .iter()
            .map(|s| s.parse::<StageKind>())
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    let mut items = SourceList::from_path(&args.source)
        .with_context(|| format!("Failed to load source {}", args.source.display()))?;
    if args.from.is_some() || args.to.is_some() {
        items = items.slice(args.from.unwrap_or(0), args.to.unwrap_or(usize::MAX));
    }

    let settings = JobSettings {
        job: args.job,
        layout,
        run: RunOptions {
            force: args.force,
            checkpoint_interval: config.pipeline.checkpoint_interval,
        },
        verb_delay: DelayPolicy::verb_from_config(&config.grammar),
        noun_delay: DelayPolicy::noun_from_config(&config.grammar),
        split: DeckSplit::from_options(
            args.cards_per_deck.or(config.pipeline.cards_per_deck),
            args.decks.or(config.pipeline.deck_count),
        ),
        force_all: args.force_all,
    };

    let collaborators = collaborators(&config, &root)?;
    let mut controller = PipelineController::open(settings, &root, items, collaborators)
        .context("Failed to open pipeline")?;

    let summary = controller.run(&stages).await?;

    for (stage, report) in &summary.stages {
        info!(
            "{}: {} upserted, {} skipped, {} failed, {} pending",
            stage, report.upserted, report.skipped, report.failed, report.pending
        );
    }
    if let Some(package) = &summary.package {
        for deck in &package.decks {
            info!("Deck written: {}", deck.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_toml_config(args.config.as_deref())?;
    init_tracing(&config.logging)?;

    match args.command {
        Command::Classify { word, translation } => {
            println!("{}", classify(&word, &translation));
            Ok(())
        }
        Command::Run(run_args) => {
            let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
            info!("Root folder: {}", root_folder.display());
            info!("Version: {}", env!("CARGO_PKG_VERSION"));
            run(run_args, config, RootLayout::new(root_folder)).await
        }
    }
}
