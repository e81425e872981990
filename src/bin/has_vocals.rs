use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use has_vocals::config::AppConfig;
use has_vocals::containers::{
    discover_files, preprocess_corpus, select_random, FrameContainer, LabelManifest,
    LabeledFrameFile, AUDIO_EXTENSIONS, EXAMPLE_EXTENSION,
};
use has_vocals::error::PipelineError;
use has_vocals::network::MultiLayerPerceptron;
use has_vocals::training::{split_corpus, BackpropTrainer, ConsoleProgress};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(
    name = "has_vocals",
    about = "Train a neural network that detects vocals in audio recordings"
)]
struct Cli {
    /// Directory of labeled-example (.mfc) files; preprocessing writes here
    temp_dir: PathBuf,
    /// Recurse into subdirectories when looking for audio files
    #[arg(short = 'r', short_alias = 'R')]
    recurse: bool,
    /// Maximum number of examples (files) to use, picked at random
    #[arg(short = 'n', value_name = "N")]
    max_examples: Option<usize>,
    /// Maximum number of training epochs
    #[arg(short = 'm', value_name = "N")]
    max_epochs: Option<usize>,
    /// Stop once the test error changes by less than this between epochs
    #[arg(short = 'e', value_name = "ERROR")]
    min_delta_error: Option<f64>,
    /// Maximum number of worker threads
    #[arg(short = 't', value_name = "N")]
    max_threads: Option<usize>,
    /// Preprocess labeled audio before training
    #[arg(short = 'd', num_args = 2, value_names = ["DATA_CSV", "AUDIO_DIR"])]
    data: Option<Vec<PathBuf>>,
    /// JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log at DEBUG level
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    /// Load the configuration file (if any) and apply flag overrides
    fn app_config(&self) -> AppConfig {
        let mut config = self
            .config
            .as_ref()
            .map(AppConfig::load_from_file)
            .unwrap_or_default();
        if let Some(max_epochs) = self.max_epochs {
            config.training.max_epochs = max_epochs;
        }
        if let Some(min_delta_error) = self.min_delta_error {
            config.training.min_delta_error = min_delta_error;
        }
        if let Some(max_threads) = self.max_threads {
            config.training.max_threads = max_threads;
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("has_vocals error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.app_config();
    let max_examples = cli.max_examples.unwrap_or(usize::MAX);
    let mut rng = match config.network.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let examples = match cli.data.as_deref() {
        Some([data_csv, audio_dir]) => {
            let audio = preprocessing_inputs(data_csv, audio_dir, cli.recurse)?;
            let manifest = LabelManifest::from_path(data_csv)
                .with_context(|| format!("reading labels from {}", data_csv.display()))?;
            let audio_files = select_random(audio, max_examples, &mut rng);
            preprocess_corpus(
                &manifest,
                &audio_files,
                &cli.temp_dir,
                &config.window,
                &config.features,
            )
            .with_context(|| format!("preprocessing audio into {}", cli.temp_dir.display()))?
        }
        Some(_) => bail!("-d takes exactly two values: <DATA_CSV> <AUDIO_DIR>"),
        None => {
            let files = discover_files(&cli.temp_dir, &[EXAMPLE_EXTENSION], false)
                .with_context(|| format!("listing examples in {}", cli.temp_dir.display()))?;
            select_random(files, max_examples, &mut rng)
        }
    };
    if examples.is_empty() {
        bail!("no labeled examples found in {}", cli.temp_dir.display());
    }
    tracing::info!("[Main] Using {} example files", examples.len());

    let containers: Vec<Box<dyn FrameContainer>> = examples
        .into_iter()
        .map(|path| Box::new(LabeledFrameFile::new(path)) as Box<dyn FrameContainer>)
        .collect();
    let (training, testing) = split_corpus(containers, config.training.training_fraction);

    let network = MultiLayerPerceptron::from_config(&config.network)?;
    let mut trainer = BackpropTrainer::new(network, config.training.clone());
    if std::io::stderr().is_terminal() {
        trainer = trainer.with_observer(ConsoleProgress::new(std::io::stderr()));
    }

    let summary = trainer.train(training, testing).context("training the network")?;
    tracing::debug!("[Main] Your network:\n{}", trainer.network());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Validate the preprocessing arguments and list the audio files
fn preprocessing_inputs(data_csv: &Path, audio_dir: &Path, recurse: bool) -> Result<Vec<PathBuf>> {
    let is_csv = data_csv
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(PipelineError::malformed(format!(
            "label file must be a .csv file: {}",
            data_csv.display()
        ))
        .into());
    }
    if !audio_dir.is_dir() {
        return Err(PipelineError::malformed(format!(
            "audio path must be a directory: {}",
            audio_dir.display()
        ))
        .into());
    }
    Ok(discover_files(audio_dir, AUDIO_EXTENSIONS, recurse)?)
}
