#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use bidfloor::config::RunConfig;
use bidfloor::data::{load_evaluation_table, load_training_table, write_summary};
use bidfloor::{BootstrapProgressObserver, ModelSpec, NoopProgress, estimate_with_progress};
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

#[derive(Args)]
pub struct EstimateArgs {
    /// Training CSV with the target column and feature columns
    pub training_data: PathBuf,

    /// Evaluation CSV containing the training feature columns
    pub evaluation_data: PathBuf,

    /// Run configuration (TOML); defaults are used when omitted
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Where to write the per-row mean, lower and upper columns
    #[arg(long, short, default_value = "predictions.csv")]
    pub output: PathBuf,

    /// Number of bootstrap rounds (overrides the config file)
    #[arg(long, value_name = "N")]
    pub rounds: Option<usize>,

    /// Two-sided confidence level in (0, 1) (overrides the config file)
    #[arg(long, value_name = "LEVEL")]
    pub confidence_level: Option<f64>,

    /// Base seed for reproducible runs (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads for parallel rounds (overrides the config file)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Parser)]
#[command(
    name = "bidfloor",
    version,
    about = "Bootstrap confidence intervals for minimum bid ratio predictions"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit bootstrap models and write interval predictions for the evaluation rows
    #[command(about = "Estimate bid-floor ratios with confidence intervals (outputs: predictions.csv)")]
    Estimate(EstimateArgs),

    /// Print the default run configuration
    #[command(about = "Print or save the default TOML run configuration")]
    Config {
        /// Save the configuration to this path instead of printing it
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(model: &ModelSpec) -> Self {
        let draw_target = if std::io::stderr().is_terminal() {
            ProgressDrawTarget::stderr_with_hz(20)
        } else {
            ProgressDrawTarget::hidden()
        };
        Self::with_draw_target(model, draw_target)
    }

    fn with_draw_target(model: &ModelSpec, draw_target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, draw_target);
        if let Ok(style) = ProgressStyle::with_template(
            "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        bar.set_message(format!("bootstrap rounds ({})", model.describe()));
        Self { bar }
    }
}

impl BootstrapProgressObserver for BarProgress {
    fn on_start(&self, total_rounds: usize) {
        self.bar.set_length(total_rounds as u64);
    }

    fn on_round_finish(&self, _round: usize) {
        self.bar.inc(1);
    }

    fn on_finish(&self) {
        self.bar.finish_and_clear();
    }
}

// A failed estimate never reaches `on_finish`; the bar must not stay drawn above the error.
impl Drop for BarProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Estimate(args)) => run_estimate(args),
        Some(Commands::Config { output }) => run_config(output),
        None => {
            let _ = Cli::command().print_help();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_estimate(args: EstimateArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let settings = &mut config.bootstrap;
    if let Some(rounds) = args.rounds {
        settings.rounds = rounds;
    }
    if let Some(level) = args.confidence_level {
        settings.confidence_level = level;
    }
    if let Some(seed) = args.seed {
        settings.seed = Some(seed);
    }
    if let Some(threads) = args.threads {
        settings.threads = Some(threads);
    }

    let threads = settings.threads.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    let training = load_training_table(&args.training_data, &config.data)?;
    let evaluation =
        load_evaluation_table(&args.evaluation_data, &config.data, &training.feature_names)?;

    let bootstrap = config.bootstrap.to_config();
    log::info!("Fitting {} per round on {} threads.", config.model.describe(), threads);

    let summary = if args.no_progress {
        estimate_with_progress(
            training.features.view(),
            training.targets.view(),
            evaluation.features.view(),
            &config.model,
            &bootstrap,
            &NoopProgress,
        )?
    } else {
        estimate_with_progress(
            training.features.view(),
            training.targets.view(),
            evaluation.features.view(),
            &config.model,
            &bootstrap,
            &BarProgress::new(&config.model),
        )?
    };

    write_summary(&args.output, evaluation.ids.as_ref(), &summary)?;
    println!(
        "Wrote {} interval predictions ({} rounds, level {}) to {}",
        summary.len(),
        summary.rounds,
        summary.confidence_level,
        args.output.display()
    );
    Ok(())
}

fn run_config(output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let config = RunConfig::default();
    match output {
        Some(path) => {
            config.save(&path)?;
            println!("Saved default configuration to {}", path.display());
        }
        None => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}
