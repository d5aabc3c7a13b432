//! mln CLI: ground Markov Logic Networks and run inference over them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use markov_logic::config::MlnConfig;
use markov_logic::engine::{Engine, NetworkInfo};
use markov_logic::output::{OutputFormat, write_map, write_marginals};
use markov_logic::problem::{Problem, companion_config};

#[derive(Parser)]
#[command(name = "mln", version, about = "Markov Logic Network grounding and inference")]
struct Cli {
    /// TOML configuration. Defaults to `<problem>.toml` when that file exists.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Random seed for both solvers.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Worker threads for grounding and sampling.
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ground a problem and print network statistics.
    Ground {
        /// Problem file (JSON).
        problem: PathBuf,

        /// Also print every ground constraint.
        #[arg(long)]
        constraints: bool,
    },

    /// Estimate marginal probabilities of the query atoms with MC-SAT.
    Infer {
        /// Problem file (JSON).
        problem: PathBuf,

        /// Samples per chain.
        #[arg(long)]
        samples: Option<usize>,

        /// Independent chains.
        #[arg(long)]
        chains: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Search a most probable state with MaxWalkSAT.
    Map {
        /// Problem file (JSON).
        problem: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Score inferred query atoms against an annotation problem.
    Eval {
        /// Problem file (JSON).
        problem: PathBuf,

        /// Problem file whose evidence holds the ground truth.
        #[arg(long)]
        annotation: PathBuf,

        /// Marginal at or above which an atom counts as recognised.
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// Evaluate the MaxWalkSAT state instead of MC-SAT marginals.
        #[arg(long)]
        map: bool,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Write results to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Result format.
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Report every ground atom, not only the query atoms.
    #[arg(long)]
    all_atoms: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Ground {
            problem,
            constraints,
        } => {
            let engine = open(&cli, problem, |_| {})?;
            let mrf = engine.ground()?;
            print!("{}", NetworkInfo::of(&mrf));
            if *constraints {
                for constraint in mrf.constraints() {
                    println!("{constraint}");
                }
            }
        }

        Commands::Infer {
            problem,
            samples,
            chains,
            output,
        } => {
            let engine = open(&cli, problem, |config| {
                if let Some(samples) = samples {
                    config.mcsat.samples = *samples;
                }
                if let Some(chains) = chains {
                    config.mcsat.chains = *chains;
                }
                apply_output(config, output);
            })?;
            let (mrf, stats) = engine.marginals()?;
            if stats.non_converged > 0 {
                eprintln!(
                    "warning: {} of {} samples did not converge",
                    stats.non_converged, stats.samples
                );
            }
            let sink = sink(output.output.as_deref())?;
            write_marginals(&mrf, sink, &engine.config().output)?;
        }

        Commands::Map { problem, output } => {
            let engine = open(&cli, problem, |config| apply_output(config, output))?;
            let (mrf, stats) = engine.map_state()?;
            eprintln!(
                "best cost: {} hard violated, {:.4} soft",
                stats.best_cost.hard, stats.best_cost.soft
            );
            let sink = sink(output.output.as_deref())?;
            write_map(&mrf, sink, &engine.config().output)?;
        }

        Commands::Eval {
            problem,
            annotation,
            threshold,
            map,
        } => {
            let engine = open(&cli, problem, |_| {})?;
            let (mrf, _) = if *map {
                engine.map_state()?
            } else {
                engine.marginals()?
            };
            let annotation = Problem::load(annotation)?;
            let evaluation = engine.evaluate(&mrf, &annotation, *threshold)?;
            for (signature, confusion) in &evaluation.by_signature {
                println!("{:<24} {confusion}", signature.to_string());
            }
            println!("{:<24} {}", "overall", evaluation.overall);
        }
    }

    Ok(())
}

/// Load the problem and its configuration, then apply CLI overrides.
fn open(cli: &Cli, problem: &Path, overrides: impl FnOnce(&mut MlnConfig)) -> Result<Engine> {
    let problem_data = Problem::load(problem)?;
    let companion = companion_config(problem);
    let config_path = cli
        .config
        .clone()
        .or_else(|| companion.exists().then_some(companion));
    let mut config = match config_path {
        Some(path) => MlnConfig::load(&path)?,
        None => MlnConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    overrides(&mut config);
    Ok(Engine::new(problem_data, config)?)
}

fn apply_output(config: &mut MlnConfig, args: &OutputArgs) {
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if args.all_atoms {
        config.output.all_atoms = true;
    }
}

fn sink(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path).into_diagnostic()?)),
        None => Box::new(std::io::stdout().lock()),
    })
}
