use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use distknn::prelude::*;
use log::info;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "distknn", version, about = "Distributed k-NN rating prediction")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Predict the target rating for a user from a rating matrix.
    Predict(PredictArgs),

    /// Serve one worker rank over stdin/stdout. Launched by `predict --transport process`.
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        rank: usize,
    },
}

#[derive(Debug, clap::Args)]
struct PredictArgs {
    /// Rating matrix: `n m` followed by n*m ratings.
    data: PathBuf,

    /// JSON run configuration. Command-line flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Total ranks, including the coordinator.
    #[arg(short = 'p', long)]
    workers: Option<usize>,

    /// How worker ranks are hosted.
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,

    /// Column to predict, 1-based. Defaults to the last column.
    #[arg(long)]
    target_column: Option<usize>,

    /// Number of similar viewers to average. Prompted for when omitted.
    #[arg(short, long)]
    k: Option<usize>,

    /// The user's ratings for the non-target columns, comma separated.
    /// Prompted for when omitted.
    #[arg(short, long)]
    query: Option<String>,

    /// Also print the probability of each rating level in the target column,
    /// over all viewers and given the user's ratings.
    #[arg(long)]
    distribution: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Thread,
    Process,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Thread => TransportKind::Thread,
            TransportArg::Process => TransportKind::Process,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Cmd::Predict(args) => predict_command(args),
        Cmd::Worker { rank } => worker_command(rank),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err((step, err)) => {
            eprintln!("error while {step}: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(default);
    let _ = env_logger::Builder::from_env(env).try_init();
}

type StepResult = std::result::Result<(), (&'static str, KnnError)>;

fn step<T>(
    name: &'static str,
    result: Result<T>,
) -> std::result::Result<T, (&'static str, KnnError)> {
    result.map_err(|e| (name, e))
}

fn worker_command(rank: usize) -> StepResult {
    let mut link = distknn::transport::StreamLink::new(0, io::stdin(), io::stdout());
    step("serving as a worker", run_worker(&mut link, rank))
}

fn predict_command(args: PredictArgs) -> StepResult {
    let mut config = match &args.config {
        Some(path) => step("loading the configuration", RunConfig::from_json_file(path))?,
        None => RunConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(transport) = args.transport {
        config.transport = transport.into();
    }
    if let Some(col) = args.target_column {
        let col = step(
            "reading the target column",
            col.checked_sub(1)
                .ok_or_else(|| KnnError::invalid_argument("target column numbers start at 1")),
        )?;
        config.target_col = Some(col);
    }
    if args.k.is_some() {
        config.k = args.k;
    }

    let matrix = step("loading the dataset", load_matrix(&args.data))?;
    let target_col = step(
        "checking the target column",
        config.resolve_target_col(matrix.num_cols()),
    )?;
    step("checking the configuration", config.validate(matrix.num_rows()))?;

    let stdin = io::stdin();
    let mut prompt = Prompt::new(stdin.lock(), io::stdout());

    let query = match &args.query {
        Some(text) => step("reading the query", QueryVector::parse(text))?,
        None => step("reading the query", prompt.query(matrix.num_cols(), target_col))?,
    };
    step("checking the query", query.check_columns(matrix.num_cols()))?;

    if config.k.is_none() {
        let k = step("reading k", prompt.k())?;
        config.k = Some(k);
    }
    step("checking k", config.validate(matrix.num_rows()))?;

    info!(
        "predicting column {} with {} ranks over {:?}",
        target_col + 1,
        config.workers,
        config.transport
    );
    let report = step("running the prediction", run_prediction(&matrix, &query, &config))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    step("writing the report", write_report(&mut out, &report, &matrix))?;
    if args.distribution {
        let dist = step(
            "computing the rating distribution",
            RatingDistribution::compute(&matrix, target_col, config.scale),
        )?;
        step("writing the report", write_distribution(&mut out, &dist))?;
        let posterior = step(
            "computing the rating posterior",
            RatingPosterior::compute(&matrix, target_col, &query, config.scale),
        )?;
        step("writing the report", write_posterior(&mut out, &posterior))?;
    }
    Ok(())
}

/// Interactive prompts. Answers are read as whitespace-separated tokens, so
/// several answers may share a line.
struct Prompt<R: BufRead, W: Write> {
    input: R,
    output: W,
    pending: VecDeque<String>,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    /// Ask for one rating per non-target column.
    fn query(&mut self, num_cols: usize, target_col: usize) -> Result<QueryVector> {
        let mut values = Vec::with_capacity(num_cols.saturating_sub(1));
        for col in (0..num_cols).filter(|&c| c != target_col) {
            let token = self.ask(&format!("Enter your rating for column {}: ", col + 1))?;
            let value = token.parse::<f64>().map_err(|_| {
                KnnError::invalid_argument(format!(
                    "invalid rating {token:?} for column {}",
                    col + 1
                ))
            })?;
            values.push(value);
        }
        QueryVector::new(values)
    }

    /// Ask for the number of neighbors.
    fn k(&mut self) -> Result<usize> {
        let token = self.ask("Enter the number of similar viewers to report: ")?;
        token
            .parse()
            .map_err(|_| KnnError::invalid_argument(format!("invalid number of viewers {token:?}")))
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(KnnError::invalid_argument(
                    "input ended before all values were entered",
                ));
            }
            self.pending.extend(line.split_whitespace().map(str::to_string));
        }
    }
}
