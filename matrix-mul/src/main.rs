use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use collective::tcp::LaunchEnv;
use matrix_mul::config::{DEFAULT_DISPLAY_THRESHOLD, DEFAULT_N, DEFAULT_SEED, DEFAULT_VERIFY_LIMIT};
use matrix_mul::{ComputeMode, RunConfig, VerifyMode, run_in_process, run_tcp};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// All ranks as tasks of this process.
    Local,
    /// This process is one rank of a launcher-started group.
    Tcp,
}

#[derive(Parser)]
#[command(name = "matrix-mul")]
#[command(about = "Dense N x N matrix multiplication by row-block decomposition")]
#[command(version)]
struct Cli {
    /// Matrix dimension (N x N).
    #[arg(short, long, default_value_t = DEFAULT_N)]
    n: usize,
    /// Seed of the operand generator.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// Print A, B and C when N is at most this value.
    #[arg(long, default_value_t = DEFAULT_DISPLAY_THRESHOLD)]
    display_threshold: usize,
    /// When to check the result against a sequential product.
    #[arg(long, value_enum, default_value_t = VerifyMode::Auto)]
    verify: VerifyMode,
    /// Largest N verified in `auto` mode.
    #[arg(long, default_value_t = DEFAULT_VERIFY_LIMIT)]
    verify_limit: usize,
    /// Spread local rows over all cores.
    #[arg(long)]
    parallel: bool,
    /// Defaults to `tcp` when started by a launcher, `local` otherwise.
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,
    /// Number of in-process ranks for the `local` transport.
    #[arg(short, long, default_value_t = 1)]
    procs: usize,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            n: self.n,
            seed: self.seed,
            display_threshold: self.display_threshold,
            verify: self.verify,
            verify_limit: self.verify_limit,
            compute: if self.parallel {
                ComputeMode::Parallel
            } else {
                ComputeMode::Sequential
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = cli.run_config();
    let transport = cli.transport.unwrap_or(if LaunchEnv::is_present() {
        TransportKind::Tcp
    } else {
        TransportKind::Local
    });

    let result = match transport {
        TransportKind::Local => run_in_process(cli.procs, config).await.map(drop),
        TransportKind::Tcp => run_tcp(config).await.map(drop),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
