use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use collective::tcp::{PEERS_VAR, RANK_VAR, SIZE_VAR};
use tokio::process::Command;
use tracing::{info, warn};

/// Starts `procs` copies of a program, one per rank, on consecutive
/// loopback ports.
///
/// ```sh
/// matmul-launch -n 4 target/release/matrix-mul --n 500
/// ```
#[derive(Parser)]
#[command(name = "matmul-launch")]
#[command(about = "Start one process per rank of a TCP collective group")]
#[command(version)]
struct Cli {
    /// Number of ranks to start.
    #[arg(short = 'n', long = "procs", default_value_t = 2)]
    procs: usize,
    /// Address every rank listens on.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,
    /// Port of rank 0; rank r listens on `base_port + r`.
    #[arg(long, default_value_t = 19000)]
    base_port: u16,
    /// Program run by every rank.
    program: PathBuf,
    /// Arguments passed unchanged to every rank.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn peer_list(host: IpAddr, base_port: u16, procs: usize) -> Result<Vec<SocketAddr>, String> {
    if procs == 0 {
        return Err("degenerate process count 0: at least one process is required".to_string());
    }
    (0..procs)
        .map(|rank| {
            u16::try_from(base_port as usize + rank)
                .map(|port| SocketAddr::new(host, port))
                .map_err(|_| format!("rank {} has no port above {}", rank, base_port))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let peers = peer_list(cli.host, cli.base_port, cli.procs)?;
    let peers_var = peers
        .iter()
        .map(SocketAddr::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let mut children = Vec::with_capacity(cli.procs);
    for rank in 0..cli.procs {
        let child = Command::new(&cli.program)
            .args(&cli.args)
            .env(RANK_VAR, rank.to_string())
            .env(SIZE_VAR, cli.procs.to_string())
            .env(PEERS_VAR, &peers_var)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("spawn rank {}: {}", rank, e))?;
        children.push(child);
    }
    info!(procs = cli.procs, program = %cli.program.display(), "ranks started");

    let mut failed = 0;
    for (rank, mut child) in children.into_iter().enumerate() {
        let status = child.wait().await?;
        if !status.success() {
            warn!(rank, %status, "rank exited with failure");
            failed += 1;
        }
    }

    if failed > 0 {
        warn!(failed, "run failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_are_consecutive() {
        let host: IpAddr = "127.0.0.1".parse().unwrap();
        let peers = peer_list(host, 19000, 3).unwrap();
        assert_eq!(
            peers,
            vec![
                "127.0.0.1:19000".parse::<SocketAddr>().unwrap(),
                "127.0.0.1:19001".parse().unwrap(),
                "127.0.0.1:19002".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn zero_procs_is_rejected() {
        let host: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(peer_list(host, 19000, 0).is_err());
    }

    #[test]
    fn port_range_overflow_is_rejected() {
        let host: IpAddr = "::1".parse().unwrap();
        assert!(peer_list(host, u16::MAX, 2).is_err());
        assert_eq!(peer_list(host, u16::MAX, 1).unwrap().len(), 1);
    }

    #[test]
    fn trailing_arguments_reach_the_program() {
        let cli = Cli::try_parse_from(["matmul-launch", "-n", "3", "./matrix-mul", "--n", "50", "--parallel"])
            .unwrap();
        assert_eq!(cli.procs, 3);
        assert_eq!(cli.program, PathBuf::from("./matrix-mul"));
        assert_eq!(cli.args, vec!["--n", "50", "--parallel"]);
    }
}
