//! Distributed matrix multiplication implementation.

use std::fmt;
use std::time::{Duration, Instant};

use collective::tcp::{self, LaunchEnv};
use collective::{Communicator, RankContext, local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::RunConfig;
use crate::partition::{self, PartitionPlan};
use crate::verify::{self, Mismatch, Verdict};
use crate::{Error, Matrix, worker};

/// Rank that owns the operands and receives the result.
pub const ROOT: usize = 0;

/// The two N×N inputs, held only by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Operands {
    pub a: Matrix,
    pub b: Matrix,
}

impl Operands {
    pub fn new(a: Matrix, b: Matrix) -> Self {
        Self { a, b }
    }

    fn check(&self, n: usize) -> Result<(), Error> {
        for m in [&self.a, &self.b] {
            if m.rows() != n || !m.is_square() {
                return Err(Error::OperandSize {
                    n,
                    rows: m.rows(),
                    cols: m.cols(),
                });
            }
        }
        Ok(())
    }
}

/// Generates A then B with integer entries in `[0, 10)` from a seeded RNG.
pub fn generate_operands(n: usize, seed: u64) -> Operands {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fill = || {
        let mut m = Matrix::zeros(n, n);
        for v in m.as_mut_slice() {
            *v = rng.gen_range(0..10) as f64;
        }
        m
    };
    let a = fill();
    let b = fill();
    Operands { a, b }
}

/// The gathered result at the coordinator.
#[derive(Debug, Clone)]
pub struct Product {
    pub c: Matrix,
    /// Wall time between the barrier before local compute and the barrier
    /// after the gather.
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Passed,
    Skipped,
    Failed { at: Mismatch, expected: Matrix },
}

/// Everything the coordinator reports after a run.
#[derive(Debug, Clone)]
pub struct Report {
    pub n: usize,
    pub processes: usize,
    pub elapsed: Duration,
    pub display: bool,
    pub operands: Operands,
    pub c: Matrix,
    pub verification: Verification,
}

impl Report {
    pub fn is_verified(&self) -> bool {
        self.verification == Verification::Passed
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "N={}, processes={}, time={:.6} sec",
            self.n,
            self.processes,
            self.elapsed.as_secs_f64()
        )?;
        writeln!(f)?;

        if self.display {
            writeln!(f, "Matrix A:\n{}\n", self.operands.a)?;
            writeln!(f, "Matrix B:\n{}\n", self.operands.b)?;
            writeln!(f, "Resultant Matrix C = A x B:\n{}\n", self.c)?;
        }

        match &self.verification {
            Verification::Passed => {
                writeln!(f, "Verification: OK (distributed result matches A x B)")
            }
            Verification::Skipped => writeln!(f, "Verification: skipped"),
            Verification::Failed { at, expected } => {
                writeln!(f, "ERROR: Matrix multiplication result mismatch! ({})", at)?;
                if self.display {
                    writeln!(f, "\nExpected (A x B):\n{}", expected)?;
                }
                Ok(())
            }
        }
    }
}

/// One rank's view of a distributed multiplication.
///
/// Every rank constructs a `MatrixMul` over its own communicator and calls
/// the same methods in the same order; rank [`ROOT`] additionally acts as the
/// coordinator.
pub struct MatrixMul<C> {
    comm: C,
    ctx: RankContext,
    config: RunConfig,
}

impl<C: Communicator> MatrixMul<C> {
    pub fn new(comm: C, config: RunConfig) -> Self {
        let ctx = comm.context();
        Self { comm, ctx, config }
    }

    pub fn context(&self) -> RankContext {
        self.ctx
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Row assignment of this run, identical on every rank.
    pub fn plan(&self) -> Result<PartitionPlan, Error> {
        partition::plan(self.config.n, self.ctx.size())
    }

    /// Runs the broadcast, scatter, compute and gather protocol.
    ///
    /// The root must pass the operands and gets back the full product; every
    /// other rank passes `None` and gets back `None`.
    pub async fn multiply(&self, operands: Option<&Operands>) -> Result<Option<Product>, Error> {
        let n = self.config.n;
        let rank = self.ctx.rank();
        let operands = if self.ctx.is_root(ROOT) {
            let operands = operands.ok_or(Error::MissingOperands(rank))?;
            operands.check(n)?;
            Some(operands)
        } else {
            None
        };

        let mut b = match operands {
            Some(operands) => operands.b.clone(),
            None => Matrix::zeros(n, n),
        };
        self.comm.broadcast(b.as_mut_slice(), ROOT).await?;
        debug!("received B");

        let plan = self.plan()?;
        let mine = plan.block(rank);
        let counts = plan.element_counts(n);
        let offsets = plan.element_offsets(n);

        let mut block = Matrix::zeros(mine.count, n);
        self.comm
            .scatter_variable(
                operands.map(|o| o.a.as_slice()),
                &counts,
                &offsets,
                block.as_mut_slice(),
                ROOT,
            )
            .await?;
        debug!(start = mine.start, rows = mine.count, "received row block");

        self.comm.barrier().await?;
        let started = Instant::now();

        let local = worker::multiply_block(self.config.compute, &block, &b)?;
        drop(block);

        let mut c = operands.map(|_| Matrix::zeros(n, n));
        self.comm
            .gather_variable(
                local.as_slice(),
                c.as_mut().map(Matrix::as_mut_slice),
                &counts,
                &offsets,
                ROOT,
            )
            .await?;

        self.comm.barrier().await?;
        let elapsed = started.elapsed();

        Ok(c.map(|c| Product { c, elapsed }))
    }

    /// Generates operands, multiplies, verifies and reports.
    ///
    /// The coordinator prints the report to stdout and returns it; a failed
    /// verification is returned as [`Error::VerificationFailed`] after the
    /// report has been printed. Other ranks return `None`.
    pub async fn run(&self) -> Result<Option<Report>, Error> {
        let span = info_span!("rank", rank = self.ctx.rank(), size = self.ctx.size());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<Option<Report>, Error> {
        let n = self.config.n;
        let operands = if self.ctx.is_root(ROOT) {
            info!(n, seed = self.config.seed, "generating operands");
            Some(generate_operands(n, self.config.seed))
        } else {
            None
        };

        let product = self.multiply(operands.as_ref()).await?;
        let (Some(product), Some(operands)) = (product, operands) else {
            return Ok(None);
        };
        info!(elapsed = ?product.elapsed, "gathered result");

        let verification = if self.config.should_verify() {
            match verify::compare(&operands.a, &operands.b, &product.c)? {
                Verdict::Match => Verification::Passed,
                Verdict::Mismatch { at, expected } => Verification::Failed { at, expected },
            }
        } else {
            Verification::Skipped
        };

        let report = Report {
            n,
            processes: self.ctx.size(),
            elapsed: product.elapsed,
            display: self.config.should_display(),
            operands,
            c: product.c,
            verification,
        };
        print!("{}", report);

        if let Verification::Failed { at, .. } = &report.verification {
            warn!(%at, "verification failed");
            return Err(Error::VerificationFailed(*at));
        }
        Ok(Some(report))
    }
}

/// Runs every rank as a task of the current runtime.
///
/// Returns the coordinator's report, or the first error in rank order.
pub async fn run_in_process(procs: usize, config: RunConfig) -> Result<Report, Error> {
    if procs == 0 {
        return Err(Error::DegenerateSize(procs));
    }
    let handles: Vec<_> = local::group(procs)?
        .into_iter()
        .map(|comm| {
            let config = config.clone();
            tokio::spawn(async move { MatrixMul::new(comm, config).run().await })
        })
        .collect();

    let mut report = None;
    let mut first_error = None;
    for handle in handles {
        match handle.await? {
            Ok(Some(r)) => report = Some(r),
            Ok(None) => {}
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match (first_error, report) {
        (Some(e), _) => Err(e),
        (None, Some(report)) => Ok(report),
        (None, None) => Err(Error::MissingOperands(ROOT)),
    }
}

/// Runs this process as one rank of a launcher-started TCP group.
pub async fn run_tcp(config: RunConfig) -> Result<Option<Report>, Error> {
    let env = LaunchEnv::from_env()?;
    let comm = tcp::connect(&env).await?;
    MatrixMul::new(comm, config).run().await
}
