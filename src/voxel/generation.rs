//! Density generation tasks
//!
//! A chunk fill runs either inline on the caller's thread or on a rayon
//! thread pool. In both cases the voxel buffer moves into the task and comes
//! back with the outcome, so only one party ever touches it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;

use crate::core::{Error, Result};

use super::density::{GenerationListener, GenerationOutcome, SampleRegion, SharedOracle};
use super::voxel::Voxel;

/// Where density generation runs
#[derive(Clone)]
pub enum GenerationScheduler {
    /// On the caller's thread, blocking until the chunk is filled
    Inline,
    /// On a shared worker pool; results are picked up by polling
    Pool(Arc<rayon::ThreadPool>),
}

impl GenerationScheduler {
    /// Inline scheduling for zero threads, a dedicated pool otherwise
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Ok(Self::Inline);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("voxscape-gen-{}", i))
            .build()
            .map_err(|e| Error::Generation(e.to_string()))?;

        log::info!("Density generation on {} worker threads", threads);
        Ok(Self::Pool(Arc::new(pool)))
    }

    /// Whether results arrive asynchronously
    pub fn is_background(&self) -> bool {
        matches!(self, Self::Pool(_))
    }

    /// Start filling `blocks` for `region`.
    pub(crate) fn dispatch(
        &self,
        oracle: &SharedOracle,
        region: SampleRegion,
        blocks: Box<[Voxel]>,
        epoch: u64,
    ) -> Dispatch {
        match self {
            Self::Inline => {
                let token = CancelToken::new();
                Dispatch::Finished(run_generation(oracle, &region, blocks, &token, epoch))
            }
            Self::Pool(pool) => {
                let (tx, rx) = mpsc::sync_channel(1);
                let token = CancelToken::new();
                let task_token = token.clone();
                let oracle = Arc::clone(oracle);

                pool.spawn(move || {
                    let result = run_generation(&oracle, &region, blocks, &task_token, epoch);
                    // Receiver is gone when the chunk was dropped; nothing to report then.
                    let _ = tx.send(result);
                });

                Dispatch::Pending(PendingGeneration { epoch, token, receiver: rx })
            }
        }
    }
}

impl std::fmt::Debug for GenerationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => write!(f, "Inline"),
            Self::Pool(pool) => write!(f, "Pool({} threads)", pool.current_num_threads()),
        }
    }
}

/// Cooperative cancellation flag shared with a running task
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the task to stop at its next progress poll
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Listener that stops the fill once its token is cancelled
struct TokenListener<'a> {
    token: &'a CancelToken,
    epoch: u64,
}

impl GenerationListener for TokenListener<'_> {
    fn progress(&mut self, _fraction: f32) -> bool {
        !self.token.is_cancelled()
    }

    fn completed(&mut self) {
        log::trace!("Generation {} completed", self.epoch);
    }

    fn aborted(&mut self) {
        log::trace!("Generation {} aborted", self.epoch);
    }
}

/// Whether every cell of a chunk is solid, or every cell is air
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Homogeneity {
    pub all_solid: bool,
    pub all_air: bool,
}

impl Homogeneity {
    /// Reduce over `blocks`, stopping once neither property can hold.
    ///
    /// Runs once a fill has completed, in the same task, not inside the fill
    /// loop: oracles may override `fill_chunk`, so the buffer is final only
    /// when it returns. Mixed chunks exit within the first few cells.
    pub fn scan(blocks: &[Voxel]) -> Self {
        let mut result = Self { all_solid: true, all_air: true };
        for voxel in blocks {
            if voxel.is_solid() {
                result.all_air = false;
            } else {
                result.all_solid = false;
            }
            if !result.all_solid && !result.all_air {
                break;
            }
        }
        result
    }
}

/// Buffer and outcome handed back by a finished task
pub(crate) struct GenerationResult {
    pub epoch: u64,
    pub outcome: GenerationOutcome,
    pub blocks: Box<[Voxel]>,
    pub homogeneity: Homogeneity,
}

/// Fill `blocks` for `region`, honouring `token`.
pub(crate) fn run_generation(
    oracle: &SharedOracle,
    region: &SampleRegion,
    mut blocks: Box<[Voxel]>,
    token: &CancelToken,
    epoch: u64,
) -> GenerationResult {
    let mut listener = TokenListener { token, epoch };

    let outcome = if token.is_cancelled() {
        listener.aborted();
        GenerationOutcome::Aborted
    } else {
        oracle.fill_chunk(region, &mut blocks, &mut listener)
    };

    // An oracle may ignore the stop request; a cancelled fill never counts as done.
    let outcome = if token.is_cancelled() { GenerationOutcome::Aborted } else { outcome };

    let homogeneity = match outcome {
        GenerationOutcome::Completed => Homogeneity::scan(&blocks),
        GenerationOutcome::Aborted => Homogeneity::default(),
    };

    GenerationResult { epoch, outcome, blocks, homogeneity }
}

/// How a dispatch resolved
pub(crate) enum Dispatch {
    Finished(GenerationResult),
    Pending(PendingGeneration),
}

/// Poll result for an in-flight task
pub(crate) enum Poll {
    Pending,
    Finished(GenerationResult),
    /// The worker went away without reporting (it panicked)
    Lost,
}

/// Handle to a task running on the worker pool
pub(crate) struct PendingGeneration {
    pub epoch: u64,
    token: CancelToken,
    receiver: Receiver<GenerationResult>,
}

impl PendingGeneration {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn poll(&self) -> Poll {
        match self.receiver.try_recv() {
            Ok(result) => Poll::Finished(result),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => Poll::Lost,
        }
    }
}
