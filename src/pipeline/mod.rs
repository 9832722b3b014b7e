//! Sequential task-pipeline executor.
//!
//! Grounded on the teacher's external `pipeline` crate (`AsyncTask`,
//! `Pipeline`, `PipelineBuilder`), used throughout `app/pipeline/ortb/*`
//! to compose the auction's stages (`with_blocking`/`with_async`). That
//! crate is a path dependency not present in the retrieval pack, so the
//! same executor shape is reimplemented in-crate.

use async_trait::async_trait;

/// A single pipeline stage. `with_blocking` exists as a call-site
/// annotation distinguishing CPU-bound stages from I/O-bound ones, the
/// same distinction the teacher's stages make; today both variants run
/// inline on the pipeline's executing task. True isolation onto
/// [`tokio::task::spawn_blocking`] needs the stage to own (or `Arc`) its
/// context rather than borrow it for the call's lifetime, since
/// `spawn_blocking`'s closure must be `'static` — the auction's
/// per-request `&AuctionContext` isn't, so that split is left for when a
/// stage actually needs it (none of the current `with_blocking` stages —
/// `ResolveWinnersTask`, `MarginTask`, `AssembleResponseTask` — run
/// anything heavier than in-memory map/vec work).
#[async_trait]
pub trait AsyncTask<C, E>: Send + Sync {
    async fn run(&self, context: &C) -> Result<(), E>;
}

enum Stage<C, E> {
    Async(Box<dyn AsyncTask<C, E> + Send + Sync>),
    Blocking(Box<dyn AsyncTask<C, E> + Send + Sync>),
}

/// An ordered sequence of stages executed against a shared context.
/// Execution stops at the first stage returning `Err`.
pub struct Pipeline<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C, E> Pipeline<C, E>
where
    C: Sync + Send + 'static,
    E: Send + 'static,
{
    pub async fn run(&self, context: &C) -> Result<(), E> {
        for stage in &self.stages {
            match stage {
                Stage::Async(task) => task.run(context).await?,
                // Not yet spawn_blocking-isolated; see the module doc.
                Stage::Blocking(task) => task.run(context).await?,
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[derive(Default)]
pub struct PipelineBuilder<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C, E> PipelineBuilder<C, E> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_async(mut self, task: Box<dyn AsyncTask<C, E> + Send + Sync>) -> Self {
        self.stages.push(Stage::Async(task));
        self
    }

    pub fn with_blocking(mut self, task: Box<dyn AsyncTask<C, E> + Send + Sync>) -> Self {
        self.stages.push(Stage::Blocking(task));
        self
    }

    pub fn add_async(&mut self, task: Box<dyn AsyncTask<C, E> + Send + Sync>) {
        self.stages.push(Stage::Async(task));
    }

    pub fn add_blocking(&mut self, task: Box<dyn AsyncTask<C, E> + Send + Sync>) {
        self.stages.push(Stage::Blocking(task));
    }

    /// Returns `None` when no stages were ever added, matching the
    /// teacher's `PipelineBuilder::build()` callers which treat an empty
    /// pipeline as a caller error (see `build_finalizers_pipeline`).
    pub fn build(self) -> Option<Pipeline<C, E>> {
        if self.stages.is_empty() {
            None
        } else {
            Some(Pipeline { stages: self.stages })
        }
    }
}
