//! Pregel Engine - superstep scheduler for compiled graphs
//!
//! Each superstep follows the sequence: Partition → Compute → Route → Checkpoint.
//!
//! - **Partition**: split pending steps by whether their target is Active.
//!   If none are, the run drains and the remaining steps are dropped.
//! - **Compute**: one task per active step, all joined at a single barrier.
//! - **Route**: the router (if any) is consulted; a Waiting vertex then drops
//!   its targets and replays its input, any other vertex fans out to them.
//! - **Checkpoint**: the next step list and every vertex's state are saved and
//!   awaited before anything else happens.
//!
//! A computation that calls `exit` lets its own superstep and checkpoint
//! finish, then no further superstep starts.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;

use super::checkpoint::Checkpointer;
use super::config::EngineConfig;
use super::error::PregelError;
use super::graph::CompiledGraph;
use super::runtime::{ExitStatus, GraphRuntime, Interrupt, RunControl};
use super::step::{States, Step};
use super::vertex::{ComputeContext, VertexId, VertexStatus};

/// Observer notified after every completed computation
pub type ComputedListener = Arc<dyn Fn(&VertexId, &Value) + Send + Sync>;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// No step targeted an active vertex
    Drained,
    /// A computation called `exit`
    Exited(ExitStatus),
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Number of supersteps executed
    pub supersteps: usize,
    pub termination: Termination,
    /// Steps left unscheduled when the loop stopped
    pub pending_steps: Vec<Step>,
}

impl RunReport {
    pub fn exited(&self) -> bool {
        matches!(self.termination, Termination::Exited(_))
    }
}

/// Superstep scheduler over a compiled graph
pub struct Engine<C> {
    topology: Arc<CompiledGraph<C>>,
    context: Arc<C>,
    config: EngineConfig,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    control: Arc<RunControl>,
    listeners: Arc<Vec<ComputedListener>>,
}

impl<C> Engine<C>
where
    C: Send + Sync + 'static,
{
    pub(crate) fn new(
        topology: Arc<CompiledGraph<C>>,
        context: C,
        checkpointer: Option<Arc<dyn Checkpointer>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            topology,
            context: Arc::new(context),
            config,
            checkpointer,
            control: Arc::new(RunControl::default()),
            listeners: Arc::new(Vec::new()),
        }
    }

    /// Runtime handle, as given to computations
    pub fn runtime(&self) -> GraphRuntime<C> {
        GraphRuntime::new(
            Arc::clone(&self.context),
            self.config.version,
            Arc::clone(&self.control),
        )
    }

    pub fn version(&self) -> u32 {
        self.config.version
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn topology(&self) -> &CompiledGraph<C> {
        &self.topology
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Snapshot of the interrupt table
    pub fn interrupts(&self) -> Vec<Interrupt> {
        self.control.interrupts()
    }

    /// Shutdown hooks still on the stack
    pub fn shutdown_hook_count(&self) -> usize {
        self.control.shutdown_hook_count()
    }

    pub fn states(&self) -> States {
        self.topology.states()
    }

    pub fn vertex_status(&self, id: &str) -> Option<VertexStatus> {
        self.topology.vertex(id).map(|v| v.status())
    }

    /// Register an observer called with `(vertex_id, output)` after every
    /// computation, in registration order
    pub fn on_computed(
        &mut self,
        listener: impl Fn(&VertexId, &Value) + Send + Sync + 'static,
    ) -> &mut Self {
        Arc::make_mut(&mut self.listeners).push(Arc::new(listener));
        self
    }

    /// Run the graph until its steps drain or a computation calls `exit`
    ///
    /// `initial_states` are merged into the named vertices and every vertex is
    /// reset to Active before the first superstep. When the loop ends, at most
    /// one shutdown hook (the most recently added) is awaited. A failed
    /// computation, router or checkpoint aborts the run and skips the hook.
    pub async fn run(
        &mut self,
        initial_steps: Vec<Step>,
        initial_states: States,
    ) -> Result<RunReport, PregelError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pregel_run", run_id = %run_id);
        self.run_inner(run_id, initial_steps, initial_states)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &mut self,
        run_id: Uuid,
        initial_steps: Vec<Step>,
        initial_states: States,
    ) -> Result<RunReport, PregelError> {
        self.control.start();
        self.topology.merge_states(initial_states);
        self.topology.activate_all();

        tracing::info!(initial_steps = initial_steps.len(), "Run started");

        let (supersteps, pending_steps) = match self.superstep_loop(initial_steps).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.control.stop();
                tracing::error!(error = %e, "Run aborted");
                return Err(e);
            }
        };

        let termination = match self.control.exit_status() {
            Some(status) => Termination::Exited(status),
            None => Termination::Drained,
        };
        self.control.stop();
        self.shutdown().await;

        tracing::info!(
            supersteps,
            termination = ?termination,
            pending = pending_steps.len(),
            "Run finished"
        );

        Ok(RunReport {
            run_id,
            supersteps,
            termination,
            pending_steps,
        })
    }

    /// Returns the number of supersteps executed and the steps left over
    async fn superstep_loop(
        &self,
        initial_steps: Vec<Step>,
    ) -> Result<(usize, Vec<Step>), PregelError> {
        let mut steps = initial_steps;
        let mut superstep = 0;

        while !steps.is_empty() {
            let (active, other): (Vec<Step>, Vec<Step>) = steps
                .into_iter()
                .partition(|step| self.topology.is_schedulable(step.next.as_str()));

            if active.is_empty() {
                tracing::debug!(dropped = other.len(), "No active steps, draining");
                return Ok((superstep, other));
            }

            if let Some(max) = self.config.max_supersteps {
                if superstep >= max {
                    return Err(PregelError::MaxSuperstepsExceeded(superstep));
                }
            }

            tracing::debug!(
                superstep,
                active = active.len(),
                deferred = other.len(),
                "Superstep starting"
            );

            let mut next = self.execute_superstep(superstep, active).await?;
            next.extend(other);
            superstep += 1;

            self.save_checkpoint(superstep, &next).await?;

            if !self.control.is_running() {
                tracing::info!(superstep, "Exit requested, stopping after checkpoint");
                return Ok((superstep, next));
            }

            steps = next;
        }

        Ok((superstep, steps))
    }

    /// Compute every active step concurrently and collect successor steps
    ///
    /// Successors keep the order of the steps that produced them.
    async fn execute_superstep(
        &self,
        superstep: usize,
        steps: Vec<Step>,
    ) -> Result<Vec<Step>, PregelError> {
        let semaphore = self.config.parallelism.map(|n| Arc::new(Semaphore::new(n)));
        let mut handles = Vec::with_capacity(steps.len());

        for step in steps {
            let topology = Arc::clone(&self.topology);
            let listeners = Arc::clone(&self.listeners);
            let runtime = self.runtime();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => Some(
                        semaphore
                            .acquire_owned()
                            .await
                            .map_err(|e| PregelError::TaskJoin(e.to_string()))?,
                    ),
                    None => None,
                };
                compute_step(&topology, &listeners, runtime, superstep, step).await
            }));
        }

        let mut produced = Vec::new();
        for handle in handles {
            let steps = handle
                .await
                .map_err(|e| PregelError::TaskJoin(e.to_string()))??;
            produced.extend(steps);
        }
        Ok(produced)
    }

    async fn save_checkpoint(&self, superstep: usize, steps: &[Step]) -> Result<(), PregelError> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(());
        };
        checkpointer.save(steps, &self.topology.states()).await?;
        tracing::info!(superstep, steps = steps.len(), "Checkpoint saved");
        Ok(())
    }

    /// Pop and await one shutdown hook
    async fn shutdown(&self) {
        if let Some(hook) = self.control.pop_shutdown_hook() {
            tracing::debug!(
                remaining = self.control.shutdown_hook_count(),
                "Running shutdown hook"
            );
            hook().await;
        }
    }
}

/// Compute one step and resolve the steps it produces
async fn compute_step<C>(
    topology: &CompiledGraph<C>,
    listeners: &[ComputedListener],
    runtime: GraphRuntime<C>,
    superstep: usize,
    step: Step,
) -> Result<Vec<Step>, PregelError>
where
    C: Send + Sync + 'static,
{
    let Some(vertex) = topology.vertex(step.next.as_str()).cloned() else {
        tracing::debug!(vertex_id = %step.next, "Step targets unknown vertex");
        return Ok(Vec::new());
    };

    let ctx = ComputeContext::new(Arc::clone(&vertex), runtime, superstep);
    let output = vertex.compute(step.props.clone(), &ctx).await?;

    notify_listeners(listeners, &step.next, &output);

    // The router runs even for a waiting vertex; only its targets are dropped.
    let targets = match topology.router(step.next.as_str()) {
        Some(router) => {
            let state = vertex.state();
            router.route(&output, &state, ctx.runtime()).await?
        }
        None => Vec::new(),
    };

    if vertex.is_waiting() {
        tracing::debug!(
            vertex_id = %step.next,
            superstep,
            discarded = targets.len(),
            "Vertex waiting, replaying input"
        );
        return Ok(vec![step]);
    }

    Ok(targets
        .into_iter()
        .map(|next| Step::new(next, output.clone()))
        .collect())
}

/// Call every listener in order; a panicking listener is logged and skipped
fn notify_listeners(listeners: &[ComputedListener], vertex_id: &VertexId, output: &Value) {
    for listener in listeners {
        let result = panic::catch_unwind(AssertUnwindSafe(|| listener(vertex_id, output)));
        if result.is_err() {
            tracing::warn!(vertex_id = %vertex_id, "Computed listener panicked");
        }
    }
}

impl<C> fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("running", &self.control.is_running())
            .field("checkpointer", &self.checkpointer.is_some())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
