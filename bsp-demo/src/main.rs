//! Countdown demo: a ticker vertex routes to itself until its counter runs
//! out, then hands off to a reporter that exits the run.
//!
//! ```text
//! RUST_LOG=bsp_graph=debug cargo run -p bsp-demo -- --count 5 --checkpoint-dir ./checkpoints
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bsp_graph::{
    Checkpointer, ComputeContext, ExitStatus, FileCheckpointer, Graph, Interrupt, States, Step,
    Vertex, VertexId,
};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Run a countdown graph on the superstep engine")]
struct Args {
    /// Number of ticks before the reporter runs
    #[arg(long, default_value_t = 3)]
    count: u64,

    /// Persist a checkpoint per superstep into this directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
}

/// Shared by every computation through the runtime handle
struct DemoContext {
    label: String,
}

fn build_graph() -> anyhow::Result<Graph<DemoContext>> {
    let mut graph: Graph<DemoContext> = Graph::new();
    graph
        .add_vertex(
            Vertex::from_fn("ticker", |props, ctx| {
                let remaining = props.as_u64().unwrap_or(0);
                let ticks = ctx.state()["ticks"].as_u64().unwrap_or(0) + 1;
                ctx.set_state(json!({ "ticks": ticks }));
                if remaining <= 1 {
                    ctx.halt();
                }
                Ok(json!(remaining.saturating_sub(1)))
            })
            .with_state(json!({ "ticks": 0 })),
        )?
        .add_vertex(Vertex::from_fn("reporter", |props, ctx: &ComputeContext<DemoContext>| {
            let label = &ctx.context().label;
            tracing::info!(%label, output = %props, "Countdown finished");
            ctx.runtime()
                .interrupt(Interrupt::new("report").with_data(json!({ "label": label })));
            ctx.runtime().add_shutdown_hook(|| async {
                tracing::info!("Shutdown hook ran");
            });
            ctx.runtime().exit(ExitStatus::Success);
            Ok(props)
        }))?
        .add_edge_fn("ticker", |output, _state, _runtime| {
            let next = if output.as_u64() == Some(0) {
                "reporter"
            } else {
                "ticker"
            };
            Ok(vec![VertexId::new(next)])
        })?;
    Ok(graph)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let checkpointer: Option<Arc<dyn Checkpointer>> = match &args.checkpoint_dir {
        Some(dir) => Some(Arc::new(
            FileCheckpointer::open(dir)
                .await
                .with_context(|| format!("opening checkpoint directory {}", dir.display()))?,
        )),
        None => None,
    };

    let context = DemoContext {
        label: format!("countdown-{}", args.count),
    };
    let mut engine = build_graph()?.compile(context, checkpointer);
    engine.on_computed(|id, output| tracing::debug!(vertex_id = %id, %output, "Computed"));

    let report = engine
        .run(vec![Step::new("ticker", json!(args.count))], States::new())
        .await
        .context("countdown run failed")?;

    println!("run {}", report.run_id);
    println!("  supersteps: {}", report.supersteps);
    println!("  termination: {:?}", report.termination);
    println!("  interrupts: {}", engine.interrupts().len());
    println!("  states: {}", serde_json::to_string_pretty(&engine.states())?);
    Ok(())
}
