//! Inspect command

use std::path::PathBuf;

use clap::Args;

use crate::dataset;
use crate::output::format_output;
use crate::report::{EntityReport, GraphSummary};
use crate::AppContext;

#[derive(Args)]
pub struct InspectArgs {
    /// Dataset file (JSON)
    pub dataset: PathBuf,

    /// Show one entity with its children and parents
    #[arg(long)]
    pub id: Option<String>,
}

pub fn run(args: &InspectArgs, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::debug!("Inspecting dataset: {:?}", args.dataset);
    let graph = dataset::load(&args.dataset)?;

    let rendered = match &args.id {
        Some(id) => format_output(&EntityReport::of(&graph, id)?, ctx.format),
        None => format_output(&GraphSummary::of(&graph), ctx.format),
    };
    println!("{}", rendered);
    Ok(())
}
