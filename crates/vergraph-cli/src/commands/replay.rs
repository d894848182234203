//! Replay command

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::dataset;
use crate::output::format_output;
use crate::report::{ChangesReport, GraphSummary, ParentsReport, ReplayReport};
use crate::script::{History, Script};
use crate::AppContext;

#[derive(Args)]
pub struct ReplayArgs {
    /// Dataset file (JSON)
    pub dataset: PathBuf,

    /// Edit script (JSON)
    pub script: PathBuf,

    /// Report parent ways and relations for these ids
    #[arg(long = "id")]
    pub ids: Vec<String>,

    /// Force rebase steps that do not say otherwise
    #[arg(long)]
    pub force_rebase: bool,
}

pub fn run(args: &ReplayArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let loaded = dataset::load(&args.dataset)?;
    let script = Script::read(&args.script)?;

    let force_default = args.force_rebase || ctx.config.force_rebase;
    let mut history = History::new(&loaded, force_default);

    for (index, step) in script.steps.iter().enumerate() {
        history
            .perform(step)
            .with_context(|| format!("Step {} ({}) failed", index + 1, step.name()))?;
    }
    tracing::info!(
        "Replayed {} steps, history holds {} snapshots",
        script.steps.len(),
        history.len()
    );

    let head = history.head();
    let report = ReplayReport {
        steps: script.steps.len(),
        history: history.len(),
        rebase: history.rebase_totals().clone(),
        head: GraphSummary::of(head),
        changes: ChangesReport::of(head),
        parents: args.ids.iter().map(|id| ParentsReport::of(head, id)).collect(),
    };
    println!("{}", format_output(&report, ctx.format));
    Ok(())
}
