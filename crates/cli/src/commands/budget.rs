//! `weekforge budget`: pack arbitrary files into one model's window.

use super::inputs;
use std::path::{Path, PathBuf};
use weekforge_agent::{BudgetReport, ComponentOutcome, ContextBudgetManager, ContextComponent};

/// Lowest-priority slot; files past it share this priority.
const LAST_PRIORITY: u8 = u8::MAX;

pub async fn run(
    config_path: Option<&Path>,
    model: Option<&str>,
    files: &[PathBuf],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = inputs::load_config(config_path)?;
    let model = model.unwrap_or(&config.default_model);
    let budget = ContextBudgetManager::from_config(model, &config.context);

    let packed = budget.pack("", components(files))?;
    let report = &packed.report;

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    print_report(model, report);
    Ok(())
}

/// One component per file: the first is required, the rest by position.
fn components(files: &[PathBuf]) -> Vec<ContextComponent> {
    files
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let priority = u8::try_from(i + 1).unwrap_or(LAST_PRIORITY);
            ContextComponent::new(path.display().to_string(), inputs::read_input(path), priority)
        })
        .collect()
}

fn print_report(model: &str, report: &BudgetReport) {
    println!("📐 Context budget for {model}");
    println!("─────────────────────────────────────────────────────");
    println!("{:<40} {:>12}", "Component", "Outcome");
    for (name, outcome) in &report.outcomes {
        let shown = match outcome {
            ComponentOutcome::Included => "included".to_string(),
            ComponentOutcome::Truncated { from, to } => format!("{from} → {to}"),
            ComponentOutcome::Dropped { tokens } => format!("dropped ({tokens})"),
        };
        println!("{name:<40} {shown:>12}");
    }

    println!();
    println!("  Usable limit:   {}", report.limit);
    println!("  Original total: {}", report.original_total);
    println!("  Final total:    {}", report.final_total);
    println!("  Tokens saved:   {}", report.tokens_saved);
    println!("  Headroom:       {}", report.remaining_headroom);
    if report.truncation_applied {
        println!("  ✂️  Truncation applied");
    }
}
