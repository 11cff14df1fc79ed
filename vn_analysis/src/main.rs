use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use vn_formats::ScriptCollection;

use vn_analysis::analyze_collection;

/// Static checker for scenario script content.
#[derive(Parser, Debug)]
#[command(
    about = "Reports structural and reachability problems in scenario scripts",
    version
)]
struct Args {
    /// Directory containing scenario script JSON files
    #[arg(long, default_value = "demos/scripts")]
    scripts_root: PathBuf,

    /// Path to write the per-scenario reports as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Print reports for clean scripts too, not just findings
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let collection = ScriptCollection::load_from_dir(&args.scripts_root)
        .with_context(|| format!("loading scripts from {}", args.scripts_root.display()))?;
    let reports = analyze_collection(&collection);

    for report in &reports {
        if args.verbose || report.finding_count() > 0 {
            print!("{}", report.render_text());
        }
    }

    if let Some(path) = args.report_json.as_ref() {
        let json = serde_json::to_string_pretty(&reports)
            .context("serializing script reports to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing script reports to {}", path.display()))?;
        println!("Saved script reports to {}", path.display());
    }

    let findings: usize = reports.iter().map(|report| report.finding_count()).sum();
    if findings > 0 {
        bail!(
            "{findings} finding(s) across {} scenario script(s)",
            reports.len()
        );
    }

    println!("All {} scenario script(s) look clean", reports.len());
    Ok(())
}
