use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::plan::ChoicePolicy;

#[derive(Parser, Debug)]
#[command(
    about = "Headless runner for branching visual-novel scenarios",
    version
)]
pub struct Args {
    /// Directory containing scenario script JSON files
    #[arg(long, default_value = "demos/scripts")]
    pub scripts_root: PathBuf,

    /// Scenario key to play
    #[arg(long)]
    pub scenario: Option<String>,

    /// JSON input plan driving the run; auto-play takes over when it runs dry
    #[arg(long)]
    pub input_plan: Option<PathBuf>,

    /// Branch choice once the plan is empty: first, last, or alternate
    #[arg(long, default_value = "first", value_name = "POLICY")]
    pub auto_choice: String,

    /// Durable preferences/unlock file
    #[arg(long, default_value = "prefs.json")]
    pub prefs: PathBuf,

    /// Path to write the run transcript as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the final tally and outcome as JSON
    #[arg(long)]
    pub tally_json: Option<PathBuf>,

    /// Frame budget before a run is abandoned
    #[arg(long, default_value_t = 200_000)]
    pub max_frames: u32,

    /// Milliseconds of simulated time per frame
    #[arg(long, default_value_t = 10)]
    pub tick_ms: u64,

    /// List every scenario with its unlock state instead of playing
    #[arg(long)]
    pub list_scenarios: bool,

    /// Check every script for structural problems instead of playing
    #[arg(long)]
    pub validate: bool,

    /// Path to write validation reports as JSON (with --validate)
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Echo the full transcript after the run
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub enum Command {
    Play(PlayArgs),
    ListScenarios(CatalogArgs),
    Validate(CatalogArgs),
}

#[derive(Debug)]
pub struct PlayArgs {
    pub scripts_root: PathBuf,
    pub scenario: String,
    pub input_plan: Option<PathBuf>,
    pub auto_choice: ChoicePolicy,
    pub prefs: PathBuf,
    pub event_log_json: Option<PathBuf>,
    pub tally_json: Option<PathBuf>,
    pub max_frames: u32,
    pub tick_ms: u64,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct CatalogArgs {
    pub scripts_root: PathBuf,
    pub prefs: PathBuf,
    pub report_json: Option<PathBuf>,
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<Command> {
        if self.list_scenarios && self.validate {
            bail!("--list-scenarios and --validate are mutually exclusive");
        }
        if self.report_json.is_some() && !self.validate {
            bail!("--report-json requires --validate");
        }

        let catalog = CatalogArgs {
            scripts_root: self.scripts_root.clone(),
            prefs: self.prefs.clone(),
            report_json: self.report_json.clone(),
        };

        if self.list_scenarios {
            return Ok(Command::ListScenarios(catalog));
        }
        if self.validate {
            return Ok(Command::Validate(catalog));
        }

        let Some(scenario) = self.scenario.clone() else {
            bail!("--scenario is required unless --list-scenarios or --validate is given");
        };
        if self.tick_ms == 0 {
            bail!("--tick-ms must be at least 1");
        }

        Ok(Command::Play(PlayArgs {
            scripts_root: self.scripts_root,
            scenario,
            input_plan: self.input_plan,
            auto_choice: ChoicePolicy::parse(&self.auto_choice)?,
            prefs: self.prefs,
            event_log_json: self.event_log_json,
            tally_json: self.tally_json,
            max_frames: self.max_frames,
            tick_ms: self.tick_ms,
            verbose: self.verbose,
        }))
    }
}
