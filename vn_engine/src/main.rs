use anyhow::Result;

mod cli;
mod database;
mod events;
mod plan;
mod prefs;
mod presentation;
mod runtime;
mod scenario;
mod session;
mod tally;
mod typewriter;
mod unlock;

fn main() -> Result<()> {
    env_logger::init();

    match cli::parse()? {
        cli::Command::Play(args) => runtime::execute(args),
        cli::Command::ListScenarios(args) => runtime::list_scenarios(args),
        cli::Command::Validate(args) => runtime::validate(args),
    }
}
