use std::collections::BTreeMap;
use std::fs;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::warn;
use serde::Serialize;
use vn_formats::{ScenarioScript, ScriptCollection};

use crate::cli::{CatalogArgs, PlayArgs};
use crate::database::ScriptDatabase;
use crate::events::{shared_log, EventLogHandle};
use crate::plan::{InputPlan, PlannedAction};
use crate::prefs::PrefsStore;
use crate::presentation::{AnimationSink, PresentationCoordinator, RecordingAnimationSink};
use crate::scenario::ScenarioCatalog;
use crate::session::{DialogueSession, SessionPhase};
use crate::unlock::UnlockLedger;

/// Scene transition collaborator: one-way, nothing is read back.
pub trait SceneSink {
    fn load_scene(&self, name: &str);
}

/// Sink that records scene loads into the shared transcript.
#[derive(Clone)]
pub struct RecordingSceneSink {
    events: EventLogHandle,
}

impl RecordingSceneSink {
    pub fn new(events: EventLogHandle) -> Self {
        Self { events }
    }
}

impl SceneSink for RecordingSceneSink {
    fn load_scene(&self, name: &str) {
        self.events.borrow_mut().log(format!("scene.load {name}"));
    }
}

/// Result of one headless run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub scenario: String,
    pub frames: u32,
    pub completed: bool,
    pub final_phase: SessionPhase,
    pub leading_category: Option<String>,
    pub counts: BTreeMap<String, u32>,
    pub final_text: String,
}

/// Drives one scenario end to end on the frame clock: typewriter, fades,
/// and the input plan all advance one tick at a time. Scripted actions are
/// consumed in order whenever the session will accept input; once the plan
/// runs dry the auto-play policy takes over.
pub struct Playback<'a> {
    script: &'a ScenarioScript,
    db: ScriptDatabase<'a>,
    session: DialogueSession,
    presentation: PresentationCoordinator,
    plan: InputPlan,
    events: EventLogHandle,
    tick: Duration,
    wait_frames: u32,
}

impl<'a> Playback<'a> {
    pub fn new(
        script: &'a ScenarioScript,
        sink: Option<Rc<dyn AnimationSink>>,
        plan: InputPlan,
        events: EventLogHandle,
        tick: Duration,
    ) -> Self {
        let db = ScriptDatabase::new(script);
        let session = DialogueSession::new(events.clone());
        let presentation = PresentationCoordinator::new(script.layout, sink, events.clone());
        Self {
            script,
            db,
            session,
            presentation,
            plan,
            events,
            tick,
            wait_frames: 0,
        }
    }

    pub fn session(&self) -> &DialogueSession {
        &self.session
    }

    pub fn events(&self) -> &EventLogHandle {
        &self.events
    }

    pub fn run(&mut self, max_frames: u32) -> Result<RunOutcome> {
        self.session
            .start(&self.db, self.script.start)
            .map_err(|err| anyhow!("starting scenario {}: {err}", self.script.key))?;
        self.stage_pending();

        let mut frames = 0;
        while frames < max_frames {
            frames += 1;
            self.session.tick(self.tick);
            self.presentation.tick(self.tick);
            self.stage_pending();
            self.session
                .set_transition_hold(!self.presentation.is_settled());

            if self.session.is_confirmed() {
                break;
            }
            if self.session.phase() == SessionPhase::Idle {
                // Dead end: the run cannot continue.
                break;
            }

            if self.wait_frames > 0 {
                self.wait_frames -= 1;
                continue;
            }
            // Skipping the typewriter stays available while fades hold
            // other input, exactly like the original skip control.
            let typing = self.session.phase() == SessionPhase::Typing;
            if !typing && self.session.is_input_locked() {
                continue;
            }
            self.feed();
        }

        if frames >= max_frames {
            warn!(
                "scenario {} exhausted the {max_frames}-frame budget",
                self.script.key
            );
            self.events.borrow_mut().log("run.frame_budget_exhausted");
        }

        let completed = self.session.is_confirmed();
        Ok(RunOutcome {
            scenario: self.script.key.clone(),
            frames,
            completed,
            final_phase: self.session.phase(),
            leading_category: self
                .session
                .tally()
                .leading_category()
                .map(|category| category.to_string()),
            counts: self.session.tally().counts().clone(),
            final_text: self.session.visible_text().to_string(),
        })
    }

    fn stage_pending(&mut self) {
        if let Some(node_id) = self.session.take_pending_stage() {
            if let Some(node) = self.db.dialogue(node_id) {
                self.presentation.apply(node);
            }
        }
    }

    fn feed(&mut self) {
        let phase = self.session.phase();
        if phase == SessionPhase::Typing {
            // Mid-line only a skip or a deliberate wait makes sense; any
            // other scripted action holds until the line is finished.
            match self.plan.peek() {
                Some(PlannedAction::Skip) => {
                    self.plan.next();
                    let _ = self.session.skip();
                }
                Some(PlannedAction::Wait { .. }) => {
                    if let Some(PlannedAction::Wait { frames }) = self.plan.next() {
                        self.wait_frames = frames;
                    }
                }
                _ => {}
            }
            self.stage_pending();
            return;
        }

        match self.plan.next() {
            Some(PlannedAction::Advance) => {
                let _ = self.session.advance(&self.db);
            }
            Some(PlannedAction::Skip) => {
                let _ = self.session.skip();
            }
            Some(PlannedAction::Select { index }) => self.select(index),
            Some(PlannedAction::Wait { frames }) => self.wait_frames = frames,
            None => match phase {
                SessionPhase::AwaitingAdvance | SessionPhase::Terminal => {
                    let _ = self.session.advance(&self.db);
                }
                SessionPhase::Branching => {
                    let offered = self.session.offered_responses().len();
                    let index = self.plan.auto_choice(offered);
                    self.select(index);
                }
                _ => {}
            },
        }
        self.stage_pending();
    }

    fn select(&mut self, index: usize) {
        let Some(response_id) = self.session.offered_responses().get(index).copied() else {
            warn!("planned selection index {index} is out of range");
            self.events
                .borrow_mut()
                .log(format!("plan.select.out_of_range {index}"));
            return;
        };
        let _ = self.session.select_response(&self.db, response_id);
    }
}

/// Plays one scenario headlessly and applies the end-of-run outcome to the
/// unlock ledger.
pub fn execute(args: PlayArgs) -> Result<()> {
    let collection = ScriptCollection::load_from_dir(&args.scripts_root)?;
    let script = collection
        .get(&args.scenario)
        .ok_or_else(|| anyhow!("unknown scenario {}", args.scenario))?;

    for issue in script.validate() {
        warn!("{}: {issue}", script.key);
    }

    let prefs = PrefsStore::load(&args.prefs)?;
    let mut ledger = UnlockLedger::new(prefs);
    let catalog = ScenarioCatalog::build(&collection, &ledger);
    if !catalog.is_unlocked(&args.scenario) {
        bail!("scenario {} is still locked", args.scenario);
    }

    let events = shared_log();
    let animation: Rc<dyn AnimationSink> = Rc::new(RecordingAnimationSink::new(events.clone()));
    let scenes = RecordingSceneSink::new(events.clone());

    let plan = match args.input_plan.as_ref() {
        Some(path) => InputPlan::load(path, args.auto_choice)?,
        None => InputPlan::auto(args.auto_choice),
    };

    let mut playback = Playback::new(
        script,
        Some(animation),
        plan,
        events.clone(),
        Duration::from_millis(args.tick_ms),
    );
    let outcome = playback.run(args.max_frames)?;

    if outcome.completed {
        match outcome.leading_category.as_deref() {
            Some(category) => {
                if let Some(unlocked) =
                    ledger.unlock_by_outcome(category, &script.outcomes, &events)
                {
                    scenes.load_scene(&unlocked);
                }
            }
            None => {
                events.borrow_mut().log("tally.no_leader");
            }
        }
        ledger
            .save()
            .context("saving the unlock ledger after the run")?;
    }

    println!(
        "Scenario {} {} after {} frames (leader: {})",
        outcome.scenario,
        if outcome.completed {
            "completed"
        } else {
            "stopped"
        },
        outcome.frames,
        outcome.leading_category.as_deref().unwrap_or("<none>"),
    );

    if args.verbose {
        for entry in events.borrow().entries() {
            println!("  {entry}");
        }
    }

    if let Some(path) = args.event_log_json.as_ref() {
        let json = serde_json::to_string_pretty(&*events.borrow())
            .context("serializing run transcript to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing run transcript to {}", path.display()))?;
        println!("Saved run transcript to {}", path.display());
    }

    if let Some(path) = args.tally_json.as_ref() {
        let json =
            serde_json::to_string_pretty(&outcome).context("serializing run outcome to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing run outcome to {}", path.display()))?;
        println!("Saved run outcome to {}", path.display());
    }

    Ok(())
}

/// Prints every scenario under the scripts root with its unlock state.
pub fn list_scenarios(args: CatalogArgs) -> Result<()> {
    let collection = ScriptCollection::load_from_dir(&args.scripts_root)?;
    let ledger = UnlockLedger::new(PrefsStore::load(&args.prefs)?);
    let catalog = ScenarioCatalog::build(&collection, &ledger);
    print!("{}", catalog.render_text());
    Ok(())
}

/// Runs structural validation plus the static graph checks over every
/// script; non-zero exit when anything is wrong.
pub fn validate(args: CatalogArgs) -> Result<()> {
    let collection = ScriptCollection::load_from_dir(&args.scripts_root)?;
    let reports = vn_analysis::analyze_collection(&collection);

    for report in &reports {
        print!("{}", report.render_text());
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
        bail!("validation found {findings} issue(s)");
    }
    println!("All {} scenario script(s) look clean", reports.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use vn_formats::ScenarioScript;

    use super::Playback;
    use crate::events::shared_log;
    use crate::plan::{ChoicePolicy, InputPlan, PlannedAction};
    use crate::presentation::RecordingAnimationSink;

    const TICK: Duration = Duration::from_millis(10);

    fn sample() -> ScenarioScript {
        ScenarioScript::parse(
            r#"{
                "key": "scenario1",
                "title": "Test",
                "layout": "trio",
                "start": 1,
                "outcomes": { "A": "scenario2a", "B": "scenario2b" },
                "dialogues": [
                    {
                        "id": 1,
                        "text": "Welcome.",
                        "next": 2,
                        "portraits": {
                            "left": { "sprite": "hana_neutral", "visible": true, "talking": true, "fade_in": true }
                        }
                    },
                    { "id": 2, "text": "Pick one.", "responses": [10, 11] },
                    { "id": 3, "text": "Fine choice.", "next": 4 },
                    { "id": 4, "text": "The end.", "terminal": true }
                ],
                "responses": [
                    { "id": 10, "text": "Go A", "category": "A", "next": 3 },
                    { "id": 11, "text": "Go B", "category": "B", "next": 3 }
                ]
            }"#,
        )
        .expect("sample parses")
    }

    #[test]
    fn auto_play_runs_to_completion() {
        let script = sample();
        let events = shared_log();
        let sink = Rc::new(RecordingAnimationSink::new(events.clone()));
        let mut playback = Playback::new(
            &script,
            Some(sink),
            InputPlan::auto(ChoicePolicy::First),
            events.clone(),
            TICK,
        );

        let outcome = playback.run(100_000).expect("run");
        assert!(outcome.completed);
        assert_eq!(outcome.leading_category.as_deref(), Some("A"));
        assert_eq!(outcome.counts.get("A"), Some(&1));
        assert_eq!(outcome.final_text, "The end.");

        let log = events.borrow();
        assert!(log.contains("dialogue.start 1"));
        assert!(log.contains("portrait.fade_in left"));
        assert!(log.contains("response.select 10 category=A"));
        assert!(log.contains("scenario.complete 4"));
        assert!(log.contains("scenario.confirmed"));
    }

    #[test]
    fn scripted_plan_overrides_the_policy() {
        let script = sample();
        let events = shared_log();
        let sink = Rc::new(RecordingAnimationSink::new(events.clone()));
        let plan = InputPlan::new(
            vec![
                PlannedAction::Skip,
                PlannedAction::Advance,
                PlannedAction::Select { index: 1 },
            ],
            ChoicePolicy::First,
        );
        let mut playback = Playback::new(&script, Some(sink), plan, events.clone(), TICK);

        let outcome = playback.run(100_000).expect("run");
        assert!(outcome.completed);
        assert_eq!(outcome.leading_category.as_deref(), Some("B"));
        assert!(events.borrow().contains("typewriter.skip 1"));
    }

    #[test]
    fn last_policy_picks_the_other_branch() {
        let script = sample();
        let events = shared_log();
        let sink = Rc::new(RecordingAnimationSink::new(events.clone()));
        let mut playback = Playback::new(
            &script,
            Some(sink),
            InputPlan::auto(ChoicePolicy::Last),
            events.clone(),
            TICK,
        );

        let outcome = playback.run(100_000).expect("run");
        assert_eq!(outcome.leading_category.as_deref(), Some("B"));
    }

    #[test]
    fn frame_budget_stops_a_cyclic_script() {
        let script = ScenarioScript::parse(
            r#"{
                "key": "loop",
                "title": "Loop",
                "layout": "trio",
                "start": 1,
                "dialogues": [
                    { "id": 1, "text": "a", "next": 2 },
                    { "id": 2, "text": "b", "next": 1 }
                ]
            }"#,
        )
        .expect("loop parses");
        let events = shared_log();
        let sink = Rc::new(RecordingAnimationSink::new(events.clone()));
        let mut playback = Playback::new(
            &script,
            Some(sink),
            InputPlan::auto(ChoicePolicy::First),
            events.clone(),
            TICK,
        );

        let outcome = playback.run(500).expect("run");
        assert!(!outcome.completed);
        assert_eq!(outcome.frames, 500);
        assert!(events.borrow().contains("run.frame_budget_exhausted"));
    }
}
