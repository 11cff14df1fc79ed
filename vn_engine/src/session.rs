use std::fmt;
use std::time::Duration;

use log::warn;
use serde::Serialize;
use thiserror::Error;
use vn_formats::DialogueNode;

use crate::database::ScriptDatabase;
use crate::events::EventLogHandle;
use crate::tally::ResponseTally;
use crate::typewriter::Typewriter;

/// Window after an accepted advance during which further advances are
/// dropped, mirroring the half-second the original UI kept its button
/// disabled.
pub const ADVANCE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Typing,
    AwaitingAdvance,
    Branching,
    Terminal,
}

impl SessionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Typing => "typing",
            SessionPhase::AwaitingAdvance => "awaiting_advance",
            SessionPhase::Branching => "branching",
            SessionPhase::Terminal => "terminal",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything that can go wrong inside the dialogue flow. None of these
/// are fatal: the driver logs the error, drops the call, and the session
/// keeps its prior state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("no dialogue found with id {0}")]
    NodeNotFound(u32),
    #[error("no response found with id {0}")]
    ResponseNotFound(u32),
    #[error("{action} ignored while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: SessionPhase,
    },
    #[error("required binding {0} was never wired up")]
    MissingBinding(&'static str),
}

/// Transition data the session needs from the current node after the line
/// has been captured by the typewriter.
#[derive(Debug, Clone)]
struct NodeCursor {
    id: u32,
    responses: Vec<u32>,
    next: Option<u32>,
    terminal: bool,
}

impl NodeCursor {
    fn from_node(node: &DialogueNode) -> Self {
        Self {
            id: node.id,
            responses: node.responses.clone(),
            next: node.next,
            terminal: node.terminal,
        }
    }
}

/// The dialogue state machine: current node, typewriter, tally, and the
/// guard flags that keep transitions from overlapping. All mutation goes
/// through the methods here; observers read phase and text through the
/// accessors.
pub struct DialogueSession {
    phase: SessionPhase,
    cursor: Option<NodeCursor>,
    typewriter: Typewriter,
    tally: ResponseTally,
    offered: Vec<u32>,
    pending_stage: Option<u32>,
    transition_hold: bool,
    debounce: Duration,
    confirmed: bool,
    events: EventLogHandle,
}

impl DialogueSession {
    pub fn new(events: EventLogHandle) -> Self {
        Self {
            phase: SessionPhase::Idle,
            cursor: None,
            typewriter: Typewriter::new(),
            tally: ResponseTally::new(),
            offered: Vec::new(),
            pending_stage: None,
            transition_hold: false,
            debounce: Duration::ZERO,
            confirmed: false,
            events,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current(&self) -> Option<u32> {
        self.cursor.as_ref().map(|cursor| cursor.id)
    }

    pub fn visible_text(&self) -> &str {
        self.typewriter.visible()
    }

    pub fn is_typing(&self) -> bool {
        self.phase == SessionPhase::Typing
    }

    pub fn offered_responses(&self) -> &[u32] {
        &self.offered
    }

    pub fn tally(&self) -> &ResponseTally {
        &self.tally
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Node id waiting to have its presentation directives applied. Taken
    /// once by the driver after each node change.
    pub fn take_pending_stage(&mut self) -> Option<u32> {
        self.pending_stage.take()
    }

    /// Held while fade sequencing for the previous transition is still
    /// running; advances and selections are dropped, never queued.
    pub fn set_transition_hold(&mut self, hold: bool) {
        self.transition_hold = hold;
    }

    /// True while the debounce window or a transition hold would drop
    /// player input; drivers wait instead of burning scripted actions.
    pub fn is_input_locked(&self) -> bool {
        self.transition_hold || !self.debounce.is_zero()
    }

    /// Begins (or restarts) the flow at `node_id`. A missing id leaves the
    /// session exactly as it was.
    pub fn start(&mut self, db: &ScriptDatabase<'_>, node_id: u32) -> Result<(), SessionError> {
        let Some(node) = db.dialogue(node_id) else {
            let err = SessionError::NodeNotFound(node_id);
            warn!("{err}");
            self.events
                .borrow_mut()
                .log(format!("dialogue.missing {node_id}"));
            return Err(err);
        };
        self.display(node);
        Ok(())
    }

    /// Advances the frame clock: counts the debounce window down and steps
    /// the typewriter, firing the post-typing transition on the tick that
    /// completes the line.
    pub fn tick(&mut self, dt: Duration) {
        self.debounce = self.debounce.saturating_sub(dt);
        if self.phase == SessionPhase::Typing && self.typewriter.tick(dt) {
            self.log(format!("typewriter.complete {}", self.current_id()));
            self.finish_typing();
        }
    }

    /// Completes the text instantly; only meaningful mid-typing. Performs
    /// the same transition natural completion would.
    pub fn skip(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Typing {
            return Err(self.drop_call("skip"));
        }
        self.typewriter.skip();
        self.log(format!("typewriter.skip {}", self.current_id()));
        self.finish_typing();
        Ok(())
    }

    /// Moves to the current node's next node, or confirms the end of the
    /// scenario once the terminal node has been reached.
    pub fn advance(&mut self, db: &ScriptDatabase<'_>) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Typing {
            return Err(self.drop_call("advance"));
        }
        if self.transition_hold || !self.debounce.is_zero() {
            return Err(self.drop_call("advance"));
        }

        match self.phase {
            SessionPhase::AwaitingAdvance => {
                let current = self.current_id();
                let next = match self.cursor.as_ref().and_then(|cursor| cursor.next) {
                    Some(next) => next,
                    None => return Err(self.drop_call("advance")),
                };
                let Some(node) = db.dialogue(next) else {
                    let err = SessionError::NodeNotFound(next);
                    warn!("{err}");
                    self.log(format!("dialogue.missing {next}"));
                    return Err(err);
                };
                self.debounce = ADVANCE_DEBOUNCE;
                self.log(format!("dialogue.advance {current} -> {next}"));
                self.display(node);
                Ok(())
            }
            SessionPhase::Terminal if !self.confirmed => {
                self.confirmed = true;
                self.log("scenario.confirmed");
                Ok(())
            }
            _ => Err(self.drop_call("advance")),
        }
    }

    /// Picks one of the currently offered responses: tallies its category
    /// once, clears the response set, and continues at the response's next
    /// node (or ends the scenario when there is none).
    pub fn select_response(
        &mut self,
        db: &ScriptDatabase<'_>,
        response_id: u32,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Branching {
            return Err(self.drop_call("select_response"));
        }
        if self.transition_hold {
            return Err(self.drop_call("select_response"));
        }
        if !self.offered.contains(&response_id) {
            return Err(self.drop_call("select_response"));
        }
        let Some(response) = db.response(response_id) else {
            let err = SessionError::ResponseNotFound(response_id);
            warn!("{err}");
            self.log(format!("response.missing {response_id}"));
            return Err(err);
        };

        // Resolve the destination before mutating anything so a dangling
        // next id leaves the branch intact.
        let destination = match response.next {
            Some(next) => {
                let Some(node) = db.dialogue(next) else {
                    let err = SessionError::NodeNotFound(next);
                    warn!("{err}");
                    self.log(format!("dialogue.missing {next}"));
                    return Err(err);
                };
                Some(node)
            }
            None => None,
        };

        let counted = self.tally.record(&response.category, response.id);
        self.log(format!(
            "response.select {} category={}{}",
            response.id,
            response.category,
            if counted { "" } else { " (repeat)" }
        ));
        self.offered.clear();

        match destination {
            Some(node) => {
                self.debounce = ADVANCE_DEBOUNCE;
                self.display(node);
            }
            None => {
                let terminal_eligible = self
                    .cursor
                    .as_ref()
                    .map(|cursor| cursor.terminal)
                    .unwrap_or(false);
                if terminal_eligible {
                    self.enter_terminal();
                } else {
                    self.log(format!("dialogue.dead_end {}", self.current_id()));
                    self.phase = SessionPhase::Idle;
                }
            }
        }
        Ok(())
    }

    fn display(&mut self, node: &DialogueNode) {
        self.typewriter.cancel();
        self.offered.clear();
        self.cursor = Some(NodeCursor::from_node(node));
        self.pending_stage = Some(node.id);
        self.phase = SessionPhase::Typing;
        self.log(format!("dialogue.start {}", node.id));
        self.typewriter.begin(&node.text);
        if !self.typewriter.is_running() {
            // Empty line: nothing to type, complete on the spot.
            self.log(format!("typewriter.complete {}", node.id));
            self.finish_typing();
        }
    }

    fn finish_typing(&mut self) {
        let Some(cursor) = self.cursor.clone() else {
            return;
        };
        if !cursor.responses.is_empty() {
            self.offered = cursor.responses.clone();
            self.phase = SessionPhase::Branching;
            let listed: Vec<String> = cursor
                .responses
                .iter()
                .map(|id| id.to_string())
                .collect();
            self.log(format!("dialogue.responses {}", listed.join(",")));
        } else if cursor.next.is_some() {
            self.phase = SessionPhase::AwaitingAdvance;
        } else if cursor.terminal {
            self.enter_terminal();
        } else {
            self.log(format!("dialogue.dead_end {}", cursor.id));
            self.phase = SessionPhase::Idle;
        }
    }

    fn enter_terminal(&mut self) {
        self.phase = SessionPhase::Terminal;
        self.log(format!("scenario.complete {}", self.current_id()));
        let counts: Vec<String> = self
            .tally
            .counts()
            .iter()
            .map(|(category, count)| format!("{category}:{count}"))
            .collect();
        self.log(format!("tally.summary {}", counts.join(" ")));
    }

    fn drop_call(&mut self, action: &'static str) -> SessionError {
        let err = SessionError::InvalidTransition {
            action,
            phase: self.phase,
        };
        warn!("{err}");
        self.events
            .borrow_mut()
            .log(format!("session.drop {action} ({})", self.phase.label()));
        err
    }

    fn current_id(&self) -> u32 {
        self.cursor.as_ref().map(|cursor| cursor.id).unwrap_or(0)
    }

    fn log(&self, entry: impl Into<String>) {
        self.events.borrow_mut().log(entry);
    }
}

impl fmt::Debug for DialogueSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogueSession")
            .field("phase", &self.phase)
            .field("current", &self.current())
            .field("offered", &self.offered)
            .field("confirmed", &self.confirmed)
            .finish()
    }
}
