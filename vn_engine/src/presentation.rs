use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use log::warn;
use serde::Serialize;
use vn_formats::{DialogueNode, PortraitDirective, SlotId, SlotLayout};

use crate::events::EventLogHandle;
use crate::session::SessionError;

/// Delay between the fade animation state starting and the alpha ramp.
pub const FADE_STATE_DELAY: Duration = Duration::from_millis(150);
/// Length of the portrait alpha ramp.
pub const FADE_RAMP: Duration = Duration::from_millis(500);
/// Talking/idle cross-fade length handed to the animation player.
pub const TALK_CROSS_FADE_SECONDS: f32 = 0.25;
/// Length of one leg of the background fade (out to black, then in).
pub const BACKGROUND_FADE: Duration = Duration::from_millis(1000);

/// Animation player the coordinator drives. Fire-and-forget: nothing is
/// read back from the host.
pub trait AnimationSink {
    fn play(&self, slot: SlotId, state: &str);
    fn cross_fade(&self, slot: SlotId, state: &str, seconds: f32);
}

/// Sink that records every call into the shared transcript. Stands in for
/// the host animation player during headless runs and tests.
#[derive(Clone)]
pub struct RecordingAnimationSink {
    events: EventLogHandle,
}

impl RecordingAnimationSink {
    pub fn new(events: EventLogHandle) -> Self {
        Self { events }
    }
}

impl AnimationSink for RecordingAnimationSink {
    fn play(&self, slot: SlotId, state: &str) {
        self.events
            .borrow_mut()
            .log(format!("anim.play {slot} {state}"));
    }

    fn cross_fade(&self, slot: SlotId, state: &str, seconds: f32) {
        self.events
            .borrow_mut()
            .log(format!("anim.cross_fade {slot} {state} {seconds:.2}"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SlotAnimation {
    Rest,
    FadeInDelay { elapsed_ms: u64 },
    FadeInRamp { elapsed_ms: u64 },
    FadeOutDelay { elapsed_ms: u64 },
    FadeOutRamp { elapsed_ms: u64 },
}

/// Current visual state of one portrait slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotState {
    pub sprite: Option<String>,
    pub visible: bool,
    pub talking: bool,
    pub mirrored: bool,
    pub alpha: f32,
    #[serde(skip)]
    animation: SlotAnimation,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            sprite: None,
            visible: false,
            talking: false,
            mirrored: false,
            alpha: 0.0,
            animation: SlotAnimation::Rest,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum BackgroundAnimation {
    Rest,
    FadeToBlack { elapsed: Duration, pending: String },
    FadeInFromBlack { elapsed: Duration },
}

#[derive(Debug, Clone, Serialize)]
pub struct BackgroundState {
    pub sprite: Option<String>,
    pub alpha: f32,
    #[serde(skip)]
    animation: BackgroundAnimation,
}

impl Default for BackgroundState {
    fn default() -> Self {
        Self {
            sprite: None,
            alpha: 1.0,
            animation: BackgroundAnimation::Rest,
        }
    }
}

/// Applies a node's visual directives to the portrait slots and sequences
/// the fade waits on the frame clock. All waits are elapsed-time counters;
/// re-applying directives mid-fade replaces the pending fade and the alpha
/// lands on the directive's resting value.
pub struct PresentationCoordinator {
    layout: SlotLayout,
    slots: BTreeMap<SlotId, SlotState>,
    background: BackgroundState,
    sink: Option<Rc<dyn AnimationSink>>,
    events: EventLogHandle,
    disabled: bool,
}

impl PresentationCoordinator {
    /// A missing sink is `MissingBinding`: logged once, portraits disabled
    /// for the whole session.
    pub fn new(
        layout: SlotLayout,
        sink: Option<Rc<dyn AnimationSink>>,
        events: EventLogHandle,
    ) -> Self {
        let disabled = sink.is_none();
        if disabled {
            let err = SessionError::MissingBinding("animation sink");
            warn!("{err}");
            events
                .borrow_mut()
                .log("presentation.disabled missing animation sink");
        }
        let slots = layout
            .slots()
            .iter()
            .map(|slot| (*slot, SlotState::default()))
            .collect();
        Self {
            layout,
            slots,
            background: BackgroundState::default(),
            sink,
            events,
            disabled,
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&SlotState> {
        self.slots.get(&slot)
    }

    pub fn background(&self) -> &BackgroundState {
        &self.background
    }

    pub fn snapshot(&self) -> &BTreeMap<SlotId, SlotState> {
        &self.slots
    }

    /// True once every fade and background transition has run out; the
    /// driver holds new transitions until then.
    pub fn is_settled(&self) -> bool {
        if self.disabled {
            return true;
        }
        self.background.animation == BackgroundAnimation::Rest
            && self
                .slots
                .values()
                .all(|state| state.animation == SlotAnimation::Rest)
    }

    /// Stages a node: sprite swaps, show/hide, talking cross-fades, and
    /// pending fade sequences for every slot in the layout.
    pub fn apply(&mut self, node: &DialogueNode) {
        if self.disabled {
            return;
        }
        for slot in self.layout.slots() {
            let directive = node.portraits.get(slot).cloned().unwrap_or_default();
            self.apply_slot(*slot, &directive);
        }
        self.apply_background(node);
    }

    fn apply_slot(&mut self, slot: SlotId, directive: &PortraitDirective) {
        let sink = self.sink.clone();
        let Some(state) = self.slots.get_mut(&slot) else {
            return;
        };

        if directive.visible && directive.sprite.is_some() {
            let was_visible = state.visible;
            state.sprite = directive.sprite.clone();
            state.visible = true;
            state.mirrored = directive.mirrored;
            state.talking = directive.talking;

            if directive.fade_in {
                state.alpha = 0.0;
                state.animation = SlotAnimation::FadeInDelay { elapsed_ms: 0 };
                if let Some(sink) = sink.as_ref() {
                    sink.play(slot, "FadeIn");
                }
                self.events
                    .borrow_mut()
                    .log(format!("portrait.fade_in {slot}"));
            } else if directive.fade_out {
                state.alpha = 1.0;
                state.animation = SlotAnimation::FadeOutDelay { elapsed_ms: 0 };
                if let Some(sink) = sink.as_ref() {
                    sink.play(slot, "FadeOut");
                }
                self.events
                    .borrow_mut()
                    .log(format!("portrait.fade_out {slot}"));
            } else {
                // No fade requested: land on the resting value even if a
                // previous fade was still pending.
                state.alpha = 1.0;
                state.animation = SlotAnimation::Rest;
                if let Some(sink) = sink.as_ref() {
                    sink.play(slot, "Idle");
                }
            }

            if !was_visible {
                self.events.borrow_mut().log(format!(
                    "portrait.show {slot} sprite={}",
                    directive.sprite.as_deref().unwrap_or("<none>")
                ));
            }

            if state.animation == SlotAnimation::Rest {
                if let Some(sink) = sink.as_ref() {
                    if directive.talking {
                        sink.cross_fade(slot, "Talking", TALK_CROSS_FADE_SECONDS);
                    } else {
                        sink.cross_fade(slot, "Idle", TALK_CROSS_FADE_SECONDS);
                    }
                }
            }
        } else {
            let was_visible = state.visible;
            *state = SlotState::default();
            if was_visible {
                self.events.borrow_mut().log(format!("portrait.hide {slot}"));
            }
        }
    }

    fn apply_background(&mut self, node: &DialogueNode) {
        if node.background_fade_in {
            if let Some(background) = node.background.as_ref() {
                self.background.animation = BackgroundAnimation::FadeToBlack {
                    elapsed: Duration::ZERO,
                    pending: background.clone(),
                };
                self.events
                    .borrow_mut()
                    .log(format!("background.fade {background}"));
                return;
            }
        }
        if node.background_fade_out {
            self.background.animation = BackgroundAnimation::FadeToBlack {
                elapsed: Duration::ZERO,
                pending: String::new(),
            };
            self.events.borrow_mut().log("background.fade_out");
            return;
        }
        if let Some(background) = node.background.as_ref() {
            if self.background.sprite.as_deref() != Some(background.as_str()) {
                self.background.sprite = Some(background.clone());
                self.background.alpha = 1.0;
                self.events
                    .borrow_mut()
                    .log(format!("background.set {background}"));
            }
        }
    }

    /// Advances every pending fade by `dt`.
    pub fn tick(&mut self, dt: Duration) {
        if self.disabled {
            return;
        }
        let dt_ms = dt.as_millis() as u64;
        let sink = self.sink.clone();
        let mut completed: Vec<String> = Vec::new();

        for (slot, state) in self.slots.iter_mut() {
            state.animation = match state.animation {
                SlotAnimation::Rest => SlotAnimation::Rest,
                SlotAnimation::FadeInDelay { elapsed_ms } => {
                    let elapsed_ms = elapsed_ms + dt_ms;
                    if elapsed_ms >= FADE_STATE_DELAY.as_millis() as u64 {
                        if let Some(sink) = sink.as_ref() {
                            sink.play(*slot, "Idle");
                        }
                        SlotAnimation::FadeInRamp {
                            elapsed_ms: elapsed_ms - FADE_STATE_DELAY.as_millis() as u64,
                        }
                    } else {
                        SlotAnimation::FadeInDelay { elapsed_ms }
                    }
                }
                SlotAnimation::FadeInRamp { elapsed_ms } => {
                    let elapsed_ms = elapsed_ms + dt_ms;
                    let ramp_ms = FADE_RAMP.as_millis() as u64;
                    if elapsed_ms >= ramp_ms {
                        state.alpha = 1.0;
                        if state.talking {
                            if let Some(sink) = sink.as_ref() {
                                sink.play(*slot, "Talking");
                            }
                        }
                        completed.push(format!("portrait.fade_in.done {slot}"));
                        SlotAnimation::Rest
                    } else {
                        state.alpha = elapsed_ms as f32 / ramp_ms as f32;
                        SlotAnimation::FadeInRamp { elapsed_ms }
                    }
                }
                SlotAnimation::FadeOutDelay { elapsed_ms } => {
                    let elapsed_ms = elapsed_ms + dt_ms;
                    if elapsed_ms >= FADE_STATE_DELAY.as_millis() as u64 {
                        if let Some(sink) = sink.as_ref() {
                            sink.play(*slot, "Idle");
                        }
                        SlotAnimation::FadeOutRamp {
                            elapsed_ms: elapsed_ms - FADE_STATE_DELAY.as_millis() as u64,
                        }
                    } else {
                        SlotAnimation::FadeOutDelay { elapsed_ms }
                    }
                }
                SlotAnimation::FadeOutRamp { elapsed_ms } => {
                    let elapsed_ms = elapsed_ms + dt_ms;
                    let ramp_ms = FADE_RAMP.as_millis() as u64;
                    if elapsed_ms >= ramp_ms {
                        state.alpha = 0.0;
                        state.visible = false;
                        state.sprite = None;
                        completed.push(format!("portrait.fade_out.done {slot}"));
                        SlotAnimation::Rest
                    } else {
                        state.alpha = 1.0 - elapsed_ms as f32 / ramp_ms as f32;
                        SlotAnimation::FadeOutRamp { elapsed_ms }
                    }
                }
            };
        }

        self.tick_background(dt, &mut completed);

        let mut events = self.events.borrow_mut();
        for entry in completed {
            events.log(entry);
        }
    }

    fn tick_background(&mut self, dt: Duration, completed: &mut Vec<String>) {
        self.background.animation = match self.background.animation.clone() {
            BackgroundAnimation::Rest => BackgroundAnimation::Rest,
            BackgroundAnimation::FadeToBlack { elapsed, pending } => {
                let elapsed = elapsed + dt;
                if elapsed >= BACKGROUND_FADE {
                    self.background.alpha = 0.0;
                    if pending.is_empty() {
                        self.background.sprite = None;
                        completed.push("background.fade_out.done".to_string());
                        BackgroundAnimation::Rest
                    } else {
                        self.background.sprite = Some(pending);
                        BackgroundAnimation::FadeInFromBlack {
                            elapsed: elapsed - BACKGROUND_FADE,
                        }
                    }
                } else {
                    self.background.alpha =
                        1.0 - elapsed.as_secs_f32() / BACKGROUND_FADE.as_secs_f32();
                    BackgroundAnimation::FadeToBlack { elapsed, pending }
                }
            }
            BackgroundAnimation::FadeInFromBlack { elapsed } => {
                let elapsed = elapsed + dt;
                if elapsed >= BACKGROUND_FADE {
                    self.background.alpha = 1.0;
                    completed.push(format!(
                        "background.fade.done {}",
                        self.background.sprite.as_deref().unwrap_or("<none>")
                    ));
                    BackgroundAnimation::Rest
                } else {
                    self.background.alpha =
                        elapsed.as_secs_f32() / BACKGROUND_FADE.as_secs_f32();
                    BackgroundAnimation::FadeInFromBlack { elapsed }
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use vn_formats::{DialogueNode, PortraitDirective, ScenarioScript, SlotId, SlotLayout};

    use super::{
        PresentationCoordinator, RecordingAnimationSink, BACKGROUND_FADE, FADE_RAMP,
        FADE_STATE_DELAY,
    };
    use crate::events::{shared_log, EventLogHandle};

    const TICK: Duration = Duration::from_millis(10);

    fn coordinator(log: &EventLogHandle) -> PresentationCoordinator {
        let sink = Rc::new(RecordingAnimationSink::new(log.clone()));
        PresentationCoordinator::new(SlotLayout::Trio, Some(sink), log.clone())
    }

    fn node_with_left(directive: PortraitDirective) -> DialogueNode {
        let script = ScenarioScript::parse(
            r#"{
                "key": "scenario1",
                "title": "Test",
                "layout": "trio",
                "start": 1,
                "dialogues": [ { "id": 1, "text": "Hi.", "terminal": true } ]
            }"#,
        )
        .expect("script parses");
        let mut node = script.dialogues[0].clone();
        node.portraits.insert(SlotId::Left, directive);
        node
    }

    fn settle(coordinator: &mut PresentationCoordinator) {
        let mut budget = 0;
        while !coordinator.is_settled() {
            coordinator.tick(TICK);
            budget += 1;
            assert!(budget < 1_000, "presentation never settled");
        }
    }

    #[test]
    fn fade_in_ramps_alpha_then_lands_talking() {
        let log = shared_log();
        let mut coordinator = coordinator(&log);
        let node = node_with_left(PortraitDirective {
            sprite: Some("hana_neutral".to_string()),
            visible: true,
            talking: true,
            fade_in: true,
            fade_out: false,
            mirrored: false,
        });

        coordinator.apply(&node);
        assert!(!coordinator.is_settled());
        assert_eq!(coordinator.slot(SlotId::Left).unwrap().alpha, 0.0);

        // Through the state delay, into the ramp.
        coordinator.tick(FADE_STATE_DELAY);
        coordinator.tick(FADE_RAMP / 2);
        let mid = coordinator.slot(SlotId::Left).unwrap().alpha;
        assert!(mid > 0.0 && mid < 1.0, "mid-ramp alpha was {mid}");

        settle(&mut coordinator);
        let state = coordinator.slot(SlotId::Left).unwrap();
        assert_eq!(state.alpha, 1.0);
        assert!(state.visible);
        assert!(log.borrow().contains("anim.play left FadeIn"));
        assert!(log.borrow().contains("portrait.fade_in.done left"));
        // Talking state lands after the ramp, not before.
        assert!(log.borrow().contains("anim.play left Talking"));
    }

    #[test]
    fn fade_out_hides_the_slot() {
        let log = shared_log();
        let mut coordinator = coordinator(&log);
        let shown = node_with_left(PortraitDirective {
            sprite: Some("aaron_neutral".to_string()),
            visible: true,
            talking: false,
            fade_in: false,
            fade_out: false,
            mirrored: false,
        });
        coordinator.apply(&shown);
        assert!(coordinator.is_settled());

        let fading = node_with_left(PortraitDirective {
            sprite: Some("aaron_neutral".to_string()),
            visible: true,
            talking: false,
            fade_in: false,
            fade_out: true,
            mirrored: false,
        });
        coordinator.apply(&fading);
        settle(&mut coordinator);

        let state = coordinator.slot(SlotId::Left).unwrap();
        assert!(!state.visible);
        assert_eq!(state.alpha, 0.0);
        assert!(state.sprite.is_none());
        assert!(log.borrow().contains("portrait.fade_out.done left"));
    }

    #[test]
    fn reapply_mid_fade_lands_on_resting_alpha() {
        let log = shared_log();
        let mut coordinator = coordinator(&log);
        let fade_in = node_with_left(PortraitDirective {
            sprite: Some("sara_neutral".to_string()),
            visible: true,
            talking: false,
            fade_in: true,
            fade_out: false,
            mirrored: false,
        });
        coordinator.apply(&fade_in);
        coordinator.tick(FADE_STATE_DELAY);
        coordinator.tick(FADE_RAMP / 4);

        let plain = node_with_left(PortraitDirective {
            sprite: Some("sara_neutral".to_string()),
            visible: true,
            talking: false,
            fade_in: false,
            fade_out: false,
            mirrored: false,
        });
        coordinator.apply(&plain);

        let state = coordinator.slot(SlotId::Left).unwrap();
        assert!(coordinator.is_settled());
        assert_eq!(state.alpha, 1.0);
    }

    #[test]
    fn undirected_slots_are_hidden() {
        let log = shared_log();
        let mut coordinator = coordinator(&log);
        let node = node_with_left(PortraitDirective {
            sprite: Some("limei_neutral".to_string()),
            visible: true,
            talking: false,
            fade_in: false,
            fade_out: false,
            mirrored: true,
        });
        coordinator.apply(&node);

        let left = coordinator.slot(SlotId::Left).unwrap();
        assert!(left.visible);
        assert!(left.mirrored);
        let center = coordinator.slot(SlotId::Center).unwrap();
        assert!(!center.visible);
        assert_eq!(center.alpha, 0.0);
    }

    #[test]
    fn background_fades_through_black() {
        let log = shared_log();
        let mut coordinator = coordinator(&log);
        let mut node = node_with_left(PortraitDirective::default());
        node.background = Some("clinic_day".to_string());
        node.background_fade_in = true;

        coordinator.apply(&node);
        assert!(!coordinator.is_settled());

        // Sprite swaps only once the fade to black has finished.
        coordinator.tick(BACKGROUND_FADE / 2);
        assert!(coordinator.background().sprite.is_none());

        settle(&mut coordinator);
        assert_eq!(coordinator.background().sprite.as_deref(), Some("clinic_day"));
        assert_eq!(coordinator.background().alpha, 1.0);
        assert!(log.borrow().contains("background.fade.done clinic_day"));
    }

    #[test]
    fn missing_sink_disables_portraits() {
        let log = shared_log();
        let mut coordinator =
            PresentationCoordinator::new(SlotLayout::Trio, None, log.clone());
        let node = node_with_left(PortraitDirective {
            sprite: Some("hana_neutral".to_string()),
            visible: true,
            talking: true,
            fade_in: true,
            fade_out: false,
            mirrored: false,
        });
        coordinator.apply(&node);

        assert!(coordinator.is_settled());
        assert!(!coordinator.slot(SlotId::Left).unwrap().visible);
        assert!(log
            .borrow()
            .contains("presentation.disabled missing animation sink"));
    }
}
