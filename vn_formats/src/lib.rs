pub mod collection;
pub mod script;

pub use collection::ScriptCollection;
pub use script::{
    DialogueNode, PortraitDirective, ResponseOption, ScenarioScript, SlotId, SlotLayout,
    ValidationIssue,
};
