use std::collections::BTreeMap;

use vn_formats::{DialogueNode, ResponseOption, ScenarioScript};

/// Keyed lookup over one scenario's dialogue and response tables. Built
/// once at session start; read-only afterwards. Absent ids come back as
/// None rather than panicking.
#[derive(Debug)]
pub struct ScriptDatabase<'a> {
    dialogues: BTreeMap<u32, &'a DialogueNode>,
    responses: BTreeMap<u32, &'a ResponseOption>,
}

impl<'a> ScriptDatabase<'a> {
    pub fn new(script: &'a ScenarioScript) -> Self {
        let dialogues = script
            .dialogues
            .iter()
            .map(|node| (node.id, node))
            .collect();
        let responses = script
            .responses
            .iter()
            .map(|response| (response.id, response))
            .collect();
        Self {
            dialogues,
            responses,
        }
    }

    pub fn dialogue(&self, id: u32) -> Option<&'a DialogueNode> {
        self.dialogues.get(&id).copied()
    }

    pub fn response(&self, id: u32) -> Option<&'a ResponseOption> {
        self.responses.get(&id).copied()
    }

    pub fn dialogue_count(&self) -> usize {
        self.dialogues.len()
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }
}

#[cfg(test)]
mod tests {
    use vn_formats::ScenarioScript;

    use super::ScriptDatabase;

    fn sample() -> ScenarioScript {
        ScenarioScript::parse(
            r#"{
                "key": "scenario1",
                "title": "Test",
                "layout": "trio",
                "start": 10,
                "dialogues": [
                    { "id": 10, "text": "One.", "next": 11 },
                    { "id": 11, "text": "Two.", "terminal": true }
                ],
                "responses": [
                    { "id": 5, "text": "Sure.", "category": "A", "next": 11 }
                ]
            }"#,
        )
        .expect("sample parses")
    }

    #[test]
    fn lookups_return_known_entries() {
        let script = sample();
        let db = ScriptDatabase::new(&script);

        assert_eq!(db.dialogue(10).map(|node| node.id), Some(10));
        assert_eq!(db.response(5).map(|response| response.id), Some(5));
        assert_eq!(db.dialogue_count(), 2);
        assert_eq!(db.response_count(), 1);
    }

    #[test]
    fn lookups_return_absence_not_panics() {
        let script = sample();
        let db = ScriptDatabase::new(&script);

        assert!(db.dialogue(404).is_none());
        assert!(db.response(404).is_none());
    }
}
