//! Embedded-object extraction: JSON objects carrying a kind field

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Candidate, CommandCatalog, Extraction, Extractor, assemble};

/// Field naming the command kind unless configured otherwise
pub const DEFAULT_KIND_FIELD: &str = "action_type";

/// Markdown code fence openers and closers
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("Invalid code fence regex"));

/// Extracts commands from JSON objects embedded anywhere in the text
///
/// The whole text is first tried as a single JSON value (an object or an
/// array of objects). When that fails the text is scanned: at every
/// non-whitespace position one JSON value is decoded if possible and the scan
/// jumps past it, otherwise it advances by one character. Every object that
/// carries the kind field becomes a candidate.
pub struct JsonObjectExtractor {
    catalog: CommandCatalog,
    kind_field: String,
    ignored: Vec<String>,
}

impl JsonObjectExtractor {
    pub fn new(catalog: CommandCatalog) -> Self {
        debug!("JsonObjectExtractor::new: called");
        Self {
            catalog,
            kind_field: DEFAULT_KIND_FIELD.to_string(),
            ignored: Vec::new(),
        }
    }

    /// Use a different field name for the command kind
    pub fn with_kind_field(mut self, field: impl Into<String>) -> Self {
        self.kind_field = field.into();
        self
    }

    /// Kinds to skip without error
    pub fn with_ignored(mut self, kinds: &[&str]) -> Self {
        self.ignored = kinds.iter().map(|s| s.to_lowercase()).collect();
        self
    }

    pub fn kind_field(&self) -> &str {
        &self.kind_field
    }

    fn candidates(&self, text: &str) -> Vec<Candidate> {
        let cleaned = CODE_FENCE.replace_all(text, "");
        let cleaned = cleaned.trim();
        let mut out = Vec::new();

        match serde_json::from_str::<Value>(cleaned) {
            Ok(value) => {
                debug!("JsonObjectExtractor::candidates: whole text is one value");
                self.collect(value, &mut out);
            }
            Err(_) => {
                debug!("JsonObjectExtractor::candidates: scanning for embedded objects");
                self.scan(cleaned, &mut out);
            }
        }

        out
    }

    fn scan(&self, text: &str, out: &mut Vec<Candidate>) {
        let mut idx = 0;

        while idx < text.len() {
            let rest = &text[idx..];
            let trimmed = rest.trim_start();
            idx += rest.len() - trimmed.len();
            if trimmed.is_empty() {
                break;
            }

            let mut stream = serde_json::Deserializer::from_str(trimmed).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) => {
                    let consumed = stream.byte_offset().max(1);
                    self.collect(value, out);
                    idx += consumed;
                }
                _ => {
                    idx += trimmed.chars().next().map_or(1, char::len_utf8);
                }
            }
        }
    }

    fn collect(&self, value: Value, out: &mut Vec<Candidate>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(map) = item
                        && let Some(candidate) = self.candidate(map)
                    {
                        out.push(candidate);
                    }
                }
            }
            Value::Object(map) => {
                if let Some(candidate) = self.candidate(map) {
                    out.push(candidate);
                }
            }
            _ => {}
        }
    }

    fn candidate(&self, mut map: Map<String, Value>) -> Option<Candidate> {
        let kind = match map.remove(&self.kind_field)? {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Some(Candidate {
            kind,
            payload: Ok(Value::Object(map)),
        })
    }
}

impl Extractor for JsonObjectExtractor {
    fn extract(&self, text: &str) -> Extraction {
        debug!(text_len = %text.len(), kind_field = %self.kind_field, "JsonObjectExtractor::extract: called");
        assemble(&self.catalog, &self.ignored, self.candidates(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandKind};
    use proptest::prelude::*;

    fn extractor() -> JsonObjectExtractor {
        JsonObjectExtractor::new(CommandCatalog::optimiser())
    }

    #[test]
    fn test_single_object() {
        let extraction = extractor().extract(r#"{"action_type": "read", "file_path": "agent.py"}"#);
        assert_eq!(extraction.commands.len(), 1);
        assert!(extraction.found_any_candidate);
    }

    #[test]
    fn test_array_of_objects() {
        let text = r#"[
            {"action_type": "debug_log", "message": "checking"},
            {"action_type": "bash", "cmd": "ls"}
        ]"#;
        let extraction = extractor().extract(text);
        assert_eq!(extraction.commands.len(), 2);
        assert_eq!(extraction.commands[1].kind(), CommandKind::Bash);
    }

    #[test]
    fn test_code_fences_are_stripped() {
        let text = "Here you go:\n```json\n{\"action_type\": \"finish\", \"message\": \"done\"}\n```\n";
        let extraction = extractor().extract(text);
        assert_eq!(extraction.commands.len(), 1);
        assert_eq!(extraction.commands[0].kind(), CommandKind::Finish);
    }

    #[test]
    fn test_objects_embedded_in_prose() {
        let text = r#"First I will look: {"action_type": "read", "file_path": "a.txt"} and then
            run something {"action_type": "bash", "cmd": "make test", "timeout_secs": 60}. Thanks!"#;
        let extraction = extractor().extract(text);
        assert_eq!(extraction.commands.len(), 2);
        assert!(extraction.errors.is_empty());
    }

    #[test]
    fn test_edit_with_custom_kind_field_mid_paragraph() {
        let extractor = JsonObjectExtractor::new(CommandCatalog::optimiser()).with_kind_field("kind");
        let text = r#"The bug is obvious, so {"kind":"edit","file":"a.py","old":"x","new":"y"} should fix it."#;
        let extraction = extractor.extract(text);

        assert_eq!(extraction.commands.len(), 1);
        match &extraction.commands[0] {
            Command::Edit(edit) => {
                assert_eq!(edit.file_path, "a.py");
                assert_eq!(edit.old_string, "x");
                assert_eq!(edit.new_string, "y");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_objects_without_kind_are_ignored() {
        let extraction = extractor().extract(r#"The config is {"timeout": 5} as before."#);
        assert!(extraction.commands.is_empty());
        assert!(!extraction.found_any_candidate);
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let text = r#"{"action_type": "teleport"} {"action_type": "read", "file_path": "a"}"#;
        let extraction = extractor().extract(text);
        assert_eq!(extraction.commands.len(), 1);
        assert_eq!(extraction.errors.len(), 1);
        assert!(extraction.errors[0].contains("Unknown command kind: teleport"));
    }

    #[test]
    fn test_invalid_payload_is_an_error() {
        let text = r#"{"action_type": "reset_to_iteration", "iteration_number": 1, "reason": "short"}"#;
        let extraction = extractor().extract(text);
        assert!(extraction.commands.is_empty());
        assert_eq!(extraction.errors.len(), 1);
        assert!(extraction.errors[0].starts_with("[reset_to_iteration] Validation error: reason"));
    }

    #[test]
    fn test_malformed_json_recovers() {
        let text = r#"{"action_type": "read", "file_path": } oops {"action_type": "finish", "message": "ok"}"#;
        let extraction = extractor().extract(text);
        assert_eq!(extraction.commands.len(), 1);
        assert_eq!(extraction.commands[0].kind(), CommandKind::Finish);
    }

    #[test]
    fn test_no_markers() {
        let extraction = extractor().extract("I am thinking about what to do next.");
        assert!(extraction.commands.is_empty());
        assert!(extraction.errors.is_empty());
        assert!(!extraction.found_any_candidate);
    }

    #[test]
    fn test_ignored_kind_counts_as_detected() {
        let extractor = extractor().with_ignored(&["think"]);
        let extraction = extractor.extract(r#"{"action_type": "think", "thought": "hmm"}"#);
        assert!(extraction.commands.is_empty());
        assert!(extraction.errors.is_empty());
        assert!(extraction.found_any_candidate);
    }

    #[test]
    fn test_multibyte_prose() {
        let text = r#"Voilà — résumé: {"action_type": "debug_log", "message": "ünïcode"}"#;
        let extraction = extractor().extract(text);
        assert_eq!(extraction.commands.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_counts_valid_and_invalid_payloads(
            paths in prop::collection::vec("[a-z]{1,8}\\.txt", 0..5),
            invalid in 0usize..4,
            prose in prop::collection::vec("[a-zA-Z ,.]{0,30}", 10),
        ) {
            let mut text = String::new();
            let mut pieces = Vec::new();
            for path in &paths {
                pieces.push(format!(r#"{{"action_type": "read", "file_path": "{}"}}"#, path));
            }
            for _ in 0..invalid {
                pieces.push(r#"{"action_type": "read", "file_path": ""}"#.to_string());
            }
            for (i, piece) in pieces.iter().enumerate() {
                text.push_str(&prose[i % prose.len()]);
                text.push(' ');
                text.push_str(piece);
                text.push(' ');
            }
            text.push_str(&prose[prose.len() - 1]);

            let extraction = extractor().extract(&text);
            prop_assert_eq!(extraction.commands.len(), paths.len());
            prop_assert_eq!(extraction.errors.len(), invalid);
            prop_assert_eq!(extraction.found_any_candidate, !pieces.is_empty());
        }

        #[test]
        fn prop_prose_without_markers_finds_nothing(prose in "[a-zA-Z ,.!?]{0,200}") {
            let extraction = extractor().extract(&prose);
            prop_assert!(extraction.commands.is_empty());
            prop_assert!(extraction.errors.is_empty());
            prop_assert!(!extraction.found_any_candidate);
        }
    }
}
