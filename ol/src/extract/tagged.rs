//! Delimited-block extraction: `<kind>` YAML body `</kind>`

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{Candidate, CommandCatalog, Extraction, Extractor, assemble};
use crate::command::CommandKind;

/// Tags skipped without error by default
pub const DEFAULT_IGNORED_TAGS: &[&str] = &["think"];

/// An opening tag at the start of a line, after optional indentation
static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*<(\w+)>").expect("Invalid opening tag regex"));

/// Extracts commands from top-level `<kind>...</kind>` blocks
///
/// Blocks are not nested: a block runs from its opening tag to the first
/// matching closing tag, and scanning resumes after it. Snake_case tags that
/// name no command kind are reported as unknown commands, other unknown tags
/// (HTML, prose markup) are skipped silently. Tags in the ignore list count
/// as detected candidates but produce nothing.
pub struct TaggedBlockExtractor {
    catalog: CommandCatalog,
    ignored: Vec<String>,
}

impl TaggedBlockExtractor {
    pub fn new(catalog: CommandCatalog) -> Self {
        debug!("TaggedBlockExtractor::new: called");
        Self {
            catalog,
            ignored: DEFAULT_IGNORED_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the ignore list
    pub fn with_ignored(mut self, tags: &[&str]) -> Self {
        self.ignored = tags.iter().map(|s| s.to_lowercase()).collect();
        self
    }

    fn is_ignored(&self, tag: &str) -> bool {
        let lowered = tag.to_lowercase();
        self.ignored.iter().any(|t| *t == lowered)
    }

    /// Find `(tag, inner)` pairs in document order
    fn blocks<'a>(&self, text: &'a str) -> Vec<(&'a str, &'a str)> {
        let mut blocks = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            let Some(caps) = OPEN_TAG.captures_at(text, pos) else {
                break;
            };
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };

            let tag = name.as_str();
            let body_start = whole.end();
            let closing = format!("</{}>", tag);

            match text[body_start..].find(&closing) {
                Some(offset) => {
                    let body_end = body_start + offset;
                    blocks.push((tag, &text[body_start..body_end]));
                    pos = body_end + closing.len();
                }
                None => {
                    debug!(%tag, "TaggedBlockExtractor::blocks: unclosed tag");
                    pos = body_start;
                }
            }
        }

        blocks
    }
}

impl Extractor for TaggedBlockExtractor {
    fn extract(&self, text: &str) -> Extraction {
        debug!(text_len = %text.len(), "TaggedBlockExtractor::extract: called");
        let candidates = self
            .blocks(text)
            .into_iter()
            .filter(|(tag, _)| self.is_ignored(tag) || CommandKind::parse(tag).is_some() || looks_like_command(tag))
            .map(|(tag, body)| Candidate {
                kind: tag.to_string(),
                payload: parse_body(body),
            })
            .collect();

        assemble(&self.catalog, &self.ignored, candidates)
    }
}

/// Command names are snake_case; markup tags never contain an underscore
fn looks_like_command(tag: &str) -> bool {
    tag.contains('_')
}

fn parse_body(body: &str) -> Result<Value, String> {
    let document = dedent(body);
    let yaml: serde_yaml::Value = serde_yaml::from_str(document.trim()).map_err(|e| format!("YAML error: {}", e))?;
    serde_json::to_value(yaml).map_err(|e| format!("YAML error: {}", e))
}

/// Remove the whitespace prefix shared by every non-blank line
fn dedent(text: &str) -> String {
    let prefix_len = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| {
            if line.len() >= prefix_len && line.is_char_boundary(prefix_len) {
                &line[prefix_len..]
            } else {
                line.trim_start()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
