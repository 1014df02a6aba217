//! Translator instruction templates.
//!
//! The tagged wire format only survives a translator that keeps segment
//! count, order and ids intact, so every instruction spells that out.

use crate::common::{Error, Result};

/// Source and target language names as they appear in instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

/// Well-known pair codes.
const PAIR_CODES: &[(&str, &str, &str)] = &[
    ("zh-en", "Chinese", "English"),
    ("ja-en", "Japanese", "English"),
    ("ko-en", "Korean", "English"),
    ("zh-ja", "Chinese", "Japanese"),
    ("en-zh", "English", "Chinese"),
    ("en-ja", "English", "Japanese"),
];

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Resolve a code such as `"zh-en"`.
    pub fn from_code(code: &str) -> Result<Self> {
        PAIR_CODES
            .iter()
            .find(|(c, _, _)| c.eq_ignore_ascii_case(code))
            .map(|(_, source, target)| Self::new(*source, *target))
            .ok_or_else(|| {
                let known: Vec<&str> = PAIR_CODES.iter().map(|(c, _, _)| *c).collect();
                Error::Config(format!(
                    "unsupported language pair '{}', expected one of {}",
                    code,
                    known.join(", ")
                ))
            })
    }
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self::new("Chinese", "English")
    }
}

/// Instructions for translating a full single-block or chunk payload.
pub fn translation_instructions(pair: &LanguagePair) -> String {
    format!(
        r#"Translate the following text segments from {source} to {target}.

RULES:
1. Return exactly as many segments as you were given.
2. Keep every id attribute unchanged and in the same order (001, 002, 003, ...).
3. Never merge, split or drop segments, even when they look like parts of one sentence.
4. Translate only the text between the tags.
5. Answer with the tagged segments only, using XML escaping for <, > and &.

Input:  <segment id="001">Original text</segment>
Output: <segment id="001">Translated text</segment>

Example input:
<segment id="001">案例</segment>
<segment id="002">張紘賓</segment>
<segment id="003">2025/4/28</segment>

Example output:
<segment id="001">Case</segment>
<segment id="002">Zhang Hongbin</segment>
<segment id="003">2025/4/28</segment>

Numbers, dates and proper names may stay as they are. Keep terminology consistent.

Segments:"#,
        source = pair.source,
        target = pair.target
    )
}

/// Instructions for one chunk of a larger document.
pub fn batch_instructions(pair: &LanguagePair, segment_count: usize) -> String {
    format!(
        r#"Translate this batch of {count} text segments from {source} to {target}.
The batch is part of a larger document.

RULES:
1. Return exactly {count} segments with the same ids in the same order.
2. Translate each segment on its own; do not merge related segments.
3. Keep the <segment id="XXX">...</segment> structure exactly.
4. Keep terminology consistent within the batch.

Batch:"#,
        count = segment_count,
        source = pair.source,
        target = pair.target
    )
}

/// Instructions asking a translator to fix its malformed output.
pub fn repair_instructions() -> &'static str {
    r#"The following translation output is not well-formed. Rewrite it so that:
1. Every segment is <segment id="NNN">text</segment> with its original id.
2. The number of segments is unchanged.
3. The translated text itself is unchanged apart from XML escaping.

Output to repair:"#
}
