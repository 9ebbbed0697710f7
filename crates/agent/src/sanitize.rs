//! Prompt-injection scrubbing for user-supplied text.

use regex::Regex;

use soberly_core::text::truncate_chars;

const INJECTION_PATTERNS: &[&str] = &[
    r"(?i)\b(?:system|assistant|user)\s*:",
    r"<\|[^|]*\|>",
    r"(?i)\[/?inst\]",
    r"(?i)<</?sys>>",
    r"(?i)###\s*(?:instructions?|system)\s*:?",
    r"(?i)ignore\s+(?:all\s+)?(?:the\s+)?(?:previous|prior|above)\s+instructions?",
];

/// Removes role-switch markers and chat-template delimiters, then bounds the length.
///
/// Removal repeats until nothing matches, so markers reassembled from fragments
/// (`sys<|x|>tem:`) are removed as well. The output is a fixed point:
/// sanitizing it again with the same limit returns it unchanged.
#[derive(Clone, Debug)]
pub struct Sanitizer {
    patterns: Vec<Regex>,
}

impl Sanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns =
            INJECTION_PATTERNS.iter().map(|pattern| Regex::new(pattern)).collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn sanitize(&self, text: &str, max_length: usize) -> String {
        let mut current = text.to_string();
        loop {
            let mut changed = false;
            for pattern in &self.patterns {
                if pattern.is_match(&current) {
                    current = pattern.replace_all(&current, "").into_owned();
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        truncate_chars(&current, max_length).trim().to_string()
    }
}
