//! Decides per message whether mutating tools are offered to the model.
//!
//! Vague statements ("I want to create a goal") keep the write tools hidden so the
//! model asks a clarifying question instead of guessing parameters.

use regex::Regex;

const GOAL_WORDS: &str = r"(?i)\b(?:goals?|challenges?|habits?|streaks?)\b";
const DURATION: &str = r"(?i)\b\d{1,4}\s*(?:days?|weeks?|months?)\b|\b(?:every\s*day|daily|weekly)\b";
const NAMED_ACTIVITY: &str = r"(?i)\b(?:meditat\w*|exercis\w*|run(?:s|ning)?|walk(?:s|ing)?|yoga|read(?:ing)?|journal(?:ing)?|gym|meetings?|sleep\w*|breath\w*|stretch\w*|swim\w*)\b";

const MOOD_STATEMENTS: &[&str] = &[
    r"(?i)\b(?:my\s+mood\s+(?:is|was|has\s+been)|i\s+am|i'm|i’m|im|feeling|feel)\s+(?:(?:really|pretty|very|quite|so|fairly)\s+)?(?:great|good|okay|ok|struggling|difficult)\b",
    r"(?i)\bmood\s*[:=]\s*(?:great|good|okay|ok|struggling|difficult)\b",
    r"(?i)\b(?:urges?|cravings?)\b[^.!?\d]{0,20}\d{1,2}\s*(?:/\s*10|out\s+of\s+10)",
];

const IMPERATIVE_ACTION: &str = r"(?i)(?:^|[.!?;:\n]\s*|\b(?:please|pls|can\s+you|could\s+you|would\s+you|help\s+me)\s+)(?:create|log|set|add|record|start|complete|mark|track|save|write)\b[^.!?\n]{0,40}?\b(?:goals?|check[\s-]?ins?|journal|entry|entries|activity|activities|mood|urges?)\b";

/// Outcome of the three independent heuristics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateDecision {
    pub goal_with_parameters: bool,
    pub explicit_mood: bool,
    pub imperative_action: bool,
}

impl GateDecision {
    pub fn enables_write_tools(&self) -> bool {
        self.goal_with_parameters || self.explicit_mood || self.imperative_action
    }
}

/// Replaceable policy seam; the orchestration loop only sees this trait.
pub trait GateClassifier: Send + Sync {
    fn classify(&self, raw_message: &str) -> GateDecision;

    fn should_enable_write_tools(&self, raw_message: &str) -> bool {
        self.classify(raw_message).enables_write_tools()
    }
}

#[derive(Clone, Debug)]
pub struct HeuristicGate {
    goal_words: Regex,
    duration: Regex,
    named_activity: Regex,
    mood_statements: Vec<Regex>,
    imperative_action: Regex,
}

impl HeuristicGate {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            goal_words: Regex::new(GOAL_WORDS)?,
            duration: Regex::new(DURATION)?,
            named_activity: Regex::new(NAMED_ACTIVITY)?,
            mood_statements: MOOD_STATEMENTS
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<_, _>>()?,
            imperative_action: Regex::new(IMPERATIVE_ACTION)?,
        })
    }
}

impl GateClassifier for HeuristicGate {
    fn classify(&self, raw_message: &str) -> GateDecision {
        let message = raw_message.trim();
        GateDecision {
            goal_with_parameters: self.goal_words.is_match(message)
                && (self.duration.is_match(message) || self.named_activity.is_match(message)),
            explicit_mood: self.mood_statements.iter().any(|pattern| pattern.is_match(message)),
            imperative_action: self.imperative_action.is_match(message),
        }
    }
}

/// Gate that never offers write tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOnlyGate;

impl GateClassifier for ReadOnlyGate {
    fn classify(&self, _raw_message: &str) -> GateDecision {
        GateDecision::default()
    }
}
