use serde_json::{json, Map, Value};

use soberly_core::domain::check_in::{Mood, MAX_URGE_INTENSITY};
use soberly_core::domain::coping::StressLevel;

pub const GET_SOBRIETY_PROGRESS: &str = "get_sobriety_progress";
pub const GET_MOOD_TRENDS: &str = "get_mood_trends";
pub const GET_ACTIVE_GOALS: &str = "get_active_goals";
pub const SUGGEST_COPING_ACTIVITIES: &str = "suggest_coping_activities";
pub const GET_RECENT_JOURNAL_ENTRIES: &str = "get_recent_journal_entries";
pub const GET_BIOMETRIC_SUMMARY: &str = "get_biometric_summary";
pub const CREATE_GOAL: &str = "create_goal";
pub const CREATE_CHECK_IN: &str = "create_check_in";
pub const CREATE_JOURNAL_ENTRY: &str = "create_journal_entry";
pub const COMPLETE_GOAL: &str = "complete_goal";
pub const LOG_COPING_ACTIVITY: &str = "log_coping_activity";
pub const LOG_INTERVENTION: &str = "log_intervention";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolAccess {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
    pub allowed_values: Option<Vec<&'static str>>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl ParameterSpec {
    fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            allowed_values: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: Vec<&'static str>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    pub fn range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.kind.json_type()));
        schema.insert("description".to_string(), json!(self.description));
        if let Some(values) = &self.allowed_values {
            schema.insert("enum".to_string(), json!(values));
        }
        if let Some(minimum) = self.minimum {
            schema.insert("minimum".to_string(), json!(minimum));
        }
        if let Some(maximum) = self.maximum {
            schema.insert("maximum".to_string(), json!(maximum));
        }
        Value::Object(schema)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub access: ToolAccess,
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDefinition {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    /// OpenAI function-tool schema.
    pub fn json_schema(&self) -> Value {
        let properties = self
            .parameters
            .iter()
            .map(|parameter| (parameter.name.to_string(), parameter.json_schema()))
            .collect::<Map<_, _>>();
        let required = self
            .parameters
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| parameter.name)
            .collect::<Vec<_>>();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                },
            },
        })
    }
}

/// Immutable tool catalog, built once and shared behind an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(definitions: Vec<ToolDefinition>) -> Self {
        Self { definitions }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            ToolDefinition {
                name: GET_SOBRIETY_PROGRESS,
                description: "Get the user's sobriety progress: days sober, current and longest check-in streak.",
                access: ToolAccess::Read,
                parameters: Vec::new(),
            },
            ToolDefinition {
                name: GET_MOOD_TRENDS,
                description: "Summarize check-ins from the last 7 days and whether urges are improving.",
                access: ToolAccess::Read,
                parameters: Vec::new(),
            },
            ToolDefinition {
                name: GET_ACTIVE_GOALS,
                description: "List the user's active goals with days remaining.",
                access: ToolAccess::Read,
                parameters: Vec::new(),
            },
            ToolDefinition {
                name: SUGGEST_COPING_ACTIVITIES,
                description: "Suggest coping activities for a stress level. Use crisis when the user may be in danger.",
                access: ToolAccess::Read,
                parameters: vec![ParameterSpec::string(
                    "stress_level",
                    "How stressed the user is right now.",
                )
                .required()
                .one_of(StressLevel::names())],
            },
            ToolDefinition {
                name: GET_RECENT_JOURNAL_ENTRIES,
                description: "Get excerpts of the user's most recent journal entries.",
                access: ToolAccess::Read,
                parameters: vec![ParameterSpec::integer(
                    "limit",
                    "How many entries to return (default 3, at most 10).",
                )],
            },
            ToolDefinition {
                name: GET_BIOMETRIC_SUMMARY,
                description: "Average sleep, steps and stress over recent days with short insights.",
                access: ToolAccess::Read,
                parameters: vec![ParameterSpec::integer(
                    "days",
                    "Number of days to summarize (default 7).",
                )],
            },
            ToolDefinition {
                name: CREATE_GOAL,
                description: "Create a new recovery goal for the user.",
                access: ToolAccess::Write,
                parameters: vec![
                    ParameterSpec::string("title", "Short goal title, e.g. 'Meditate daily'.")
                        .required(),
                    ParameterSpec::string("description", "Optional longer description."),
                    ParameterSpec::integer("target_days", "Length of the goal in days (default 30).")
                        .range(1, 3_650),
                ],
            },
            ToolDefinition {
                name: CREATE_CHECK_IN,
                description: "Record a daily check-in with the user's mood and urge intensity.",
                access: ToolAccess::Write,
                parameters: vec![
                    ParameterSpec::string("mood", "The user's mood.").required().one_of(Mood::names()),
                    ParameterSpec::integer("urge_intensity", "Urge intensity from 0 (none) to 10.")
                        .range(0, i64::from(MAX_URGE_INTENSITY)),
                    ParameterSpec::string("notes", "Optional free-text notes."),
                ],
            },
            ToolDefinition {
                name: CREATE_JOURNAL_ENTRY,
                description: "Save a journal entry for the user.",
                access: ToolAccess::Write,
                parameters: vec![
                    ParameterSpec::string("content", "The journal text.").required(),
                    ParameterSpec::string("title", "Optional title; a dated title is used otherwise."),
                ],
            },
            ToolDefinition {
                name: COMPLETE_GOAL,
                description: "Mark one of the user's active goals as completed, matched by title.",
                access: ToolAccess::Write,
                parameters: vec![ParameterSpec::string(
                    "goal_title",
                    "The title, or part of the title, of the goal to complete.",
                )
                .required()],
            },
            ToolDefinition {
                name: LOG_COPING_ACTIVITY,
                description: "Log that the user used a coping activity. Repeated activities increase a usage counter.",
                access: ToolAccess::Write,
                parameters: vec![
                    ParameterSpec::string("activity_name", "Name of the activity, e.g. 'Deep breathing'.")
                        .required(),
                    ParameterSpec::string("category", "Optional category such as breathing or exercise."),
                ],
            },
            ToolDefinition {
                name: LOG_INTERVENTION,
                description: "Record that a proactive supportive intervention happened in this conversation.",
                access: ToolAccess::Write,
                parameters: vec![
                    ParameterSpec::string("intervention_type", "Kind of intervention, e.g. 'craving_support'.")
                        .required(),
                    ParameterSpec::string("message", "What was offered to the user."),
                    ParameterSpec::string("risk_level", "Optional assessed risk level."),
                ],
            },
        ])
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|definition| definition.name == name)
    }

    /// Read tools always; write tools only when `write_enabled`.
    pub fn active(&self, write_enabled: bool) -> ActiveToolSet<'_> {
        ActiveToolSet {
            definitions: self
                .definitions
                .iter()
                .filter(|definition| write_enabled || definition.access == ToolAccess::Read)
                .collect(),
        }
    }

    pub fn none(&self) -> ActiveToolSet<'_> {
        ActiveToolSet { definitions: Vec::new() }
    }
}

/// The subset of tools the model may call during one request.
#[derive(Clone, Debug)]
pub struct ActiveToolSet<'a> {
    definitions: Vec<&'a ToolDefinition>,
}

impl<'a> ActiveToolSet<'a> {
    pub fn get(&self, name: &str) -> Option<&'a ToolDefinition> {
        self.definitions.iter().copied().find(|definition| definition.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn includes_writes(&self) -> bool {
        self.definitions.iter().any(|definition| definition.access == ToolAccess::Write)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.definitions.iter().map(|definition| definition.name).collect()
    }

    pub fn schemas(&self) -> Vec<Value> {
        self.definitions.iter().map(|definition| definition.json_schema()).collect()
    }
}
