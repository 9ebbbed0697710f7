use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use soberly_core::domain::check_in::{CheckIn, CheckInId, Mood};
use soberly_core::domain::coping::{CopingActivity, CopingActivityId};
use soberly_core::domain::goal::{Goal, GoalId};
use soberly_core::domain::intervention::{Intervention, InterventionId};
use soberly_core::domain::journal::{default_title, JournalEntry, JournalEntryId};
use soberly_core::domain::profile::{recalculate_streak, Profile};

use super::executor::{
    arg_i64, arg_str, ToolArguments, ToolContext, ToolError, ToolExecutor, ToolHandler, ToolResult,
};
use super::fuzzy::best_match;
use super::registry::{
    COMPLETE_GOAL, CREATE_CHECK_IN, CREATE_GOAL, CREATE_JOURNAL_ENTRY, LOG_COPING_ACTIVITY,
    LOG_INTERVENTION,
};

pub(crate) fn register(executor: &mut ToolExecutor) {
    executor.register(CreateGoal);
    executor.register(CreateCheckIn);
    executor.register(CreateJournalEntry);
    executor.register(CompleteGoal);
    executor.register(LogCopingActivity);
    executor.register(LogIntervention);
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn optional_text(arguments: &ToolArguments, name: &str) -> Option<String> {
    arg_str(arguments, name).filter(|value| !value.is_empty()).map(str::to_string)
}

fn required_text<'a>(
    arguments: &'a ToolArguments,
    tool: &str,
    name: &str,
) -> Result<&'a str, ToolError> {
    arg_str(arguments, name).filter(|value| !value.is_empty()).ok_or_else(|| {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing required parameter `{name}`"),
        }
    })
}

pub struct CreateGoal;

#[async_trait]
impl ToolHandler for CreateGoal {
    fn name(&self) -> &'static str {
        CREATE_GOAL
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let title = required_text(arguments, CREATE_GOAL, "title")?;
        let target_days = arg_i64(arguments, "target_days").and_then(|days| u32::try_from(days).ok());

        let goal = Goal::start(
            GoalId(new_id("G")),
            context.user_id.clone(),
            title,
            optional_text(arguments, "description"),
            target_days,
            context.now,
        );
        let payload = json!({
            "goal_id": goal.id.0,
            "title": goal.title,
            "target_days": goal.target_days,
            "start_date": goal.start_date,
            "end_date": goal.end_date,
        });
        context.repositories.goals.save(goal).await?;

        info!(event_name = "tool.goal_created", user_id = %context.user_id, "goal created");
        Ok(ToolResult::ok(payload).with_message(format!("Goal \"{title}\" created.")))
    }
}

pub struct CreateCheckIn;

#[async_trait]
impl ToolHandler for CreateCheckIn {
    fn name(&self) -> &'static str {
        CREATE_CHECK_IN
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let mood = required_text(arguments, CREATE_CHECK_IN, "mood")?.parse::<Mood>()?;
        let urge_intensity =
            arg_i64(arguments, "urge_intensity").and_then(|urge| u8::try_from(urge).ok());

        let check_in = CheckIn {
            id: CheckInId(new_id("C")),
            user_id: context.user_id.clone(),
            mood,
            urge_intensity,
            notes: optional_text(arguments, "notes"),
            created_at: context.now,
        };
        let check_in_id = check_in.id.0.clone();
        context.repositories.check_ins.insert(check_in).await?;

        let dates = context.repositories.check_ins.list_dates(context.user_id).await?;
        let streak = recalculate_streak(&dates, context.now.date_naive());
        let mut profile = context
            .repositories
            .profiles
            .find(context.user_id)
            .await?
            .unwrap_or_else(|| Profile::new(context.user_id.clone(), context.now));
        profile.apply_streak(streak, context.now);
        let (current_streak, longest_streak) = (profile.current_streak, profile.longest_streak);
        context.repositories.profiles.save(profile).await?;

        Ok(ToolResult::ok(json!({
            "check_in_id": check_in_id,
            "mood": mood.as_str(),
            "urge_intensity": urge_intensity,
            "current_streak": current_streak,
            "longest_streak": longest_streak,
        }))
        .with_message("Check-in recorded."))
    }
}

pub struct CreateJournalEntry;

#[async_trait]
impl ToolHandler for CreateJournalEntry {
    fn name(&self) -> &'static str {
        CREATE_JOURNAL_ENTRY
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let content = required_text(arguments, CREATE_JOURNAL_ENTRY, "content")?;
        let title = optional_text(arguments, "title").unwrap_or_else(|| default_title(context.now));

        let entry = JournalEntry {
            id: JournalEntryId(new_id("J")),
            user_id: context.user_id.clone(),
            title,
            content: content.to_string(),
            created_at: context.now,
        };
        let payload = json!({
            "entry_id": entry.id.0,
            "title": entry.title,
            "created_at": entry.created_at,
        });
        context.repositories.journal.insert(entry).await?;

        Ok(ToolResult::ok(payload).with_message("Journal entry saved."))
    }
}

pub struct CompleteGoal;

#[async_trait]
impl ToolHandler for CompleteGoal {
    fn name(&self) -> &'static str {
        COMPLETE_GOAL
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let target = required_text(arguments, COMPLETE_GOAL, "goal_title")?;
        let mut goals = context.repositories.goals.list_active(context.user_id).await?;
        let titles = goals.iter().map(|goal| goal.title.clone()).collect::<Vec<_>>();

        let Some(index) = best_match(target, &titles) else {
            return Ok(ToolResult::failure(format!("No active goal matches \"{target}\"."))
                .with_payload(json!({ "active_goals": titles })));
        };

        let mut goal = goals.swap_remove(index);
        goal.complete(context.now)?;
        let payload = json!({
            "goal_id": goal.id.0,
            "title": goal.title,
            "completed_at": goal.completed_at,
        });
        let message = format!("Goal \"{}\" marked as completed.", goal.title);
        context.repositories.goals.save(goal).await?;

        Ok(ToolResult::ok(payload).with_message(message))
    }
}

pub struct LogCopingActivity;

#[async_trait]
impl ToolHandler for LogCopingActivity {
    fn name(&self) -> &'static str {
        LOG_COPING_ACTIVITY
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let activity_name = required_text(arguments, LOG_COPING_ACTIVITY, "activity_name")?;
        let stored = context
            .repositories
            .coping
            .record_use(CopingActivity {
                id: CopingActivityId(new_id("A")),
                user_id: context.user_id.clone(),
                activity_name: activity_name.to_string(),
                category: optional_text(arguments, "category"),
                times_used: 1,
                last_used_at: context.now,
                created_at: context.now,
            })
            .await?;

        Ok(ToolResult::ok(json!({
            "activity_name": stored.activity_name,
            "category": stored.category,
            "times_used": stored.times_used,
        }))
        .with_message(format!("Logged \"{}\" ({} times so far).", stored.activity_name, stored.times_used)))
    }
}

pub struct LogIntervention;

#[async_trait]
impl ToolHandler for LogIntervention {
    fn name(&self) -> &'static str {
        LOG_INTERVENTION
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let intervention_type = required_text(arguments, LOG_INTERVENTION, "intervention_type")?;
        let intervention = Intervention {
            id: InterventionId(new_id("I")),
            user_id: context.user_id.clone(),
            intervention_type: intervention_type.to_string(),
            message: optional_text(arguments, "message"),
            risk_level: optional_text(arguments, "risk_level"),
            created_at: context.now,
        };
        let payload = json!({
            "intervention_id": intervention.id.0,
            "intervention_type": intervention.intervention_type,
        });
        context.repositories.interventions.insert(intervention).await?;

        info!(
            event_name = "tool.intervention_logged",
            user_id = %context.user_id,
            intervention_type,
            "intervention logged"
        );
        Ok(ToolResult::ok(payload).with_intervention(true))
    }
}
