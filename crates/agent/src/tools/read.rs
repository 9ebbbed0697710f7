use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;

use soberly_core::domain::biometrics::summarize_biometrics;
use soberly_core::domain::check_in::{mood_trend, TREND_WINDOW_DAYS};
use soberly_core::domain::coping::{coping_suggestions, StressLevel};
use soberly_core::domain::profile::recalculate_streak;

use super::executor::{
    arg_i64, arg_str, ToolArguments, ToolContext, ToolError, ToolExecutor, ToolHandler, ToolResult,
};
use super::registry::{
    GET_ACTIVE_GOALS, GET_BIOMETRIC_SUMMARY, GET_MOOD_TRENDS, GET_RECENT_JOURNAL_ENTRIES,
    GET_SOBRIETY_PROGRESS, SUGGEST_COPING_ACTIVITIES,
};

pub const DEFAULT_JOURNAL_LIMIT: i64 = 3;
pub const MAX_JOURNAL_LIMIT: i64 = 10;
pub const DEFAULT_BIOMETRIC_DAYS: i64 = 7;
pub const MAX_BIOMETRIC_DAYS: i64 = 90;
const FAVOURITE_ACTIVITIES: usize = 3;

pub(crate) fn register(executor: &mut ToolExecutor) {
    executor.register(SobrietyProgress);
    executor.register(MoodTrends);
    executor.register(ActiveGoals);
    executor.register(SuggestCopingActivities);
    executor.register(RecentJournalEntries);
    executor.register(BiometricSummaryTool);
}

pub struct SobrietyProgress;

#[async_trait]
impl ToolHandler for SobrietyProgress {
    fn name(&self) -> &'static str {
        GET_SOBRIETY_PROGRESS
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        _arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let today = context.now.date_naive();
        let profile = context.repositories.profiles.find(context.user_id).await?;
        let dates = context.repositories.check_ins.list_dates(context.user_id).await?;
        let streak = recalculate_streak(&dates, today);

        let stored_longest = profile.as_ref().map_or(0, |profile| profile.longest_streak);
        let days_sober = profile.as_ref().and_then(|profile| profile.days_sober(today));
        let sobriety_start_date = profile.as_ref().and_then(|profile| profile.sobriety_start_date);

        Ok(ToolResult::ok(json!({
            "days_sober": days_sober,
            "sobriety_start_date": sobriety_start_date,
            "current_streak": streak.current,
            "longest_streak": stored_longest.max(streak.longest),
            "last_check_in_date": streak.last_check_in_date,
        })))
    }
}

pub struct MoodTrends;

#[async_trait]
impl ToolHandler for MoodTrends {
    fn name(&self) -> &'static str {
        GET_MOOD_TRENDS
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        _arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let since = context.now - Duration::days(TREND_WINDOW_DAYS);
        let check_ins = context.repositories.check_ins.list_since(context.user_id, since).await?;

        let trend = mood_trend(&check_ins, context.now);
        let urges = check_ins.iter().filter_map(|check_in| check_in.urge_intensity).collect::<Vec<_>>();
        let average_urge = (!urges.is_empty()).then(|| {
            let total = urges.iter().map(|urge| f64::from(*urge)).sum::<f64>();
            (total / urges.len() as f64 * 10.0).round() / 10.0
        });
        let recent = check_ins
            .iter()
            .map(|check_in| {
                json!({
                    "mood": check_in.mood.as_str(),
                    "urge_intensity": check_in.urge_intensity,
                    "created_at": check_in.created_at,
                })
            })
            .collect::<Vec<_>>();

        Ok(ToolResult::ok(json!({
            "window_days": TREND_WINDOW_DAYS,
            "check_in_count": check_ins.len(),
            "trend": trend.as_str(),
            "average_urge_intensity": average_urge,
            "latest_mood": check_ins.first().map(|check_in| check_in.mood.as_str()),
            "check_ins": recent,
        })))
    }
}

pub struct ActiveGoals;

#[async_trait]
impl ToolHandler for ActiveGoals {
    fn name(&self) -> &'static str {
        GET_ACTIVE_GOALS
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        _arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let goals = context.repositories.goals.list_active(context.user_id).await?;
        let listed = goals
            .iter()
            .map(|goal| {
                json!({
                    "id": goal.id.0,
                    "title": goal.title,
                    "description": goal.description,
                    "target_days": goal.target_days,
                    "start_date": goal.start_date,
                    "end_date": goal.end_date,
                    "days_remaining": goal.days_remaining(context.now),
                })
            })
            .collect::<Vec<_>>();

        Ok(ToolResult::ok(json!({ "count": listed.len(), "goals": listed })))
    }
}

pub struct SuggestCopingActivities;

#[async_trait]
impl ToolHandler for SuggestCopingActivities {
    fn name(&self) -> &'static str {
        SUGGEST_COPING_ACTIVITIES
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let level = arg_str(arguments, "stress_level").unwrap_or_default().parse::<StressLevel>()?;
        let suggestions = coping_suggestions(level);

        let mut known = context.repositories.coping.list(context.user_id).await?;
        known.sort_by(|left, right| right.times_used.cmp(&left.times_used));
        let favourites = known
            .iter()
            .take(FAVOURITE_ACTIVITIES)
            .map(|activity| json!({ "activity_name": activity.activity_name, "times_used": activity.times_used }))
            .collect::<Vec<_>>();

        let result = ToolResult::ok(json!({
            "stress_level": suggestions.stress_level,
            "activities": suggestions.activities,
            "resources": suggestions.resources,
            "crisis": suggestions.crisis,
            "your_activities": favourites,
        }))
        .with_intervention(suggestions.crisis);

        if suggestions.crisis {
            return Ok(result.with_message(
                "Share the crisis resources with the user right away and encourage them to reach out now.",
            ));
        }
        Ok(result)
    }
}

pub struct RecentJournalEntries;

#[async_trait]
impl ToolHandler for RecentJournalEntries {
    fn name(&self) -> &'static str {
        GET_RECENT_JOURNAL_ENTRIES
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let limit = arg_i64(arguments, "limit")
            .unwrap_or(DEFAULT_JOURNAL_LIMIT)
            .clamp(1, MAX_JOURNAL_LIMIT);
        let entries =
            context.repositories.journal.list_recent(context.user_id, limit as u32).await?;
        let listed = entries
            .iter()
            .map(|entry| {
                json!({
                    "title": entry.title,
                    "excerpt": entry.excerpt(),
                    "created_at": entry.created_at,
                })
            })
            .collect::<Vec<_>>();

        Ok(ToolResult::ok(json!({ "count": listed.len(), "entries": listed })))
    }
}

pub struct BiometricSummaryTool;

#[async_trait]
impl ToolHandler for BiometricSummaryTool {
    fn name(&self) -> &'static str {
        GET_BIOMETRIC_SUMMARY
    }

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError> {
        let days = arg_i64(arguments, "days")
            .unwrap_or(DEFAULT_BIOMETRIC_DAYS)
            .clamp(1, MAX_BIOMETRIC_DAYS);
        let since = context.now - Duration::days(days);
        let logs = context.repositories.biometrics.list_since(context.user_id, since).await?;
        let summary = summarize_biometrics(&logs, days as u32);

        Ok(ToolResult::ok(json!(summary)))
    }
}
