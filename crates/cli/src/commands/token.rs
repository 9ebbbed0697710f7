use chrono::{Duration, Utc};
use serde_json::json;

use crate::commands::{current_thread_runtime, CommandResult};
use soberly_core::config::{AppConfig, LoadOptions};
use soberly_core::domain::user::UserId;
use soberly_db::{connect_from_config, issue_token, migrations, Repositories};

pub const DEFAULT_TTL_DAYS: i64 = 30;
pub const MAX_TTL_DAYS: i64 = 365;

/// Mints a bearer token for `user_id` and stores only its digest.
pub fn issue(user_id: &str, days: i64) -> CommandResult {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return CommandResult::failure("token.issue", "invalid_input", "--user must not be blank", 2);
    }
    if !(1..=MAX_TTL_DAYS).contains(&days) {
        return CommandResult::failure(
            "token.issue",
            "invalid_input",
            format!("--days must be between 1 and {MAX_TTL_DAYS}"),
            2,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "token.issue",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "token.issue",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let (token, session) =
        issue_token(UserId(user_id.to_string()), Duration::days(days), Utc::now());
    let expires_at = session.expires_at;

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        Repositories::sql(pool.clone())
            .auth_sessions
            .insert(session)
            .await
            .map_err(|error| ("persistence", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success_with(
            "token.issue",
            "token issued; it will not be shown again",
            Some(json!({
                "user_id": user_id,
                "token": token,
                "expires_at": expires_at.to_rfc3339(),
            })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("token.issue", error_class, message, exit_code)
        }
    }
}
