use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub sobriety_start_date: Option<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_check_in_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            display_name: None,
            sobriety_start_date: None,
            current_streak: 0,
            longest_streak: 0,
            last_check_in_date: None,
            updated_at: now,
        }
    }

    pub fn days_sober(&self, today: NaiveDate) -> Option<i64> {
        self.sobriety_start_date.map(|start| (today - start).num_days().max(0))
    }

    pub fn apply_streak(&mut self, streak: StreakSummary, now: DateTime<Utc>) {
        self.current_streak = streak.current;
        self.longest_streak = self.longest_streak.max(streak.longest);
        self.last_check_in_date = streak.last_check_in_date;
        self.updated_at = now;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
    pub last_check_in_date: Option<NaiveDate>,
}

/// Check-in streaks over distinct calendar days.
///
/// The current streak counts consecutive days ending today, or yesterday when
/// today has no check-in yet. Anything older breaks the streak.
pub fn recalculate_streak(check_in_dates: &[NaiveDate], today: NaiveDate) -> StreakSummary {
    let days = check_in_dates.iter().copied().filter(|day| *day <= today).collect::<BTreeSet<_>>();
    let Some(last) = days.iter().next_back().copied() else {
        return StreakSummary::default();
    };

    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    let current = if today - last <= Duration::days(1) { run } else { 0 };

    StreakSummary { current, longest, last_check_in_date: Some(last) }
}
