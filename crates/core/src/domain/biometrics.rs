use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

pub const LOW_SLEEP_HOURS: f64 = 6.0;
pub const LOW_DAILY_STEPS: f64 = 5_000.0;
pub const HIGH_STRESS_LEVEL: f64 = 7.0;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BiometricLogId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiometricLog {
    pub id: BiometricLogId,
    pub user_id: UserId,
    pub sleep_hours: Option<f64>,
    pub steps: Option<u32>,
    pub stress_level: Option<f64>,
    pub heart_rate: Option<u32>,
    pub logged_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiometricSummary {
    pub days: u32,
    pub samples: usize,
    pub avg_sleep_hours: Option<f64>,
    pub avg_steps: Option<f64>,
    pub avg_stress_level: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub insights: Vec<String>,
}

pub fn summarize_biometrics(logs: &[BiometricLog], days: u32) -> BiometricSummary {
    let avg_sleep_hours = average(logs.iter().filter_map(|log| log.sleep_hours));
    let avg_steps = average(logs.iter().filter_map(|log| log.steps.map(f64::from)));
    let avg_stress_level = average(logs.iter().filter_map(|log| log.stress_level));
    let avg_heart_rate = average(logs.iter().filter_map(|log| log.heart_rate.map(f64::from)));

    let mut insights = Vec::new();
    if let Some(sleep) = avg_sleep_hours {
        if sleep < LOW_SLEEP_HOURS {
            insights.push(format!(
                "Average sleep is {sleep:.1} hours. Poor sleep can increase cravings; a consistent bedtime may help."
            ));
        } else {
            insights.push(format!("Sleep looks steady at {sleep:.1} hours per night."));
        }
    }
    if let Some(steps) = avg_steps {
        if steps < LOW_DAILY_STEPS {
            insights.push(format!(
                "Activity is low at about {steps:.0} steps a day. A short daily walk can lift mood."
            ));
        }
    }
    if let Some(stress) = avg_stress_level {
        if stress >= HIGH_STRESS_LEVEL {
            insights.push(format!(
                "Stress has been elevated (average {stress:.1}/10). Consider extra coping activities or reaching out for support."
            ));
        }
    }
    if logs.is_empty() {
        insights.push("No biometric data recorded for this period.".to_string());
    }

    BiometricSummary {
        days,
        samples: logs.len(),
        avg_sleep_hours: avg_sleep_hours.map(round_one),
        avg_steps: avg_steps.map(f64::round),
        avg_stress_level: avg_stress_level.map(round_one),
        avg_heart_rate: avg_heart_rate.map(f64::round),
        insights,
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{summarize_biometrics, BiometricLog, BiometricLogId};
    use crate::domain::user::UserId;

    fn log(sleep: f64, steps: u32, stress: f64) -> BiometricLog {
        BiometricLog {
            id: BiometricLogId(format!("B-{steps}")),
            user_id: UserId("user-1".to_string()),
            sleep_hours: Some(sleep),
            steps: Some(steps),
            stress_level: Some(stress),
            heart_rate: None,
            logged_at: Utc::now(),
        }
    }

    #[test]
    fn averages_and_threshold_insights() {
        let summary = summarize_biometrics(&[log(5.0, 3_000, 8.0), log(5.5, 4_000, 7.0)], 7);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.avg_sleep_hours, Some(5.3));
        assert_eq!(summary.avg_steps, Some(3_500.0));
        assert_eq!(summary.avg_stress_level, Some(7.5));
        assert_eq!(summary.avg_heart_rate, None);
        assert_eq!(summary.insights.len(), 3);
        assert!(summary.insights[0].contains("cravings"));
    }

    #[test]
    fn healthy_averages_produce_no_warnings() {
        let summary = summarize_biometrics(&[log(7.5, 9_000, 3.0)], 7);
        assert_eq!(summary.insights, vec!["Sleep looks steady at 7.5 hours per night.".to_string()]);
    }

    #[test]
    fn empty_period_is_reported() {
        let summary = summarize_biometrics(&[], 14);
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.avg_sleep_hours, None);
        assert_eq!(summary.insights.len(), 1);
    }
}
