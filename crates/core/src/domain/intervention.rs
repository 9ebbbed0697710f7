use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterventionId(pub String);

/// A proactive nudge that happened during a conversation. Kept for later review only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: InterventionId,
    pub user_id: UserId,
    pub intervention_type: String,
    pub message: Option<String>,
    pub risk_level: Option<String>,
    pub created_at: DateTime<Utc>,
}
