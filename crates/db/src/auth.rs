use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use soberly_core::domain::user::UserId;

const TOKEN_PREFIX: &str = "sbr_";

/// Server-side record of an issued bearer token. Only the SHA-256 digest is stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token_hash: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.trim().as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Mints a new opaque token and the session row that backs it.
pub fn issue_token(user_id: UserId, ttl: Duration, now: DateTime<Utc>) -> (String, AuthSession) {
    let token = format!("{TOKEN_PREFIX}{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let session = AuthSession {
        token_hash: hash_token(&token),
        user_id,
        expires_at: now + ttl,
        created_at: now,
    };
    (token, session)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{hash_token, issue_token};
    use soberly_core::domain::user::UserId;

    #[test]
    fn hash_is_stable_hex_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token(" abc "), hash_token("abc"));
    }

    #[test]
    fn issued_token_matches_its_session() {
        let now = Utc::now();
        let (token, session) = issue_token(UserId("user-1".to_string()), Duration::days(30), now);

        assert!(token.starts_with("sbr_"));
        assert_eq!(session.token_hash, hash_token(&token));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::days(31)));
    }
}
