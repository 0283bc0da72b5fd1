use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaToken {
    pub token: String,
    pub room_name: String,
    /// True when token issuance degraded to a placeholder.
    pub placeholder: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct MediaClaims {
    sub: String,
    room: String,
    iat: i64,
    exp: i64,
}

/// Issues short-lived media-room access tokens. Token generation is
/// best-effort by contract: on a missing secret or signing failure the join
/// proceeds with a clearly-marked placeholder token instead of aborting.
#[derive(Clone)]
pub struct MediaTokenService {
    secret: Option<String>,
    ttl_secs: u64,
}

impl MediaTokenService {
    pub fn new(secret: Option<String>, ttl_secs: u64) -> Self {
        Self { secret, ttl_secs }
    }

    pub fn issue(&self, interview_id: Uuid, user_id: &str) -> MediaToken {
        let room_name = format!("interview-{}", interview_id);

        let secret = match self.secret.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => {
                tracing::warn!(%interview_id, "media token secret not configured, issuing placeholder token");
                return self.placeholder(room_name);
            }
        };

        let now = Utc::now().timestamp();
        let claims = MediaClaims {
            sub: user_id.to_string(),
            room: room_name.clone(),
            iat: now,
            exp: now + self.ttl_secs as i64,
        };

        match encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        ) {
            Ok(token) => MediaToken {
                token,
                room_name,
                placeholder: false,
            },
            Err(e) => {
                tracing::warn!(%interview_id, error = ?e, "media token signing failed, issuing placeholder token");
                self.placeholder(room_name)
            }
        }
    }

    fn placeholder(&self, room_name: String) -> MediaToken {
        let suffix: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        MediaToken {
            token: format!("placeholder-{}", suffix),
            room_name,
            placeholder: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_token_when_secret_present() {
        let service = MediaTokenService::new(Some("test-secret".to_string()), 3600);
        let token = service.issue(Uuid::new_v4(), "user-a");
        assert!(!token.placeholder);
        // JWT: three dot-separated segments.
        assert_eq!(token.token.split('.').count(), 3);
        assert!(token.room_name.starts_with("interview-"));
    }

    #[test]
    fn degrades_to_placeholder_without_secret() {
        let service = MediaTokenService::new(None, 3600);
        let token = service.issue(Uuid::new_v4(), "user-a");
        assert!(token.placeholder);
        assert!(token.token.starts_with("placeholder-"));
    }
}
