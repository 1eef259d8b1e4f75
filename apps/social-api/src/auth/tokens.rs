//! Opaque bearer session tokens backed by the key-value store.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::store::kv::KeyValueStore;

// ---------------------------------------------------------------------------
// Opaque token generation
// ---------------------------------------------------------------------------

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

// ---------------------------------------------------------------------------
// Session token, 7-day TTL
// ---------------------------------------------------------------------------

/// Session TTL in seconds (7 days).
pub const SESSION_TTL_SECS: u64 = 7 * 24 * 3600;

/// Data stored alongside a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
}

fn session_key(token: &str) -> String {
    format!("social:session:{}", token)
}

pub fn generate_session_token() -> String {
    generate_opaque_token("sst", 32)
}

pub async fn store_session(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &SessionData,
) -> Result<(), ApiError> {
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&session_key(token), &value, SESSION_TTL_SECS).await
}

/// Mint and store a session for the user, returning the bearer token.
pub async fn issue_session(kv: &dyn KeyValueStore, user_id: &str) -> Result<String, ApiError> {
    let token = generate_session_token();
    store_session(
        kv,
        &token,
        &SessionData {
            user_id: user_id.to_string(),
        },
    )
    .await?;
    Ok(token)
}

pub async fn lookup_session(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<SessionData>, ApiError> {
    match kv.get(&session_key(token)).await? {
        Some(v) => {
            let data: SessionData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::MemoryKv;

    #[test]
    fn tokens_are_prefixed_and_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert!(a.starts_with("sst_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn issued_session_resolves() {
        let kv = MemoryKv::new();
        let token = issue_session(&kv, "usr_1").await.unwrap();

        let data = lookup_session(&kv, &token).await.unwrap().unwrap();
        assert_eq!(data.user_id, "usr_1");
        assert!(lookup_session(&kv, "sst_unknown").await.unwrap().is_none());
    }
}
