//! Bearer-token authentication.
//!
//! The token endpoint takes `{email, password}` and answers `{access}`. The
//! token is persisted through a [`TokenStore`] (the OS keyring in
//! production) and reloaded on startup; an expired JWT is discarded.

use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::api::{ApiRequest, RemoteApi};
use crate::coalesce::resolve_text;
use crate::error::{AppError, AppResult};

pub const TOKEN_PATH: &str = "/token/";

const KEYRING_SERVICE: &str = "depot-admin";
const KEYRING_USER: &str = "access_token";

/// Durable storage for the access token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<Zeroizing<String>>;
    fn save(&self, token: &str) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

/// OS credential store (Credential Manager, Keychain or Secret Service).
#[derive(Default)]
pub struct KeyringTokenStore;

impl KeyringTokenStore {
    fn entry() -> AppResult<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .map_err(|e| AppError::Storage(format!("keyring: {e}")))
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Option<Zeroizing<String>> {
        let entry = Self::entry().map_err(|e| warn!(error = %e, "keyring unavailable")).ok()?;
        match entry.get_password() {
            Ok(token) if !token.trim().is_empty() => Some(Zeroizing::new(token)),
            Ok(_) | Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "keyring: failed to read access token");
                None
            }
        }
    }

    fn save(&self, token: &str) -> AppResult<()> {
        Self::entry()?
            .set_password(token)
            .map_err(|e| AppError::Storage(format!("keyring: {e}")))
    }

    fn clear(&self) -> AppResult<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::Storage(format!("keyring: {e}"))),
        }
    }
}

/// Process-local store for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<Zeroizing<String>>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<Zeroizing<String>> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> AppResult<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| AppError::Storage(e.to_string()))?;
        *guard = Some(Zeroizing::new(token.to_string()));
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| AppError::Storage(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub signed_in: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    fn from_token(token: &str) -> Self {
        Self {
            signed_in: true,
            expires_at: token_expiry(token),
        }
    }

    fn signed_out() -> Self {
        Self {
            signed_in: false,
            expires_at: None,
        }
    }

    /// Reload the persisted token on startup. Expired tokens are cleared.
    pub fn restore(store: &dyn TokenStore) -> Self {
        let Some(token) = store.load() else {
            return Self::signed_out();
        };
        let session = Self::from_token(&token);
        match session.expires_at {
            Some(exp) if exp <= Utc::now() => {
                info!(expired_at = %exp, "stored access token has expired");
                if let Err(e) = store.clear() {
                    warn!(error = %e, "failed to clear expired token");
                }
                Self::signed_out()
            }
            _ => session,
        }
    }
}

/// Exchange credentials for an access token and persist it.
pub async fn login(
    api: &dyn RemoteApi,
    store: &dyn TokenStore,
    email: &str,
    password: Zeroizing<String>,
) -> AppResult<AuthSession> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation("email", "email is required"));
    }
    if password.is_empty() {
        return Err(AppError::validation("password", "password is required"));
    }

    let body = json!({ "email": email, "password": password.as_str() });
    let resp = api
        .send(
            ApiRequest::new(Method::POST, TOKEN_PATH)
                .body(body)
                .anonymous(),
        )
        .await?;

    let token = extract_access_token(&resp).ok_or_else(|| {
        AppError::Serialization("Token response did not contain an access token".into())
    })?;
    store.save(&token)?;
    info!("signed in");
    Ok(AuthSession::from_token(&token))
}

pub fn logout(store: &dyn TokenStore) -> AppResult<()> {
    store.clear()?;
    info!("signed out");
    Ok(())
}

fn extract_access_token(resp: &Value) -> Option<Zeroizing<String>> {
    resolve_text(resp, &["access", "access_token", "token"])
        .or_else(|| {
            resp.get("data")
                .and_then(|d| resolve_text(d, &["access", "access_token", "token"]))
        })
        .map(Zeroizing::new)
}

/// `exp` claim of a JWT, if the token is one.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"user_id":7}}"#));
        format!("{header}.{claims}.signature")
    }

    struct TokenEndpoint {
        seen: StdMutex<Vec<ApiRequest>>,
        response: Value,
    }

    #[async_trait]
    impl RemoteApi for TokenEndpoint {
        async fn send(&self, request: ApiRequest) -> AppResult<Value> {
            self.seen.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    #[test]
    fn decodes_jwt_expiry() {
        let exp = Utc::now().timestamp() + 3600;
        assert_eq!(token_expiry(&jwt_with_exp(exp)).map(|d| d.timestamp()), Some(exp));
        assert_eq!(token_expiry("opaque-token"), None);
    }

    #[test]
    fn restore_discards_expired_token() {
        let store = MemoryTokenStore::default();
        store.save(&jwt_with_exp(Utc::now().timestamp() - 10)).unwrap();
        let session = AuthSession::restore(&store);
        assert!(!session.signed_in);
        assert!(store.load().is_none());
    }

    #[test]
    fn restore_keeps_opaque_token() {
        let store = MemoryTokenStore::default();
        store.save("opaque").unwrap();
        let session = AuthSession::restore(&store);
        assert!(session.signed_in);
        assert!(session.expires_at.is_none());
    }

    #[tokio::test]
    async fn login_posts_credentials_and_persists_access() {
        let token = jwt_with_exp(Utc::now().timestamp() + 600);
        let api = TokenEndpoint {
            seen: StdMutex::new(Vec::new()),
            response: json!({ "access": token.clone(), "refresh": "r" }),
        };
        let store = MemoryTokenStore::default();
        let session = login(&api, &store, " ops@depot.test ", Zeroizing::new("pw".into()))
            .await
            .unwrap();
        assert!(session.signed_in);
        assert_eq!(store.load().as_deref().map(String::as_str), Some(token.as_str()));

        let seen = api.seen.lock().unwrap();
        assert_eq!(seen[0].path, TOKEN_PATH);
        assert!(!seen[0].authenticated);
        assert_eq!(
            seen[0].body.as_ref().unwrap()["email"],
            json!("ops@depot.test")
        );
    }

    #[tokio::test]
    async fn login_requires_email_before_calling_api() {
        let api = TokenEndpoint {
            seen: StdMutex::new(Vec::new()),
            response: json!({}),
        };
        let store = MemoryTokenStore::default();
        let err = login(&api, &store, "", Zeroizing::new("pw".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(api.seen.lock().unwrap().is_empty());
    }
}
