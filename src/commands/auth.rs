use serde_json::{json, Value};
use zeroize::Zeroizing;

use crate::auth::{self, AuthSession};
use crate::error::AppResult;
use crate::AppState;

pub async fn login(state: &AppState, email: &str, password: Zeroizing<String>) -> AppResult<Value> {
    let session = auth::login(state.api.as_ref(), state.tokens.as_ref(), email, password).await?;
    state.events.success("Signed in");
    Ok(json!(session))
}

pub fn logout(state: &AppState) -> AppResult<Value> {
    auth::logout(state.tokens.as_ref())?;
    state.events.success("Signed out");
    Ok(json!({ "signedIn": false }))
}

/// Current session as restored from the token store.
pub fn session(state: &AppState) -> Value {
    json!(AuthSession::restore(state.tokens.as_ref()))
}
