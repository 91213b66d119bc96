//! Caller identification and session endpoints (/v2/auth, /v2/session)

use anyhow::Result;
use serde::Deserialize;

use super::client::ApiClient;

#[derive(Debug, Deserialize)]
struct CallResponse {
    user_id: Option<String>,
    #[serde(default)]
    need_name_verification: bool,
    #[serde(default)]
    need_name_registration: bool,
}

#[derive(Debug, Deserialize)]
struct VerifyNameResponse {
    user_id: String,
    session_id: String,
    mode: String,
}

#[derive(Debug, Deserialize)]
struct ModeResponse {
    session_id: String,
    mode: String,
}

/// Look up a phone number and report which auth step comes next.
pub async fn start_call(number: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let resp: CallResponse = client
        .post_json("/v2/auth/call", &serde_json::json!({ "number": number }))
        .await?;

    println!();
    if resp.need_name_verification {
        println!("Known number — verify the caller's name with `verify-name`.");
    }
    if resp.need_name_registration {
        println!("New number — register the caller's name with `verify-name`.");
    }
    if let Some(user_id) = resp.user_id {
        println!("User ID: {}", user_id);
    }
    Ok(())
}

/// Verify (or register) the caller's name. Grants a session on success.
pub async fn verify_name(number: &str, name: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let resp: VerifyNameResponse = client
        .post_json(
            "/v2/auth/verify-name",
            &serde_json::json!({ "number": number, "name": name }),
        )
        .await?;

    println!();
    println!("User ID:    {}", resp.user_id);
    println!("Session ID: {}", resp.session_id);
    println!("Mode:       {}", resp.mode);
    Ok(())
}

/// Switch a session between text and voice mode.
pub async fn switch_mode(session_id: &str, mode: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let resp: ModeResponse = client
        .post_json(
            "/v2/session/mode",
            &serde_json::json!({ "session_id": session_id, "mode": mode }),
        )
        .await?;

    println!();
    println!("Session {} is now in {} mode", resp.session_id, resp.mode);
    Ok(())
}
