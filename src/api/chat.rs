//! Chat and voice-mode endpoints (/v2/chat)

use anyhow::Result;
use serde::Deserialize;

use super::client::ApiClient;

#[derive(Debug, Deserialize)]
struct ChatReply {
    reply: String,
    #[serde(default)]
    memory_delta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VoiceStartResponse {
    token: String,
    voice: String,
}

#[derive(Debug, Deserialize)]
struct VoiceStopResponse {
    status: String,
}

/// Send a chat message and print the assistant's reply.
pub async fn send_message(session_id: &str, message: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let resp: ChatReply = client
        .post_json(
            "/v2/chat/send",
            &serde_json::json!({ "session_id": session_id, "message": message }),
        )
        .await?;

    println!();
    println!("{}", resp.reply);
    if let Some(delta) = resp.memory_delta {
        tracing::debug!("memory delta: {}", delta);
    }
    Ok(())
}

/// Start voice mode for a session.
pub async fn voice_start(session_id: &str, voice: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let resp: VoiceStartResponse = client
        .post_json(
            "/v2/chat/voice/start",
            &serde_json::json!({ "session_id": session_id, "voice": voice }),
        )
        .await?;

    println!();
    println!("Voice mode started (voice: {})", resp.voice);
    println!("Token: {}", resp.token);
    Ok(())
}

/// Stop voice mode, returning the session to text.
pub async fn voice_stop(session_id: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let resp: VoiceStopResponse = client
        .post_json(
            "/v2/chat/voice/stop",
            &serde_json::json!({ "session_id": session_id }),
        )
        .await?;

    println!();
    println!("Voice mode: {}", resp.status);
    Ok(())
}
