//! JSON API client for the Cutter backend (v2 surface)
//!
//! Simple request/response calls with no internal state machine: caller
//! identification, chat, session mode, and health.

mod auth;
mod chat;
pub mod client;
mod system;

use anyhow::Result;

/// Initiate the caller-identification flow for a phone number
pub async fn start_call(number: &str) -> Result<()> {
    auth::start_call(number).await
}

/// Verify (or register) the caller's name, granting a session
pub async fn verify_name(number: &str, name: &str) -> Result<()> {
    auth::verify_name(number, name).await
}

/// Switch a session between text and voice mode
pub async fn switch_mode(session_id: &str, mode: &str) -> Result<()> {
    auth::switch_mode(session_id, mode).await
}

/// Send a chat message and print the reply
pub async fn send_message(session_id: &str, message: &str) -> Result<()> {
    chat::send_message(session_id, message).await
}

/// Start voice mode for a session
pub async fn voice_start(session_id: &str, voice: &str) -> Result<()> {
    chat::voice_start(session_id, voice).await
}

/// Stop voice mode for a session
pub async fn voice_stop(session_id: &str) -> Result<()> {
    chat::voice_stop(session_id).await
}

/// Check backend health
pub async fn health() -> Result<()> {
    system::health().await
}
