//! Health probe (/v2/health)

use anyhow::Result;
use serde::Deserialize;

use super::client::ApiClient;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    redis: Option<String>,
}

/// Fetch and display backend health.
pub async fn health() -> Result<()> {
    let client = ApiClient::new()?;
    let resp: HealthResponse = client.get_json("/v2/health").await?;

    println!();
    println!("Backend: {}", resp.status);
    println!("Redis:   {}", resp.redis.as_deref().unwrap_or("(unknown)"));
    Ok(())
}
