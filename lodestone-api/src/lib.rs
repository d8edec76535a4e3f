mod decode;
mod error;
mod models;

pub use decode::{CountPayload, COUNT_FIELD, coerce_number, decode_count, decode_players, settle_count};
pub use error::{FetchError, Result};
pub use models::ServerSnapshot;

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of server snapshots for the poller.
pub trait StatusSource: Send + Sync + 'static {
  /// Run one fetch cycle against the status API.
  fn fetch(&self) -> impl Future<Output = Result<ServerSnapshot>> + Send;
}

/// HTTP client for the status API.
#[derive(Clone)]
pub struct StatusClient {
  http: reqwest::Client,
  players_url: String,
  count_url: String,
}

impl StatusClient {
  /// Create a client for the API under `base_url`, with a per-request timeout.
  pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, reqwest::Error> {
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self::with_client(http, base_url))
  }

  /// Create a client reusing an existing reqwest client.
  pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
    let base = base_url.trim_end_matches('/');
    Self {
      http,
      players_url: format!("{base}/players"),
      count_url: format!("{base}/players/count"),
    }
  }

  /// Fetch the body of one endpoint, requiring a success status.
  async fn get_body(&self, url: &str) -> Result<String> {
    let response = self.http.get(url).send().await.map_err(|e| {
      warn!(%url, error = %e, "status request failed");
      FetchError::Api
    })?;

    let status = response.status();
    if !status.is_success() {
      warn!(%url, %status, "status api returned an error status");
      return Err(FetchError::Api);
    }

    response.text().await.map_err(|e| {
      warn!(%url, error = %e, "failed to read status response body");
      FetchError::Api
    })
  }
}

impl StatusSource for StatusClient {
  async fn fetch(&self) -> Result<ServerSnapshot> {
    // Both requests always run to completion; either failing fails the cycle.
    let (players_body, count_body) =
      tokio::join!(self.get_body(&self.players_url), self.get_body(&self.count_url));
    let (players_body, count_body) = (players_body?, count_body?);

    let snapshot = ServerSnapshot::reconcile(
      decode_players(&players_body),
      decode_count(&count_body),
    );
    debug!(
      players = snapshot.players.len(),
      online = snapshot.online_count,
      "fetched server status"
    );
    Ok(snapshot)
  }
}
