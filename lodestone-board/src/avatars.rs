//! Lazily fetched, in-memory avatar cache.
//!
//! Avatars are pulled from the avatar service the first time a player is shown
//! and kept for the life of the process. Nothing is persisted.

use axum::body::Bytes;
use futures::future::join_all;
use scc::HashMap;
use std::time::Duration;

use crate::render;
use crate::validation;

/// Size avatars are served at.
pub const AVATAR_SIZE: u32 = 64;

/// Upper bound on cached avatars; past it, avatars are still served but not kept.
const MAX_CACHED: usize = 1024;

/// Placeholder in the avatar URL template replaced by the player name.
pub const NAME_PLACEHOLDER: &str = "{name}";

pub struct AvatarCache {
    http: reqwest::Client,
    url_template: String,
    heads: HashMap<String, Bytes>,
    fallback: Bytes,
}

impl AvatarCache {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, url_template))
    }

    pub fn with_client(http: reqwest::Client, url_template: impl Into<String>) -> Self {
        Self {
            http,
            url_template: url_template.into(),
            heads: HashMap::new(),
            fallback: Bytes::from_static(render::DEFAULT_HEAD),
        }
    }

    /// Avatar URL for a player.
    pub fn url_for(&self, name: &str) -> String {
        self.url_template.replace(NAME_PLACEHOLDER, name)
    }

    /// The default head served when no avatar is available.
    pub fn fallback(&self) -> Bytes {
        self.fallback.clone()
    }

    /// Avatar for `name` as a PNG, falling back to the default head.
    ///
    /// Only successful fetches are cached, so a failed avatar is retried the
    /// next time it is requested.
    pub async fn get(&self, name: &str) -> Bytes {
        if validation::validate_player_name(name).is_err() {
            return self.fallback();
        }

        if let Some(head) = self.heads.read_async(name, |_, head| head.clone()).await {
            return head;
        }

        match self.fetch(name).await {
            Some(head) => {
                if self.heads.len() < MAX_CACHED {
                    // A concurrent fetch may have won the insert; either copy is fine.
                    let _ = self.heads.insert_async(name.to_string(), head.clone()).await;
                }
                head
            }
            None => self.fallback(),
        }
    }

    /// Avatars for a whole roster, in roster order. Fetches run concurrently.
    pub async fn get_all(&self, names: &[String]) -> Vec<Bytes> {
        join_all(names.iter().map(|name| self.get(name))).await
    }

    async fn fetch(&self, name: &str) -> Option<Bytes> {
        let url = self.url_for(name);
        let response = match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(player = %name, status = %response.status(), "avatar service returned an error status");
                return None;
            }
            Err(e) => {
                tracing::warn!(player = %name, error = %e, "avatar request failed");
                return None;
            }
        };

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(player = %name, error = %e, "failed to read avatar body");
                return None;
            }
        };

        match render::scale_avatar(&body, AVATAR_SIZE) {
            Ok(png) => {
                tracing::debug!(player = %name, "avatar cached");
                Some(Bytes::from(png))
            }
            Err(e) => {
                tracing::warn!(player = %name, error = %e, "avatar is not a usable image");
                None
            }
        }
    }

    pub fn cached(&self) -> usize {
        self.heads.len()
    }
}
