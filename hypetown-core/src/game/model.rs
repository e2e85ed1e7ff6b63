//! Character Model Resolution
//!
//! A player may have a custom GLB model (generated externally and uploaded
//! to a CDN). If it is missing or cannot be fetched, the bundled default for
//! the player's archetype is used instead. The container header is checked so
//! an HTML error page is never handed to the engine as a model; the model
//! itself is not parsed.

use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

use crate::game::state::{Archetype, PlayerState};

/// Binary glTF magic, "glTF" little-endian.
const GLB_MAGIC: &[u8; 4] = b"glTF";
/// Supported binary glTF container version.
const GLB_VERSION: u32 = 2;
/// Magic + version + length.
const GLB_HEADER_LEN: usize = 12;

/// Model loading errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Request could not be completed.
    #[error("model fetch failed: {0}")]
    Fetch(String),
    /// CDN answered with a non-success status.
    #[error("model fetch returned HTTP {0}")]
    Status(u16),
    /// Payload is not a binary glTF 2.0 container.
    #[error("invalid model container: {0}")]
    InvalidContainer(&'static str),
}

/// Downloads model payloads.
pub trait ModelFetcher {
    /// Fetch raw bytes from `url`.
    fn fetch_model(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ModelError>> + Send;
}

/// Character representation chosen for the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterModel {
    /// Custom model downloaded from the player's model URL.
    Remote {
        /// Source URL.
        url: String,
        /// GLB payload.
        bytes: Vec<u8>,
    },
    /// Bundled default for an archetype.
    Default(Archetype),
}

impl CharacterModel {
    /// Whether this is the archetype fallback.
    pub fn is_default(&self) -> bool {
        matches!(self, CharacterModel::Default(_))
    }

    /// Asset key for bundled defaults, source URL for remote models.
    pub fn source(&self) -> String {
        match self {
            CharacterModel::Remote { url, .. } => url.clone(),
            CharacterModel::Default(archetype) => archetype.default_model_asset(),
        }
    }
}

/// Check the 12-byte binary glTF header.
pub fn validate_glb(bytes: &[u8]) -> Result<(), ModelError> {
    if bytes.len() < GLB_HEADER_LEN {
        return Err(ModelError::InvalidContainer("payload shorter than GLB header"));
    }
    if &bytes[0..4] != GLB_MAGIC {
        return Err(ModelError::InvalidContainer("missing glTF magic"));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != GLB_VERSION {
        return Err(ModelError::InvalidContainer("unsupported glTF version"));
    }

    let declared = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    if declared != bytes.len() {
        return Err(ModelError::InvalidContainer("length does not match header"));
    }

    Ok(())
}

/// Load the player's custom model, falling back to the archetype default.
pub async fn resolve_character<F: ModelFetcher>(fetcher: &F, player: &PlayerState) -> CharacterModel {
    let Some(url) = player.custom_model_url() else {
        info!("No custom model, using default for {}", player.archetype);
        return CharacterModel::Default(player.archetype);
    };

    info!("Loading character model: {}", url);
    let loaded = match fetcher.fetch_model(url).await {
        Ok(bytes) => validate_glb(&bytes).map(|_| bytes),
        Err(e) => Err(e),
    };

    match loaded {
        Ok(bytes) => {
            info!("Character model loaded ({} bytes)", bytes.len());
            CharacterModel::Remote {
                url: url.to_string(),
                bytes,
            }
        }
        Err(e) => {
            warn!("{}; falling back to default {} model", e, player.archetype);
            CharacterModel::Default(player.archetype)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeCdn {
        files: HashMap<String, Result<Vec<u8>, ModelError>>,
    }

    impl ModelFetcher for FakeCdn {
        async fn fetch_model(&self, url: &str) -> Result<Vec<u8>, ModelError> {
            self.files
                .get(url)
                .cloned()
                .unwrap_or(Err(ModelError::Status(404)))
        }
    }

    fn glb(body_len: usize) -> Vec<u8> {
        let total = GLB_HEADER_LEN + body_len;
        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(GLB_MAGIC);
        bytes.extend_from_slice(&GLB_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(total as u32).to_le_bytes());
        bytes.resize(total, 0);
        bytes
    }

    fn player(archetype: Archetype, model_url: Option<&str>) -> PlayerState {
        PlayerState {
            archetype,
            model_url: model_url.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_glb() {
        assert!(validate_glb(&glb(20)).is_ok());
        assert!(validate_glb(b"glTF").is_err());
        assert!(validate_glb(b"<html>not a model</html>").is_err());

        let mut wrong_version = glb(4);
        wrong_version[4] = 1;
        assert_eq!(
            validate_glb(&wrong_version),
            Err(ModelError::InvalidContainer("unsupported glTF version"))
        );

        let mut truncated = glb(16);
        truncated.truncate(20);
        assert!(validate_glb(&truncated).is_err());
    }

    #[tokio::test]
    async fn test_remote_model_loaded() {
        let url = "https://cdn.example/hero.glb";
        let cdn = FakeCdn {
            files: HashMap::from([(url.to_string(), Ok(glb(64)))]),
        };

        let model = resolve_character(&cdn, &player(Archetype::Streamer, Some(url))).await;
        match model {
            CharacterModel::Remote { url: loaded, bytes } => {
                assert_eq!(loaded, url);
                assert_eq!(bytes.len(), 76);
            }
            other => panic!("expected remote model, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_url_uses_archetype_default() {
        let cdn = FakeCdn { files: HashMap::new() };
        let model = resolve_character(&cdn, &player(Archetype::Magnate, None)).await;
        assert_eq!(model, CharacterModel::Default(Archetype::Magnate));
        assert_eq!(model.source(), "models/magnate.glb");
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back() {
        let cdn = FakeCdn { files: HashMap::new() };
        let model = resolve_character(&cdn, &player(Archetype::Blogger, Some("https://cdn/404.glb"))).await;
        assert!(model.is_default());
        assert_eq!(model, CharacterModel::Default(Archetype::Blogger));
    }

    #[tokio::test]
    async fn test_invalid_payload_falls_back() {
        let url = "https://cdn.example/page.glb";
        let cdn = FakeCdn {
            files: HashMap::from([(url.to_string(), Ok(b"<!doctype html><p>oops</p>".to_vec()))]),
        };
        let model = resolve_character(&cdn, &player(Archetype::Journalist, Some(url))).await;
        assert_eq!(model, CharacterModel::Default(Archetype::Journalist));
    }
}
