//! Capability decoding for mounting a bucket.
//!
//! A bucket is mounted from a path whose first two segments carry an
//! opaque capability:
//!
//! ```text
//! /mtbucket::<base64(JSON)>/<project>/...
//! ```
//!
//! where the JSON payload is `{ "id": ..., "token": ..., "url": ... }`.
//! Decoding yields a [`Capability`], which becomes the [`RemoteConfig`] of
//! the mounted filesystem. Mounting is explicit
//! ([`MemFs::mount`](crate::MemFs::mount)); lookups never decode paths.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::constants::{CAPABILITY_MARKER, CAPABILITY_SEPARATOR};
use crate::vfs::path;

/// Connection parameters for the remote bucket.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the bucket API.
    pub endpoint: String,
    /// Bucket identifier.
    pub store_id: String,
    /// Bearer credential for the bucket.
    pub auth_token: String,
    /// Tree path the bucket is mounted at (`/<marker-segment>/<project>`).
    pub path_prefix: String,
}

impl RemoteConfig {
    pub fn new(
        endpoint: impl Into<String>,
        store_id: impl Into<String>,
        auth_token: impl Into<String>,
        path_prefix: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            store_id: store_id.into(),
            auth_token: auth_token.into(),
            path_prefix: path::normalize(&path_prefix.into()),
        }
    }

    /// Map a tree path to its remote object path.
    ///
    /// Returns `None` for paths outside the mount and for the mount root
    /// itself, which are local-only.
    pub fn remote_path(&self, tree_path: &str) -> Option<String> {
        path::strip_prefix(tree_path, &self.path_prefix).filter(|p| p != "/")
    }

    /// Map a remote object path to its tree path.
    ///
    /// Returns `None` when the remote path does not name an entry strictly
    /// inside the mount, e.g. `../x` or an empty path.
    pub fn tree_path(&self, remote_path: &str) -> Option<String> {
        let tree_path = path::join(&self.path_prefix, remote_path);
        self.remote_path(&tree_path).map(|_| tree_path)
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("store_id", &self.store_id)
            .field("auth_token", &"<redacted>")
            .field("path_prefix", &self.path_prefix)
            .finish()
    }
}

#[derive(Deserialize)]
struct CapabilityPayload {
    id: String,
    token: String,
    url: String,
}

/// A decoded mount capability.
#[derive(Clone, PartialEq, Eq)]
pub struct Capability {
    /// The raw first segment, `<marker>::<payload>`.
    pub marker_segment: String,
    /// The project segment that follows it.
    pub project: String,
    pub store_id: String,
    pub token: String,
    pub endpoint: String,
}

impl Capability {
    /// Decode the capability carried by the first two segments of `path`.
    ///
    /// Returns `None` when the path is not a capability path: too few
    /// segments, a different marker, or an undecodable payload.
    pub fn parse(path: &str) -> Option<Self> {
        let normalized = path::normalize(path);
        let mut segments = path::segments(&normalized);
        let marker_segment = segments.next()?;
        let project = segments.next()?;

        let (marker, payload) = marker_segment.split_once(CAPABILITY_SEPARATOR)?;
        if marker != CAPABILITY_MARKER {
            tracing::debug!(%marker, "not a capability marker");
            return None;
        }

        let Some(json) = decode_base64(payload) else {
            tracing::debug!("capability payload is not base64");
            return None;
        };
        let payload: CapabilityPayload = match serde_json::from_slice(&json) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "capability payload is not valid JSON");
                return None;
            }
        };

        Some(Self {
            marker_segment: marker_segment.to_string(),
            project: project.to_string(),
            store_id: payload.id,
            token: payload.token,
            endpoint: payload.url,
        })
    }

    /// Tree path of the mount: `/<marker-segment>/<project>`.
    pub fn mount_path(&self) -> String {
        format!("/{}/{}", self.marker_segment, self.project)
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig::new(
            self.endpoint.clone(),
            self.store_id.clone(),
            self.token.clone(),
            self.mount_path(),
        )
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("project", &self.project)
            .field("store_id", &self.store_id)
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(payload).ok())
}

/// Encode a capability segment. The inverse of [`Capability::parse`] for the
/// first segment; used by hosts that mint mount paths.
pub fn encode_capability(store_id: &str, token: &str, endpoint: &str) -> String {
    let json = serde_json::json!({ "id": store_id, "token": token, "url": endpoint });
    format!(
        "{CAPABILITY_MARKER}{CAPABILITY_SEPARATOR}{}",
        URL_SAFE_NO_PAD.encode(json.to_string())
    )
}
