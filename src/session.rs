//! Authenticated session against the record service.
//!
//! [`Session::login`] exchanges the account credentials for an access
//! token; the session then exposes the two record operations the
//! pipeline needs: reading the profile together with its version token,
//! and writing it back conditioned on that token (`swapRecord`).
//!
//! A stale token makes the service reject the write with `InvalidSwap`,
//! which is surfaced as [`RotationError::Conflict`] — distinct from
//! transport errors, because it signals a genuine concurrent edit.

use crate::error::{Result, RotationError};
use crate::profile::{PROFILE_COLLECTION, PROFILE_RKEY, ProfileRecord};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Opaque version token tied to one read of the profile record.
///
/// On the wire this is the record CID; the pipeline never inspects it,
/// only hands it back as the compare-and-swap precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw token value.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    did: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
struct GetRecordResponse {
    cid: Option<String>,
    value: ProfileRecord,
}

#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// An authenticated session.
#[derive(Debug)]
pub struct Session {
    base: Url,
    client: reqwest::Client,
    access_jwt: String,
    /// DID the service resolved for the account.
    pub did: String,
    /// Handle as confirmed by the service.
    pub handle: String,
}

impl Session {
    /// Authenticate against `base` and open a session.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Auth`] when the service rejects the
    /// credentials and [`RotationError::Transport`] for network failures
    /// or unexpected server errors.
    pub async fn login(
        base: Url,
        handle: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RotationError::Transport(format!("failed to build HTTP client: {e}")))?;

        let url = xrpc_url(&base, "com.atproto.server.createSession");
        let resp = client
            .post(&url)
            .json(&serde_json::json!({
                "identifier": handle,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| RotationError::Transport(format!("login: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let (name, message) = error_detail(resp).await;
            // 4xx is a credential/account problem; anything else is the
            // service misbehaving.
            if status.is_client_error() {
                return Err(RotationError::Auth(format!(
                    "login rejected ({}): {message}",
                    name.unwrap_or_else(|| status.as_u16().to_string())
                )));
            }
            return Err(RotationError::Transport(format!(
                "login: HTTP {}: {message}",
                status.as_u16()
            )));
        }

        let session: CreateSessionResponse = resp
            .json()
            .await
            .map_err(|e| RotationError::Transport(format!("login response: {e}")))?;

        Ok(Self {
            base,
            client,
            access_jwt: session.access_jwt,
            did: session.did,
            handle: session.handle,
        })
    }

    /// Read the profile record and its version token.
    ///
    /// Returns `Ok(None)` when no record exists yet — the caller
    /// proceeds from an empty baseline. A *network* failure during the
    /// read is an error: writing without a version token after a failed
    /// read could clobber a record that was merely invisible.
    pub async fn get_profile(&self, repo: &str) -> Result<Option<(ProfileRecord, VersionToken)>> {
        let url = xrpc_url(&self.base, "com.atproto.repo.getRecord");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_jwt)
            .query(&[
                ("repo", repo),
                ("collection", PROFILE_COLLECTION),
                ("rkey", PROFILE_RKEY),
            ])
            .send()
            .await
            .map_err(|e| RotationError::Transport(format!("read record: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let (name, message) = error_detail(resp).await;
            if name.as_deref() == Some("RecordNotFound") {
                return Ok(None);
            }
            return Err(RotationError::Transport(format!(
                "read record: HTTP {}: {message}",
                status.as_u16()
            )));
        }

        let body: GetRecordResponse = resp
            .json()
            .await
            .map_err(|e| RotationError::Transport(format!("read record response: {e}")))?;
        let cid = body.cid.ok_or_else(|| {
            RotationError::Transport("read record response carries no version token".into())
        })?;
        Ok(Some((body.value, VersionToken::new(cid))))
    }

    /// Write the profile record, conditioned on `swap` when present.
    ///
    /// `swap: None` is the first-ever-run case: an unconditional create.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Conflict`] when the service rejects the
    /// write because the record changed since it was read, and
    /// [`RotationError::Transport`] for every other failure.
    pub async fn put_profile(
        &self,
        repo: &str,
        record: &ProfileRecord,
        swap: Option<&VersionToken>,
    ) -> Result<()> {
        let url = xrpc_url(&self.base, "com.atproto.repo.putRecord");
        let mut body = serde_json::json!({
            "repo": repo,
            "collection": PROFILE_COLLECTION,
            "rkey": PROFILE_RKEY,
            "record": record,
        });
        if let Some(token) = swap {
            body["swapRecord"] = serde_json::Value::String(token.as_str().to_owned());
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_jwt)
            .json(&body)
            .send()
            .await
            .map_err(|e| RotationError::Transport(format!("write record: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let (name, message) = error_detail(resp).await;
        if name.as_deref() == Some("InvalidSwap") {
            return Err(RotationError::Conflict(format!(
                "record changed between read and write: {message}"
            )));
        }
        Err(RotationError::Transport(format!(
            "write record: HTTP {}: {message}",
            status.as_u16()
        )))
    }
}

/// Build an XRPC method URL on `base`.
fn xrpc_url(base: &Url, nsid: &str) -> String {
    format!("{}/xrpc/{nsid}", base.as_str().trim_end_matches('/'))
}

/// Extract the structured error name and a displayable message from an
/// XRPC error reply.
async fn error_detail(resp: reqwest::Response) -> (Option<String>, String) {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let parsed: XrpcErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = parsed
        .message
        .or_else(|| {
            if text.is_empty() {
                None
            } else {
                Some(text.chars().take(200).collect())
            }
        })
        .unwrap_or_else(|| format!("HTTP {status}"));
    (parsed.error, message)
}
