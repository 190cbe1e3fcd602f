//! Blob retrieval and media classification.
//!
//! Blobs are fetched by `(owner DID, content id)` from the service's
//! `com.atproto.sync.getBlob` path and classified by magic-byte
//! inspection. Metadata is derived from freshly fetched bytes on every
//! cycle and never cached across runs.

use crate::error::{Result, RotationError};
use crate::schedule::ContentId;
use std::time::Duration;
use url::Url;

/// Descriptive metadata for a fetched blob. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    /// The blob's content-addressed identifier.
    pub cid: ContentId,
    /// Sniffed media type, e.g. `image/png`.
    pub mime_type: String,
    /// Exact payload length in bytes.
    pub size: u64,
}

/// Sniff a media type from leading magic bytes.
///
/// Only container signatures are consulted, never a filename or
/// extension. Returns `None` for unrecognized payloads.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

    if bytes.starts_with(PNG) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

/// Classify a blob payload into [`BlobMetadata`].
///
/// # Errors
///
/// Returns [`RotationError::Fetch`] for empty payloads and for payloads
/// whose media type cannot be determined — a guessed type is never
/// substituted.
pub fn classify(cid: &ContentId, bytes: &[u8]) -> Result<BlobMetadata> {
    if bytes.is_empty() {
        return Err(RotationError::Fetch(format!("blob {cid} is empty")));
    }
    let mime_type = sniff_mime(bytes).ok_or_else(|| {
        RotationError::Fetch(format!("blob {cid} has an unrecognized media type"))
    })?;
    Ok(BlobMetadata {
        cid: cid.clone(),
        mime_type: mime_type.to_owned(),
        size: bytes.len() as u64,
    })
}

/// Bounded-timeout blob fetcher for one owner repository.
pub struct BlobFetcher {
    base: Url,
    did: String,
    client: reqwest::Client,
}

impl BlobFetcher {
    /// Create a fetcher for blobs owned by `did` at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(base: Url, did: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RotationError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base,
            did: did.into(),
            client,
        })
    }

    /// Fetch the raw bytes of one blob.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Fetch`] on any transport failure or
    /// non-2xx reply.
    pub async fn fetch(&self, cid: &ContentId) -> Result<Vec<u8>> {
        let url = format!(
            "{}/xrpc/com.atproto.sync.getBlob",
            self.base.as_str().trim_end_matches('/')
        );
        let resp = self
            .client
            .get(&url)
            .query(&[("did", self.did.as_str()), ("cid", cid.as_str())])
            .send()
            .await
            .map_err(|e| RotationError::Fetch(format!("blob {cid}: {e}")))?;

        if !resp.status().is_success() {
            return Err(RotationError::Fetch(format!(
                "blob {cid}: HTTP {}",
                resp.status().as_u16()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RotationError::Fetch(format!("blob {cid}: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// Fetch one blob and classify it in a single step.
    pub async fn fetch_classified(&self, cid: &ContentId) -> Result<BlobMetadata> {
        let bytes = self.fetch(cid).await?;
        classify(cid, &bytes)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    // Minimal valid headers for each recognized container.
    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    const WEBP_HEADER: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 ";

    #[test]
    fn sniff_recognizes_common_containers() {
        assert_eq!(sniff_mime(PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_mime(JPEG_HEADER), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a\x01\x00"), Some("image/gif"));
        assert_eq!(sniff_mime(b"GIF87a\x01\x00"), Some("image/gif"));
        assert_eq!(sniff_mime(WEBP_HEADER), Some("image/webp"));
        assert_eq!(sniff_mime(b"BM\x3e\x00"), Some("image/bmp"));
    }

    #[test]
    fn sniff_rejects_unknown_and_truncated() {
        assert_eq!(sniff_mime(b""), None);
        assert_eq!(sniff_mime(b"<svg xmlns="), None);
        assert_eq!(sniff_mime(b"RIFF\x24\x00\x00\x00WAVE"), None);
        // Truncated RIFF container, shorter than its format tag.
        assert_eq!(sniff_mime(b"RIFF\x24\x00"), None);
    }

    #[test]
    fn classify_derives_exact_size() {
        let cid = ContentId::new("cid-a");
        let meta = classify(&cid, PNG_HEADER).unwrap();
        assert_eq!(meta.cid, cid);
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.size, PNG_HEADER.len() as u64);
    }

    #[test]
    fn classify_empty_payload_fails() {
        let err = classify(&ContentId::new("cid-a"), b"").unwrap_err();
        assert!(matches!(err, RotationError::Fetch(msg) if msg.contains("empty")));
    }

    #[test]
    fn classify_never_guesses_a_type() {
        let err = classify(&ContentId::new("cid-a"), b"not an image").unwrap_err();
        assert!(matches!(
            err,
            RotationError::Fetch(msg) if msg.contains("unrecognized media type")
        ));
    }

    #[tokio::test]
    async fn fetch_from_unreachable_host_is_fetch_error() {
        let base = Url::parse("http://127.0.0.1:19999").unwrap();
        let fetcher =
            BlobFetcher::new(base, "did:plc:abc", Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch(&ContentId::new("cid-a")).await.unwrap_err();
        assert!(matches!(err, RotationError::Fetch(_)));
        assert_eq!(err.exit_code(), 4);
    }
}
