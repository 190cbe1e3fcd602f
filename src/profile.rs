//! Profile record types and the selective-overlay merge.
//!
//! A [`ProfileRecord`] is a local read copy of the remote record, held
//! only for the duration of one cycle. [`build_next`] overlays exactly
//! the intended visual changes onto it: the avatar is always replaced,
//! the banner only when explicitly requested, and every other field —
//! including fields this crate does not model — is carried over
//! untouched via serde flattening.

use crate::blob::BlobMetadata;
use serde::{Deserialize, Serialize};

/// Record collection holding the profile.
pub const PROFILE_COLLECTION: &str = "app.bsky.actor.profile";

/// Record key of the profile inside its collection.
pub const PROFILE_RKEY: &str = "self";

/// `$type` value of a profile record.
pub const PROFILE_TYPE: &str = "app.bsky.actor.profile";

/// The content-addressed link inside a blob reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobLink {
    /// Content id of the blob.
    #[serde(rename = "$link")]
    pub link: String,
}

/// A typed reference to an already-registered blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Always `"blob"`.
    #[serde(rename = "$type")]
    pub blob_type: String,
    /// Content-addressed link.
    #[serde(rename = "ref")]
    pub reference: BlobLink,
    /// Declared media type.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Payload size in bytes.
    pub size: u64,
}

impl From<&BlobMetadata> for BlobRef {
    fn from(meta: &BlobMetadata) -> Self {
        Self {
            blob_type: "blob".to_owned(),
            reference: BlobLink {
                link: meta.cid.as_str().to_owned(),
            },
            mime_type: meta.mime_type.clone(),
            size: meta.size,
        }
    }
}

/// A profile record, as read from and written to the service.
///
/// Unknown fields survive a read-modify-write round trip through the
/// flattened `extra` map, so an update to one visual field never erases
/// fields this crate does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Record type tag.
    #[serde(rename = "$type", default = "profile_type")]
    pub record_type: String,
    /// Display name, preserved across updates.
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Bio text, preserved across updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Avatar blob reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<BlobRef>,
    /// Banner blob reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<BlobRef>,
    /// Fields this crate does not model, carried over verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn profile_type() -> String {
    PROFILE_TYPE.to_owned()
}

impl Default for ProfileRecord {
    fn default() -> Self {
        Self {
            record_type: profile_type(),
            display_name: None,
            description: None,
            avatar: None,
            banner: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// The banner change requested for this cycle, after the schedule
/// directive, the `update_banner` setting and the fetch outcome have all
/// been taken into account.
#[derive(Debug, Clone, PartialEq)]
pub enum BannerUpdate {
    /// Carry the prior banner over unchanged (including staying absent).
    Keep,
    /// Remove the banner.
    Clear,
    /// Replace the banner with this blob.
    Set(BlobMetadata),
}

/// Build the next profile record from the current one.
///
/// Starts from `current` when present — preserving the display name,
/// description, existing banner and every unmodelled field — or from an
/// empty record otherwise. The avatar is overwritten unconditionally;
/// the banner only per `banner`.
pub fn build_next(
    current: Option<&ProfileRecord>,
    avatar: &BlobMetadata,
    banner: BannerUpdate,
) -> ProfileRecord {
    let mut next = current.cloned().unwrap_or_default();
    next.record_type = profile_type();
    next.avatar = Some(BlobRef::from(avatar));
    match banner {
        BannerUpdate::Keep => {}
        BannerUpdate::Clear => next.banner = None,
        BannerUpdate::Set(meta) => next.banner = Some(BlobRef::from(&meta)),
    }
    next
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::schedule::ContentId;
    use serde_json::json;

    fn meta(cid: &str) -> BlobMetadata {
        BlobMetadata {
            cid: ContentId::new(cid),
            mime_type: "image/png".into(),
            size: 1024,
        }
    }

    fn prior() -> ProfileRecord {
        let mut record = ProfileRecord {
            display_name: Some("Alice".into()),
            description: Some("hello".into()),
            avatar: Some(BlobRef::from(&meta("cid-old-avatar"))),
            banner: Some(BlobRef::from(&meta("cid-old-banner"))),
            ..Default::default()
        };
        record
            .extra
            .insert("pinnedPost".into(), json!({"uri": "at://x", "cid": "y"}));
        record
    }

    // ── Merge properties ───────────────────────────────────────

    #[test]
    fn avatar_is_always_replaced() {
        let next = build_next(Some(&prior()), &meta("cid-new"), BannerUpdate::Keep);
        assert_eq!(next.avatar.unwrap().reference.link, "cid-new");
    }

    #[test]
    fn keep_leaves_banner_untouched() {
        let current = prior();
        let next = build_next(Some(&current), &meta("cid-new"), BannerUpdate::Keep);
        assert_eq!(next.banner, current.banner);
    }

    #[test]
    fn keep_with_no_prior_banner_stays_absent() {
        let mut current = prior();
        current.banner = None;
        let next = build_next(Some(&current), &meta("cid-new"), BannerUpdate::Keep);
        assert!(next.banner.is_none());
    }

    #[test]
    fn set_replaces_banner_and_nothing_else() {
        let current = prior();
        let next = build_next(
            Some(&current),
            &meta("cid-new"),
            BannerUpdate::Set(meta("cid-new-banner")),
        );
        assert_eq!(next.banner.unwrap().reference.link, "cid-new-banner");
        assert_eq!(next.display_name, current.display_name);
        assert_eq!(next.description, current.description);
    }

    #[test]
    fn clear_removes_banner() {
        let next = build_next(Some(&prior()), &meta("cid-new"), BannerUpdate::Clear);
        assert!(next.banner.is_none());
    }

    #[test]
    fn unmodelled_fields_are_carried_over() {
        let next = build_next(Some(&prior()), &meta("cid-new"), BannerUpdate::Keep);
        assert!(next.extra.contains_key("pinnedPost"));
    }

    #[test]
    fn no_prior_record_starts_from_empty_baseline() {
        let next = build_next(None, &meta("cid-a"), BannerUpdate::Keep);
        assert_eq!(next.record_type, PROFILE_TYPE);
        assert!(next.display_name.is_none());
        assert!(next.description.is_none());
        assert!(next.banner.is_none());
        assert_eq!(next.avatar.unwrap().reference.link, "cid-a");
    }

    #[test]
    fn reapplication_is_idempotent() {
        let avatar = meta("cid-a");
        let first = build_next(Some(&prior()), &avatar, BannerUpdate::Keep);
        let second = build_next(Some(&first), &avatar, BannerUpdate::Keep);
        assert_eq!(first, second);
        // Byte-for-byte, not just structurally.
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    // ── Wire shape ─────────────────────────────────────────────

    #[test]
    fn record_serializes_with_wire_field_names() {
        let next = build_next(None, &meta("cid-a"), BannerUpdate::Keep);
        let value = serde_json::to_value(&next).unwrap();
        assert_eq!(value["$type"], PROFILE_TYPE);
        assert_eq!(value["avatar"]["$type"], "blob");
        assert_eq!(value["avatar"]["ref"]["$link"], "cid-a");
        assert_eq!(value["avatar"]["mimeType"], "image/png");
        assert_eq!(value["avatar"]["size"], 1024);
        // Absent optionals are omitted, not serialized as null.
        assert!(value.get("displayName").is_none());
        assert!(value.get("banner").is_none());
    }

    #[test]
    fn record_round_trips_unknown_fields() {
        let wire = json!({
            "$type": PROFILE_TYPE,
            "displayName": "Alice",
            "labels": {"$type": "com.atproto.label.defs#selfLabels", "values": []},
            "createdAt": "2023-01-01T00:00:00Z"
        });
        let record: ProfileRecord = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(record.display_name.as_deref(), Some("Alice"));
        assert!(record.extra.contains_key("labels"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["labels"], wire["labels"]);
        assert_eq!(back["createdAt"], wire["createdAt"]);
    }

    #[test]
    fn record_without_type_tag_gets_default() {
        let record: ProfileRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(record.record_type, PROFILE_TYPE);
    }
}
