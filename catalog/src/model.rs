use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ChannelId = Uuid;
pub type UserId = Uuid;
pub type PostId = Uuid;

/// A publisher channel as listed on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    /// Messenger-side channel id; the identifier callers address channels by.
    pub external_id: i64,
    pub title: String,
    pub username: Option<String>,
    /// Only listed channels accept new deals.
    pub is_listed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Owner,
    Manager,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Owner => "owner",
            RoleKind::Manager => "manager",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(RoleKind::Owner),
            "manager" => Ok(RoleKind::Manager),
            other => Err(anyhow::anyhow!("Invalid RoleKind value: {}", other)),
        }
    }
}

/// Relationship between a user and a channel. Any role counts as
/// publisher-side authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRole {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub role: RoleKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdFormatType {
    Post,
    Repost,
    Story,
}

impl AdFormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdFormatType::Post => "post",
            AdFormatType::Repost => "repost",
            AdFormatType::Story => "story",
        }
    }
}

impl fmt::Display for AdFormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdFormatType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(AdFormatType::Post),
            "repost" => Ok(AdFormatType::Repost),
            "story" => Ok(AdFormatType::Story),
            other => Err(anyhow::anyhow!("Invalid AdFormatType value: {}", other)),
        }
    }
}

/// The shape of an ad slot, without its price. Two offers describe the same
/// slot exactly when their terms are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatTerms {
    pub format_type: AdFormatType,
    pub is_native: bool,
    /// Hours the post must stay in the feed.
    pub feed_hours: u32,
    /// Hours the post must stay pinned on top.
    pub top_hours: u32,
}

/// One priced offering from a channel's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdFormat {
    pub id: Uuid,
    pub channel_id: ChannelId,
    pub terms: FormatTerms,
    pub price_nano_ton: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub telegram_id: i64,
    pub name: String,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    /// Reusable creative owned by a user; `external_id` is the owner's id.
    Template,
    /// Creative attached to a deal; `external_id` is the deal id.
    Ad,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Template => "template",
            PostKind::Ad => "ad",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "template" => Ok(PostKind::Template),
            "ad" => Ok(PostKind::Ad),
            other => Err(anyhow::anyhow!("Invalid PostKind value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
    Document,
    Animation,
    Audio,
    Voice,
    VideoNote,
    Sticker,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
            MediaType::Document => "document",
            MediaType::Animation => "animation",
            MediaType::Audio => "audio",
            MediaType::Voice => "voice",
            MediaType::VideoNote => "video_note",
            MediaType::Sticker => "sticker",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(MediaType::Photo),
            "video" => Ok(MediaType::Video),
            "document" => Ok(MediaType::Document),
            "animation" => Ok(MediaType::Animation),
            "audio" => Ok(MediaType::Audio),
            "voice" => Ok(MediaType::Voice),
            "video_note" => Ok(MediaType::VideoNote),
            "sticker" => Ok(MediaType::Sticker),
            other => Err(anyhow::anyhow!("Invalid MediaType value: {}", other)),
        }
    }
}

/// The creative payload of one post fragment (a caption, a media item, or both).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    pub name: Option<String>,
    pub text: Option<String>,
    /// Message entities (formatting, links) as delivered by the messenger.
    pub entities: Option<serde_json::Value>,
    pub media_type: Option<MediaType>,
    pub media_file_id: Option<String>,
    pub has_media_spoiler: bool,
    pub show_caption_above_media: bool,
}

/// A stored post fragment. Fragments sharing a `media_group_id` render as
/// one album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub kind: PostKind,
    pub external_id: Uuid,
    /// Ad version number; `None` for templates.
    pub version: Option<u32>,
    pub media_group_id: Option<String>,
    pub content: PostContent,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// True when this is a template owned by `user_id`.
    pub fn is_template_of(&self, user_id: &UserId) -> bool {
        self.kind == PostKind::Template && self.external_id == *user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_post(kind: PostKind, external_id: Uuid) -> Post {
        Post {
            id: Uuid::new_v4(),
            kind,
            external_id,
            version: None,
            media_group_id: None,
            content: PostContent {
                text: Some("hello".into()),
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn template_ownership_requires_kind_and_owner() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert!(mk_post(PostKind::Template, owner).is_template_of(&owner));
        assert!(!mk_post(PostKind::Template, owner).is_template_of(&stranger));
        // Ad posts are keyed by deal id; even a colliding id is not ownership.
        assert!(!mk_post(PostKind::Ad, owner).is_template_of(&owner));
    }

    #[test]
    fn enum_names_round_trip_through_strings() {
        for m in [
            MediaType::Photo,
            MediaType::Video,
            MediaType::Document,
            MediaType::Animation,
            MediaType::Audio,
            MediaType::Voice,
            MediaType::VideoNote,
            MediaType::Sticker,
        ] {
            assert_eq!(m.as_str().parse::<MediaType>().unwrap(), m);
        }
        assert_eq!("manager".parse::<RoleKind>().unwrap(), RoleKind::Manager);
        assert_eq!("story".parse::<AdFormatType>().unwrap(), AdFormatType::Story);
        assert_eq!("ad".parse::<PostKind>().unwrap(), PostKind::Ad);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert!("admin".parse::<RoleKind>().is_err());
        assert!("banner".parse::<AdFormatType>().is_err());
        assert!("draft".parse::<PostKind>().is_err());
        assert!("hologram".parse::<MediaType>().is_err());
    }

    #[test]
    fn terms_equality_ignores_nothing() {
        let base = FormatTerms {
            format_type: AdFormatType::Post,
            is_native: false,
            feed_hours: 24,
            top_hours: 2,
        };
        assert_eq!(base, base);
        assert_ne!(base, FormatTerms { is_native: true, ..base });
        assert_ne!(base, FormatTerms { feed_hours: 48, ..base });
        assert_ne!(base, FormatTerms { top_hours: 1, ..base });
        assert_ne!(
            base,
            FormatTerms {
                format_type: AdFormatType::Repost,
                ..base
            }
        );
    }
}
