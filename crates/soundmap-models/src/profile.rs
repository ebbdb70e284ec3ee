//! User profile and listening preferences.

use std::collections::HashSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::ClipId;

/// Display name given to profiles created by anonymous sign-in.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

/// Maximum display name length (characters).
pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;

/// A listener's reaction to a surfaced clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    Like,
    Dislike,
    Skip,
}

impl Preference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preference::Like => "like",
            Preference::Dislike => "dislike",
            Preference::Skip => "skip",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Profile row stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    /// User ID (matches the auth subject)
    pub id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub liked_clip_ids: Vec<ClipId>,

    #[serde(default)]
    pub disliked_clip_ids: Vec<ClipId>,

    #[serde(default)]
    pub is_anonymous: bool,
}

impl Profile {
    /// Profile created at first sign-in.
    pub fn new(id: impl Into<String>, is_anonymous: bool) -> Self {
        Self {
            id: id.into(),
            display_name: if is_anonymous {
                ANONYMOUS_DISPLAY_NAME.to_string()
            } else {
                String::new()
            },
            liked_clip_ids: Vec::new(),
            disliked_clip_ids: Vec::new(),
            is_anonymous,
        }
    }

    pub fn has_liked(&self, clip_id: &ClipId) -> bool {
        self.liked_clip_ids.contains(clip_id)
    }

    pub fn has_disliked(&self, clip_id: &ClipId) -> bool {
        self.disliked_clip_ids.contains(clip_id)
    }

    /// Record a like. Clears a previous dislike. Returns false if already liked.
    pub fn like(&mut self, clip_id: &ClipId) -> bool {
        self.disliked_clip_ids.retain(|id| id != clip_id);
        if self.has_liked(clip_id) {
            return false;
        }
        self.liked_clip_ids.push(clip_id.clone());
        true
    }

    /// Record a dislike. Clears a previous like. Returns false if already disliked.
    pub fn dislike(&mut self, clip_id: &ClipId) -> bool {
        self.liked_clip_ids.retain(|id| id != clip_id);
        if self.has_disliked(clip_id) {
            return false;
        }
        self.disliked_clip_ids.push(clip_id.clone());
        true
    }

    /// Apply a preference. Skips are session-only and never change the profile.
    pub fn apply(&mut self, clip_id: &ClipId, preference: Preference) -> bool {
        match preference {
            Preference::Like => self.like(clip_id),
            Preference::Dislike => self.dislike(clip_id),
            Preference::Skip => false,
        }
    }

    /// Clip IDs the range filter must exclude for this listener.
    pub fn excluded_ids(&self) -> HashSet<ClipId> {
        self.disliked_clip_ids.iter().cloned().collect()
    }

    /// Set the display name, trimmed and capped. Empty names fall back for anonymous users.
    pub fn set_display_name(&mut self, name: &str) {
        let trimmed: String = name.trim().chars().take(MAX_DISPLAY_NAME_LENGTH).collect();
        self.display_name = if trimmed.is_empty() && self.is_anonymous {
            ANONYMOUS_DISPLAY_NAME.to_string()
        } else {
            trimmed
        };
    }
}
