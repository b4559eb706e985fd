use std::fmt;

use crate::{Author, Limits, Time, Uuid, Vote, STUB_UUID};

pub const DELETED_PLACEHOLDER: &str = "[Comment deleted]";
pub const MODERATED_PLACEHOLDER: &str = "[Comment removed by moderation]";

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }

    pub fn random() -> CommentId {
        CommentId(Uuid::new_v4())
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies the review, article or news item a thread hangs off
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ContentSlug(pub String);

impl ContentSlug {
    pub fn new(s: impl Into<String>) -> ContentSlug {
        ContentSlug(s.into())
    }
}

impl fmt::Display for ContentSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A comment as the store returns it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub slug: ContentSlug,

    /// `None` for top-level comments
    pub parent_id: Option<CommentId>,

    pub author: Author,
    pub body: String,
    pub created_at: Time,
    pub is_deleted: bool,
    pub votes: Vec<Vote>,

    /// Number of direct replies in the store
    pub reply_count: u64,

    /// Oldest-first preview of the replies, possibly shorter than
    /// `reply_count`
    pub replies: Vec<Comment>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub slug: ContentSlug,
    pub body: String,
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn top_level(slug: ContentSlug, body: impl Into<String>) -> NewComment {
        NewComment {
            slug,
            body: body.into(),
            parent_id: None,
        }
    }

    pub fn reply(slug: ContentSlug, parent: CommentId, body: impl Into<String>) -> NewComment {
        NewComment {
            slug,
            body: body.into(),
            parent_id: Some(parent),
        }
    }

    pub fn validate(&self, limits: &Limits) -> Result<(), crate::Error> {
        crate::validate_string(&self.slug.0)?;
        crate::validate_content(&self.body, limits)
    }
}

/// What the store did when asked to delete a comment
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum DeleteOutcome {
    /// The comment had no replies and is gone
    Removed(CommentId),

    /// The comment had replies, its content was replaced by a placeholder
    SoftDeleted(Comment),
}

impl DeleteOutcome {
    pub fn comment_id(&self) -> CommentId {
        match self {
            DeleteOutcome::Removed(id) => *id,
            DeleteOutcome::SoftDeleted(c) => c.id,
        }
    }
}
