use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

use crate::CommentId;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Comment not found {0}")]
    NotFound(CommentId),

    #[error("Comment content is empty")]
    EmptyContent,

    #[error("Comment is {len} characters long, the maximum is {max}")]
    ContentTooLong { len: usize, max: usize },

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Too many requests, please slow down")]
    RateLimited,

    #[error("Comment {0} is not confirmed by the server yet")]
    ProvisionalComment(CommentId),

    #[error("Comment {0} is already deleted")]
    AlreadyDeleted(CommentId),
}

impl Error {
    /// Whether the user can fix the input and try again
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyContent
                | Error::ContentTooLong { .. }
                | Error::NullByteInString(_)
                | Error::RateLimited
        )
    }

    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotSignedIn => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::ContentTooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::ProvisionalComment(_) => StatusCode::CONFLICT,
            Error::AlreadyDeleted(_) => StatusCode::GONE,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotSignedIn => json!({
                "message": "not signed in",
                "type": "not-signed-in",
            }),
            Error::NotFound(id) => json!({
                "message": "comment not found",
                "type": "not-found",
                "id": id,
            }),
            Error::EmptyContent => json!({
                "message": "comment content is empty",
                "type": "empty-content",
            }),
            Error::ContentTooLong { len, max } => json!({
                "message": "comment is too long",
                "type": "content-too-long",
                "len": len,
                "max": max,
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::RateLimited => json!({
                "message": "too many requests",
                "type": "rate-limited",
            }),
            Error::ProvisionalComment(id) => json!({
                "message": "comment is not confirmed yet",
                "type": "provisional",
                "id": id,
            }),
            Error::AlreadyDeleted(id) => json!({
                "message": "comment is already deleted",
                "type": "already-deleted",
                "id": id,
            }),
        })
        .expect("serializing error")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let comment_id = || -> anyhow::Result<CommentId> {
            data.get("id")
                .and_then(|id| id.as_str())
                .and_then(|id| Uuid::from_str(id).ok())
                .map(CommentId)
                .ok_or_else(|| anyhow!("error is about a comment without a proper id"))
        };
        let usize_field = |name: &str| -> anyhow::Result<usize> {
            data.get(name)
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .ok_or_else(|| anyhow!("error is missing integer field {name:?}"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "not-signed-in" => Error::NotSignedIn,
                "not-found" => Error::NotFound(comment_id()?),
                "empty-content" => Error::EmptyContent,
                "content-too-long" => Error::ContentTooLong {
                    len: usize_field("len")?,
                    max: usize_field("max")?,
                },
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "rate-limited" => Error::RateLimited,
                "provisional" => Error::ProvisionalComment(comment_id()?),
                "already-deleted" => Error::AlreadyDeleted(comment_id()?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
