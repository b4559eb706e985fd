use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod comment;
pub use comment::{
    Comment, CommentId, ContentSlug, DeleteOutcome, NewComment, DELETED_PLACEHOLDER,
    MODERATED_PLACEHOLDER,
};

mod config;
pub use config::{Limits, RateLimit};

mod error;
pub use error::Error;

mod store;
pub use store::CommentStore;

mod user;
pub use user::{Author, Role, Session, UserId};

mod vote;
pub use vote::{Tally, Vote, VoteType};

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        Err(Error::NullByteInString(String::from(s)))
    } else {
        Ok(())
    }
}

/// Checks user-submitted comment text against `limits`
pub fn validate_content(body: &str, limits: &Limits) -> Result<(), Error> {
    validate_string(body)?;
    if body.trim().is_empty() {
        return Err(Error::EmptyContent);
    }
    let len = body.chars().count();
    if len > limits.max_comment_len {
        return Err(Error::ContentTooLong {
            len,
            max: limits.max_comment_len,
        });
    }
    Ok(())
}
