use async_trait::async_trait;

use crate::{Comment, CommentId, ContentSlug, DeleteOutcome, Error, NewComment, Vote, VoteType};

/// The backing comment store, acting on behalf of the signed-in user
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Top-level comments for `slug`, newest first, each carrying a
    /// bounded preview of its replies
    async fn list_comments(&self, slug: &ContentSlug) -> Result<Vec<Comment>, Error>;

    /// All direct replies to `parent`, oldest first
    async fn get_replies(&self, parent: CommentId) -> Result<Vec<Comment>, Error>;

    async fn post_comment(&self, c: NewComment) -> Result<Comment, Error>;

    async fn update_comment(&self, id: CommentId, body: String) -> Result<Comment, Error>;

    async fn delete_comment(&self, id: CommentId) -> Result<DeleteOutcome, Error>;

    /// Toggles the user's vote, returning the comment's full vote set
    async fn vote(&self, id: CommentId, vote_type: VoteType) -> Result<Vec<Vote>, Error>;

    /// All comments across the site, newest first; moderators only
    async fn moderation_page(&self, offset: usize, limit: usize) -> Result<Vec<Comment>, Error>;

    /// Soft-deletes any comment with the moderation placeholder; moderators only
    async fn moderator_delete(&self, id: CommentId) -> Result<(), Error>;
}

#[async_trait]
impl<T: CommentStore + ?Sized> CommentStore for std::sync::Arc<T> {
    async fn list_comments(&self, slug: &ContentSlug) -> Result<Vec<Comment>, Error> {
        (**self).list_comments(slug).await
    }

    async fn get_replies(&self, parent: CommentId) -> Result<Vec<Comment>, Error> {
        (**self).get_replies(parent).await
    }

    async fn post_comment(&self, c: NewComment) -> Result<Comment, Error> {
        (**self).post_comment(c).await
    }

    async fn update_comment(&self, id: CommentId, body: String) -> Result<Comment, Error> {
        (**self).update_comment(id, body).await
    }

    async fn delete_comment(&self, id: CommentId) -> Result<DeleteOutcome, Error> {
        (**self).delete_comment(id).await
    }

    async fn vote(&self, id: CommentId, vote_type: VoteType) -> Result<Vec<Vote>, Error> {
        (**self).vote(id, vote_type).await
    }

    async fn moderation_page(&self, offset: usize, limit: usize) -> Result<Vec<Comment>, Error> {
        (**self).moderation_page(offset, limit).await
    }

    async fn moderator_delete(&self, id: CommentId) -> Result<(), Error> {
        (**self).moderator_delete(id).await
    }
}
