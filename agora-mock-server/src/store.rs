use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use agora_api::{
    Comment, CommentId, CommentStore, ContentSlug, DeleteOutcome, Error, NewComment, Session,
    Vote, VoteType,
};

use crate::{AuthToken, MockServer};

/// A [`MockServer`] seen through one user's session
#[derive(Clone)]
pub struct MockStore {
    server: Arc<Mutex<MockServer>>,
    token: Option<AuthToken>,
}

impl MockStore {
    pub fn new(server: Arc<Mutex<MockServer>>, token: Option<AuthToken>) -> MockStore {
        MockStore { server, token }
    }

    /// A store that can only read
    pub fn anonymous(server: Arc<Mutex<MockServer>>) -> MockStore {
        MockStore::new(server, None)
    }

    fn token(&self) -> Result<AuthToken, Error> {
        self.token.ok_or(Error::NotSignedIn)
    }

    pub async fn session(&self) -> Result<Option<Session>, Error> {
        match self.token {
            None => Ok(None),
            Some(tok) => self.server.lock().await.whoami(tok).map(Some),
        }
    }
}

#[async_trait]
impl CommentStore for MockStore {
    async fn list_comments(&self, slug: &ContentSlug) -> Result<Vec<Comment>, Error> {
        self.server.lock().await.list_comments(slug)
    }

    async fn get_replies(&self, parent: CommentId) -> Result<Vec<Comment>, Error> {
        self.server.lock().await.get_replies(parent)
    }

    async fn post_comment(&self, c: NewComment) -> Result<Comment, Error> {
        self.server.lock().await.post_comment(self.token()?, c)
    }

    async fn update_comment(&self, id: CommentId, body: String) -> Result<Comment, Error> {
        self.server.lock().await.update_comment(self.token()?, id, body)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<DeleteOutcome, Error> {
        self.server.lock().await.delete_comment(self.token()?, id)
    }

    async fn vote(&self, id: CommentId, vote_type: VoteType) -> Result<Vec<Vote>, Error> {
        self.server.lock().await.vote(self.token()?, id, vote_type)
    }

    async fn moderation_page(&self, offset: usize, limit: usize) -> Result<Vec<Comment>, Error> {
        self.server
            .lock()
            .await
            .moderation_page(self.token()?, offset, limit)
    }

    async fn moderator_delete(&self, id: CommentId) -> Result<(), Error> {
        self.server.lock().await.moderator_delete(self.token()?, id)
    }
}
