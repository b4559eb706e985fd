use parking_lot::Mutex;

use crate::{
    api::{CommentId, CommentStore, ContentSlug, Error, Limits, Session, VoteType},
    Completion, CommentTree, Reconciler,
};

/// Drives a [`Reconciler`] against a [`CommentStore`]
///
/// The reconciler lock is only ever held between two awaits, so any number
/// of operations can be in flight at once; their answers are reconciled in
/// whatever order they arrive.
pub struct CommentSection<S> {
    store: S,
    state: Mutex<Reconciler>,
}

impl<S: CommentStore> CommentSection<S> {
    pub fn new(
        store: S,
        slug: ContentSlug,
        session: Option<Session>,
        limits: Limits,
    ) -> CommentSection<S> {
        CommentSection {
            store,
            state: Mutex::new(Reconciler::new(slug, session, limits)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the current tree, for rendering
    pub fn tree(&self) -> CommentTree {
        self.state.lock().tree().clone()
    }

    pub fn with_reconciler<R>(&self, f: impl FnOnce(&mut Reconciler) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub async fn load(&self) -> Result<(), Error> {
        let slug = self.state.lock().slug().clone();
        let records = self.store.list_comments(&slug).await?;
        self.state.lock().replace_all(records);
        Ok(())
    }

    pub async fn post(&self, body: impl Into<String>) -> Result<Completion, Error> {
        self.insert(body.into(), None).await
    }

    pub async fn reply(
        &self,
        parent: CommentId,
        body: impl Into<String>,
    ) -> Result<Completion, Error> {
        self.insert(body.into(), Some(parent)).await
    }

    async fn insert(&self, body: String, parent: Option<CommentId>) -> Result<Completion, Error> {
        let t = self.state.lock().begin_insert(body, parent)?;
        let res = self.store.post_comment(t.request().clone()).await;
        self.state.lock().complete_insert(t, res)
    }

    pub async fn vote(&self, id: CommentId, vote_type: VoteType) -> Result<Completion, Error> {
        let t = self.state.lock().begin_vote(&id, vote_type)?;
        let res = self.store.vote(id, vote_type).await;
        self.state.lock().complete_vote(t, res)
    }

    pub async fn edit(&self, id: CommentId, body: impl Into<String>) -> Result<Completion, Error> {
        let t = self.state.lock().begin_edit(&id, body)?;
        let res = self.store.update_comment(id, t.body().to_string()).await;
        self.state.lock().complete_edit(t, res)
    }

    pub async fn delete(&self, id: CommentId) -> Result<Completion, Error> {
        let t = self.state.lock().begin_delete(&id)?;
        let res = self.store.delete_comment(id).await;
        self.state.lock().complete_delete(t, res)
    }

    /// Fetches every reply of `parent` beyond the preview
    pub async fn load_replies(&self, parent: CommentId) -> Result<(), Error> {
        if !self.state.lock().tree().contains(&parent) {
            return Err(Error::NotFound(parent));
        }
        let replies = self.store.get_replies(parent).await?;
        tracing::debug!(comment = ?parent, num_replies = replies.len(), "loaded replies");
        self.state.lock().load_replies(&parent, replies)
    }

    pub async fn moderator_delete(&self, id: CommentId) -> Result<(), Error> {
        self.state.lock().check_moderator()?;
        self.store.moderator_delete(id).await?;
        let mut state = self.state.lock();
        if state.tree().contains(&id) {
            state.apply_moderation(&id)?;
        }
        Ok(())
    }

    pub async fn moderation_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<crate::api::Comment>, Error> {
        self.state.lock().check_moderator()?;
        self.store.moderation_page(offset, limit).await
    }
}
