use std::collections::HashSet;

use chrono::Utc;

use crate::{
    api::{
        self, CommentId, ContentSlug, DeleteOutcome, Error, Limits, NewComment, Session, Vote,
        VoteType, MODERATED_PLACEHOLDER,
    },
    Comment, CommentTree, RequestSeq, Ticket,
};

/// How a store answer was taken into account
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
    /// The tree now reflects the store's answer
    Applied,

    /// A newer request for the same comment was issued, or the comment left
    /// the tree, so the answer was discarded
    Stale,
}

#[must_use = "insert tickets must be completed with the store's answer"]
#[derive(Clone, Debug)]
pub struct InsertTicket {
    request: NewComment,
    provisional: CommentId,

    /// Tree before the optimistic insert, and its version right after
    snapshot: CommentTree,
    version: u64,
}

impl InsertTicket {
    pub fn request(&self) -> &NewComment {
        &self.request
    }

    pub fn provisional_id(&self) -> CommentId {
        self.provisional
    }
}

#[must_use = "vote tickets must be completed with the store's answer"]
#[derive(Clone, Copy, Debug)]
pub struct VoteTicket {
    ticket: Ticket,
    vote_type: VoteType,
}

impl VoteTicket {
    pub fn comment(&self) -> CommentId {
        self.ticket.comment
    }

    pub fn vote_type(&self) -> VoteType {
        self.vote_type
    }
}

#[must_use = "edit tickets must be completed with the store's answer"]
#[derive(Clone, Debug)]
pub struct EditTicket {
    ticket: Ticket,
    body: String,
}

impl EditTicket {
    pub fn comment(&self) -> CommentId {
        self.ticket.comment
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

#[must_use = "delete tickets must be completed with the store's answer"]
#[derive(Clone, Copy, Debug)]
pub struct DeleteTicket {
    ticket: Ticket,
}

impl DeleteTicket {
    pub fn comment(&self) -> CommentId {
        self.ticket.comment
    }
}

/// Client-side state of one content's comment thread
///
/// Every operation is split in two: `begin_*` applies the expected effect
/// right away and hands out a ticket, `complete_*` takes the ticket back
/// along with the store's answer. Neither step ever blocks, the caller
/// awaits the store in between.
#[derive(Clone, Debug)]
pub struct Reconciler {
    slug: ContentSlug,
    session: Option<Session>,
    limits: Limits,
    tree: CommentTree,

    votes: RequestSeq,

    /// Shared by edits and deletes
    content: RequestSeq,
}

impl Reconciler {
    pub fn new(slug: ContentSlug, session: Option<Session>, limits: Limits) -> Reconciler {
        Reconciler {
            slug,
            session,
            limits,
            tree: CommentTree::new(),
            votes: RequestSeq::new(),
            content: RequestSeq::new(),
        }
    }

    pub fn tree(&self) -> &CommentTree {
        &self.tree
    }

    pub fn slug(&self) -> &ContentSlug {
        &self.slug
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    /// Replaces the whole tree with a fresh listing from the store
    ///
    /// Comments still waiting for their insert answer stay in place, first
    /// among their siblings, as long as their parent is still listed.
    pub fn replace_all(&mut self, mut records: Vec<api::Comment>) {
        let in_flight = self
            .tree
            .walk()
            .filter(|c| c.provisional)
            .map(|c| (**c).clone())
            .collect::<Vec<_>>();
        let ids = in_flight.iter().map(|c| c.id).collect::<HashSet<_>>();
        strip_records(&mut records, &ids);

        let mut tree = CommentTree::from_records(records);
        for c in in_flight.into_iter().rev() {
            if !c.parent_id.map_or(true, |p| tree.contains(&p)) {
                tracing::debug!(comment = ?c.id, parent = ?c.parent_id, "parent of provisional comment is gone");
                continue;
            }
            let id = c.id;
            let c = Comment {
                replies: Vec::new(),
                reply_count: 0,
                ..c
            };
            if let Err(err) = tree.insert_head(c) {
                tracing::warn!(comment = ?id, %err, "failed keeping provisional comment");
            }
        }
        self.tree.restore(tree);
        tracing::debug!(
            slug = %self.slug,
            num_comments = self.tree.len(),
            "loaded comment thread"
        );
    }

    /// Merges the full reply list of `parent` fetched from the store
    pub fn load_replies(
        &mut self,
        parent: &CommentId,
        replies: Vec<api::Comment>,
    ) -> Result<(), Error> {
        self.tree.merge_replies(parent, replies)
    }

    fn signed_in(&self) -> Result<&Session, Error> {
        self.session.as_ref().ok_or(Error::NotSignedIn)
    }

    /// Returns comment `id` if the store already confirmed it
    fn confirmed(&self, id: &CommentId) -> Result<&Comment, Error> {
        let c = self.tree.get(id).ok_or(Error::NotFound(*id))?;
        if c.provisional {
            return Err(Error::ProvisionalComment(*id));
        }
        Ok(&**c)
    }

    pub fn begin_insert(
        &mut self,
        body: impl Into<String>,
        parent: Option<CommentId>,
    ) -> Result<InsertTicket, Error> {
        let session = self.signed_in()?.clone();
        let request = NewComment {
            slug: self.slug.clone(),
            body: body.into(),
            parent_id: parent,
        };
        request.validate(&self.limits)?;
        if let Some(p) = &parent {
            if self.confirmed(p)?.is_deleted {
                return Err(Error::AlreadyDeleted(*p));
            }
        }

        let snapshot = self.tree.clone();
        let c = Comment::provisional(&session, &request, Utc::now());
        let provisional = c.id;
        self.tree.insert_head(c)?;
        tracing::debug!(comment = ?provisional, ?parent, "optimistically inserted comment");
        Ok(InsertTicket {
            request,
            provisional,
            snapshot,
            version: self.tree.version(),
        })
    }

    /// On failure, the tree goes back to what it was before `begin_insert`
    /// if nothing else changed since, and otherwise loses only the
    /// provisional comment
    pub fn complete_insert(
        &mut self,
        t: InsertTicket,
        res: Result<api::Comment, Error>,
    ) -> Result<Completion, Error> {
        match res {
            Ok(c) => {
                if !self.tree.contains(&t.provisional) {
                    tracing::trace!(comment = ?t.provisional, "provisional comment left the tree before confirmation");
                    return Ok(Completion::Stale);
                }
                tracing::debug!(provisional = ?t.provisional, comment = ?c.id, "comment confirmed");
                self.tree.replace_provisional(&t.provisional, c)?;
                Ok(Completion::Applied)
            }
            Err(err) => {
                if self.tree.version() == t.version {
                    tracing::warn!(comment = ?t.provisional, %err, "comment submission failed, restoring snapshot");
                    self.tree.restore(t.snapshot);
                } else if self.tree.contains(&t.provisional) {
                    tracing::warn!(comment = ?t.provisional, %err, "comment submission failed, removing provisional comment");
                    self.tree.remove_subtree(&t.provisional)?;
                }
                Err(err)
            }
        }
    }

    pub fn begin_vote(
        &mut self,
        id: &CommentId,
        vote_type: VoteType,
    ) -> Result<VoteTicket, Error> {
        let user = self.signed_in()?.user_id();
        if self.confirmed(id)?.is_deleted {
            return Err(Error::AlreadyDeleted(*id));
        }
        self.tree
            .update(id, |c| Vote::toggle(&mut c.votes, user, vote_type))?;
        let ticket = self.votes.issue(*id);
        tracing::debug!(comment = ?id, ?vote_type, seq = ticket.seq, "optimistically voted");
        Ok(VoteTicket { ticket, vote_type })
    }

    /// Only the answer to the latest vote on a comment is applied; a failed
    /// latest vote is reported and the optimistic votes stay in place
    pub fn complete_vote(
        &mut self,
        t: VoteTicket,
        res: Result<Vec<Vote>, Error>,
    ) -> Result<Completion, Error> {
        let id = t.ticket.comment;
        if !self.votes.is_latest(&t.ticket) || !self.tree.contains(&id) {
            tracing::trace!(comment = ?id, seq = t.ticket.seq, "discarding stale vote answer");
            return Ok(Completion::Stale);
        }
        match res {
            Ok(votes) => {
                self.tree.set_votes(&id, votes)?;
                Ok(Completion::Applied)
            }
            Err(err) => {
                tracing::warn!(comment = ?id, %err, "vote failed");
                Err(err)
            }
        }
    }

    pub fn begin_edit(
        &mut self,
        id: &CommentId,
        body: impl Into<String>,
    ) -> Result<EditTicket, Error> {
        let user = self.signed_in()?.user_id();
        let body = body.into();
        api::validate_content(&body, &self.limits)?;
        let c = self.confirmed(id)?;
        if c.is_deleted {
            return Err(Error::AlreadyDeleted(*id));
        }
        if c.author.id != user {
            return Err(Error::PermissionDenied);
        }
        let ticket = self.content.issue(*id);
        tracing::debug!(comment = ?id, seq = ticket.seq, "submitting edit");
        Ok(EditTicket { ticket, body })
    }

    pub fn complete_edit(
        &mut self,
        t: EditTicket,
        res: Result<api::Comment, Error>,
    ) -> Result<Completion, Error> {
        let id = t.ticket.comment;
        if !self.content.is_latest(&t.ticket) || !self.tree.contains(&id) {
            tracing::trace!(comment = ?id, seq = t.ticket.seq, "discarding stale edit answer");
            return Ok(Completion::Stale);
        }
        match res {
            Ok(c) if c.id != id => Err(Error::Unknown(format!(
                "store answered the edit of {id} with comment {}",
                c.id
            ))),
            Ok(c) => {
                self.tree.splice(c)?;
                Ok(Completion::Applied)
            }
            Err(err) => {
                tracing::warn!(comment = ?id, %err, "edit failed");
                Err(err)
            }
        }
    }

    pub fn begin_delete(&mut self, id: &CommentId) -> Result<DeleteTicket, Error> {
        let allowed = {
            let session = self.signed_in()?;
            let c = self.confirmed(id)?;
            if c.is_deleted {
                return Err(Error::AlreadyDeleted(*id));
            }
            session.can_delete(&c.author.id)
        };
        if !allowed {
            return Err(Error::PermissionDenied);
        }
        let ticket = self.content.issue(*id);
        tracing::debug!(comment = ?id, seq = ticket.seq, "submitting deletion");
        Ok(DeleteTicket { ticket })
    }

    /// A hard removal is applied even if newer edits were issued since, as
    /// the comment no longer exists in the store
    pub fn complete_delete(
        &mut self,
        t: DeleteTicket,
        res: Result<DeleteOutcome, Error>,
    ) -> Result<Completion, Error> {
        let id = t.ticket.comment;
        if let Ok(outcome) = &res {
            if outcome.comment_id() != id {
                return Err(Error::Unknown(format!(
                    "store answered the deletion of {id} about comment {}",
                    outcome.comment_id()
                )));
            }
        }
        if !self.tree.contains(&id) {
            return Ok(Completion::Stale);
        }
        let latest = self.content.is_latest(&t.ticket);
        match res {
            Ok(DeleteOutcome::Removed(_)) => {
                tracing::debug!(comment = ?id, "comment removed");
                self.tree.remove_subtree(&id)?;
                self.content.forget(&id);
                self.votes.forget(&id);
                Ok(Completion::Applied)
            }
            Ok(DeleteOutcome::SoftDeleted(c)) if latest => {
                tracing::debug!(comment = ?id, num_replies = c.reply_count, "comment soft-deleted");
                self.tree.splice(c)?;
                Ok(Completion::Applied)
            }
            Err(err) if latest => {
                tracing::warn!(comment = ?id, %err, "deletion failed");
                Err(err)
            }
            _ => {
                tracing::trace!(comment = ?id, seq = t.ticket.seq, "discarding stale deletion answer");
                Ok(Completion::Stale)
            }
        }
    }

    pub fn check_moderator(&self) -> Result<(), Error> {
        match self.signed_in()?.is_moderator() {
            true => Ok(()),
            false => Err(Error::PermissionDenied),
        }
    }

    /// Mirrors a moderator deletion the store already performed
    pub fn apply_moderation(&mut self, id: &CommentId) -> Result<(), Error> {
        self.tree.update(id, |c| {
            c.is_deleted = true;
            c.body = String::from(MODERATED_PLACEHOLDER);
        })?;
        self.content.forget(id);
        Ok(())
    }
}

/// Drops the records with ids in `ids`, uncounting them from their parent,
/// and returns how many were dropped at this level
fn strip_records(records: &mut Vec<api::Comment>, ids: &HashSet<CommentId>) -> u64 {
    let before = records.len();
    records.retain(|r| !ids.contains(&r.id));
    for r in records.iter_mut() {
        let dropped = strip_records(&mut r.replies, ids);
        r.reply_count = r.reply_count.saturating_sub(dropped);
    }
    (before - records.len()) as u64
}
