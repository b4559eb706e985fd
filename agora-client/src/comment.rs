use crate::api::{
    self, Author, CommentId, ContentSlug, NewComment, Session, Tally, Time, UserId, Vote, VoteType,
};

/// A comment as held in the client-side tree
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub slug: ContentSlug,
    pub parent_id: Option<CommentId>,
    pub author: Author,
    pub body: String,
    pub created_at: Time,
    pub is_deleted: bool,
    pub votes: Vec<Vote>,

    /// Number of replies the store knows of, at least `replies.len()`
    pub reply_count: u64,

    /// Loaded replies, in display order
    pub replies: Vec<CommentId>,

    /// Synthesized locally and not confirmed by the store yet
    pub provisional: bool,
}

impl Comment {
    /// Splits a store record into the node and its reply previews
    pub(crate) fn from_record(mut c: api::Comment) -> (Comment, Vec<api::Comment>) {
        let previews = std::mem::take(&mut c.replies);
        let node = Comment {
            replies: previews.iter().map(|r| r.id).collect(),
            reply_count: c.reply_count.max(previews.len() as u64),
            id: c.id,
            slug: c.slug,
            parent_id: c.parent_id,
            author: c.author,
            body: c.body,
            created_at: c.created_at,
            is_deleted: c.is_deleted,
            votes: c.votes,
            provisional: false,
        };
        (node, previews)
    }

    pub(crate) fn provisional(session: &Session, new: &NewComment, now: Time) -> Comment {
        Comment {
            id: CommentId::random(),
            slug: new.slug.clone(),
            parent_id: new.parent_id,
            author: session.user.clone(),
            body: new.body.clone(),
            created_at: now,
            is_deleted: false,
            votes: Vec::new(),
            reply_count: 0,
            replies: Vec::new(),
            provisional: true,
        }
    }

    /// Overwrites this node's content with `c`'s, keeping its place in the
    /// tree and its loaded replies
    pub(crate) fn splice(&mut self, c: api::Comment) {
        debug_assert_eq!(self.id, c.id, "splicing a record over another comment");
        self.slug = c.slug;
        self.author = c.author;
        self.body = c.body;
        self.created_at = c.created_at;
        self.is_deleted = c.is_deleted;
        self.votes = c.votes;
        self.reply_count = c.reply_count.max(self.replies.len() as u64);
        self.provisional = false;
    }

    pub(crate) fn to_record(&self, replies: Vec<api::Comment>) -> api::Comment {
        api::Comment {
            id: self.id,
            slug: self.slug.clone(),
            parent_id: self.parent_id,
            author: self.author.clone(),
            body: self.body.clone(),
            created_at: self.created_at,
            is_deleted: self.is_deleted,
            votes: self.votes.clone(),
            reply_count: self.reply_count,
            replies,
        }
    }

    pub fn tally(&self) -> Tally {
        Tally::of(&self.votes)
    }

    pub fn vote_of(&self, user: &UserId) -> Option<VoteType> {
        Vote::of_user(&self.votes, user)
    }

    /// Whether there are replies in the store that are not loaded yet
    pub fn has_unloaded_replies(&self) -> bool {
        self.reply_count > self.replies.len() as u64
    }
}
