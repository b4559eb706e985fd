use std::collections::{btree_map, BTreeMap, HashSet, VecDeque};

use anyhow::Context;

use agora_api::{
    self as api, Author, CommentId, ContentSlug, DeleteOutcome, Error, Limits, NewComment, Role,
    Session, Time, UserId, Uuid, Vote, VoteType, DELETED_PLACEHOLDER, MODERATED_PLACEHOLDER,
};

mod seed;
pub use seed::Seed;

mod store;
pub use store::MockStore;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AuthToken(pub Uuid);

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct MockConfig {
    pub limits: Limits,

    /// Users who get the admin role on creation
    pub moderators: Vec<UserId>,
}

/// In-memory comment store
pub struct MockServer {
    config: MockConfig,
    users: BTreeMap<UserId, DbUser>,
    comments: BTreeMap<CommentId, DbComment>,

    /// Insertion counter, orders comments created at the same time
    next_seq: u64,

    clock_offset: chrono::Duration,
    failures: VecDeque<Error>,
}

#[derive(Debug)]
struct DbUser {
    author: Author,
    roles: Vec<Role>,
    sessions: HashSet<AuthToken>,
    posts: Option<RateWindow>,
}

#[derive(Clone, Copy, Debug)]
struct RateWindow {
    count: u32,
    expires_at: Time,
}

#[derive(Clone, Debug)]
struct DbComment {
    id: CommentId,
    seq: u64,
    slug: ContentSlug,
    parent_id: Option<CommentId>,
    author: UserId,
    body: String,
    created_at: Time,
    is_deleted: bool,
    votes: Vec<Vote>,
}

impl DbComment {
    fn order_key(&self) -> (Time, u64) {
        (self.created_at, self.seq)
    }
}

impl MockServer {
    pub fn new(config: MockConfig) -> MockServer {
        MockServer {
            config,
            users: BTreeMap::new(),
            comments: BTreeMap::new(),
            next_seq: 0,
            clock_offset: chrono::Duration::zero(),
            failures: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn now(&self) -> Time {
        chrono::Utc::now() + self.clock_offset
    }

    /// Moves the server's clock forward, for rate-limit windows
    pub fn advance_time(&mut self, by: chrono::Duration) {
        self.clock_offset = self.clock_offset + by;
    }

    /// Makes the next store call fail with `err`, before it has any effect
    pub fn fail_next(&mut self, err: Error) {
        self.failures.push_back(err);
    }

    fn injected_failure(&mut self) -> Result<(), Error> {
        match self.failures.pop_front() {
            None => Ok(()),
            Some(err) => {
                tracing::debug!(%err, "injecting failure");
                Err(err)
            }
        }
    }

    /// Return the current number of users
    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    /// Return the current number of comments, deleted ones included
    pub fn test_num_comments(&self) -> usize {
        self.comments.len()
    }

    pub fn admin_create_user(&mut self, author: Author) -> Result<(), Error> {
        api::validate_string(&author.name)?;
        api::validate_string(&author.username)?;

        if self.users.values().any(|u| u.author.username == author.username) {
            return Err(Error::Unknown(format!(
                "username {:?} is already used",
                author.username
            )));
        }

        match self.users.entry(author.id) {
            btree_map::Entry::Occupied(_) => Err(Error::Unknown(format!(
                "user id {:?} is already used",
                author.id
            ))),
            btree_map::Entry::Vacant(entry) => {
                let mut roles = vec![Role::Member];
                if self.config.moderators.contains(&author.id) {
                    roles.push(Role::Admin);
                }
                entry.insert(DbUser {
                    author,
                    roles,
                    sessions: HashSet::new(),
                    posts: None,
                });
                Ok(())
            }
        }
    }

    pub fn auth(&mut self, user: UserId) -> Result<AuthToken, Error> {
        let u = self.users.get_mut(&user).ok_or(Error::PermissionDenied)?;
        let tok = AuthToken(Uuid::new_v4());
        u.sessions.insert(tok);
        Ok(tok)
    }

    fn resolve(&self, tok: AuthToken) -> Result<&DbUser, Error> {
        self.users
            .values()
            .find(|u| u.sessions.contains(&tok))
            .ok_or(Error::NotSignedIn)
    }

    fn resolve_mut(&mut self, tok: AuthToken) -> Result<&mut DbUser, Error> {
        self.users
            .values_mut()
            .find(|u| u.sessions.contains(&tok))
            .ok_or(Error::NotSignedIn)
    }

    pub fn unauth(&mut self, tok: AuthToken) -> Result<(), Error> {
        let u = self.resolve_mut(tok)?;
        u.sessions.remove(&tok);
        Ok(())
    }

    pub fn whoami(&self, tok: AuthToken) -> Result<Session, Error> {
        let u = self.resolve(tok)?;
        Ok(Session {
            user: u.author.clone(),
            roles: u.roles.clone(),
        })
    }

    fn author_of(&self, user: &UserId) -> Author {
        match self.users.get(user) {
            Some(u) => u.author.clone(),
            None => Author {
                id: *user,
                name: String::from("[deleted user]"),
                username: String::new(),
                image: None,
            },
        }
    }

    fn children(&self, parent: &CommentId) -> Vec<&DbComment> {
        let mut res = self
            .comments
            .values()
            .filter(|c| c.parent_id == Some(*parent))
            .collect::<Vec<_>>();
        res.sort_by_key(|c| c.order_key());
        res
    }

    fn record(&self, c: &DbComment, preview: usize) -> api::Comment {
        let children = self.children(&c.id);
        api::Comment {
            id: c.id,
            slug: c.slug.clone(),
            parent_id: c.parent_id,
            author: self.author_of(&c.author),
            body: c.body.clone(),
            created_at: c.created_at,
            is_deleted: c.is_deleted,
            votes: c.votes.clone(),
            reply_count: children.len() as u64,
            replies: children
                .into_iter()
                .take(preview)
                .map(|r| self.record(r, 0))
                .collect(),
        }
    }

    fn comment(&self, id: &CommentId) -> Result<&DbComment, Error> {
        self.comments.get(id).ok_or(Error::NotFound(*id))
    }

    fn comment_mut(&mut self, id: &CommentId) -> Result<&mut DbComment, Error> {
        self.comments.get_mut(id).ok_or(Error::NotFound(*id))
    }

    pub fn list_comments(&mut self, slug: &ContentSlug) -> Result<Vec<api::Comment>, Error> {
        self.injected_failure()?;
        let mut top = self
            .comments
            .values()
            .filter(|c| c.parent_id.is_none() && c.slug == *slug)
            .collect::<Vec<_>>();
        top.sort_by_key(|c| std::cmp::Reverse(c.order_key()));
        Ok(top
            .into_iter()
            .map(|c| self.record(c, self.config.limits.reply_preview))
            .collect())
    }

    pub fn get_replies(&mut self, parent: CommentId) -> Result<Vec<api::Comment>, Error> {
        self.injected_failure()?;
        self.comment(&parent)?;
        Ok(self
            .children(&parent)
            .into_iter()
            .map(|c| self.record(c, 0))
            .collect())
    }

    pub fn post_comment(&mut self, tok: AuthToken, c: NewComment) -> Result<api::Comment, Error> {
        self.injected_failure()?;
        c.validate(&self.config.limits)?;
        if let Some(p) = &c.parent_id {
            let parent = self.comment(p)?;
            if parent.is_deleted {
                return Err(Error::AlreadyDeleted(*p));
            }
            if parent.slug != c.slug {
                return Err(Error::Unknown(format!(
                    "comment {p} belongs to {}, not {}",
                    parent.slug, c.slug
                )));
            }
        }

        let now = self.now();
        let limit = self.config.limits.rate_limit;
        let u = self.resolve_mut(tok)?;
        match &mut u.posts {
            Some(w) if now <= w.expires_at => {
                if w.count >= limit.max_requests {
                    tracing::debug!(user = ?u.author.id, "rate limited");
                    return Err(Error::RateLimited);
                }
                w.count += 1;
            }
            posts => {
                *posts = Some(RateWindow {
                    count: 1,
                    expires_at: now + chrono::Duration::seconds(limit.window_secs),
                })
            }
        }
        let author = u.author.id;

        let id = CommentId::random();
        self.next_seq += 1;
        let db = DbComment {
            id,
            seq: self.next_seq,
            slug: c.slug,
            parent_id: c.parent_id,
            author,
            body: c.body,
            created_at: now,
            is_deleted: false,
            votes: Vec::new(),
        };
        let res = self.record(&db, 0);
        self.comments.insert(id, db);
        tracing::debug!(comment = ?id, parent = ?res.parent_id, "comment posted");
        Ok(res)
    }

    pub fn update_comment(
        &mut self,
        tok: AuthToken,
        id: CommentId,
        body: String,
    ) -> Result<api::Comment, Error> {
        self.injected_failure()?;
        api::validate_content(&body, &self.config.limits)?;
        let user = self.resolve(tok)?.author.id;
        let c = self.comment_mut(&id)?;
        if c.author != user {
            return Err(Error::PermissionDenied);
        }
        if c.is_deleted {
            return Err(Error::AlreadyDeleted(id));
        }
        c.body = body;
        let c = self.comment(&id)?;
        Ok(self.record(c, 0))
    }

    pub fn delete_comment(
        &mut self,
        tok: AuthToken,
        id: CommentId,
    ) -> Result<DeleteOutcome, Error> {
        self.injected_failure()?;
        let u = self.resolve(tok)?;
        let session = Session {
            user: u.author.clone(),
            roles: u.roles.clone(),
        };
        let c = self.comment(&id)?;
        if !session.can_delete(&c.author) {
            return Err(Error::PermissionDenied);
        }
        if c.is_deleted {
            return Err(Error::AlreadyDeleted(id));
        }
        if self.children(&id).is_empty() {
            self.comments.remove(&id);
            tracing::debug!(comment = ?id, "comment removed");
            return Ok(DeleteOutcome::Removed(id));
        }
        let c = self.comment_mut(&id)?;
        c.is_deleted = true;
        c.body = String::from(DELETED_PLACEHOLDER);
        tracing::debug!(comment = ?id, "comment soft-deleted");
        let c = self.comment(&id)?;
        Ok(DeleteOutcome::SoftDeleted(self.record(c, 0)))
    }

    pub fn vote(
        &mut self,
        tok: AuthToken,
        id: CommentId,
        vote_type: VoteType,
    ) -> Result<Vec<Vote>, Error> {
        self.injected_failure()?;
        let user = self.resolve(tok)?.author.id;
        let c = self.comment_mut(&id)?;
        if c.is_deleted {
            return Err(Error::AlreadyDeleted(id));
        }
        Vote::toggle(&mut c.votes, user, vote_type);
        Ok(c.votes.clone())
    }

    fn check_moderator(&self, tok: AuthToken) -> Result<(), Error> {
        let u = self.resolve(tok)?;
        match u.roles.iter().any(|r| matches!(r, Role::Admin | Role::Director)) {
            true => Ok(()),
            false => Err(Error::PermissionDenied),
        }
    }

    pub fn moderation_page(
        &mut self,
        tok: AuthToken,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<api::Comment>, Error> {
        self.injected_failure()?;
        self.check_moderator(tok)?;
        let mut all = self.comments.values().collect::<Vec<_>>();
        all.sort_by_key(|c| std::cmp::Reverse(c.order_key()));
        Ok(all
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|c| self.record(c, 0))
            .collect())
    }

    pub fn moderator_delete(&mut self, tok: AuthToken, id: CommentId) -> Result<(), Error> {
        self.injected_failure()?;
        self.check_moderator(tok)?;
        let c = self.comment_mut(&id)?;
        c.is_deleted = true;
        c.body = String::from(MODERATED_PLACEHOLDER);
        tracing::debug!(comment = ?id, "comment removed by moderation");
        Ok(())
    }

    /// Adds the users and comments of `seed`, keeping its ids and dates
    ///
    /// Replies may be nested or listed flat, but must be dated after their
    /// parent.
    pub fn load_seed(&mut self, seed: Seed) -> anyhow::Result<()> {
        for u in seed.users {
            let name = u.username.clone();
            self.admin_create_user(u)
                .with_context(|| format!("creating seed user {name:?}"))?;
        }
        let mut comments = Vec::new();
        let mut stack = seed.comments;
        while let Some(mut c) = stack.pop() {
            stack.extend(std::mem::take(&mut c.replies));
            comments.push(c);
        }
        comments.sort_by_key(|c| c.created_at);
        for c in comments {
            anyhow::ensure!(
                self.users.contains_key(&c.author.id),
                "seed comment {} has unknown author {:?}",
                c.id,
                c.author.id
            );
            if let Some(p) = &c.parent_id {
                anyhow::ensure!(
                    self.comments.contains_key(p),
                    "seed comment {} answers unknown or later comment {p}",
                    c.id
                );
            }
            self.next_seq += 1;
            let db = DbComment {
                id: c.id,
                seq: self.next_seq,
                slug: c.slug,
                parent_id: c.parent_id,
                author: c.author.id,
                body: c.body,
                created_at: c.created_at,
                is_deleted: c.is_deleted,
                votes: c.votes,
            };
            anyhow::ensure!(
                self.comments.insert(c.id, db).is_none(),
                "seed comment {} is listed twice",
                c.id
            );
        }
        tracing::info!(
            num_users = self.users.len(),
            num_comments = self.comments.len(),
            "loaded seed"
        );
        Ok(())
    }
}
