use std::{future::Future, sync::Arc};

use agora_client::{
    api::{
        Author, Comment, CommentId, CommentStore, ContentSlug, DeleteOutcome, Error, Limits,
        NewComment, Session, UserId, Uuid, Vote, VoteType,
    },
    CommentSection,
};
use agora_mock_server::{AuthToken, MockConfig, MockServer, MockStore};
use async_trait::async_trait;
use futures::channel::oneshot;

/// Logs to stderr when `RUST_LOG` is set
pub fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

pub fn run<F: Future>(f: F) -> F::Output {
    init_tracing();
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed initializing tokio runtime")
        .block_on(f)
}

pub fn slug() -> ContentSlug {
    ContentSlug::new("baldurs-gate-3-review")
}

/// Limits loose enough that tests never hit the rate limit by accident
pub fn relaxed_limits() -> Limits {
    let mut limits = Limits::default();
    limits.rate_limit.max_requests = 1000;
    limits
}

/// A mock server with signed-in users
pub struct Fixture {
    pub server: Arc<tokio::sync::Mutex<MockServer>>,
    limits: Limits,
    users: Vec<(Session, AuthToken)>,
}

impl Fixture {
    /// Creates one user per name, those listed in `moderators` with the admin role
    pub fn new(names: &[&str], moderators: &[usize], limits: Limits) -> Fixture {
        let authors = names
            .iter()
            .map(|n| Author {
                id: UserId(Uuid::new_v4()),
                name: n.to_string(),
                username: n.to_lowercase(),
                image: None,
            })
            .collect::<Vec<_>>();
        let mut server = MockServer::new(MockConfig {
            limits: limits.clone(),
            moderators: moderators.iter().map(|i| authors[*i].id).collect(),
        });
        let mut users = Vec::new();
        for a in authors {
            let id = a.id;
            server.admin_create_user(a).expect("creating user");
            let tok = server.auth(id).expect("authenticating user");
            let session = server.whoami(tok).expect("resolving session");
            users.push((session, tok));
        }
        Fixture {
            server: Arc::new(tokio::sync::Mutex::new(server)),
            limits,
            users,
        }
    }

    pub fn session(&self, user: usize) -> Session {
        self.users[user].0.clone()
    }

    pub fn store(&self, user: usize) -> MockStore {
        MockStore::new(self.server.clone(), Some(self.users[user].1))
    }

    pub fn section(&self, user: usize) -> CommentSection<MockStore> {
        let limits = self.limits();
        CommentSection::new(self.store(user), slug(), Some(self.session(user)), limits)
    }

    pub fn gated_section(&self, user: usize) -> CommentSection<GatedStore<MockStore>> {
        let limits = self.limits();
        CommentSection::new(
            GatedStore::new(self.store(user)),
            slug(),
            Some(self.session(user)),
            limits,
        )
    }

    pub fn anonymous_section(&self) -> CommentSection<MockStore> {
        let limits = self.limits();
        CommentSection::new(MockStore::anonymous(self.server.clone()), slug(), None, limits)
    }

    fn limits(&self) -> Limits {
        self.limits.clone()
    }
}

/// Store wrapper that holds back the answers to writes until released
///
/// Writes reach the inner store in the order they are issued; only their
/// answers are delayed, which is how a slow network reorders responses.
pub struct GatedStore<S> {
    inner: S,
    gates: parking_lot::Mutex<Vec<Option<oneshot::Sender<()>>>>,
}

impl<S: CommentStore> GatedStore<S> {
    pub fn new(inner: S) -> GatedStore<S> {
        GatedStore {
            inner,
            gates: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Number of writes that reached the inner store so far
    pub fn num_issued(&self) -> usize {
        self.gates.lock().len()
    }

    /// Delivers the answer to the `i`-th write
    pub fn release(&self, i: usize) {
        let gate = self.gates.lock()[i]
            .take()
            .unwrap_or_else(|| panic!("write {i} was already released"));
        let _ = gate.send(());
    }

    /// Resolves once `n` writes reached the inner store
    pub async fn wait_issued(&self, n: usize) {
        while self.num_issued() < n {
            tokio::task::yield_now().await;
        }
    }

    async fn gate<T>(&self, res: T) -> T {
        let (sender, receiver) = oneshot::channel();
        self.gates.lock().push(Some(sender));
        let _ = receiver.await;
        res
    }
}

#[async_trait]
impl<S: CommentStore> CommentStore for GatedStore<S> {
    async fn list_comments(&self, slug: &ContentSlug) -> Result<Vec<Comment>, Error> {
        self.inner.list_comments(slug).await
    }

    async fn get_replies(&self, parent: CommentId) -> Result<Vec<Comment>, Error> {
        self.inner.get_replies(parent).await
    }

    async fn post_comment(&self, c: NewComment) -> Result<Comment, Error> {
        let res = self.inner.post_comment(c).await;
        self.gate(res).await
    }

    async fn update_comment(&self, id: CommentId, body: String) -> Result<Comment, Error> {
        let res = self.inner.update_comment(id, body).await;
        self.gate(res).await
    }

    async fn delete_comment(&self, id: CommentId) -> Result<DeleteOutcome, Error> {
        let res = self.inner.delete_comment(id).await;
        self.gate(res).await
    }

    async fn vote(&self, id: CommentId, vote_type: VoteType) -> Result<Vec<Vote>, Error> {
        let res = self.inner.vote(id, vote_type).await;
        self.gate(res).await
    }

    async fn moderation_page(&self, offset: usize, limit: usize) -> Result<Vec<Comment>, Error> {
        self.inner.moderation_page(offset, limit).await
    }

    async fn moderator_delete(&self, id: CommentId) -> Result<(), Error> {
        let res = self.inner.moderator_delete(id).await;
        self.gate(res).await
    }
}
