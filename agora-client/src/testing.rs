use chrono::{TimeZone, Utc};

use crate::{
    api::{self, Author, CommentId, ContentSlug, Session, UserId, Uuid},
    CommentTree,
};

/// Stable id for a one-letter test comment
pub fn id(name: &str) -> CommentId {
    let n = name
        .bytes()
        .fold(1u128, |acc, b| acc.wrapping_mul(257).wrapping_add(b as u128));
    CommentId(Uuid::from_u128(n))
}

pub fn slug() -> ContentSlug {
    ContentSlug::new("zelda-review")
}

pub fn author(name: &str) -> Author {
    Author {
        id: UserId(Uuid::from_u128(name.len() as u128 + 0xa11ce)),
        name: name.to_string(),
        username: name.to_lowercase(),
        image: None,
    }
}

pub fn session() -> Session {
    Session::new(author("Reader"))
}

pub fn other_session() -> Session {
    Session::new(author("Another reader"))
}

/// Comment whose body is its name
pub fn record(name: &str, parent: Option<CommentId>, replies: Vec<api::Comment>) -> api::Comment {
    api::Comment {
        id: id(name),
        slug: slug(),
        parent_id: parent,
        author: author("Reader"),
        body: name.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        is_deleted: false,
        votes: Vec::new(),
        reply_count: replies.len() as u64,
        replies,
    }
}

/// `[A{[B{[C]}, D]}, E]`
pub fn sample_records() -> Vec<api::Comment> {
    let c = record("C", Some(id("B")), vec![]);
    let b = record("B", Some(id("A")), vec![c]);
    let d = record("D", Some(id("A")), vec![]);
    vec![
        record("A", None, vec![b, d]),
        record("E", None, vec![]),
    ]
}

pub fn sample_tree() -> CommentTree {
    CommentTree::from_records(sample_records())
}

/// Logs to stderr when `RUST_LOG` is set
pub fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}
