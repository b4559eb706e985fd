use std::collections::HashMap;

use crate::api::CommentId;

/// Identifies one request issued for a comment
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ticket {
    pub comment: CommentId,
    pub seq: u64,
}

/// Per-comment "latest request wins" guard
///
/// Sequence numbers are drawn from a single increasing counter, so a ticket
/// is never reissued even after `forget`.
#[derive(Clone, Debug, Default)]
pub struct RequestSeq {
    next: u64,
    latest: HashMap<CommentId, u64>,
}

impl RequestSeq {
    pub fn new() -> RequestSeq {
        RequestSeq::default()
    }

    pub fn issue(&mut self, comment: CommentId) -> Ticket {
        self.next += 1;
        self.latest.insert(comment, self.next);
        Ticket {
            comment,
            seq: self.next,
        }
    }

    pub fn is_latest(&self, t: &Ticket) -> bool {
        self.latest.get(&t.comment) == Some(&t.seq)
    }

    /// Makes all outstanding tickets for `comment` stale
    pub fn forget(&mut self, comment: &CommentId) {
        self.latest.remove(comment);
    }
}
