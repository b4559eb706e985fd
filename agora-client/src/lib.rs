mod comment;
pub use comment::Comment;

mod reconciler;
pub use reconciler::{Completion, DeleteTicket, EditTicket, InsertTicket, Reconciler, VoteTicket};

mod section;
pub use section::CommentSection;

mod seq;
pub use seq::{RequestSeq, Ticket};

mod tree;
pub use tree::CommentTree;

mod fuzz;

#[cfg(test)]
mod testing;

pub mod api {
    pub use agora_api::*;
}
