#![cfg(test)]

use crate::{
    api::{self, CommentId, DeleteOutcome, Error, Limits, UserId, Uuid, Vote, VoteType},
    testing::*,
    *,
};

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    Insert {
        parent: Option<usize>,
        #[generator(bolero::generator::gen_with::<String>().len(0..20usize))]
        body: String,
        fail_now: bool,
    },
    Vote {
        target: usize,
        like: bool,
    },
    Edit {
        target: usize,
        #[generator(bolero::generator::gen_with::<String>().len(0..20usize))]
        body: String,
    },
    Delete {
        target: usize,
    },
    LoadReplies {
        target: usize,
        new_replies: u8,
    },
    Answer {
        pending: usize,
        success: bool,
    },
    Reload,
}

#[derive(Debug)]
enum Pending {
    Insert(InsertTicket),
    Vote(VoteTicket),
    Edit(EditTicket),
    Delete(DeleteTicket),
}

fn pick(r: &Reconciler, i: usize) -> Option<CommentId> {
    let ids = r.tree().walk().map(|c| c.id).collect::<Vec<_>>();
    match ids.is_empty() {
        true => None,
        false => Some(ids[i % ids.len()]),
    }
}

fn current_record(r: &Reconciler, id: &CommentId) -> Option<api::Comment> {
    r.tree().get(id).map(|c| c.to_record(Vec::new()))
}

/// What the store would list: the tree without its provisional comments
fn store_listing(r: &Reconciler) -> Vec<api::Comment> {
    fn export(r: &Reconciler, id: &CommentId) -> Option<api::Comment> {
        let c = r.tree().get(id)?;
        if c.provisional {
            return None;
        }
        let replies = c
            .replies
            .iter()
            .filter_map(|i| export(r, i))
            .collect::<Vec<_>>();
        let pending = (c.replies.len() - replies.len()) as u64;
        let mut res = c.to_record(replies);
        res.reply_count = res.reply_count.saturating_sub(pending);
        Some(res)
    }
    r.tree()
        .roots()
        .iter()
        .filter_map(|id| export(r, id))
        .collect()
}

fn failure() -> Error {
    Error::Unknown(String::from("injected failure"))
}

fn expect_answer(res: Result<Completion, Error>, success: bool) {
    match res {
        Ok(_) => (),
        Err(e) => {
            assert!(!success, "successful answer was reported as {e:?}");
            assert_eq!(e, failure());
        }
    }
}

/// Answers `p` the way a store holding the current tree would
fn answer(r: &mut Reconciler, p: Pending, success: bool) {
    match p {
        Pending::Insert(t) => {
            let res = match success {
                false => Err(failure()),
                true => {
                    let mut c = record("fuzz", t.request().parent_id, Vec::new());
                    c.id = CommentId::random();
                    c.body = t.request().body.clone();
                    Ok(c)
                }
            };
            expect_answer(r.complete_insert(t, res), success);
        }
        Pending::Vote(t) => {
            let res = match (success, r.tree().get(&t.comment())) {
                (true, Some(c)) => Ok(c.votes.clone()),
                _ => Err(failure()),
            };
            let success = res.is_ok();
            expect_answer(r.complete_vote(t, res), success);
        }
        Pending::Edit(t) => {
            let res = match (success, current_record(r, &t.comment())) {
                (true, Some(mut c)) => {
                    c.body = t.body().to_string();
                    Ok(c)
                }
                _ => Err(failure()),
            };
            let success = res.is_ok();
            expect_answer(r.complete_edit(t, res), success);
        }
        Pending::Delete(t) => {
            let res = match (success, current_record(r, &t.comment())) {
                (true, Some(c)) if c.reply_count == 0 => Ok(DeleteOutcome::Removed(c.id)),
                (true, Some(mut c)) => {
                    c.is_deleted = true;
                    c.body = String::from(api::DELETED_PLACEHOLDER);
                    Ok(DeleteOutcome::SoftDeleted(c))
                }
                _ => Err(failure()),
            };
            let success = res.is_ok();
            expect_answer(r.complete_delete(t, res), success);
        }
    }
}

#[test]
fn fuzz_reconciler_keeps_tree_consistent() {
    init_tracing();
    bolero::check!()
        .with_type::<Vec<FuzzOp>>()
        .cloned()
        .for_each(|ops| {
            let mut r = Reconciler::new(slug(), Some(session()), Limits::default());
            r.replace_all(sample_records());
            let mut pending = Vec::new();
            for op in ops {
                match op {
                    FuzzOp::Insert {
                        parent,
                        body,
                        fail_now,
                    } => {
                        let parent = parent.and_then(|p| pick(&r, p));
                        let before = r.tree().clone();
                        if let Ok(t) = r.begin_insert(body, parent) {
                            if fail_now {
                                assert_eq!(r.complete_insert(t, Err(failure())), Err(failure()));
                                assert_eq!(*r.tree(), before);
                            } else {
                                pending.push(Pending::Insert(t));
                            }
                        } else {
                            assert_eq!(*r.tree(), before);
                        }
                    }
                    FuzzOp::Vote { target, like } => {
                        let vote_type = match like {
                            true => VoteType::Like,
                            false => VoteType::Dislike,
                        };
                        if let Some(t) = pick(&r, target)
                            .and_then(|id| r.begin_vote(&id, vote_type).ok())
                        {
                            pending.push(Pending::Vote(t));
                        }
                    }
                    FuzzOp::Edit { target, body } => {
                        if let Some(t) = pick(&r, target).and_then(|id| r.begin_edit(&id, body).ok())
                        {
                            pending.push(Pending::Edit(t));
                        }
                    }
                    FuzzOp::Delete { target } => {
                        if let Some(t) = pick(&r, target).and_then(|id| r.begin_delete(&id).ok()) {
                            pending.push(Pending::Delete(t));
                        }
                    }
                    FuzzOp::LoadReplies {
                        target,
                        new_replies,
                    } => {
                        let Some(parent) = pick(&r, target) else { continue };
                        if r.tree().get(&parent).map_or(true, |c| c.provisional) {
                            continue;
                        }
                        let mut replies = r
                            .tree()
                            .replies(&parent)
                            .iter()
                            .filter_map(|id| current_record(&r, id))
                            .filter(|c| !r.tree().get(&c.id).map_or(true, |c| c.provisional))
                            .collect::<Vec<_>>();
                        for _ in 0..new_replies % 4 {
                            let mut c = record("loaded", Some(parent), Vec::new());
                            c.id = CommentId::random();
                            replies.push(c);
                        }
                        r.load_replies(&parent, replies).expect("loading replies");
                    }
                    FuzzOp::Answer {
                        pending: i,
                        success,
                    } => {
                        if !pending.is_empty() {
                            let p = pending.swap_remove(i % pending.len());
                            answer(&mut r, p, success);
                        }
                    }
                    FuzzOp::Reload => {
                        let provisional = r
                            .tree()
                            .walk()
                            .filter(|c| c.provisional)
                            .map(|c| c.id)
                            .collect::<Vec<_>>();
                        let records = store_listing(&r);
                        r.replace_all(records);
                        for id in provisional {
                            if let Some(c) = r.tree().get(&id) {
                                assert!(c.provisional, "reload kept {id} provisional");
                            }
                        }
                    }
                }
                r.tree()
                    .check_consistency()
                    .expect("tree stays consistent");
            }
            for p in pending {
                answer(&mut r, p, true);
            }
            r.tree()
                .check_consistency()
                .expect("tree stays consistent");
            assert!(
                r.tree().walk().all(|c| !c.provisional),
                "all inserts were answered"
            );
        })
}

#[test]
fn fuzz_latest_vote_wins() {
    init_tracing();
    bolero::check!()
        .with_type::<(Vec<bool>, Vec<usize>)>()
        .cloned()
        .for_each(|(likes, swaps)| {
            if likes.is_empty() {
                return;
            }
            let mut r = Reconciler::new(slug(), Some(session()), Limits::default());
            r.replace_all(sample_records());
            let target = id("D");

            let mut tickets = likes
                .iter()
                .enumerate()
                .map(|(i, like)| {
                    let vote_type = match like {
                        true => VoteType::Like,
                        false => VoteType::Dislike,
                    };
                    let t = r.begin_vote(&target, vote_type).expect("voting");
                    let answer = vec![Vote {
                        user_id: UserId(Uuid::from_u128(i as u128)),
                        vote_type,
                    }];
                    (t, answer)
                })
                .collect::<Vec<_>>();
            let expected = tickets[tickets.len() - 1].1.clone();

            for (i, s) in swaps.into_iter().enumerate() {
                let len = tickets.len();
                tickets.swap(i % len, s % len);
            }
            let mut applied = 0;
            for (t, answer) in tickets {
                if r.complete_vote(t, Ok(answer)) == Ok(Completion::Applied) {
                    applied += 1;
                }
            }
            assert_eq!(applied, 1);
            assert_eq!(r.tree().get(&target).expect("D is loaded").votes, expected);
        })
}
