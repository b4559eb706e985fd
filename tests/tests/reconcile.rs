use agora_client::{
    api::{
        CommentId, CommentStore, Error, Limits, NewComment, Tally, Vote, VoteType,
        DELETED_PLACEHOLDER, MODERATED_PLACEHOLDER,
    },
    Completion,
};
use tests::{relaxed_limits, run, slug, Fixture};

fn ids(records: &[agora_client::api::Comment]) -> Vec<CommentId> {
    records.iter().map(|c| c.id).collect()
}

#[test]
fn posts_match_a_fresh_load() {
    run(async {
        let f = Fixture::new(&["Alice", "Bob"], &[], relaxed_limits());
        let alice = f.section(0);
        alice.load().await.expect("loading");
        for i in 0..3 {
            assert_eq!(
                alice.post(format!("comment {i}")).await,
                Ok(Completion::Applied)
            );
        }
        let first = alice.tree().roots()[2];
        assert_eq!(
            alice.reply(first, "answering myself").await,
            Ok(Completion::Applied)
        );

        let bob = f.section(1);
        bob.load().await.expect("loading");
        assert_eq!(bob.tree().roots(), alice.tree().roots());
        assert_eq!(bob.tree().replies(&first), alice.tree().replies(&first));
        assert_eq!(bob.tree().get(&first).unwrap().reply_count, 1);
        alice.tree().check_consistency().expect("tree is consistent");
    })
}

#[test]
fn rejected_post_leaves_no_trace() {
    run(async {
        let f = Fixture::new(&["Alice"], &[], Limits::default());
        let alice = f.section(0);
        alice.load().await.expect("loading");
        for i in 0..3 {
            alice.post(format!("hot take {i}")).await.expect("posting");
        }
        let before = alice.tree();
        assert_eq!(alice.post("one more").await, Err(Error::RateLimited));
        assert_eq!(alice.tree(), before);

        f.server
            .lock()
            .await
            .fail_next(Error::Unknown(String::from("connection reset")));
        let parent = before.roots()[0];
        assert_eq!(
            alice.reply(parent, "still there?").await,
            Err(Error::Unknown(String::from("connection reset")))
        );
        assert_eq!(alice.tree(), before);
        assert_eq!(f.server.lock().await.test_num_comments(), 3);
    })
}

#[test]
fn invalid_input_never_reaches_the_store() {
    run(async {
        let f = Fixture::new(&["Alice"], &[], relaxed_limits());
        let alice = f.section(0);
        alice.load().await.expect("loading");
        assert_eq!(alice.post("   ").await, Err(Error::EmptyContent));
        assert_eq!(
            alice.post("x".repeat(2001)).await,
            Err(Error::ContentTooLong {
                len: 2001,
                max: 2000
            })
        );
        assert!(alice.tree().is_empty());
        assert_eq!(f.server.lock().await.test_num_comments(), 0);

        let anonymous = f.anonymous_section();
        anonymous.load().await.expect("loading anonymously");
        assert_eq!(anonymous.post("hello").await, Err(Error::NotSignedIn));

        alice.with_reconciler(|r| r.set_session(None));
        assert_eq!(alice.post("signed out").await, Err(Error::NotSignedIn));
        assert_eq!(f.server.lock().await.test_num_comments(), 0);
    })
}

#[test]
fn out_of_order_votes_settle_on_the_latest() {
    run(async {
        let f = Fixture::new(&["Alice", "Bob"], &[], relaxed_limits());
        let alice = f.section(0);
        alice.post("vote on me").await.expect("posting");
        let target = alice.tree().roots()[0];

        let bob = f.gated_section(1);
        bob.load().await.expect("loading");
        let store = bob.store();
        let (like, dislike, ()) = futures::join!(
            bob.vote(target, VoteType::Like),
            bob.vote(target, VoteType::Dislike),
            async {
                store.wait_issued(2).await;
                store.release(1);
                tokio::task::yield_now().await;
                store.release(0);
            },
        );
        assert_eq!(dislike, Ok(Completion::Applied));
        assert_eq!(like, Ok(Completion::Stale));

        let bob_id = f.session(1).user_id();
        let shown = bob.tree().get(&target).unwrap().votes.clone();
        assert_eq!(Vote::of_user(&shown, &bob_id), Some(VoteType::Dislike));
        assert_eq!(
            bob.tree().get(&target).unwrap().tally(),
            Tally {
                likes: 0,
                dislikes: 1
            }
        );

        alice.load().await.expect("reloading");
        assert_eq!(alice.tree().get(&target).unwrap().votes, shown);
    })
}

#[test]
fn double_toggle_is_a_no_op() {
    run(async {
        let f = Fixture::new(&["Alice"], &[], relaxed_limits());
        let alice = f.section(0);
        alice.post("meh").await.expect("posting");
        let target = alice.tree().roots()[0];
        alice.vote(target, VoteType::Like).await.expect("liking");
        alice.vote(target, VoteType::Like).await.expect("unliking");
        assert!(alice.tree().get(&target).unwrap().votes.is_empty());
        assert_eq!(
            f.store(0).list_comments(&slug()).await.map(|l| l[0].votes.len()),
            Ok(0)
        );
    })
}

#[test]
fn failed_insert_keeps_concurrent_insert() {
    run(async {
        let f = Fixture::new(&["Alice"], &[], relaxed_limits());
        let alice = f.gated_section(0);
        alice.load().await.expect("loading");
        f.server
            .lock()
            .await
            .fail_next(Error::Unknown(String::from("timeout")));

        let store = alice.store();
        let (first, second, ()) = futures::join!(
            alice.post("first"),
            alice.post("second"),
            async {
                store.wait_issued(2).await;
                store.release(0);
                tokio::task::yield_now().await;
                let roots = alice.tree().roots().to_vec();
                assert_eq!(roots.len(), 1, "only the second comment is left");
                assert!(alice.tree().get(&roots[0]).unwrap().provisional);
                store.release(1);
            },
        );
        assert_eq!(first, Err(Error::Unknown(String::from("timeout"))));
        assert_eq!(second, Ok(Completion::Applied));

        let tree = alice.tree();
        assert_eq!(tree.len(), 1);
        let c = tree.get(&tree.roots()[0]).unwrap();
        assert_eq!(c.body, "second");
        assert!(!c.provisional);
    })
}

#[test]
fn delete_is_hard_or_soft() {
    run(async {
        let f = Fixture::new(&["Alice", "Bob"], &[], relaxed_limits());
        let alice = f.section(0);
        alice.post("A").await.expect("posting A");
        let a = alice.tree().roots()[0];
        let bob = f.section(1);
        bob.load().await.expect("loading");
        bob.reply(a, "B").await.expect("replying B");
        let b = bob.tree().replies(&a)[0];

        assert_eq!(bob.delete(a).await, Err(Error::PermissionDenied));

        alice.load().await.expect("reloading");
        assert_eq!(alice.delete(a).await, Ok(Completion::Applied));
        let records = alice.tree().to_records();
        assert_eq!(ids(&records), vec![a]);
        assert!(records[0].is_deleted);
        assert_eq!(records[0].body, DELETED_PLACEHOLDER);
        assert_eq!(ids(&records[0].replies), vec![b]);

        assert_eq!(bob.delete(b).await, Ok(Completion::Applied));
        assert!(bob.tree().replies(&a).is_empty());
        assert_eq!(bob.tree().get(&a).unwrap().reply_count, 0);
    })
}

#[test]
fn edits_reach_other_readers() {
    run(async {
        let f = Fixture::new(&["Alice", "Bob"], &[], relaxed_limits());
        let alice = f.section(0);
        alice.post("tpyo").await.expect("posting");
        let c = alice.tree().roots()[0];
        let bob = f.section(1);
        bob.load().await.expect("loading");
        assert_eq!(bob.edit(c, "vandalized").await, Err(Error::PermissionDenied));

        assert_eq!(alice.edit(c, "typo").await, Ok(Completion::Applied));
        bob.load().await.expect("reloading");
        assert_eq!(bob.tree().get(&c).unwrap().body, "typo");
    })
}

#[test]
fn replies_beyond_the_preview_load_on_demand() {
    run(async {
        let f = Fixture::new(&["Alice"], &[], relaxed_limits());
        let alice = f.store(0);
        let top = alice
            .post_comment(NewComment::top_level(slug(), "top"))
            .await
            .expect("posting");
        let mut replies = Vec::new();
        for i in 0..4 {
            f.server
                .lock()
                .await
                .advance_time(chrono::Duration::seconds(1));
            let r = alice
                .post_comment(NewComment::reply(slug(), top.id, format!("reply {i}")))
                .await
                .expect("replying");
            replies.push(r.id);
        }

        let reader = f.anonymous_section();
        reader.load().await.expect("loading");
        let node = reader.tree().get(&top.id).cloned().unwrap();
        assert_eq!(node.reply_count, 4);
        assert_eq!(node.replies, replies[..2]);
        assert!(node.has_unloaded_replies());

        reader.load_replies(top.id).await.expect("loading replies");
        assert_eq!(reader.tree().replies(&top.id), &replies[..]);
        assert!(!reader.tree().get(&top.id).unwrap().has_unloaded_replies());
    })
}

#[test]
fn moderators_remove_comments() {
    run(async {
        let f = Fixture::new(&["Alice", "Mod"], &[1], relaxed_limits());
        let alice = f.section(0);
        alice.post("spam spam spam").await.expect("posting");
        let c = alice.tree().roots()[0];

        assert_eq!(alice.moderator_delete(c).await, Err(Error::PermissionDenied));
        let moderator = f.section(1);
        moderator.load().await.expect("loading");
        let page = moderator.moderation_page(0, 50).await.expect("listing");
        assert_eq!(ids(&page), vec![c]);
        moderator.moderator_delete(c).await.expect("moderating");
        assert_eq!(
            moderator.tree().get(&c).unwrap().body,
            MODERATED_PLACEHOLDER
        );

        alice.load().await.expect("reloading");
        let shown = alice.tree().get(&c).cloned().unwrap();
        assert!(shown.is_deleted);
        assert_eq!(shown.body, MODERATED_PLACEHOLDER);
        assert_eq!(alice.edit(c, "unspam").await, Err(Error::AlreadyDeleted(c)));
    })
}
