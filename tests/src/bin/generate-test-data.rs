use std::path::PathBuf;

use agora_client::api::{
    validate_content, Author, Comment, CommentId, ContentSlug, Limits, UserId, Uuid, Vote,
    VoteType, DELETED_PLACEHOLDER,
};
use agora_mock_server::Seed;
use anyhow::Context;
use chrono::{Duration, TimeZone, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

const COMMENT_WORD_COUNT: usize = 25;

/// Generate a JSON seed for the mock comment server
#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(long, default_value = "5")]
    users: usize,

    /// Content pages to spread the comments over
    #[structopt(long, default_value = "3")]
    slugs: usize,

    #[structopt(long, default_value = "200")]
    comments: usize,

    /// Chance that a comment answers an earlier one
    #[structopt(long, default_value = "0.6")]
    reply_ratio: f64,

    /// Seed for the random generator, for reproducible data
    #[structopt(long)]
    seed: Option<u64>,

    /// Write there instead of stdout
    #[structopt(short, long)]
    output: Option<PathBuf>,
}

fn gen_id(rng: &mut StdRng) -> Uuid {
    Uuid::from_u128(rng.gen())
}

fn gen_users(rng: &mut StdRng, n: usize) -> Vec<Author> {
    (0..n)
        .map(|i| {
            let name = lipsum::lipsum_words_from_seed(2, rng.gen());
            Author {
                id: UserId(gen_id(rng)),
                username: format!("user{i}"),
                image: None,
                name,
            }
        })
        .collect()
}

fn gen_votes(rng: &mut StdRng, users: &[Author]) -> Vec<Vote> {
    let mut votes = Vec::new();
    for u in users {
        match rng.gen_range(0..4) {
            0 => votes.push(Vote {
                user_id: u.id,
                vote_type: VoteType::Like,
            }),
            1 => votes.push(Vote {
                user_id: u.id,
                vote_type: VoteType::Dislike,
            }),
            _ => (),
        }
    }
    votes
}

fn gen_comments(
    rng: &mut StdRng,
    opt: &Opt,
    limits: &Limits,
    users: &[Author],
) -> anyhow::Result<Vec<Comment>> {
    let slugs = (0..opt.slugs)
        .map(|i| ContentSlug::new(format!("review-{i}")))
        .collect::<Vec<_>>();
    let mut date = Utc
        .with_ymd_and_hms(2024, 1, 1, 8, 0, 0)
        .single()
        .context("building start date")?;
    let mut comments: Vec<Comment> = Vec::with_capacity(opt.comments);
    for _ in 0..opt.comments {
        date = date + Duration::minutes(rng.gen_range(1..180));
        let parent = match !comments.is_empty() && rng.gen_bool(opt.reply_ratio) {
            true => Some(rng.gen_range(0..comments.len())),
            false => None,
        };
        let slug = match parent {
            Some(p) => comments[p].slug.clone(),
            None => slugs.choose(rng).context("no slug to comment on")?.clone(),
        };
        let author = users.choose(rng).context("no user to comment as")?.clone();
        let body = lipsum::lipsum_words_from_seed(
            rng.gen_range(1..COMMENT_WORD_COUNT),
            rng.gen(),
        )
        .chars()
        .take(limits.max_comment_len)
        .collect::<String>();
        validate_content(&body, limits)
            .with_context(|| format!("generated invalid comment {body:?}"))?;
        let parent_id = parent.map(|p| comments[p].id);
        if let Some(p) = parent {
            comments[p].reply_count += 1;
        }
        comments.push(Comment {
            id: CommentId(gen_id(rng)),
            parent_id,
            votes: gen_votes(rng, users),
            created_at: date,
            is_deleted: false,
            reply_count: 0,
            replies: Vec::new(),
            slug,
            author,
            body,
        });
    }

    // a few comments were deleted after being answered
    for c in comments.iter_mut() {
        if c.reply_count > 0 && rng.gen_ratio(1, 20) {
            c.is_deleted = true;
            c.body = String::from(DELETED_PLACEHOLDER);
        }
    }
    Ok(comments)
}

fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt::init();
    }
    let opt = <Opt as structopt::StructOpt>::from_args();
    anyhow::ensure!(
        (0.0..=1.0).contains(&opt.reply_ratio),
        "reply ratio must be between 0 and 1"
    );

    let mut rng = match opt.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    // generated comments must pass the limits the mock server will run with
    let limits = Limits::from_env()?;
    let users = gen_users(&mut rng, opt.users);
    let comments = gen_comments(&mut rng, &opt, &limits, &users)?;
    tracing::info!(
        num_users = users.len(),
        num_comments = comments.len(),
        "generated seed"
    );

    let json = Seed { users, comments }.to_json()?;
    match &opt.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing seed to {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
