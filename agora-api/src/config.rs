use anyhow::Context;

/// Tunables shared by the client-side validation and the store
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum comment length, in characters
    pub max_comment_len: usize,

    /// Number of replies returned inline with each top-level comment
    pub reply_preview: usize,

    /// Posting rate limit, per user
    pub rate_limit: RateLimit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window_secs: i64,
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_comment_len: 2000,
            reply_preview: 2,
            rate_limit: RateLimit::default(),
        }
    }
}

impl Default for RateLimit {
    fn default() -> RateLimit {
        RateLimit {
            max_requests: 3,
            window_secs: 60,
        }
    }
}

impl Limits {
    pub fn from_json(s: &str) -> anyhow::Result<Limits> {
        serde_json::from_str(s).context("parsing limits configuration")
    }

    /// Reads `AGORA_MAX_COMMENT_LEN`, `AGORA_REPLY_PREVIEW`,
    /// `AGORA_RATE_LIMIT_MAX` and `AGORA_RATE_LIMIT_WINDOW_SECS`, keeping
    /// defaults for unset variables
    pub fn from_env() -> anyhow::Result<Limits> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Limits> {
        fn parse<T: std::str::FromStr>(
            get: &impl Fn(&str) -> Option<String>,
            key: &str,
            into: &mut T,
        ) -> anyhow::Result<()>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            if let Some(v) = get(key) {
                *into = v
                    .parse()
                    .with_context(|| format!("parsing environment variable {key}={v:?}"))?;
            }
            Ok(())
        }
        let mut res = Limits::default();
        parse(&get, "AGORA_MAX_COMMENT_LEN", &mut res.max_comment_len)?;
        parse(&get, "AGORA_REPLY_PREVIEW", &mut res.reply_preview)?;
        parse(&get, "AGORA_RATE_LIMIT_MAX", &mut res.rate_limit.max_requests)?;
        parse(
            &get,
            "AGORA_RATE_LIMIT_WINDOW_SECS",
            &mut res.rate_limit.window_secs,
        )?;
        tracing::debug!(limits = ?res, "loaded limits from environment");
        Ok(res)
    }
}
