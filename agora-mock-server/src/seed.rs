use anyhow::Context;

use agora_api::{Author, Comment};

/// Initial content for a [`MockServer`](crate::MockServer)
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Seed {
    pub users: Vec<Author>,
    pub comments: Vec<Comment>,
}

impl Seed {
    pub fn from_json(s: &str) -> anyhow::Result<Seed> {
        serde_json::from_str(s).context("parsing seed")
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serializing seed")
    }
}
