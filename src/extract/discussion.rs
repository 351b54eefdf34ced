//! Discussion thread extraction from JSON API responses
//!
//! A thread response is a two-element array: the post listing followed by the
//! comment listing. Comments are flattened depth-first through `replies`;
//! `more` stubs are skipped. Wiki page responses (`kind == "wikipage"`) are
//! turned into a post titled `Wiki: <page>`.

use crate::extract::{Extractor, MissingFields, Record, UNKNOWN};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Author shown for deleted or absent accounts
pub const DELETED_AUTHOR: &str = "DELETED";

/// Replies nested deeper than this are not flattened
const MAX_COMMENT_DEPTH: usize = 64;

/// A single flattened comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub score: i64,
}

/// A discussion thread or wiki page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionPost {
    pub id: String,
    pub title: String,
    pub url: String,
    pub selftext: String,
    pub score: i64,
    pub num_comments: u64,
    pub subreddit: String,
    pub created_utc: Option<i64>,
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub missing_fields: BTreeSet<String>,
}

impl Record for DiscussionPost {
    fn url(&self) -> &str {
        &self.url
    }

    fn missing_fields(&self) -> &BTreeSet<String> {
        &self.missing_fields
    }

    fn identity_resolved(&self) -> bool {
        !self.missing_fields.contains("id") && !self.missing_fields.contains("title")
    }
}

/// Extracts [`DiscussionPost`]s from thread and wiki JSON
#[derive(Debug, Clone, Default)]
pub struct DiscussionExtractor;

impl DiscussionExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for DiscussionExtractor {
    type Record = DiscussionPost;

    fn extract(&self, body: &str, url: &str) -> DiscussionPost {
        let mut missing = MissingFields::default();

        let value = match serde_json::from_str::<Value>(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Unparseable discussion JSON from {}: {}", url, e);
                missing.note("body");
                return empty_post(url, missing);
            }
        };

        if value.get("kind").and_then(Value::as_str) == Some("wikipage") {
            return wiki_post(&value, url, missing);
        }

        let Some(post) = value.pointer("/0/data/children/0/data") else {
            missing.note("body");
            return empty_post(url, missing);
        };

        let comments = value
            .pointer("/1/data/children")
            .and_then(Value::as_array)
            .map(|children| {
                let mut flat = Vec::new();
                flatten_comments(children, 0, &mut flat);
                flat
            })
            .unwrap_or_default();

        DiscussionPost {
            id: missing.or_default("id", str_field(post, "id"), UNKNOWN.to_string()),
            title: missing.or_default("title", str_field(post, "title"), UNKNOWN.to_string()),
            url: str_field(post, "url").unwrap_or_else(|| url.to_string()),
            selftext: str_field(post, "selftext").unwrap_or_default(),
            score: missing.or_default("score", int_field(post, "score"), 0),
            num_comments: missing.or_default(
                "num_comments",
                post.get("num_comments").and_then(Value::as_u64),
                0,
            ),
            subreddit: missing.or_default(
                "subreddit",
                str_field(post, "subreddit"),
                UNKNOWN.to_string(),
            ),
            created_utc: missing.optional("created_utc", int_field(post, "created_utc")),
            comments,
            missing_fields: missing.into_set(),
        }
    }
}

fn empty_post(url: &str, mut missing: MissingFields) -> DiscussionPost {
    missing.note("id");
    missing.note("title");

    DiscussionPost {
        id: UNKNOWN.to_string(),
        title: UNKNOWN.to_string(),
        url: url.to_string(),
        selftext: String::new(),
        score: 0,
        num_comments: 0,
        subreddit: subreddit_from_url(url).unwrap_or_else(|| UNKNOWN.to_string()),
        created_utc: None,
        comments: Vec::new(),
        missing_fields: missing.into_set(),
    }
}

fn wiki_post(value: &Value, url: &str, mut missing: MissingFields) -> DiscussionPost {
    let page = wiki_page_from_url(url);
    let content = missing.or_default(
        "content_md",
        value.pointer("/data/content_md").and_then(Value::as_str).map(str::to_string),
        String::new(),
    );

    let (id, title) = match page {
        Some(page) => (format!("wiki_{}", page), format!("Wiki: {}", page)),
        None => {
            missing.note("id");
            missing.note("title");
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        }
    };

    DiscussionPost {
        id,
        title,
        url: url.to_string(),
        selftext: content,
        score: 0,
        num_comments: 0,
        subreddit: missing.or_default("subreddit", subreddit_from_url(url), UNKNOWN.to_string()),
        created_utc: int_field(&value["data"], "revision_date"),
        comments: Vec::new(),
        missing_fields: missing.into_set(),
    }
}

/// Depth-first flattening of a comment listing
fn flatten_comments(children: &[Value], depth: usize, out: &mut Vec<Comment>) {
    if depth > MAX_COMMENT_DEPTH {
        return;
    }

    for child in children {
        if child.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = child.get("data") else {
            continue;
        };

        let author = str_field(data, "author")
            .filter(|a| a != "[deleted]")
            .unwrap_or_else(|| DELETED_AUTHOR.to_string());

        out.push(Comment {
            author,
            body: str_field(data, "body").unwrap_or_default(),
            score: int_field(data, "score").unwrap_or(0),
        });

        // Leaf comments carry `"replies": ""`
        if let Some(replies) = data
            .pointer("/replies/data/children")
            .and_then(Value::as_array)
        {
            flatten_comments(replies, depth + 1, out);
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Integer field; the API reports timestamps as floats
fn int_field(value: &Value, key: &str) -> Option<i64> {
    let field = value.get(key)?;
    field
        .as_i64()
        .or_else(|| field.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// `https://host/r/<name>/...` -> `<name>`
fn subreddit_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/r/")?;
    let name = rest.split(['/', '?', '#']).next()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// `https://host/r/<name>/wiki/<page>[.json]` -> `<page>`
fn wiki_page_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/wiki/")?;
    let page = rest.split(['?', '#']).next()?.trim_end_matches('/');
    let page = page.strip_suffix(".json").unwrap_or(page).trim_end_matches('/');
    (!page.is_empty()).then(|| page.to_string())
}
