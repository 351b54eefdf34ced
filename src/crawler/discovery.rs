//! Link discovery
//!
//! Turns a group's listing page into an ordered, deduplicated list of child
//! links. Parsing is pure ([`LinkDiscoverer::discover_child_links`]); fetching
//! listing pages, following pagination and the politeness delay live in
//! [`discover_group`].
//!
//! Zero matches is a valid outcome and yields an empty list. Only a listing
//! page that cannot be fetched at all is a discovery failure.

use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::retry::random_delay;
use crate::seeds::GroupSeed;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A discovered child URL and the group it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedLink {
    pub url: String,
    pub parent_key: String,
}

impl SeedLink {
    pub fn new(url: impl Into<String>, parent_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parent_key: parent_key.into(),
        }
    }
}

/// Errors that make a whole group undiscoverable
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Listing page {url} unavailable: {reason}")]
    ListingUnavailable { url: String, reason: String },
}

/// Knows where a group's listing lives and how to read child links from it
pub trait LinkDiscoverer: Send + Sync {
    /// First listing page of a group, or `None` if the group only has seeded children
    fn listing_url(&self, group: &GroupSeed) -> Option<String>;

    /// Extracts child links from one listing page, deduplicated by URL
    fn discover_child_links(&self, body: &str, group_key: &str) -> Vec<SeedLink>;

    /// URL of the listing page following `current_url`, if any
    fn next_page(&self, _body: &str, _current_url: &str) -> Option<String> {
        None
    }
}

/// Politeness and pagination limits for discovery
#[derive(Debug, Clone)]
pub struct DiscoveryPacing {
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub max_pages: u32,
}

impl DiscoveryPacing {
    pub fn from_config(config: &crate::config::SchedulerConfig) -> Self {
        Self {
            delay_min: Duration::from_millis(config.discovery_delay_min_ms),
            delay_max: Duration::from_millis(config.discovery_delay_max_ms),
            max_pages: config.max_listing_pages.max(1),
        }
    }
}

/// Discovers every child link of a group
///
/// Seeded children come first, followed by links discovered from the listing
/// pages in page order. Each listing fetch is followed by a random politeness
/// delay. A failure on the first listing page fails the group; a failure on a
/// later page keeps what was found so far.
pub async fn discover_group<D: LinkDiscoverer + ?Sized>(
    fetcher: &Fetcher,
    discoverer: &D,
    group: &GroupSeed,
    pacing: &DiscoveryPacing,
) -> Result<Vec<SeedLink>, DiscoveryError> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for child in &group.children {
        if seen.insert(child.clone()) {
            links.push(SeedLink::new(child.clone(), group.group.clone()));
        }
    }

    let mut next = discoverer.listing_url(group);
    let mut pages = 0;

    while let Some(page_url) = next.take() {
        if pages >= pacing.max_pages {
            tracing::debug!(
                "Stopping discovery for {} after {} listing pages",
                group.group,
                pages
            );
            break;
        }

        let outcome = fetcher.fetch(&page_url).await;
        pages += 1;

        let body = match outcome {
            FetchOutcome::Success { body, .. } => body,
            other if pages == 1 => {
                tokio::time::sleep(random_delay(pacing.delay_min, pacing.delay_max)).await;
                return Err(DiscoveryError::ListingUnavailable {
                    url: page_url,
                    reason: other.reason(),
                });
            }
            other => {
                tracing::warn!(
                    "Listing page {} for {} failed ({}), keeping {} links",
                    page_url,
                    group.group,
                    other.reason(),
                    links.len()
                );
                break;
            }
        };

        for link in discoverer.discover_child_links(&body, &group.group) {
            if seen.insert(link.url.clone()) {
                links.push(link);
            }
        }
        next = discoverer.next_page(&body, &page_url);

        tokio::time::sleep(random_delay(pacing.delay_min, pacing.delay_max)).await;
    }

    if links.is_empty() {
        tracing::warn!("Found 0 links for {}", group.group);
    } else {
        tracing::info!("Found {} links for {}", links.len(), group.group);
    }

    Ok(links)
}

/// Resolves an href against a base, skipping non-navigational links
fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute.to_string())
    } else {
        None
    }
}

/// Collects resolved hrefs of anchors matching `css`, in document order
fn collect_anchor_links(html: &str, css: &str, base: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        tracing::debug!("Unusable selector {:?}", css);
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Discovers perfume pages on a designer page
///
/// A designer page links its perfumes as `/<anything>/<designer-slug>/<perfume>.html`,
/// so anchors are matched with `a[href*="/<slug>/"]`. The slug is the group key.
#[derive(Debug, Clone)]
pub struct PerfumeLinkDiscoverer {
    base: Url,
}

impl PerfumeLinkDiscoverer {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base_url)?,
        })
    }
}

impl LinkDiscoverer for PerfumeLinkDiscoverer {
    fn listing_url(&self, group: &GroupSeed) -> Option<String> {
        group.url.clone()
    }

    fn discover_child_links(&self, body: &str, group_key: &str) -> Vec<SeedLink> {
        let slug: String = group_key
            .chars()
            .filter(|c| !matches!(c, '"' | '\\'))
            .collect();
        if slug.trim().is_empty() {
            return Vec::new();
        }

        let css = format!("a[href*=\"/{}/\"]", slug);
        collect_anchor_links(body, &css, &self.base)
            .into_iter()
            .map(|url| SeedLink::new(url, group_key))
            .collect()
    }
}

/// Builds designer groups from the site's designer index page
///
/// Every `a[href^="/designers/"]` becomes one group keyed by the last path
/// segment without its `.html` suffix.
pub fn discover_designer_groups(html: &str, base: &Url) -> Vec<GroupSeed> {
    let mut keys = HashSet::new();

    collect_anchor_links(html, "a[href^=\"/designers/\"]", base)
        .into_iter()
        .filter_map(|url| {
            let key = designer_key(&url)?;
            keys.insert(key.clone()).then(|| GroupSeed {
                group: key,
                url: Some(url),
                children: Vec::new(),
            })
        })
        .collect()
}

fn designer_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if last == "designers" {
        return None;
    }
    Some(last.trim_end_matches(".html").to_string())
}

/// Discovers discussion threads from subreddit listings
///
/// Listings are JSON documents (`data.children[].data.permalink`, `data.after`).
/// Each thread link points at the thread's JSON representation.
#[derive(Debug, Clone)]
pub struct DiscussionLinkDiscoverer {
    api_base: Url,
    search_query: Option<String>,
    page_limit: u32,
}

impl DiscussionLinkDiscoverer {
    pub fn new(
        api_base_url: &str,
        search_terms: &[String],
        page_limit: u32,
    ) -> Result<Self, url::ParseError> {
        let terms: Vec<&str> = search_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Self {
            api_base: Url::parse(api_base_url)?,
            search_query: (!terms.is_empty()).then(|| terms.join(" OR ")),
            page_limit,
        })
    }

    fn thread_json_url(&self, permalink: &str) -> Option<String> {
        let trimmed = permalink.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let joined = self.api_base.join(&format!("{}.json", trimmed)).ok()?;
        Some(joined.to_string())
    }
}

impl LinkDiscoverer for DiscussionLinkDiscoverer {
    fn listing_url(&self, group: &GroupSeed) -> Option<String> {
        if let Some(url) = &group.url {
            return Some(url.clone());
        }

        let limit = self.page_limit.to_string();
        let url = match &self.search_query {
            Some(query) => {
                let mut url = self
                    .api_base
                    .join(&format!("/r/{}/search.json", group.group))
                    .ok()?;
                url.query_pairs_mut()
                    .append_pair("q", query)
                    .append_pair("restrict_sr", "1")
                    .append_pair("limit", &limit);
                url
            }
            None => {
                let mut url = self
                    .api_base
                    .join(&format!("/r/{}/new.json", group.group))
                    .ok()?;
                url.query_pairs_mut().append_pair("limit", &limit);
                url
            }
        };

        Some(url.to_string())
    }

    fn discover_child_links(&self, body: &str, group_key: &str) -> Vec<SeedLink> {
        let listing: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Listing for {} is not valid JSON: {}", group_key, e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        listing
            .pointer("/data/children")
            .and_then(Value::as_array)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|child| child.pointer("/data/permalink")?.as_str())
                    .filter_map(|permalink| self.thread_json_url(permalink))
                    .filter(|url| seen.insert(url.clone()))
                    .map(|url| SeedLink::new(url, group_key))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn next_page(&self, body: &str, current_url: &str) -> Option<String> {
        let listing: Value = serde_json::from_str(body).ok()?;
        let after = listing.pointer("/data/after")?.as_str()?;
        if after.is_empty() {
            return None;
        }

        let mut url = Url::parse(current_url).ok()?;
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "after")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("after", after);
        Some(url.to_string())
    }
}
