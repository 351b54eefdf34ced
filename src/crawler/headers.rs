use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

/// Browser identities rotated across requests when the config supplies none
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36 OPR/104.0.0.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/120.0.6099.119 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Vivaldi/6.2.3105.58",
];

/// Pool of User-Agent header values drawn from uniformly on every attempt
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<HeaderValue>,
}

impl UserAgentPool {
    /// Builds a pool from configured agents, falling back to the built-in pool
    ///
    /// Entries that are not valid header values are dropped with a warning.
    pub fn new(configured: &[String]) -> Self {
        let source: Vec<&str> = if configured.is_empty() {
            DEFAULT_USER_AGENTS.to_vec()
        } else {
            configured.iter().map(String::as_str).collect()
        };

        let mut agents: Vec<HeaderValue> = source
            .into_iter()
            .filter_map(|ua| match HeaderValue::from_str(ua) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid user agent: {:?}", ua);
                    None
                }
            })
            .collect();

        if agents.is_empty() {
            agents = DEFAULT_USER_AGENTS
                .iter()
                .copied()
                .map(HeaderValue::from_static)
                .collect();
        }

        Self { agents }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Picks one agent uniformly at random
    pub fn choose(&self) -> HeaderValue {
        self.agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_USER_AGENTS[0]))
    }

    /// Builds browser-like request headers around a randomly drawn agent
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.choose());
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        headers
    }
}
