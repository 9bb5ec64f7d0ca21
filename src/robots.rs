use crate::fetch::Fetcher;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

/// Allow/deny rules for one host, already scoped to our user agent.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    allows: Vec<String>,
    disallows: Vec<String>,
}

impl RobotsRules {
    /// The permissive default used when robots.txt is absent or unreadable.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt text, keeping the rules from groups addressed to
    /// `user_agent` when any exist, otherwise the `*` groups. Agent tokens
    /// match case-insensitively as substrings of the crawler identity.
    pub fn parse(text: &str, user_agent: &str) -> Self {
        struct Group {
            agents: Vec<String>,
            allows: Vec<String>,
            disallows: Vec<String>,
        }

        let mut groups: Vec<Group> = Vec::new();
        let mut in_agent_run = false;
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, val)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let val = val.trim();
            match key.as_str() {
                "user-agent" => {
                    if !in_agent_run {
                        groups.push(Group {
                            agents: Vec::new(),
                            allows: Vec::new(),
                            disallows: Vec::new(),
                        });
                        in_agent_run = true;
                    }
                    if let Some(g) = groups.last_mut() {
                        g.agents.push(val.to_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    in_agent_run = false;
                    if val.is_empty() {
                        // An empty rule value matches nothing.
                        continue;
                    }
                    if let Some(g) = groups.last_mut() {
                        if key == "allow" {
                            g.allows.push(val.to_string());
                        } else {
                            g.disallows.push(val.to_string());
                        }
                    }
                }
                _ => {
                    in_agent_run = false;
                }
            }
        }

        let ua = user_agent.to_lowercase();
        let matches_us = |g: &Group| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str()));
        let specific = groups.iter().any(matches_us);

        let mut rules = Self::default();
        for g in &groups {
            let applies = if specific {
                matches_us(g)
            } else {
                g.agents.iter().any(|a| a == "*")
            };
            if applies {
                rules.allows.extend(g.allows.iter().cloned());
                rules.disallows.extend(g.disallows.iter().cloned());
            }
        }
        rules
    }

    /// Longest-match precedence between the best Allow and Disallow prefix;
    /// ties go to Allow. No matching rule means allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        let best = |rules: &[String]| {
            rules
                .iter()
                .filter(|r| path.starts_with(r.as_str()))
                .map(|r| r.len())
                .max()
        };
        match (best(&self.allows), best(&self.disallows)) {
            (Some(a), Some(d)) => a >= d,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => true,
        }
    }
}

/// Per-host robots compliance cache. The first URL seen for a host triggers
/// one robots.txt fetch; concurrent first-visitors share that fetch through
/// the cell instead of issuing their own. Entries live for the whole run.
pub struct PolicyGate {
    fetcher: Arc<dyn Fetcher>,
    user_agent: String,
    cache: Mutex<HashMap<String, Arc<OnceCell<RobotsRules>>>>,
}

impl PolicyGate {
    pub fn new(fetcher: Arc<dyn Fetcher>, user_agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the host's robots policy permits fetching `url`. Never errors
    /// outward: an unreachable or malformed robots.txt degrades to allow-all,
    /// while a URL with no host is denied.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            warn!(%url, "url has no host");
            return false;
        };
        let host = host.to_lowercase();
        // Robots lookups collapse www onto the apex host.
        let robots_host = host.strip_prefix("www.").unwrap_or(&host);
        let key = format!("{}://{}", url.scheme(), robots_host);

        let cell = {
            let mut cache = self.cache.lock();
            Arc::clone(cache.entry(key.clone()).or_default())
        };
        let rules = cell.get_or_init(|| self.fetch_rules(key)).await;
        rules.is_allowed(url.path())
    }

    async fn fetch_rules(&self, base: String) -> RobotsRules {
        let robots_url = match Url::parse(&format!("{base}/robots.txt")) {
            Ok(u) => u,
            Err(e) => {
                warn!(%base, error = %e, "cannot form robots.txt url");
                return RobotsRules::allow_all();
            }
        };
        debug!(%robots_url, "fetching robots.txt");
        match self.fetcher.fetch_robots(&robots_url).await {
            Ok(text) => RobotsRules::parse(&text, &self.user_agent),
            Err(e) => {
                info!(%robots_url, error = %e, "robots.txt unavailable, allowing all");
                RobotsRules::allow_all()
            }
        }
    }
}
