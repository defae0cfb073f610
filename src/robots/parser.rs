//! Robots.txt policy snapshot
//!
//! The `robotstxt` crate tokenizes the file; this module collects the rules
//! of the group that applies to our crawler into an immutable snapshot and
//! answers permission queries with longest-prefix matching.

use robotstxt::{parse_robotstxt, RobotsParseHandler};
use std::time::Duration;

/// Immutable robots.txt rules for one host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsPolicy {
    /// Path prefixes the crawler may not fetch
    pub disallow: Vec<String>,

    /// Path prefixes that override a shorter disallow
    pub allow: Vec<String>,

    /// Crawl-delay declared for the selected group
    pub crawl_delay: Option<Duration>,
}

impl RobotsPolicy {
    /// Creates a permissive policy that allows everything
    ///
    /// This is used when robots.txt is missing, unreadable, or malformed.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses robots.txt content for the given user agent token
    ///
    /// Groups naming the agent (whole product token, case-insensitive)
    /// take precedence over `*` groups. Content with no
    /// recognizable directives yields an allow-all policy.
    pub fn from_content(content: &str, user_agent: &str) -> Self {
        let mut collector = GroupCollector::new(user_agent);
        parse_robotstxt(content, &mut collector);
        collector.into_policy()
    }

    /// Checks if a path (with optional query) is allowed
    ///
    /// Among all rules whose value is a prefix of the path, the longest wins;
    /// on equal length, allow wins. No matching rule means allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |rules: &[String]| {
            rules
                .iter()
                .filter(|rule| path.starts_with(rule.as_str()))
                .map(|rule| rule.len())
                .max()
        };

        match (longest(&self.allow), longest(&self.disallow)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }

    /// Returns true if the policy has no rules at all
    pub fn is_empty(&self) -> bool {
        self.disallow.is_empty() && self.allow.is_empty() && self.crawl_delay.is_none()
    }
}

/// Rules gathered for one user-agent group
#[derive(Debug, Default)]
struct GroupRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<Duration>,
}

/// Parse callback that sorts rules into the specific and the wildcard group
struct GroupCollector {
    agent: String,
    specific: GroupRules,
    wildcard: GroupRules,
    saw_specific: bool,
    // Which groups the current run of rules applies to
    in_specific: bool,
    in_wildcard: bool,
    // Set after a rule line so the next User-agent starts a new group
    rules_seen: bool,
}

impl GroupCollector {
    fn new(user_agent: &str) -> Self {
        Self {
            agent: user_agent.to_lowercase(),
            specific: GroupRules::default(),
            wildcard: GroupRules::default(),
            saw_specific: false,
            in_specific: false,
            in_wildcard: false,
            rules_seen: false,
        }
    }

    fn targets(&mut self) -> impl Iterator<Item = &mut GroupRules> {
        let mut targets = Vec::with_capacity(2);
        let (specific, wildcard) = (&mut self.specific, &mut self.wildcard);
        if self.in_specific {
            targets.push(specific);
        }
        if self.in_wildcard {
            targets.push(wildcard);
        }
        targets.into_iter()
    }

    fn into_policy(self) -> RobotsPolicy {
        let rules = if self.saw_specific {
            self.specific
        } else {
            self.wildcard
        };

        RobotsPolicy {
            disallow: rules.disallow,
            allow: rules.allow,
            crawl_delay: rules.crawl_delay,
        }
    }
}

impl RobotsParseHandler for GroupCollector {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if self.rules_seen {
            self.in_specific = false;
            self.in_wildcard = false;
            self.rules_seen = false;
        }

        let token = user_agent.trim().to_lowercase();
        if token == "*" {
            self.in_wildcard = true;
        } else if !token.is_empty() && token == self.agent {
            self.in_specific = true;
            self.saw_specific = true;
        }
    }

    fn handle_allow(&mut self, _line_num: u32, value: &str) {
        self.rules_seen = true;
        let value = value.trim().to_string();
        if value.is_empty() {
            return;
        }
        for group in self.targets() {
            group.allow.push(value.clone());
        }
    }

    fn handle_disallow(&mut self, _line_num: u32, value: &str) {
        self.rules_seen = true;
        // An empty Disallow allows everything, so it adds no rule
        let value = value.trim().to_string();
        if value.is_empty() {
            return;
        }
        for group in self.targets() {
            group.disallow.push(value.clone());
        }
    }

    fn handle_sitemap(&mut self, _line_num: u32, _value: &str) {}

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        if !action.trim().eq_ignore_ascii_case("crawl-delay") {
            return;
        }
        self.rules_seen = true;

        let seconds = match value.trim().parse::<f64>() {
            Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => seconds,
            _ => {
                tracing::debug!("Ignoring unparseable Crawl-delay value '{}'", value);
                return;
            }
        };
        let delay = Duration::from_secs_f64(seconds);
        for group in self.targets() {
            group.crawl_delay = Some(delay);
        }
    }
}
