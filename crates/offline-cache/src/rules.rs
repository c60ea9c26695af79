//! Request classification
//!
//! A [`RuleSet`] is an ordered list of matcher/strategy pairs. The first rule
//! whose matcher accepts the request decides its strategy; requests that no
//! rule accepts fall through to the default.

use serde::Serialize;
use std::fmt;
use url::Url;

use crate::config::OfflineCacheConfig;
use crate::error::Result;
use crate::types::{Destination, HttpRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
        })
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// URL equals one of these, fragment ignored
    ExactUrl(Vec<Url>),
    /// Same origin as `origin` and path starts with one of the prefixes
    PathPrefix { origin: Url, prefixes: Vec<String> },
    /// Full URL contains the substring
    UrlContains(String),
    Destination(Destination),
}

impl Matcher {
    pub fn matches(&self, request: &HttpRequest) -> bool {
        match self {
            Matcher::ExactUrl(urls) => {
                let mut target = request.url.clone();
                target.set_fragment(None);
                urls.iter().any(|u| *u == target)
            }
            Matcher::PathPrefix { origin, prefixes } => {
                request.url.origin() == origin.origin()
                    && prefixes.iter().any(|p| request.url.path().starts_with(p))
            }
            Matcher::UrlContains(needle) => request.url.as_str().contains(needle.as_str()),
            Matcher::Destination(destination) => request.destination == *destination,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub matcher: Matcher,
    pub strategy: Strategy,
}

impl Rule {
    pub fn new(name: &'static str, matcher: Matcher, strategy: Strategy) -> Self {
        Self {
            name,
            matcher,
            strategy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    default: Strategy,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, default: Strategy) -> Self {
        Self { rules, default }
    }

    /// Manifest, API prefixes, static assets, documents, then network-first
    pub fn from_config(config: &OfflineCacheConfig) -> Result<Self> {
        let rules = vec![
            Rule::new(
                "static-manifest",
                Matcher::ExactUrl(config.manifest_urls()?),
                Strategy::CacheFirst,
            ),
            Rule::new(
                "api-endpoint",
                Matcher::PathPrefix {
                    origin: config.origin.clone(),
                    prefixes: config.api_endpoints.clone(),
                },
                Strategy::NetworkFirst,
            ),
            Rule::new(
                "static-asset",
                Matcher::UrlContains(config.static_path_marker.clone()),
                Strategy::CacheFirst,
            ),
            Rule::new(
                "document",
                Matcher::Destination(Destination::Document),
                Strategy::NetworkFirst,
            ),
        ];

        Ok(Self::new(rules, Strategy::NetworkFirst))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The first matching rule, if any
    pub fn matching_rule(&self, request: &HttpRequest) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matcher.matches(request))
    }

    pub fn classify(&self, request: &HttpRequest) -> Strategy {
        self.matching_rule(request)
            .map(|rule| rule.strategy)
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::from_config(&OfflineCacheConfig::default()).unwrap()
    }

    fn get(url: &str) -> HttpRequest {
        HttpRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_manifest_entries_are_cache_first() {
        let rules = rules();
        for url in OfflineCacheConfig::default().manifest_urls().unwrap() {
            let request = HttpRequest::get(url.clone());
            assert_eq!(rules.classify(&request), Strategy::CacheFirst, "{}", url);
            assert_eq!(rules.matching_rule(&request).unwrap().name, "static-manifest");
        }
    }

    #[test]
    fn test_app_shell_document_hits_manifest_rule_first() {
        let request = HttpRequest::navigate(Url::parse("http://localhost:8000/").unwrap());
        assert_eq!(rules().classify(&request), Strategy::CacheFirst);
    }

    #[test]
    fn test_manifest_match_ignores_fragment() {
        let request = get("http://localhost:8000/static/manifest.json#v2");
        assert_eq!(
            rules().matching_rule(&request).unwrap().name,
            "static-manifest"
        );
    }

    #[test]
    fn test_root_entry_does_not_swallow_other_paths() {
        let request = get("http://localhost:8000/transport/track/42/");
        assert!(rules().matching_rule(&request).is_none());
        assert_eq!(rules().classify(&request), Strategy::NetworkFirst);
    }

    #[test]
    fn test_api_endpoints_are_network_first() {
        let rules = rules();
        let request = get("http://localhost:8000/transport/my-tours/?page=2");
        assert_eq!(rules.classify(&request), Strategy::NetworkFirst);
        assert_eq!(rules.matching_rule(&request).unwrap().name, "api-endpoint");
    }

    #[test]
    fn test_api_prefix_requires_same_origin() {
        let request = get("https://elsewhere.example/transport/my-tours/");
        assert!(rules().matching_rule(&request).is_none());
    }

    #[test]
    fn test_unlisted_static_assets_are_cache_first() {
        let rules = rules();
        let request = get("http://localhost:8000/static/audio/ping.mp3");
        assert_eq!(rules.classify(&request), Strategy::CacheFirst);
        assert_eq!(rules.matching_rule(&request).unwrap().name, "static-asset");
    }

    #[test]
    fn test_documents_are_network_first() {
        let request = HttpRequest::navigate(
            Url::parse("http://localhost:8000/transport/create-shipment/").unwrap(),
        );
        let rules = rules();
        assert_eq!(rules.classify(&request), Strategy::NetworkFirst);
        assert_eq!(rules.matching_rule(&request).unwrap().name, "document");
    }

    #[test]
    fn test_precedence_follows_rule_order() {
        let url = Url::parse("http://localhost:8000/static/app.css").unwrap();
        let rules = RuleSet::new(
            vec![
                Rule::new(
                    "first",
                    Matcher::UrlContains("/static/".to_string()),
                    Strategy::NetworkFirst,
                ),
                Rule::new(
                    "second",
                    Matcher::ExactUrl(vec![url.clone()]),
                    Strategy::CacheFirst,
                ),
            ],
            Strategy::CacheFirst,
        );

        assert_eq!(rules.classify(&HttpRequest::get(url)), Strategy::NetworkFirst);
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let rules = RuleSet::new(Vec::new(), Strategy::CacheFirst);
        assert_eq!(rules.classify(&get("http://localhost/x")), Strategy::CacheFirst);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::CacheFirst.to_string(), "cache-first");
        assert_eq!(Strategy::NetworkFirst.to_string(), "network-first");
    }
}
