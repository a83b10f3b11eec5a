// Target descriptor resolution with search-specific fallbacks.
use regex::Regex;

use crate::config::ResolverConfig;
use crate::errors::WebGenResult;
use crate::page::{Document, ElementRef};

/// Generic token that interpreters emit when they only know "an input".
const GENERIC_INPUT: &str = "input";

/// A site that needs its explicit search-submit control clicked after a fill.
#[derive(Debug, Clone)]
pub struct MarketplaceRule {
    pub name: String,
    host: Regex,
    pub submit_selector: String,
}

impl MarketplaceRule {
    pub fn new(name: &str, host_pattern: &str, submit_selector: &str) -> WebGenResult<Self> {
        Ok(Self {
            name: name.to_string(),
            host: Regex::new(host_pattern)?,
            submit_selector: submit_selector.to_string(),
        })
    }

    pub fn matches_host(&self, host: &str) -> bool {
        self.host.is_match(host)
    }
}

#[derive(Debug, Clone)]
pub struct SelectorResolver {
    search_fallbacks: Vec<String>,
    marketplaces: Vec<MarketplaceRule>,
}

impl SelectorResolver {
    pub fn new(search_fallbacks: Vec<String>, marketplaces: Vec<MarketplaceRule>) -> Self {
        Self {
            search_fallbacks,
            marketplaces,
        }
    }

    pub fn from_config(cfg: &ResolverConfig) -> WebGenResult<Self> {
        let marketplaces = cfg
            .marketplaces
            .iter()
            .map(|m| MarketplaceRule::new(&m.name, &m.host_pattern, &m.submit_selector))
            .collect::<WebGenResult<Vec<_>>>()?;
        Ok(Self::new(cfg.search_fallbacks.clone(), marketplaces))
    }

    /// Whether a descriptor qualifies for the search fallback chain.
    pub fn is_search_like(descriptor: &str) -> bool {
        descriptor == GENERIC_INPUT || descriptor.contains("search")
    }

    /// Finds zero or one live element for `descriptor`. Read-only: nothing is
    /// cached, so every call sees the document as it is now.
    pub async fn resolve(
        &self,
        document: &dyn Document,
        descriptor: &str,
    ) -> WebGenResult<Option<ElementRef>> {
        if let Some(found) = document.query(descriptor).await? {
            return Ok(Some(found));
        }
        if !Self::is_search_like(descriptor) {
            return Ok(None);
        }

        for fallback in &self.search_fallbacks {
            if let Some(found) = document.query(fallback).await? {
                tracing::debug!(descriptor, fallback = %fallback, "resolved through search fallback");
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Marketplace rule for the page at `location`, matched on hostname.
    pub fn marketplace_for(&self, location: &str) -> Option<&MarketplaceRule> {
        let url = reqwest::Url::parse(location).ok()?;
        let host = url.host_str()?;
        self.marketplaces.iter().find(|rule| rule.matches_host(host))
    }
}

impl Default for SelectorResolver {
    fn default() -> Self {
        // Default patterns are literals and always compile.
        Self::from_config(&ResolverConfig::default())
            .unwrap_or_else(|_| Self::new(ResolverConfig::default().search_fallbacks, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::memory::{MemoryDocument, MemoryElement};

    #[test]
    fn search_like_descriptors() {
        assert!(SelectorResolver::is_search_like("input"));
        assert!(SelectorResolver::is_search_like("search box"));
        assert!(SelectorResolver::is_search_like("#site-search"));
        assert!(!SelectorResolver::is_search_like("input.email"));
        assert!(!SelectorResolver::is_search_like("#submit"));
    }

    #[tokio::test]
    async fn literal_match_wins() {
        let doc = MemoryDocument::new("https://example.com/");
        doc.add(MemoryElement::new("input").attr("type", "search"));
        doc.add(MemoryElement::new("input").id("search-box"));
        let resolver = SelectorResolver::default();

        let found = resolver.resolve(&doc, "#search-box").await.unwrap();
        assert_eq!(found, Some(ElementRef::new("#search-box")));
        assert_eq!(doc.queries(), vec!["#search-box".to_string()]);
    }

    #[tokio::test]
    async fn search_box_falls_back_to_generic_search_input_first() {
        let doc = MemoryDocument::new("https://example.com/");
        doc.add(MemoryElement::new("input").id("twotabsearchtextbox"));
        doc.add(MemoryElement::new("input").attr("type", "search"));
        let resolver = SelectorResolver::default();

        let found = resolver.resolve(&doc, "search box").await.unwrap();
        assert_eq!(found, Some(ElementRef::new(r#"input[type="search"]"#)));
    }

    #[tokio::test]
    async fn search_box_falls_back_to_marketplace_id() {
        let doc = MemoryDocument::new("https://www.amazon.com/");
        doc.add(MemoryElement::new("input").id("twotabsearchtextbox"));
        let resolver = SelectorResolver::default();

        let found = resolver.resolve(&doc, "search box").await.unwrap();
        assert_eq!(found, Some(ElementRef::new("#twotabsearchtextbox")));
    }

    #[tokio::test]
    async fn search_box_without_candidates_is_not_found() {
        let doc = MemoryDocument::new("https://example.com/");
        doc.add(MemoryElement::new("input").attr("type", "text"));
        let resolver = SelectorResolver::default();

        assert_eq!(resolver.resolve(&doc, "search box").await.unwrap(), None);
        assert_eq!(doc.queries().len(), 4);
        assert!(doc.journal().is_empty());
    }

    #[tokio::test]
    async fn non_search_descriptors_never_guess() {
        let doc = MemoryDocument::new("https://example.com/");
        doc.add(MemoryElement::new("input").attr("type", "search"));
        let resolver = SelectorResolver::default();

        assert_eq!(resolver.resolve(&doc, "#checkout").await.unwrap(), None);
        assert_eq!(doc.queries(), vec!["#checkout".to_string()]);
    }

    #[test]
    fn marketplace_matches_on_hostname() {
        let resolver = SelectorResolver::default();
        let rule = resolver.marketplace_for("https://www.amazon.co.uk/s?k=shoes").unwrap();
        assert_eq!(rule.submit_selector, "#nav-search-submit-button");
        assert!(resolver.marketplace_for("https://example.com/?q=amazon").is_none());
        assert!(resolver.marketplace_for("not a url").is_none());
    }

    #[test]
    fn invalid_marketplace_pattern_is_rejected() {
        let cfg = ResolverConfig {
            search_fallbacks: Vec::new(),
            marketplaces: vec![crate::config::MarketplaceEntry {
                name: "broken".into(),
                host_pattern: "(".into(),
                submit_selector: "#go".into(),
            }],
        };
        assert!(SelectorResolver::from_config(&cfg).is_err());
    }
}
