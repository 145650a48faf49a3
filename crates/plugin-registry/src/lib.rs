//! Site-plugin contract and the ordered first-match registry.
//!
//! A plugin is one bank integration: a base-URL pattern saying "this page is
//! mine", an API-URL pattern saying "this request carries my transactions",
//! and a pure parser from the site payload to [`TransactionRecord`]s. The
//! registry holds plugins in registration order and resolves URLs by
//! iterating and testing; when two base patterns overlap, the earlier
//! registration wins.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use banktap_core_types::{PluginDescriptor, TransactionRecord};

/// Errors a plugin parser may raise.
#[derive(Clone, Debug, Error)]
pub enum ParseError {
    /// The payload's own success indicator reported failure, or the shape is
    /// unusable. The whole batch for the response is dropped; partial data
    /// never reaches storage.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Capability set every site integration implements.
///
/// Plugins are configured once at registration (account display name) and
/// hold no mutable state; instances are shared read-only by the registry.
pub trait SitePlugin: Send + Sync {
    /// Static metadata snapshot for this plugin/account pairing.
    fn descriptor(&self) -> PluginDescriptor;

    /// Pattern identifying pages this plugin applies to.
    fn base_url_pattern(&self) -> &Regex;

    /// Pattern identifying the network request that carries transaction
    /// data, within an already-matched page.
    fn api_url_pattern(&self) -> &Regex;

    /// Transform one site-specific response payload into canonical records.
    /// Pure and synchronous; recoverable shape variance (a missing optional
    /// sub-object, one unparseable row) must not fail the batch.
    fn parse(&self, body: &Value) -> Result<Vec<TransactionRecord>, ParseError>;

    fn matches_base_url(&self, url: &str) -> bool {
        self.base_url_pattern().is_match(url)
    }

    /// Only meaningful after `matches_base_url` succeeded for the same
    /// plugin: API patterns are loose and can collide across sites.
    fn matches_api_url(&self, url: &str) -> bool {
        self.api_url_pattern().is_match(url)
    }
}

/// Ordered plugin collection.
///
/// No de-duplication: registering the same logical plugin twice yields two
/// entries with undefined precedence, so callers register each plugin
/// exactly once.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn SitePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn SitePlugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// First registered plugin whose base pattern matches the page URL.
    pub fn find_by_base_url(&self, url: &str) -> Option<Arc<dyn SitePlugin>> {
        self.plugins
            .iter()
            .find(|plugin| plugin.matches_base_url(url))
            .cloned()
    }

    /// First registered plugin for which both the base and API patterns
    /// match the request URL.
    pub fn find_by_api_url(&self, url: &str) -> Option<Arc<dyn SitePlugin>> {
        self.plugins
            .iter()
            .find(|plugin| plugin.matches_base_url(url) && plugin.matches_api_url(url))
            .cloned()
    }

    /// Descriptor snapshot for announcement and display. Does not expose
    /// live plugin instances.
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins.iter().map(|plugin| plugin.descriptor()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePlugin {
        name: &'static str,
        base: Regex,
        api: Regex,
    }

    impl FakePlugin {
        fn new(name: &'static str, base: &str, api: &str) -> Arc<Self> {
            Arc::new(Self {
                name,
                base: Regex::new(base).unwrap(),
                api: Regex::new(api).unwrap(),
            })
        }
    }

    impl SitePlugin for FakePlugin {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor {
                display_name: self.name.into(),
                icon_url: String::new(),
                account_display_name: "Test Account".into(),
                base_url_pattern: self.base.as_str().into(),
                api_url_pattern: self.api.as_str().into(),
            }
        }

        fn base_url_pattern(&self) -> &Regex {
            &self.base
        }

        fn api_url_pattern(&self) -> &Regex {
            &self.api
        }

        fn parse(&self, _body: &Value) -> Result<Vec<TransactionRecord>, ParseError> {
            Ok(Vec::new())
        }
    }

    fn name_of(plugin: &Arc<dyn SitePlugin>) -> String {
        plugin.descriptor().display_name
    }

    #[test]
    fn disjoint_patterns_resolve_independently() {
        let mut registry = PluginRegistry::new();
        registry.register(FakePlugin::new("A", r"alpha\.example", r"/txns/"));
        registry.register(FakePlugin::new("B", r"beta\.example", r"/txns/"));

        let hit = registry.find_by_base_url("https://alpha.example/home").unwrap();
        assert_eq!(name_of(&hit), "A");
        assert!(registry.find_by_base_url("https://gamma.example/").is_none());
    }

    #[test]
    fn overlapping_patterns_resolve_to_first_registered() {
        let a = || FakePlugin::new("A", r"bank\.example", r"/a/");
        let b = || FakePlugin::new("B", r"bank\.example", r"/b/");

        let mut forward = PluginRegistry::new();
        forward.register(a());
        forward.register(b());
        let hit = forward.find_by_base_url("https://bank.example/").unwrap();
        assert_eq!(name_of(&hit), "A");

        // Registration order flipped, winner flips with it.
        let mut reversed = PluginRegistry::new();
        reversed.register(b());
        reversed.register(a());
        let hit = reversed.find_by_base_url("https://bank.example/").unwrap();
        assert_eq!(name_of(&hit), "B");
    }

    #[test]
    fn api_match_requires_base_match() {
        let mut registry = PluginRegistry::new();
        registry.register(FakePlugin::new(
            "A",
            r"bank\.example",
            r"transaction-history",
        ));

        // Loose API pattern matches, but the URL belongs to another site.
        assert!(registry
            .find_by_api_url("https://other.example/transaction-history")
            .is_none());
        assert!(registry
            .find_by_api_url("https://api.bank.example/transaction-history?accountType=DAYTODAY")
            .is_some());
    }

    #[test]
    fn descriptors_snapshot_preserves_order() {
        let mut registry = PluginRegistry::new();
        registry.register(FakePlugin::new("A", r"a", r"a"));
        registry.register(FakePlugin::new("B", r"b", r"b"));

        let names: Vec<String> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.display_name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
