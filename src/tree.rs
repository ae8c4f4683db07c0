//! The three-category blacklist tree.
//!
//! Sources hang off exactly three well-known categories: `blacklist`
//! (roots), `domains` and `hosts`. The tree owns each category's defaults
//! (redirect IP, disabled flag, exclude list) and its sources in
//! declaration order, with the pre-configured inline source first.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::entry::EntrySet;
use crate::error::ConfigError;
use crate::source::Source;

/// Listing label of the root category's pre-configured source.
pub const PRE_ROOTS: &str = "global-blacklisted-domains";
/// Listing label of the domains category's pre-configured source.
pub const PRE_DOMNS: &str = "blacklisted-subdomains";
/// Listing label of the hosts category's pre-configured source.
pub const PRE_HOSTS: &str = "blacklisted-servers";

/// Selection label matching every pre-configured source.
pub const PRE_CONFIGURED: &str = "pre-configured";

/// Fallback redirect address when nothing more specific is configured.
pub const DEFAULT_IP: &str = "0.0.0.0";

/// One of the three well-known blacklist categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Root,
    Domains,
    Hosts,
}

impl Node {
    /// Fixed category order used everywhere sources are enumerated.
    pub const ALL: [Self; 3] = [Self::Root, Self::Domains, Self::Hosts];

    /// Configuration key of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "blacklist",
            Self::Domains => "domains",
            Self::Hosts => "hosts",
        }
    }

    /// File-name area of the category. The root category writes under
    /// `roots` to keep its files apart from the `domains` ones.
    #[must_use]
    pub fn area(self) -> &'static str {
        match self {
            Self::Root => "roots",
            Self::Domains => "domains",
            Self::Hosts => "hosts",
        }
    }

    /// Label and name of the category's pre-configured inline source.
    #[must_use]
    pub fn pre_label(self) -> &'static str {
        match self {
            Self::Root => PRE_ROOTS,
            Self::Domains => PRE_DOMNS,
            Self::Hosts => PRE_HOSTS,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "blacklist" | "root" | "roots" => Some(Self::Root),
            "domains" => Some(Self::Domains),
            "hosts" => Some(Self::Hosts),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category-level defaults inherited by its sources.
#[derive(Debug, Clone)]
pub struct NodeDefaults {
    pub ip: String,
    pub disabled: bool,
    /// Normalized whitelist entries contributed to the global exclude set.
    pub excludes: Vec<String>,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_owned(),
            disabled: false,
            excludes: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct NodeTree {
    defaults: NodeDefaults,
    sources: Vec<Arc<Source>>,
}

impl NodeTree {
    fn new(defaults: NodeDefaults) -> Self {
        Self {
            defaults,
            sources: Vec::new(),
        }
    }
}

/// All configured categories and their sources.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: BTreeMap<Node, NodeTree>,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) a category's defaults, keeping its sources.
    pub fn set_defaults(&mut self, node: Node, defaults: NodeDefaults) {
        self.nodes
            .entry(node)
            .or_insert_with(|| NodeTree::new(NodeDefaults::default()))
            .defaults = defaults;
    }

    /// Appends a source to a category.
    ///
    /// Source names must be unique within their category since they map
    /// directly to generated file names.
    pub fn add_source(&mut self, node: Node, source: Arc<Source>) -> Result<(), ConfigError> {
        if source.name().trim().is_empty() {
            return Err(ConfigError::EmptySourceName { node });
        }
        let tree = self
            .nodes
            .entry(node)
            .or_insert_with(|| NodeTree::new(NodeDefaults::default()));
        if tree.sources.iter().any(|s| s.name() == source.name()) {
            return Err(ConfigError::DuplicateSource {
                node,
                name: source.name().to_owned(),
            });
        }
        tree.sources.push(source);
        Ok(())
    }

    /// Whether the named category is configured.
    #[must_use]
    pub fn node_exists(&self, name: &str) -> bool {
        Node::from_name(name).is_some_and(|node| self.nodes.contains_key(&node))
    }

    /// Configured category names, in fixed category order.
    #[must_use]
    pub fn nodes(&self) -> Vec<&'static str> {
        self.nodes.keys().map(|node| node.as_str()).collect()
    }

    /// Redirect IP of the named category, falling back to [`DEFAULT_IP`]
    /// when the category is absent or unknown.
    #[must_use]
    pub fn resolve_ip(&self, name: &str) -> String {
        Node::from_name(name)
            .and_then(|node| self.nodes.get(&node))
            .map_or_else(|| DEFAULT_IP.to_owned(), |tree| tree.defaults.ip.clone())
    }

    /// Merged resolved blacklist of the named category. Unknown or absent
    /// categories yield an empty set.
    #[must_use]
    pub fn validate(&self, name: &str) -> EntrySet {
        let merged = EntrySet::new();
        if let Some(tree) = Node::from_name(name).and_then(|node| self.nodes.get(&node)) {
            for source in &tree.sources {
                merged.merge(source.entries());
            }
        }
        merged
    }

    /// Global whitelist: the union of every category's exclude entries.
    #[must_use]
    pub fn excludes(&self) -> EntrySet {
        let set = EntrySet::new();
        for tree in self.nodes.values() {
            for entry in &tree.defaults.excludes {
                set.add(entry);
            }
        }
        set
    }

    /// Exclude entries of a single named category.
    #[must_use]
    pub fn excludes_for(&self, name: &str) -> EntrySet {
        Node::from_name(name)
            .and_then(|node| self.nodes.get(&node))
            .map_or_else(EntrySet::new, |tree| {
                EntrySet::from_entries(&tree.defaults.excludes)
            })
    }

    /// Sources of one category, in declaration order.
    #[must_use]
    pub fn sources_of(&self, node: Node) -> Vec<Arc<Source>> {
        self.nodes
            .get(&node)
            .map(|tree| tree.sources.clone())
            .unwrap_or_default()
    }

    /// Every source, in category order then declaration order.
    #[must_use]
    pub fn all_sources(&self) -> Vec<Arc<Source>> {
        let mut sources = Vec::new();
        for node in Node::ALL {
            if let Some(tree) = self.nodes.get(&node) {
                sources.extend(tree.sources.iter().cloned());
            }
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Env;
    use crate::source::Origin;

    fn env() -> Arc<Env> {
        Arc::new(Env::default())
    }

    fn url_source(node: Node, name: &str) -> Arc<Source> {
        Arc::new(Source::new(
            env(),
            node,
            name,
            Origin::Url(format!("http://{name}.example")),
        ))
    }

    #[test]
    fn test_node_names_and_areas() {
        assert_eq!(Node::Root.as_str(), "blacklist");
        assert_eq!(Node::Root.area(), "roots");
        assert_eq!(Node::Domains.area(), "domains");
        assert_eq!(Node::Hosts.pre_label(), "blacklisted-servers");
        assert_eq!(Node::from_name("blacklist"), Some(Node::Root));
        assert_eq!(Node::from_name("hosts"), Some(Node::Hosts));
        assert_eq!(Node::from_name("broken"), None);
    }

    #[test]
    fn test_nodes_are_listed_in_category_order() {
        let mut tree = Tree::new();
        tree.set_defaults(Node::Hosts, NodeDefaults::default());
        tree.set_defaults(Node::Root, NodeDefaults::default());
        tree.set_defaults(Node::Domains, NodeDefaults::default());

        assert_eq!(tree.nodes(), vec!["blacklist", "domains", "hosts"]);
        assert!(tree.node_exists("hosts"));
        assert!(!tree.node_exists("broken"));
    }

    #[test]
    fn test_resolve_ip_falls_back_to_default() {
        let mut tree = Tree::new();
        tree.set_defaults(
            Node::Domains,
            NodeDefaults {
                ip: "192.168.100.1".to_owned(),
                ..NodeDefaults::default()
            },
        );

        assert_eq!(tree.resolve_ip("domains"), "192.168.100.1");
        assert_eq!(tree.resolve_ip("hosts"), "0.0.0.0");
        assert_eq!(tree.resolve_ip("borked"), "0.0.0.0");
    }

    #[test]
    fn test_duplicate_source_names_are_rejected() {
        let mut tree = Tree::new();
        tree.add_source(Node::Domains, url_source(Node::Domains, "malc0de"))
            .unwrap();

        let err = tree
            .add_source(Node::Domains, url_source(Node::Domains, "malc0de"))
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::DuplicateSource { node: Node::Domains, ref name } if name == "malc0de"
        ));
    }

    #[test]
    fn test_same_name_allowed_across_categories() {
        let mut tree = Tree::new();
        tree.add_source(Node::Domains, url_source(Node::Domains, "shared"))
            .unwrap();
        tree.add_source(Node::Hosts, url_source(Node::Hosts, "shared"))
            .unwrap();

        assert_eq!(tree.all_sources().len(), 2);
    }

    #[test]
    fn test_empty_source_name_is_rejected() {
        let mut tree = Tree::new();

        let err = tree
            .add_source(Node::Hosts, url_source(Node::Hosts, "  "))
            .unwrap_err();

        assert!(matches!(err, ConfigError::EmptySourceName { node: Node::Hosts }));
    }

    #[test]
    fn test_excludes_union_all_categories() {
        let mut tree = Tree::new();
        tree.set_defaults(
            Node::Root,
            NodeDefaults {
                excludes: vec!["ytimg.com".to_owned()],
                ..NodeDefaults::default()
            },
        );
        tree.set_defaults(
            Node::Hosts,
            NodeDefaults {
                excludes: vec!["githubusercontent.com".to_owned()],
                ..NodeDefaults::default()
            },
        );

        let all = tree.excludes();
        assert!(all.contains("ytimg.com"));
        assert!(all.contains("githubusercontent.com"));
        assert_eq!(all.len(), 2);

        let hosts_only = tree.excludes_for("hosts");
        assert!(hosts_only.contains("githubusercontent.com"));
        assert!(!hosts_only.contains("ytimg.com"));

        assert!(tree.excludes_for("borked").is_empty());
    }

    #[test]
    fn test_validate_merges_category_sources() {
        let mut tree = Tree::new();
        let one = url_source(Node::Hosts, "one");
        let two = url_source(Node::Hosts, "two");
        one.entries().add("ads.example.com");
        two.entries().add("ads.example.com");
        two.entries().add("tracker.example.net");
        tree.add_source(Node::Hosts, one).unwrap();
        tree.add_source(Node::Hosts, two).unwrap();

        let merged = tree.validate("hosts");

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.count("ads.example.com"), Some(2));
        assert!(tree.validate("borked").is_empty());
        assert!(tree.validate("borked").snapshot().is_empty());
    }

    #[test]
    fn test_all_sources_keeps_category_then_declaration_order() {
        let mut tree = Tree::new();
        tree.add_source(Node::Hosts, url_source(Node::Hosts, "h1"))
            .unwrap();
        tree.add_source(Node::Domains, url_source(Node::Domains, "d2"))
            .unwrap();
        tree.add_source(Node::Domains, url_source(Node::Domains, "d1"))
            .unwrap();
        tree.add_source(Node::Root, url_source(Node::Root, "r1"))
            .unwrap();

        let sources = tree.all_sources();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();

        assert_eq!(names, vec!["r1", "d2", "d1", "h1"]);
    }
}
