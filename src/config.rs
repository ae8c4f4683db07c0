//! Configuration loading and the runtime environment.
//!
//! The TOML layout mirrors the router's blacklist stanza: one optional
//! table per category (`blacklist`, `domains`, `hosts`), each carrying a
//! redirect IP, literal include/exclude lists and an array of feed
//! declarations. Loading validates everything up front and produces the
//! immutable [`Env`] plus the source [`Tree`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::entry::EntrySet;
use crate::error::{ConfigError, Result};
use crate::fetch::Fetcher;
use crate::render::Selection;
use crate::resolve::{self, ResolveSummary};
use crate::source::{Origin, Source};
use crate::tree::{DEFAULT_IP, Node, NodeDefaults, Tree};

/// File naming template. `{dir}`, `{node}`, `{name}` and `{ext}` are
/// substituted when formatting a blacklist file path.
pub const DEFAULT_NAME_FORMAT: &str = "{dir}/{node}.{name}.{ext}";

/// Extension of generated blacklist files.
pub const DEFAULT_EXTENSION: &str = "blacklist.conf";

/// Selector accepted by [`Config::get`] to mean every category.
pub const ALL: &str = "all";

/// Runtime environment shared by every source and selection.
#[derive(Debug, Clone)]
pub struct Env {
    /// Directory receiving generated blacklist files.
    pub dir: String,

    /// Extension of generated blacklist files.
    pub ext: String,

    /// File naming template, see [`DEFAULT_NAME_FORMAT`].
    pub name_format: String,

    /// Upper bound for one feed fetch or feed file read.
    pub timeout: Duration,

    /// Maximum number of sources resolved concurrently.
    pub jobs: usize,

    /// Shell used to run the DNS reload command.
    pub shell: String,

    /// Command reloading the DNS service. Empty skips reloading.
    pub dns_service: String,

    /// Wildcard pair locating generated files for the stale purge.
    pub wildcard: Wildcard,

    /// Print the audit report after a run.
    pub debug: bool,
}

impl Env {
    /// Formats a blacklist file path from the naming template.
    #[must_use]
    pub fn format_path(&self, area: &str, name: &str) -> String {
        self.name_format
            .replace("{dir}", &self.dir)
            .replace("{node}", area)
            .replace("{name}", name)
            .replace("{ext}", &self.ext)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            ext: default_extension(),
            name_format: default_name_format(),
            timeout: Duration::from_secs(default_timeout_seconds()),
            jobs: default_jobs(),
            shell: default_shell(),
            dns_service: String::new(),
            wildcard: Wildcard::default(),
            debug: false,
        }
    }
}

/// Glob pair matching generated blacklist files.
///
/// The defaults match every `<area>.<name>` combination produced by the
/// naming template.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Wildcard {
    #[serde(default = "default_wildcard_node")]
    pub node: String,

    #[serde(default = "default_wildcard_name")]
    pub name: String,
}

impl Default for Wildcard {
    fn default() -> Self {
        Self {
            node: default_wildcard_node(),
            name: default_wildcard_name(),
        }
    }
}

/// On-disk configuration, mirroring the TOML layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default = "default_dir")]
    pub dir: String,

    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_name_format")]
    pub name_format: String,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default)]
    pub dns_service: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub wildcard: Wildcard,

    pub blacklist: Option<RawNode>,
    pub domains: Option<RawNode>,
    pub hosts: Option<RawNode>,
}

/// One category block of the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawNode {
    /// Disables the whole category, sources included.
    #[serde(default)]
    pub disabled: bool,

    /// Redirect IP for this category. Falls back to the root category's
    /// IP, then to `0.0.0.0`.
    pub ip: Option<String>,

    /// Literal entries blackholed without fetching anything.
    #[serde(default)]
    pub include: Vec<String>,

    /// Whitelisted entries, shielding themselves and their subdomains
    /// across every source of the run.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Feed declarations, kept in declaration order.
    #[serde(default)]
    pub source: Vec<RawSource>,
}

/// One feed declaration under a category.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSource {
    /// Unique name within the category; becomes part of the file name.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Redirect IP override for this feed.
    pub ip: Option<String>,

    /// Line prefix a feed line must carry to count, e.g. `0.0.0.0 `.
    #[serde(default)]
    pub prefix: String,

    pub url: Option<String>,
    pub file: Option<String>,

    #[serde(default)]
    pub disabled: bool,

    /// Whitelist applied to this feed only.
    #[serde(default)]
    pub exclude: Vec<String>,
}

const fn default_timeout_seconds() -> u64 {
    30
}

const fn default_jobs() -> usize {
    8
}

fn default_dir() -> String {
    "/etc/dnsmasq.d".to_owned()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_owned()
}

fn default_name_format() -> String {
    DEFAULT_NAME_FORMAT.to_owned()
}

fn default_shell() -> String {
    "sh".to_owned()
}

fn default_wildcard_node() -> String {
    "*s".to_owned()
}

fn default_wildcard_name() -> String {
    "*".to_owned()
}

/// Fully validated configuration: the environment plus the source tree.
#[derive(Debug)]
pub struct Config {
    env: Arc<Env>,
    tree: Tree,
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parses and validates configuration content.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Self::from_raw(raw)
    }

    /// Builds the environment and source tree from parsed configuration.
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        if raw.blacklist.is_none() && raw.domains.is_none() && raw.hosts.is_none() {
            return Err(ConfigError::NoBlacklist.into());
        }

        let env = Arc::new(Env {
            dir: raw.dir,
            ext: raw.extension,
            name_format: raw.name_format,
            timeout: Duration::from_secs(raw.timeout_seconds),
            jobs: raw.jobs,
            shell: raw.shell,
            dns_service: raw.dns_service,
            wildcard: raw.wildcard,
            debug: raw.debug,
        });

        let root_ip = raw
            .blacklist
            .as_ref()
            .and_then(|node| node.ip.clone())
            .unwrap_or_else(|| DEFAULT_IP.to_owned());

        let raw_nodes = [
            (Node::Root, raw.blacklist),
            (Node::Domains, raw.domains),
            (Node::Hosts, raw.hosts),
        ];

        // The whole whitelist must exist before any include list is
        // seeded, since excludes of one category shield every category.
        let excludes = EntrySet::new();
        for (_, raw_node) in &raw_nodes {
            if let Some(raw_node) = raw_node {
                for entry in &raw_node.exclude {
                    excludes.add(&normalize(entry));
                }
            }
        }

        let mut tree = Tree::new();
        for (node, raw_node) in raw_nodes {
            let Some(raw_node) = raw_node else { continue };
            let ip = raw_node.ip.clone().unwrap_or_else(|| root_ip.clone());

            tree.set_defaults(
                node,
                NodeDefaults {
                    ip: ip.clone(),
                    disabled: raw_node.disabled,
                    excludes: raw_node.exclude.iter().map(|e| normalize(e)).collect(),
                },
            );

            let include: Vec<String> = raw_node.include.iter().map(|e| normalize(e)).collect();
            let pre = Source::new(
                Arc::clone(&env),
                node,
                node.pre_label(),
                Origin::Inline(include.clone()),
            )
            .with_desc(format!(
                "pre-configured {}",
                node.pre_label().replace('-', " ")
            ))
            .with_ip(ip.clone())
            .with_disabled(raw_node.disabled);
            pre.seed(&include, &excludes);
            tree.add_source(node, Arc::new(pre))?;

            for raw_source in raw_node.source {
                let source = build_source(&env, node, &ip, raw_node.disabled, raw_source)?;
                tree.add_source(node, Arc::new(source))?;
            }
        }

        Ok(Self { env, tree })
    }

    #[must_use]
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Configured category names, in fixed category order.
    #[must_use]
    pub fn nodes(&self) -> Vec<&'static str> {
        self.tree.nodes()
    }

    /// Every source, in category order then declaration order.
    #[must_use]
    pub fn get_all(&self) -> Selection {
        Selection::new(Arc::clone(&self.env), self.tree.all_sources())
    }

    /// Every source matching one of the listing types.
    #[must_use]
    pub fn get_all_of(&self, ltypes: &[&str]) -> Selection {
        self.get_all().of_ltype(ltypes)
    }

    /// Sources of one category, or everything for [`ALL`]. Unknown names
    /// select nothing.
    #[must_use]
    pub fn get(&self, name: &str) -> Selection {
        if name == ALL {
            return self.get_all();
        }
        let sources = Node::from_name(name)
            .map(|node| self.tree.sources_of(node))
            .unwrap_or_default();
        Selection::new(Arc::clone(&self.env), sources)
    }

    /// Resolves every enabled source with bounded concurrency.
    ///
    /// Individual failures are recorded on their source; only failing to
    /// construct the HTTP client aborts the run.
    pub async fn resolve_all(&self) -> Result<ResolveSummary> {
        let fetcher = Fetcher::new(self.env.timeout)?;
        let excludes = Arc::new(self.tree.excludes());
        let sources = self.tree.all_sources();
        Ok(resolve::resolve_sources(&sources, &excludes, &fetcher, self.env.jobs).await)
    }
}

fn build_source(
    env: &Arc<Env>,
    node: Node,
    node_ip: &str,
    node_disabled: bool,
    raw: RawSource,
) -> Result<Source> {
    let origin = match (raw.url, raw.file) {
        (Some(url), None) => Origin::Url(url),
        (None, Some(file)) => Origin::File(PathBuf::from(file)),
        (Some(_), Some(_)) => {
            return Err(ConfigError::ConflictingOrigin {
                node,
                name: raw.name,
            }
            .into());
        }
        (None, None) => {
            return Err(ConfigError::MissingOrigin {
                node,
                name: raw.name,
            }
            .into());
        }
    };

    Ok(Source::new(Arc::clone(env), node, raw.name, origin)
        .with_desc(raw.description)
        .with_ip(raw.ip.unwrap_or_else(|| node_ip.to_owned()))
        .with_prefix(raw.prefix)
        .with_disabled(raw.disabled || node_disabled)
        .with_whitelist(raw.exclude.iter().map(|e| normalize(e)).collect()))
}

/// Canonical entry form: trimmed, stripped of stray dots, lowercased.
fn normalize(entry: &str) -> String {
    entry.trim().trim_matches('.').to_lowercase()
}
