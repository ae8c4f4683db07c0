//! Blacklist sources and their resolution.
//!
//! A [`Source`] is one feed of domains to blackhole: a remote URL, a local
//! file, or literal entries declared inline in the configuration. Resolution
//! turns the raw feed into normalized entries, filtered against the
//! whitelists, without ever mutating the source on a failed fetch.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Env;
use crate::entry::EntrySet;
use crate::fetch::{FetchError, Fetcher};
use crate::tree::{DEFAULT_IP, Node};

/// Placeholder for report fields with no configured value.
const UNDEFINED: &str = "**Undefined**";

/// Placeholder for empty entry listings.
const NO_ENTRIES: &str = "**No entries found**";

/// Where a source's raw lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Remote feed fetched over HTTP.
    Url(String),
    /// File read from the local filesystem.
    File(PathBuf),
    /// Literal lines declared inline in the configuration.
    Inline(Vec<String>),
}

/// Coarse origin kind, also used for selection filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Url,
    File,
    PreConfigured,
}

/// A single blacklist feed under one category of the tree.
#[derive(Debug)]
pub struct Source {
    env: Arc<Env>,
    node: Node,
    name: String,
    desc: String,
    origin: Origin,
    ip: String,
    prefix: String,
    disabled: bool,
    whitelist: Vec<String>,
    entries: EntrySet,
    err: RwLock<Option<FetchError>>,
}

impl Source {
    pub fn new(env: Arc<Env>, node: Node, name: impl Into<String>, origin: Origin) -> Self {
        Self {
            env,
            node,
            name: name.into(),
            desc: String::new(),
            origin,
            ip: DEFAULT_IP.to_owned(),
            prefix: String::new(),
            disabled: false,
            whitelist: Vec::new(),
            entries: EntrySet::new(),
            err: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Per-source whitelist entries, expected pre-normalized.
    #[must_use]
    pub fn with_whitelist(mut self, entries: Vec<String>) -> Self {
        self.whitelist = entries;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn node(&self) -> Node {
        self.node
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    #[must_use]
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self.origin {
            Origin::Url(_) => SourceKind::Url,
            Origin::File(_) => SourceKind::File,
            Origin::Inline(_) => SourceKind::PreConfigured,
        }
    }

    /// Listing type label: `url`, `file`, or the category's
    /// pre-configured label.
    #[must_use]
    pub fn ltype(&self) -> &'static str {
        match self.kind() {
            SourceKind::Url => "url",
            SourceKind::File => "file",
            SourceKind::PreConfigured => self.node.pre_label(),
        }
    }

    /// Resolved blacklist entries of this source.
    #[must_use]
    pub fn entries(&self) -> &EntrySet {
        &self.entries
    }

    /// Whether the last resolution attempt failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.err.read().is_some()
    }

    /// Rendered message of the recorded resolution error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.err.read().as_ref().map(ToString::to_string)
    }

    pub(crate) fn record_error(&self, err: FetchError) {
        *self.err.write() = Some(err);
    }

    /// Pre-populates the entry set from literal lines, applying the
    /// whitelist. Used for inline sources at load time.
    ///
    /// Blank lines are dropped, same as [`resolve`](Self::resolve) drops
    /// them, so an entry that normalizes to nothing never reaches the set.
    pub(crate) fn seed(&self, lines: &[String], excludes: &EntrySet) {
        for line in lines {
            if line.is_empty() || excludes.covers(line) {
                continue;
            }
            self.entries.add(line);
        }
    }

    /// Target path of this source's generated dnsmasq file.
    #[must_use]
    pub fn file_path(&self) -> String {
        self.env.format_path(self.node.area(), &self.name)
    }

    /// dnsmasq configuration body redirecting every entry to the
    /// source's IP.
    #[must_use]
    pub fn conf_body(&self) -> String {
        let mut body = String::new();
        for entry in self.entries.snapshot() {
            body.push_str("address=/");
            body.push_str(&entry);
            body.push('/');
            body.push_str(&self.ip);
            body.push('\n');
        }
        body
    }

    /// Fetches, parses and filters the feed, folding the surviving entries
    /// into the source's entry set.
    ///
    /// The raw feed is parsed completely before any entry lands in the set,
    /// so a failed fetch leaves the source untouched. Returns the number of
    /// feed lines retained.
    pub async fn resolve(
        &self,
        excludes: &Arc<EntrySet>,
        fetcher: &Fetcher,
    ) -> Result<usize, FetchError> {
        let raw = fetcher.fetch_raw(&self.origin).await?;
        let prefix = self.prefix.clone();
        let local = EntrySet::from_entries(&self.whitelist);
        let excludes = Arc::clone(excludes);
        let survivors =
            tokio::task::spawn_blocking(move || parse_feed(&raw, &prefix, &excludes, &local))
                .await?;
        let kept = survivors.len();
        for entry in &survivors {
            self.entries.add(entry);
        }
        tracing::debug!(name = ?self.name, node = %self.node, kept, "parsed feed");
        Ok(kept)
    }
}

/// Extracts usable entries from a raw feed body.
///
/// Lines are trimmed and lowercased. Comment lines (`#`, `//`, `<`) and
/// lines missing the source prefix are dropped. The first whitespace token
/// after the prefix is kept, URL remnants are reduced to their host part,
/// and anything covered by a whitelist is skipped.
fn parse_feed(raw: &str, prefix: &str, excludes: &EntrySet, local: &EntrySet) -> Vec<String> {
    let mut entries = Vec::new();
    for line in raw.lines() {
        let line = line.trim().to_lowercase();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("//")
            || line.starts_with('<')
        {
            continue;
        }
        let Some(rest) = line.strip_prefix(prefix) else {
            continue;
        };
        let Some(token) = rest.split_whitespace().next() else {
            continue;
        };
        // Feed lines may be full URLs; keep the host part.
        let token = token.trim_start_matches("s://").trim_start_matches("://");
        let token = token.split('/').next().unwrap_or(token);
        let entry = token.trim_matches(|c: char| !c.is_alphanumeric());
        if entry.is_empty() || excludes.covers(entry) || local.covers(entry) {
            continue;
        }
        entries.push(entry.to_owned());
    }
    entries
}

impl fmt::Display for Source {
    /// Renders the audit report block for this source.
    ///
    /// Every line ends with a newline and the block opens with one, so
    /// concatenated blocks come out separated by a blank line. Values are
    /// quote-escaped; empty fields show as `**Undefined**`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = match &self.origin {
            Origin::File(path) => path.display().to_string(),
            _ => String::new(),
        };
        let url = match &self.origin {
            Origin::Url(url) => url.clone(),
            _ => String::new(),
        };

        writeln!(f)?;
        field(f, "Desc:", &self.desc)?;
        field(f, "Disabled:", if self.disabled { "true" } else { "false" })?;
        field(f, "File:", &file)?;
        field(f, "IP:", &self.ip)?;
        field(f, "Ltype:", self.ltype())?;
        field(f, "Name:", &self.name)?;
        field(f, "nType:", self.ntype_label())?;
        field(f, "Prefix:", &self.prefix)?;
        field(f, "Type:", self.type_label())?;
        field(f, "URL:", &url)?;

        writeln!(f, "Whitelist:")?;
        let mut whitelist = self.whitelist.clone();
        whitelist.sort_unstable();
        listing(f, &whitelist)?;
        writeln!(f, "Blacklist:")?;
        listing(f, &self.entries.snapshot())
    }
}

impl Source {
    fn ntype_label(&self) -> &'static str {
        match (self.node, self.kind()) {
            (Node::Root, SourceKind::PreConfigured) => "preRoot",
            (Node::Domains, SourceKind::PreConfigured) => "preDomn",
            (Node::Hosts, SourceKind::PreConfigured) => "preHost",
            (Node::Root, _) => "root",
            (Node::Domains, _) => "domn",
            (Node::Hosts, _) => "host",
        }
    }

    fn type_label(&self) -> &'static str {
        match self.kind() {
            SourceKind::PreConfigured => self.node.pre_label(),
            _ => self.node.as_str(),
        }
    }
}

fn field(f: &mut fmt::Formatter<'_>, label: &str, value: &str) -> fmt::Result {
    let shown = if value.is_empty() { UNDEFINED } else { value };
    writeln!(f, "{label:<14}{shown:?}")
}

fn listing(f: &mut fmt::Formatter<'_>, entries: &[String]) -> fmt::Result {
    if entries.is_empty() {
        return writeln!(f, "{:<14}{NO_ENTRIES:?}", "");
    }
    for entry in entries {
        writeln!(f, "{:<14}{entry:?}", "")?;
    }
    Ok(())
}
