//! Rendering and file management for resolved selections.
//!
//! A [`Selection`] is an ordered view over sources picked from the tree.
//! It renders the audit report, writes one dnsmasq file per source and
//! knows which files on disk belong to it, so stale leftovers from
//! removed sources can be purged.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::Env;
use crate::error::{Error, Result};
use crate::source::{Source, SourceKind};
use crate::tree::PRE_CONFIGURED;

/// An ordered set of sources selected from the tree.
#[derive(Debug, Clone)]
pub struct Selection {
    env: Arc<Env>,
    sources: Vec<Arc<Source>>,
}

impl Selection {
    pub(crate) fn new(env: Arc<Env>, sources: Vec<Arc<Source>>) -> Self {
        Self { env, sources }
    }

    #[must_use]
    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sorted names of the selected sources.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .iter()
            .map(|source| source.name().to_owned())
            .collect();
        names.sort_unstable();
        names
    }

    /// Narrows the selection to the given listing types.
    ///
    /// Accepts `url`, `file`, any category's pre-configured label, or
    /// [`PRE_CONFIGURED`] to match inline sources of every category.
    #[must_use]
    pub fn of_ltype(&self, ltypes: &[&str]) -> Self {
        let sources = self
            .sources
            .iter()
            .filter(|source| {
                ltypes.iter().any(|wanted| {
                    *wanted == source.ltype()
                        || (*wanted == PRE_CONFIGURED
                            && source.kind() == SourceKind::PreConfigured)
                })
            })
            .cloned()
            .collect();
        Self::new(Arc::clone(&self.env), sources)
    }

    /// The file paths this selection would write, sorted.
    #[must_use]
    pub fn files(&self) -> FileSet {
        let mut names: Vec<String> = self
            .sources
            .iter()
            .map(|source| source.file_path())
            .collect();
        names.sort_unstable();
        FileSet {
            env: Arc::clone(&self.env),
            names,
        }
    }

    /// Writes one dnsmasq file per active source.
    ///
    /// Disabled sources and sources whose resolution failed are skipped;
    /// everything else is written even when empty, so a feed that dried up
    /// stops blackholing. Returns the written paths.
    pub async fn save(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for source in &self.sources {
            if source.disabled() || source.failed() {
                tracing::debug!(name = ?source.name(), "skipping inactive source");
                continue;
            }
            let path = PathBuf::from(source.file_path());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.map_err(|err| Error::File {
                    path: parent.to_path_buf(),
                    source: err,
                })?;
            }
            let mut file = fs::File::create(&path).await.map_err(|err| Error::File {
                path: path.clone(),
                source: err,
            })?;
            file.write_all(source.conf_body().as_bytes())
                .await
                .map_err(|err| Error::File {
                    path: path.clone(),
                    source: err,
                })?;
            file.flush().await.map_err(|err| Error::File {
                path: path.clone(),
                source: err,
            })?;
            tracing::debug!(
                file = %path.display(),
                entries = source.entries().len(),
                "wrote blacklist file"
            );
            written.push(path);
        }
        Ok(written)
    }
}

impl fmt::Display for Selection {
    /// The audit report: every source block concatenated in selection
    /// order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for source in &self.sources {
            write!(f, "{source}")?;
        }
        Ok(())
    }
}

/// The sorted file paths belonging to a selection.
#[derive(Debug, Clone)]
pub struct FileSet {
    env: Arc<Env>,
    names: Vec<String>,
}

impl FileSet {
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Deletes every file of the set.
    ///
    /// Missing files are fine, so calling this twice is harmless. All
    /// files are attempted even when one fails; the first failure is
    /// reported afterwards.
    pub async fn remove(&self) -> Result<()> {
        let mut first_err: Option<Error> = None;
        for name in &self.names {
            let outcome = fs::remove_file(name).await;
            match outcome {
                Ok(()) => tracing::debug!(file = %name, "removed blacklist file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(file = %name, error = %err, "failed to remove blacklist file");
                    if first_err.is_none() {
                        first_err = Some(Error::File {
                            path: PathBuf::from(name),
                            source: err,
                        });
                    }
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Deletes generated blacklist files that no longer belong to the
    /// selection.
    ///
    /// Candidates are found with the configured wildcard pair, so only
    /// files following the naming template are ever touched. Returns the
    /// purged paths.
    pub async fn purge_stale(&self) -> Result<Vec<PathBuf>> {
        let pattern = self
            .env
            .format_path(&self.env.wildcard.node, &self.env.wildcard.name);
        let mut candidates: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(std::result::Result::ok)
            .collect();
        candidates.sort_unstable();

        let mut purged = Vec::new();
        let mut first_err: Option<Error> = None;
        for path in candidates {
            let name = path.display().to_string();
            if self.names.iter().any(|kept| *kept == name) {
                continue;
            }
            let outcome = fs::remove_file(&path).await;
            match outcome {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "purged stale blacklist file");
                    purged.push(path);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "failed to purge stale file");
                    if first_err.is_none() {
                        first_err = Some(Error::File { path, source: err });
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(purged),
        }
    }
}

impl fmt::Display for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join("\n"))
    }
}
