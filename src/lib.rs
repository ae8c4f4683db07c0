//! Blackhole - a DNS blackhole list generator for router appliances.
//!
//! Blackhole turns a router's blacklist configuration into dnsmasq
//! configuration files: remote feeds, local feed files and inline entries
//! are fetched concurrently, normalized, filtered against whitelists, and
//! written as one file per source with every entry redirected to a
//! configured address.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`]: Configuration loading and the runtime environment
//! - [`tree`]: The three-category source tree
//! - [`source`]: Individual feeds and their resolution
//! - [`entry`]: Concurrency-safe entry bookkeeping
//! - [`fetch`]: Feed retrieval over HTTP and the filesystem
//! - [`resolve`]: Bounded-concurrency resolution of all sources
//! - [`render`]: Audit reports, file writing and cleanup
//! - [`service`]: Session detection and DNS service reload
//! - [`error`]: Error types
//!
//! ```rust
//! use blackhole::Config;
//!
//! let config = Config::parse(r#"
//! dir = "/tmp/blackhole-doc"
//!
//! [domains]
//! ip = "192.168.100.1"
//! include = ["adsrvr.org"]
//! "#)?;
//!
//! assert_eq!(config.nodes(), vec!["domains"]);
//! assert!(config.get_all().to_string().contains("\"adsrvr.org\""));
//! # Ok::<(), blackhole::Error>(())
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod render;
pub mod resolve;
pub mod service;
pub mod source;
pub mod tree;

pub use config::{Config, Env};
pub use error::{Error, Result};
