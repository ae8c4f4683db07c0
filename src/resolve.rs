//! Concurrent source resolution.
//!
//! Sources are fetched and parsed through a bounded fan-out. A failed
//! source is recorded on the source itself and never interrupts the rest
//! of the run.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::entry::EntrySet;
use crate::fetch::{FetchError, Fetcher};
use crate::source::Source;

/// Outcome counters of one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Sources that resolved successfully.
    pub resolved: usize,
    /// Sources that failed and had their error recorded.
    pub failed: usize,
    /// Sources skipped because they are disabled.
    pub skipped: usize,
    /// Total feed lines retained across all resolved sources.
    pub entries: usize,
}

/// Resolves every enabled source, at most `jobs` in flight at once.
///
/// The exclude set must be fully built before this is called; it is shared
/// read-only across all in-flight resolutions.
pub async fn resolve_sources(
    sources: &[Arc<Source>],
    excludes: &Arc<EntrySet>,
    fetcher: &Fetcher,
    jobs: usize,
) -> ResolveSummary {
    let mut summary = ResolveSummary::default();

    let (enabled, disabled): (Vec<&Arc<Source>>, Vec<&Arc<Source>>) =
        sources.iter().partition(|source| !source.disabled());
    for source in disabled {
        tracing::debug!(name = ?source.name(), node = %source.node(), "skipping disabled source");
        summary.skipped += 1;
    }

    let tasks = enabled.into_iter().map(|source| {
        let source = Arc::clone(source);
        let excludes = Arc::clone(excludes);
        async move {
            let outcome = source.resolve(&excludes, fetcher).await;
            (source, outcome)
        }
    });

    let outcomes: Vec<(Arc<Source>, Result<usize, FetchError>)> = stream::iter(tasks)
        .buffer_unordered(jobs.max(1))
        .collect()
        .await;

    for (source, outcome) in outcomes {
        match outcome {
            Ok(kept) => {
                tracing::info!(
                    name = ?source.name(),
                    node = %source.node(),
                    kept,
                    "resolved source"
                );
                summary.resolved += 1;
                summary.entries += kept;
            }
            Err(err) => {
                tracing::error!(
                    name = ?source.name(),
                    node = %source.node(),
                    error = %err,
                    "failed to resolve source"
                );
                source.record_error(err);
                summary.failed += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::Env;
    use crate::source::Origin;
    use crate::tree::Node;

    fn env() -> Arc<Env> {
        Arc::new(Env::default())
    }

    #[tokio::test]
    async fn should_resolve_sources_and_isolate_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("ads.example.com\ntracker.net\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bad.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let good = Arc::new(Source::new(
            env(),
            Node::Domains,
            "good",
            Origin::Url(format!("{}/good.txt", server.uri())),
        ));
        let bad = Arc::new(Source::new(
            env(),
            Node::Domains,
            "bad",
            Origin::Url(format!("{}/bad.txt", server.uri())),
        ));
        let sources = vec![Arc::clone(&good), Arc::clone(&bad)];
        let excludes = Arc::new(EntrySet::new());
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let summary = resolve_sources(&sources, &excludes, &fetcher, 4).await;

        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.entries, 2);
        assert_eq!(
            good.entries().snapshot(),
            vec!["ads.example.com", "tracker.net"]
        );
        assert!(bad.entries().is_empty());
        assert!(bad.failed());
        assert!(bad.last_error().unwrap().contains("status 500"));
        assert!(!good.failed());
    }

    #[tokio::test]
    async fn should_skip_disabled_sources() {
        let disabled = Arc::new(
            Source::new(
                env(),
                Node::Hosts,
                "off",
                Origin::Url("http://127.0.0.1:1/never".to_owned()),
            )
            .with_disabled(true),
        );
        let sources = vec![Arc::clone(&disabled)];
        let excludes = Arc::new(EntrySet::new());
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let summary = resolve_sources(&sources, &excludes, &fetcher, 4).await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.failed, 0);
        assert!(!disabled.failed());
    }

    #[tokio::test]
    async fn should_apply_shared_excludes_to_every_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("ads.example.com\nimg.ytimg.com\nytimg.com\n"),
            )
            .mount(&server)
            .await;

        let source = Arc::new(Source::new(
            env(),
            Node::Domains,
            "feed",
            Origin::Url(format!("{}/feed.txt", server.uri())),
        ));
        let sources = vec![Arc::clone(&source)];
        let excludes = Arc::new(EntrySet::from_entries(["ytimg.com"]));
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let summary = resolve_sources(&sources, &excludes, &fetcher, 1).await;

        assert_eq!(summary.entries, 1);
        assert_eq!(source.entries().snapshot(), vec!["ads.example.com"]);
    }

    #[tokio::test]
    async fn should_resolve_many_sources_with_small_fan_out() {
        let server = MockServer::start().await;
        for index in 0..6 {
            Mock::given(method("GET"))
                .and(path(format!("/feed{index}.txt")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(format!("host{index}.example\n")),
                )
                .mount(&server)
                .await;
        }

        let sources: Vec<Arc<Source>> = (0..6)
            .map(|index| {
                Arc::new(Source::new(
                    env(),
                    Node::Hosts,
                    format!("feed{index}"),
                    Origin::Url(format!("{}/feed{index}.txt", server.uri())),
                ))
            })
            .collect();
        let excludes = Arc::new(EntrySet::new());
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let summary = resolve_sources(&sources, &excludes, &fetcher, 2).await;

        assert_eq!(summary.resolved, 6);
        assert_eq!(summary.entries, 6);
        for (index, source) in sources.iter().enumerate() {
            assert!(source.entries().contains(&format!("host{index}.example")));
        }
    }
}
