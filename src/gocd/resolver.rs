//! Turns configured pipeline names into a fully materialized dependency graph.
//!
//! One `Resolver` serves one resolution pass: the request cache and the
//! pipeline memo table are dropped with it. Histories for every requested
//! pipeline are issued up front, instances are fetched through the cache, and
//! upstream pipeline materials are resolved recursively with memoization so a
//! diamond dependency maps to a single shared instance.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use log::info;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{GoCdConfig, GroupConfig};
use crate::error::{GoDashError, Result};

use super::cache::{PendingResponse, RequestCache};
use super::client::GoCdClient;
use super::model::{Group, Pipeline, PipelineMaterial};
use super::parse;
use super::types::{HistoryDoc, InstanceDoc};

type InstanceKey = (String, u32);
type SharedPipeline = Shared<BoxFuture<'static, Result<Arc<Pipeline>>>>;

/// Resolves groups of named pipelines against one GoCD server.
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    client: GoCdClient,
    /// Captured once so every pipeline can format links without touching the
    /// client again.
    server: Arc<str>,
    requests: RequestCache,
    /// Memo table: at most one resolution per `(name, counter)` per pass.
    pipelines: Mutex<HashMap<InstanceKey, SharedPipeline>>,
}

impl Resolver {
    pub fn new(config: &GoCdConfig) -> Result<Self> {
        let client = GoCdClient::new(&config.server, &config.username, &config.password)?;
        let server = Arc::from(client.server());

        Ok(Self {
            inner: Arc::new(ResolverInner {
                client,
                server,
                requests: RequestCache::new(),
                pipelines: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Runs one resolution pass over the configured groups.
    ///
    /// Group and pipeline order in the result mirrors the configuration,
    /// never request completion order. Any transport, parse, or cycle error
    /// fails the whole pass; a dashboard must not silently show partial
    /// health.
    pub async fn resolve_groups(&self, groups: &[GroupConfig]) -> Result<Vec<Group>> {
        let requested: usize = groups.iter().map(|g| g.pipelines.len()).sum();
        info!("Resolving {requested} pipeline(s) across {} group(s)", groups.len());

        // Fan out: issue every history request before awaiting any of them.
        let mut histories: Vec<(String, String, PendingResponse)> = Vec::with_capacity(requested);
        for group in groups {
            for name in &group.pipelines {
                let url = self.inner.client.history_url(name);
                let pending = self.inner.requests.get_or_fetch(&self.inner.client, url.clone());
                histories.push((name.clone(), url, pending));
            }
        }

        let resolved = join_all(histories.into_iter().map(|(name, url, pending)| {
            let inner = Arc::clone(&self.inner);
            async move {
                let body = pending.await?;
                let history: HistoryDoc = decode(&body, &url)?;
                let counter = parse::latest_counter(&name, &history)?;
                ResolverInner::instance(inner, name, counter, HashSet::new()).await
            }
        }))
        .await;

        let mut resolved = resolved.into_iter();
        let mut result = Vec::with_capacity(groups.len());
        for group in groups {
            let mut pipelines = Vec::with_capacity(group.pipelines.len());
            for _ in &group.pipelines {
                let pipeline = resolved
                    .next()
                    .expect("one resolution per requested pipeline")?;
                pipelines.push(pipeline);
            }
            result.push(Group {
                name: group.name.clone(),
                pipelines,
            });
        }

        Ok(result)
    }
}

impl ResolverInner {
    /// Resolves `(name, counter)`, reusing the memoized in-flight or
    /// completed resolution when one exists.
    ///
    /// `ancestors` holds the keys on the current resolution path; re-entering
    /// one of them means the material graph is cyclic, which is fatal rather
    /// than something to wait out (awaiting our own memo entry would never
    /// complete).
    fn instance(
        inner: Arc<ResolverInner>,
        name: String,
        counter: u32,
        ancestors: HashSet<InstanceKey>,
    ) -> BoxFuture<'static, Result<Arc<Pipeline>>> {
        async move {
            let key = (name.clone(), counter);
            if ancestors.contains(&key) {
                return Err(GoDashError::Cycle { name, counter });
            }

            let pending = {
                let mut memo = inner.pipelines.lock().expect("pipeline memo lock poisoned");
                memo.entry(key)
                    .or_insert_with(|| {
                        Self::fetch_instance(Arc::clone(&inner), name, counter, ancestors)
                            .boxed()
                            .shared()
                    })
                    .clone()
            };

            pending.await
        }
        .boxed()
    }

    async fn fetch_instance(
        inner: Arc<ResolverInner>,
        name: String,
        counter: u32,
        mut ancestors: HashSet<InstanceKey>,
    ) -> Result<Arc<Pipeline>> {
        ancestors.insert((name.clone(), counter));

        let url = inner.client.instance_url(&name, counter);
        let body = inner.requests.get_or_fetch(&inner.client, url.clone()).await?;
        let doc: InstanceDoc = decode(&body, &url)?;

        let stages = doc.stages.iter().map(parse::stage).collect();
        let (git_materials, stubs) =
            parse::partition_revisions(&doc.build_cause.material_revisions)?;

        // Upstream materials of one pipeline resolve concurrently; the memo
        // table collapses upstreams shared across the graph to one fetch.
        let upstreams = join_all(stubs.iter().map(|stub| {
            Self::instance(
                Arc::clone(&inner),
                stub.name.clone(),
                stub.counter,
                ancestors.clone(),
            )
        }))
        .await;

        let mut pipeline_materials = stubs
            .into_iter()
            .zip(upstreams)
            .map(|(stub, upstream)| {
                Ok(PipelineMaterial {
                    name: stub.name,
                    counter: stub.counter,
                    changed: stub.changed,
                    upstream: upstream?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Stable order for traversal and display, independent of the order
        // the API returned revisions.
        pipeline_materials.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Arc::new(Pipeline {
            name: doc.name,
            counter: doc.counter,
            stages,
            git_materials,
            pipeline_materials,
            server: Arc::clone(&inner.server),
        }))
    }
}

fn decode<T: DeserializeOwned>(body: &Value, url: &str) -> Result<T> {
    serde_json::from_value(body.clone())
        .map_err(|e| GoDashError::Parse(format!("unexpected document shape from {url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gocd::model::{PipelineStatus, StageStatus};
    use mockito::{Mock, ServerGuard};

    fn config(server: &ServerGuard) -> GoCdConfig {
        GoCdConfig {
            server: server.url(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    fn group(name: &str, pipelines: &[&str]) -> GroupConfig {
        GroupConfig {
            name: name.to_string(),
            pipelines: pipelines.iter().map(ToString::to_string).collect(),
        }
    }

    async fn mock_history(server: &mut ServerGuard, name: &str, counter: u32) -> Mock {
        server
            .mock("GET", format!("/go/api/pipelines/{name}/history.json").as_str())
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"pipelines": [{{"counter": {counter}}}]}}"#))
            .expect(1)
            .create_async()
            .await
    }

    async fn mock_instance(
        server: &mut ServerGuard,
        name: &str,
        counter: u32,
        stages: &str,
        revisions: &str,
    ) -> Mock {
        server
            .mock(
                "GET",
                format!("/go/api/pipelines/{name}/instance/{counter}.json").as_str(),
            )
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{
                    "name": "{name}",
                    "counter": {counter},
                    "stages": [{stages}],
                    "build_cause": {{"material_revisions": [{revisions}]}}
                }}"#
            ))
            .expect(1)
            .create_async()
            .await
    }

    fn git_revision(url: &str) -> String {
        format!(
            r#"{{
                "material": {{"type": "Git", "description": "URL: {url}, Branch: main"}},
                "changed": true,
                "modifications": [{{
                    "revision": "abc123",
                    "comment": "fix bug",
                    "user_name": "Jane Doe <jane@example.com>"
                }}]
            }}"#
        )
    }

    fn pipeline_revision(name: &str, counter: u32, changed: bool) -> String {
        format!(
            r#"{{
                "material": {{"type": "Pipeline", "description": "{name}"}},
                "changed": {changed},
                "modifications": [{{"revision": "{name}/{counter}/build/1"}}]
            }}"#
        )
    }

    #[tokio::test]
    async fn resolves_a_failed_pipeline_with_a_github_material() {
        let mut server = mockito::Server::new_async().await;
        mock_history(&mut server, "app", 42).await;
        mock_instance(
            &mut server,
            "app",
            42,
            r#"{"name": "build", "counter": 1, "result": "Passed"},
               {"name": "test", "counter": 1, "result": "Failed"}"#,
            &git_revision("git@github.com:acme/widgets.git"),
        )
        .await;

        let resolver = Resolver::new(&config(&server)).unwrap();
        let groups = resolver
            .resolve_groups(&[group("main", &["app"])])
            .await
            .unwrap();

        assert_eq!(groups.len(), 1);
        let pipeline = &groups[0].pipelines[0];
        assert_eq!(pipeline.name, "app");
        assert_eq!(pipeline.counter, 42);
        assert_eq!(pipeline.result(), PipelineStatus::Failed);
        assert_eq!(pipeline.failed_stage().unwrap().name, "test");

        let material = &pipeline.git_materials[0];
        let github = material.github.as_ref().unwrap();
        assert_eq!(github.org, "acme");
        assert_eq!(github.repo, "widgets");
        assert_eq!(
            material.modifications[0].author_email.as_deref(),
            Some("jane@example.com")
        );
    }

    #[tokio::test]
    async fn diamond_dependency_resolves_to_one_shared_instance() {
        let mut server = mockito::Server::new_async().await;
        mock_history(&mut server, "left", 3).await;
        mock_history(&mut server, "right", 5).await;
        mock_instance(
            &mut server,
            "left",
            3,
            r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
            &pipeline_revision("base", 7, true),
        )
        .await;
        mock_instance(
            &mut server,
            "right",
            5,
            r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
            &pipeline_revision("base", 7, true),
        )
        .await;
        // expect(1): the shared upstream must be fetched exactly once.
        let base = mock_instance(
            &mut server,
            "base",
            7,
            r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
            &git_revision("git@github.com:acme/base.git"),
        )
        .await;

        let resolver = Resolver::new(&config(&server)).unwrap();
        let groups = resolver
            .resolve_groups(&[group("main", &["left", "right"])])
            .await
            .unwrap();

        let left = &groups[0].pipelines[0];
        let right = &groups[0].pipelines[1];
        assert!(Arc::ptr_eq(
            &left.pipeline_materials[0].upstream,
            &right.pipeline_materials[0].upstream
        ));
        base.assert_async().await;
    }

    #[tokio::test]
    async fn pipeline_materials_are_sorted_by_name() {
        let mut server = mockito::Server::new_async().await;
        mock_history(&mut server, "app", 1).await;
        let revisions = format!(
            "{}, {}",
            pipeline_revision("zeta", 2, false),
            pipeline_revision("alpha", 4, false)
        );
        mock_instance(
            &mut server,
            "app",
            1,
            r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
            &revisions,
        )
        .await;
        for (name, counter) in [("zeta", 2), ("alpha", 4)] {
            mock_instance(
                &mut server,
                name,
                counter,
                r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
                "",
            )
            .await;
        }

        let resolver = Resolver::new(&config(&server)).unwrap();
        let groups = resolver
            .resolve_groups(&[group("main", &["app"])])
            .await
            .unwrap();

        let names: Vec<_> = groups[0].pipelines[0]
            .pipeline_materials
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn upstream_stages_feed_status_aggregation() {
        let mut server = mockito::Server::new_async().await;
        mock_history(&mut server, "app", 2).await;
        mock_instance(
            &mut server,
            "app",
            2,
            r#"{"name": "build", "counter": 1, "result": "Unknown"}"#,
            &pipeline_revision("base", 1, true),
        )
        .await;
        mock_instance(
            &mut server,
            "base",
            1,
            r#"{"name": "build", "counter": 1, "result": "Failed"}"#,
            "",
        )
        .await;

        let resolver = Resolver::new(&config(&server)).unwrap();
        let groups = resolver
            .resolve_groups(&[group("main", &["app"])])
            .await
            .unwrap();

        let pipeline = &groups[0].pipelines[0];
        assert_eq!(pipeline.result(), PipelineStatus::Running);
        assert_eq!(
            pipeline.running_stage().unwrap().status(),
            StageStatus::Running
        );
        assert_eq!(
            pipeline.pipeline_materials[0].upstream.result(),
            PipelineStatus::Failed
        );
    }

    #[tokio::test]
    async fn a_material_cycle_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        mock_history(&mut server, "a", 1).await;
        mock_instance(
            &mut server,
            "a",
            1,
            r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
            &pipeline_revision("b", 1, true),
        )
        .await;
        mock_instance(
            &mut server,
            "b",
            1,
            r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
            &pipeline_revision("a", 1, true),
        )
        .await;

        let resolver = Resolver::new(&config(&server)).unwrap();
        let err = resolver
            .resolve_groups(&[group("main", &["a"])])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GoDashError::Cycle {
                name: "a".to_string(),
                counter: 1
            }
        );
    }

    #[tokio::test]
    async fn a_failed_history_request_fails_the_pass() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/go/api/pipelines/app/history.json")
            .with_status(500)
            .create_async()
            .await;

        let resolver = Resolver::new(&config(&server)).unwrap();
        let err = resolver
            .resolve_groups(&[group("main", &["app"])])
            .await
            .unwrap_err();

        assert!(matches!(err, GoDashError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn unknown_material_types_fail_the_pass() {
        let mut server = mockito::Server::new_async().await;
        mock_history(&mut server, "app", 1).await;
        mock_instance(
            &mut server,
            "app",
            1,
            r#"{"name": "build", "counter": 1, "result": "Passed"}"#,
            r#"{"material": {"type": "Tfs", "description": "x"}, "modifications": []}"#,
        )
        .await;

        let resolver = Resolver::new(&config(&server)).unwrap();
        let err = resolver
            .resolve_groups(&[group("main", &["app"])])
            .await
            .unwrap_err();

        assert!(matches!(err, GoDashError::Parse(_)));
    }
}
