//! Transitive closure over the dependent-service graph
//!
//! Built from repeated single-level dependent queries. Names are compared
//! case-insensitively when detecting revisits, as the SCM does.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::ServiceControl;
use crate::error::{ErrorReport, ScmResult};
use crate::manager::ServiceManager;
use crate::models::{DesiredState, Service};

/// A service reached while walking dependents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentNode {
    /// 1 for direct dependents of the root
    pub depth: usize,
    /// The service this one was discovered under
    pub parent: String,
    pub service: Service,
}

/// A nested query that failed; the walk continued without it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkError {
    pub service: String,
    #[serde(flatten)]
    pub error: ErrorReport,
}

/// Every service that transitively depends on `root`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyClosure {
    pub root: String,
    pub dependents: BTreeMap<String, DependentNode>,
    pub errors: Vec<WalkError>,
    /// The depth limit stopped the walk while services at the last level
    /// still had unvisited dependents
    pub truncated: bool,
}

impl DependencyClosure {
    fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            dependents: BTreeMap::new(),
            errors: Vec::new(),
            truncated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    /// Names discovered at exactly `depth`
    pub fn at_depth(&self, depth: usize) -> Vec<&str> {
        self.dependents
            .iter()
            .filter(|(_, node)| node.depth == depth)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Record newly seen dependents of `parent`, returning the names to expand next
    fn absorb(
        &mut self,
        visited: &mut HashSet<String>,
        parent: &str,
        depth: usize,
        found: impl IntoIterator<Item = Service>,
    ) -> Vec<String> {
        let mut fresh = Vec::new();
        for service in found {
            if !visited.insert(service.name.to_lowercase()) {
                debug!(service = %service.name, parent, "already visited");
                continue;
            }
            fresh.push(service.name.clone());
            self.dependents.insert(
                service.name.clone(),
                DependentNode {
                    depth,
                    parent: parent.to_string(),
                    service,
                },
            );
        }
        fresh
    }
}

impl<B: ServiceControl> ServiceManager<B> {
    /// Breadth-first walk of everything depending on `root`.
    ///
    /// The root query failing fails the walk. A nested query failing is
    /// recorded in [`DependencyClosure::errors`] and its subtree skipped.
    /// `max_depth` defaults to the configured limit; a value below 1 is
    /// treated as 1.
    pub async fn walk_dependents(
        &self,
        root: &str,
        state: DesiredState,
        max_depth: Option<usize>,
    ) -> ScmResult<DependencyClosure> {
        let max_depth = max_depth.unwrap_or(self.config().max_depth).max(1);
        let direct = self.enum_dependent_services(root, state)?.await?;

        let mut closure = DependencyClosure::new(root);
        let mut visited = HashSet::from([root.to_lowercase()]);
        let mut frontier = closure.absorb(&mut visited, root, 1, direct.into_values());
        let mut depth = 1;

        while !frontier.is_empty() {
            if depth >= max_depth {
                closure.truncated = self.has_unseen_dependents(&frontier, state, &visited).await;
                break;
            }
            depth += 1;

            let queries: Vec<_> = frontier
                .into_iter()
                .map(|name| {
                    let pending = self.enum_dependent_services(&name, state);
                    (name, pending)
                })
                .collect();

            let mut next = Vec::new();
            for (parent, pending) in queries {
                let result = match pending {
                    Ok(pending) => pending.await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(found) => {
                        next.extend(closure.absorb(&mut visited, &parent, depth, found.into_values()))
                    }
                    Err(e) => {
                        warn!(service = %parent, error = %e, "skipping dependents");
                        closure.errors.push(WalkError {
                            service: parent,
                            error: ErrorReport::from(&e),
                        });
                    }
                }
            }
            frontier = next;
        }

        Ok(closure)
    }

    /// Whether any frontier service has a dependent not yet visited. A
    /// failed query counts as one, since the subtree cannot be ruled out.
    async fn has_unseen_dependents(
        &self,
        frontier: &[String],
        state: DesiredState,
        visited: &HashSet<String>,
    ) -> bool {
        let queries: Vec<_> = frontier
            .iter()
            .map(|name| self.enum_dependent_services(name, state))
            .collect();

        let mut unseen = false;
        for pending in queries {
            let result = match pending {
                Ok(pending) => pending.await,
                Err(e) => Err(e),
            };
            match result {
                Ok(found) => {
                    unseen |= found.keys().any(|name| !visited.contains(&name.to_lowercase()));
                }
                Err(e) => {
                    debug!(error = %e, "dependents past the depth limit unknown");
                    unseen = true;
                }
            }
        }
        unseen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::error::ErrorKind;
    use crate::manager::tests::FakeScm;

    fn manager(fake: FakeScm) -> ServiceManager<FakeScm> {
        ServiceManager::new(fake, ManagerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_walks_transitively() {
        let mgr = manager(FakeScm::with_graph(&[
            ("RpcSs", "a,b"),
            ("a", "c"),
            ("b", ""),
            ("c", ""),
        ]));
        let closure = mgr
            .walk_dependents("RpcSs", DesiredState::All, None)
            .await
            .unwrap();

        assert_eq!(closure.len(), 3);
        assert_eq!(closure.at_depth(1), vec!["a", "b"]);
        assert_eq!(closure.at_depth(2), vec!["c"]);
        assert_eq!(closure.dependents["c"].parent, "a");
        assert!(!closure.truncated);
        assert!(closure.errors.is_empty());
        for (key, node) in &closure.dependents {
            assert_eq!(key, &node.service.name);
        }
    }

    #[tokio::test]
    async fn test_cycles_are_visited_once() {
        let mgr = manager(FakeScm::with_graph(&[
            ("a", "b"),
            ("b", "c,A"),
            ("c", "b,a"),
        ]));
        let closure = mgr.walk_dependents("a", DesiredState::All, None).await.unwrap();

        assert_eq!(closure.len(), 2);
        assert!(!closure.dependents.contains_key("a"));
        assert!(!closure.dependents.contains_key("A"));
        // root, b and c are each queried exactly once
        assert_eq!(mgr.backend().seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_depth_limit_truncates() {
        let mgr = manager(FakeScm::with_graph(&[
            ("a", "b"),
            ("b", "c"),
            ("c", "d"),
            ("d", ""),
        ]));
        let closure = mgr
            .walk_dependents("a", DesiredState::All, Some(2))
            .await
            .unwrap();
        assert_eq!(closure.len(), 2);
        assert!(closure.truncated);
        assert!(!closure.dependents.contains_key("d"));
    }

    #[tokio::test]
    async fn test_depth_limit_on_last_level_is_not_truncated() {
        let mgr = manager(FakeScm::with_graph(&[("a", "b"), ("b", "")]));
        let closure = mgr
            .walk_dependents("a", DesiredState::All, Some(1))
            .await
            .unwrap();
        assert_eq!(closure.len(), 1);
        assert!(!closure.truncated);

        // b only points back at visited services
        let mgr = manager(FakeScm::with_graph(&[("a", "b"), ("b", "A")]));
        let closure = mgr
            .walk_dependents("a", DesiredState::All, Some(1))
            .await
            .unwrap();
        assert_eq!(closure.len(), 1);
        assert!(!closure.truncated);
    }

    #[tokio::test]
    async fn test_nested_failure_is_recorded() {
        let mut fake = FakeScm::with_graph(&[("a", "b,c"), ("b", "x"), ("c", "")]);
        fake.denied = vec!["b".to_string()];
        let mgr = manager(fake);

        let closure = mgr.walk_dependents("a", DesiredState::All, None).await.unwrap();
        assert_eq!(closure.len(), 2);
        assert_eq!(closure.errors.len(), 1);
        assert_eq!(closure.errors[0].service, "b");
        assert_eq!(closure.errors[0].error.kind, ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_root_failure_fails_walk() {
        let mgr = manager(FakeScm::with_graph(&[("a", "")]));
        let err = mgr
            .walk_dependents("missing", DesiredState::All, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceNotFound);
    }
}
