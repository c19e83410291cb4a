//! Host build collaborator interface.
//!
//! Different hosts expose "who imported this module" in different shapes:
//! some hand out modules carrying a direct issuer back-reference, others only
//! answer through a graph query. Both are wrapped behind [`IssuerLookup`] and
//! the host picks its shape once, before the first event is delivered.
//!
//! ## Adapters
//! - `stats.rs` — replays a bundler stats JSON file (graph query shape).
//! - `trace.rs` — spawns a host command emitting a line-oriented event trace
//!   (direct back-reference shape).

pub mod stats;
pub mod trace;

pub use stats::StatsReplayHost;
pub use trace::TraceCommandHost;

use crate::domain::models::{HostError, ModuleNode};
use std::sync::Arc;

/// Lifecycle events a host emits while walking its module graph.
#[derive(Debug, Clone)]
pub enum HostEvent {
    BeforeRun,
    ModuleVisited(Arc<ModuleNode>),
    Done,
}

pub type SharedIssuerLookup = Arc<dyn IssuerLookup<Arc<ModuleNode>> + Send + Sync>;

#[allow(async_fn_in_trait)]
pub trait BuildHost {
    /// Issuer lookup used for the whole session.
    fn issuer_lookup(&self) -> SharedIssuerLookup;

    /// Next lifecycle event, `None` once the host has nothing more to say.
    async fn next_event(&mut self) -> Result<Option<HostEvent>, HostError>;

    /// Stops the host early (halt on match, interrupt).
    async fn abort(&mut self);

    /// Waits for the host to wind down and reports whether it succeeded.
    async fn finish(&mut self) -> Result<(), HostError>;
}

pub trait HostModule {
    fn identifier(&self) -> &str;
    fn resource(&self) -> Option<&str>;
}

impl HostModule for ModuleNode {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }
}

impl<T: HostModule + ?Sized> HostModule for Arc<T> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn resource(&self) -> Option<&str> {
        (**self).resource()
    }
}

pub trait IssuerLookup<M> {
    fn issuer(&self, module: &M) -> Option<M>;
}

/// Follows the issuer back-reference stored on the module itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectIssuer;

impl IssuerLookup<Arc<ModuleNode>> for DirectIssuer {
    fn issuer(&self, module: &Arc<ModuleNode>) -> Option<Arc<ModuleNode>> {
        module.issuer.as_ref().and_then(|w| w.upgrade())
    }
}

pub trait ModuleGraph {
    fn issuer_of(&self, identifier: &str) -> Option<Arc<ModuleNode>>;
}

/// Asks a module graph for the issuer instead of trusting the module.
pub struct GraphQuery<G> {
    graph: Arc<G>,
}

impl<G: ModuleGraph> GraphQuery<G> {
    pub fn new(graph: Arc<G>) -> Self {
        Self { graph }
    }
}

impl<G: ModuleGraph> IssuerLookup<Arc<ModuleNode>> for GraphQuery<G> {
    fn issuer(&self, module: &Arc<ModuleNode>) -> Option<Arc<ModuleNode>> {
        self.graph.issuer_of(&module.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectIssuer, GraphQuery, IssuerLookup, ModuleGraph};
    use crate::domain::models::ModuleNode;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FixedGraph {
        nodes: HashMap<String, Arc<ModuleNode>>,
        issuers: HashMap<String, String>,
    }

    impl ModuleGraph for FixedGraph {
        fn issuer_of(&self, identifier: &str) -> Option<Arc<ModuleNode>> {
            self.issuers
                .get(identifier)
                .and_then(|i| self.nodes.get(i))
                .cloned()
        }
    }

    #[test]
    fn direct_issuer_follows_back_reference() {
        let root = ModuleNode::root("./a", Some("a.js".into()));
        let child = ModuleNode::issued_by("./b", Some("b.js".into()), &root);
        let issuer = DirectIssuer.issuer(&child).expect("issuer");
        assert!(Arc::ptr_eq(&issuer, &root));
        assert!(DirectIssuer.issuer(&root).is_none());
    }

    #[test]
    fn graph_query_ignores_module_back_reference() {
        let a = ModuleNode::root("./a", Some("a.js".into()));
        let b = ModuleNode::root("./b", Some("b.js".into()));
        let graph = FixedGraph {
            nodes: HashMap::from([("./a".into(), a.clone()), ("./b".into(), b.clone())]),
            issuers: HashMap::from([("./b".into(), "./a".into())]),
        };
        let lookup = GraphQuery::new(Arc::new(graph));
        assert!(Arc::ptr_eq(&lookup.issuer(&b).expect("issuer"), &a));
        assert!(lookup.issuer(&a).is_none());
    }
}
