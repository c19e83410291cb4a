use crate::domain::models::InclusionChain;
use crate::services::host::{HostModule, IssuerLookup};
use std::collections::HashSet;

/// Walks issuers from the matched module back to the entry point.
///
/// Host graphs are not guaranteed to be acyclic, so every visited link is
/// remembered and the walk stops as soon as one comes around again.
pub fn reconstruct<M, L>(matched: &M, lookup: &L) -> InclusionChain
where
    M: HostModule + Clone,
    L: IssuerLookup<M> + ?Sized,
{
    let mut walked = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(matched.clone());

    while let Some(module) = current {
        let link = chain_link(&module);
        if !seen.insert(link.clone()) {
            tracing::warn!(module = %link, "issuer chain loops back on itself");
            return InclusionChain::from_walk(walked, Some(link));
        }
        walked.push(link);
        current = lookup.issuer(&module);
    }

    InclusionChain::from_walk(walked, None)
}

// Synthetic modules (entry shims, runtime chunks) have no resource; their
// host identifier is the only name they have.
fn chain_link<M: HostModule>(module: &M) -> String {
    module
        .resource()
        .unwrap_or_else(|| module.identifier())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::reconstruct;
    use crate::domain::models::ModuleNode;
    use crate::services::host::{DirectIssuer, IssuerLookup};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Issuer relation given as identifier pairs, cycles allowed.
    struct PairLookup {
        nodes: HashMap<&'static str, Arc<ModuleNode>>,
        issuer: HashMap<&'static str, &'static str>,
    }

    impl PairLookup {
        fn new(names: &[&'static str], pairs: &[(&'static str, &'static str)]) -> Self {
            let nodes = names
                .iter()
                .map(|n| (*n, ModuleNode::root(*n, Some(n.to_string()))))
                .collect();
            Self {
                nodes,
                issuer: pairs.iter().copied().collect(),
            }
        }

        fn node(&self, name: &str) -> Arc<ModuleNode> {
            self.nodes[name].clone()
        }
    }

    impl IssuerLookup<Arc<ModuleNode>> for PairLookup {
        fn issuer(&self, module: &Arc<ModuleNode>) -> Option<Arc<ModuleNode>> {
            self.issuer
                .get(module.identifier.as_str())
                .map(|i| self.nodes[i].clone())
        }
    }

    #[test]
    fn linear_chain_is_root_first() {
        let a = ModuleNode::root("A", Some("A".into()));
        let b = ModuleNode::issued_by("B", Some("B".into()), &a);
        let c = ModuleNode::issued_by("C", Some("C".into()), &b);

        let chain = reconstruct(&c, &DirectIssuer);
        assert_eq!(chain.links(), ["A", "B", "C"]);
        assert!(chain.cycle_at().is_none());
    }

    #[test]
    fn root_match_yields_single_link() {
        let entry = ModuleNode::root("./index.js", Some("/app/index.js".into()));
        let chain = reconstruct(&entry, &DirectIssuer);
        assert_eq!(chain.links(), ["/app/index.js"]);
    }

    #[test]
    fn cyclic_issuers_terminate() {
        let lookup = PairLookup::new(&["A", "B"], &[("A", "B"), ("B", "A")]);
        let chain = reconstruct(&lookup.node("A"), &lookup);
        assert_eq!(chain.links(), ["B", "A"]);
        assert_eq!(chain.cycle_at(), Some("A"));
    }

    #[test]
    fn self_import_terminates() {
        let lookup = PairLookup::new(&["A"], &[("A", "A")]);
        let chain = reconstruct(&lookup.node("A"), &lookup);
        assert_eq!(chain.links(), ["A"]);
        assert_eq!(chain.cycle_at(), Some("A"));
    }

    #[test]
    fn synthetic_issuer_uses_identifier() {
        let entry = ModuleNode::root("multi ./src/index.js", None);
        let leaf = ModuleNode::issued_by("./src/index.js", Some("/app/src/index.js".into()), &entry);
        let chain = reconstruct(&leaf, &DirectIssuer);
        assert_eq!(chain.links(), ["multi ./src/index.js", "/app/src/index.js"]);
    }
}
