use crate::domain::models::{ConfigurationError, HostError, ModuleNode};
use crate::services::host::{BuildHost, GraphQuery, HostEvent, ModuleGraph, SharedIssuerLookup};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize, Default)]
struct StatsFile {
    #[serde(default)]
    modules: Vec<StatsModule>,
    #[serde(default)]
    children: Vec<StatsFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsModule {
    identifier: String,
    #[serde(default)]
    name_for_condition: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
    /// Inner modules of a concatenated module.
    #[serde(default)]
    modules: Vec<StatsModule>,
}

/// Module graph rebuilt from a stats file; issuers are answered by query.
#[derive(Debug, Default)]
pub struct StatsGraph {
    nodes: HashMap<String, Arc<ModuleNode>>,
    issuers: HashMap<String, String>,
}

impl ModuleGraph for StatsGraph {
    fn issuer_of(&self, identifier: &str) -> Option<Arc<ModuleNode>> {
        let issuer = self.issuers.get(identifier)?;
        self.nodes.get(issuer).cloned()
    }
}

impl StatsGraph {
    fn collect(&mut self, modules: Vec<StatsModule>, order: &mut Vec<Arc<ModuleNode>>) {
        for m in modules {
            if !self.nodes.contains_key(&m.identifier) {
                let node = ModuleNode::root(m.identifier.clone(), m.name_for_condition);
                if let Some(issuer) = m.issuer {
                    self.issuers.insert(m.identifier.clone(), issuer);
                }
                self.nodes.insert(m.identifier, node.clone());
                order.push(node);
            }
            self.collect(m.modules, order);
        }
    }
}

enum Stage {
    Starting,
    Visiting,
    Finished,
}

/// Replays the module graph recorded in a bundler stats JSON file as if the
/// host were building it: `beforeRun`, one visit per module, `done`.
pub struct StatsReplayHost {
    graph: Arc<StatsGraph>,
    pending: VecDeque<Arc<ModuleNode>>,
    stage: Stage,
}

impl StatsReplayHost {
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let stats_err = |reason: String| ConfigurationError::Stats {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| stats_err(e.to_string()))?;
        Self::from_json(&raw).map_err(|e| stats_err(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let stats: StatsFile = serde_json::from_str(raw)?;
        let mut graph = StatsGraph::default();
        let mut order = Vec::new();
        let mut compilations = vec![stats];
        while let Some(mut compilation) = compilations.pop() {
            graph.collect(std::mem::take(&mut compilation.modules), &mut order);
            compilations.extend(compilation.children.into_iter().rev());
        }
        tracing::debug!(modules = order.len(), "stats graph loaded");
        Ok(Self {
            graph: Arc::new(graph),
            pending: order.into(),
            stage: Stage::Starting,
        })
    }

    pub fn module_count(&self) -> usize {
        self.graph.nodes.len()
    }
}

impl BuildHost for StatsReplayHost {
    fn issuer_lookup(&self) -> SharedIssuerLookup {
        Arc::new(GraphQuery::new(self.graph.clone()))
    }

    async fn next_event(&mut self) -> Result<Option<HostEvent>, HostError> {
        let event = match self.stage {
            Stage::Starting => {
                self.stage = Stage::Visiting;
                Some(HostEvent::BeforeRun)
            }
            Stage::Visiting => match self.pending.pop_front() {
                Some(module) => Some(HostEvent::ModuleVisited(module)),
                None => {
                    self.stage = Stage::Finished;
                    Some(HostEvent::Done)
                }
            },
            Stage::Finished => None,
        };
        Ok(event)
    }

    async fn abort(&mut self) {
        self.pending.clear();
        self.stage = Stage::Finished;
    }

    async fn finish(&mut self) -> Result<(), HostError> {
        Ok(())
    }
}
