//! Weaving plan and the builder that produces it.
//!
//! Building is a two-phase affair. [`PlanBuilder::build`] walks the ring
//! graph into a [`DraftPlan`], matching every edge against the generator
//! matrix, and only [`DraftPlan::finalize`] turns it into a [`WeavingPlan`].
//! Tasks are created during the walk, so each carries a [`PlanHandle`] that
//! stays empty until finalization: a generator that tries to traverse the
//! plan too early gets [`DomainError::PlanNotFinal`] instead of a
//! half-built view.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, instrument};

use crate::domain::capability::{Capability, ReachLevel};
use crate::domain::error::DomainError;
use crate::domain::matrix::GeneratorMatrix;
use crate::domain::ring::{Ring, RingGraph, RingId, RingKind};

// ── Edges ────────────────────────────────────────────────────────────────────

/// One ring and everything it wraps. A wrapping ring has a single inner; an
/// aggregating ring has several and dispatches once per inner.
#[derive(Debug, Clone)]
pub struct RingEdge {
    pub outer: Ring,
    pub inners: Vec<Ring>,
}

impl RingEdge {
    pub fn label(&self) -> String {
        let inners: Vec<_> = self.inners.iter().map(Ring::name).collect();
        format!("{} -> [{}]", self.outer.name(), inners.join(", "))
    }
}

// ── Plan index ───────────────────────────────────────────────────────────────

/// The traversable part of a plan, frozen at finalization.
#[derive(Debug)]
pub struct PlanIndex {
    edges: Vec<RingEdge>,
    nodes: BTreeMap<RingKind, Vec<Ring>>,
    capabilities: Vec<Capability>,
}

impl PlanIndex {
    pub fn edges(&self) -> &[RingEdge] {
        &self.edges
    }

    /// Every distinct ring of `kind`, in walk order.
    pub fn nodes_of(&self, kind: RingKind) -> &[Ring] {
        self.nodes.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    /// The full, unfiltered capability list.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn capabilities_at(&self, level: ReachLevel) -> Vec<&Capability> {
        self.capabilities
            .iter()
            .filter(|c| c.reach().visible_at(level))
            .collect()
    }
}

/// Shared, write-once view of the plan handed to every task.
#[derive(Clone, Default)]
pub struct PlanHandle(Arc<OnceLock<Arc<PlanIndex>>>);

impl PlanHandle {
    /// # Errors
    ///
    /// `PlanNotFinal` until the owning draft has been finalized.
    pub fn get(&self) -> Result<&PlanIndex, DomainError> {
        self.0
            .get()
            .map(Arc::as_ref)
            .ok_or(DomainError::PlanNotFinal {
                operation: "traverse the plan",
            })
    }

    pub fn is_final(&self) -> bool {
        self.0.get().is_some()
    }
}

impl fmt::Debug for PlanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanHandle")
            .field("final", &self.is_final())
            .finish()
    }
}

// ── Tasks ────────────────────────────────────────────────────────────────────

/// One matched `(outer, inner)` pair, ready to be handed to its generator.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub outer_kind: RingKind,
    pub inner_kind: RingKind,
    pub outer: Ring,
    pub inner: Ring,
    /// Export of the outer ring, or the graph root it was reached from.
    pub export: String,
    plan: PlanHandle,
}

impl GenerationTask {
    pub fn plan(&self) -> Result<&PlanIndex, DomainError> {
        self.plan.get()
    }

    pub fn reach_level(&self) -> ReachLevel {
        self.outer_kind.reach_level()
    }

    /// `export:outer->inner`, used in reports and log fields.
    pub fn label(&self) -> String {
        format!("{}:{}->{}", self.export, self.outer.name(), self.inner.name())
    }
}

// ── Draft and final plans ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct DraftPlan {
    handle: PlanHandle,
    edges: Vec<RingEdge>,
    nodes: BTreeMap<RingKind, Vec<Ring>>,
    capabilities: Vec<Capability>,
    tasks: Vec<GenerationTask>,
}

impl DraftPlan {
    pub fn tasks(&self) -> &[GenerationTask] {
        &self.tasks
    }

    pub fn finalize(self) -> WeavingPlan {
        let index = Arc::new(PlanIndex {
            edges: self.edges,
            nodes: self.nodes,
            capabilities: self.capabilities,
        });
        // The draft is consumed here, so the cell is always empty.
        let _ = self.handle.0.set(Arc::clone(&index));
        WeavingPlan {
            index,
            tasks: self.tasks,
        }
    }
}

/// A finalized plan. Only this type exposes traversal.
#[derive(Debug, Clone)]
pub struct WeavingPlan {
    index: Arc<PlanIndex>,
    tasks: Vec<GenerationTask>,
}

impl WeavingPlan {
    pub fn index(&self) -> &PlanIndex {
        &self.index
    }

    pub fn edges(&self) -> &[RingEdge] {
        self.index.edges()
    }

    pub fn tasks(&self) -> &[GenerationTask] {
        &self.tasks
    }

    pub fn capabilities(&self) -> &[Capability] {
        self.index.capabilities()
    }

    pub fn into_tasks(self) -> Vec<GenerationTask> {
        self.tasks
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub struct PlanBuilder<'a> {
    graph: &'a RingGraph,
    capabilities: &'a [Capability],
}

impl<'a> PlanBuilder<'a> {
    pub fn new(graph: &'a RingGraph, capabilities: &'a [Capability]) -> Self {
        Self {
            graph,
            capabilities,
        }
    }

    /// Walk every root, record edges, and match each `(edge, inner)` pair.
    #[instrument(skip_all, fields(roots = self.graph.roots().count()))]
    pub fn build<G>(&self, matrix: &GeneratorMatrix<G>) -> DraftPlan {
        let mut walk = Walk::default();
        for (root, ring) in self.graph.roots() {
            walk.visit(ring, root);
        }

        let handle = PlanHandle::default();
        let mut tasks = Vec::new();
        for (edge, export) in walk.edges.iter().zip(&walk.exports) {
            for inner in &edge.inners {
                let (outer_kind, inner_kind) = (edge.outer.kind(), inner.kind());
                if !matrix.contains(outer_kind, inner_kind) {
                    debug!(
                        outer = %edge.outer.name(),
                        inner = %inner.name(),
                        pair = %format!("{outer_kind}->{inner_kind}"),
                        "no generator registered for edge"
                    );
                    continue;
                }
                tasks.push(GenerationTask {
                    outer_kind,
                    inner_kind,
                    outer: edge.outer.clone(),
                    inner: inner.clone(),
                    export: export.clone(),
                    plan: handle.clone(),
                });
            }
        }

        debug!(
            edges = walk.edges.len(),
            tasks = tasks.len(),
            "draft plan built"
        );

        DraftPlan {
            handle,
            edges: walk.edges,
            nodes: walk.nodes,
            capabilities: self.capabilities.to_vec(),
            tasks,
        }
    }
}

#[derive(Default)]
struct Walk {
    seen: HashSet<RingId>,
    edges: Vec<RingEdge>,
    exports: Vec<String>,
    nodes: BTreeMap<RingKind, Vec<Ring>>,
}

impl Walk {
    fn visit(&mut self, ring: &Ring, root: &str) {
        if !self.seen.insert(ring.id()) {
            return;
        }
        self.nodes.entry(ring.kind()).or_default().push(ring.clone());

        if !ring.inners().is_empty() {
            self.edges.push(RingEdge {
                outer: ring.clone(),
                inners: ring.inners().to_vec(),
            });
            self.exports
                .push(ring.export().unwrap_or(root).to_string());
        }
        for inner in ring.inners() {
            self.visit(inner, root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::Reach;

    fn platform(kind: RingKind, name: &str, core: &Ring) -> Ring {
        Ring::builder(kind, name)
            .export(format!("app-{name}"))
            .wraps(core)
            .build()
            .unwrap()
    }

    fn scenario() -> (RingGraph, Ring) {
        let core = Ring::core("engine");
        let android = platform(RingKind::Android, "android", &core);
        let desktop = platform(RingKind::Desktop, "desktop", &core);
        let plugin = Ring::builder(RingKind::Plugin, "plugin")
            .wraps(&android)
            .wraps(&desktop)
            .build()
            .unwrap();
        let graph = RingGraph::new()
            .with_root("mobile", &android)
            .with_root("shell", &plugin);
        (graph, core)
    }

    fn full_matrix() -> GeneratorMatrix<&'static str> {
        GeneratorMatrix::new()
            .with(RingKind::Android, RingKind::Core, "jni")
            .with(RingKind::Desktop, RingKind::Core, "direct")
            .with(RingKind::Plugin, RingKind::Android, "ipc-mobile")
            .with(RingKind::Plugin, RingKind::Desktop, "ipc-desktop")
    }

    #[test]
    fn aggregation_yields_three_edges_four_tasks() {
        let (graph, _) = scenario();
        let plan = PlanBuilder::new(&graph, &[]).build(&full_matrix()).finalize();

        assert_eq!(plan.edges().len(), 3);
        assert_eq!(plan.tasks().len(), 4);
        assert_eq!(plan.index().nodes_of(RingKind::Core).len(), 1);
        assert_eq!(plan.index().node_count(), 4);
    }

    #[test]
    fn shared_inner_visited_once() {
        let (graph, core) = scenario();
        let plan = PlanBuilder::new(&graph, &[]).build(&full_matrix()).finalize();
        let cores = plan.index().nodes_of(RingKind::Core);
        assert!(cores[0].same_as(&core));
    }

    #[test]
    fn unmatched_edges_produce_no_task() {
        let (graph, _) = scenario();
        let matrix = GeneratorMatrix::new().with(RingKind::Android, RingKind::Core, "jni");
        let plan = PlanBuilder::new(&graph, &[]).build(&matrix).finalize();
        assert_eq!(plan.edges().len(), 3);
        assert_eq!(plan.tasks().len(), 1);
        assert_eq!(plan.tasks()[0].export, "app-android");
    }

    #[test]
    fn draft_refuses_traversal() {
        let (graph, _) = scenario();
        let draft = PlanBuilder::new(&graph, &[]).build(&full_matrix());
        let task = draft.tasks()[0].clone();

        assert_eq!(
            task.plan().unwrap_err(),
            DomainError::PlanNotFinal {
                operation: "traverse the plan"
            }
        );

        let plan = draft.finalize();
        assert_eq!(task.plan().unwrap().edges().len(), 3);
        assert_eq!(plan.tasks()[0].plan().unwrap().edges().len(), 3);
    }

    #[test]
    fn export_falls_back_to_root_name() {
        let (graph, _) = scenario();
        let plan = PlanBuilder::new(&graph, &[]).build(&full_matrix()).finalize();
        let plugin_tasks: Vec<_> = plan
            .tasks()
            .iter()
            .filter(|t| t.outer_kind == RingKind::Plugin)
            .collect();
        assert_eq!(plugin_tasks.len(), 2);
        assert!(plugin_tasks.iter().all(|t| t.export == "shell"));
    }

    #[test]
    fn capabilities_attached_unfiltered() {
        let (graph, _) = scenario();
        let caps = vec![
            Capability::declare("SecretMgmt", Reach::Private, vec![]).unwrap(),
            Capability::declare("TabMgmt", Reach::Global, vec![]).unwrap(),
        ];
        let plan = PlanBuilder::new(&graph, &caps).build(&full_matrix()).finalize();
        assert_eq!(plan.capabilities().len(), 2);
        assert_eq!(plan.index().capabilities_at(ReachLevel::Front).len(), 1);
    }
}
