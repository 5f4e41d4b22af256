//! Module descriptors and the module dependency graph.
//!
//! Descriptors are built once from the configuration and shared read-only by
//! every planning thread. The only mutable state is a module's PCH usage,
//! which environment construction may demote, and its memoized transitive
//! dependency set.

use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use hearth_cache::normalize_path;
use hearth_common::{HearthResult, InternalError, ModuleId, ModuleNames};
use hearth_config::{BuildConfig, ModuleRules, PchUsage};
use parking_lot::RwLock;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};

use crate::defines::api_macro;
use crate::errors::PlanError;
use crate::target::TargetSettings;

/// Visibility of a dependency edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    /// Re-exported to dependents.
    Public,
    /// Used by the module's implementation only.
    Private,
}

/// A module in the build graph.
#[derive(Debug)]
pub struct ModuleDescriptor {
    /// Interned id.
    pub id: ModuleId,
    /// Module name.
    pub name: String,
    /// Module directory.
    pub directory: PathBuf,
    /// Every directory whose files belong to the module.
    pub directories: Vec<PathBuf>,
    /// Where the module's generated files and objects go.
    pub intermediate_dir: PathBuf,
    /// Include paths visible to dependents.
    pub public_include_paths: Vec<PathBuf>,
    /// Include paths visible to the module only.
    pub private_include_paths: Vec<PathBuf>,
    /// Public dependencies, in declared order.
    pub public_dependencies: Vec<ModuleId>,
    /// Private dependencies, in declared order.
    pub private_dependencies: Vec<ModuleId>,
    /// Private PCH header, if declared.
    pub private_pch: Option<PathBuf>,
    /// Shared PCH header offered to dependents, if declared.
    pub shared_pch: Option<PathBuf>,
    /// Compiled as engine code.
    pub is_engine: bool,
    /// The declared rules, for flag lookups.
    pub rules: ModuleRules,
    pch_usage: RwLock<PchUsage>,
    all_dependencies: OnceLock<BTreeSet<ModuleId>>,
}

impl ModuleDescriptor {
    fn new(id: ModuleId, name: &str, rules: &ModuleRules, target: &TargetSettings) -> Self {
        let directory = normalize_path(&target.root.join(&rules.directory));
        let intermediate_dir = target.intermediate_dir.join(name);
        let mut directories = vec![directory.clone()];
        directories.extend(
            rules
                .extra_directories
                .iter()
                .map(|dir| normalize_path(&target.root.join(dir))),
        );
        directories.push(intermediate_dir.clone());

        let is_engine = rules
            .engine
            .unwrap_or_else(|| !target.is_project_path(&directory));

        Self {
            id,
            name: name.to_string(),
            public_include_paths: vec![directory.join("Public"), directory.join("Classes")],
            private_include_paths: vec![directory.join("Private"), directory.clone()],
            private_pch: rules
                .private_pch
                .as_ref()
                .map(|header| normalize_path(&directory.join(header))),
            shared_pch: rules
                .shared_pch
                .as_ref()
                .map(|header| normalize_path(&directory.join(header))),
            directory,
            directories,
            intermediate_dir,
            public_dependencies: Vec::new(),
            private_dependencies: Vec::new(),
            is_engine,
            rules: rules.clone(),
            pch_usage: RwLock::new(rules.pch_usage),
            all_dependencies: OnceLock::new(),
        }
    }

    /// Current PCH usage, after any demotion.
    pub fn pch_usage(&self) -> PchUsage {
        *self.pch_usage.read()
    }

    /// Demotes the PCH usage. Only environment construction calls this.
    pub(crate) fn set_pch_usage(&self, usage: PchUsage) {
        *self.pch_usage.write() = usage;
    }

    /// Returns `true` if the module declares a private PCH.
    pub fn has_private_pch(&self) -> bool {
        self.private_pch.is_some()
    }

    /// The module's export macro, e.g. `CORE_API`.
    pub fn api_macro(&self) -> String {
        api_macro(&self.name)
    }

    /// Returns `true` if `file` lies in one of the module's directories.
    pub fn contains_file(&self, file: &Path) -> bool {
        self.directories.iter().any(|dir| file.starts_with(dir))
    }

    /// Module names listed as both dependencies and dynamically loaded.
    pub fn dynamically_loaded_dependencies(&self) -> Vec<String> {
        let deps: HashSet<&str> = self
            .rules
            .public_dependencies
            .iter()
            .chain(&self.rules.private_dependencies)
            .map(String::as_str)
            .collect();
        self.rules
            .dynamically_loaded
            .iter()
            .filter(|name| deps.contains(name.as_str()))
            .cloned()
            .collect()
    }
}

/// Every module of the target and the edges between them.
pub struct ModuleGraph {
    names: ModuleNames,
    modules: Vec<ModuleDescriptor>,
    slots: HashMap<ModuleId, usize>,
    graph: DiGraph<ModuleId, DependencyKind>,
    nodes: HashMap<ModuleId, NodeIndex>,
}

impl ModuleGraph {
    /// Builds the graph from a configuration.
    pub fn new(config: &BuildConfig, target: &TargetSettings) -> Result<Self, PlanError> {
        let names = ModuleNames::new();
        let mut modules = Vec::with_capacity(config.modules.len());
        let mut slots = HashMap::new();
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for (name, rules) in &config.modules {
            let id = names.intern(name);
            slots.insert(id, modules.len());
            nodes.insert(id, graph.add_node(id));
            modules.push(ModuleDescriptor::new(id, name, rules, target));
        }

        let lookup = |dep: &String| names.get(dep).ok_or_else(|| PlanError::UnknownModule(dep.clone()));
        for module in &mut modules {
            module.public_dependencies = module
                .rules
                .public_dependencies
                .iter()
                .map(lookup)
                .collect::<Result<_, _>>()?;
            module.private_dependencies = module
                .rules
                .private_dependencies
                .iter()
                .map(lookup)
                .collect::<Result<_, _>>()?;
        }

        for module in &modules {
            let from = nodes[&module.id];
            for dep in &module.public_dependencies {
                graph.add_edge(from, nodes[dep], DependencyKind::Public);
            }
            for dep in &module.private_dependencies {
                graph.add_edge(from, nodes[dep], DependencyKind::Private);
            }
        }

        Ok(Self {
            names,
            modules,
            slots,
            graph,
            nodes,
        })
    }

    /// All modules, sorted by name.
    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    /// Looks up a module by id.
    pub fn get(&self, id: ModuleId) -> HearthResult<&ModuleDescriptor> {
        self.slots
            .get(&id)
            .map(|slot| &self.modules[*slot])
            .ok_or_else(|| InternalError::new(format!("module id {} not in graph", id.as_raw())))
    }

    /// Looks up a module by name.
    pub fn find(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.names.get(name).and_then(|id| self.get(id).ok())
    }

    /// The module's name.
    pub fn name(&self, id: ModuleId) -> HearthResult<&str> {
        self.names.resolve(id)
    }

    /// Every module reachable through public or private dependencies,
    /// excluding the module itself. Computed once per module.
    pub fn all_dependencies(&self, id: ModuleId) -> HearthResult<&BTreeSet<ModuleId>> {
        let module = self.get(id)?;
        let start = self.node(id)?;
        Ok(module.all_dependencies.get_or_init(|| {
            let mut deps = BTreeSet::new();
            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(node) = dfs.next(&self.graph) {
                if node != start {
                    deps.insert(self.graph[node]);
                }
            }
            deps
        }))
    }

    /// Modules whose public interface is visible through the module's public
    /// interface: public dependencies, recursively, in declaration order.
    pub fn public_environment_modules(&self, id: ModuleId) -> HearthResult<Vec<ModuleId>> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        self.collect_public(id, &mut seen, &mut out)?;
        Ok(out)
    }

    /// Modules whose public interface the module's own sources see: every
    /// direct dependency plus each one's public environment.
    pub fn compile_environment_modules(&self, id: ModuleId) -> HearthResult<Vec<ModuleId>> {
        let module = self.get(id)?;
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        for dep in module
            .public_dependencies
            .iter()
            .chain(&module.private_dependencies)
        {
            if seen.insert(*dep) {
                out.push(*dep);
                self.collect_public(*dep, &mut seen, &mut out)?;
            }
        }
        Ok(out)
    }

    fn collect_public(
        &self,
        id: ModuleId,
        seen: &mut HashSet<ModuleId>,
        out: &mut Vec<ModuleId>,
    ) -> HearthResult<()> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let module = self.get(current)?;
            // Reverse so the first declared dependency is visited first.
            for dep in module.public_dependencies.iter().rev() {
                if seen.insert(*dep) {
                    out.push(*dep);
                    stack.push(*dep);
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `from` has a direct edge of `kind` to `to`.
    pub fn has_edge(&self, from: ModuleId, to: ModuleId, kind: DependencyKind) -> bool {
        let (Some(a), Some(b)) = (self.nodes.get(&from), self.nodes.get(&to)) else {
            return false;
        };
        self.graph
            .edges(*a)
            .any(|edge| edge.target() == *b && *edge.weight() == kind)
    }

    /// Every module ordered so that dependents come before their
    /// dependencies. Members of a dependency cycle are adjacent and sorted by
    /// name; independent modules are ordered by name.
    pub fn dependents_first_order(&self) -> Vec<ModuleId> {
        let sccs = tarjan_scc(&self.graph);
        let mut component_of = HashMap::new();
        let mut members: Vec<Vec<ModuleId>> = Vec::with_capacity(sccs.len());
        for (index, scc) in sccs.iter().enumerate() {
            let mut ids: Vec<ModuleId> = scc.iter().map(|node| self.graph[*node]).collect();
            // Graph nodes are always interned.
            ids.sort_by_key(|id| self.name(*id).unwrap_or_default());
            for node in scc {
                component_of.insert(*node, index);
            }
            members.push(ids);
        }

        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); sccs.len()];
        let mut in_degree = vec![0usize; sccs.len()];
        for edge in self.graph.edge_references() {
            let from = component_of[&edge.source()];
            let to = component_of[&edge.target()];
            if from != to && successors[from].insert(to) {
                in_degree[to] += 1;
            }
        }

        let key = |component: usize| {
            self.name(members[component][0])
                .unwrap_or_default()
                .to_string()
        };
        let mut ready: BinaryHeap<Reverse<(String, usize)>> = (0..sccs.len())
            .filter(|c| in_degree[*c] == 0)
            .map(|c| Reverse((key(c), c)))
            .collect();

        let mut order = Vec::with_capacity(self.modules.len());
        while let Some(Reverse((_, component))) = ready.pop() {
            order.extend(members[component].iter().copied());
            for next in &successors[component] {
                in_degree[*next] -= 1;
                if in_degree[*next] == 0 {
                    ready.push(Reverse((key(*next), *next)));
                }
            }
        }
        order
    }

    fn node(&self, id: ModuleId) -> HearthResult<NodeIndex> {
        self.nodes
            .get(&id)
            .copied()
            .ok_or_else(|| InternalError::new(format!("module id {} has no graph node", id.as_raw())))
    }
}
