//! Graph analysis: strongly connected components and topological levels
//!
//! Tarjan's algorithm (iterative, linear time) finds the SCCs; the
//! condensed graph (always a DAG by construction) is then layered with
//! Kahn's algorithm into levels. Components within a level have no
//! edges between them and may be evaluated concurrently; levels are
//! processed strictly in order.
//!
//! An SCC of size > 1, or a single node with a self-loop, is tagged
//! cyclic and requires fixed-point iteration. Blocks are namespaces
//! only: a cycle spanning multiple blocks condenses into one component.

use indexmap::IndexSet;
use tracing::debug;

use crate::graph::DependencyGraph;

/// One condensed node: a strongly connected component.
#[derive(Debug, Clone)]
pub struct Component {
    /// Graph node indices, in model declaration order. For a cyclic
    /// component this is the Gauss-Seidel update order.
    pub members: Vec<usize>,
    /// Requires fixed-point iteration
    pub cyclic: bool,
}

/// Components that may execute concurrently.
#[derive(Debug, Clone)]
pub struct Level {
    /// Indices into [`Analysis::components`]
    pub components: Vec<usize>,
}

/// Condensation of the dependency graph plus its topological levels.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub components: Vec<Component>,
    pub levels: Vec<Level>,
    component_of: Vec<usize>,
}

impl Analysis {
    /// Component index containing a graph node.
    pub fn component_of(&self, node: usize) -> usize {
        self.component_of[node]
    }

    /// Number of cyclic components.
    pub fn cyclic_count(&self) -> usize {
        self.components.iter().filter(|c| c.cyclic).count()
    }
}

/// Analyze a dependency graph: SCCs, condensation, levels.
pub fn analyze(graph: &DependencyGraph) -> Analysis {
    let n = graph.node_count();

    // Tarjan, iterative with an explicit DFS frame stack
    const UNVISITED: usize = usize::MAX;
    let mut discovery = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut scc_stack: Vec<usize> = Vec::new();
    let mut next_discovery = 0usize;
    let mut component_of = vec![UNVISITED; n];
    let mut members: Vec<Vec<usize>> = Vec::new();

    for root in 0..n {
        if discovery[root] != UNVISITED {
            continue;
        }
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if frame.1 == 0 {
                discovery[v] = next_discovery;
                lowlink[v] = next_discovery;
                next_discovery += 1;
                scc_stack.push(v);
                on_stack[v] = true;
            }
            let successors = graph.dependents_of(v);
            if frame.1 < successors.len() {
                let w = successors[frame.1];
                frame.1 += 1;
                if discovery[w] == UNVISITED {
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(discovery[w]);
                }
            } else {
                frames.pop();
                if let Some(parent) = frames.last() {
                    let p = parent.0;
                    lowlink[p] = lowlink[p].min(lowlink[v]);
                }
                if lowlink[v] == discovery[v] {
                    let mut component = Vec::new();
                    loop {
                        let w = scc_stack.pop().expect("SCC stack holds the component root");
                        on_stack[w] = false;
                        component_of[w] = members.len();
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    // Update order inside a group: declaration order
                    component.sort_unstable();
                    members.push(component);
                }
            }
        }
    }

    let components: Vec<Component> = members
        .into_iter()
        .map(|members| {
            let cyclic =
                members.len() > 1 || (members.len() == 1 && graph.has_self_loop(members[0]));
            Component { members, cyclic }
        })
        .collect();

    // Condensed adjacency (dependency component → dependent component)
    let count = components.len();
    let mut condensed: Vec<IndexSet<usize>> = vec![IndexSet::new(); count];
    let mut in_degree = vec![0usize; count];
    for v in 0..n {
        for &w in graph.dependents_of(v) {
            let (cv, cw) = (component_of[v], component_of[w]);
            if cv != cw && condensed[cv].insert(cw) {
                in_degree[cw] += 1;
            }
        }
    }

    // Kahn's algorithm with level tracking; the condensation is acyclic
    // by construction, so every component gets a level
    let mut levels = Vec::new();
    let mut current: Vec<usize> = (0..count).filter(|&c| in_degree[c] == 0).collect();
    let mut processed = 0;
    while !current.is_empty() {
        // Sort for determinism: first member's declaration order
        current.sort_by_key(|&c| components[c].members[0]);
        processed += current.len();

        let mut next = Vec::new();
        for &c in &current {
            for &d in &condensed[c] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    next.push(d);
                }
            }
        }
        levels.push(Level {
            components: current,
        });
        current = next;
    }
    debug_assert_eq!(processed, count, "condensation must be acyclic");

    let analysis = Analysis {
        components,
        levels,
        component_of,
    };
    debug!(
        components = analysis.components.len(),
        cyclic = analysis.cyclic_count(),
        levels = analysis.levels.len(),
        "graph analyzed"
    );
    analysis
}
