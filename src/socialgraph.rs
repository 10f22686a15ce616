use petgraph::graph::UnGraph;

use crate::AgentId;

pub type PeerGraph = UnGraph<(), (), usize>;

/**
The social structure is an undirected graph over agents. The neighbor
relation is symmetric and fixed for the duration of a run; agents only ever
query it read-only, so the graph can be shared across parallel workers
without synchronization.
 */
pub struct SocialGraph {
    graph: PeerGraph,
}

impl SocialGraph {
    pub fn new(graph: PeerGraph) -> SocialGraph {
        SocialGraph { graph }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.graph.node_indices()
    }

    pub fn neighbors(&self, agent: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors(AgentId::new(agent))
            .map(|n| n.index())
    }

    pub fn graph(&self) -> &PeerGraph {
        &self.graph
    }
}

#[test]
fn test_neighbors_are_symmetric() {
    let mut g = PeerGraph::default();
    let a = g.add_node(());
    let b = g.add_node(());
    let c = g.add_node(());
    g.add_edge(a, b, ());
    g.add_edge(b, c, ());
    let social = SocialGraph::new(g);
    let mut n1: Vec<usize> = social.neighbors(1).collect();
    n1.sort_unstable();
    assert_eq!(n1, vec![0, 2]);
    assert!(social.neighbors(0).any(|n| n == 1));
    assert!(social.neighbors(2).all(|n| n == 1));
}
