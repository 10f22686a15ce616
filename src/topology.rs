/*!
Graph builders for the topologies the experiments use. These are glue, not
model: the simulation core only ever sees the finished graphs through
read-only distance and neighbor queries.
 */

use petgraph::graph::{NodeIndex, UnGraph};
use rand::prelude::*;
use std::collections::VecDeque;

pub type Topology = UnGraph<(), (), usize>;

/// A path graph 0 - 1 - … - (n-1). A single node for n == 1.
pub fn linear(n: usize) -> Topology {
    let mut g = Topology::default();
    let nodes: Vec<_> = (0..n).map(|_| g.add_node(())).collect();
    for pair in nodes.windows(2) {
        g.add_edge(pair[0], pair[1], ());
    }
    g
}

/// A star with node 0 in the center.
pub fn star(n: usize) -> Topology {
    let mut g = Topology::default();
    let nodes: Vec<_> = (0..n).map(|_| g.add_node(())).collect();
    for leaf in nodes.iter().skip(1) {
        g.add_edge(nodes[0], *leaf, ());
    }
    g
}

/**
A ring lattice: n nodes on a circle, each connected to its k nearest
neighbors (k/2 on either side). This is the Watts-Strogatz construction with
rewiring probability zero.
 */
pub fn ring_lattice(n: usize, k: usize) -> Topology {
    let mut g = Topology::default();
    let nodes: Vec<_> = (0..n).map(|_| g.add_node(())).collect();
    for i in 0..n {
        for j in 1..=(k / 2) {
            if j < n {
                g.update_edge(nodes[i], nodes[(i + j) % n], ());
            }
        }
    }
    g
}

/// A balanced tree with n nodes and branching factor b, filled breadth-first
/// from the root.
pub fn balanced_tree(n: usize, b: usize) -> Result<Topology, String> {
    if n < 1 {
        return Err("a tree needs at least one node".to_string());
    }
    if b < 1 {
        return Err("the branching factor must be at least 1".to_string());
    }
    let mut g = Topology::default();
    let root = g.add_node(());
    let mut queue: VecDeque<NodeIndex<usize>> = VecDeque::new();
    queue.push_back(root);
    while let Some(parent) = queue.pop_front() {
        for _ in 0..b {
            if g.node_count() >= n {
                return Ok(g);
            }
            let child = g.add_node(());
            g.add_edge(parent, child, ());
            queue.push_back(child);
        }
    }
    Ok(g)
}

/**
A random d-regular graph on n nodes, by the pairing model: give every node d
stubs, shuffle, pair consecutive stubs, and reject draws that would create a
self-loop or a parallel edge. Rejection gets rare quickly for the small d the
experiments use, but the loop is capped anyway.
 */
pub fn random_regular<R: Rng>(n: usize, d: usize, rng: &mut R) -> Result<Topology, String> {
    if n * d % 2 != 0 {
        return Err(format!("n * d must be even, got n = {:}, d = {:}", n, d));
    }
    if d >= n {
        return Err(format!("degree {:} impossible with {:} nodes", d, n));
    }
    'attempt: for _ in 0..200 {
        let mut stubs: Vec<usize> = (0..n).flat_map(|i| std::iter::repeat(i).take(d)).collect();
        stubs.shuffle(rng);
        let mut g = Topology::default();
        let nodes: Vec<_> = (0..n).map(|_| g.add_node(())).collect();
        for pair in stubs.chunks(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b || g.contains_edge(nodes[a], nodes[b]) {
                continue 'attempt;
            }
            g.add_edge(nodes[a], nodes[b], ());
        }
        return Ok(g);
    }
    Err(format!(
        "could not realize a {:}-regular graph on {:} nodes",
        d, n
    ))
}

#[test]
fn test_linear_shape() {
    let g = linear(5);
    assert_eq!(g.node_count(), 5);
    assert_eq!(g.edge_count(), 4);
    assert_eq!(linear(1).node_count(), 1);
    assert_eq!(linear(1).edge_count(), 0);
}

#[test]
fn test_star_shape() {
    let g = star(6);
    assert_eq!(g.edge_count(), 5);
    assert_eq!(g.neighbors(NodeIndex::new(0)).count(), 5);
    assert_eq!(g.neighbors(NodeIndex::new(3)).count(), 1);
}

#[test]
fn test_ring_lattice_degree() {
    let g = ring_lattice(10, 4);
    for node in g.node_indices() {
        assert_eq!(g.neighbors(node).count(), 4);
    }
    assert_eq!(g.edge_count(), 20);
}

#[test]
fn test_balanced_tree_counts() {
    let g = balanced_tree(10, 2).unwrap();
    assert_eq!(g.node_count(), 10);
    assert_eq!(g.edge_count(), 9);
    assert_eq!(g.neighbors(NodeIndex::new(0)).count(), 2);
    assert!(balanced_tree(0, 2).is_err());
    assert!(balanced_tree(5, 0).is_err());
}

#[test]
fn test_random_regular_degrees() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let g = random_regular(30, 3, &mut rng).unwrap();
    assert_eq!(g.node_count(), 30);
    for node in g.node_indices() {
        assert_eq!(g.neighbors(node).count(), 3);
    }
    assert!(random_regular(5, 3, &mut rng).is_err());
    assert!(random_regular(4, 4, &mut rng).is_err());
}
