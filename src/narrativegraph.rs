use dashmap::DashMap;
use petgraph::graph::UnGraph;
use rustc_hash::FxHasher;
use std::collections::VecDeque;
use std::hash::BuildHasherDefault;

use crate::ItemId;

/// The underlying storage for narrative topologies. Node weights carry no
/// payload; an item is identified by its index in the graph.
pub type ItemGraph = UnGraph<(), (), usize>;

/**
The narrative structure is an undirected graph over story items. Edges encode
topical proximity: two items that share an edge are one step apart in the
narrative, and the visibility of a candidate item from an agent's
already-adopted items falls off with the shortest-path distance between them.

The graph is constructed before a run and never mutated afterwards, so
distance fields can be computed once per item and shared freely between
parallel readers.
 */
pub struct ContentGraph {
    graph: ItemGraph,
}

impl ContentGraph {
    pub fn new(graph: ItemGraph) -> ContentGraph {
        ContentGraph { graph }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.graph.node_indices()
    }

    pub fn graph(&self) -> &ItemGraph {
        &self.graph
    }

    /**
    Shortest-path distances from one item to every other item, by
    breadth-first search (all edges cost 1). `None` marks items in a
    different connected component; such items are simply invisible from
    `item`, they contribute nothing to any visibility sum.
     */
    pub fn distance_field(&self, item: usize) -> Vec<Option<u32>> {
        let mut field: Vec<Option<u32>> = vec![None; self.graph.node_count()];
        if item >= field.len() {
            return field;
        }
        let mut frontier: VecDeque<ItemId> = VecDeque::new();
        field[item] = Some(0);
        frontier.push_back(ItemId::new(item));
        while let Some(node) = frontier.pop_front() {
            let d = match field[node.index()] {
                None => continue,
                Some(d) => d,
            };
            for neighbor in self.graph.neighbors(node) {
                if field[neighbor.index()].is_none() {
                    field[neighbor.index()] = Some(d + 1);
                    frontier.push_back(neighbor);
                }
            }
        }
        field
    }

    /// Pairwise shortest-path distance. Mostly useful in tests; the
    /// simulation itself works with whole fields.
    pub fn distance(&self, from: usize, to: usize) -> Option<u32> {
        self.distance_field(from).get(to).copied().flatten()
    }
}

/// Distance fields, filled lazily and shared between trials and between
/// parallel workers of the deciding phase. Keyed by item index.
pub type FieldCache = DashMap<usize, Vec<Option<u32>>, BuildHasherDefault<FxHasher>>;

/// Fetch the distance field for `item`, computing it on first use. Concurrent
/// callers for the same item race on the entry, not on the result; whichever
/// wins inserts the identical field.
pub fn cached_field<'a>(
    cache: &'a FieldCache,
    content: &ContentGraph,
    item: usize,
) -> dashmap::mapref::one::Ref<'a, usize, Vec<Option<u32>>, BuildHasherDefault<FxHasher>> {
    cache
        .entry(item)
        .or_insert_with(|| content.distance_field(item))
        .downgrade()
}

#[test]
fn test_distance_field_on_a_line() {
    let mut g = ItemGraph::default();
    let nodes: Vec<_> = (0..5).map(|_| g.add_node(())).collect();
    for pair in nodes.windows(2) {
        g.add_edge(pair[0], pair[1], ());
    }
    let content = ContentGraph::new(g);
    let field = content.distance_field(0);
    assert_eq!(field, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
}

#[test]
fn test_distance_field_disconnected() {
    let mut g = ItemGraph::default();
    let a = g.add_node(());
    let b = g.add_node(());
    g.add_edge(a, b, ());
    g.add_node(());
    let content = ContentGraph::new(g);
    let field = content.distance_field(0);
    assert_eq!(field[1], Some(1));
    assert_eq!(field[2], None);
    assert_eq!(content.distance(2, 0), None);
}
