//! Traversals over the reference graph.
//!
//! An edge `A -> B` means the formula in `A` reads `B`. Cells store their outgoing
//! edges implicitly (in the formula) and their incoming edges explicitly (the parent
//! set), so cycle checks walk references and invalidation walks parents.

use std::collections::{HashSet, VecDeque};

use crate::position::Position;

pub(crate) trait DependencyGraph {
    /// Positions the content at `pos` reads.
    fn references(&self, pos: Position) -> Vec<Position>;

    /// Positions whose formulas read `pos`.
    fn parents(&self, pos: Position) -> &[Position];
}

/// Whether giving `target` the outgoing edges `references` would close a cycle.
///
/// Breadth-first from `references` through the current graph. `target` is never marked
/// visited, so a direct self-reference is caught like any longer path.
pub(crate) fn creates_cycle<G>(graph: &G, target: Position, references: &[Position]) -> bool
where
    G: DependencyGraph + ?Sized,
{
    let mut queue: VecDeque<Position> = references.iter().copied().collect();
    let mut visited = HashSet::new();
    while let Some(pos) = queue.pop_front() {
        if pos == target {
            return true;
        }
        if visited.insert(pos) {
            queue.extend(graph.references(pos));
        }
    }
    false
}

/// `pos` followed by every position that reaches it, in breadth-first order over parents.
pub(crate) fn dependents<G>(graph: &G, pos: Position) -> Vec<Position>
where
    G: DependencyGraph + ?Sized,
{
    let mut order = vec![pos];
    let mut visited = HashSet::from([pos]);
    let mut queue = VecDeque::from([pos]);
    while let Some(current) = queue.pop_front() {
        for &parent in graph.parents(current) {
            if visited.insert(parent) {
                order.push(parent);
                queue.push_back(parent);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Graph {
        references: HashMap<Position, Vec<Position>>,
        parents: HashMap<Position, Vec<Position>>,
    }

    impl Graph {
        fn with_edges(edges: &[(&str, &str)]) -> Self {
            let mut graph = Self::default();
            for (from, to) in edges {
                let (from, to) = (p(from), p(to));
                graph.references.entry(from).or_default().push(to);
                graph.parents.entry(to).or_default().push(from);
            }
            graph
        }
    }

    impl DependencyGraph for Graph {
        fn references(&self, pos: Position) -> Vec<Position> {
            self.references.get(&pos).cloned().unwrap_or_default()
        }

        fn parents(&self, pos: Position) -> &[Position] {
            self.parents.get(&pos).map(Vec::as_slice).unwrap_or_default()
        }
    }

    fn p(name: &str) -> Position {
        name.parse().unwrap()
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let graph = Graph::default();
        assert!(creates_cycle(&graph, p("A1"), &[p("A1")]));
        assert!(creates_cycle(&graph, p("A1"), &[p("B1"), p("A1")]));
    }

    #[test]
    fn indirect_cycles_are_detected() {
        // B1 -> C1 -> D1 -> A1
        let graph = Graph::with_edges(&[("B1", "C1"), ("C1", "D1"), ("D1", "A1")]);
        assert!(creates_cycle(&graph, p("A1"), &[p("B1")]));
        assert!(creates_cycle(&graph, p("A1"), &[p("D1")]));
        assert!(!creates_cycle(&graph, p("E1"), &[p("B1")]));
    }

    #[test]
    fn diamonds_are_not_cycles() {
        // B1 and C1 both read D1
        let graph = Graph::with_edges(&[("B1", "D1"), ("C1", "D1")]);
        assert!(!creates_cycle(&graph, p("A1"), &[p("B1"), p("C1")]));
        assert!(!creates_cycle(&graph, p("A1"), &[]));
    }

    #[test]
    fn existing_cycles_do_not_loop_forever() {
        let graph = Graph::with_edges(&[("B1", "C1"), ("C1", "B1")]);
        assert!(!creates_cycle(&graph, p("A1"), &[p("B1")]));
    }

    #[test]
    fn dependents_follow_parents_breadth_first() {
        // B1 and C1 read A1, D1 reads B1 and C1, E1 reads D1
        let graph = Graph::with_edges(&[
            ("B1", "A1"),
            ("C1", "A1"),
            ("D1", "B1"),
            ("D1", "C1"),
            ("E1", "D1"),
        ]);
        assert_eq!(
            dependents(&graph, p("A1")),
            vec![p("A1"), p("B1"), p("C1"), p("D1"), p("E1")]
        );
        assert_eq!(dependents(&graph, p("D1")), vec![p("D1"), p("E1")]);
        assert_eq!(dependents(&graph, p("E1")), vec![p("E1")]);
    }
}
