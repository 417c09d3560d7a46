//! Vantage-point tree over an arbitrary metric
//!
//! Nodes live in a flat arena so the whole tree serializes as two vectors.
//! Construction is deterministic: each partition's first item becomes its
//! vantage point and the remainder is split at the median distance.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    /// Index into `items`
    item: usize,
    /// Median distance from the vantage point to its descendants
    threshold: f64,
    inside: Option<usize>,
    outside: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpTree<T> {
    items: Vec<T>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl<T> VpTree<T> {
    pub fn build<F>(items: Vec<T>, dist: F) -> Self
    where
        F: Fn(&T, &T) -> f64,
    {
        let mut tree = VpTree {
            nodes: Vec::with_capacity(items.len()),
            items,
            root: None,
        };
        let indices: Vec<usize> = (0..tree.items.len()).collect();
        tree.root = tree.build_node(indices, &dist);
        tree
    }

    fn build_node<F>(&mut self, indices: Vec<usize>, dist: &F) -> Option<usize>
    where
        F: Fn(&T, &T) -> f64,
    {
        let (&vantage, rest) = indices.split_first()?;

        let mut scored: Vec<(f64, usize)> = rest
            .iter()
            .map(|&i| (dist(&self.items[vantage], &self.items[i]), i))
            .collect();
        // Stable sort keeps insertion order among equal distances
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let median = scored.len() / 2;
        let threshold = scored.get(median).map(|s| s.0).unwrap_or(0.0);
        let outside: Vec<usize> = scored[median..].iter().map(|s| s.1).collect();
        let inside: Vec<usize> = scored[..median].iter().map(|s| s.1).collect();

        let node_idx = self.nodes.len();
        self.nodes.push(Node {
            item: vantage,
            threshold,
            inside: None,
            outside: None,
        });

        let inside = self.build_node(inside, dist);
        let outside = self.build_node(outside, dist);
        self.nodes[node_idx].inside = inside;
        self.nodes[node_idx].outside = outside;
        Some(node_idx)
    }

    /// Exact nearest neighbour of `query`. `None` only for an empty tree.
    pub fn nearest<Q, F>(&self, query: &Q, dist: F) -> Option<(f64, &T)>
    where
        Q: ?Sized,
        F: Fn(&Q, &T) -> f64,
    {
        let root = self.root?;
        let mut best: Option<(f64, usize)> = None;
        self.search(root, query, &dist, &mut best);
        best.map(|(d, i)| (d, &self.items[i]))
    }

    fn search<Q, F>(&self, node_idx: usize, query: &Q, dist: &F, best: &mut Option<(f64, usize)>)
    where
        Q: ?Sized,
        F: Fn(&Q, &T) -> f64,
    {
        let node = &self.nodes[node_idx];
        let d = dist(query, &self.items[node.item]);
        // Strict comparison: ties keep the earlier find
        if best.map_or(true, |(tau, _)| d < tau) {
            *best = Some((d, node.item));
        }

        if d < node.threshold {
            if let Some(inside) = node.inside {
                self.search(inside, query, dist, best);
            }
            if let Some(outside) = node.outside {
                if d + radius(best) >= node.threshold {
                    self.search(outside, query, dist, best);
                }
            }
        } else {
            if let Some(outside) = node.outside {
                self.search(outside, query, dist, best);
            }
            if let Some(inside) = node.inside {
                if d - radius(best) <= node.threshold {
                    self.search(inside, query, dist, best);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in insertion order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Whether the arena forms one tree covering every item exactly once.
    ///
    /// Deserialized trees must pass this before being searched; a bad index
    /// would otherwise panic or hide items.
    pub fn is_consistent(&self) -> bool {
        if self.nodes.len() != self.items.len() {
            return false;
        }
        let Some(root) = self.root else {
            return self.items.is_empty();
        };

        let mut seen_nodes = vec![false; self.nodes.len()];
        let mut seen_items = vec![false; self.items.len()];
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let Some(node) = self.nodes.get(idx) else {
                return false;
            };
            if seen_nodes[idx] || node.threshold.is_nan() {
                return false;
            }
            seen_nodes[idx] = true;
            match seen_items.get_mut(node.item) {
                Some(seen) if !*seen => *seen = true,
                _ => return false,
            }
            stack.extend(node.inside);
            stack.extend(node.outside);
        }
        seen_nodes.iter().all(|&s| s)
    }

    #[cfg(test)]
    pub(crate) fn detach_root(&mut self) {
        self.root = None;
    }
}

/// Current search radius
fn radius(best: &Option<(f64, usize)>) -> f64 {
    best.map_or(f64::INFINITY, |(tau, _)| tau)
}
