//! Canonical structural keys for contiguous node windows.
//!
//! Two windows fingerprint-equal iff they have the same size, the same
//! pattern of window-internal jump edges (re-indexed to window-local
//! positions), and the same out-of-window direction for every external
//! jump. Which external node a jump lands on is deliberately erased;
//! otherwise windows from different binaries could never match.

use crate::graph::BranchGraph;

/// Where a node's jump edge lands relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpTag {
    /// Destination inside the window, at this window-local index.
    In(u32),
    /// Destination before the window start.
    OutBefore,
    /// Destination at or past the window end.
    OutAfter,
}

/// Canonical key of the subgraph induced on `[start, start + size)`.
///
/// The sequence-edge chain is determined by the window size alone and is
/// omitted; only jump-bearing nodes contribute, as `(local index, tag)`
/// pairs in ascending local-index order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey(Vec<(u32, JumpTag)>);

/// Computes window fingerprints for one graph.
///
/// Holds the per-node jump destination table so each window key is an
/// O(size) walk. Immutable once built; it can be shared freely across
/// threads.
pub struct Fingerprinter {
    jmp_dst: Vec<Option<u32>>,
}

impl Fingerprinter {
    pub fn new(graph: &BranchGraph) -> Self {
        let mut jmp_dst = vec![None; graph.node_count()];
        for &(src, dst) in graph.jmp_edges() {
            jmp_dst[src as usize] = Some(dst);
        }
        Self { jmp_dst }
    }

    /// Number of windows of `size`, i.e. valid start positions.
    pub fn window_count(&self, size: u32) -> u32 {
        let n = self.jmp_dst.len() as u32;
        if size == 0 || size > n {
            0
        } else {
            n - size + 1
        }
    }

    /// Fingerprint of the window `[start, start + size)`.
    ///
    /// Callers must ensure `start + size` does not exceed the node count.
    pub fn key(&self, start: u32, size: u32) -> WindowKey {
        let end = start + size;
        let mut jumps = Vec::new();

        for k in 0..size {
            let src = (start + k) as usize;
            if let Some(dst) = self.jmp_dst[src] {
                let tag = if dst >= start && dst < end {
                    JumpTag::In(dst - start)
                } else if dst < start {
                    JumpTag::OutBefore
                } else {
                    JumpTag::OutAfter
                };
                jumps.push((k, tag));
            }
        }

        WindowKey(jumps)
    }
}
