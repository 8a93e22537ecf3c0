//! The conditional-branch graph and its JSON persistence.
//!
//! Nodes are the conditional-branch instructions of a binary in linear
//! disassembly order. Two edge sets connect them: `seq` edges between
//! consecutive nodes (implicit, reconstructible from the node count) and
//! `jmp` edges from a branch to the node whose address matches the first
//! hex literal of its operands.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::listing::Instruction;

/// A conditional-branch instruction promoted to a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// 0-based position in the node sequence.
    pub index: u32,
    /// Virtual address of the instruction.
    pub address: u64,
    /// First hex literal of the operands, whether or not it names a node.
    pub target_address: Option<u64>,
}

/// Directed graph over the conditional branches of one binary.
///
/// Immutable after construction; the matcher only ever borrows it.
#[derive(Debug, Clone)]
pub struct BranchGraph {
    binary: String,
    nodes: Vec<Node>,
    jmp_edges: Vec<(u32, u32)>,
}

impl BranchGraph {
    /// Build a graph from a parsed instruction sequence.
    ///
    /// Retains the conditional branches in encounter order, then resolves
    /// each retained instruction's first operand hex literal against the
    /// addresses of the retained set. A literal that points anywhere else
    /// (or is absent) yields no `jmp` edge.
    pub fn build(binary: impl Into<String>, instructions: &[Instruction]) -> Self {
        let mut nodes: Vec<Node> = Vec::new();
        let mut addr_to_index = HashMap::new();
        for insn in instructions.iter().filter(|i| i.is_conditional_branch()) {
            let index = nodes.len() as u32;
            // Two instructions cannot share an address; a listing that
            // repeats one keeps the first occurrence.
            if addr_to_index.contains_key(&insn.address) {
                continue;
            }
            addr_to_index.insert(insn.address, index);
            nodes.push(Node {
                index,
                address: insn.address,
                target_address: insn.branch_target(),
            });
        }

        let mut jmp_edges = Vec::new();
        for node in &nodes {
            if let Some(target) = node.target_address {
                if let Some(&dst) = addr_to_index.get(&target) {
                    jmp_edges.push((node.index, dst));
                }
            }
        }

        Self {
            binary: binary.into(),
            nodes,
            jmp_edges,
        }
    }

    /// Path of the binary this graph was extracted from.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in linear disassembly order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Jump edges as (source index, destination index) pairs, at most one
    /// per source, in source order.
    pub fn jmp_edges(&self) -> &[(u32, u32)] {
        &self.jmp_edges
    }

    /// The implicit chain of edges between consecutive nodes.
    pub fn seq_edges(&self) -> Vec<(u32, u32)> {
        seq_chain(self.nodes.len())
    }

    /// Serialize to the pretty-printed graph JSON document.
    pub fn to_json(&self) -> Result<String, GraphFileError> {
        let file = GraphFile {
            meta: GraphMeta {
                binary: self.binary.clone(),
                node_count: self.nodes.len() as u32,
            },
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeRecord {
                    index: n.index,
                    address: n.address,
                    target_address: n.target_address,
                })
                .collect(),
            edges: EdgeRecord {
                seq: Some(self.seq_edges()),
                jmp: self.jmp_edges.clone(),
            },
        };
        serde_json::to_string_pretty(&file).map_err(|e| GraphFileError::Json(e.to_string()))
    }

    /// Deserialize and validate a graph JSON document.
    pub fn from_json(text: &str) -> Result<Self, GraphFileError> {
        let file: GraphFile =
            serde_json::from_str(text).map_err(|e| GraphFileError::Json(e.to_string()))?;
        Self::from_file(file)
    }

    /// Load a previously saved graph from disk.
    pub fn load(path: &Path) -> Result<Self, GraphFileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GraphFileError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Save the graph to disk. The document is written to a temporary file
    /// in the destination directory and renamed over `path`, so a crash
    /// mid-write leaves either the previous file or nothing.
    pub fn save(&self, path: &Path) -> Result<(), GraphFileError> {
        let json = self.to_json()?;
        write_atomic(path, &json).map_err(|e| GraphFileError::Io(e.to_string()))
    }

    fn from_file(file: GraphFile) -> Result<Self, GraphFileError> {
        let n = file.nodes.len();

        if file.meta.node_count as usize != n {
            return Err(GraphFileError::Invalid {
                field: "meta.node_count",
                reason: format!("claims {} nodes, document has {}", file.meta.node_count, n),
            });
        }

        let mut addresses = HashSet::with_capacity(n);
        for (i, node) in file.nodes.iter().enumerate() {
            if node.index as usize != i {
                return Err(GraphFileError::Invalid {
                    field: "nodes.index",
                    reason: format!("node at position {} has index {}", i, node.index),
                });
            }
            if !addresses.insert(node.address) {
                return Err(GraphFileError::Invalid {
                    field: "nodes.address",
                    reason: format!("duplicate address {:#x}", node.address),
                });
            }
        }

        let mut sources = HashSet::with_capacity(file.edges.jmp.len());
        for &(src, dst) in &file.edges.jmp {
            if src as usize >= n || dst as usize >= n {
                return Err(GraphFileError::Invalid {
                    field: "edges.jmp",
                    reason: format!("edge ({}, {}) out of range for {} nodes", src, dst, n),
                });
            }
            if !sources.insert(src) {
                return Err(GraphFileError::Invalid {
                    field: "edges.jmp",
                    reason: format!("node {} has more than one jump edge", src),
                });
            }
        }

        if let Some(seq) = &file.edges.seq {
            if *seq != seq_chain(n) {
                return Err(GraphFileError::Invalid {
                    field: "edges.seq",
                    reason: "does not match the consecutive-node chain".to_string(),
                });
            }
        }

        Ok(Self {
            binary: file.meta.binary,
            nodes: file
                .nodes
                .into_iter()
                .map(|r| Node {
                    index: r.index,
                    address: r.address,
                    target_address: r.target_address,
                })
                .collect(),
            jmp_edges: file.edges.jmp,
        })
    }
}

fn seq_chain(n: usize) -> Vec<(u32, u32)> {
    (1..n as u32).map(|i| (i - 1, i)).collect()
}

/// Write `contents` to `path` atomically (temp file + rename).
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)?;
    Ok(())
}

/// Errors raised while loading or saving graph files.
#[derive(Debug, Clone)]
pub enum GraphFileError {
    Io(String),
    Json(String),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for GraphFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphFileError::Io(e) => write!(f, "I/O error: {}", e),
            GraphFileError::Json(e) => write!(f, "invalid graph file: {}", e),
            GraphFileError::Invalid { field, reason } => {
                write!(f, "invalid graph file: field `{}`: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for GraphFileError {}

// --- on-disk document shape ---

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GraphFile {
    meta: GraphMeta,
    nodes: Vec<NodeRecord>,
    edges: EdgeRecord,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GraphMeta {
    binary: String,
    node_count: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeRecord {
    index: u32,
    #[serde(with = "hex_addr")]
    address: u64,
    #[serde(with = "hex_addr_opt")]
    target_address: Option<u64>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeRecord {
    /// Reconstructible from the node count; always written, optional on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq: Option<Vec<(u32, u32)>>,
    jmp: Vec<(u32, u32)>,
}

/// Addresses travel as lower-case `0x…` strings.
mod hex_addr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| D::Error::custom(format!("invalid hex address {:?}", text)))
    }

    pub(super) fn parse(text: &str) -> Option<u64> {
        let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
        if digits.is_empty() {
            return None;
        }
        u64::from_str_radix(digits, 16).ok()
    }
}

mod hex_addr_opt {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => serializer.serialize_some(&format!("{:#x}", v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(text) => super::hex_addr::parse(&text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid hex address {:?}", text))),
        }
    }
}
