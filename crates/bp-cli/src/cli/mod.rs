pub mod compare;
pub mod extract;

use std::path::Path;

use anyhow::Result;
use log::info;

use bp_core::{parse_listing, run_disassembler, BranchGraph};

/// Disassemble `binary` and build its conditional-branch graph.
pub(crate) fn extract_graph(objdump: &str, binary: &Path) -> Result<BranchGraph> {
    let listing = run_disassembler(objdump, binary)?;
    let instructions = parse_listing(&listing);
    let graph = BranchGraph::build(binary.display().to_string(), &instructions);
    info!(
        "{}: {} conditional branches, {} jump edges",
        binary.display(),
        graph.node_count(),
        graph.jmp_edges().len()
    );
    Ok(graph)
}
