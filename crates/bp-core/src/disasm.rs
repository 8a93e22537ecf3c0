//! External disassembler invocation.
//!
//! The engine never decodes machine code itself; it shells out to a
//! GNU-style `objdump -d` and hands the textual listing to the parser.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::binary::{sniff_elf, MappedBinary};

/// Disassembler executable used when the caller does not override it.
pub const DEFAULT_OBJDUMP: &str = "objdump";

/// Run `<objdump> -d <binary>` and return the raw listing bytes.
///
/// The binary is sniffed first so the log records what kind of file went
/// in; a non-ELF input is only a warning, since the disassembler may
/// still cope. A failing disassembler, or one that prints nothing for a
/// non-empty binary, is an error carrying the tool's stderr.
pub fn run_disassembler(objdump: &str, binary: &Path) -> Result<Vec<u8>> {
    let mapped = MappedBinary::open(binary)?;
    match sniff_elf(mapped.bytes()) {
        Some(elf) => info!(
            "{}: {} {}",
            binary.display(),
            elf.class_label(),
            elf.machine_label()
        ),
        None => warn!(
            "{}: not an ELF file, disassembly may fail",
            binary.display()
        ),
    }

    let output = Command::new(objdump)
        .arg("-d")
        .arg(binary)
        .output()
        .with_context(|| format!("failed to run {}", objdump))?;

    if !output.status.success() {
        bail!(
            "{} -d {} failed: {}",
            objdump,
            binary.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    if output.stdout.is_empty() {
        bail!(
            "{} -d {} produced no output: {}",
            objdump,
            binary.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(output.stdout)
}
