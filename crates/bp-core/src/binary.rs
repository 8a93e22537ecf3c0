//! Input-binary inspection before disassembly.
//!
//! The engine never reads machine code out of the binary itself; the file
//! is mapped only so its ELF header can be sniffed (and logged) before the
//! external disassembler is invoked.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use memmap2::Mmap;

/// An input binary mapped read-only for header sniffing.
#[derive(Debug)]
pub struct MappedBinary {
    mmap: Mmap,
}

impl MappedBinary {
    /// Map `path` read-only. An empty file is an error: it cannot be
    /// mapped and there is nothing to disassemble.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let metadata = file
            .metadata()
            .with_context(|| format!("failed to read metadata for {}", path.display()))?;
        if metadata.len() == 0 {
            bail!("{} is empty", path.display());
        }

        // SAFETY: the map is read-only; truncating or rewriting the input
        // binary while it is mapped is the caller's responsibility.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to mmap {}", path.display()))?;

        Ok(Self { mmap })
    }

    /// The mapped file contents.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

/// What the ELF header says about a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfInfo {
    /// ELFCLASS64 vs ELFCLASS32.
    pub is_64bit: bool,
    /// Raw e_machine value.
    pub machine: u16,
}

impl ElfInfo {
    pub fn class_label(&self) -> &'static str {
        if self.is_64bit {
            "ELF64"
        } else {
            "ELF32"
        }
    }

    pub fn machine_label(&self) -> &'static str {
        match self.machine {
            0x03 => "x86",
            0x08 => "MIPS",
            0x28 => "ARM",
            0x3E => "x86-64",
            0xB7 => "AArch64",
            0xF3 => "RISC-V",
            _ => "unknown machine",
        }
    }
}

/// Read the ELF class and machine from a file header, if it is ELF at all.
pub fn sniff_elf(data: &[u8]) -> Option<ElfInfo> {
    if data.len() < 20 || !data.starts_with(b"\x7fELF") {
        return None;
    }

    let is_64bit = data[4] == 2;
    let machine = u16::from_le_bytes([data[18], data[19]]);

    Some(ElfInfo { is_64bit, machine })
}
