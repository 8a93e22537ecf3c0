//! Parsing of GNU-style disassembly listings.
//!
//! Consumes the raw bytes printed by `objdump -d` (or a compatible tool)
//! and yields the linear instruction stream. Section headers, symbol
//! labels, blank lines, and byte-column continuation lines are skipped.

use memchr::memchr;

/// A single instruction as printed by the disassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Virtual address of the instruction.
    pub address: u64,
    /// Mnemonic token (e.g., "je", "jne", "mov").
    pub mnemonic: String,
    /// Remainder of the line after the mnemonic, trimmed, with any
    /// trailing `#` comment stripped.
    pub operands: String,
}

impl Instruction {
    /// Check if this instruction is a conditional branch: any `j…`
    /// mnemonic except plain `jmp`, plus the `loop` family.
    pub fn is_conditional_branch(&self) -> bool {
        let m = self.mnemonic.to_ascii_lowercase();
        (m.starts_with('j') && m != "jmp")
            || matches!(m.as_str(), "loop" | "loope" | "loopne" | "loopz" | "loopnz")
    }

    /// First hex literal in the operand text: a `0x…` token, or a bare run
    /// of at least four hex digits. Symbol decorations such as `<main+0x2a>`
    /// are not stripped before scanning.
    pub fn branch_target(&self) -> Option<u64> {
        first_hex_literal(&self.operands)
    }
}

/// Parse raw disassembler output into the linear instruction sequence.
///
/// Lines that look instruction-like but fail to yield a valid address are
/// skipped silently; an input with no instruction lines produces an empty
/// sequence, not an error.
pub fn parse_listing(data: &[u8]) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let end = memchr(b'\n', &data[pos..]).map_or(data.len(), |i| pos + i);
        let mut line = &data[pos..end];
        if line.ends_with(b"\r") {
            line = &line[..line.len() - 1];
        }

        // Disassembler output is ASCII in practice; decode lossily so a
        // stray byte cannot abort the whole parse.
        let text = String::from_utf8_lossy(line);
        if let Some(insn) = parse_line(&text) {
            instructions.push(insn);
        }

        pos = end + 1;
    }

    instructions
}

/// Parse one listing line into an instruction record.
///
/// An instruction line is `<hex-address>: <raw bytes> <mnemonic> [operands]`
/// after leading-whitespace trim. The raw-byte column (space-separated
/// two-digit hex pairs) may be absent entirely.
fn parse_line(line: &str) -> Option<Instruction> {
    let t = line.trim_start();

    let colon = t.find(':')?;
    let addr_text = &t[..colon];
    if addr_text.is_empty()
        || addr_text.len() > 16
        || !addr_text.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    let address = u64::from_str_radix(addr_text, 16).ok()?;

    let rest = &t[colon + 1..];

    // Skip the raw-byte column: the first token that is not a two-digit
    // hex pair is the mnemonic. Lines holding only byte pairs are the
    // continuation of a long instruction and carry no mnemonic.
    let mut cursor = 0;
    let mnemonic = loop {
        let (token, after) = next_token(rest, cursor)?;
        cursor = after;
        if !is_byte_pair(token) {
            break token;
        }
    };

    let mut operands = rest[cursor..].trim();
    if let Some(hash) = operands.find('#') {
        operands = operands[..hash].trim_end();
    }

    Some(Instruction {
        address,
        mnemonic: mnemonic.to_string(),
        operands: operands.to_string(),
    })
}

/// Next whitespace-delimited token at or after `from`, with the byte
/// offset just past it.
fn next_token(s: &str, from: usize) -> Option<(&str, usize)> {
    let rel = s[from..].find(|c: char| !c.is_whitespace())?;
    let start = from + rel;
    let len = s[start..]
        .find(char::is_whitespace)
        .unwrap_or(s.len() - start);
    Some((&s[start..start + len], start + len))
}

fn is_byte_pair(token: &str) -> bool {
    token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Scan `s` left to right for the first hex literal: either `0x` followed
/// by hex digits, or a bare run of at least four hex digits. Once a
/// literal is found its parse result is final; a value too large for u64
/// yields `None`.
fn first_hex_literal(s: &str) -> Option<u64> {
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'0'
            && i + 2 < bytes.len()
            && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X')
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let start = i + 2;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
                end += 1;
            }
            return u64::from_str_radix(&s[start..end], 16).ok();
        }

        if bytes[i].is_ascii_hexdigit() {
            let start = i;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
                end += 1;
            }
            if end - start >= 4 {
                return u64::from_str_radix(&s[start..end], 16).ok();
            }
            i = end;
        } else {
            i += 1;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
prog_a:     file format elf64-x86-64


Disassembly of section .init:

0000000000401000 <_init>:
  401000:\tf3 0f 1e fa          \tendbr64
  401004:\t48 83 ec 08          \tsub    $0x8,%rsp

Disassembly of section .text:

0000000000401130 <main>:
  401130:\t55                   \tpush   %rbp
  401131:\t48 89 e5             \tmov    %rbp,%rsp
  401134:\t83 7d fc 00          \tcmpl   $0x0,-0x4(%rbp)
  401138:\t75 07                \tjne    401141 <main+0x11>
  40113a:\t48 8b 05 cf 2e 00 00 \tmov    0x2ecf(%rip),%rax        # 404010 <x>
  401141:\tc3                   \tret
";

    #[test]
    fn parses_instruction_lines_and_skips_noise() {
        let insns = parse_listing(SAMPLE.as_bytes());
        assert_eq!(insns.len(), 8);
        assert_eq!(insns[0].address, 0x401000);
        assert_eq!(insns[0].mnemonic, "endbr64");
        assert_eq!(insns[0].operands, "");
        assert_eq!(insns[4].mnemonic, "cmpl");
        assert_eq!(insns[4].operands, "$0x0,-0x4(%rbp)");
        assert_eq!(insns[7].mnemonic, "ret");
    }

    #[test]
    fn strips_trailing_comment() {
        let insns = parse_listing(SAMPLE.as_bytes());
        let mov = &insns[6];
        assert_eq!(mov.mnemonic, "mov");
        assert_eq!(mov.operands, "0x2ecf(%rip),%rax");
    }

    #[test]
    fn symbol_and_header_lines_ignored() {
        let insns = parse_listing(b"0000000000401130 <main>:\nDisassembly of section .text:\n\n");
        assert!(insns.is_empty());
    }

    #[test]
    fn byte_column_may_be_absent() {
        let insns = parse_listing(b"  401138:\tjne    0x401141\n");
        assert_eq!(insns.len(), 1);
        assert_eq!(insns[0].address, 0x401138);
        assert_eq!(insns[0].mnemonic, "jne");
        assert_eq!(insns[0].operands, "0x401141");
    }

    #[test]
    fn continuation_lines_have_no_mnemonic() {
        let insns = parse_listing(b"  40113a:\t48 8b 05 cf\n  40113e:\t2e 00 00\n");
        assert!(insns.is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let insns = parse_listing(b"  401138:\t75 07\tjne 401141\r\n  401141:\tc3\tret\r\n");
        assert_eq!(insns.len(), 2);
        assert_eq!(insns[1].mnemonic, "ret");
    }

    #[test]
    fn address_too_long_is_skipped() {
        let insns = parse_listing(b"  12345678901234567:\t90\tnop\n");
        assert!(insns.is_empty());
    }

    #[test]
    fn non_hex_address_is_skipped() {
        let insns = parse_listing(b"  40x138:\t90\tnop\n");
        assert!(insns.is_empty());
    }

    #[test]
    fn empty_input_is_empty_sequence() {
        assert!(parse_listing(b"").is_empty());
    }

    fn insn(mnemonic: &str, operands: &str) -> Instruction {
        Instruction {
            address: 0,
            mnemonic: mnemonic.to_string(),
            operands: operands.to_string(),
        }
    }

    #[test]
    fn conditional_branch_predicate() {
        assert!(insn("je", "0x10").is_conditional_branch());
        assert!(insn("jne", "0x10").is_conditional_branch());
        assert!(insn("js", "0x10").is_conditional_branch());
        assert!(insn("JNE", "0x10").is_conditional_branch());
        assert!(insn("loop", "0x10").is_conditional_branch());
        assert!(insn("loopne", "0x10").is_conditional_branch());
        assert!(insn("loopz", "0x10").is_conditional_branch());

        assert!(!insn("jmp", "0x10").is_conditional_branch());
        assert!(!insn("JMP", "0x10").is_conditional_branch());
        assert!(!insn("call", "0x10").is_conditional_branch());
        assert!(!insn("mov", "%rax,%rbx").is_conditional_branch());
        assert!(!insn("ret", "").is_conditional_branch());
    }

    #[test]
    fn branch_target_bare_hex_run() {
        assert_eq!(insn("jne", "401141 <main+0x11>").branch_target(), Some(0x401141));
    }

    #[test]
    fn branch_target_prefixed() {
        assert_eq!(insn("jne", "0x2a").branch_target(), Some(0x2a));
        assert_eq!(insn("jne", "0X7F").branch_target(), Some(0x7f));
    }

    #[test]
    fn branch_target_first_literal_wins() {
        // The bare run comes first in the text, the 0x token second.
        assert_eq!(insn("jne", "401141 <main+0x11>").branch_target(), Some(0x401141));
        // Without a leading bare run the 0x displacement is first.
        assert_eq!(insn("jne", "<main+0x11>").branch_target(), Some(0x11));
    }

    #[test]
    fn branch_target_short_runs_rejected() {
        // Register names decompose into hex runs shorter than four digits.
        assert_eq!(insn("jmp", "%eax").branch_target(), None);
        assert_eq!(insn("jne", "2a").branch_target(), None);
        assert_eq!(insn("ret", "").branch_target(), None);
    }

    #[test]
    fn branch_target_overflow_is_none() {
        assert_eq!(insn("jne", "123456789012345678901").branch_target(), None);
    }
}
