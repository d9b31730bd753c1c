//! A two-pass assembler for the Sharp LR35902 (the Game Boy CPU).
//!
//! Pass 1 tokenizes the source (C2) and walks each line through the node
//! processor (C6), which dispatches to the expression parser (C1), symbol
//! table (C3), section/storage model (C4), and instruction encoder (C5).
//! Forward label references are deferred as `UNRESOLVED` code items with a
//! conservative tentative length so later addresses stay stable. Pass 2
//! replays the code item list, handing each `UNRESOLVED` item to the
//! resolver (C7), which rewrites its operand text with the now-known
//! symbol value and re-invokes the encoder.
//!
//! Comments start with `;` and run to the end of the line; a `*` in the
//! first column marks the whole line as a comment. Source is
//! case-insensitive except inside double-quoted string literals. See
//! `lexer` for the exact tokenization rules and `instruction_set` for the
//! supported mnemonics.

pub mod encoder;
pub mod error;
pub mod expression;
pub mod instruction_set;
pub mod lexer;
pub mod node_processor;
pub mod registers;
pub mod resolver;
pub mod section;
pub mod symbol;

use error::Error;
use instruction_set::InstructionSet;
use node_processor::{CodeItem, CodeItemKind, UnresolvedKind};
use section::{InstructionPointer, Section};
use std::fs;
use symbol::SymbolTable;

/// A contiguous run of bytes at a fixed absolute address, as produced by one
/// storage item or resolved instruction (§6: "a sequence of (address,
/// bytes) runs, suitable for an object-file writer that is out of scope").
pub type EmittedRun = (u16, Vec<u8>);

/// Assemble a source file's contents into its emitted byte runs.
pub fn assemble_from_file(path: &str) -> Result<Vec<EmittedRun>, Error> {
    let source = fs::read_to_string(path).map_err(|_| Error::ReadError {
        path: path.to_string(),
    })?;
    assemble(&source)
}

/// Assemble a source string into its emitted byte runs (§4.8).
pub fn assemble(source: &str) -> Result<Vec<EmittedRun>, Error> {
    let iset = InstructionSet::load();
    let nodes = lexer::tokenize_buffer(source, &iset);

    let (code_list, symbols) = pass1(&nodes, &iset)?;
    pass2(&code_list, &symbols, &iset)
}

fn pass1(nodes: &[lexer::LineNode], iset: &InstructionSet) -> Result<(Vec<CodeItem>, SymbolTable), Error> {
    let mut symbols = SymbolTable::new();
    let mut ip = InstructionPointer::default();
    let mut current_section: Option<Section> = None;
    let mut code_list = Vec::new();

    for node in nodes {
        let items = node_processor::process(node, iset, &mut symbols, &mut ip, &mut current_section)?;
        code_list.extend(items);
    }

    Ok((code_list, symbols))
}

fn pass2(code_list: &[CodeItem], symbols: &SymbolTable, iset: &InstructionSet) -> Result<Vec<EmittedRun>, Error> {
    let mut runs = Vec::new();
    let mut current_base: u16 = 0;

    for item in code_list {
        match &item.kind {
            CodeItemKind::Section { start, .. } => {
                current_base = *start;
            }
            CodeItemKind::Label { .. } | CodeItemKind::Equate { .. } => {}
            CodeItemKind::Storage { bytes } | CodeItemKind::Instruction { bytes } => {
                let address = current_base.wrapping_add(item.offset);
                runs.push((address, bytes.clone()));
            }
            CodeItemKind::Unresolved(UnresolvedKind::Diagnostic(error)) => {
                return Err(error.clone());
            }
            CodeItemKind::Unresolved(UnresolvedKind::ForwardLabel(forward)) => {
                let bytes = resolver::resolve(forward, symbols, iset, item.line_number)?;
                let address = current_base.wrapping_add(item.offset);
                runs.push((address, bytes));
            }
        }
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e1_nop_in_rom0() {
        let runs = assemble("SECTION \"x\",ROM0\nNOP\n").unwrap();
        assert_eq!(runs, vec![(0x0000, vec![0x00])]);
    }

    #[test]
    fn e2_db_run_in_wram0() {
        let source = "SECTION \"x\",WRAM0\nCLOUDS_X: DB $FF,$00,$FF,$00,$FF,$00,$FF,$00,$FF,$00,$FF,$00,$FF,$00,$FF,$00\n";
        let runs = assemble(source).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].0, 0xC000);
        assert_eq!(
            runs[0].1,
            vec![0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00]
        );
    }

    #[test]
    fn e3_equ_and_forward_ld_hl() {
        let source = "SECTION \"g\",ROMX\nBIGVAL EQU 65500\n.start: ld HL, BIGVAL\n";
        let runs = assemble(source).unwrap();
        assert_eq!(runs.last().unwrap().1, vec![0x21, 0xDC, 0xFF]);
        assert_eq!(runs.last().unwrap().0, 0x4000);
    }

    #[test]
    fn e4_ld_hl_sp_plus_r8() {
        let runs = assemble("SECTION \"g\",ROMX\nld HL, SP+$55\n").unwrap();
        assert_eq!(runs, vec![(0x4000, vec![0xF8, 0x55])]);
    }

    #[test]
    fn e5_backward_jr_displacement() {
        let source = "SECTION \"g\",ROMX\n.loop:\n  jr nz, .loop\n";
        let runs = assemble(source).unwrap();
        assert_eq!(runs, vec![(0x4000, vec![0x20, 0xFE])]);
    }

    #[test]
    fn e6_forward_jr_displacement_past_a_nop() {
        let source = "SECTION \"g\",ROMX\n  jr nz, .forward\n  nop\n.forward:\n  nop\n";
        let runs = assemble(source).unwrap();
        assert_eq!(runs[0], (0x4000, vec![0x20, 0x01]));
        assert_eq!(runs[1], (0x4002, vec![0x00]));
        assert_eq!(runs[2], (0x4003, vec![0x00]));
    }

    #[test]
    fn duplicate_label_is_a_hard_error() {
        let source = "SECTION \"x\",ROM0\nfoo: NOP\nfoo: NOP\n";
        let err = assemble(source).unwrap_err();
        assert!(matches!(err, Error::DuplicateSymbol { .. }));
    }

    #[test]
    fn unknown_mnemonic_is_a_hard_error() {
        let err = assemble("SECTION \"x\",ROM0\nFROBNICATE A\n").unwrap_err();
        assert!(matches!(err, Error::UnknownMnemonic { .. }));
    }

    #[test]
    fn invalid_line_is_reported_as_lex_syntax() {
        let err = assemble("SECTION \"x\",ROM0\nFOO BAR\n").unwrap_err();
        assert!(matches!(err, Error::LexSyntax { .. }));
    }

    #[test]
    fn unresolved_symbol_after_pass_two() {
        let err = assemble("SECTION \"g\",ROMX\njp NOWHERE\n").unwrap_err();
        assert!(matches!(err, Error::UnresolvedSymbol { .. }));
    }
}
