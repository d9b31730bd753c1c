//! Second-pass label fixer (§4.7, C7)
//!
//! Rewrites a deferred instruction's operand text with its now-known symbol
//! value and re-invokes the encoder (C5) — the same algorithm whether the
//! substitution is an absolute 16-bit address or a signed PC-relative
//! displacement, only the computed value differs.

use super::encoder::{self, strip_parens, EncodeOutcome};
use super::error::Error;
use super::expression::{self, ExpressionKind};
use super::instruction_set::InstructionSet;
use super::node_processor::ForwardLabelItem;
use super::symbol::{self, SymbolTable};

fn rewrite_operands(operands: &[String], label: &str, replacement: &str) -> Vec<String> {
    operands
        .iter()
        .map(|op| {
            let upper = op.to_uppercase();
            let (core, parens) = strip_parens(&upper);
            if symbol::clean(core) == symbol::clean(label) {
                if parens {
                    format!("({})", replacement)
                } else {
                    replacement.to_string()
                }
            } else {
                op.clone()
            }
        })
        .collect()
}

/// Resolve one deferred instruction against the finalized symbol table.
pub fn resolve(
    item: &ForwardLabelItem,
    symbols: &SymbolTable,
    iset: &InstructionSet,
    line_number: usize,
) -> Result<Vec<u8>, Error> {
    let symbol = symbols
        .lookup(&item.label, item.current_major.as_deref())
        .ok_or_else(|| Error::UnresolvedSymbol {
            name: item.label.clone(),
            line_number,
        })?;
    let target = symbol.value;

    let replacement = if item.mnemonic.eq_ignore_ascii_case("JR") {
        let pc_at_next = item.emitted_at as i32 + item.tentative_length as i32;
        let displacement = target as i32 - pc_at_next;
        if !(-128..=127).contains(&displacement) {
            return Err(Error::DisplacementOutOfRange {
                displacement,
                line_number,
            });
        }
        expression::format(ExpressionKind::Hex8, (displacement & 0xFF) as i64)
    } else if item.width == 16 {
        expression::format(ExpressionKind::Hex16, target as i64)
    } else {
        expression::format(ExpressionKind::Hex8, target as i64)
    };

    let rewritten = rewrite_operands(&item.operands, &item.label, &replacement);
    match encoder::encode(iset, &item.mnemonic, &rewritten, line_number)? {
        EncodeOutcome::Resolved(bytes) => Ok(bytes),
        EncodeOutcome::Unresolved { label, .. } => Err(Error::UnresolvedSymbol {
            name: label,
            line_number,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::symbol::{Scope, Symbol};

    fn iset() -> InstructionSet {
        InstructionSet::load()
    }

    #[test]
    fn jr_backward_branch_matches_e5() {
        let set = iset();
        let mut symbols = SymbolTable::new();
        symbols
            .add(
                Symbol {
                    name: "MAJOR".to_string(),
                    value: 0x4000,
                    scope: Scope::Local,
                    is_constant: false,
                },
                1,
            )
            .unwrap();
        symbols
            .add(
                Symbol {
                    name: ".LOOP".to_string(),
                    value: 0x4000,
                    scope: Scope::Private,
                    is_constant: false,
                },
                1,
            )
            .unwrap();
        let item = ForwardLabelItem {
            mnemonic: "JR".to_string(),
            operands: vec!["NZ".to_string(), ".LOOP".to_string()],
            label: ".LOOP".to_string(),
            width: 8,
            tentative_length: 2,
            emitted_at: 0x4000,
            current_major: Some("MAJOR".to_string()),
        };
        let bytes = resolve(&item, &symbols, &set, 1).unwrap();
        assert_eq!(bytes, vec![0x20, 0xFE]);
    }

    #[test]
    fn jr_forward_branch_matches_e6() {
        let set = iset();
        let mut symbols = SymbolTable::new();
        symbols
            .add(
                Symbol {
                    name: "FORWARD".to_string(),
                    value: 0x4003,
                    scope: Scope::Local,
                    is_constant: false,
                },
                1,
            )
            .unwrap();
        let item = ForwardLabelItem {
            mnemonic: "JR".to_string(),
            operands: vec!["NZ".to_string(), "FORWARD".to_string()],
            label: "FORWARD".to_string(),
            width: 8,
            tentative_length: 2,
            emitted_at: 0x4000,
            current_major: None,
        };
        let bytes = resolve(&item, &symbols, &set, 1).unwrap();
        assert_eq!(bytes, vec![0x20, 0x01]);
    }

    #[test]
    fn jp_absolute_substitution() {
        let set = iset();
        let mut symbols = SymbolTable::new();
        symbols
            .add(
                Symbol {
                    name: "START".to_string(),
                    value: 0x4000,
                    scope: Scope::Local,
                    is_constant: false,
                },
                1,
            )
            .unwrap();
        let item = ForwardLabelItem {
            mnemonic: "JP".to_string(),
            operands: vec!["START".to_string()],
            label: "START".to_string(),
            width: 16,
            tentative_length: 3,
            emitted_at: 0x0000,
            current_major: None,
        };
        let bytes = resolve(&item, &symbols, &set, 1).unwrap();
        assert_eq!(bytes, vec![0xC3, 0x00, 0x40]);
    }

    #[test]
    fn missing_symbol_is_unresolved_error() {
        let set = iset();
        let symbols = SymbolTable::new();
        let item = ForwardLabelItem {
            mnemonic: "JP".to_string(),
            operands: vec!["GHOST".to_string()],
            label: "GHOST".to_string(),
            width: 16,
            tentative_length: 3,
            emitted_at: 0,
            current_major: None,
        };
        let err = resolve(&item, &symbols, &set, 1).unwrap_err();
        assert!(matches!(err, Error::UnresolvedSymbol { .. }));
    }

    #[test]
    fn jr_out_of_range_displacement_errors() {
        let set = iset();
        let mut symbols = SymbolTable::new();
        symbols
            .add(
                Symbol {
                    name: "FAR".to_string(),
                    value: 0x4200,
                    scope: Scope::Local,
                    is_constant: false,
                },
                1,
            )
            .unwrap();
        let item = ForwardLabelItem {
            mnemonic: "JR".to_string(),
            operands: vec!["FAR".to_string()],
            label: "FAR".to_string(),
            width: 8,
            tentative_length: 2,
            emitted_at: 0x4000,
            current_major: None,
        };
        let err = resolve(&item, &symbols, &set, 1).unwrap_err();
        assert!(matches!(err, Error::DisplacementOutOfRange { .. }));
    }

    #[test]
    fn ld_indirect_a16_absolute_substitution() {
        let set = iset();
        let mut symbols = SymbolTable::new();
        symbols
            .add(
                Symbol {
                    name: "VALUE".to_string(),
                    value: 0xC050,
                    scope: Scope::Local,
                    is_constant: false,
                },
                1,
            )
            .unwrap();
        let item = ForwardLabelItem {
            mnemonic: "LD".to_string(),
            operands: vec!["(VALUE)".to_string(), "A".to_string()],
            label: "VALUE".to_string(),
            width: 16,
            tentative_length: 3,
            emitted_at: 0,
            current_major: None,
        };
        let bytes = resolve(&item, &symbols, &set, 1).unwrap();
        assert_eq!(bytes, vec![0xEA, 0x50, 0xC0]);
    }
}
