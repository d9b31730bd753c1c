//! Per-line dispatcher: [`LineNode`] to zero or more [`CodeItem`]s (§4.6, C6)

use super::encoder::{self, EncodeOutcome};
use super::error::Error;
use super::expression::Expression;
use super::instruction_set::InstructionSet;
use super::lexer::{LineNode, LineNodeKind};
use super::section::{InstructionPointer, Section, StorageKind};
use super::symbol::{self, Scope, Symbol, SymbolTable};

/// A deferred instruction whose operand named a not-yet-defined label. C7
/// rewrites `operands` with the symbol's resolved value and re-invokes C5.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardLabelItem {
    pub mnemonic: String,
    pub operands: Vec<String>,
    pub label: String,
    pub width: u8,
    pub tentative_length: u16,
    pub emitted_at: u16,
    pub current_major: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnresolvedKind {
    ForwardLabel(ForwardLabelItem),
    /// A line that already failed classification or encoding outright;
    /// carried through as a code item per §4.6 rather than aborting pass 1
    /// immediately, so C8 can still collect every diagnostic in one pass.
    Diagnostic(Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodeItemKind {
    Instruction { bytes: Vec<u8> },
    Label { name: String },
    Equate { name: String, value: u16 },
    Storage { bytes: Vec<u8> },
    Section { name: String, start: u16 },
    Unresolved(UnresolvedKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeItem {
    pub line_number: usize,
    pub offset: u16,
    pub kind: CodeItemKind,
}

fn conservative_length(mnemonic: &str) -> u16 {
    match mnemonic.to_uppercase().as_str() {
        "JR" => 2,
        "JP" | "CALL" | "LD" | "LDH" => 3,
        _ => 1,
    }
}

fn parse_section_directive(args: &[String], line_number: usize) -> Result<Section, Error> {
    if args.len() < 2 {
        return Err(Error::SectionDeclaration {
            message: "SECTION requires a name and a kind".to_string(),
            line_number,
        });
    }
    let raw_name = &args[0];
    let name = raw_name
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| Error::SectionDeclaration {
            message: format!("section name \"{}\" must be quoted", raw_name),
            line_number,
        })?;

    let mut bank = None;
    for qualifier in &args[2..] {
        if let Some(inner) = qualifier.strip_prefix("BANK[").and_then(|s| s.strip_suffix(']')) {
            let value = Expression::parse(inner, line_number)?;
            bank = Some(value.to_decimal().ok_or_else(|| Error::SectionDeclaration {
                message: format!("non-numeric BANK qualifier \"{}\"", qualifier),
                line_number,
            })? as u16);
        }
    }

    Section::new(name, &args[1], bank, line_number)
}

fn process_label(name: &str, ip: &InstructionPointer, symbols: &mut SymbolTable, line_number: usize) -> Result<CodeItem, Error> {
    let scope = symbol::scope_of(name);
    symbols.add(
        Symbol {
            name: name.to_string(),
            value: ip.location,
            scope,
            is_constant: false,
        },
        line_number,
    )?;
    Ok(CodeItem {
        line_number,
        offset: ip.offset_from_base(),
        kind: CodeItemKind::Label { name: name.to_string() },
    })
}

/// Process one [`LineNode`], mutating the symbol table and instruction
/// pointer, and return the code items it produces.
pub fn process(
    node: &LineNode,
    iset: &InstructionSet,
    symbols: &mut SymbolTable,
    ip: &mut InstructionPointer,
    current_section: &mut Option<Section>,
) -> Result<Vec<CodeItem>, Error> {
    let line_number = node.line_number;
    match &node.kind {
        LineNodeKind::Directive { name, args } if name == "SECTION" => {
            let section = parse_section_directive(args, line_number)?;
            ip.enter_section(&section);
            let item = CodeItem {
                line_number,
                offset: 0,
                kind: CodeItemKind::Section {
                    name: section.name.clone(),
                    start: section.start,
                },
            };
            *current_section = Some(section);
            Ok(vec![item])
        }
        LineNodeKind::Directive { name, args } if name == "ORG" => {
            let section = current_section.as_ref().ok_or_else(|| Error::SectionDeclaration {
                message: "ORG outside of a SECTION".to_string(),
                line_number,
            })?;
            let expr = args.first().ok_or_else(|| Error::SectionDeclaration {
                message: "ORG requires an address expression".to_string(),
                line_number,
            })?;
            let value = Expression::parse(expr, line_number)?
                .to_decimal()
                .ok_or_else(|| Error::SectionDeclaration {
                    message: format!("non-numeric ORG operand \"{}\"", expr),
                    line_number,
                })? as u16;
            if value < section.start || value > section.end {
                return Err(Error::SectionDeclaration {
                    message: format!(
                        "ORG {:#06X} falls outside the current section's range [{:#06X}, {:#06X}]",
                        value, section.start, section.end
                    ),
                    line_number,
                });
            }
            ip.location = value;
            Ok(vec![])
        }
        LineNodeKind::Directive { name, .. } if name == "EQU" || name == "SET" => {
            Err(Error::LexSyntax {
                message: format!("{} directive requires a preceding label", name),
                line_number,
            })
        }
        LineNodeKind::Directive { .. } => {
            // EXPORT/GLOBAL/PURGE/DEF/EQUS/MACRO/ENDM/UNION/NEXTU/ENDU/INCBIN:
            // recognized syntax, no modeled semantics (§1 Non-goals / out of
            // scope collaborators).
            Ok(vec![])
        }
        LineNodeKind::Storage { kind, args } => {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let bytes = match kind {
                StorageKind::Space => super::section::encode_ds(&refs, line_number)?,
                StorageKind::Byte => super::section::encode_db(&refs, line_number)?,
                StorageKind::Word => super::section::encode_dw(&refs, line_number)?,
                StorageKind::Long => super::section::encode_dl(&refs, line_number)?,
            };
            let offset = ip.offset_from_base();
            ip.advance(bytes.len() as u16);
            Ok(vec![CodeItem {
                line_number,
                offset,
                kind: CodeItemKind::Storage { bytes },
            }])
        }
        LineNodeKind::Instruction { mnemonic, operands } => {
            match encoder::encode(iset, mnemonic, operands, line_number)? {
                EncodeOutcome::Resolved(bytes) => {
                    let offset = ip.offset_from_base();
                    ip.advance(bytes.len() as u16);
                    Ok(vec![CodeItem {
                        line_number,
                        offset,
                        kind: CodeItemKind::Instruction { bytes },
                    }])
                }
                EncodeOutcome::Unresolved { label, width } => {
                    let tentative_length = conservative_length(mnemonic);
                    let offset = ip.offset_from_base();
                    let emitted_at = ip.location;
                    ip.advance(tentative_length);
                    Ok(vec![CodeItem {
                        line_number,
                        offset,
                        kind: CodeItemKind::Unresolved(UnresolvedKind::ForwardLabel(ForwardLabelItem {
                            mnemonic: mnemonic.clone(),
                            operands: operands.clone(),
                            label,
                            width,
                            tentative_length,
                            emitted_at,
                            current_major: symbols.current_major().map(str::to_string),
                        })),
                    }])
                }
            }
        }
        LineNodeKind::Label { name } => Ok(vec![process_label(name, ip, symbols, line_number)?]),
        LineNodeKind::Compound { parts } => {
            let label_name = match &parts[0].kind {
                LineNodeKind::Label { name } => name.clone(),
                other => panic!("compound's first part must be a label, got {:?}", other),
            };

            if let LineNodeKind::Directive { name, args } = &parts[1].kind {
                if name == "EQU" || name == "SET" {
                    let expr_text = args.first().ok_or_else(|| Error::LexSyntax {
                        message: format!("{} requires a value", name),
                        line_number,
                    })?;
                    let value = Expression::parse(expr_text, line_number)?
                        .to_decimal()
                        .ok_or_else(|| Error::LexSyntax {
                            message: format!("non-numeric {} value \"{}\"", name, expr_text),
                            line_number,
                        })? as u16;
                    let scope = symbol::scope_of(&label_name);
                    symbols.add(
                        Symbol {
                            name: label_name.clone(),
                            value,
                            scope,
                            is_constant: true,
                        },
                        line_number,
                    )?;
                    return Ok(vec![CodeItem {
                        line_number,
                        offset: ip.offset_from_base(),
                        kind: CodeItemKind::Equate {
                            name: label_name,
                            value,
                        },
                    }]);
                }
            }

            let label_item = process_label(&label_name, ip, symbols, line_number)?;
            let mut rest = process(&parts[1], iset, symbols, ip, current_section)?;
            let mut items = vec![label_item];
            items.append(&mut rest);
            Ok(items)
        }
        LineNodeKind::Invalid { raw } => Ok(vec![CodeItem {
            line_number,
            offset: ip.offset_from_base(),
            kind: CodeItemKind::Unresolved(UnresolvedKind::Diagnostic(Error::LexSyntax {
                message: format!("malformed line \"{}\"", raw),
                line_number,
            })),
        }]),
    }
}
