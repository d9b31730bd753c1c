//! The instruction encoder / operand matcher (§4.5, C5)
//!
//! Matches a mnemonic and its ordered operand tokens against the decision
//! table built by [`super::instruction_set`], producing either a fully
//! resolved byte sequence or a deferred-to-pass-2 outcome carrying the name
//! of the forward-referenced label. The caller (C6/C7) is responsible for
//! rewriting a deferred instruction's operand text with the symbol's
//! literal value and calling [`encode`] again — this function never
//! touches the symbol table itself (§4.5/§4.7: "invoke C5 again on the
//! rewritten instruction").

use super::error::Error;
use super::expression::Expression;
use super::instruction_set::{Form, InstructionSet};
use super::registers;

/// Allowed `RST` targets (§4.5 exception).
const RST_TARGETS: [u32; 8] = [0x00, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38];

#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    Resolved(Vec<u8>),
    /// The instruction could not be fully encoded because one operand
    /// refers to a not-yet-defined label. `label` is the cleaned candidate
    /// text; `width` is the placeholder width chosen for it (8 or 16),
    /// used by the resolver to know how many displacement/address bytes
    /// to eventually emit.
    Unresolved { label: String, width: u8 },
}

fn opcode_bytes(opcode: u32) -> Vec<u8> {
    if opcode > 0xFF {
        vec![(opcode >> 8) as u8, opcode as u8]
    } else {
        vec![opcode as u8]
    }
}

pub(crate) fn strip_parens(token: &str) -> (&str, bool) {
    if token.len() >= 2 && token.starts_with('(') && token.ends_with(')') {
        (&token[1..token.len() - 1], true)
    } else {
        (token, false)
    }
}

/// Keys containing `16` match 16-bit placeholders; keys containing `8`
/// (with or without a following `)`) match 8-bit placeholders.
/// Parenthesization of the key must match the operand's own (§4.5).
fn placeholder_width_and_parens(key: &str) -> Option<(u8, bool)> {
    if key == "SP+r8" {
        return None;
    }
    let parens = key.starts_with('(') && key.ends_with(')');
    let inner = if parens { &key[1..key.len() - 1] } else { key };
    if inner.contains("16") {
        Some((16, parens))
    } else if inner.contains('8') {
        Some((8, parens))
    } else {
        None
    }
}

fn field<'a>(form: &'a Form, position: usize) -> &'a Option<String> {
    if position == 0 {
        &form.operand1
    } else {
        &form.operand2
    }
}

fn value_fits(width: u8, value: u32) -> bool {
    if width == 16 {
        value <= 0xFFFF
    } else {
        value <= 0xFF
    }
}

fn push_value_bytes(bytes: &mut Vec<u8>, width: u8, value: u32) {
    if width == 16 {
        bytes.push(value as u8);
        bytes.push((value >> 8) as u8);
    } else {
        bytes.push(value as u8);
    }
}

struct MatchState<'a> {
    candidates: Vec<&'a Form>,
    operand_bytes: Vec<u8>,
    unresolved: Option<(String, u8)>,
}

fn match_operand(
    state: &mut MatchState,
    token: &str,
    position: usize,
    mnemonic: &str,
    line_number: usize,
) -> Result<(), Error> {
    let upper = token.to_uppercase();

    // Step 3a/3b: a register or condition code is matched verbatim against
    // the candidate's key at this position (§3 Register data model: this is
    // what discriminates "register" from "label or number" in the search).
    if registers::classify(&upper).is_some() || registers::is_condition_code(&upper) {
        let literal_matches: Vec<&Form> = state
            .candidates
            .iter()
            .filter(|f| field(f, position).as_deref() == Some(upper.as_str()))
            .copied()
            .collect();
        if literal_matches.is_empty() {
            return Err(Error::InvalidOperand {
                operand: token.to_string(),
                mnemonic: mnemonic.to_string(),
                line_number,
            });
        }
        state.candidates = literal_matches;
        return Ok(());
    }

    // A literal non-register key, e.g. the bit-index operand of
    // `BIT`/`RES`/`SET`, which the database spells as a bare digit rather
    // than a width placeholder.
    let literal_matches: Vec<&Form> = state
        .candidates
        .iter()
        .filter(|f| field(f, position).as_deref() == Some(upper.as_str()))
        .copied()
        .collect();
    if !literal_matches.is_empty() {
        state.candidates = literal_matches;
        return Ok(());
    }

    // `SP+r8` is only matched when the operand is literally `SP+<expr>`
    // with an 8-bit expression (§4.5).
    if let Some(rest) = upper.strip_prefix("SP+") {
        let has_sp_r8 = state
            .candidates
            .iter()
            .any(|f| field(f, position).as_deref() == Some("SP+r8"));
        if has_sp_r8 {
            let expr = Expression::parse(rest, line_number)?;
            let value = expr.to_decimal().ok_or_else(|| Error::InvalidOperand {
                operand: token.to_string(),
                mnemonic: mnemonic.to_string(),
                line_number,
            })?;
            if value > 0xFF {
                return Err(Error::InvalidOperand {
                    operand: token.to_string(),
                    mnemonic: mnemonic.to_string(),
                    line_number,
                });
            }
            state.candidates.retain(|f| field(f, position).as_deref() == Some("SP+r8"));
            state.operand_bytes.push(value as u8);
            return Ok(());
        }
    }

    let (core, parens) = strip_parens(token);

    // Step 3c: numeric interpretation.
    if let Ok(expr) = Expression::parse(core, line_number) {
        if let Some(value) = expr.to_decimal() {
            let matched: Vec<&Form> = state
                .candidates
                .iter()
                .filter(|f| {
                    field(f, position)
                        .as_deref()
                        .and_then(placeholder_width_and_parens)
                        .is_some_and(|(w, p)| p == parens && value_fits(w, value))
                })
                .copied()
                .collect();
            if matched.is_empty() {
                return Err(Error::InvalidOperand {
                    operand: token.to_string(),
                    mnemonic: mnemonic.to_string(),
                    line_number,
                });
            }
            let width = field(matched[0], position)
                .as_deref()
                .and_then(placeholder_width_and_parens)
                .unwrap()
                .0;
            state.candidates = matched;
            push_value_bytes(&mut state.operand_bytes, width, value);
            return Ok(());
        }
    }

    // Step 3d: the operand may be a forward label reference. Search for a
    // placeholder compatible with it: 8-bit only if every remaining
    // candidate's placeholder at this position is 8-bit, else 16-bit.
    let widths: Vec<(u8, bool)> = state
        .candidates
        .iter()
        .filter_map(|f| field(f, position).as_deref().and_then(placeholder_width_and_parens))
        .collect();
    if widths.is_empty() {
        return Err(Error::InvalidOperand {
            operand: token.to_string(),
            mnemonic: mnemonic.to_string(),
            line_number,
        });
    }
    let width = if widths.iter().all(|(w, _)| *w == 8) { 8 } else { 16 };

    let matched: Vec<&Form> = state
        .candidates
        .iter()
        .filter(|f| {
            field(f, position)
                .as_deref()
                .and_then(placeholder_width_and_parens)
                .is_some_and(|(w, p)| w == width && p == parens)
        })
        .copied()
        .collect();
    if matched.is_empty() {
        return Err(Error::InvalidOperand {
            operand: token.to_string(),
            mnemonic: mnemonic.to_string(),
            line_number,
        });
    }
    state.candidates = matched;
    state.unresolved = Some((core.to_string(), width));
    Ok(())
}

/// Encode `mnemonic operand_tokens...` into bytes, or defer to pass 2.
pub fn encode(
    iset: &InstructionSet,
    mnemonic: &str,
    operand_tokens: &[String],
    line_number: usize,
) -> Result<EncodeOutcome, Error> {
    let mnemonic_upper = mnemonic.to_uppercase();
    if !iset.is_mnemonic(&mnemonic_upper) {
        return Err(Error::UnknownMnemonic {
            mnemonic: mnemonic.to_string(),
            line_number,
        });
    }

    if mnemonic_upper == "RST" {
        return encode_rst(iset, operand_tokens, line_number);
    }

    if operand_tokens.is_empty() {
        return match iset.lookup(&mnemonic_upper, None, None) {
            Some(opcode) => Ok(EncodeOutcome::Resolved(opcode_bytes(opcode))),
            None => Err(Error::InvalidOperand {
                operand: String::new(),
                mnemonic: mnemonic.to_string(),
                line_number,
            }),
        };
    }

    let forms = iset.forms(&mnemonic_upper);
    let operand_count = operand_tokens.len();
    let mut state = MatchState {
        candidates: forms
            .iter()
            .filter(|f| (f.operand2.is_some()) == (operand_count == 2))
            .collect(),
        operand_bytes: Vec::new(),
        unresolved: None,
    };

    for (position, token) in operand_tokens.iter().enumerate() {
        match_operand(&mut state, token, position, &mnemonic_upper, line_number)?;
    }

    if let Some((label, width)) = state.unresolved {
        return Ok(EncodeOutcome::Unresolved { label, width });
    }

    let form = state.candidates.first().ok_or_else(|| Error::InvalidOperand {
        operand: operand_tokens.join(", "),
        mnemonic: mnemonic.to_string(),
        line_number,
    })?;
    let mut bytes = opcode_bytes(form.opcode);
    bytes.extend(state.operand_bytes);
    Ok(EncodeOutcome::Resolved(bytes))
}

fn encode_rst(
    iset: &InstructionSet,
    operand_tokens: &[String],
    line_number: usize,
) -> Result<EncodeOutcome, Error> {
    if operand_tokens.len() != 1 {
        return Err(Error::InvalidOperand {
            operand: operand_tokens.join(", "),
            mnemonic: "RST".to_string(),
            line_number,
        });
    }
    let (core, _) = strip_parens(&operand_tokens[0]);
    let expr = Expression::parse(core, line_number)?;
    let value = expr.to_decimal().ok_or_else(|| Error::InvalidOperand {
        operand: operand_tokens[0].clone(),
        mnemonic: "RST".to_string(),
        line_number,
    })?;
    if !RST_TARGETS.contains(&value) {
        return Err(Error::InvalidOperand {
            operand: operand_tokens[0].clone(),
            mnemonic: "RST".to_string(),
            line_number,
        });
    }
    let key = format!("#${:02X}", value);
    let opcode = iset
        .lookup("RST", Some(&key), None)
        .ok_or_else(|| Error::InvalidOperand {
            operand: operand_tokens[0].clone(),
            mnemonic: "RST".to_string(),
            line_number,
        })?;
    Ok(EncodeOutcome::Resolved(opcode_bytes(opcode)))
}
