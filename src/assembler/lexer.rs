//! Line tokenizer: source text to [`LineNode`]s (§4.2, C2)
//!
//! The tokenizer is pure — it never consults the symbol table — so it can
//! run once and feed both passes (§4.2: "the tokenizer is pure... it
//! preserves original source-line numbers for error reporting").

use regex::Regex;

use super::instruction_set::InstructionSet;
use super::section::StorageKind;
use super::symbol;

const DIRECTIVE_KEYWORDS: [&str; 15] = [
    "EQU", "SET", "SECTION", "EQUS", "MACRO", "ENDM", "EXPORT", "GLOBAL", "PURGE", "INCBIN",
    "UNION", "NEXTU", "ENDU", "DEF", "ORG",
];

fn storage_kind_of(token: &str) -> Option<StorageKind> {
    match token {
        "DS" => Some(StorageKind::Space),
        "DB" => Some(StorageKind::Byte),
        "DW" => Some(StorageKind::Word),
        "DL" => Some(StorageKind::Long),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineNodeKind {
    Directive { name: String, args: Vec<String> },
    Storage { kind: StorageKind, args: Vec<String> },
    Instruction { mnemonic: String, operands: Vec<String> },
    Label { name: String },
    Compound { parts: Vec<LineNode> },
    Invalid { raw: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineNode {
    pub line_number: usize,
    pub kind: LineNodeKind,
}

/// Uppercase everything outside double-quoted string content (§6: "lines
/// are case-insensitive except inside string literals").
fn selective_uppercase(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_quotes = false;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            out.push(c);
        } else if in_quotes {
            out.push(c);
        } else {
            out.push(c.to_ascii_uppercase());
        }
    }
    out
}

/// Split a cleaned, uppercased line into raw lexemes: a double-quoted run is
/// one atomic match, otherwise a run of anything but a comma or whitespace
/// (§4.2), exactly the teacher's own quote-aware split.
fn lexeme_regex() -> Regex {
    Regex::new(r#""[^"]*"|[^,\s]+"#).unwrap()
}

/// Re-join a run of lexemes that opens a `(` but doesn't close it in the
/// same lexeme, stripping the interior whitespace that separated them, so
/// `( HL + )` and `(HL+)` tokenize identically (§4.2: "explode brackets...
/// then re-join pieces inside matching brackets with spaces removed").
fn rejoin_brackets(raw: Vec<String>) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        if raw[i].starts_with('(') && !raw[i].ends_with(')') {
            let mut joined = raw[i].clone();
            i += 1;
            while i < raw.len() {
                joined.push_str(&raw[i]);
                let closed = raw[i].ends_with(')');
                i += 1;
                if closed {
                    break;
                }
            }
            tokens.push(joined);
        } else {
            tokens.push(raw[i].clone());
            i += 1;
        }
    }
    tokens
}

fn split_tokens(line: &str) -> Vec<String> {
    let raw: Vec<String> = lexeme_regex()
        .find_iter(line)
        .map(|m| m.as_str().to_string())
        .collect();
    rejoin_brackets(raw)
}

fn classify_tokens(tokens: &[String], iset: &InstructionSet, line_number: usize) -> LineNodeKind {
    let first = &tokens[0];
    let rest = tokens[1..].to_vec();

    if DIRECTIVE_KEYWORDS.contains(&first.as_str()) {
        return LineNodeKind::Directive {
            name: first.clone(),
            args: rest,
        };
    }
    if let Some(kind) = storage_kind_of(first) {
        return LineNodeKind::Storage { kind, args: rest };
    }
    if iset.is_mnemonic(first) {
        return LineNodeKind::Instruction {
            mnemonic: first.clone(),
            operands: rest,
        };
    }
    if symbol::is_valid_name(first) {
        if tokens.len() == 1 {
            return LineNodeKind::Label { name: first.clone() };
        }
        let remainder = classify_tokens(&tokens[1..], iset, line_number);
        if matches!(remainder, LineNodeKind::Label { .. }) {
            return LineNodeKind::Invalid {
                raw: tokens.join(" "),
            };
        }
        return LineNodeKind::Compound {
            parts: vec![
                LineNode {
                    line_number,
                    kind: LineNodeKind::Label { name: first.clone() },
                },
                LineNode {
                    line_number,
                    kind: remainder,
                },
            ],
        };
    }
    LineNodeKind::Invalid {
        raw: tokens.join(" "),
    }
}

/// Tokenize an entire source buffer into a sequence of [`LineNode`]s, one
/// per non-blank, non-comment-only line.
pub fn tokenize_buffer(text: &str, iset: &InstructionSet) -> Vec<LineNode> {
    let mut nodes = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let without_comment = raw_line.splitn(2, ';').next().unwrap_or("");
        let trimmed = without_comment.trim();
        if trimmed.is_empty() || trimmed.starts_with('*') {
            continue;
        }
        let cleaned = selective_uppercase(trimmed);
        let tokens = split_tokens(&cleaned);
        if tokens.is_empty() {
            continue;
        }
        let kind = classify_tokens(&tokens, iset, line_number);
        nodes.push(LineNode { line_number, kind });
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_only_lines() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer("\n; just a comment\n* also a comment\nNOP\n", &iset);
        assert_eq!(nodes.len(), 1);
        assert!(matches!(nodes[0].kind, LineNodeKind::Instruction { .. }));
    }

    #[test]
    fn classifies_directive() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer("SECTION \"x\",ROM0", &iset);
        assert_eq!(nodes.len(), 1);
        match &nodes[0].kind {
            LineNodeKind::Directive { name, args } => {
                assert_eq!(name, "SECTION");
                assert_eq!(args, &vec!["\"x\"".to_string(), "ROM0".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn classifies_storage() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer("DB $FF,$00,\"AB\"", &iset);
        match &nodes[0].kind {
            LineNodeKind::Storage { kind, args } => {
                assert_eq!(*kind, StorageKind::Byte);
                assert_eq!(args, &vec!["$FF".to_string(), "$00".to_string(), "\"AB\"".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn explodes_and_rejoins_indirect_forms() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer("LD A, ( HL + )", &iset);
        match &nodes[0].kind {
            LineNodeKind::Instruction { mnemonic, operands } => {
                assert_eq!(mnemonic, "LD");
                assert_eq!(operands, &vec!["A".to_string(), "(HL+)".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bare_label_alone() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer(".loop:", &iset);
        assert_eq!(nodes[0].kind, LineNodeKind::Label { name: ".LOOP:".to_string() });
    }

    #[test]
    fn compound_label_plus_instruction() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer(".start: ld HL, BIGVAL", &iset);
        match &nodes[0].kind {
            LineNodeKind::Compound { parts } => {
                assert_eq!(parts.len(), 2);
                assert_eq!(
                    parts[0].kind,
                    LineNodeKind::Label {
                        name: ".START:".to_string()
                    }
                );
                assert!(matches!(parts[1].kind, LineNodeKind::Instruction { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn string_literal_case_is_preserved() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer("DB \"Hello\"", &iset);
        match &nodes[0].kind {
            LineNodeKind::Storage { args, .. } => {
                assert_eq!(args[0], "\"Hello\"");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn two_bare_labels_in_a_row_is_invalid() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer("FOO BAR", &iset);
        assert!(matches!(nodes[0].kind, LineNodeKind::Invalid { .. }));
    }

    #[test]
    fn unknown_token_is_invalid() {
        let iset = InstructionSet::load();
        let nodes = tokenize_buffer("1BADNAME", &iset);
        assert!(matches!(nodes[0].kind, LineNodeKind::Invalid { .. }));
    }
}
