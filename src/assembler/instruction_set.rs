//! The CPU instruction database loader (§4.9, §6, C9)
//!
//! The JSON instruction database is an opaque, externally-authored input
//! per §1/§6; this crate treats it as compiled-in data (`include_str!`)
//! rather than a runtime file path, since spec.md explicitly keeps "the
//! source file reader abstraction" out of the translation pipeline's
//! contract. The transform below mirrors
//! `gbasm/instruction/instruction_set.py`: each JSON record is inserted
//! into a decision table keyed by `(mnemonic, operand1?, operand2?)`, a
//! flat analogue of the nested dict the original builds (§9 REDESIGN
//! FLAGS: "prefer tagged variants per operand position with a flat match
//! table keyed by a canonical operand-signature tuple").

use serde::Deserialize;
use std::collections::HashMap;

const RAW_JSON: &str = include_str!("gbz80_opcodes.json");

#[derive(Debug, Clone, Deserialize)]
struct OpcodeRecord {
    mnemonic: String,
    #[serde(default)]
    operand1: Option<String>,
    #[serde(default)]
    operand2: Option<String>,
    length: u8,
    cycles: Vec<u32>,
    flags: [String; 4],
}

/// Metadata about one opcode, keyed by its numeric value (0x00-0xFF for
/// unprefixed opcodes, 0xCB00-0xCBFF for the `CB`-prefixed family). This is
/// the "second reverse map" from §4.9, useful for disassembly-style
/// metadata retrieval.
#[derive(Debug, Clone)]
pub struct OpcodeInfo {
    pub mnemonic: String,
    pub operand1: Option<String>,
    pub operand2: Option<String>,
    pub length: u8,
    pub cycles: Vec<u32>,
    pub flags: [String; 4],
}

/// The key a decision-table entry is reached by: the mnemonic plus up to
/// two operand-position keys, exactly as they appear in the JSON database
/// (register names, placeholders like `d8`/`a16`/`r8`, condition codes, or
/// the normalized `#$xx` RST targets — see Open Question (c)).
pub type FormKey = (String, Option<String>, Option<String>);

/// A mnemonic's reachable decision-table entry, with enough shape
/// information for the encoder to decide if a numeric/label operand is
/// compatible with this form without re-parsing the key string everywhere.
#[derive(Debug, Clone)]
pub struct Form {
    pub operand1: Option<String>,
    pub operand2: Option<String>,
    pub opcode: u32,
}

pub struct InstructionSet {
    table: HashMap<FormKey, u32>,
    /// All forms grouped by mnemonic, for operand-compatibility search.
    by_mnemonic: HashMap<String, Vec<Form>>,
    by_opcode: HashMap<u32, OpcodeInfo>,
}

fn parse_key(key: &str) -> Option<u32> {
    if key.len() == 5 && key.starts_with("0x1") {
        let suboffset = u32::from_str_radix(&key[3..], 16).ok()?;
        Some(0xCB00 | suboffset)
    } else if let Some(stripped) = key.strip_prefix("0x") {
        u32::from_str_radix(stripped, 16).ok()
    } else {
        None
    }
}

/// Normalize a JSON RST target spelling (`"00H"`, `"38H"`, ...) into the
/// internal `#$xx` key the encoder's RST exception expects (Open Question
/// (c) in SPEC_FULL.md §9).
fn normalize_rst_operand(operand: &str) -> String {
    if let Some(digits) = operand.strip_suffix('H') {
        if let Ok(value) = u8::from_str_radix(digits, 16) {
            return format!("#${:02X}", value);
        }
    }
    operand.to_string()
}

impl InstructionSet {
    /// Load and build the decision table from the embedded JSON database.
    pub fn load() -> InstructionSet {
        let raw: HashMap<String, OpcodeRecord> =
            serde_json::from_str(RAW_JSON).expect("embedded instruction database is valid JSON");

        let mut table = HashMap::new();
        let mut by_mnemonic: HashMap<String, Vec<Form>> = HashMap::new();
        let mut by_opcode = HashMap::new();

        for (key, record) in raw {
            // The PREFIX entry (opcode 0xCB) is dispatch-structural, not a
            // real mnemonic operands can target (§6).
            if record.mnemonic == "PREFIX" {
                continue;
            }
            let Some(opcode) = parse_key(&key) else {
                continue;
            };

            let mnemonic = record.mnemonic.to_uppercase();
            let operand1 = record.operand1.as_deref().map(|o| {
                if mnemonic == "RST" {
                    normalize_rst_operand(o)
                } else {
                    o.to_string()
                }
            });
            let operand2 = record.operand2.clone();

            table.insert((mnemonic.clone(), operand1.clone(), operand2.clone()), opcode);
            by_mnemonic.entry(mnemonic).or_default().push(Form {
                operand1,
                operand2,
                opcode,
            });

            by_opcode.insert(
                opcode,
                OpcodeInfo {
                    mnemonic: record.mnemonic.clone(),
                    operand1: record.operand1.clone(),
                    operand2: record.operand2.clone(),
                    length: record.length,
                    cycles: record.cycles.clone(),
                    flags: record.flags.clone(),
                },
            );
        }

        InstructionSet {
            table,
            by_mnemonic,
            by_opcode,
        }
    }

    pub fn is_mnemonic(&self, mnemonic: &str) -> bool {
        self.by_mnemonic.contains_key(&mnemonic.to_uppercase())
    }

    /// Exact lookup of one decision-table leaf.
    pub fn lookup(&self, mnemonic: &str, operand1: Option<&str>, operand2: Option<&str>) -> Option<u32> {
        let key = (
            mnemonic.to_uppercase(),
            operand1.map(|s| s.to_string()),
            operand2.map(|s| s.to_string()),
        );
        self.table.get(&key).copied()
    }

    /// All forms registered for a mnemonic, used by the encoder to search
    /// for a placeholder key compatible with a numeric or label operand.
    pub fn forms(&self, mnemonic: &str) -> &[Form] {
        self.by_mnemonic
            .get(&mnemonic.to_uppercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn opcode_info(&self, opcode: u32) -> Option<&OpcodeInfo> {
        self.by_opcode.get(&opcode)
    }
}
