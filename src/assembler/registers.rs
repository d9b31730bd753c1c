//! Register and condition-code classification (§3 DATA MODEL: Register)

/// The fixed sets of register and indirect-form spellings recognized by the
/// encoder. Membership here is what discriminates "this operand is a
/// register" from "this operand is a label or a number" in §4.5 step 3a.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// 8-bit general registers: A, B, C, D, E, H, L
    R8(char),
    /// 16-bit wide registers: BC, DE, HL, SP, AF, PC
    R16(&'static str),
    /// Indirect/autoincrement forms: (HL), (HL+), (HL-), (BC), (DE), (C)
    Indirect(&'static str),
}

const R8_NAMES: [char; 7] = ['A', 'B', 'C', 'D', 'E', 'H', 'L'];
const R16_NAMES: [&str; 6] = ["BC", "DE", "HL", "SP", "AF", "PC"];
const INDIRECT_NAMES: [&str; 6] = ["(HL)", "(HL+)", "(HL-)", "(BC)", "(DE)", "(C)"];

/// Condition codes used by `JP`/`JR`/`CALL`/`RET`.
pub const CONDITION_CODES: [&str; 4] = ["NZ", "Z", "NC", "C"];

/// Classify a token as one of the fixed register/indirect spellings.
/// Matching is exact (case has already been normalized to uppercase by the
/// lexer, per §4.2).
pub fn classify(token: &str) -> Option<Register> {
    if token.len() == 1 {
        let c = token.chars().next().unwrap();
        if R8_NAMES.contains(&c) {
            return Some(Register::R8(c));
        }
    }
    if let Some(name) = R16_NAMES.iter().find(|&&n| n == token) {
        return Some(Register::R16(name));
    }
    if let Some(name) = INDIRECT_NAMES.iter().find(|&&n| n == token) {
        return Some(Register::Indirect(name));
    }
    None
}

/// True if `token` is any recognized register or indirect form.
pub fn is_register(token: &str) -> bool {
    classify(token).is_some()
}

/// True if `token` is a condition code (`NZ`, `Z`, `NC`, `C`). Note `C` is
/// ambiguous with the 8-bit register `C` and the `(C)` indirect form; callers
/// disambiguate by trying the operand-table key lookup first (§4.5 step 3b),
/// which is exactly what makes the condition code a "verbatim key" rather
/// than a register match in that algorithm.
pub fn is_condition_code(token: &str) -> bool {
    CONDITION_CODES.contains(&token)
}
