//! The diagnostic taxonomy (§7 ERROR HANDLING DESIGN)
//!
//! Every hard failure produced anywhere in the pipeline is one value of this
//! enum. Layers below the driver (C1-C5) return it as a plain `Result`
//! value; C6 is the first layer allowed to *swallow* an error that looks
//! like a forward reference and turn it into an `UNRESOLVED` code item
//! instead (see `node_processor::process`).

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed line, bad label syntax, unknown token class (C2).
    LexSyntax { message: String, line_number: usize },
    /// Bad expression prefix, illegal character, unterminated string (C1).
    ExpressionSyntax { expression: String, line_number: usize },
    /// Expression length or value outside its descriptor's bounds (C1).
    ExpressionBounds { expression: String, line_number: usize },
    /// Malformed `SECTION` directive (C4).
    SectionDeclaration { message: String, line_number: usize },
    /// Unknown section kind keyword (C4).
    SectionType { kind: String, line_number: usize },
    /// DS/DB/DW/DL operand out of range or malformed (C4).
    StorageDefine { message: String, line_number: usize },
    /// Mnemonic not present in the instruction set (C5).
    UnknownMnemonic { mnemonic: String, line_number: usize },
    /// Operand not matched by any branch of the decision tree (C5).
    InvalidOperand {
        operand: String,
        mnemonic: String,
        line_number: usize,
    },
    /// Label not found in the symbol table at the end of pass 2 (C7).
    UnresolvedSymbol { name: String, line_number: usize },
    /// `JR` target unreachable with a signed 8-bit displacement (C7).
    DisplacementOutOfRange {
        displacement: i32,
        line_number: usize,
    },
    /// Two address-defined symbols share a cleaned name (C3).
    DuplicateSymbol { name: String, line_number: usize },
    /// The source file could not be read (ambient; the CLI is the only
    /// caller that hits this, `.INCLUDE`-style file inclusion is a Non-goal).
    ReadError { path: String },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LexSyntax { message, line_number } => {
                write!(f, "line {}: {}", line_number, message)
            }
            Error::ExpressionSyntax { expression, line_number } => {
                write!(
                    f,
                    "line {}: malformed expression \"{}\"",
                    line_number, expression
                )
            }
            Error::ExpressionBounds { expression, line_number } => {
                write!(
                    f,
                    "line {}: expression \"{}\" is out of bounds for its kind",
                    line_number, expression
                )
            }
            Error::SectionDeclaration { message, line_number } => {
                write!(f, "line {}: invalid SECTION declaration: {}", line_number, message)
            }
            Error::SectionType { kind, line_number } => {
                write!(f, "line {}: unknown section type \"{}\"", line_number, kind)
            }
            Error::StorageDefine { message, line_number } => {
                write!(f, "line {}: {}", line_number, message)
            }
            Error::UnknownMnemonic { mnemonic, line_number } => {
                write!(f, "line {}: unknown instruction \"{}\"", line_number, mnemonic)
            }
            Error::InvalidOperand { operand, mnemonic, line_number } => {
                write!(
                    f,
                    "line {}: invalid operand \"{}\" for instruction \"{}\"",
                    line_number, operand, mnemonic
                )
            }
            Error::UnresolvedSymbol { name, line_number } => {
                write!(f, "line {}: unresolved symbol \"{}\"", line_number, name)
            }
            Error::DisplacementOutOfRange { displacement, line_number } => {
                write!(
                    f,
                    "line {}: relative jump displacement {} is out of range [-128, 127]",
                    line_number, displacement
                )
            }
            Error::DuplicateSymbol { name, line_number } => {
                write!(f, "line {}: duplicate symbol \"{}\"", line_number, name)
            }
            Error::ReadError { path } => write!(f, "failed to read file {}", path),
        }
    }
}
