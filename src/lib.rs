//! A two-pass assembler for the Sharp LR35902 (the Game Boy CPU), featuring:
//! - an expression parser and numeric conversions
//! - a context-sensitive line lexer
//! - a symbol table with private/local/global scoping
//! - a section and storage model
//! - a nested-operand instruction encoder
//! - a two-pass driver with a second-pass label resolver

pub mod assembler;
pub mod logging;
