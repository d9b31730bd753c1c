//! The symbol table: labels and equates with scope classes (§4.3, C3)

use super::error::Error;
use std::collections::HashMap;

/// The three scope classes from §3 DATA MODEL: Symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `.name:` — visible only inside the enclosing LOCAL/GLOBAL symbol.
    Private,
    /// bare identifier or trailing single `:`.
    Local,
    /// trailing `::` — visible to other translation units (flag only;
    /// cross-file linkage itself is out of scope).
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub value: u16,
    pub scope: Scope,
    pub is_constant: bool,
}

/// Clean a raw label token down to its comparison key: strip a leading `.`
/// and trailing `:`/`::`, then uppercase (§4.3: "keys are the cleaned,
/// uppercased name").
pub fn clean(name: &str) -> String {
    let stripped = name.strip_prefix('.').unwrap_or(name);
    let stripped = stripped
        .strip_suffix("::")
        .or_else(|| stripped.strip_suffix(':'))
        .unwrap_or(stripped);
    stripped.to_uppercase()
}

/// Classify a raw label token's scope from its surface syntax (§3: Symbol).
pub fn scope_of(name: &str) -> Scope {
    if name.starts_with('.') {
        Scope::Private
    } else if name.ends_with("::") {
        Scope::Global
    } else {
        Scope::Local
    }
}

/// Names must be 1-16 characters; first char alphabetic or `.`; remainder
/// alphanumeric or `.`/`:`/`_` (§3: Symbol).
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 16 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !(first.is_alphabetic() || first == '.') {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || c == '.' || c == ':' || c == '_')
}

/// The symbol table: a mapping of cleaned label names to their symbols,
/// with private symbols keyed by a `<major>\0<name>` composite so a
/// private label never shadows another major's private of the same bare
/// name (§4.3).
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    /// Cleaned name of the currently active LOCAL/GLOBAL symbol, used to
    /// build the composite key for PRIVATE symbols.
    current_major: Option<String>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// The cleaned name of the most recently added LOCAL/GLOBAL symbol.
    pub fn current_major(&self) -> Option<&str> {
        self.current_major.as_deref()
    }

    /// A private symbol with no preceding major is keyed on its own bare
    /// name, same as a local — it simply has no sibling private to collide
    /// with yet (§8 E5 defines a private label as the first thing after a
    /// `SECTION`, with no enclosing major at all).
    fn key_for(&self, name: &str, scope: Scope) -> String {
        let cleaned = clean(name);
        match scope {
            Scope::Private => match &self.current_major {
                Some(major) => format!("{}\0{}", major, cleaned),
                None => cleaned,
            },
            Scope::Local | Scope::Global => cleaned,
        }
    }

    /// Insert or update a symbol. Re-adding an existing address-defined
    /// symbol is a [`Error::DuplicateSymbol`]; re-adding an `EQU` with the
    /// same value is idempotent (§4.3).
    pub fn add(&mut self, symbol: Symbol, line_number: usize) -> Result<(), Error> {
        let key = self.key_for(&symbol.name, symbol.scope);
        if let Some(existing) = self.symbols.get(&key) {
            let same_value = existing.value == symbol.value;
            let both_constants = existing.is_constant && symbol.is_constant;
            if !(both_constants && same_value) {
                return Err(Error::DuplicateSymbol {
                    name: symbol.name.clone(),
                    line_number,
                });
            }
        }
        // Only an address-defined LOCAL/GLOBAL label becomes the enclosing
        // major for later PRIVATE lookups — an EQU constant shares the same
        // naming rules but never consumes address space (§4.6: this is
        // "Label(...)"'s job, not "Directive(EQU, ...)"'s).
        if !symbol.is_constant && matches!(symbol.scope, Scope::Local | Scope::Global) {
            self.current_major = Some(key.clone());
        }
        self.symbols.insert(key, symbol);
        Ok(())
    }

    /// Look up a symbol by its raw (possibly `.`/`:`-decorated) name.
    /// `current_major`, if given, overrides the table's own tracked major
    /// for resolving a private lookup (used by the resolver in pass 2,
    /// which replays symbols line-by-line rather than sequentially
    /// mutating the live table).
    pub fn lookup(&self, name: &str, current_major: Option<&str>) -> Option<&Symbol> {
        let cleaned = clean(name);
        match scope_of(name) {
            Scope::Private => match current_major.or(self.current_major.as_deref()) {
                Some(major) => self.symbols.get(&format!("{}\0{}", major, cleaned)),
                None => self.symbols.get(&cleaned),
            },
            Scope::Local | Scope::Global => self.symbols.get(&cleaned),
        }
    }

    pub fn remove(&mut self, name: &str) {
        let cleaned = clean(name);
        self.symbols.retain(|k, _| k != &cleaned && !k.ends_with(&format!("\0{}", cleaned)));
    }

    pub fn all_global(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().filter(|s| s.scope == Scope::Global)
    }

    pub fn all_local(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().filter(|s| s.scope == Scope::Local)
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.current_major = None;
    }
}
