//! Imported runtime functions.
//!
//! Calls through the reserved runtime package lower to `call_import`; the
//! imported symbols come from a fixed table mapping `<pkg>.<Name>` to an
//! external module/function pair plus a signature string. Signature strings
//! are `P1,P2,...->R` with comma-separated scalar names and an empty result
//! meaning void.

use crate::compiler::compiler_errors::{CompileError, ErrorLocation};
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::wast_codegen::emitter::IndentWriter;
use crate::compiler::wast_codegen::types::{TypeArena, TypeId};
use crate::return_link_error;
use rustc_hash::FxHashMap;

/// `(import $name "module" "function" (param ...) (result ...)?)`
#[derive(Debug)]
pub struct WastImport {
    pub name: String,
    pub module: String,
    pub func: String,
    pub params: Vec<TypeId>,
    pub result: Option<TypeId>,
}

#[derive(Debug, Default)]
pub struct ImportTable {
    imports: Vec<WastImport>,
    by_symbol: FxHashMap<String, usize>,
}

impl ImportTable {
    pub fn new() -> ImportTable {
        ImportTable::default()
    }

    pub fn lookup(&self, symbol: &str) -> Option<&WastImport> {
        self.by_symbol.get(symbol).map(|&i| &self.imports[i])
    }

    pub fn add(&mut self, symbol: &str, import: WastImport) -> &WastImport {
        let index = self.imports.len();
        self.imports.push(import);
        self.by_symbol.insert(symbol.to_string(), index);
        &self.imports[index]
    }

    /// Insertion order; emission depends on it being deterministic.
    pub fn iter(&self) -> impl Iterator<Item = &WastImport> {
        self.imports.iter()
    }

    pub fn print(&self, w: &mut IndentWriter, types: &TypeArena) {
        for import in &self.imports {
            w.print_indent(
                1,
                format!(
                    "(import {} \"{}\" \"{}\"",
                    import.name, import.module, import.func
                ),
            );
            if !import.params.is_empty() {
                w.print(" (param");
                for &param in &import.params {
                    w.print(format!(" {}", types.machine_type(param)));
                }
                w.print(")");
            }
            if let Some(result) = import.result {
                w.print(format!(" (result {})", types.machine_type(result)));
            }
            w.print(")\n");
        }
    }
}

/// The fixed runtime import map: `Name -> (module, function, signature)`.
pub fn runtime_import(name: &str) -> Option<(&'static str, &'static str, &'static str)> {
    let entry = match name {
        "Print_int32" => ("spectest", "print", "int32->"),
        "Print_int64" => ("spectest", "print", "int64->"),
        "Puts" => ("", "puts", "int32->int32"),
        _ => return None,
    };
    Some(entry)
}

/// Parse a `P1,P2,...->R` signature string against the scalar table.
pub fn parse_import_signature(
    signature: &str,
    types: &mut TypeArena,
    location: TextLocation,
) -> Result<(Vec<TypeId>, Option<TypeId>), CompileError> {
    let (param_part, result_part) = match signature.split_once("->") {
        Some(parts) => parts,
        None => {
            return_link_error!(
                ErrorLocation::from_span(&location),
                "malformed import signature: '{}'",
                signature
            )
        }
    };
    let mut params = Vec::new();
    for name in param_part.split(',').filter(|p| !p.is_empty()) {
        params.push(types.scalar(name, location)?);
    }
    let result = if result_part.is_empty() {
        None
    } else {
        Some(types.scalar(result_part, location)?)
    };
    Ok((params, result))
}
