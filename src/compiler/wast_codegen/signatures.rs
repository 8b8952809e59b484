//! Interned function signatures and the function-pointer table.
//!
//! Signatures are interned by structural equivalence: the same ordered
//! parameter types and the same result slot (compared by [`TypeId`]) share
//! one `$F<n>` name, assigned at first sight and stable for the run.
//!
//! The function-pointer table assigns a contiguous integer index to every
//! function whose identifier is taken as a value; those indices are the
//! runtime representation of function-typed variables.

use crate::compiler::wast_codegen::functions::FuncId;
use crate::compiler::wast_codegen::types::TypeId;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigId(pub u32);

#[derive(Debug)]
pub struct FuncSig {
    /// `$F<n>` - referenced by `(type ...)` declarations and indirect calls.
    pub wasm_name: String,
    pub params: Vec<TypeId>,
    pub result: Option<TypeId>,
    /// Source-level name when a `type` declaration introduced this shape;
    /// emitted as a trailing comment.
    pub source_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct SignatureTable {
    sigs: Vec<FuncSig>,
}

impl SignatureTable {
    pub fn new() -> SignatureTable {
        SignatureTable::default()
    }

    /// Intern a signature, returning the canonical id for its equivalence
    /// class.
    pub fn add(&mut self, params: Vec<TypeId>, result: Option<TypeId>) -> SigId {
        for (i, sig) in self.sigs.iter().enumerate() {
            if sig.result == result && sig.params == params {
                return SigId(i as u32);
            }
        }
        let id = SigId(self.sigs.len() as u32);
        self.sigs.push(FuncSig {
            wasm_name: format!("$F{}", self.sigs.len()),
            params,
            result,
            source_name: None,
        });
        id
    }

    pub fn get(&self, id: SigId) -> &FuncSig {
        &self.sigs[id.0 as usize]
    }

    /// Attach the declared type name; the first declaration wins.
    pub fn set_source_name(&mut self, id: SigId, name: &str) {
        let sig = &mut self.sigs[id.0 as usize];
        if sig.source_name.is_none() {
            sig.source_name = Some(name.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FuncSig> {
        self.sigs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    entries: Vec<FuncId>,
    index_of: FxHashMap<FuncId, u32>,
}

impl FunctionTable {
    pub fn new() -> FunctionTable {
        FunctionTable::default()
    }

    /// Idempotent: re-registering a function returns its existing index.
    pub fn add(&mut self, func: FuncId) -> u32 {
        if let Some(&index) = self.index_of.get(&func) {
            return index;
        }
        let index = self.entries.len() as u32;
        self.entries.push(func);
        self.index_of.insert(func, index);
        index
    }

    pub fn iter(&self) -> impl Iterator<Item = &FuncId> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_signatures_share_one_entry() {
        let mut sigs = SignatureTable::new();
        let i32_ty = TypeId(0);
        let a = sigs.add(vec![i32_ty, i32_ty], Some(i32_ty));
        let b = sigs.add(vec![i32_ty, i32_ty], Some(i32_ty));
        assert_eq!(a, b);
        assert_eq!(sigs.iter().count(), 1);
        assert_eq!(sigs.get(a).wasm_name, "$F0");
    }

    #[test]
    fn different_result_slot_is_a_different_signature() {
        let mut sigs = SignatureTable::new();
        let i32_ty = TypeId(0);
        let a = sigs.add(vec![i32_ty], Some(i32_ty));
        let b = sigs.add(vec![i32_ty], None);
        let c = sigs.add(vec![], Some(i32_ty));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(sigs.get(b).wasm_name, "$F1");
        assert_eq!(sigs.get(c).wasm_name, "$F2");
    }

    #[test]
    fn names_are_stable_after_interning() {
        let mut sigs = SignatureTable::new();
        let i32_ty = TypeId(0);
        let a = sigs.add(vec![], Some(i32_ty));
        sigs.add(vec![i32_ty], None);
        let again = sigs.add(vec![], Some(i32_ty));
        assert_eq!(a, again);
        assert_eq!(sigs.get(again).wasm_name, "$F0");
    }

    #[test]
    fn function_table_indices_are_contiguous_and_idempotent() {
        let mut table = FunctionTable::new();
        assert_eq!(table.add(FuncId(7)), 0);
        assert_eq!(table.add(FuncId(3)), 1);
        assert_eq!(table.add(FuncId(7)), 0);
        assert_eq!(table.add(FuncId(9)), 2);
        let order: Vec<FuncId> = table.iter().copied().collect();
        assert_eq!(order, vec![FuncId(7), FuncId(3), FuncId(9)]);
    }
}
