//! Structural diff between a base symbol table and one descendant version.

use std::collections::BTreeMap;

use super::symbols::SymbolTable;

/// How one branch touched one symbol relative to the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolChange {
    Added,
    Removed,
    Modified,
}

/// All symbols one branch touched, keyed by qualified name. `BTreeMap` keeps
/// iteration deterministic so merge output is stable across runs.
#[derive(Debug, Default)]
pub struct StructuralDiff {
    changes: BTreeMap<String, SymbolChange>,
}

impl StructuralDiff {
    pub fn get(&self, name: &str) -> Option<SymbolChange> {
        self.changes.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compare `other` against `base`.
///
/// Additions and removals are judged by presence. A symbol present in both
/// is modified when its signature differs, and *also* when only its body
/// text differs — signature and line-range comparison alone under-reports
/// changes, so the body pass is not optional.
///
/// Containers (a class with nested methods) participate only as whole-block
/// additions or removals; body changes inside them belong to the nested
/// symbols. When a container is added or removed, its nested symbols are
/// folded into the container's entry rather than reported separately.
pub fn structural_diff(base: &SymbolTable, other: &SymbolTable) -> StructuralDiff {
    let mut changes = BTreeMap::new();

    for symbol in other.symbols() {
        if base.get(&symbol.name).is_none() {
            changes.insert(symbol.name.clone(), SymbolChange::Added);
        }
    }
    for symbol in base.symbols() {
        if other.get(&symbol.name).is_none() {
            changes.insert(symbol.name.clone(), SymbolChange::Removed);
        }
    }

    // Fold nested entries into their container's addition/removal.
    let folded: Vec<String> = changes
        .keys()
        .filter(|name| {
            container_of(name)
                .map(|container| changes.contains_key(container))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    for name in folded {
        changes.remove(&name);
    }

    for symbol in base.symbols() {
        let Some(theirs) = other.get(&symbol.name) else {
            continue;
        };
        if base.is_container(symbol) {
            continue;
        }
        let signature_changed = symbol.signature != theirs.signature;
        let body_changed = base.body_text(symbol) != other.body_text(theirs);
        if signature_changed || body_changed {
            changes.insert(symbol.name.clone(), SymbolChange::Modified);
        }
    }

    StructuralDiff { changes }
}

/// Qualified-name prefix of a nested symbol (`Class.method` → `Class`).
pub fn container_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(container, _)| container)
}
