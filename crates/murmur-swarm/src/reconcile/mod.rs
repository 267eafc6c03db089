//! Symbol-level three-way reconciliation.
//!
//! When two workers each started from the same base version of a file and
//! both produced divergent content, a line-based merge on generated or
//! refactored code throws spurious conflicts. This module merges at
//! function/class granularity instead: each side's changes are isolated
//! against the common base, disjoint changes are combined automatically,
//! and a symbol both sides changed differently becomes an explicit conflict
//! escalated to an external judge. The decision is whole-file pass/fail —
//! the merged output never contains conflict markers.

mod diff;
mod symbols;

use std::path::Path;

use serde::{Deserialize, Serialize};

use diff::{SymbolChange, container_of, structural_diff};
pub use symbols::{Symbol, SymbolKind, SymbolTable};

/// Why a symbol could not be auto-merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeConflictKind {
    /// One of base / A / B failed structural parsing.
    ParseFailure,
    /// Both sides modified the symbol with different results.
    BothModified,
    /// Both sides added the symbol with different bodies.
    DivergentAddition,
    /// One side modified the symbol, the other removed it.
    ModifyRemove,
    /// The versions diverge outside any recognized symbol.
    UnsupportedEdit,
}

/// One symbol the reconciler refused to merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConflict {
    /// Qualified symbol name, or a file-level marker for parse failures.
    pub symbol: String,
    pub kind: MergeConflictKind,
    pub reason: String,
}

/// Outcome of one reconciliation attempt.
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Whether the whole file merged cleanly.
    pub success: bool,
    /// Merged text, present only on success.
    pub merged: Option<String>,
    /// Symbols combined without intervention. Reported on failure too, for
    /// diagnostics; a failed merge still returns no content.
    pub auto_resolved: usize,
    pub conflicts: Vec<MergeConflict>,
    /// Set whenever the caller must hand the file to an external judge.
    pub needs_judge: bool,
}

impl MergeResult {
    fn resolved(merged: String, auto_resolved: usize) -> Self {
        Self {
            success: true,
            merged: Some(merged),
            auto_resolved,
            conflicts: Vec::new(),
            needs_judge: false,
        }
    }

    fn escalated(conflicts: Vec<MergeConflict>, auto_resolved: usize) -> Self {
        Self {
            success: false,
            merged: None,
            auto_resolved,
            conflicts,
            needs_judge: true,
        }
    }

    fn parse_failure(which: &str, reason: String) -> Self {
        Self::escalated(
            vec![MergeConflict {
                symbol: format!("<{which}>"),
                kind: MergeConflictKind::ParseFailure,
                reason,
            }],
            0,
        )
    }
}

/// An accepted edit, expressed in base-file line coordinates so all edits
/// can be applied to the base in one pass.
enum EditOp {
    Replace {
        start: usize,
        end: usize,
        lines: Vec<String>,
    },
    Remove {
        start: usize,
        end: usize,
    },
    Insert {
        at: usize,
        lines: Vec<String>,
    },
}

impl EditOp {
    fn position(&self) -> usize {
        match self {
            Self::Replace { start, .. } | Self::Remove { start, .. } => *start,
            Self::Insert { at, .. } => *at,
        }
    }
}

/// Merge `version_a` and `version_b`, both descended from `base`, at symbol
/// granularity. `path` selects the structural parser by extension.
///
/// Any parse failure or true conflict fails the merge as a whole with
/// `needs_judge` set; the reconciler never guesses and never returns
/// partially merged content as authoritative.
#[must_use]
pub fn reconcile(path: &Path, base: &str, version_a: &str, version_b: &str) -> MergeResult {
    // Trivial cases need no structure.
    if version_a == version_b {
        return MergeResult::resolved(version_a.to_owned(), 0);
    }
    if version_a == base {
        return MergeResult::resolved(version_b.to_owned(), 0);
    }
    if version_b == base {
        return MergeResult::resolved(version_a.to_owned(), 0);
    }

    let base_table = match SymbolTable::parse(path, base) {
        Ok(table) => table,
        Err(reason) => return MergeResult::parse_failure("base", reason),
    };
    let a_table = match SymbolTable::parse(path, version_a) {
        Ok(table) => table,
        Err(reason) => return MergeResult::parse_failure("version_a", reason),
    };
    let b_table = match SymbolTable::parse(path, version_b) {
        Ok(table) => table,
        Err(reason) => return MergeResult::parse_failure("version_b", reason),
    };

    let diff_a = structural_diff(&base_table, &a_table);
    let diff_b = structural_diff(&base_table, &b_table);

    let mut touched: Vec<&str> = diff_a.names().chain(diff_b.names()).collect();
    touched.sort_unstable();
    touched.dedup();

    let mut ops: Vec<EditOp> = Vec::new();
    let mut conflicts: Vec<MergeConflict> = Vec::new();
    let mut auto_resolved = 0usize;

    for name in touched {
        let change = (diff_a.get(name), diff_b.get(name));
        match change {
            (Some(SymbolChange::Modified), None) => {
                push_replace(&mut ops, name, &base_table, &a_table);
                auto_resolved += 1;
            }
            (None, Some(SymbolChange::Modified)) => {
                push_replace(&mut ops, name, &base_table, &b_table);
                auto_resolved += 1;
            }
            (Some(SymbolChange::Modified), Some(SymbolChange::Modified)) => {
                if branch_body(name, &a_table) == branch_body(name, &b_table) {
                    push_replace(&mut ops, name, &base_table, &a_table);
                    auto_resolved += 1;
                } else {
                    conflicts.push(MergeConflict {
                        symbol: name.to_owned(),
                        kind: MergeConflictKind::BothModified,
                        reason: "both versions modified this symbol differently".to_owned(),
                    });
                }
            }
            (Some(SymbolChange::Removed), None) | (None, Some(SymbolChange::Removed)) => {
                push_remove(&mut ops, name, &base_table);
                auto_resolved += 1;
            }
            (Some(SymbolChange::Removed), Some(SymbolChange::Removed)) => {
                push_remove(&mut ops, name, &base_table);
                auto_resolved += 1;
            }
            (Some(SymbolChange::Added), None) => {
                push_insert(&mut ops, name, &base_table, &a_table);
                auto_resolved += 1;
            }
            (None, Some(SymbolChange::Added)) => {
                push_insert(&mut ops, name, &base_table, &b_table);
                auto_resolved += 1;
            }
            (Some(SymbolChange::Added), Some(SymbolChange::Added)) => {
                if branch_body(name, &a_table) == branch_body(name, &b_table) {
                    // Identical in both: take it once.
                    push_insert(&mut ops, name, &base_table, &a_table);
                    auto_resolved += 1;
                } else {
                    conflicts.push(MergeConflict {
                        symbol: name.to_owned(),
                        kind: MergeConflictKind::DivergentAddition,
                        reason: "both versions added this symbol with different bodies"
                            .to_owned(),
                    });
                }
            }
            (Some(SymbolChange::Modified), Some(SymbolChange::Removed))
            | (Some(SymbolChange::Removed), Some(SymbolChange::Modified)) => {
                conflicts.push(MergeConflict {
                    symbol: name.to_owned(),
                    kind: MergeConflictKind::ModifyRemove,
                    reason: "one version modified this symbol, the other removed it"
                        .to_owned(),
                });
            }
            // Added on one side, removed/absent combinations that cannot
            // arise from a shared base; and (None, None), excluded by
            // construction of `touched`.
            _ => {
                conflicts.push(MergeConflict {
                    symbol: name.to_owned(),
                    kind: MergeConflictKind::UnsupportedEdit,
                    reason: "inconsistent change classification across versions".to_owned(),
                });
            }
        }
    }

    // The merge only carries symbol-scoped changes, so a branch that also
    // edited module-level lines (a constant, an import) must escalate —
    // applying the symbol ops alone would drop that edit while claiming
    // success.
    let base_outside = non_symbol_text(&base_table);
    if non_symbol_text(&a_table) != base_outside || non_symbol_text(&b_table) != base_outside {
        conflicts.push(MergeConflict {
            symbol: "<file>".to_owned(),
            kind: MergeConflictKind::UnsupportedEdit,
            reason: "versions diverge outside any recognized symbol".to_owned(),
        });
    }

    if !conflicts.is_empty() {
        return MergeResult::escalated(conflicts, auto_resolved);
    }
    if ops.is_empty() {
        // Both differ from base yet nothing actionable was recognized.
        return MergeResult::escalated(
            vec![MergeConflict {
                symbol: "<file>".to_owned(),
                kind: MergeConflictKind::UnsupportedEdit,
                reason: "versions diverge outside any recognized symbol".to_owned(),
            }],
            0,
        );
    }

    let merged = apply_ops(base, base_table.lines(), ops);
    MergeResult::resolved(merged, auto_resolved)
}

/// Non-blank lines outside every extracted symbol range, in order. Blank
/// lines are dropped so separator spacing around added or removed symbols
/// does not read as a module-level edit.
fn non_symbol_text(table: &SymbolTable) -> String {
    let mut covered = vec![false; table.lines().len()];
    for symbol in table.symbols() {
        for flag in &mut covered[symbol.start_line..=symbol.end_line] {
            *flag = true;
        }
    }
    table
        .lines()
        .iter()
        .enumerate()
        .filter(|(index, line)| !covered[*index] && !line.trim().is_empty())
        .map(|(_, line)| line.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn branch_body(name: &str, table: &SymbolTable) -> Option<String> {
    table.get(name).map(|symbol| table.body_text(symbol))
}

fn push_replace(ops: &mut Vec<EditOp>, name: &str, base: &SymbolTable, branch: &SymbolTable) {
    if let (Some(old), Some(new)) = (base.get(name), branch.get(name)) {
        ops.push(EditOp::Replace {
            start: old.start_line,
            end: old.end_line,
            lines: branch.body_lines(new),
        });
    }
}

fn push_remove(ops: &mut Vec<EditOp>, name: &str, base: &SymbolTable) {
    if let Some(old) = base.get(name) {
        ops.push(EditOp::Remove {
            start: old.start_line,
            end: old.end_line,
        });
    }
}

/// Place an added symbol: directly after its container's base range when it
/// is a method of an existing class, at the end of the file otherwise.
fn push_insert(ops: &mut Vec<EditOp>, name: &str, base: &SymbolTable, branch: &SymbolTable) {
    let Some(new) = branch.get(name) else {
        return;
    };
    let at = container_of(name)
        .and_then(|container| base.get(container))
        .map(|container| container.end_line + 1)
        .unwrap_or(base.lines().len());
    ops.push(EditOp::Insert {
        at,
        lines: branch.body_lines(new),
    });
}

/// Apply accepted edits to the base line array. Edits are applied in
/// descending position order so earlier splices never shift the
/// coordinates of later ones.
fn apply_ops(base: &str, base_lines: &[String], mut ops: Vec<EditOp>) -> String {
    ops.sort_by(|left, right| right.position().cmp(&left.position()));

    let mut lines: Vec<String> = base_lines.to_vec();
    for op in ops {
        match op {
            EditOp::Replace { start, end, lines: new_lines } => {
                lines.splice(start..=end, new_lines);
            }
            EditOp::Remove { start, end } => {
                lines.splice(start..=end, std::iter::empty());
            }
            EditOp::Insert { at, lines: mut new_lines } => {
                if at >= lines.len() {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.append(&mut new_lines);
                } else {
                    lines.splice(at..at, new_lines);
                }
            }
        }
    }

    let mut merged = lines.join("\n");
    if base.ends_with('\n') && !merged.ends_with('\n') {
        merged.push('\n');
    }
    merged
}
