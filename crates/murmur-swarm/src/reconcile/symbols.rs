//! Structural symbol extraction for the three-way reconciler.
//!
//! This is deliberately not a real parser. The reconciler only needs stable
//! line ranges for top-level functions, classes, and their methods, so the
//! extraction is a lightweight scan: indentation blocks for Python,
//! brace-matched blocks for curly-brace languages. Anything it cannot make
//! sense of is a parse failure the caller escalates, never a guess.

use std::path::Path;

/// Structural kind of an extracted symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Class,
    Method,
}

/// One extracted symbol with its line range in the source it came from.
///
/// Lines are zero-based and the range is inclusive. Methods carry a
/// qualified name (`Class.method`) so the same method in two versions keys
/// to the same entry.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub signature: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Symbol table for one version of one file.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    lines: Vec<String>,
}

impl SymbolTable {
    /// Parse `content` into a symbol table, dispatching on the file
    /// extension. Unrecognized extensions fall back on the shape of the
    /// content itself.
    pub fn parse(path: &Path, content: &str) -> Result<Self, String> {
        let lines: Vec<String> = content.lines().map(str::to_owned).collect();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let symbols = match extension.as_str() {
            "py" => parse_python(&lines)?,
            "rs" | "ts" | "tsx" | "js" | "jsx" | "go" | "java" | "c" | "cc" | "cpp" | "h" => {
                parse_braces(&lines)?
            }
            _ if content.contains('{') => parse_braces(&lines)?,
            _ if content.contains("def ") => parse_python(&lines)?,
            _ => Vec::new(),
        };

        Ok(Self { symbols, lines })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|symbol| symbol.name == name)
    }

    /// Full text of a symbol's line range, used for body-level comparison.
    pub fn body_text(&self, symbol: &Symbol) -> String {
        self.lines[symbol.start_line..=symbol.end_line].join("\n")
    }

    /// Lines of a symbol's range, cloned for splicing into another version.
    pub fn body_lines(&self, symbol: &Symbol) -> Vec<String> {
        self.lines[symbol.start_line..=symbol.end_line].to_vec()
    }

    /// Whether another extracted symbol nests inside this one. Containers
    /// (a class with methods) diff by presence only; their body changes are
    /// attributed to the nested symbols.
    pub fn is_container(&self, symbol: &Symbol) -> bool {
        self.symbols.iter().any(|other| {
            symbol.start_line < other.start_line && other.end_line <= symbol.end_line
        })
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn python_header(trimmed: &str) -> Option<(SymbolKind, &str)> {
    if let Some(rest) = trimmed.strip_prefix("def ") {
        Some((SymbolKind::Function, rest))
    } else if let Some(rest) = trimmed.strip_prefix("async def ") {
        Some((SymbolKind::Function, rest))
    } else if let Some(rest) = trimmed.strip_prefix("class ") {
        Some((SymbolKind::Class, rest))
    } else {
        None
    }
}

fn python_name(rest: &str) -> String {
    rest.chars()
        .take_while(|ch| *ch != '(' && *ch != ':' && !ch.is_whitespace())
        .collect()
}

/// Last line of the indentation block opened at `header`, or `header`
/// itself when the block is empty.
fn python_block_end(lines: &[String], header: usize, header_indent: usize) -> usize {
    let mut end = header;
    for (offset, line) in lines[header + 1..].iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= header_indent {
            break;
        }
        end = header + 1 + offset;
    }
    end
}

fn parse_python(lines: &[String]) -> Result<Vec<Symbol>, String> {
    let mut symbols = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let trimmed = lines[index].trim_start();
        let Some((kind, rest)) = python_header(trimmed) else {
            index += 1;
            continue;
        };
        let indent = indent_of(&lines[index]);
        let end = python_block_end(lines, index, indent);
        if end == index {
            return Err(format!(
                "definition at line {} has an empty body",
                index + 1
            ));
        }
        let name = python_name(rest);
        if name.is_empty() {
            return Err(format!("unnamed definition at line {}", index + 1));
        }

        symbols.push(Symbol {
            name: name.clone(),
            kind,
            signature: trimmed.to_owned(),
            start_line: index,
            end_line: end,
        });

        if kind == SymbolKind::Class {
            collect_python_methods(lines, index + 1, end, indent, &name, &mut symbols)?;
        }
        index = end + 1;
    }

    Ok(symbols)
}

fn collect_python_methods(
    lines: &[String],
    from: usize,
    to: usize,
    class_indent: usize,
    class_name: &str,
    symbols: &mut Vec<Symbol>,
) -> Result<(), String> {
    let mut index = from;
    while index <= to {
        let trimmed = lines[index].trim_start();
        let header = python_header(trimmed);
        if let Some((SymbolKind::Function, rest)) = header {
            let indent = indent_of(&lines[index]);
            if indent > class_indent {
                let end = python_block_end(lines, index, indent).min(to);
                if end == index {
                    return Err(format!("method at line {} has an empty body", index + 1));
                }
                symbols.push(Symbol {
                    name: format!("{class_name}.{}", python_name(rest)),
                    kind: SymbolKind::Method,
                    signature: trimmed.to_owned(),
                    start_line: index,
                    end_line: end,
                });
                index = end + 1;
                continue;
            }
        }
        index += 1;
    }
    Ok(())
}

fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
}

fn brace_header(trimmed: &str) -> Option<(SymbolKind, String)> {
    if is_comment_line(trimmed) {
        return None;
    }
    let kind_and_rest = if let Some(at) = trimmed.find("fn ") {
        // `fn ` must start the line or follow a modifier, not sit inside a word.
        let before = &trimmed[..at];
        if before.is_empty() || before.ends_with(' ') {
            Some((SymbolKind::Function, &trimmed[at + 3..]))
        } else {
            None
        }
    } else if let Some(rest) = trimmed.strip_prefix("function ") {
        Some((SymbolKind::Function, rest))
    } else if let Some(rest) = trimmed.strip_prefix("class ") {
        Some((SymbolKind::Class, rest))
    } else if let Some(rest) = trimmed.strip_prefix("impl ") {
        Some((SymbolKind::Class, rest))
    } else if let Some(rest) = trimmed.strip_prefix("export class ") {
        Some((SymbolKind::Class, rest))
    } else if let Some(rest) = trimmed.strip_prefix("export function ") {
        Some((SymbolKind::Function, rest))
    } else {
        None
    };

    let (kind, rest) = kind_and_rest?;
    let name: String = rest
        .chars()
        .take_while(|ch| *ch != '(' && *ch != '<' && *ch != '{' && !ch.is_whitespace())
        .collect();
    if name.is_empty() {
        return None;
    }
    Some((kind, name))
}

/// Match the block opened on `header`: returns the line where brace depth
/// returns to zero, or `None` for a braceless declaration (trait method
/// signatures, `declare` stubs).
fn brace_block_end(lines: &[String], header: usize) -> Result<Option<usize>, String> {
    let mut depth: i64 = 0;
    let mut opened = false;
    for (offset, line) in lines[header..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!(
                            "unbalanced braces near line {}",
                            header + offset + 1
                        ));
                    }
                }
                _ => {}
            }
        }
        if opened && depth == 0 {
            return Ok(Some(header + offset));
        }
        if !opened && line.trim_end().ends_with(';') {
            return Ok(None);
        }
    }
    Err(format!("unterminated block opened at line {}", header + 1))
}

fn ensure_balanced(lines: &[String]) -> Result<(), String> {
    let mut depth: i64 = 0;
    for (index, line) in lines.iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!("unbalanced braces at line {}", index + 1));
                    }
                }
                _ => {}
            }
        }
    }
    if depth != 0 {
        return Err("unbalanced braces at end of file".to_owned());
    }
    Ok(())
}

fn parse_braces(lines: &[String]) -> Result<Vec<Symbol>, String> {
    ensure_balanced(lines)?;

    let mut symbols = Vec::new();
    let mut index = 0;
    while index < lines.len() {
        let trimmed = lines[index].trim_start();
        let Some((kind, name)) = brace_header(trimmed) else {
            index += 1;
            continue;
        };
        let Some(end) = brace_block_end(lines, index)? else {
            index += 1;
            continue;
        };

        symbols.push(Symbol {
            name: name.clone(),
            kind,
            signature: trimmed.to_owned(),
            start_line: index,
            end_line: end,
        });

        if kind == SymbolKind::Class {
            collect_brace_methods(lines, index + 1, end, &name, &mut symbols)?;
        }
        index = end + 1;
    }

    Ok(symbols)
}

fn collect_brace_methods(
    lines: &[String],
    from: usize,
    to: usize,
    class_name: &str,
    symbols: &mut Vec<Symbol>,
) -> Result<(), String> {
    let mut index = from;
    while index < to {
        let trimmed = lines[index].trim_start();
        if let Some((SymbolKind::Function, name)) = brace_header(trimmed) {
            if let Some(end) = brace_block_end(lines, index)? {
                let end = end.min(to);
                symbols.push(Symbol {
                    name: format!("{class_name}.{name}"),
                    kind: SymbolKind::Method,
                    signature: trimmed.to_owned(),
                    start_line: index,
                    end_line: end,
                });
                index = end + 1;
                continue;
            }
        }
        index += 1;
    }
    Ok(())
}
