//! Item model of the schema compiler's generated intermediate module.
//!
//! The generated module is a flat sequence of declarations, each preceded by
//! a documentation annotation block (`/** ... */`). The model is lossless:
//! parsing splits the text into items and rendering re-emits untouched items
//! byte-for-byte, so the rewrite passes only change what they mean to
//! change.
//!
//! Classification is special-purpose to the shapes the schema compiler is
//! known to emit (constructor functions, prototype/static member
//! assignments, namespace container variables); this is not general AST
//! tooling.

use std::sync::OnceLock;

use regex::Regex;

#[allow(clippy::expect_used)] // compile-time constant patterns
fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*function\s+([A-Za-z_$][\w$]*)\s*\(([^)]*)\)")
            .expect("function pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_$][\w$]*(?:\.[\w$]+)+)\s*=").expect("assignment pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn variable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*var\s+([A-Za-z_$][\w$]*)").expect("variable pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn tag_value_re(tag: &str) -> Regex {
    Regex::new(&format!(r"@{tag}\s+([^\s*]+)")).expect("tag pattern is valid")
}

// =============================================================================
// Documentation Annotation Block
// =============================================================================

/// A `/** ... */` documentation annotation block, kept as raw lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocBlock {
    /// Raw lines, including the `/**` and `*/` delimiters.
    pub lines: Vec<String>,
}

impl DocBlock {
    /// Build a block from raw lines.
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// True when any line carries the given tag (e.g. `constructor` for
    /// `@constructor`).
    pub fn has_tag(&self, tag: &str) -> bool {
        let marker = format!("@{tag}");
        self.lines
            .iter()
            .any(|line| tag_line_matches(line, &marker))
    }

    /// First value following the given tag, e.g. the reference after
    /// `@exports`.
    pub fn tag_value(&self, tag: &str) -> Option<String> {
        let re = tag_value_re(tag);
        self.lines
            .iter()
            .find_map(|line| re.captures(line).map(|c| c[1].to_string()))
    }

    /// Remove every line carrying one of the given tags, returning a new
    /// block.
    pub fn without_tags(&self, tags: &[&str]) -> Self {
        let markers: Vec<String> = tags.iter().map(|tag| format!("@{tag}")).collect();
        let lines = self
            .lines
            .iter()
            .filter(|line| !markers.iter().any(|marker| tag_line_matches(line, marker)))
            .cloned()
            .collect();
        Self { lines }
    }

    /// Apply a line-wise replacement, returning a new block.
    pub fn map_lines(&self, mut f: impl FnMut(&str) -> String) -> Self {
        Self {
            lines: self.lines.iter().map(|line| f(line)).collect(),
        }
    }

    /// The block as a single string, for multi-line matching.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// True when the line is an annotation line carrying the marker tag.
fn tag_line_matches(line: &str, marker: &str) -> bool {
    line.find(marker).is_some_and(|index| {
        let rest = &line[index + marker.len()..];
        rest.chars().next().is_none_or(|c| !c.is_alphanumeric())
    })
}

// =============================================================================
// Items
// =============================================================================

/// What kind of declaration an item's code is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// A constructor-like `function Name(...)` declaration.
    Function {
        /// Declared name.
        name: String,
        /// Number of declared parameters (services have more than one,
        /// messages exactly one).
        params: usize,
    },
    /// A member assignment, e.g. `Message.prototype.field = 0;`.
    Assignment {
        /// Full dotted target path left of the `=`.
        target: String,
    },
    /// A `var name = ...` declaration (namespace containers).
    Variable {
        /// Declared name.
        name: String,
    },
    /// Anything else (module wrapper lines, `Object.defineProperty`, ...).
    Other,
}

/// One declaration: an optional annotation block plus the code that follows
/// it, up to the next annotation block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// The documentation annotation block, if any.
    pub doc: Option<DocBlock>,
    /// Raw code lines.
    pub code: Vec<String>,
}

impl Item {
    /// Classify this item's code by its first non-blank line.
    pub fn kind(&self) -> ItemKind {
        let Some(line) = self.code.iter().find(|line| !line.trim().is_empty()) else {
            return ItemKind::Other;
        };
        if let Some(captures) = function_re().captures(line) {
            let params = captures[2]
                .split(',')
                .filter(|p| !p.trim().is_empty())
                .count();
            return ItemKind::Function {
                name: captures[1].to_string(),
                params,
            };
        }
        if let Some(captures) = variable_re().captures(line) {
            return ItemKind::Variable {
                name: captures[1].to_string(),
            };
        }
        if let Some(captures) = assignment_re().captures(line) {
            return ItemKind::Assignment {
                target: captures[1].to_string(),
            };
        }
        ItemKind::Other
    }

    /// The `@exports` reference, when present.
    pub fn exports_reference(&self) -> Option<String> {
        self.doc.as_ref().and_then(|doc| doc.tag_value("exports"))
    }

    /// The `@memberof` reference, when present.
    pub fn memberof(&self) -> Option<String> {
        self.doc.as_ref().and_then(|doc| doc.tag_value("memberof"))
    }
}

// =============================================================================
// Module
// =============================================================================

/// The generated intermediate module as an ordered item sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    /// Declarations in source order.
    pub items: Vec<Item>,
}

impl Module {
    /// Split generated source text into items.
    ///
    /// An item starts at each `/**` line; code lines between annotation
    /// blocks belong to the preceding item. Leading code before the first
    /// block becomes an undocumented item.
    pub fn parse(source: &str) -> Self {
        let mut items = Vec::new();
        let mut current = Item {
            doc: None,
            code: Vec::new(),
        };
        let mut started = false;

        let mut lines = source.lines().peekable();
        while let Some(line) = lines.next() {
            if line.trim_start().starts_with("/**") {
                if started {
                    items.push(current);
                }
                started = true;
                let mut doc_lines = vec![line.to_string()];
                if !line.contains("*/") {
                    for doc_line in lines.by_ref() {
                        doc_lines.push(doc_line.to_string());
                        if doc_line.contains("*/") {
                            break;
                        }
                    }
                }
                current = Item {
                    doc: Some(DocBlock::new(doc_lines)),
                    code: Vec::new(),
                };
            } else {
                started = true;
                current.code.push(line.to_string());
            }
        }
        if started {
            items.push(current);
        }
        Self { items }
    }

    /// Render the module back to source text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            if let Some(doc) = &item.doc {
                for line in &doc.lines {
                    out.push_str(line);
                    out.push('\n');
                }
            }
            for line in &item.code {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
