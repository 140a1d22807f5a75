//! Pass 3: method signature cleanup.
//!
//! Service methods are generated with transport-callback parameters and,
//! depending on compiler version, a promise-returning overload. The
//! declarations we project expose streams instead, so:
//!
//! - callback typedef blocks are removed outright, after capturing the
//!   response type they name;
//! - the callback parameter tag is removed from method annotations and the
//!   return tag is rewritten to the stream type;
//! - promise-returning overloads get the same return rewrite plus an
//!   optional transport-metadata parameter;
//! - the loosely typed `|Object` alternative the compiler offers on request
//!   parameters collapses to the single structured type;
//! - annotations on static and converter members are dropped (only simple
//!   interfaces are exported), while enum annotations are preserved.

use std::sync::OnceLock;

use regex::Regex;

use crate::rewrite::source::{DocBlock, Item, ItemKind, Module};

#[allow(clippy::expect_used)] // compile-time constant patterns
fn callback_typedef_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@typedef\s+[\w.$~]*_Callback\b").expect("typedef pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn callback_response_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@param\s+\{([^}]+)\}[^\n]*\bresponse\b").expect("response pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn callback_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@param\s+[^\n]*_Callback\b").expect("callback param pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn object_union_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(@param\s*\{[^}]*?)\|Object(\})").expect("object union pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn returns_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@returns\s*\{[^}]*\}[^\n]*").expect("returns pattern is valid"))
}

#[allow(clippy::expect_used)]
fn promise_returns_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@returns\s*\{Promise<([^}]+)>\}").expect("promise pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn converter_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.(toObject|toJSON)\b").expect("converter target pattern is valid")
    })
}

/// Apply the cleanup, returning a new module.
pub fn run(module: &Module) -> Module {
    // Captured from the most recent callback typedef; the method annotation
    // that consumes it always follows its typedef in the generated source.
    let mut pending_response: Option<String> = None;

    let items = module
        .items
        .iter()
        .map(|item| {
            let Some(doc) = &item.doc else {
                return item.clone();
            };
            if doc.has_tag("enum") {
                return item.clone();
            }
            if let ItemKind::Assignment { target } = item.kind() {
                // Static and converter members are dropped from the
                // projection; we export simple interfaces.
                if !target.contains(".prototype.") || converter_target_re().is_match(&target) {
                    return Item {
                        doc: None,
                        code: item.code.clone(),
                    };
                }
            }
            if callback_typedef_re().is_match(&doc.text()) {
                pending_response = doc
                    .lines
                    .iter()
                    .find_map(|line| callback_response_re().captures(line))
                    .map(|captures| captures[1].to_string());
                return Item {
                    doc: None,
                    code: item.code.clone(),
                };
            }
            let mut cleaned = clean_callback_signature(doc, &mut pending_response);
            cleaned = clean_promise_signature(&cleaned);
            Item {
                doc: Some(cleaned),
                code: item.code.clone(),
            }
        })
        .collect();
    Module { items }
}

/// Remove the callback parameter and rewrite the return tag from the
/// captured callback response type.
fn clean_callback_signature(doc: &DocBlock, pending: &mut Option<String>) -> DocBlock {
    if !doc.lines.iter().any(|line| callback_param_re().is_match(line)) {
        return doc.clone();
    }
    let response = pending.take();
    let lines = doc
        .lines
        .iter()
        .filter(|line| !callback_param_re().is_match(line))
        .map(|line| {
            let line = object_union_re().replace_all(line, "$1$2").into_owned();
            match &response {
                Some(response) => returns_re()
                    .replace(&line, format!("@returns {{Observable<{response}>}}"))
                    .into_owned(),
                None => line,
            }
        })
        .collect();
    DocBlock::new(lines)
}

/// Rewrite a promise-returning overload to the stream type and offer the
/// optional transport metadata parameter.
fn clean_promise_signature(doc: &DocBlock) -> DocBlock {
    if !doc.lines.iter().any(|line| promise_returns_re().is_match(line)) {
        return doc.clone();
    }
    let mut lines = Vec::with_capacity(doc.lines.len() + 1);
    for line in &doc.lines {
        if promise_returns_re().is_match(line) {
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            lines.push(format!(
                "{indent}* @param {{grpc.Metadata=}} metadata Optional call metadata"
            ));
            lines.push(
                promise_returns_re()
                    .replace(line, "@returns {Observable<$1>}")
                    .into_owned(),
            );
        } else {
            let line = object_union_re().replace_all(line, "$1$2").into_owned();
            lines.push(line);
        }
    }
    DocBlock::new(lines)
}
