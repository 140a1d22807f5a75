//! Pass 2: constructor-to-interface conversion.
//!
//! The schema compiler emits both messages and services as constructor-like
//! function declarations. The declaration projection must see type-only
//! interfaces instead, so every constructor annotation is reclassified:
//!
//! - Message declarations already carry an `@interface` marker (the
//!   `IMessage` property-bag convention). For those, the constructor and
//!   parameter tags are stripped and the redundant `I` prefix is dropped
//!   from the declared name and from referenced property types.
//! - Service declarations carry only `@constructor`. For those the
//!   constructor tag becomes `@interface` and the `@extends`, `@param` and
//!   `@returns` tags are stripped, leaving the method signatures to follow.

use std::sync::OnceLock;

use regex::Regex;

use crate::rewrite::source::{DocBlock, ItemKind, Module};

#[allow(clippy::expect_used)] // compile-time constant pattern
fn i_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bI([A-Z][\w$]*)").expect("I-prefix pattern is valid"))
}

/// Apply the conversion, returning a new module.
pub fn run(module: &Module) -> Module {
    let items = module
        .items
        .iter()
        .map(|item| {
            let ItemKind::Function { .. } = item.kind() else {
                return item.clone();
            };
            let Some(doc) = &item.doc else {
                return item.clone();
            };
            let mut converted = item.clone();
            converted.doc = Some(if doc.has_tag("interface") {
                message_interface(doc)
            } else {
                service_interface(doc)
            });
            converted
        })
        .collect();
    Module { items }
}

/// Message shape: already `@interface`, drop constructor noise and the
/// `I`-prefix convention.
fn message_interface(doc: &DocBlock) -> DocBlock {
    doc.without_tags(&["constructor", "extends", "param", "returns"])
        .map_lines(|line| {
            if is_type_bearing(line) {
                i_prefix_re().replace_all(line, "$1").into_owned()
            } else {
                line.to_string()
            }
        })
}

/// Service shape: reclassify the constructor as an interface.
fn service_interface(doc: &DocBlock) -> DocBlock {
    doc.without_tags(&["extends", "param", "returns"])
        .map_lines(|line| line.replace("@constructor", "@interface"))
}

/// Only annotation lines that name types take part in the `I`-prefix drop;
/// prose lines ("Constructs a new IMessage...") are left alone.
fn is_type_bearing(line: &str) -> bool {
    ["@exports", "@interface", "@property", "@implements"]
        .iter()
        .any(|tag| line.contains(tag))
}
