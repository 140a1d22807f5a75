//! Pass 4: member pruning.
//!
//! Message constructors carry generated prototype members (field defaults,
//! converters) that have no place in the projected interfaces: the fields
//! are already represented by the `@property` tags on the message
//! annotation. The exception is oneof groups, whose accessor property is
//! their only representation, so those must survive.
//!
//! A member belongs to a message when its `@memberof` tag names a message
//! in the descriptor; members of services (the method signatures) and of
//! namespaces are untouched.

use std::sync::OnceLock;

use regex::Regex;

use crate::descriptor::DescriptorTree;
use crate::rewrite::source::{Item, ItemKind, Module};

#[allow(clippy::expect_used)] // compile-time constant pattern
fn member_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@member\s+\{[^}]*\}\s+([\w$]+)").expect("member tag pattern is valid")
    })
}

/// Apply the pruning, returning a new module.
pub fn run(module: &Module, tree: &DescriptorTree) -> Module {
    let items = module
        .items
        .iter()
        .filter(|item| !is_prunable_member(item, tree))
        .cloned()
        .collect();
    Module { items }
}

fn is_prunable_member(item: &Item, tree: &DescriptorTree) -> bool {
    let Some(memberof) = item.memberof() else {
        return false;
    };
    let Some(message) = tree.lookup_message(&memberof) else {
        // Members of services and namespaces stay.
        return false;
    };
    let Some(name) = member_name(item) else {
        return false;
    };
    // Oneof accessors are retained; everything else generated onto the
    // message goes.
    !message.has_oneof_group(&name)
}

/// The member name, from the `@member` tag or from the assignment target.
fn member_name(item: &Item) -> Option<String> {
    if let Some(doc) = &item.doc
        && let Some(captures) = doc.lines.iter().find_map(|line| member_name_re().captures(line))
    {
        return Some(captures[1].to_string());
    }
    match item.kind() {
        ItemKind::Assignment { target } => target
            .rsplit_once(".prototype.")
            .map(|(_, name)| name.to_string()),
        _ => None,
    }
}
