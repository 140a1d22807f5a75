//! Pass 1: enum field annotation patch.
//!
//! The schema compiler emits enum-typed message fields with a generic
//! numeric type marker. This pass resolves each message field against the
//! descriptor tree and, for fields that are enums, replaces the numeric
//! marker with the fully qualified enum name (leading namespace separator
//! stripped). Both the field's member assignment and the `@property` tag
//! of the message's interface annotation are patched, so the fix survives
//! into the projected declarations.
//!
//! Fields without a matching assignment (e.g. already represented as a
//! oneof-backed virtual property) are left untouched.

use std::sync::OnceLock;

use regex::Regex;

use crate::descriptor::DescriptorTree;
use crate::error::GenerateError;
use crate::rewrite::source::{Item, ItemKind, Module};

#[allow(clippy::expect_used)] // compile-time constant pattern
fn numeric_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*\*\s*@type\s+\{)number(\}|\|)").expect("type tag pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn numeric_property_re(field: &str) -> Regex {
    // The field name may appear bare or bracketed (`[field]` for optional).
    Regex::new(&format!(
        r"^(\s*\*\s*@property\s+\{{)number((?:\}}|\|)[^\n]*[\s\[]{}\b)",
        regex::escape(field)
    ))
    .expect("property tag pattern is valid")
}

/// Apply the enum field patch, returning a new module.
pub fn run(module: &Module, tree: &DescriptorTree) -> Result<Module, GenerateError> {
    // (message item index, message reference)
    let messages: Vec<(usize, String)> = module
        .items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let reference = item.exports_reference()?;
            match item.kind() {
                ItemKind::Function { params: 1, .. } => Some((index, reference)),
                _ => None,
            }
        })
        .collect();

    let mut items = module.items.clone();
    for (message_index, reference) in messages {
        let Some(descriptor) = lookup_annotated_message(tree, &reference) else {
            tracing::warn!(reference = %reference, "annotated message not in descriptor, skipping");
            continue;
        };
        let message_fqn = descriptor.fqn.clone();
        for field in &descriptor.fields {
            let Some(enum_fqn) = tree.resolve_field_enum(descriptor, field)? else {
                continue;
            };
            let enum_fqn = enum_fqn.trim_start_matches('.').to_string();
            patch_property_tag(&mut items[message_index], &field.name, &enum_fqn);
            patch_member_assignment(&mut items, &message_fqn, &field.name, &enum_fqn);
        }
    }
    Ok(Module { items })
}

/// Find the descriptor entry for an `@exports` reference, tolerating the
/// compiler's `I`-prefix convention on message interface names
/// (`test.IMessage` annotates the schema message `test.Message`).
fn lookup_annotated_message<'a>(
    tree: &'a DescriptorTree,
    reference: &str,
) -> Option<&'a crate::descriptor::MessageDescriptor> {
    if let Some(found) = tree.lookup_message(reference) {
        return Some(found);
    }
    let (parent, name) = match reference.rsplit_once('.') {
        Some((parent, name)) => (Some(parent), name),
        None => (None, reference),
    };
    let stripped = name.strip_prefix('I')?;
    if !stripped.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let candidate = match parent {
        Some(parent) => format!("{parent}.{stripped}"),
        None => stripped.to_string(),
    };
    tree.lookup_message(&candidate)
}

/// Rewrite `@property {number} field` on the message's own annotation.
fn patch_property_tag(item: &mut Item, field: &str, enum_fqn: &str) {
    let Some(doc) = &item.doc else { return };
    let re = numeric_property_re(field);
    let patched = doc.map_lines(|line| re.replace(line, format!("${{1}}{enum_fqn}${{2}}")).into_owned());
    item.doc = Some(patched);
}

/// Rewrite `@type {number}` on the field's prototype assignment, located by
/// target suffix plus `@memberof` cross-reference.
fn patch_member_assignment(items: &mut [Item], message_fqn: &str, field: &str, enum_fqn: &str) {
    let suffix = format!(".prototype.{field}");
    for item in items.iter_mut() {
        let ItemKind::Assignment { target } = item.kind() else {
            continue;
        };
        if !target.ends_with(&suffix) {
            continue;
        }
        if item.memberof().as_deref() != Some(message_fqn) {
            continue;
        }
        let Some(doc) = &item.doc else { continue };
        let patched =
            doc.map_lines(|line| numeric_type_re().replace(line, format!("${{1}}{enum_fqn}${{2}}")).into_owned());
        item.doc = Some(patched);
    }
}
