//! Normalization of the typed declaration skeleton.
//!
//! The skeleton generator emits declarations for the rewritten module that
//! are close to, but not quite, the surface we publish:
//!
//! - it imports its own runtime unconditionally; the published
//!   declarations need it only when a service still extends the runtime's
//!   base type;
//! - it renders generic instantiations in dot form (`Observable.<T>`);
//! - it qualifies fields with `public`, which is invalid inside interface
//!   bodies;
//! - nested `interface`, `enum`, and `namespace` declarations are not
//!   exported, so they would be invisible outside the file;
//! - call metadata is referenced through a transport namespace that the
//!   published declarations import directly.
//!
//! All fixes are line-scoped and skip lines inside block comments, so
//! documentation text the skeleton carries over is never rewritten.

use std::sync::OnceLock;

use regex::Regex;

#[allow(clippy::expect_used)] // compile-time constant patterns
fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*import\b").expect("import pattern is valid"))
}

#[allow(clippy::expect_used)]
fn public_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)public\s+").expect("public pattern is valid"))
}

#[allow(clippy::expect_used)]
fn export_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s+)(interface|enum|namespace)(\s)").expect("export pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn metadata_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bMetadata\b").expect("metadata pattern is valid"))
}

#[allow(clippy::expect_used)]
fn protobuf_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$protobuf\b").expect("protobuf pattern is valid"))
}

/// Normalize the declaration skeleton into the final declaration text.
pub fn normalize(skeleton: &str) -> String {
    let mut lines = Vec::new();
    let mut in_comment = false;

    for line in skeleton.lines() {
        if in_comment {
            if line.contains("*/") {
                in_comment = false;
            }
            lines.push(line.to_string());
            continue;
        }
        if import_re().is_match(line) {
            continue;
        }
        let line = line
            .replace("Observable.<", "Observable<")
            .replace("grpc.Metadata", "Metadata");
        let line = public_field_re().replace(&line, "$1").into_owned();
        // `${1}` keeps the indent capture separate from the literal text.
        let line = export_re().replace(&line, "${1}export $2$3").into_owned();
        if opens_block_comment(&line) {
            in_comment = true;
        }
        lines.push(line);
    }

    let mut body = lines.join("\n");
    body.push('\n');

    let mut header = String::from("import { Observable } from 'rxjs';\n");
    if metadata_re().is_match(&body) {
        header.push_str("import { Metadata } from '@grpc/grpc-js';\n");
    }
    // Service declarations may still extend the runtime's service base
    // type; re-import it so those references resolve.
    if protobuf_re().is_match(&body) {
        header.push_str("import * as $protobuf from 'protobufjs';\n");
    }
    header.push('\n');

    tracing::debug!(bytes = body.len(), "normalized declaration skeleton");
    format!("{header}{body}")
}

/// Whether the line opens a block comment it does not close.
fn opens_block_comment(line: &str) -> bool {
    line.rfind("/*")
        .is_some_and(|open| !line[open..].contains("*/"))
}
