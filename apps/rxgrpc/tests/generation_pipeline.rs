//! Generation Pipeline Integration Tests
//!
//! Drives the full pipeline with an in-process schema compiler: the
//! module and descriptor fixtures stand in for the external toolchain's
//! output, and the declaration projection mimics its skeleton generator,
//! quirks included (runtime imports, dot-form generics, `public` field
//! qualifiers, unexported nested declarations).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use rxgrpc::compiler::SchemaCompiler;
use rxgrpc::error::CollaboratorError;
use rxgrpc::generate;

/// Schema compiler fed from fixtures instead of processes.
struct FakeCompiler {
    module: &'static str,
    descriptor: &'static str,
}

#[async_trait]
impl SchemaCompiler for FakeCompiler {
    async fn generate_module(
        &self,
        _protos: &[PathBuf],
        out: &Path,
    ) -> Result<(), CollaboratorError> {
        write_fixture(out, self.module).await
    }

    async fn generate_descriptor(
        &self,
        _protos: &[PathBuf],
        out: &Path,
    ) -> Result<(), CollaboratorError> {
        write_fixture(out, self.descriptor).await
    }

    async fn generate_declarations(
        &self,
        module: &Path,
        out: &Path,
    ) -> Result<(), CollaboratorError> {
        let rewritten = tokio::fs::read_to_string(module)
            .await
            .map_err(|source| CollaboratorError::Launch {
                command: "fake-pbts".to_string(),
                source,
            })?;
        write_fixture(out, &project_skeleton(&rewritten)).await
    }
}

async fn write_fixture(out: &Path, text: &str) -> Result<(), CollaboratorError> {
    tokio::fs::write(out, text)
        .await
        .map_err(|source| CollaboratorError::Launch {
            command: "fake-pbjs".to_string(),
            source,
        })
}

/// Project a declaration skeleton from the rewritten module, the way the
/// real skeleton generator would: interfaces from annotation blocks,
/// methods attached by their `@memberof`, dot-form generics, `public`
/// qualifiers, and a runtime import at the top.
fn project_skeleton(module: &str) -> String {
    let blocks = doc_blocks(module);

    // Method lines keyed by owning interface reference.
    let mut methods: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (block, code) in &blocks {
        let Some(owner) = tag_value(block, "memberof") else {
            continue;
        };
        let Some(returns) = block.iter().find_map(|line| capture(line, "@returns {", '}'))
        else {
            continue;
        };
        let Some(name) = capture(code, ".prototype.", ' ') else {
            continue;
        };
        // Dot-form generic instantiation, as the skeleton generator emits.
        let returns = returns.replace("Observable<", "Observable.<");
        let mut params = Vec::new();
        if let Some(request) = block
            .iter()
            .find(|line| line.contains("} request"))
            .and_then(|line| capture(line, "@param {", '}'))
        {
            params.push(format!("request: {request}"));
            params.push("metadata?: grpc.Metadata".to_string());
        }
        if let Some(implementation) = block
            .iter()
            .find(|line| line.contains("} impl"))
            .and_then(|line| capture(line, "@param {", '}'))
        {
            params.push(format!("impl: {implementation}"));
        }
        methods.entry(owner).or_default().push(format!(
            "        {name}({params}): {returns};",
            params = params.join(", ")
        ));
    }

    // Interfaces and enums grouped by namespace prefix.
    let mut namespaces: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (block, _) in &blocks {
        let Some(exports) = tag_value(block, "exports") else {
            continue;
        };
        let (prefix, name) = match exports.rsplit_once('.') {
            Some((prefix, name)) => (prefix.to_string(), name.to_string()),
            None => continue,
        };
        if block.iter().any(|line| line.contains("@enum")) {
            namespaces
                .entry(prefix)
                .or_default()
                .push(format!("    enum {name} {{\n    }}\n"));
            continue;
        }
        if !block.iter().any(|line| line.contains("@interface")) {
            continue;
        }
        let mut body = String::new();
        for line in block {
            if let Some(rest) = line.split("@property {").nth(1) {
                let type_name = rest.split('}').next().unwrap().to_string();
                let after = rest.split('}').nth(1).unwrap_or("").trim();
                if let Some(field) = after.strip_prefix('[') {
                    let field = field.split(']').next().unwrap();
                    body.push_str(&format!("        public {field}?: {type_name};\n"));
                } else if let Some(field) = after.split_whitespace().next() {
                    body.push_str(&format!("        public {field}: {type_name};\n"));
                }
            }
        }
        for method in methods.get(&exports).into_iter().flatten() {
            body.push_str(method);
            body.push('\n');
        }
        namespaces
            .entry(prefix)
            .or_default()
            .push(format!("    interface {name} {{\n{body}    }}\n"));
    }

    let mut out = String::from("import * as $protobuf from \"protobufjs\";\n\n");
    for (namespace, declarations) in &namespaces {
        out.push_str(&format!("namespace {namespace} {{\n\n"));
        for declaration in declarations {
            out.push_str(declaration);
            out.push('\n');
        }
        out.push_str("}\n");
    }
    out
}

/// Annotation blocks paired with the first code line that follows each.
fn doc_blocks(module: &str) -> Vec<(Vec<String>, String)> {
    let mut blocks: Vec<(Vec<String>, String)> = Vec::new();
    let mut current: Option<Vec<String>> = None;
    let mut awaiting_code = false;
    for line in module.lines() {
        if line.trim_start().starts_with("/**") {
            current = Some(Vec::new());
            awaiting_code = false;
        }
        if let Some(block) = &mut current {
            block.push(line.to_string());
            if line.trim_end().ends_with("*/") {
                blocks.push((current.take().unwrap(), String::new()));
                awaiting_code = true;
            }
            continue;
        }
        if awaiting_code && !line.trim().is_empty() {
            if let Some((_, code)) = blocks.last_mut() {
                *code = line.to_string();
            }
            awaiting_code = false;
        }
    }
    blocks
}

fn tag_value(block: &[String], tag: &str) -> Option<String> {
    let marker = format!("@{tag} ");
    block.iter().find_map(|line| {
        line.split(&marker)
            .nth(1)
            .map(|rest| rest.split_whitespace().next().unwrap_or("").to_string())
            .filter(|value| !value.is_empty())
    })
}

fn capture(line: &str, start: &str, end: char) -> Option<String> {
    line.split(start).nth(1)?.split(end).next().map(str::to_string)
}

// =============================================================================
// Fixtures
// =============================================================================

const DESCRIPTOR: &str = r#"{
    "nested": {
        "test": {
            "nested": {
                "EnumType": { "values": { "ONE": 1, "TWO": 2 } },
                "Message": {
                    "fields": {
                        "field": { "type": "EnumType", "id": 2 },
                        "name": { "type": "string", "id": 3, "rule": "required" }
                    }
                },
                "Greeter": {
                    "methods": {
                        "sayHello": {
                            "requestType": "Message",
                            "responseType": "Message"
                        }
                    }
                },
                "sub": {
                    "nested": {
                        "Inner": {
                            "methods": {
                                "poke": {
                                    "requestType": "test.Message",
                                    "responseType": "test.Message"
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}"#;

const MODULE: &str = "\
/**
 * Constructs a new Message.
 * @exports test.IMessage
 * @interface IMessage
 * @property {number} [field] Message field
 * @property {string} name Message name
 * @constructor
 * @param {test.IMessage=} [properties] Properties to set
 */
function Message(properties) {
}

/**
 * Message field.
 * @member {number} field
 * @memberof test.Message
 * @type {number}
 */
Message.prototype.field = 0;

/**
 * Constructs a new Greeter service.
 * @exports test.Greeter
 * @extends $protobuf.rpc.Service
 * @constructor
 * @param {RPCImpl} rpcImpl RPC implementation
 * @param {boolean} [requestDelimited=false] Whether requests are delimited
 */
function Greeter(rpcImpl, requestDelimited) {
}

/**
 * Callback as used by {@link test.Greeter#sayHello}.
 * @typedef test.Greeter~SayHello_Callback
 * @type {function}
 * @param {Error|null} error Error, if any
 * @param {test.Message} [response] Message
 */

/**
 * Calls sayHello.
 * @param {test.Message|Object} request Message or plain object
 * @param {test.Greeter~SayHello_Callback} callback Node-style callback
 * @memberof test.Greeter
 * @returns {undefined}
 */
Greeter.prototype.sayHello = function sayHello(request, callback) {};

/**
 * Constructs a new Inner service.
 * @exports test.sub.Inner
 * @extends $protobuf.rpc.Service
 * @constructor
 * @param {RPCImpl} rpcImpl RPC implementation
 * @param {boolean} [requestDelimited=false] Whether requests are delimited
 */
function Inner(rpcImpl, requestDelimited) {
}

/**
 * Callback as used by {@link test.sub.Inner#poke}.
 * @typedef test.sub.Inner~Poke_Callback
 * @type {function}
 * @param {Error|null} error Error, if any
 * @param {test.Message} [response] Message
 */

/**
 * Calls poke.
 * @param {test.Message|Object} request Message or plain object
 * @param {test.sub.Inner~Poke_Callback} callback Node-style callback
 * @memberof test.sub.Inner
 * @returns {undefined}
 */
Inner.prototype.poke = function poke(request, callback) {};

/**
 * EnumType enum.
 * @exports test.EnumType
 * @enum {number}
 * @property {number} ONE=1 ONE value
 * @property {number} TWO=2 TWO value
 */

/**
 * Namespace test.
 * @exports test
 * @namespace
 */
var test = {};

/**
 * Namespace sub.
 * @exports test.sub
 * @namespace
 */
var sub = {};
";

const TWO_PACKAGE_DESCRIPTOR: &str = r#"{
    "nested": {
        "first": {
            "nested": {
                "Message": {
                    "fields": { "field_first": { "type": "string", "id": 1 } }
                }
            }
        },
        "second": {
            "nested": {
                "Message": {
                    "fields": { "field_second": { "type": "string", "id": 1 } }
                }
            }
        }
    }
}"#;

const TWO_PACKAGE_MODULE: &str = "\
/**
 * Constructs a new Message.
 * @exports first.IMessage
 * @interface IMessage
 * @property {string} [field_first] Message field_first
 * @constructor
 * @param {first.IMessage=} [properties] Properties to set
 */
function Message(properties) {
}

/**
 * Constructs a new Message.
 * @exports second.IMessage
 * @interface IMessage
 * @property {string} [field_second] Message field_second
 * @constructor
 * @param {second.IMessage=} [properties] Properties to set
 */
function Message(properties) {
}

/**
 * Namespace first.
 * @exports first
 * @namespace
 */
var first = {};

/**
 * Namespace second.
 * @exports second
 * @namespace
 */
var second = {};
";

async fn run_pipeline(module: &'static str, descriptor: &'static str) -> String {
    let compiler = FakeCompiler { module, descriptor };
    generate::build_declarations(&compiler, &[PathBuf::from("schema.proto")])
        .await
        .unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn enum_fields_name_their_enum_type() {
    let output = run_pipeline(MODULE, DESCRIPTOR).await;
    assert!(output.contains("field?: test.EnumType;"), "{output}");
    assert!(!output.contains("field?: number"), "{output}");
}

#[tokio::test]
async fn required_fields_are_emitted_non_optional() {
    let output = run_pipeline(MODULE, DESCRIPTOR).await;
    assert!(output.contains("        name: string;"), "{output}");
    assert!(!output.contains("name?:"), "{output}");
}

#[tokio::test]
async fn method_signatures_are_reactive() {
    let output = run_pipeline(MODULE, DESCRIPTOR).await;
    assert!(
        output.contains("sayHello(request: test.Message, metadata?: Metadata): Observable<test.Message>;"),
        "{output}"
    );
    assert!(!output.contains("Observable.<"), "{output}");
    assert!(!output.contains("_Callback"), "{output}");
}

#[tokio::test]
async fn namespaces_own_only_their_direct_services() {
    let output = run_pipeline(MODULE, DESCRIPTOR).await;

    let test_factory = output
        .split("namespace test {")
        .nth(1)
        .unwrap()
        .split("namespace test.sub {")
        .next()
        .unwrap();
    assert!(test_factory.contains("getGreeter"), "{output}");
    assert!(!test_factory.contains("getInner"), "{output}");

    let sub_factory = output.split("namespace test.sub {").nth(1).unwrap();
    assert!(sub_factory.contains("getInner"), "{output}");
    assert!(!sub_factory.contains("getGreeter"), "{output}");
}

#[tokio::test]
async fn skeleton_quirks_are_normalized() {
    let output = run_pipeline(MODULE, DESCRIPTOR).await;
    assert!(output.starts_with("import { Observable } from 'rxjs';\n"), "{output}");
    assert!(output.contains("import { Metadata } from '@grpc/grpc-js';"), "{output}");
    assert!(!output.contains("protobufjs"), "{output}");
    assert!(!output.contains("public "), "{output}");
    assert!(output.contains("    export interface Message {"), "{output}");
    assert!(output.contains("    export enum EnumType {"), "{output}");
}

#[tokio::test]
async fn independent_packages_keep_their_own_fields() {
    let output = run_pipeline(TWO_PACKAGE_MODULE, TWO_PACKAGE_DESCRIPTOR).await;

    let first = output
        .split("namespace first {")
        .nth(1)
        .unwrap()
        .split("namespace second {")
        .next()
        .unwrap();
    assert!(first.contains("field_first?: string;"), "{output}");
    assert!(!first.contains("field_second"), "{output}");

    let second = output.split("namespace second {").nth(1).unwrap();
    assert!(second.contains("field_second?: string;"), "{output}");
    assert!(!second.contains("field_first"), "{output}");
}

#[tokio::test]
async fn generation_is_deterministic() {
    let once = run_pipeline(MODULE, DESCRIPTOR).await;
    let twice = run_pipeline(MODULE, DESCRIPTOR).await;
    assert_eq!(once, twice);
}
