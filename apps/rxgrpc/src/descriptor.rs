//! Descriptor Resolver
//!
//! Loads the schema compiler's JSON descriptor into a queryable descriptor
//! tree: namespaces, messages (fields, oneof groups, required flags), enums,
//! and services (methods with request/response types and a server-streaming
//! flag).
//!
//! The tree is the primary data channel for everything that *can* be known
//! from the schema itself (enum resolution, oneof membership, streaming
//! flags). Annotation scanning in the rewrite passes is only used for the
//! information that exists solely in the generated source (which constructor
//! is a service, which namespace owns it).
//!
//! The descriptor format is the protobufjs JSON shape: a recursive
//! `{"nested": {...}}` map in which each node is classified by its keys
//! (`fields`/`oneofs` for messages, `values` for enums, `methods` for
//! services, only `nested` for plain namespaces).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::adapter::transport::{MethodDef, ServiceDef};
use crate::error::SchemaError;

/// Protobuf scalar type names; everything else is a message or enum
/// reference that must resolve.
const SCALAR_TYPES: &[&str] = &[
    "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32",
    "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
];

// =============================================================================
// Descriptor Model
// =============================================================================

/// A single message field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name as written in the schema.
    pub name: String,
    /// Scalar name or message/enum type reference, unresolved.
    pub type_name: String,
    /// True when the schema marks the field `required`.
    pub required: bool,
    /// Name of the oneof group this field belongs to, if any.
    ///
    /// A field belongs to at most one group.
    pub oneof: Option<String>,
}

/// A oneof group on a message.
#[derive(Debug, Clone)]
pub struct OneofDescriptor {
    /// Group name.
    pub name: String,
    /// Names of the member fields, in declaration order.
    pub fields: Vec<String>,
}

/// A message type.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    /// Simple name.
    pub name: String,
    /// Fully qualified dotted name.
    pub fqn: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Oneof groups in declaration order.
    pub oneofs: Vec<OneofDescriptor>,
}

impl MessageDescriptor {
    /// True when `name` is one of this message's oneof group names.
    pub fn has_oneof_group(&self, name: &str) -> bool {
        self.oneofs.iter().any(|group| group.name == name)
    }
}

/// An enum type.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    /// Simple name.
    pub name: String,
    /// Fully qualified dotted name.
    pub fqn: String,
    /// Members in declaration order.
    pub values: Vec<(String, i64)>,
}

/// One RPC method on a service.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Method name as written in the schema.
    pub name: String,
    /// Request type reference.
    pub request_type: String,
    /// Response type reference.
    pub response_type: String,
    /// True when the server side streams responses.
    pub server_streaming: bool,
}

/// A service with its methods.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Simple name.
    pub name: String,
    /// Fully qualified dotted name.
    pub fqn: String,
    /// Methods in declaration order.
    pub methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    /// Project this service into the transport-level service definition
    /// used by the runtime adapter.
    pub fn to_service_def(&self) -> ServiceDef {
        ServiceDef {
            name: self.fqn.clone(),
            methods: self
                .methods
                .iter()
                .map(|method| MethodDef {
                    name: method.name.clone(),
                    server_streaming: method.server_streaming,
                })
                .collect(),
        }
    }
}

/// A namespace node: its own types plus nested namespaces.
///
/// Namespace names are dot-segmented paths; a namespace's own entries are
/// distinguished from descendants' by exact prefix-plus-one-segment
/// matching.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Fully qualified dotted name; empty for the root.
    pub name: String,
    /// Messages declared directly in this namespace.
    pub messages: Vec<String>,
    /// Enums declared directly in this namespace.
    pub enums: Vec<String>,
    /// Services declared directly in this namespace.
    pub services: Vec<String>,
    /// Nested namespaces.
    pub children: Vec<Namespace>,
}

/// What a field type reference resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    /// A protobuf scalar.
    Scalar,
    /// A message, by fully qualified name.
    Message(String),
    /// An enum, by fully qualified name.
    Enum(String),
}

// =============================================================================
// Descriptor Tree
// =============================================================================

/// The resolved, queryable in-memory representation of a schema.
///
/// Rebuilt from scratch on every generation run; never mutated after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct DescriptorTree {
    root: Namespace,
    messages: BTreeMap<String, MessageDescriptor>,
    enums: BTreeMap<String, EnumDescriptor>,
    services: BTreeMap<String, ServiceDescriptor>,
}

impl DescriptorTree {
    /// Parse the schema compiler's JSON descriptor.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_str(text).map_err(|error| SchemaError::InvalidDescriptor {
                message: error.to_string(),
            })?;
        let mut tree = Self::default();
        let root_nested = value.get("nested").and_then(Value::as_object);
        if let Some(entries) = root_nested {
            tree.root = tree.build_namespace(String::new(), entries)?;
        }
        Ok(tree)
    }

    /// The root namespace.
    pub fn root(&self) -> &Namespace {
        &self.root
    }

    /// Look up a message by fully qualified name.
    pub fn lookup_message(&self, fqn: &str) -> Option<&MessageDescriptor> {
        self.messages.get(fqn)
    }

    /// Look up an enum by fully qualified name.
    pub fn lookup_enum(&self, fqn: &str) -> Option<&EnumDescriptor> {
        self.enums.get(fqn)
    }

    /// Look up a service by fully qualified name.
    pub fn lookup_service(&self, fqn: &str) -> Option<&ServiceDescriptor> {
        self.services.get(fqn)
    }

    /// All services, in fully-qualified-name order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    /// Resolve a type reference the way protobuf does: innermost enclosing
    /// scope first, then each ancestor up to the root.
    pub fn resolve_type(&self, scope: &str, reference: &str) -> Result<ResolvedType, SchemaError> {
        if SCALAR_TYPES.contains(&reference) {
            return Ok(ResolvedType::Scalar);
        }
        if let Some(absolute) = reference.strip_prefix('.') {
            return self
                .lookup_named(absolute)
                .ok_or_else(|| SchemaError::UnresolvedType {
                    reference: reference.to_string(),
                    scope: scope.to_string(),
                });
        }
        let mut prefix = scope;
        loop {
            let candidate = if prefix.is_empty() {
                reference.to_string()
            } else {
                format!("{prefix}.{reference}")
            };
            if let Some(resolved) = self.lookup_named(&candidate) {
                return Ok(resolved);
            }
            match prefix.rfind('.') {
                Some(index) => prefix = &prefix[..index],
                None if prefix.is_empty() => break,
                None => prefix = "",
            }
        }
        Err(SchemaError::UnresolvedType {
            reference: reference.to_string(),
            scope: scope.to_string(),
        })
    }

    /// Resolve a field's type and return the enum's fully qualified name if
    /// (and only if) it is an enum.
    pub fn resolve_field_enum(
        &self,
        message: &MessageDescriptor,
        field: &FieldDescriptor,
    ) -> Result<Option<String>, SchemaError> {
        match self.resolve_type(&message.fqn, &field.type_name)? {
            ResolvedType::Enum(fqn) => Ok(Some(fqn)),
            ResolvedType::Scalar | ResolvedType::Message(_) => Ok(None),
        }
    }

    fn lookup_named(&self, fqn: &str) -> Option<ResolvedType> {
        if self.enums.contains_key(fqn) {
            return Some(ResolvedType::Enum(fqn.to_string()));
        }
        if self.messages.contains_key(fqn) {
            return Some(ResolvedType::Message(fqn.to_string()));
        }
        None
    }

    fn build_namespace(
        &mut self,
        name: String,
        entries: &serde_json::Map<String, Value>,
    ) -> Result<Namespace, SchemaError> {
        let mut namespace = Namespace {
            name: name.clone(),
            ..Namespace::default()
        };
        for (child_name, node) in entries {
            let Some(node) = node.as_object() else {
                return Err(SchemaError::InvalidDescriptor {
                    message: format!("descriptor node '{child_name}' is not an object"),
                });
            };
            let fqn = if name.is_empty() {
                child_name.clone()
            } else {
                format!("{name}.{child_name}")
            };
            if node.contains_key("values") {
                self.add_enum(child_name, &fqn, node)?;
                namespace.enums.push(fqn);
            } else if node.contains_key("methods") {
                self.add_service(child_name, &fqn, node)?;
                namespace.services.push(fqn);
            } else if node.contains_key("fields") || node.contains_key("oneofs") {
                self.add_message(child_name, &fqn, node)?;
                namespace.messages.push(fqn.clone());
                // Types nested inside a message live in the message's scope.
                if let Some(nested) = node.get("nested").and_then(Value::as_object) {
                    let child = self.build_namespace(fqn, nested)?;
                    namespace.children.push(child);
                }
            } else if let Some(nested) = node.get("nested").and_then(Value::as_object) {
                let child = self.build_namespace(fqn, nested)?;
                namespace.children.push(child);
            } else {
                // A bare object is an empty message.
                self.add_message(child_name, &fqn, node)?;
                namespace.messages.push(fqn);
            }
        }
        Ok(namespace)
    }

    fn add_message(
        &mut self,
        name: &str,
        fqn: &str,
        node: &serde_json::Map<String, Value>,
    ) -> Result<(), SchemaError> {
        let mut oneofs = Vec::new();
        if let Some(groups) = node.get("oneofs").and_then(Value::as_object) {
            for (group_name, group) in groups {
                let fields = group
                    .get("oneof")
                    .and_then(Value::as_array)
                    .map(|members| {
                        members
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                oneofs.push(OneofDescriptor {
                    name: group_name.clone(),
                    fields,
                });
            }
        }

        let mut fields = Vec::new();
        if let Some(field_nodes) = node.get("fields").and_then(Value::as_object) {
            for (field_name, field) in field_nodes {
                let type_name = field
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SchemaError::InvalidDescriptor {
                        message: format!("field '{fqn}.{field_name}' has no type"),
                    })?
                    .to_string();
                let rule = field.get("rule").and_then(Value::as_str);
                let oneof = oneofs
                    .iter()
                    .find(|group| group.fields.iter().any(|member| member == field_name))
                    .map(|group| group.name.clone());
                fields.push(FieldDescriptor {
                    name: field_name.clone(),
                    type_name,
                    required: rule == Some("required"),
                    oneof,
                });
            }
        }

        self.messages.insert(
            fqn.to_string(),
            MessageDescriptor {
                name: name.to_string(),
                fqn: fqn.to_string(),
                fields,
                oneofs,
            },
        );
        Ok(())
    }

    fn add_enum(
        &mut self,
        name: &str,
        fqn: &str,
        node: &serde_json::Map<String, Value>,
    ) -> Result<(), SchemaError> {
        let mut values = Vec::new();
        if let Some(members) = node.get("values").and_then(Value::as_object) {
            for (member, number) in members {
                let number =
                    number
                        .as_i64()
                        .ok_or_else(|| SchemaError::InvalidDescriptor {
                            message: format!("enum member '{fqn}.{member}' is not an integer"),
                        })?;
                values.push((member.clone(), number));
            }
        }
        self.enums.insert(
            fqn.to_string(),
            EnumDescriptor {
                name: name.to_string(),
                fqn: fqn.to_string(),
                values,
            },
        );
        Ok(())
    }

    fn add_service(
        &mut self,
        name: &str,
        fqn: &str,
        node: &serde_json::Map<String, Value>,
    ) -> Result<(), SchemaError> {
        let mut methods = Vec::new();
        if let Some(method_nodes) = node.get("methods").and_then(Value::as_object) {
            for (method_name, method) in method_nodes {
                let request_type = method
                    .get("requestType")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SchemaError::InvalidDescriptor {
                        message: format!("method '{fqn}.{method_name}' has no request type"),
                    })?
                    .to_string();
                let response_type = method
                    .get("responseType")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SchemaError::InvalidDescriptor {
                        message: format!("method '{fqn}.{method_name}' has no response type"),
                    })?
                    .to_string();
                let server_streaming = method
                    .get("responseStream")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                methods.push(MethodDescriptor {
                    name: method_name.clone(),
                    request_type,
                    response_type,
                    server_streaming,
                });
            }
        }
        self.services.insert(
            fqn.to_string(),
            ServiceDescriptor {
                name: name.to_string(),
                fqn: fqn.to_string(),
                methods,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> DescriptorTree {
        let descriptor = serde_json::json!({
            "nested": {
                "test": {
                    "nested": {
                        "Message": {
                            "oneofs": {
                                "kind": { "oneof": ["text", "count"] }
                            },
                            "fields": {
                                "field": { "type": "EnumType", "id": 2 },
                                "name": { "type": "string", "id": 1, "rule": "required" },
                                "text": { "type": "string", "id": 3 },
                                "count": { "type": "int32", "id": 4 }
                            }
                        },
                        "EnumType": {
                            "values": { "ONE": 1, "TWO": 2 }
                        },
                        "Greeter": {
                            "methods": {
                                "SayHello": {
                                    "requestType": "Message",
                                    "responseType": "Message"
                                },
                                "SayMultiHello": {
                                    "requestType": "Message",
                                    "responseType": "Message",
                                    "responseStream": true
                                }
                            }
                        },
                        "sub": {
                            "nested": {
                                "Inner": { "fields": {} }
                            }
                        }
                    }
                }
            }
        });
        DescriptorTree::from_json(&descriptor.to_string()).unwrap()
    }

    #[test]
    fn looks_up_messages_enums_and_services() {
        let tree = sample_tree();
        assert!(tree.lookup_message("test.Message").is_some());
        assert!(tree.lookup_enum("test.EnumType").is_some());
        assert!(tree.lookup_service("test.Greeter").is_some());
        assert!(tree.lookup_message("test.sub.Inner").is_some());
        assert!(tree.lookup_message("test.Missing").is_none());
    }

    #[test]
    fn resolves_enum_field_from_message_scope() {
        let tree = sample_tree();
        let message = tree.lookup_message("test.Message").unwrap();
        let field = message.fields.iter().find(|f| f.name == "field").unwrap();
        let resolved = tree.resolve_field_enum(message, field).unwrap();
        assert_eq!(resolved.as_deref(), Some("test.EnumType"));
    }

    #[test]
    fn scalar_fields_do_not_resolve_to_enums() {
        let tree = sample_tree();
        let message = tree.lookup_message("test.Message").unwrap();
        let field = message.fields.iter().find(|f| f.name == "name").unwrap();
        assert_eq!(tree.resolve_field_enum(message, field).unwrap(), None);
    }

    #[test]
    fn unresolvable_reference_is_a_schema_error() {
        let tree = sample_tree();
        let error = tree.resolve_type("test", "NoSuchType").unwrap_err();
        assert!(matches!(error, SchemaError::UnresolvedType { .. }));
    }

    #[test]
    fn required_and_oneof_flags_are_recorded() {
        let tree = sample_tree();
        let message = tree.lookup_message("test.Message").unwrap();
        let name = message.fields.iter().find(|f| f.name == "name").unwrap();
        assert!(name.required);
        assert_eq!(name.oneof, None);
        let text = message.fields.iter().find(|f| f.name == "text").unwrap();
        assert!(!text.required);
        assert_eq!(text.oneof.as_deref(), Some("kind"));
        assert!(message.has_oneof_group("kind"));
        assert!(!message.has_oneof_group("text"));
    }

    #[test]
    fn field_declaration_order_is_preserved() {
        let tree = sample_tree();
        let message = tree.lookup_message("test.Message").unwrap();
        let names: Vec<&str> = message.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["field", "name", "text", "count"]);
    }

    #[test]
    fn service_projects_to_transport_definition() {
        let tree = sample_tree();
        let service = tree.lookup_service("test.Greeter").unwrap();
        let def = service.to_service_def();
        assert_eq!(def.name, "test.Greeter");
        assert_eq!(def.methods.len(), 2);
        let multi = def
            .methods
            .iter()
            .find(|m| m.name == "SayMultiHello")
            .unwrap();
        assert!(multi.server_streaming);
        let hello = def.methods.iter().find(|m| m.name == "SayHello").unwrap();
        assert!(!hello.server_streaming);
    }

    #[test]
    fn invalid_json_is_a_schema_error() {
        let error = DescriptorTree::from_json("not json").unwrap_err();
        assert!(matches!(error, SchemaError::InvalidDescriptor { .. }));
    }
}
