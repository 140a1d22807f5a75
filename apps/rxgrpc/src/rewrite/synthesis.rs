//! Pass 5: namespace-scoped synthesis of factory and builder interfaces.
//!
//! For every namespace declaration in the generated module, a
//! `ClientFactory` and a `ServerBuilder` interface are synthesized and
//! inserted immediately before the namespace body. Each exposes one entry
//! per service owned *directly* by that namespace: descendants synthesize
//! their own factories.
//!
//! Ownership is derived from the service's `@exports` reference: it must
//! extend the namespace name by exactly one segment.

use crate::error::{AnnotationError, GenerateError};
use crate::rewrite::source::{Item, ItemKind, Module};

/// A service declaration found in the generated module.
#[derive(Debug, Clone)]
struct ServiceRef {
    /// Fully qualified reference from `@exports`.
    reference: String,
    /// Declared constructor name.
    name: String,
}

/// Apply the synthesis, returning a new module.
pub fn run(module: &Module) -> Result<Module, GenerateError> {
    let services = collect_services(module);

    let mut items = Vec::with_capacity(module.items.len());
    for item in &module.items {
        if is_namespace(item) {
            let namespace = namespace_name(item)?;
            let owned = owned_services(&services, &namespace);
            let factory = Module::parse(&client_factory_source(&namespace, &owned));
            let builder = Module::parse(&server_builder_source(&namespace, &owned));
            items.extend(factory.items);
            items.extend(builder.items);
        }
        items.push(item.clone());
    }
    Ok(Module { items })
}

/// Service constructors have more than one declared parameter.
fn collect_services(module: &Module) -> Vec<ServiceRef> {
    module
        .items
        .iter()
        .filter_map(|item| {
            let reference = item.exports_reference()?;
            match item.kind() {
                ItemKind::Function { name, params } if params > 1 => {
                    Some(ServiceRef { reference, name })
                }
                _ => None,
            }
        })
        .collect()
}

fn is_namespace(item: &Item) -> bool {
    item.doc.as_ref().is_some_and(|doc| doc.has_tag("namespace"))
}

/// A namespace without a resolvable name cannot be targeted by downstream
/// consumers, so this failure is fatal.
fn namespace_name(item: &Item) -> Result<String, AnnotationError> {
    item.exports_reference()
        .ok_or(AnnotationError::MissingTag {
            tag: "exports",
            context: "namespace declaration".to_string(),
        })
}

/// Services owned directly by the namespace: prefix plus exactly one
/// segment.
fn owned_services(services: &[ServiceRef], namespace: &str) -> Vec<ServiceRef> {
    services
        .iter()
        .filter(|service| {
            service
                .reference
                .strip_prefix(namespace)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|relative| !relative.contains('.'))
        })
        .cloned()
        .collect()
}

fn client_factory_source(namespace: &str, services: &[ServiceRef]) -> String {
    let mut source = format!(
        "/**\n * Contains all the RPC service clients.\n * @exports {namespace}.ClientFactory\n * @interface\n */\nfunction ClientFactory() {{}}\n"
    );
    for service in services {
        source.push_str(&format!(
            "\n/**\n * Returns the {name} service client.\n * @returns {{{reference}}}\n * @memberof {namespace}.ClientFactory\n */\nClientFactory.prototype.get{name} = function() {{}};\n",
            name = service.name,
            reference = service.reference,
        ));
    }
    source
}

fn server_builder_source(namespace: &str, services: &[ServiceRef]) -> String {
    let mut source = format!(
        "/**\n * Builder for an RPC service server.\n * @exports {namespace}.ServerBuilder\n * @interface\n */\nfunction ServerBuilder() {{}}\n"
    );
    for service in services {
        source.push_str(&format!(
            "\n/**\n * Adds a {name} service implementation.\n * @param {{{reference}}} impl {name} service implementation\n * @returns {{{namespace}.ServerBuilder}}\n * @memberof {namespace}.ServerBuilder\n */\nServerBuilder.prototype.add{name} = function() {{}};\n",
            name = service.name,
            reference = service.reference,
        ));
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
/**
 * Constructs a new Greeter service.
 * @exports test.Greeter
 * @interface
 */
function Greeter(rpcImpl, requestDelimited, responseDelimited) {
}

/**
 * Constructs a new Inner service.
 * @exports test.sub.Inner
 * @interface
 */
function Inner(rpcImpl, requestDelimited, responseDelimited) {
}

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

    #[test]
    fn synthesizes_factory_and_builder_per_namespace() {
        let rendered = run(&Module::parse(SOURCE)).unwrap().render();
        assert!(rendered.contains("@exports test.ClientFactory"));
        assert!(rendered.contains("@exports test.ServerBuilder"));
        assert!(rendered.contains("@exports test.sub.ClientFactory"));
        assert!(rendered.contains("@exports test.sub.ServerBuilder"));
    }

    #[test]
    fn ownership_is_prefix_plus_one_segment() {
        let rendered = run(&Module::parse(SOURCE)).unwrap().render();
        // `test` owns Greeter but not the nested Inner.
        let factory_for_test = rendered
            .split("@exports test.ClientFactory")
            .nth(1)
            .unwrap()
            .split("@exports")
            .next()
            .unwrap();
        assert!(factory_for_test.contains("getGreeter"));
        assert!(!factory_for_test.contains("getInner"));
    }

    #[test]
    fn nested_namespace_owns_only_its_service() {
        let rendered = run(&Module::parse(SOURCE)).unwrap().render();
        let factory_for_sub = rendered
            .split("@exports test.sub.ClientFactory")
            .nth(1)
            .unwrap()
            .split("@exports")
            .next()
            .unwrap();
        assert!(factory_for_sub.contains("getInner"));
        assert!(!factory_for_sub.contains("getGreeter"));
    }

    #[test]
    fn builder_methods_accept_implementation_and_chain() {
        let rendered = run(&Module::parse(SOURCE)).unwrap().render();
        assert!(rendered.contains("ServerBuilder.prototype.addGreeter"));
        assert!(rendered.contains("@param {test.Greeter} impl"));
        assert!(rendered.contains("@returns {test.ServerBuilder}"));
    }

    #[test]
    fn interfaces_are_inserted_before_the_namespace_body() {
        let rendered = run(&Module::parse(SOURCE)).unwrap().render();
        let factory_at = rendered.find("@exports test.ClientFactory").unwrap();
        let namespace_at = rendered.find("var test = {};").unwrap();
        assert!(factory_at < namespace_at);
    }

    #[test]
    fn namespace_without_name_is_fatal() {
        let source = "\
/**
 * Namespace without exports.
 * @namespace
 */
var broken = {};
";
        let error = run(&Module::parse(source)).unwrap_err();
        assert!(matches!(error, GenerateError::Annotation(_)));
    }

    #[test]
    fn similarly_prefixed_namespaces_do_not_claim_services() {
        let source = "\
/**
 * @exports testing.Svc
 * @interface
 */
function Svc(rpcImpl, requestDelimited) {
}

/**
 * Namespace test.
 * @exports test
 * @namespace
 */
var test = {};
";
        let rendered = run(&Module::parse(source)).unwrap().render();
        assert!(!rendered.contains("getSvc"));
    }
}
