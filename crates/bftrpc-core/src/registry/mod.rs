//! Function registry.
//!
//! Built once at startup with [`RegistryBuilder`], then shared read-only
//! (typically as `Arc<Registry>`) by every HTTP request and WebSocket
//! connection. There is no removal or later mutation, so no locking is needed.

mod handler;

pub use handler::{BoundArgs, ErasedHandler, IntoHandler};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::param::TypeTag;

// ==============================================================================
// Function Descriptor
// ==============================================================================

/// Registered metadata for one callable method, plus its invoker.
///
/// `arg_types` is parallel to `arg_names`; the implicit leading
/// [`CallContext`](crate::CallContext) argument is never listed.
pub struct FunctionDescriptor {
    name: String,
    arg_names: Vec<String>,
    arg_types: Vec<TypeTag>,
    return_types: Vec<TypeTag>,
    websocket_only: bool,
    handler: Arc<dyn ErasedHandler>,
}

impl FunctionDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    pub fn arg_types(&self) -> &[TypeTag] {
        &self.arg_types
    }

    pub fn return_types(&self) -> &[TypeTag] {
        &self.return_types
    }

    pub fn websocket_only(&self) -> bool {
        self.websocket_only
    }

    /// Declared parameters as `(name, type)` pairs.
    pub fn params(&self) -> impl Iterator<Item = (&str, &TypeTag)> {
        self.arg_names
            .iter()
            .map(String::as_str)
            .zip(self.arg_types.iter())
    }

    pub(crate) fn handler(&self) -> &dyn ErasedHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("arg_names", &self.arg_names)
            .field("arg_types", &self.arg_types)
            .field("return_types", &self.return_types)
            .field("websocket_only", &self.websocket_only)
            .finish_non_exhaustive()
    }
}

// ==============================================================================
// Registry
// ==============================================================================

#[derive(Debug, Default)]
pub struct Registry {
    functions: BTreeMap<String, FunctionDescriptor>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    /// Descriptors in method-name order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    functions: BTreeMap<String, FunctionDescriptor>,
}

impl RegistryBuilder {
    /// Register `handler` under `name`. `arg_names` must list one name per
    /// handler parameter after the context.
    pub fn register<Args, H>(
        &mut self,
        name: &str,
        handler: H,
        arg_names: &[&str],
        websocket_only: bool,
    ) -> Result<&mut Self, RegistryError>
    where
        H: IntoHandler<Args>,
    {
        if name.is_empty() || name.contains('/') {
            return Err(RegistryError::InvalidName(name.to_owned()));
        }
        if self.functions.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_owned()));
        }

        let arg_types = H::param_types();
        if arg_types.len() != arg_names.len() {
            return Err(RegistryError::ArityMismatch {
                name: name.to_owned(),
                expected: arg_types.len(),
                got: arg_names.len(),
            });
        }

        let descriptor = FunctionDescriptor {
            name: name.to_owned(),
            arg_names: arg_names.iter().map(|arg| (*arg).to_owned()).collect(),
            arg_types,
            return_types: H::return_types(),
            websocket_only,
            handler: handler.into_erased(),
        };
        self.functions.insert(name.to_owned(), descriptor);
        Ok(self)
    }

    /// Register a function reachable over every transport.
    pub fn func<Args, H>(
        &mut self,
        name: &str,
        arg_names: &[&str],
        handler: H,
    ) -> Result<&mut Self, RegistryError>
    where
        H: IntoHandler<Args>,
    {
        self.register(name, handler, arg_names, false)
    }

    /// Register a function reachable only over WebSocket connections.
    pub fn ws_func<Args, H>(
        &mut self,
        name: &str,
        arg_names: &[&str],
        handler: H,
    ) -> Result<&mut Self, RegistryError>
    where
        H: IntoHandler<Args>,
    {
        self.register(name, handler, arg_names, true)
    }

    pub fn build(self) -> Registry {
        Registry {
            functions: self.functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use crate::types::{Bytes, Polymorphic};

    async fn echo(_ctx: CallContext, arg: String) -> Result<String, String> {
        Ok(arg)
    }

    async fn block(_ctx: CallContext, height: Option<i64>, raw: Bytes) -> Result<u64, String> {
        Ok(height.unwrap_or_default() as u64 + raw.as_slice().len() as u64)
    }

    async fn account(_ctx: CallContext) -> Result<Polymorphic, String> {
        Err("no accounts".to_owned())
    }

    #[test]
    fn descriptors_capture_parameter_and_return_types() {
        let mut builder = Registry::builder();
        builder
            .func("echo", &["arg"], echo)
            .expect("register echo")
            .func("block", &["height", "raw"], block)
            .expect("register block")
            .ws_func("account", &[], account)
            .expect("register account");
        let registry = builder.build();

        assert_eq!(registry.len(), 3);
        let names: Vec<&str> = registry.iter().map(FunctionDescriptor::name).collect();
        assert_eq!(names, vec!["account", "block", "echo"]);

        let block = registry.lookup("block").expect("block registered");
        assert_eq!(
            block.arg_types(),
            &[TypeTag::Optional(Box::new(TypeTag::Int)), TypeTag::Bytes]
        );
        assert_eq!(block.return_types()[1], TypeTag::Error);
        assert!(!block.websocket_only());

        let account = registry.lookup("account").expect("account registered");
        assert!(account.websocket_only());
        assert_eq!(account.return_types()[0], TypeTag::Interface);
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut builder = Registry::builder();
        builder.func("echo", &["arg"], echo).expect("first echo");
        let err = builder
            .func("echo", &["arg"], echo)
            .expect_err("second echo must fail");
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "echo"));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut builder = Registry::builder();
        let err = builder
            .func("echo", &["arg", "extra"], echo)
            .expect_err("two names for one parameter");
        assert!(matches!(
            err,
            RegistryError::ArityMismatch {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let mut builder = Registry::builder();
        assert!(matches!(
            builder.func("a/b", &["arg"], echo),
            Err(RegistryError::InvalidName(_))
        ));
        assert!(matches!(
            builder.func("", &["arg"], echo),
            Err(RegistryError::InvalidName(_))
        ));
    }
}
