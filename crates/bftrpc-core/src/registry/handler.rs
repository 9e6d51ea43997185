use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::context::CallContext;
use crate::error::{BindError, CallError};
use crate::param::{ArgValue, Param, TypeTag};

// ==============================================================================
// Type-Erased Invoker
// ==============================================================================

/// Arguments converted to the concrete types of one handler, boxed so they
/// can cross the type-erased boundary.
pub struct BoundArgs(Box<dyn Any + Send>);

impl BoundArgs {
    fn new<T: Send + 'static>(args: T) -> Self {
        Self(Box::new(args))
    }

    fn downcast<T: 'static>(self) -> Result<T, CallError> {
        self.0
            .downcast::<T>()
            .map(|args| *args)
            .map_err(|_| CallError::ArgumentShape)
    }
}

impl fmt::Debug for BoundArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoundArgs(..)")
    }
}

/// Uniform calling convention shared by every registered function.
#[async_trait]
pub trait ErasedHandler: Send + Sync + 'static {
    /// Convert resolved wire arguments (one per declared parameter, in order)
    /// into the handler's concrete argument types.
    fn bind(&self, args: Vec<ArgValue>) -> Result<BoundArgs, BindError>;

    /// Run the handler. `Err` carries the handler's own error message.
    async fn call(&self, ctx: CallContext, args: BoundArgs) -> Result<Value, CallError>;
}

/// Conversion from a concrete async function into an [`ErasedHandler`].
///
/// Implemented for `Fn(CallContext, A1, .., An) -> Future<Output = Result<R, E>>`
/// with up to eight [`Param`] arguments. `Args` only disambiguates arities.
pub trait IntoHandler<Args>: Clone + Send + Sync + 'static {
    fn param_types() -> Vec<TypeTag>;

    fn return_types() -> Vec<TypeTag>;

    fn into_erased(self) -> Arc<dyn ErasedHandler>;
}

struct FnHandler<F, Args> {
    f: F,
    _args: PhantomData<fn(Args)>,
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, R, E, $($arg,)*> IntoHandler<($($arg,)*)> for F
        where
            F: Fn(CallContext, $($arg,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Result<R, E>> + Send + 'static,
            R: Serialize + Send + 'static,
            E: fmt::Display + Send + 'static,
            $($arg: Param,)*
        {
            fn param_types() -> Vec<TypeTag> {
                vec![$($arg::type_tag(),)*]
            }

            fn return_types() -> Vec<TypeTag> {
                vec![TypeTag::of_result::<R>(), TypeTag::Error]
            }

            fn into_erased(self) -> Arc<dyn ErasedHandler> {
                Arc::new(FnHandler::<F, ($($arg,)*)> {
                    f: self,
                    _args: PhantomData,
                })
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        #[async_trait]
        impl<F, Fut, R, E, $($arg,)*> ErasedHandler for FnHandler<F, ($($arg,)*)>
        where
            F: Fn(CallContext, $($arg,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Result<R, E>> + Send + 'static,
            R: Serialize + Send + 'static,
            E: fmt::Display + Send + 'static,
            $($arg: Param,)*
        {
            fn bind(&self, args: Vec<ArgValue>) -> Result<BoundArgs, BindError> {
                let mut args = args.into_iter();
                $(
                    let $arg = $arg::from_arg(args.next().unwrap_or(ArgValue::Absent))?;
                )*
                Ok(BoundArgs::new(($($arg,)*)))
            }

            async fn call(&self, ctx: CallContext, args: BoundArgs) -> Result<Value, CallError> {
                let ($($arg,)*) = args.downcast::<($($arg,)*)>()?;
                let result = (self.f)(ctx, $($arg,)*)
                    .await
                    .map_err(|err| CallError::Handler(err.to_string()))?;
                Ok(serde_json::to_value(result)?)
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);
impl_handler!(A1, A2, A3, A4, A5, A6, A7);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8);
