//! Action traits - state transforms the reducer runs one at a time.
//!
//! Two layers, same split as a typed handler registry:
//! - **Typed**: [`Action<S>`] with its own `Args` type, or a plain async
//!   closure wrapped in [`FnAction`].
//! - **Dyn**: [`DynAction<S>`], object-safe, takes JSON arguments. The queue
//!   only ever sees this layer.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{ActionArgs, ActionName, BoxError, Reason, ReducerError};

/// A named, asynchronous state transform.
///
/// Whatever `apply` returns becomes the new state, no merging is applied.
///
/// # Example
/// ```ignore
/// struct Add;
///
/// #[async_trait]
/// impl Action<Counter> for Add {
///     type Args = (i64,);
///
///     async fn apply(&self, state: Counter, (n,): (i64,)) -> Result<Counter, BoxError> {
///         Ok(Counter { count: state.count + n })
///     }
/// }
/// ```
#[async_trait]
pub trait Action<S>: Send + Sync {
    /// Arguments after the leading state, usually a tuple.
    type Args: DeserializeOwned + Send;

    async fn apply(&self, state: S, args: Self::Args) -> Result<S, BoxError>;
}

/// Object-safe form of an action, fed with JSON arguments.
#[async_trait]
pub trait DynAction<S>: Send + Sync {
    async fn invoke_dyn(&self, state: S, args: ActionArgs) -> Result<S, Reason>;
}

/// Adapts an [`Action`] to [`DynAction`] by decoding its arguments.
pub struct TypedAction<S, A> {
    name: ActionName,
    action: A,
    _marker: PhantomData<fn(S) -> S>,
}

impl<S, A> TypedAction<S, A> {
    pub fn new(name: ActionName, action: A) -> Self {
        Self {
            name,
            action,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<S, A> DynAction<S> for TypedAction<S, A>
where
    S: Send + 'static,
    A: Action<S>,
{
    async fn invoke_dyn(&self, state: S, args: ActionArgs) -> Result<S, Reason> {
        let args = decode_args::<A::Args>(&self.name, args).map_err(ReducerError::into_reason)?;
        self.action.apply(state, args).await.map_err(Reason::from)
    }
}

/// Decode queued arguments into an action's `Args`.
///
/// Tries, in order: the whole list (tuples, `Vec`s), the lone element of a
/// one-element list (plain `Args = i64`), and `null` for an empty list
/// (`Args = ()`).
pub(crate) fn decode_args<T: DeserializeOwned>(
    name: &ActionName,
    args: ActionArgs,
) -> Result<T, ReducerError> {
    let first_err = match serde_json::from_value::<T>(Value::Array(args.clone())) {
        Ok(decoded) => return Ok(decoded),
        Err(e) => e,
    };

    let fallback = match args.as_slice() {
        [] => serde_json::from_value::<T>(Value::Null).ok(),
        [single] => serde_json::from_value::<T>(single.clone()).ok(),
        _ => None,
    };

    fallback.ok_or_else(|| ReducerError::InvalidArgs {
        action: name.clone(),
        message: first_err.to_string(),
    })
}

/// Closure-backed action.
///
/// The closure receives the state and the decoded arguments and returns a
/// fresh future per call.
pub struct FnAction<F, Args> {
    f: F,
    _marker: PhantomData<fn(Args)>,
}

impl<F, Args> FnAction<F, Args> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, Fut, Args> Action<S> for FnAction<F, Args>
where
    S: Send + 'static,
    F: Fn(S, Args) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S, BoxError>> + Send,
    Args: DeserializeOwned + Send,
{
    type Args = Args;

    async fn apply(&self, state: S, args: Args) -> Result<S, BoxError> {
        (self.f)(state, args).await
    }
}

/// Stand-in for a dispatch whose arguments could not be encoded.
///
/// The failure is delivered like any other rejection, through the queue.
pub(crate) struct Rejected {
    reason: Reason,
}

impl Rejected {
    pub(crate) fn new(err: ReducerError) -> Self {
        Self {
            reason: err.into_reason(),
        }
    }
}

#[async_trait]
impl<S: Send + 'static> DynAction<S> for Rejected {
    async fn invoke_dyn(&self, _state: S, _args: ActionArgs) -> Result<S, Reason> {
        Err(Arc::clone(&self.reason))
    }
}
