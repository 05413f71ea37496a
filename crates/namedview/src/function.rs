//! The executable function model.
//!
//! A [`ViewFunction`] receives the callback scope for its invocation plus the
//! positional arguments of its kind, and answers with an [`Invocation`]:
//! either a value returned directly or a lazy [`Producer`] that the engine
//! drains while the scope is still open. Producers let list functions pull
//! rows from the driver between items without any coroutine machinery.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::FunctionError;
use crate::scope::{Callback, CallbackScope};

/// The function categories the engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// Emits key/value pairs for one document.
    Map,
    /// Aggregates emitted values.
    Reduce,
    /// Aggregates previously reduced values.
    Rereduce,
    /// Renders one document as a response.
    Show,
    /// Renders a stream of view rows as a response.
    List,
    /// Decides whether a document passes a change feed.
    Filter,
    /// Produces an updated document and a response.
    Update,
    /// Accepts or rejects a document write.
    ValidateDocUpdate,
}

impl FunctionKind {
    /// Maps a design-document section name to the kind it holds.
    ///
    /// Only sections addressable through `ddoc` are recognised; map and
    /// reduce functions arrive through their own commands.
    #[must_use]
    pub fn from_section(section: &str) -> Option<Self> {
        match section {
            "shows" => Some(Self::Show),
            "lists" => Some(Self::List),
            "filters" => Some(Self::Filter),
            "updates" => Some(Self::Update),
            "validate_doc_update" => Some(Self::ValidateDocUpdate),
            _ => None,
        }
    }

    /// Returns the canonical kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Reduce => "reduce",
            Self::Rereduce => "rereduce",
            Self::Show => "show",
            Self::List => "list",
            Self::Filter => "filter",
            Self::Update => "update",
            Self::ValidateDocUpdate => "validate_doc_update",
        }
    }

    /// Whether functions of this kind may invoke `callback`.
    #[must_use]
    pub const fn permits(self, callback: Callback) -> bool {
        matches!(
            (self, callback),
            (_, Callback::Log)
                | (Self::Map, Callback::Emit)
                | (Self::Show | Self::List, Callback::Start | Callback::Send)
                | (Self::List, Callback::GetRow)
        )
    }

    /// Wire `where` value for runtime failures of this kind.
    #[must_use]
    pub const fn runtime_phase(self) -> &'static str {
        match self {
            Self::Map => "map_runtime_error",
            Self::Reduce | Self::Rereduce => "reduce_runtime_error",
            Self::Show => "show_runtime_error",
            Self::List => "list_runtime_error",
            Self::Filter => "filter_runtime_error",
            Self::Update => "update_runtime_error",
            Self::ValidateDocUpdate => "validate_doc_update_runtime_error",
        }
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function the engine can invoke.
///
/// Implemented for every suitable closure, so most callers build functions
/// with [`view_function`].
pub trait ViewFunction: Send + Sync {
    /// Runs the function.
    ///
    /// # Errors
    ///
    /// Returns a [`FunctionError`] for domain outcomes such as `forbidden`,
    /// for runtime failures, and for callback misuse.
    fn call(
        &self,
        scope: &mut CallbackScope<'_>,
        args: Vec<Value>,
    ) -> Result<Invocation, FunctionError>;
}

impl<F> ViewFunction for F
where
    F: Fn(&mut CallbackScope<'_>, Vec<Value>) -> Result<Invocation, FunctionError> + Send + Sync,
{
    fn call(
        &self,
        scope: &mut CallbackScope<'_>,
        args: Vec<Value>,
    ) -> Result<Invocation, FunctionError> {
        self(scope, args)
    }
}

/// Wraps a closure as a shareable [`ViewFunction`].
pub fn view_function<F>(function: F) -> Arc<dyn ViewFunction>
where
    F: Fn(&mut CallbackScope<'_>, Vec<Value>) -> Result<Invocation, FunctionError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(function)
}

/// A lazily evaluated sequence of items.
///
/// Each step receives the open scope, so an item may be computed after
/// pulling rows or logging.
pub trait Producer {
    /// Produces the next item, or `None` when the sequence is exhausted.
    fn next_item(&mut self, scope: &mut CallbackScope<'_>)
    -> Option<Result<Value, FunctionError>>;
}

struct IterProducer<I> {
    items: I,
}

impl<I: Iterator<Item = Value>> Producer for IterProducer<I> {
    fn next_item(
        &mut self,
        _scope: &mut CallbackScope<'_>,
    ) -> Option<Result<Value, FunctionError>> {
        self.items.next().map(Ok)
    }
}

struct FnProducer<F> {
    step: F,
}

impl<F> Producer for FnProducer<F>
where
    F: FnMut(&mut CallbackScope<'_>) -> Option<Result<Value, FunctionError>>,
{
    fn next_item(
        &mut self,
        scope: &mut CallbackScope<'_>,
    ) -> Option<Result<Value, FunctionError>> {
        (self.step)(scope)
    }
}

/// What a function handed back to the engine.
pub enum Invocation {
    /// A value returned directly.
    Returned(Value),
    /// A sequence the engine drains while the scope is open.
    Produced(Box<dyn Producer>),
}

impl Invocation {
    /// A directly returned value.
    pub fn returned(value: impl Into<Value>) -> Self {
        Self::Returned(value.into())
    }

    /// A `null` return.
    #[must_use]
    pub const fn nothing() -> Self {
        Self::Returned(Value::Null)
    }

    /// A producer over already computed items.
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        Self::Produced(Box::new(IterProducer {
            items: items.into_iter(),
        }))
    }

    /// A producer computing each item on demand.
    pub fn producer<F>(step: F) -> Self
    where
        F: FnMut(&mut CallbackScope<'_>) -> Option<Result<Value, FunctionError>> + 'static,
    {
        Self::Produced(Box::new(FnProducer { step }))
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returned(value) => f.debug_tuple("Returned").field(value).finish(),
            Self::Produced(_) => f.write_str("Produced(..)"),
        }
    }
}
