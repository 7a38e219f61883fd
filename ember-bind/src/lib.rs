//! Ember Call-Site Binder
//!
//! The binding core of the Ember runtime. For every call-like operation a
//! guest program performs (method call, member access, construction,
//! operator, protocol conversion) it decides which implementation runs for
//! the runtime shapes of the receiver and arguments, and remembers that
//! decision at the call site.
//!
//! # Pipeline
//!
//! - [`shape`]: structural summaries of runtime values, hash-consed
//! - [`discovery`]: members that could serve an operation on a shape
//! - [`resolve`]: overload ranking, generic inference and selection
//! - [`rule`]: guard plus action packaging of a resolution
//! - [`site`]: per-call-site inline cache (mono-, poly-, megamorphic)
//! - [`late_bound`]: name-based binding for external objects
//! - [`rescue`]: exception handler matching
//!
//! The host object system is reached only through
//! [`host::HostObjectModel`]; [`host::ClassTable`] is a self-contained
//! implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ember_bind::{BinderConfig, CallSiteId, ClassTable, OperationDescriptor, Runtime, Value};
//!
//! let table = Arc::new(ClassTable::new());
//! let integer = table.builtins().integer;
//! table.define_method(integer, "succ", |c| c, |recv, _| Ok(Value::Int(recv.as_int().unwrap_or(0) + 1)));
//!
//! let runtime = Runtime::new(table, BinderConfig::default());
//! let succ = OperationDescriptor::call("succ", 0);
//! let two = runtime.dispatch(CallSiteId::new(1), &succ, &Value::Int(1), Vec::new())?;
//! assert_eq!(two, Value::Int(2));
//! ```

pub mod candidate;
pub mod config;
pub mod discovery;
pub mod error;
pub mod host;
pub mod late_bound;
pub mod operation;
pub mod rescue;
pub mod resolve;
pub mod rule;
pub mod runtime;
pub mod shape;
pub mod site;
pub mod value;

pub use candidate::{Arity, Candidate, GenericConstraint, GenericSlot, MemberKind, MethodId, ParamType};
pub use config::{BinderConfig, ConfigError};
pub use error::{BindingError, BindingErrorKind, DispatchError, ExpectedArity, HostError, InternalError};
pub use host::{ClassTable, HostObjectModel};
pub use operation::{ConversionKind, OperationDescriptor, OperatorKind, Visibility};
pub use rescue::{HandlerMatch, MatchedBy, MatcherSpec};
pub use resolve::{Rank, ResolutionOutcome};
pub use rule::{Action, Confidence, Rule};
pub use runtime::Runtime;
pub use shape::{Shape, ShapeClass, TypeFlags, TypeRef};
pub use site::{CallSite, CallSiteId, Tier};
pub use value::Value;
