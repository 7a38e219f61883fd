//! Binding, internal and host errors.
//!
//! Three families of failure leave the binder:
//!
//! - [`BindingError`]: the guest program asked for something that does not
//!   bind (wrong argument count, no applicable overload, ambiguity, ...).
//!   These are recoverable by the guest and carry enough context for a
//!   precise diagnostic. They are never cached.
//! - [`InternalError`]: a binder invariant was violated at one call site.
//!   The site is faulted; no other site is affected.
//! - [`HostError`]: the executed action itself failed.

use std::fmt;

use thiserror::Error;

use crate::candidate::{Arity, Candidate, GenericConstraint};
use crate::operation::{OperationDescriptor, Visibility};
use crate::shape::Shape;
use crate::site::CallSiteId;
use crate::value::Value;

/// The set of argument counts the candidates of an operation accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedArity(Vec<Arity>);

impl ExpectedArity {
    pub fn new<I: IntoIterator<Item = Arity>>(arities: I) -> Self {
        let mut arities: Vec<Arity> = arities.into_iter().collect();
        arities.sort();
        arities.dedup();
        Self(arities)
    }

    pub fn arities(&self) -> &[Arity] {
        &self.0
    }
}

impl fmt::Display for ExpectedArity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.0.len();
        for (i, arity) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(if i + 1 == count { " or " } else { ", " })?;
            }
            write!(f, "{}", arity)?;
        }
        Ok(())
    }
}

/// What went wrong while binding an operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingErrorKind {
    /// No candidate accepts the supplied number of arguments.
    #[error("wrong number of arguments ({given} for {expected})")]
    Arity { given: usize, expected: ExpectedArity },

    /// Candidates accept the argument count but not the argument types.
    #[error("no overload of `{name}` accepts ({})", .arg_types.join(", "))]
    NoApplicableCandidate {
        name: String,
        arg_types: Vec<String>,
        considered: usize,
    },

    /// Two or more candidates are equally good.
    #[error(
        "ambiguous call to `{name}` with ({}): {} candidates match equally well",
        .arg_types.join(", "),
        .candidates.len()
    )]
    AmbiguousCandidate {
        name: String,
        arg_types: Vec<String>,
        candidates: Vec<Candidate>,
    },

    /// A generic slot was bound to a type violating its constraint.
    #[error("generic parameter `{slot}` of `{name}` requires a {constraint}, but `{type_name}` is not")]
    ConstraintViolation {
        name: String,
        slot: String,
        constraint: GenericConstraint,
        type_name: String,
    },

    /// A candidate exists but the caller may not see it.
    #[error("{visibility} method `{name}' called for {receiver}")]
    Visibility {
        name: String,
        visibility: Visibility,
        receiver: String,
    },

    /// The receiver has no member of that name at all.
    #[error("undefined method `{name}' for {receiver}")]
    UndefinedMember { name: String, receiver: String },

    /// A value of the wrong kind reached the binder (rescue matchers,
    /// conversion protocol results).
    #[error("{message}")]
    TypeError { message: String },
}

/// A guest-visible binding failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct BindingError {
    /// The operation that failed to bind.
    pub descriptor: OperationDescriptor,
    /// The argument shapes the binder attempted.
    pub arg_shapes: Vec<Shape>,
    /// The failure.
    pub kind: BindingErrorKind,
}

impl BindingError {
    pub fn new(descriptor: OperationDescriptor, arg_shapes: Vec<Shape>, kind: BindingErrorKind) -> Self {
        Self {
            descriptor,
            arg_shapes,
            kind,
        }
    }

    /// A type error with no argument context.
    pub fn type_error(descriptor: OperationDescriptor, message: String) -> Self {
        Self::new(descriptor, Vec::new(), BindingErrorKind::TypeError { message })
    }

    pub fn kind(&self) -> &BindingErrorKind {
        &self.kind
    }
}

/// A violated binder invariant, confined to one call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("call site {site}: guard admitted shapes its rule was not compiled for (cached {cached}, fresh {fresh})")]
    UnsoundGuard {
        site: CallSiteId,
        cached: String,
        fresh: String,
    },

    #[error("call site {site}: action expects {expected} arguments but guard admitted {given}")]
    ActionMismatch {
        site: CallSiteId,
        expected: String,
        given: usize,
    },

    #[error("call site {site} was created for {existing}, not {requested}")]
    DescriptorMismatch {
        site: CallSiteId,
        existing: String,
        requested: String,
    },

    #[error("call site {site} is faulted: {reason}")]
    SiteFaulted { site: CallSiteId, reason: String },
}

/// A failure reported by the host while executing an action.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The action raised a guest exception.
    #[error("guest exception raised: {0:?}")]
    Raised(Value),

    #[error("{0}")]
    Failed(String),
}

/// Any failure of `dispatch`.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("internal binder error: {0}")]
    Internal(#[from] InternalError),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl DispatchError {
    pub fn as_binding(&self) -> Option<&BindingError> {
        match self {
            DispatchError::Binding(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, DispatchError::Internal(_))
    }
}
