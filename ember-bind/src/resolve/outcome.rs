//! Resolution outcomes and failure classification.

use std::fmt;

use crate::candidate::{Arity, Candidate, GenericConstraint, ParamType};
use crate::error::{BindingErrorKind, ExpectedArity};
use crate::host::HostObjectModel;
use crate::shape::{Shape, TypeRef};

use super::rank::{total, Conversion, Rank};

/// Which parameter receives an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgSlot {
    /// The mandatory or optional parameter at this index.
    Param(usize),
    /// Collected into the trailing parameter at this offset.
    Rest(usize),
}

/// A candidate bound to concrete arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCandidate {
    pub candidate: Candidate,
    /// Per-argument ranks.
    pub ranks: Vec<Rank>,
    /// Per-argument conversions the action must apply.
    pub conversions: Vec<Option<Conversion>>,
    /// Per-argument parameter mapping.
    pub mapping: Vec<ArgSlot>,
    /// Bound generic arguments, by slot.
    pub type_args: Vec<TypeRef>,
    /// Number of generic slots bound by inference rather than explicitly.
    pub inferred: usize,
    /// Optional parameters the call leaves to their defaults.
    pub omitted: usize,
}

impl BoundCandidate {
    pub fn total_rank(&self) -> u32 {
        total(&self.ranks)
    }

    pub fn is_variadic(&self) -> bool {
        self.candidate.is_variadic()
    }
}

/// Why a candidate was inapplicable.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The candidate does not take this many arguments.
    Arity { expected: Arity, given: usize },
    /// The argument at `position` does not convert to `param`.
    Inapplicable { position: usize, param: ParamType },
    /// A generic slot was bound to a type violating a constraint.
    Constraint {
        slot: String,
        constraint: GenericConstraint,
        bound: TypeRef,
    },
    /// Two arguments inferred different types for one slot.
    Conflict {
        slot: String,
        first: TypeRef,
        second: TypeRef,
    },
    /// No argument determines a generic slot.
    Unbound { slot: String },
    /// Explicit type arguments of the wrong count.
    GenericArity { expected: usize, given: usize },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Arity { expected, given } => {
                write!(f, "takes {} arguments, given {}", expected, given)
            }
            FailureReason::Inapplicable { position, param } => {
                write!(f, "argument {} does not convert to {}", position + 1, param)
            }
            FailureReason::Constraint { slot, constraint, bound } => {
                write!(f, "`{}` = {} is not a {}", slot, bound, constraint)
            }
            FailureReason::Conflict { slot, first, second } => {
                write!(f, "`{}` inferred as both {} and {}", slot, first, second)
            }
            FailureReason::Unbound { slot } => write!(f, "cannot infer `{}`", slot),
            FailureReason::GenericArity { expected, given } => {
                write!(f, "expects {} type arguments, given {}", expected, given)
            }
        }
    }
}

/// One rejected candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub candidate: Candidate,
    pub reason: FailureReason,
}

/// No candidate was applicable.
#[derive(Debug, Clone, PartialEq)]
pub struct NoMatch {
    /// The member name that was resolved.
    pub name: String,
    /// The argument shapes attempted.
    pub arg_shapes: Vec<Shape>,
    /// Every candidate considered, with the reason it was rejected.
    pub failures: Vec<Failure>,
}

impl NoMatch {
    /// Classify the failure into a guest-visible error kind.
    ///
    /// Only arity failures: an arity error listing every accepted count.
    /// Only arity and constraint failures with at least one constraint
    /// failure: the first constraint violation. Anything else: no
    /// applicable candidate.
    pub fn classify(&self, host: &dyn HostObjectModel) -> BindingErrorKind {
        let given = self.arg_shapes.len();

        let mut arities = Vec::new();
        let mut constraint = None;
        let mut other = false;
        for failure in &self.failures {
            match &failure.reason {
                FailureReason::Arity { expected, .. } => arities.push(*expected),
                FailureReason::Constraint { slot, constraint: c, bound } => {
                    if constraint.is_none() {
                        constraint = Some((&failure.candidate, slot, *c, *bound));
                    }
                }
                _ => other = true,
            }
        }

        if !self.failures.is_empty() && arities.len() == self.failures.len() {
            return BindingErrorKind::Arity {
                given,
                expected: ExpectedArity::new(arities),
            };
        }

        if let (false, Some((candidate, slot, c, bound))) = (other, constraint) {
            return BindingErrorKind::ConstraintViolation {
                name: candidate.to_string(),
                slot: slot.clone(),
                constraint: c,
                type_name: host.type_name(bound),
            };
        }

        BindingErrorKind::NoApplicableCandidate {
            name: self.name.clone(),
            arg_types: self.arg_shapes.iter().map(|s| host.shape_name(s)).collect(),
            considered: self.failures.len(),
        }
    }
}

/// Several candidates are equally good.
#[derive(Debug, Clone, PartialEq)]
pub struct Ambiguity {
    /// The member name that was resolved.
    pub name: String,
    /// The argument shapes attempted.
    pub arg_shapes: Vec<Shape>,
    /// The tied candidates.
    pub candidates: Vec<BoundCandidate>,
}

impl Ambiguity {
    pub fn to_error_kind(&self, host: &dyn HostObjectModel) -> BindingErrorKind {
        BindingErrorKind::AmbiguousCandidate {
            name: self.name.clone(),
            arg_types: self.arg_shapes.iter().map(|s| host.shape_name(s)).collect(),
            candidates: self.candidates.iter().map(|b| b.candidate.clone()).collect(),
        }
    }
}

/// Result of overload resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// A unique best candidate.
    Resolved(BoundCandidate),
    /// No applicable candidate.
    NoMatch(NoMatch),
    /// Tied best candidates.
    Ambiguous(Ambiguity),
}

impl ResolutionOutcome {
    pub fn resolved(&self) -> Option<&BoundCandidate> {
        match self {
            ResolutionOutcome::Resolved(bound) => Some(bound),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }
}
