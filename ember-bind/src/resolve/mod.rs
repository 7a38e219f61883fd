//! Overload resolution.
//!
//! Ranks discovered candidates against argument shapes and selects a
//! unique winner, reporting no-match or ambiguity otherwise. See
//! [`OverloadResolver`] for the algorithm.

mod infer;
mod outcome;
mod rank;
mod resolver;

#[cfg(test)]
mod tests;

pub use infer::{infer, Bindings};
pub use outcome::{Ambiguity, ArgSlot, BoundCandidate, Failure, FailureReason, NoMatch, ResolutionOutcome};
pub use rank::{dominates, ArgRank, Conversion, Rank};
pub use resolver::OverloadResolver;

use crate::candidate::Candidate;
use crate::host::HostObjectModel;
use crate::shape::{Shape, TypeRef};

/// Resolve `name` among `candidates`. Shorthand for [`OverloadResolver::resolve`].
pub fn resolve(
    host: &dyn HostObjectModel,
    name: &str,
    candidates: &[Candidate],
    arg_shapes: &[Shape],
    explicit_type_args: &[TypeRef],
) -> ResolutionOutcome {
    OverloadResolver::new(host).resolve(name, candidates, arg_shapes, explicit_type_args)
}
