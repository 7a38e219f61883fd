//! The overload resolver.
//!
//! # Algorithm Overview
//!
//! 1. **Bind candidates**: check arity, infer generic slots and rank every
//!    argument against its parameter; any unrankable argument rejects the
//!    candidate
//! 2. **Find maximal**: keep the candidates no other applicable candidate
//!    dominates (at least as good at every position, better at one)
//! 3. **Select best**: a single maximal candidate wins; otherwise the
//!    tie-break runs among maximal candidates of equal total rank
//!    (non-variadic first, then fewest omitted optional parameters, then
//!    fewest inferred slots) and anything still tied is ambiguous
//!
//! The outcome never depends on the order candidates are supplied in.

use tracing::debug;

use crate::candidate::{Candidate, ParamType};
use crate::host::HostObjectModel;
use crate::shape::{Shape, TypeFlags, TypeRef};

use super::infer::{infer, Bindings};
use super::outcome::{Ambiguity, ArgSlot, BoundCandidate, Failure, FailureReason, NoMatch, ResolutionOutcome};
use super::rank::{dominates, ArgRank, Rank};

/// Overload resolution context.
pub struct OverloadResolver<'a> {
    host: &'a dyn HostObjectModel,
}

impl<'a> OverloadResolver<'a> {
    pub fn new(host: &'a dyn HostObjectModel) -> Self {
        Self { host }
    }

    /// Resolve `name` among `candidates` for the given argument shapes.
    pub fn resolve(
        &self,
        name: &str,
        candidates: &[Candidate],
        arg_shapes: &[Shape],
        explicit_type_args: &[TypeRef],
    ) -> ResolutionOutcome {
        let mut applicable = Vec::new();
        let mut failures = Vec::new();

        for candidate in candidates {
            match self.bind_candidate(candidate, arg_shapes, explicit_type_args) {
                Ok(bound) => applicable.push(bound),
                Err(reason) => failures.push(Failure {
                    candidate: candidate.clone(),
                    reason,
                }),
            }
        }

        if applicable.is_empty() {
            debug!(name, candidates = candidates.len(), "no applicable candidate");
            return ResolutionOutcome::NoMatch(NoMatch {
                name: name.to_string(),
                arg_shapes: arg_shapes.to_vec(),
                failures,
            });
        }

        let maximal = self.find_maximal(applicable);
        let tied = match Self::break_tie(maximal) {
            Ok(winner) => {
                debug!(name, winner = %winner.candidate, ranks = ?winner.ranks, "resolved");
                return ResolutionOutcome::Resolved(winner);
            }
            Err(tied) => tied,
        };

        debug!(name, tied = tied.len(), "ambiguous");
        ResolutionOutcome::Ambiguous(Ambiguity {
            name: name.to_string(),
            arg_shapes: arg_shapes.to_vec(),
            candidates: tied,
        })
    }

    /// Check a single candidate against the arguments, producing its ranks
    /// and argument mapping.
    pub fn bind_candidate(
        &self,
        candidate: &Candidate,
        arg_shapes: &[Shape],
        explicit_type_args: &[TypeRef],
    ) -> Result<BoundCandidate, FailureReason> {
        let argc = arg_shapes.len();
        let arity = candidate.arity();
        if !arity.accepts(argc) {
            return Err(FailureReason::Arity {
                expected: arity,
                given: argc,
            });
        }

        let bindings = infer(self.host, candidate, arg_shapes, explicit_type_args)?;

        let fixed = candidate.fixed_params();
        let mut ranks = Vec::with_capacity(argc);
        let mut conversions = Vec::with_capacity(argc);
        let mut mapping = Vec::with_capacity(argc);

        for (position, shape) in arg_shapes.iter().enumerate() {
            let slot = if position < fixed {
                ArgSlot::Param(position)
            } else {
                ArgSlot::Rest(position - fixed)
            };
            let param = candidate.param_for(position).ok_or(FailureReason::Arity {
                expected: arity,
                given: argc,
            })?;

            let mut arg = self
                .rank_argument(param, shape, &bindings)
                .ok_or_else(|| FailureReason::Inapplicable {
                    position,
                    param: param.clone(),
                })?;
            if matches!(slot, ArgSlot::Rest(_)) {
                arg = arg.at_least(Rank::VariadicCollected);
            }

            ranks.push(arg.rank);
            conversions.push(arg.conversion);
            mapping.push(slot);
        }

        Ok(BoundCandidate {
            candidate: candidate.clone(),
            ranks,
            conversions,
            mapping,
            type_args: bindings.types,
            inferred: bindings.inferred,
            omitted: fixed.saturating_sub(argc),
        })
    }

    /// Rank one argument against one declared parameter type.
    fn rank_argument(&self, param: &ParamType, shape: &Shape, bindings: &Bindings) -> Option<ArgRank> {
        match param {
            ParamType::Any => Some(ArgRank::plain(Rank::Widening)),
            ParamType::Numeric => shape.is_numeric().then(|| ArgRank::plain(Rank::Widening)),
            ParamType::Type(ty) => self
                .host
                .convert_rank(shape, *ty)
                .map(|rank| ArgRank::to_type(rank, *ty)),
            ParamType::Generic(slot) => {
                let bound = bindings.get(*slot)?;
                let arg = ArgRank::to_type(self.host.convert_rank(shape, bound)?, bound);
                if shape.is_value_type() {
                    Some(arg.at_least(Rank::BoxedGenericParameter))
                } else {
                    Some(arg)
                }
            }
            ParamType::Constructed { definition, args } => {
                let matches = !shape.is_meta()
                    && shape.type_ref() == *definition
                    && shape.generic_args().len() == args.len()
                    && args
                        .iter()
                        .zip(shape.generic_args())
                        .all(|(pattern, actual)| self.type_arg_matches(pattern, *actual, bindings));
                matches.then(ArgRank::exact)
            }
        }
    }

    /// Generic arguments are invariant: a pattern matches only the exact type.
    fn type_arg_matches(&self, pattern: &ParamType, actual: TypeRef, bindings: &Bindings) -> bool {
        match pattern {
            ParamType::Any => true,
            ParamType::Numeric => self.host.type_flags(actual).contains(TypeFlags::NUMERIC),
            ParamType::Type(ty) => *ty == actual,
            ParamType::Generic(slot) => bindings.get(*slot) == Some(actual),
            ParamType::Constructed { .. } => false,
        }
    }

    /// Keep the applicable candidates no other candidate dominates.
    fn find_maximal(&self, applicable: Vec<BoundCandidate>) -> Vec<BoundCandidate> {
        let dominated: Vec<bool> = applicable
            .iter()
            .map(|b| applicable.iter().any(|other| Self::is_more_specific(other, b)))
            .collect();

        applicable
            .into_iter()
            .zip(dominated)
            .filter_map(|(b, dominated)| (!dominated).then_some(b))
            .collect()
    }

    /// Check whether `a` dominates `b` position by position.
    pub fn is_more_specific(a: &BoundCandidate, b: &BoundCandidate) -> bool {
        dominates(&a.ranks, &b.ranks)
    }

    /// Pick the winner among maximal candidates, or return the tied set.
    fn break_tie(mut maximal: Vec<BoundCandidate>) -> Result<BoundCandidate, Vec<BoundCandidate>> {
        if maximal.len() == 1 {
            return maximal.pop().ok_or(maximal);
        }

        // The tie-break only separates candidates of equal total rank.
        let first_total = maximal.first().map(BoundCandidate::total_rank);
        if maximal.iter().any(|b| Some(b.total_rank()) != first_total) {
            return Err(maximal);
        }

        if maximal.iter().any(|b| !b.is_variadic()) {
            maximal.retain(|b| !b.is_variadic());
        }

        if let Some(fewest) = maximal.iter().map(|b| b.omitted).min() {
            maximal.retain(|b| b.omitted == fewest);
        }

        if let Some(fewest) = maximal.iter().map(|b| b.inferred).min() {
            maximal.retain(|b| b.inferred == fewest);
        }

        if maximal.len() == 1 {
            maximal.pop().ok_or(maximal)
        } else {
            Err(maximal)
        }
    }
}
