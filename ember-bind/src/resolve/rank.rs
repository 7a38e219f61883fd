//! Conversion ranks.

use std::fmt;

use crate::shape::TypeRef;

/// How well one argument fits one parameter. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    /// The argument's type is the parameter's type.
    Exact = 0,
    /// A subtype, a narrower numeric, or an untyped parameter.
    Widening = 1,
    /// A host-registered implicit conversion.
    ImplicitUserConversion = 2,
    /// A value-type argument bound to a generic parameter.
    BoxedGenericParameter = 3,
    /// The argument is collected into a trailing parameter.
    VariadicCollected = 4,
}

impl Rank {
    pub const fn weight(self) -> u32 {
        self as u32
    }

    /// Whether the argument must be passed through the host's converter.
    pub fn needs_conversion(self) -> bool {
        matches!(self, Rank::Widening | Rank::ImplicitUserConversion)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rank::Exact => "exact",
            Rank::Widening => "widening",
            Rank::ImplicitUserConversion => "implicit conversion",
            Rank::BoxedGenericParameter => "boxed generic",
            Rank::VariadicCollected => "variadic",
        })
    }
}

/// A conversion the action applies to one argument before invoking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Conversion {
    /// The parameter type the argument is converted to.
    pub target: TypeRef,
    /// The rank that justified the conversion.
    pub rank: Rank,
}

/// The rank of one argument position, with the conversion it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgRank {
    pub rank: Rank,
    pub conversion: Option<Conversion>,
}

impl ArgRank {
    pub fn exact() -> Self {
        Self {
            rank: Rank::Exact,
            conversion: None,
        }
    }

    pub fn plain(rank: Rank) -> Self {
        Self { rank, conversion: None }
    }

    /// A rank against a concrete type; widening and user conversions are
    /// recorded so the runtime can apply them.
    pub fn to_type(rank: Rank, target: TypeRef) -> Self {
        let conversion = rank.needs_conversion().then_some(Conversion { target, rank });
        Self { rank, conversion }
    }

    /// Raise the rank to at least `floor`, keeping the conversion.
    pub fn at_least(self, floor: Rank) -> Self {
        Self {
            rank: self.rank.max(floor),
            conversion: self.conversion,
        }
    }
}

/// Check whether rank vector `a` dominates `b`: every position at least as
/// good and at least one strictly better.
pub fn dominates(a: &[Rank], b: &[Rank]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut strictly = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly = true;
        }
    }
    strictly
}

/// Sum of rank weights.
pub fn total(ranks: &[Rank]) -> u32 {
    ranks.iter().map(|r| r.weight()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_order() {
        assert!(Rank::Exact < Rank::Widening);
        assert!(Rank::Widening < Rank::ImplicitUserConversion);
        assert!(Rank::ImplicitUserConversion < Rank::BoxedGenericParameter);
        assert!(Rank::BoxedGenericParameter < Rank::VariadicCollected);
        assert_eq!(Rank::VariadicCollected.weight(), 4);
    }

    #[test]
    fn test_dominance() {
        use Rank::*;
        assert!(dominates(&[Exact, Widening], &[Widening, Widening]));
        assert!(!dominates(&[Exact, Widening], &[Exact, Widening]));
        assert!(!dominates(&[Exact, ImplicitUserConversion], &[ImplicitUserConversion, Exact]));
        assert!(!dominates(&[Exact], &[Exact, Exact]));
    }

    #[test]
    fn test_conversion_recorded_only_when_needed() {
        let ty = TypeRef::new(4);
        assert_eq!(ArgRank::to_type(Rank::Exact, ty).conversion, None);
        assert_eq!(
            ArgRank::to_type(Rank::ImplicitUserConversion, ty).conversion,
            Some(Conversion { target: ty, rank: Rank::ImplicitUserConversion })
        );
        let collected = ArgRank::to_type(Rank::Widening, ty).at_least(Rank::VariadicCollected);
        assert_eq!(collected.rank, Rank::VariadicCollected);
        assert!(collected.conversion.is_some());
    }
}
