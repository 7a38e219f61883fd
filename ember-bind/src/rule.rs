//! Rule compilation.
//!
//! A [`Rule`] pairs a guard with an action. The guard must be sufficient:
//! every receiver/argument shape tuple it admits must resolve to the same
//! action. The default guard pins the argument count and every shape
//! exactly. When a single non-generic candidate is the only visible one,
//! positions typed as untyped or numeric are widened to a shape class,
//! since every shape in the class resolves to that candidate with the same
//! mapping and no conversions.

use std::fmt;
use std::sync::Arc;

use crate::candidate::{MethodId, ParamType};
use crate::discovery::CandidateSet;
use crate::host::ExternalMember;
use crate::operation::{ConversionKind, OperationDescriptor};
use crate::resolve::{ArgSlot, BoundCandidate, Conversion};
use crate::shape::{Shape, ShapeClass, TypeRef};

/// An operand of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Receiver,
    Arg(usize),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Receiver => write!(f, "self"),
            Position::Arg(i) => write!(f, "arg{}", i),
        }
    }
}

/// One conjunct of a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardTest {
    /// The expanded argument count.
    ArgCount(usize),
    /// The operand's shape is exactly this one.
    ShapeIs(Position, Shape),
    /// The operand's shape belongs to a class.
    ShapeClass(Position, ShapeClass),
}

/// A conjunction of shape tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    tests: Vec<GuardTest>,
}

impl Guard {
    pub fn new(tests: Vec<GuardTest>) -> Self {
        Self { tests }
    }

    /// Pin the argument count, the receiver and every argument exactly.
    pub fn exact(receiver: &Shape, args: &[Shape]) -> Self {
        let mut tests = Vec::with_capacity(args.len() + 2);
        tests.push(GuardTest::ArgCount(args.len()));
        tests.push(GuardTest::ShapeIs(Position::Receiver, receiver.clone()));
        for (i, shape) in args.iter().enumerate() {
            tests.push(GuardTest::ShapeIs(Position::Arg(i), shape.clone()));
        }
        Self { tests }
    }

    pub fn tests(&self) -> &[GuardTest] {
        &self.tests
    }

    /// Evaluate the guard against live shapes.
    pub fn check(&self, receiver: &Shape, args: &[Shape]) -> bool {
        let operand = |position: &Position| match position {
            Position::Receiver => Some(receiver),
            Position::Arg(i) => args.get(*i),
        };

        self.tests.iter().all(|test| match test {
            GuardTest::ArgCount(n) => args.len() == *n,
            GuardTest::ShapeIs(position, expected) => operand(position) == Some(expected),
            GuardTest::ShapeClass(position, class) => operand(position).is_some_and(|s| class.contains(s)),
        })
    }

    /// Whether any position was widened to a shape class.
    pub fn is_widened(&self) -> bool {
        self.tests.iter().any(|t| matches!(t, GuardTest::ShapeClass(..)))
            || self.pinned_args() < self.arg_count().unwrap_or(0)
    }

    fn arg_count(&self) -> Option<usize> {
        self.tests.iter().find_map(|t| match t {
            GuardTest::ArgCount(n) => Some(*n),
            _ => None,
        })
    }

    fn pinned_args(&self) -> usize {
        self.tests
            .iter()
            .filter(|t| matches!(t, GuardTest::ShapeIs(Position::Arg(_), _)))
            .count()
    }
}

/// Everything needed to invoke a resolved member.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// The body to run.
    pub method: MethodId,
    /// Parameter slot per (possibly name-prefixed) argument.
    pub mapping: Vec<ArgSlot>,
    /// Conversion per argument.
    pub conversions: Vec<Option<Conversion>>,
    /// Bound generic arguments.
    pub type_args: Vec<TypeRef>,
    /// Number of mandatory and optional parameters.
    pub fixed_params: usize,
    /// Trailing optional parameters the call leaves to their defaults.
    pub omitted: usize,
    /// The member collects trailing arguments into an array.
    pub collects_rest: bool,
    /// Prepend this name as a symbol argument (`method_missing`).
    pub prepend_name: Option<Arc<str>>,
}

impl Invocation {
    pub fn from_bound(bound: &BoundCandidate, prepend_name: Option<Arc<str>>) -> Self {
        Self {
            method: bound.candidate.id,
            mapping: bound.mapping.clone(),
            conversions: bound.conversions.clone(),
            type_args: bound.type_args.clone(),
            fixed_params: bound.candidate.fixed_params(),
            omitted: bound.omitted,
            collects_rest: bound.candidate.is_variadic(),
            prepend_name,
        }
    }

    /// Number of call arguments the invocation was built for.
    pub fn expected_args(&self) -> usize {
        self.mapping.len() - usize::from(self.prepend_name.is_some())
    }
}

/// What a rule does once its guard passes.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Invoke a resolved member.
    Invoke(Invocation),
    /// Return the receiver unchanged (a conversion the value already satisfies).
    Identity,
    /// Produce nil (a try-conversion the receiver has no protocol method for).
    Nil,
    /// Invoke a conversion protocol method and check its result type.
    Convert {
        invocation: Invocation,
        kind: ConversionKind,
        target: TypeRef,
    },
    /// Call a member of an external object by name.
    LateBound(ExternalMember),
}

/// How much a rule may be trusted across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// Sound for every shape tuple the guard admits.
    High,
    /// Valid for this call only.
    Low,
}

/// A guard and the action it protects.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub guard: Guard,
    pub action: Action,
    pub confidence: Confidence,
}

impl Rule {
    pub fn is_cacheable(&self) -> bool {
        self.confidence == Confidence::High
    }
}

/// Packages resolution outcomes into rules.
#[derive(Debug, Clone, Copy)]
pub struct RuleCompiler {
    widen: bool,
}

impl RuleCompiler {
    pub fn new(widen: bool) -> Self {
        Self { widen }
    }

    /// Compile the rule for a resolved candidate.
    pub fn compile(
        &self,
        descriptor: &OperationDescriptor,
        bound: &BoundCandidate,
        discovered: &CandidateSet,
        receiver: &Shape,
        args: &[Shape],
    ) -> Rule {
        let prepend_name: Option<Arc<str>> = discovered
            .via_method_missing
            .then(|| Arc::from(descriptor.member_name()));
        let offset = usize::from(prepend_name.is_some());
        let invocation = Invocation::from_bound(bound, prepend_name);

        let guard = if self.widen && discovered.visible.len() == 1 && !bound.candidate.is_generic() {
            Self::widened_guard(bound, offset, receiver, args)
        } else {
            Guard::exact(receiver, args)
        };

        Rule {
            guard,
            action: Action::Invoke(invocation),
            confidence: Confidence::High,
        }
    }

    /// Compile a protocol conversion through `bound` to `target`.
    pub fn compile_conversion(
        &self,
        kind: ConversionKind,
        target: TypeRef,
        bound: &BoundCandidate,
        receiver: &Shape,
    ) -> Rule {
        Rule {
            guard: Guard::exact(receiver, &[]),
            action: Action::Convert {
                invocation: Invocation::from_bound(bound, None),
                kind,
                target,
            },
            confidence: Confidence::High,
        }
    }

    /// A conversion the receiver already satisfies.
    pub fn compile_identity(&self, receiver: &Shape) -> Rule {
        Rule {
            guard: Guard::exact(receiver, &[]),
            action: Action::Identity,
            confidence: Confidence::High,
        }
    }

    /// A try-conversion the receiver does not support.
    pub fn compile_nil(&self, receiver: &Shape) -> Rule {
        Rule {
            guard: Guard::exact(receiver, &[]),
            action: Action::Nil,
            confidence: Confidence::High,
        }
    }

    fn widened_guard(bound: &BoundCandidate, offset: usize, receiver: &Shape, args: &[Shape]) -> Guard {
        let mut tests = Vec::with_capacity(args.len() + 2);
        tests.push(GuardTest::ArgCount(args.len()));
        tests.push(GuardTest::ShapeIs(Position::Receiver, receiver.clone()));

        for (i, shape) in args.iter().enumerate() {
            let position = Position::Arg(i);
            match bound.candidate.param_for(i + offset) {
                Some(ParamType::Any) => {}
                Some(ParamType::Numeric) => tests.push(GuardTest::ShapeClass(position, ShapeClass::Numeric)),
                _ => tests.push(GuardTest::ShapeIs(position, shape.clone())),
            }
        }
        Guard::new(tests)
    }
}
