//! Tests for overload resolution.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::candidate::{Arity, Candidate, GenericConstraint, GenericSlot, MethodId, ParamType};
use crate::error::{BindingErrorKind, ExpectedArity};
use crate::host::{Builtins, ClassTable, HostObjectModel};
use crate::shape::{Shape, TypeRef};
use crate::value::Value;

use super::{resolve, ArgSlot, Conversion, OverloadResolver, Rank, ResolutionOutcome};

fn fixture() -> (ClassTable, Builtins) {
    let table = ClassTable::new();
    let b = *table.builtins();
    table.add_implicit_conversion(b.integer, b.string, |v, _| {
        Ok(Value::str(&v.as_int().unwrap_or_default().to_string()))
    });
    (table, b)
}

fn make_candidate(id: u32, params: Vec<ParamType>) -> Candidate {
    Candidate::method(MethodId::new(id), "f", TypeRef::new(0)).params(params)
}

fn shapes(table: &ClassTable, values: &[Value]) -> Vec<Shape> {
    values.iter().map(|v| table.shape_of(v)).collect()
}

fn winner(outcome: &ResolutionOutcome) -> MethodId {
    match outcome {
        ResolutionOutcome::Resolved(bound) => bound.candidate.id,
        other => panic!("expected a resolution, got {:?}", other),
    }
}

#[test]
fn test_most_specific_wins() {
    let (table, b) = fixture();
    let candidates = vec![
        make_candidate(0, vec![ParamType::Type(b.object)]),
        make_candidate(1, vec![ParamType::Type(b.integer)]),
    ];

    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[Value::Int(5)]), &[]);
    assert_eq!(winner(&outcome), MethodId::new(1));
}

#[test]
fn test_fixed_and_variadic() {
    let (table, _) = fixture();
    let candidates = vec![
        make_candidate(0, vec![ParamType::Any, ParamType::Any]),
        make_candidate(1, vec![ParamType::Any]).rest(ParamType::Any),
    ];

    let four = shapes(&table, &[Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
    assert_eq!(winner(&resolve(&table, "f", &candidates, &four, &[])), MethodId::new(1));

    let two = shapes(&table, &[Value::Int(1), Value::Int(2)]);
    assert_eq!(winner(&resolve(&table, "f", &candidates, &two, &[])), MethodId::new(0));
}

#[test]
fn test_symmetric_conversions_are_ambiguous() {
    let (table, b) = fixture();
    let candidates = vec![
        make_candidate(0, vec![ParamType::Type(b.integer), ParamType::Type(b.string)]),
        make_candidate(1, vec![ParamType::Type(b.string), ParamType::Type(b.integer)]),
    ];

    let outcome = resolve(&table, "g", &candidates, &shapes(&table, &[Value::Int(1), Value::Int(1)]), &[]);
    match outcome {
        ResolutionOutcome::Ambiguous(ambiguity) => {
            let mut ids: Vec<_> = ambiguity.candidates.iter().map(|c| c.candidate.id).collect();
            ids.sort();
            assert_eq!(ids, vec![MethodId::new(0), MethodId::new(1)]);
            assert!(matches!(
                ambiguity.to_error_kind(&table),
                BindingErrorKind::AmbiguousCandidate { ref arg_types, .. } if arg_types == &["Integer", "Integer"]
            ));
        }
        other => panic!("expected ambiguity, got {:?}", other),
    }
}

#[test]
fn test_unequal_totals_stay_ambiguous() {
    let (table, b) = fixture();
    // [exact, implicit] (total 2) against [widening, exact] (total 1): neither
    // dominates, and the tie-break does not apply across different totals.
    let candidates = vec![
        make_candidate(0, vec![ParamType::Type(b.integer), ParamType::Type(b.string)]),
        make_candidate(1, vec![ParamType::Numeric, ParamType::Type(b.integer)]),
    ];

    let outcome = resolve(&table, "g", &candidates, &shapes(&table, &[Value::Int(1), Value::Int(1)]), &[]);
    assert!(matches!(outcome, ResolutionOutcome::Ambiguous(_)));
}

#[test]
fn test_tie_break_prefers_fixed_arity() {
    let (table, b) = fixture();
    // [boxed generic, widening] and [exact, variadic] both total 4.
    let fixed = make_candidate(0, vec![ParamType::Generic(0), ParamType::Numeric]).generic(GenericSlot::new("T"));
    let variadic = make_candidate(1, vec![ParamType::Type(b.integer)]).rest(ParamType::Type(b.integer));

    let args = shapes(&table, &[Value::Int(1), Value::Int(2)]);
    for candidates in [vec![fixed.clone(), variadic.clone()], vec![variadic, fixed]] {
        let outcome = resolve(&table, "f", &candidates, &args, &[]);
        assert_eq!(winner(&outcome), MethodId::new(0));
    }
}

#[test]
fn test_tie_break_prefers_fewer_inferred_slots() {
    let (table, b) = fixture();
    let generic = make_candidate(0, vec![ParamType::Generic(0)]).generic(GenericSlot::new("T"));
    let concrete = make_candidate(1, vec![ParamType::Type(b.string)]);

    let outcome = resolve(&table, "f", &[generic, concrete], &shapes(&table, &[Value::str("s")]), &[]);
    assert_eq!(winner(&outcome), MethodId::new(1));
}

#[test]
fn test_identical_signatures_are_ambiguous() {
    let (table, b) = fixture();
    let candidates = vec![
        make_candidate(0, vec![ParamType::Type(b.integer)]),
        make_candidate(1, vec![ParamType::Type(b.integer)]),
    ];

    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[Value::Int(1)]), &[]);
    assert!(matches!(outcome, ResolutionOutcome::Ambiguous(ref a) if a.candidates.len() == 2));
}

#[test]
fn test_widening_records_conversion() {
    let (table, b) = fixture();
    let candidates = vec![make_candidate(0, vec![ParamType::Type(b.float)])];

    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[Value::Int(1)]), &[]);
    let bound = outcome.resolved().cloned().unwrap();
    assert_eq!(bound.ranks, vec![Rank::Widening]);
    assert_eq!(
        bound.conversions,
        vec![Some(Conversion { target: b.float, rank: Rank::Widening })]
    );
}

#[test]
fn test_exact_beats_widening() {
    let (table, b) = fixture();
    let candidates = vec![
        make_candidate(0, vec![ParamType::Type(b.float)]),
        make_candidate(1, vec![ParamType::Type(b.integer)]),
    ];

    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[Value::Int(1)]), &[]);
    assert_eq!(winner(&outcome), MethodId::new(1));
}

#[test]
fn test_rest_mapping() {
    let (table, _) = fixture();
    let resolver = OverloadResolver::new(&table);
    let candidate = make_candidate(0, vec![ParamType::Any]).rest(ParamType::Any);

    let bound = resolver
        .bind_candidate(&candidate, &shapes(&table, &[Value::Nil, Value::Nil, Value::Nil]), &[])
        .unwrap();
    assert_eq!(bound.mapping, vec![ArgSlot::Param(0), ArgSlot::Rest(0), ArgSlot::Rest(1)]);
    assert_eq!(
        bound.ranks,
        vec![Rank::Widening, Rank::VariadicCollected, Rank::VariadicCollected]
    );
}

#[test]
fn test_optional_parameters_widen_accepted_counts() {
    let (table, _) = fixture();
    let candidates = vec![make_candidate(0, vec![ParamType::Any]).optional(ParamType::Any)];

    for argc in [1, 2] {
        let args = shapes(&table, &vec![Value::Int(1); argc]);
        assert_eq!(winner(&resolve(&table, "f", &candidates, &args, &[])), MethodId::new(0));
    }

    let three = shapes(&table, &[Value::Int(1), Value::Int(2), Value::Int(3)]);
    let ResolutionOutcome::NoMatch(no_match) = resolve(&table, "f", &candidates, &three, &[]) else {
        panic!("expected no match");
    };
    let kind = no_match.classify(&table);
    assert_eq!(
        kind,
        BindingErrorKind::Arity {
            given: 3,
            expected: ExpectedArity::new([Arity::range(1, 1)]),
        }
    );
    assert_eq!(kind.to_string(), "wrong number of arguments (3 for 1..2)");
}

#[test]
fn test_optional_mapping_before_rest() {
    let (table, b) = fixture();
    let resolver = OverloadResolver::new(&table);
    let candidate = make_candidate(0, vec![ParamType::Any])
        .optional(ParamType::Type(b.integer))
        .rest(ParamType::Any);

    let bound = resolver
        .bind_candidate(&candidate, &shapes(&table, &[Value::Nil, Value::Int(2), Value::Nil, Value::Nil]), &[])
        .unwrap();
    assert_eq!(
        bound.mapping,
        vec![ArgSlot::Param(0), ArgSlot::Param(1), ArgSlot::Rest(0), ArgSlot::Rest(1)]
    );
    assert_eq!(bound.ranks[1], Rank::Exact);
    assert_eq!(bound.omitted, 0);

    let bound = resolver.bind_candidate(&candidate, &shapes(&table, &[Value::Nil]), &[]).unwrap();
    assert_eq!(bound.mapping, vec![ArgSlot::Param(0)]);
    assert_eq!(bound.omitted, 1);

    // The optional position is typed.
    let err = resolver
        .bind_candidate(&candidate, &shapes(&table, &[Value::Nil, Value::str("s")]), &[])
        .unwrap_err();
    assert!(matches!(err, super::FailureReason::Inapplicable { position: 1, .. }));
}

#[test]
fn test_tie_break_prefers_fewer_omitted_optionals() {
    let (table, b) = fixture();
    let fixed = make_candidate(0, vec![ParamType::Type(b.integer)]);
    let defaulted = make_candidate(1, vec![ParamType::Type(b.integer)]).optional(ParamType::Any);

    let one = shapes(&table, &[Value::Int(1)]);
    for candidates in [vec![fixed.clone(), defaulted.clone()], vec![defaulted.clone(), fixed.clone()]] {
        assert_eq!(winner(&resolve(&table, "f", &candidates, &one, &[])), MethodId::new(0));
    }

    let two = shapes(&table, &[Value::Int(1), Value::str("s")]);
    assert_eq!(winner(&resolve(&table, "f", &[fixed, defaulted], &two, &[])), MethodId::new(1));
}

#[test]
fn test_optional_beats_variadic_for_the_same_argument() {
    let (table, b) = fixture();
    let defaulted = make_candidate(0, vec![ParamType::Type(b.integer)]).optional(ParamType::Type(b.integer));
    let variadic = make_candidate(1, vec![ParamType::Type(b.integer)]).rest(ParamType::Type(b.integer));

    let two = shapes(&table, &[Value::Int(1), Value::Int(2)]);
    assert_eq!(winner(&resolve(&table, "f", &[variadic, defaulted], &two, &[])), MethodId::new(0));
}

#[test]
fn test_arity_error_message() {
    let (table, _) = fixture();
    let candidates = vec![make_candidate(0, vec![ParamType::Any, ParamType::Any])];

    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[Value::Int(1)]), &[]);
    let ResolutionOutcome::NoMatch(no_match) = outcome else {
        panic!("expected no match");
    };
    let kind = no_match.classify(&table);
    assert_eq!(
        kind,
        BindingErrorKind::Arity {
            given: 1,
            expected: ExpectedArity::new([Arity::fixed(2)]),
        }
    );
    assert!(kind.to_string().contains("1 for 2"));
}

#[test]
fn test_type_mismatch_classification() {
    let (table, b) = fixture();
    let candidates = vec![
        make_candidate(0, vec![ParamType::Type(b.integer)]),
        make_candidate(1, vec![ParamType::Any, ParamType::Any]),
    ];

    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[Value::symbol("s")]), &[]);
    let ResolutionOutcome::NoMatch(no_match) = outcome else {
        panic!("expected no match");
    };
    assert_eq!(
        no_match.classify(&table),
        BindingErrorKind::NoApplicableCandidate {
            name: "f".to_string(),
            arg_types: vec!["Symbol".to_string()],
            considered: 2,
        }
    );
}

#[test]
fn test_constraint_classification() {
    let (table, _) = fixture();
    let candidates = vec![make_candidate(0, vec![ParamType::Generic(0)])
        .generic(GenericSlot::new("T").with_constraint(GenericConstraint::ReferenceType))];

    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[Value::Int(1)]), &[]);
    let ResolutionOutcome::NoMatch(no_match) = outcome else {
        panic!("expected no match");
    };
    assert!(matches!(
        no_match.classify(&table),
        BindingErrorKind::ConstraintViolation { ref slot, ref type_name, constraint: GenericConstraint::ReferenceType, .. }
            if slot == "T" && type_name == "Integer"
    ));
}

#[test]
fn test_explicit_type_arguments() {
    let (table, b) = fixture();
    let candidates = vec![make_candidate(0, vec![ParamType::Generic(0)]).generic(GenericSlot::new("T"))];
    let args = shapes(&table, &[Value::Int(1)]);

    let bound = resolve(&table, "f", &candidates, &args, &[b.numeric]).resolved().cloned().unwrap();
    assert_eq!(bound.type_args, vec![b.numeric]);
    assert_eq!(bound.inferred, 0);

    // An explicit String does not accept an Integer argument without a conversion.
    let bound = resolve(&table, "f", &candidates, &args, &[b.string]).resolved().cloned().unwrap();
    assert_eq!(bound.ranks, vec![Rank::BoxedGenericParameter]);
    assert_eq!(
        bound.conversions,
        vec![Some(Conversion { target: b.string, rank: Rank::ImplicitUserConversion })]
    );

    assert!(matches!(
        resolve(&table, "f", &candidates, &args, &[b.symbol]),
        ResolutionOutcome::NoMatch(_)
    ));
}

#[test]
fn test_constructed_parameter_is_invariant() {
    let (table, b) = fixture();
    let list = table.define_class("List", b.object);
    let list_of = |arg: ParamType| ParamType::Constructed {
        definition: list,
        args: vec![arg],
    };
    let candidates = vec![
        make_candidate(0, vec![list_of(ParamType::Type(b.integer))]),
        make_candidate(1, vec![list_of(ParamType::Type(b.numeric))]),
    ];

    let ints = crate::host::Instance::new(list).with_type_args(vec![b.integer]).into_value();
    let outcome = resolve(&table, "f", &candidates, &shapes(&table, &[ints]), &[]);
    assert_eq!(winner(&outcome), MethodId::new(0));
}

/// Order-insensitive digest of an outcome.
fn digest(outcome: &ResolutionOutcome) -> (u8, Vec<MethodId>) {
    let mut ids: Vec<MethodId> = match outcome {
        ResolutionOutcome::Resolved(bound) => return (0, vec![bound.candidate.id]),
        ResolutionOutcome::Ambiguous(a) => a.candidates.iter().map(|c| c.candidate.id).collect(),
        ResolutionOutcome::NoMatch(n) => n.failures.iter().map(|f| f.candidate.id).collect(),
    };
    ids.sort();
    let tag = if matches!(outcome, ResolutionOutcome::Ambiguous(_)) { 1 } else { 2 };
    (tag, ids)
}

fn candidate_pool(b: &Builtins) -> Vec<Candidate> {
    vec![
        make_candidate(0, vec![ParamType::Any]),
        make_candidate(1, vec![ParamType::Type(b.integer)]),
        make_candidate(2, vec![ParamType::Numeric]),
        make_candidate(3, vec![ParamType::Type(b.object)]),
        make_candidate(4, vec![ParamType::Type(b.float)]),
        make_candidate(5, vec![]).rest(ParamType::Any),
        make_candidate(6, vec![ParamType::Generic(0)]).generic(GenericSlot::new("T")),
        make_candidate(7, vec![ParamType::Any, ParamType::Any]),
        make_candidate(8, vec![ParamType::Type(b.integer)]).rest(ParamType::Any),
        make_candidate(9, vec![ParamType::Type(b.string), ParamType::Type(b.integer)]),
        make_candidate(10, vec![ParamType::Type(b.integer), ParamType::Type(b.string)]),
        make_candidate(11, vec![ParamType::Type(b.string)]),
    ]
}

fn arg_value(kind: u8) -> Value {
    match kind {
        0 => Value::Int(1),
        1 => Value::Float(1.5),
        2 => Value::str("s"),
        3 => Value::symbol("k"),
        _ => Value::Nil,
    }
}

proptest! {
    #[test]
    fn test_resolution_is_order_independent(
        picks in proptest::sample::subsequence((0..12usize).collect::<Vec<_>>(), 1..12),
        seed in proptest::collection::vec(any::<u32>(), 12),
        arg_kinds in proptest::collection::vec(0u8..5, 0..4),
    ) {
        let (table, b) = fixture();
        let pool = candidate_pool(&b);
        let candidates: Vec<Candidate> = picks.iter().map(|&i| pool[i].clone()).collect();

        let mut shuffled = candidates.clone();
        shuffled.sort_by_key(|c| seed[c.id.index() as usize]);

        let values: Vec<Value> = arg_kinds.into_iter().map(arg_value).collect();
        let args = shapes(&table, &values);

        let forward = resolve(&table, "f", &candidates, &args, &[]);
        let reordered = resolve(&table, "f", &shuffled, &args, &[]);
        prop_assert_eq!(digest(&forward), digest(&reordered));
    }
}
