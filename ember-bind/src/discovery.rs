//! Candidate discovery.
//!
//! Given an operation and a receiver shape, collect the members that could
//! implement the operation, in the shape's search order:
//!
//! 1. **Filter by kind and name**: only members that can serve the operation
//!    (a getter for a member read, a constructor for `new`, ...)
//! 2. **Shadow overridden members**: a member earlier in the search order
//!    hides a later one with the same signature
//! 3. **Partition by visibility**: members the caller may not see are kept
//!    aside so a failed resolution can report them
//!
//! Discovery never runs guest code.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::trace;

use crate::candidate::{Candidate, MemberKind, SignatureKey};
use crate::host::HostObjectModel;
use crate::operation::{OperationDescriptor, OperationKind};
use crate::shape::Shape;

/// The member name a call falls back to when nothing else matches.
pub const METHOD_MISSING: &str = "method_missing";

/// Candidates for one operation on one receiver shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    /// Candidates the caller may invoke.
    pub visible: Vec<Candidate>,
    /// Candidates that exist but are hidden from the caller.
    pub hidden: Vec<Candidate>,
    /// The candidates are `method_missing` handlers standing in for the
    /// requested name.
    pub via_method_missing: bool,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.hidden.is_empty()
    }
}

/// What discovery found.
#[derive(Debug, Clone, PartialEq)]
pub enum Discovered {
    /// Statically discoverable candidates.
    Candidates(CandidateSet),
    /// The receiver is external; members can only be found by name at call time.
    LateBound,
}

/// Check whether a member of `kind` can serve an operation.
fn serves(op: &OperationKind, kind: MemberKind) -> bool {
    match op {
        OperationKind::Call { .. } => kind == MemberKind::Method,
        OperationKind::CreateInstance => kind == MemberKind::Constructor,
        OperationKind::GetMember { .. } => matches!(kind, MemberKind::Getter | MemberKind::Method),
        OperationKind::SetMember { .. } => kind == MemberKind::Setter,
        OperationKind::DeleteMember { .. } => kind == MemberKind::Deleter,
        OperationKind::Operator(_) => matches!(kind, MemberKind::Operator | MemberKind::Method),
        OperationKind::Convert(_) | OperationKind::TryConvert(_) => {
            matches!(kind, MemberKind::Conversion | MemberKind::Method)
        }
    }
}

/// Drop members shadowed by an earlier member with the same signature.
///
/// Member reads treat a zero-argument method and a getter of the same name
/// as one signature. When one type declares both, the getter wins.
fn shadow(op: &OperationKind, members: Vec<Candidate>) -> Vec<Candidate> {
    let is_read = matches!(op, OperationKind::GetMember { .. });
    let mut kept: IndexMap<SignatureKey, Candidate> = IndexMap::with_capacity(members.len());
    for member in members {
        let key = if is_read {
            member.read_signature_key()
        } else {
            member.signature_key()
        };
        match kept.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(member);
            }
            Entry::Occupied(mut slot) => {
                let earlier = slot.get();
                if earlier.owner == member.owner
                    && earlier.kind != MemberKind::Getter
                    && member.kind == MemberKind::Getter
                {
                    slot.insert(member);
                }
            }
        }
    }
    kept.into_values().collect()
}

/// Discover the candidates for `descriptor` on a receiver of `receiver` shape.
///
/// With `method_missing` enabled, a call that finds no member at all
/// discovers the receiver's `method_missing` handlers instead.
pub fn discover(
    host: &dyn HostObjectModel,
    descriptor: &OperationDescriptor,
    receiver: &Shape,
    method_missing: bool,
) -> Discovered {
    if receiver.is_external() {
        return Discovered::LateBound;
    }

    let name = descriptor.member_name();
    let found: Vec<Candidate> = host
        .members_named(receiver, name)
        .into_iter()
        .filter(|c| serves(&descriptor.kind, c.kind))
        .collect();

    let mut set = CandidateSet::default();
    for candidate in shadow(&descriptor.kind, found) {
        if descriptor.caller.admits(candidate.visibility) {
            set.visible.push(candidate);
        } else {
            set.hidden.push(candidate);
        }
    }

    if set.is_empty() && method_missing && matches!(descriptor.kind, OperationKind::Call { .. }) {
        let handlers: Vec<Candidate> = host
            .members_named(receiver, METHOD_MISSING)
            .into_iter()
            .filter(|c| c.kind == MemberKind::Method)
            .collect();
        if !handlers.is_empty() {
            // Handlers run whatever their declared visibility.
            set.visible = shadow(&descriptor.kind, handlers);
            set.via_method_missing = true;
        }
    }

    trace!(
        op = %descriptor,
        receiver = ?receiver,
        visible = set.visible.len(),
        hidden = set.hidden.len(),
        method_missing = set.via_method_missing,
        "discovered candidates"
    );

    Discovered::Candidates(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ParamType;
    use crate::host::{ClassTable, Instance, OpaqueObject};
    use crate::operation::Visibility;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn candidates(discovered: Discovered) -> CandidateSet {
        match discovered {
            Discovered::Candidates(set) => set,
            Discovered::LateBound => panic!("expected candidates"),
        }
    }

    #[test]
    fn test_override_shadows_base() {
        let table = ClassTable::new();
        let object = table.builtins().object;
        let base = table.define_class("Base", object);
        let derived = table.define_class("Derived", base);
        table.define_method(base, "f", |c| c.param(ParamType::Any), |_, _| Ok(Value::Int(1)));
        let overriding = table.define_method(derived, "f", |c| c.param(ParamType::Any), |_, _| Ok(Value::Int(2)));
        let overload = table.define_method(base, "f", |c| c, |_, _| Ok(Value::Int(3)));

        let shape = table.shape_of(&Instance::new(derived).into_value());
        let set = candidates(discover(&table, &OperationDescriptor::call("f", 1), &shape, true));

        let ids: Vec<_> = set.visible.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![overriding, overload]);
    }

    #[test]
    fn test_mixin_members_found() {
        let table = ClassTable::new();
        let object = table.builtins().object;
        let greet = table.define_module("Greet");
        let point = table.define_class("Point", object);
        table.include(point, greet).unwrap();
        let hello = table.define_method(greet, "hello", |c| c, |_, _| Ok(Value::Nil));

        let shape = table.shape_of(&Instance::new(point).into_value());
        let set = candidates(discover(&table, &OperationDescriptor::call("hello", 0), &shape, true));
        assert_eq!(set.visible.len(), 1);
        assert_eq!(set.visible[0].id, hello);
    }

    #[test]
    fn test_visibility_partition() {
        let table = ClassTable::new();
        let object = table.builtins().object;
        let point = table.define_class("Point", object);
        table.define_method(point, "secret", |c| c.visibility(Visibility::Protected), |_, _| Ok(Value::Nil));
        let shape = table.shape_of(&Instance::new(point).into_value());

        let outside = candidates(discover(&table, &OperationDescriptor::call("secret", 0), &shape, true));
        assert!(outside.visible.is_empty());
        assert_eq!(outside.hidden.len(), 1);
        assert!(!outside.via_method_missing);

        let inside = candidates(discover(
            &table,
            &OperationDescriptor::call("secret", 0).with_caller(Visibility::Protected),
            &shape,
            true,
        ));
        assert_eq!(inside.visible.len(), 1);
        assert!(inside.hidden.is_empty());
    }

    #[test]
    fn test_member_kind_filter() {
        let table = ClassTable::new();
        let object = table.builtins().object;
        let point = table.define_class("Point", object);
        table.define_getter(point, "x", |_, _| Ok(Value::Int(0)));
        table.define_setter(point, "x", ParamType::Any, |_, args| Ok(args[0].clone()));
        let shape = table.shape_of(&Instance::new(point).into_value());

        let get = candidates(discover(&table, &OperationDescriptor::get_member("x"), &shape, true));
        assert_eq!(get.visible.len(), 1);
        assert_eq!(get.visible[0].kind, MemberKind::Getter);

        let set = candidates(discover(&table, &OperationDescriptor::set_member("x"), &shape, true));
        assert_eq!(set.visible.len(), 1);
        assert_eq!(set.visible[0].kind, MemberKind::Setter);

        // A getter is not callable as a method.
        let call = candidates(discover(&table, &OperationDescriptor::call("x", 0), &shape, false));
        assert!(call.is_empty());
    }

    #[test]
    fn test_member_read_prefers_getter_over_nullary_method() {
        let table = ClassTable::new();
        let object = table.builtins().object;
        let point = table.define_class("Point", object);
        table.define_method(point, "x", |c| c, |_, _| Ok(Value::Int(1)));
        let getter = table.define_getter(point, "x", |_, _| Ok(Value::Int(2)));
        let shape = table.shape_of(&Instance::new(point).into_value());

        let get = candidates(discover(&table, &OperationDescriptor::get_member("x"), &shape, true));
        assert_eq!(get.visible.len(), 1);
        assert_eq!(get.visible[0].id, getter);

        // A subclass method overrides the inherited getter.
        let moved = table.define_class("MovedPoint", point);
        let method = table.define_method(moved, "x", |c| c, |_, _| Ok(Value::Int(3)));
        let shape = table.shape_of(&Instance::new(moved).into_value());
        let get = candidates(discover(&table, &OperationDescriptor::get_member("x"), &shape, true));
        assert_eq!(get.visible.len(), 1);
        assert_eq!(get.visible[0].id, method);
    }

    #[test]
    fn test_method_missing_fallback() {
        let table = ClassTable::new();
        let object = table.builtins().object;
        let ghost = table.define_class("Ghost", object);
        table.define_method(
            ghost,
            METHOD_MISSING,
            |c| c.param(ParamType::Any).rest(ParamType::Any).visibility(Visibility::Private),
            |_, args| Ok(args[0].clone()),
        );
        let shape = table.shape_of(&Instance::new(ghost).into_value());

        let set = candidates(discover(&table, &OperationDescriptor::call("boo", 0), &shape, true));
        assert!(set.via_method_missing);
        assert_eq!(set.visible.len(), 1);

        let disabled = candidates(discover(&table, &OperationDescriptor::call("boo", 0), &shape, false));
        assert!(disabled.is_empty());
    }

    #[test]
    fn test_external_receiver_is_late_bound() {
        let table = ClassTable::new();
        let shape = table.shape_of(&OpaqueObject::new("Widget").into_value());
        assert_eq!(
            discover(&table, &OperationDescriptor::call("spin", 0), &shape, true),
            Discovered::LateBound
        );
    }
}
