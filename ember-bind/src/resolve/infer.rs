//! Generic parameter inference.
//!
//! Slots are bound from argument shapes: a `T` parameter binds to the
//! argument's type, and a constructed parameter such as `List<T>` binds
//! `T` to the corresponding generic argument of a `List<...>` instance.
//! Explicit type arguments replace inference entirely.

use crate::candidate::{Candidate, GenericConstraint, ParamType};
use crate::host::HostObjectModel;
use crate::shape::{Shape, TypeFlags, TypeRef};

use super::outcome::FailureReason;

/// Generic arguments bound for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    /// Bound type per slot.
    pub types: Vec<TypeRef>,
    /// How many slots were inferred.
    pub inferred: usize,
}

impl Bindings {
    pub fn none() -> Self {
        Self {
            types: Vec::new(),
            inferred: 0,
        }
    }

    pub fn get(&self, slot: usize) -> Option<TypeRef> {
        self.types.get(slot).copied()
    }
}

struct Inference<'c> {
    candidate: &'c Candidate,
    slots: Vec<Option<TypeRef>>,
}

impl<'c> Inference<'c> {
    fn new(candidate: &'c Candidate) -> Self {
        Self {
            candidate,
            slots: vec![None; candidate.generics.len()],
        }
    }

    fn slot_name(&self, slot: usize) -> String {
        self.candidate
            .generics
            .get(slot)
            .map(|g| g.name.to_string())
            .unwrap_or_else(|| format!("T{}", slot))
    }

    fn bind(&mut self, slot: usize, ty: TypeRef) -> Result<(), FailureReason> {
        match self.slots.get(slot).copied() {
            Some(Some(existing)) if existing != ty => Err(FailureReason::Conflict {
                slot: self.slot_name(slot),
                first: existing,
                second: ty,
            }),
            Some(_) => {
                self.slots[slot] = Some(ty);
                Ok(())
            }
            // A slot index past the declared generics never binds.
            None => Err(FailureReason::Unbound {
                slot: self.slot_name(slot),
            }),
        }
    }

    /// Unify a parameter pattern against an argument shape.
    fn unify_shape(&mut self, param: &ParamType, shape: &Shape) -> Result<(), FailureReason> {
        match param {
            // Type objects carry no instance type to bind.
            ParamType::Generic(slot) if !shape.is_meta() => self.bind(*slot, shape.type_ref()),
            ParamType::Constructed { definition, args }
                if !shape.is_meta()
                    && shape.type_ref() == *definition
                    && shape.generic_args().len() == args.len() =>
            {
                for (pattern, actual) in args.iter().zip(shape.generic_args()) {
                    self.unify_type(pattern, *actual)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Unify a nested pattern against a bare type argument.
    fn unify_type(&mut self, pattern: &ParamType, ty: TypeRef) -> Result<(), FailureReason> {
        match pattern {
            ParamType::Generic(slot) => self.bind(*slot, ty),
            // A bare TypeRef has no visible generic arguments to descend into.
            ParamType::Any | ParamType::Numeric | ParamType::Type(_) | ParamType::Constructed { .. } => Ok(()),
        }
    }

    fn finish(self) -> Result<Vec<TypeRef>, FailureReason> {
        let mut types = Vec::with_capacity(self.slots.len());
        for (slot, bound) in self.slots.iter().enumerate() {
            match bound {
                Some(ty) => types.push(*ty),
                None => {
                    return Err(FailureReason::Unbound {
                        slot: self.slot_name(slot),
                    })
                }
            }
        }
        Ok(types)
    }
}

/// Bind the generic slots of `candidate` for `arg_shapes`.
///
/// Explicit type arguments take precedence and must match the slot count.
/// Either way, every bound type is checked against its slot's constraints.
pub fn infer(
    host: &dyn HostObjectModel,
    candidate: &Candidate,
    arg_shapes: &[Shape],
    explicit: &[TypeRef],
) -> Result<Bindings, FailureReason> {
    if !candidate.is_generic() {
        return if explicit.is_empty() {
            Ok(Bindings::none())
        } else {
            Err(FailureReason::GenericArity {
                expected: 0,
                given: explicit.len(),
            })
        };
    }

    let bindings = if explicit.is_empty() {
        let mut inference = Inference::new(candidate);
        for (i, shape) in arg_shapes.iter().enumerate() {
            if let Some(param) = candidate.param_for(i) {
                inference.unify_shape(param, shape)?;
            }
        }
        let types = inference.finish()?;
        let inferred = types.len();
        Bindings { types, inferred }
    } else if explicit.len() == candidate.generics.len() {
        Bindings {
            types: explicit.to_vec(),
            inferred: 0,
        }
    } else {
        return Err(FailureReason::GenericArity {
            expected: candidate.generics.len(),
            given: explicit.len(),
        });
    };

    check_constraints(host, candidate, &bindings)?;
    Ok(bindings)
}

fn satisfies(flags: TypeFlags, constraint: GenericConstraint) -> bool {
    match constraint {
        GenericConstraint::ValueType => flags.contains(TypeFlags::VALUE_TYPE),
        GenericConstraint::ReferenceType => !flags.contains(TypeFlags::VALUE_TYPE),
        GenericConstraint::Constructible => flags.contains(TypeFlags::CONSTRUCTIBLE),
    }
}

fn check_constraints(
    host: &dyn HostObjectModel,
    candidate: &Candidate,
    bindings: &Bindings,
) -> Result<(), FailureReason> {
    for (slot, bound) in candidate.generics.iter().zip(&bindings.types) {
        let flags = host.type_flags(*bound);
        if let Some(violated) = slot.constraints.iter().find(|c| !satisfies(flags, **c)) {
            return Err(FailureReason::Constraint {
                slot: slot.name.to_string(),
                constraint: *violated,
                bound: *bound,
            });
        }
    }
    Ok(())
}
