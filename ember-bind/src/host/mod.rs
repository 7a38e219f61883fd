//! The host object model boundary.
//!
//! The binder never reflects over host metadata itself. Everything it needs
//! to know about types, members and conversions comes through
//! [`HostObjectModel`], and everything it executes goes back through it.
//! [`ClassTable`] is a self-contained implementation used by tests,
//! benchmarks and embedders with a simple object model.

mod table;

pub use table::{Builtins, ClassTable, DynamicObject, ExternalFn, Instance, NativeFn, OpaqueObject};

use std::sync::Arc;

use crate::candidate::{Candidate, MethodId};
use crate::error::HostError;
use crate::operation::{ConversionKind, Visibility};
use crate::resolve::Rank;
use crate::shape::{Shape, TypeFlags, TypeRef};
use crate::value::Value;

/// A member of an external object found by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalMember {
    /// The member name as looked up.
    pub name: Arc<str>,
    /// Host token identifying the member for `invoke_external`.
    pub token: u64,
}

/// Capabilities the binder consumes from the host object system.
///
/// Implementations must be pure with respect to binding: the query methods
/// may not run guest code, and two calls with the same shape must give the
/// same answer for as long as that shape is live.
pub trait HostObjectModel: Send + Sync {
    /// The shape of a runtime value.
    fn shape_of(&self, value: &Value) -> Shape;

    /// Members of `shape` whose visibility is at most `visibility`, in the
    /// shape's linear search order.
    fn enumerate_members(&self, shape: &Shape, visibility: Visibility) -> Vec<Candidate>;

    /// Members named `name`, in search order, regardless of visibility.
    fn members_named(&self, shape: &Shape, name: &str) -> Vec<Candidate> {
        self.enumerate_members(shape, Visibility::Private)
            .into_iter()
            .filter(|c| &*c.name == name)
            .collect()
    }

    /// Whether values of `shape` are instances of `ty` (equal or derived).
    fn is_a(&self, shape: &Shape, ty: TypeRef) -> bool;

    /// How well a value of `shape` converts to `ty`, or `None` if it does not.
    fn convert_rank(&self, shape: &Shape, ty: TypeRef) -> Option<Rank>;

    /// Static flags of a type.
    fn type_flags(&self, ty: TypeRef) -> TypeFlags;

    /// Display name of a type.
    fn type_name(&self, ty: TypeRef) -> String {
        ty.to_string()
    }

    /// Display name of a shape, for diagnostics.
    fn shape_name(&self, shape: &Shape) -> String {
        if shape.is_meta() {
            format!("class {}", self.type_name(shape.type_ref()))
        } else {
            self.type_name(shape.type_ref())
        }
    }

    /// The type a bare rescue handler matches.
    fn standard_error(&self) -> TypeRef;

    /// The type a protocol conversion must produce.
    fn conversion_target(&self, kind: ConversionKind) -> TypeRef;

    /// Name-based lookup on an opaque external object.
    fn external_lookup(&self, receiver: &Value, name: &str) -> Option<ExternalMember>;

    /// Execute a member body.
    ///
    /// `args` holds one value per mandatory and optional parameter, with nil
    /// standing in for omitted optionals, followed by the collected rest
    /// array when the member is variadic.
    fn invoke(&self, method: MethodId, receiver: &Value, args: Vec<Value>) -> Result<Value, HostError>;

    /// Execute a member of an external object.
    fn invoke_external(
        &self,
        member: &ExternalMember,
        receiver: &Value,
        args: Vec<Value>,
    ) -> Result<Value, HostError>;

    /// Convert an argument to a parameter type, as justified by `rank`.
    fn convert_value(&self, value: Value, ty: TypeRef, rank: Rank) -> Result<Value, HostError>;
}
