//! Guest values as seen by the binder.
//!
//! The binder never inspects object layouts: heap objects are opaque
//! [`GuestObject`] trait objects that only the host downcasts, and foreign
//! objects are [`ExternalObject`]s reachable through name lookup alone.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::shape::TypeRef;

/// A heap object owned by the host object model.
pub trait GuestObject: fmt::Debug + Send + Sync + 'static {
    /// The object's class.
    fn class(&self) -> TypeRef;

    /// Downcasting hook for the owning host.
    fn as_any(&self) -> &dyn Any;
}

/// An opaque object hosted by an external system.
pub trait ExternalObject: fmt::Debug + Send + Sync + 'static {
    /// The foreign type name, for diagnostics.
    fn type_name(&self) -> &str;

    /// Downcasting hook for the owning host.
    fn as_any(&self) -> &dyn Any;
}

/// A guest value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Symbol(Arc<str>),
    Array(Arc<[Value]>),
    /// A type object.
    Type(TypeRef),
    Object(Arc<dyn GuestObject>),
    External(Arc<dyn ExternalObject>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn symbol(s: &str) -> Self {
        Value::Symbol(Arc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::from(items))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeRef> {
        match self {
            Value::Type(ty) => Some(*ty),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn GuestObject>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            // Heap and foreign objects compare by identity.
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::External(a), Value::External(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}
