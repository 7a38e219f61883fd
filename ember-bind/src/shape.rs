//! Runtime shapes.
//!
//! A [`Shape`] summarizes the structure of a runtime value for dispatch:
//! its category, its type, its generic arguments and, for dynamically
//! modifiable objects, the set of members it currently carries. Shapes are
//! the keys of every cached rule, so they must satisfy one invariant:
//!
//! > Two values with identical shapes are resolved identically.
//!
//! Shapes are hash-consed by a [`ShapeInterner`]. Interning makes equality a
//! pointer comparison, which keeps guard checks on the hit path cheap. A
//! dynamic object that gains or loses a member produces a different
//! [`ShapeKey`] and therefore a different `Shape`; cached rules keyed on the
//! old shape simply stop matching.
//!
//! Each shape also carries its member search order (own type, mixins,
//! ancestors) as a flat list computed once when the shape is built, so
//! candidate discovery never walks a live inheritance graph.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use bitflags::bitflags;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Opaque handle to a type in the host object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeRef(u32);

impl TypeRef {
    /// Create a type handle from a host-assigned index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The host-assigned index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Static properties of a type, as reported by the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u16 {
        /// Instances are values (copied), not references.
        const VALUE_TYPE = 1 << 0;
        /// The type can be instantiated with a no-argument constructor.
        const CONSTRUCTIBLE = 1 << 1;
        /// The type belongs to the numeric tower.
        const NUMERIC = 1 << 2;
        /// The type is an exception class.
        const EXCEPTION = 1 << 3;
    }
}

/// The category of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// An instance of a concrete type with no extra dynamic members.
    Instance,
    /// A dynamically modifiable object; the member set is part of the shape.
    Dynamic,
    /// A type object (the receiver of `new`, the operand of a rescue matcher).
    Meta,
    /// An opaque externally hosted object whose members are not discoverable.
    External,
}

/// The identity of a shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    /// The shape category.
    pub kind: ShapeKind,
    /// The instance type (or the described type, for meta shapes).
    pub type_ref: TypeRef,
    /// Generic arguments of a constructed generic type.
    pub generic_args: Box<[TypeRef]>,
    /// Dynamic member names, sorted and deduplicated.
    pub members: Box<[Arc<str>]>,
}

impl ShapeKey {
    /// Key for a plain instance of `type_ref`.
    pub fn instance(type_ref: TypeRef) -> Self {
        Self::generic(type_ref, Vec::new())
    }

    /// Key for an instance of a constructed generic type.
    pub fn generic(type_ref: TypeRef, generic_args: Vec<TypeRef>) -> Self {
        Self {
            kind: ShapeKind::Instance,
            type_ref,
            generic_args: generic_args.into_boxed_slice(),
            members: Box::new([]),
        }
    }

    /// Key for a dynamic object of `type_ref` carrying `members`.
    pub fn dynamic<I>(type_ref: TypeRef, members: I) -> Self
    where
        I: IntoIterator<Item = Arc<str>>,
    {
        let mut members: Vec<Arc<str>> = members.into_iter().collect();
        members.sort();
        members.dedup();
        Self {
            kind: ShapeKind::Dynamic,
            type_ref,
            generic_args: Box::new([]),
            members: members.into_boxed_slice(),
        }
    }

    /// Key for the type object describing `type_ref`.
    pub fn meta(type_ref: TypeRef) -> Self {
        Self {
            kind: ShapeKind::Meta,
            ..Self::instance(type_ref)
        }
    }

    /// Key for an external object whose host type is `type_ref`.
    pub fn external(type_ref: TypeRef) -> Self {
        Self {
            kind: ShapeKind::External,
            ..Self::instance(type_ref)
        }
    }
}

/// Host-computed properties attached to a shape when it is first interned.
#[derive(Debug, Clone, Default)]
pub struct ShapeLayout {
    /// Flags of the shape's type.
    pub flags: TypeFlags,
    /// Member search order: own type first, then mixins and ancestors.
    pub lookup_order: Vec<TypeRef>,
}

struct ShapeData {
    key: ShapeKey,
    flags: TypeFlags,
    lookup_order: Box<[TypeRef]>,
}

/// An interned, immutable shape snapshot.
///
/// Cloning is a reference-count increment; equality and hashing use the
/// identity of the interned allocation.
#[derive(Clone)]
pub struct Shape(Arc<ShapeData>);

impl Shape {
    fn build(key: &ShapeKey, layout: ShapeLayout) -> Self {
        Shape(Arc::new(ShapeData {
            key: key.clone(),
            flags: layout.flags,
            lookup_order: layout.lookup_order.into_boxed_slice(),
        }))
    }

    /// The shape category.
    pub fn kind(&self) -> ShapeKind {
        self.0.key.kind
    }

    /// The shape's type.
    pub fn type_ref(&self) -> TypeRef {
        self.0.key.type_ref
    }

    /// Flags of the shape's type.
    pub fn flags(&self) -> TypeFlags {
        self.0.flags
    }

    /// Generic arguments of a constructed generic instance.
    pub fn generic_args(&self) -> &[TypeRef] {
        &self.0.key.generic_args
    }

    /// Dynamic member names (empty unless the shape is dynamic).
    pub fn members(&self) -> &[Arc<str>] {
        &self.0.key.members
    }

    /// Check whether a dynamic member is present.
    pub fn has_member(&self, name: &str) -> bool {
        self.0
            .key
            .members
            .binary_search_by(|m| m.as_ref().cmp(name))
            .is_ok()
    }

    /// The precomputed member search order.
    pub fn lookup_order(&self) -> &[TypeRef] {
        &self.0.lookup_order
    }

    /// The interning key.
    pub fn key(&self) -> &ShapeKey {
        &self.0.key
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() != ShapeKind::Meta && self.flags().contains(TypeFlags::NUMERIC)
    }

    pub fn is_value_type(&self) -> bool {
        self.kind() != ShapeKind::Meta && self.flags().contains(TypeFlags::VALUE_TYPE)
    }

    pub fn is_external(&self) -> bool {
        self.kind() == ShapeKind::External
    }

    pub fn is_meta(&self) -> bool {
        self.kind() == ShapeKind::Meta
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = &self.0.key;
        write!(f, "Shape({:?} {}", key.kind, key.type_ref)?;
        if !key.generic_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in key.generic_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        if !key.members.is_empty() {
            write!(f, " {{{}}}", key.members.join(", "))?;
        }
        write!(f, ")")
    }
}

/// A class of shapes accepted by a widened guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    /// Every shape.
    Any,
    /// Shapes of numeric instances.
    Numeric,
    /// Shapes of value-type instances.
    ValueType,
    /// Shapes of reference instances (including type objects).
    Reference,
}

impl ShapeClass {
    /// Check whether `shape` belongs to this class.
    pub fn contains(self, shape: &Shape) -> bool {
        match self {
            ShapeClass::Any => true,
            ShapeClass::Numeric => shape.is_numeric(),
            ShapeClass::ValueType => shape.is_value_type(),
            ShapeClass::Reference => !shape.is_value_type(),
        }
    }
}

/// Hash-consing table for shapes.
///
/// Owned by a host object model; every shape handed to the binder for that
/// host must come from the same interner, otherwise pointer equality would
/// report structurally identical shapes as different.
///
/// Instance, meta and external shapes are bounded by the number of types
/// and live for the interner's lifetime. Dynamic shapes are one per
/// distinct member set, so they are held weakly: once no cached rule or
/// caller holds a dynamic shape, its entry is swept and a later object
/// with the same members interns a fresh one.
#[derive(Default)]
pub struct ShapeInterner {
    fixed: RwLock<FxHashMap<ShapeKey, Shape>>,
    dynamic: RwLock<DynamicShapes>,
}

#[derive(Default)]
struct DynamicShapes {
    shapes: FxHashMap<ShapeKey, Weak<ShapeData>>,
    /// Entry count that triggers the next sweep of dead entries.
    sweep_at: usize,
}

const MIN_SWEEP: usize = 64;

impl ShapeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shape for `key`, building its layout on first use.
    ///
    /// `describe` runs at most once per live key and must not re-enter the
    /// interner.
    pub fn intern_with<F>(&self, key: ShapeKey, describe: F) -> Shape
    where
        F: FnOnce(&ShapeKey) -> ShapeLayout,
    {
        if key.kind == ShapeKind::Dynamic {
            return self.intern_dynamic(key, describe);
        }

        if let Some(shape) = self.fixed.read().get(&key) {
            return shape.clone();
        }

        let layout = describe(&key);
        let mut shapes = self.fixed.write();
        shapes
            .entry(key)
            .or_insert_with_key(|key| Shape::build(key, layout))
            .clone()
    }

    fn intern_dynamic<F>(&self, key: ShapeKey, describe: F) -> Shape
    where
        F: FnOnce(&ShapeKey) -> ShapeLayout,
    {
        if let Some(data) = self.dynamic.read().shapes.get(&key).and_then(Weak::upgrade) {
            return Shape(data);
        }

        let layout = describe(&key);
        let mut dynamic = self.dynamic.write();
        if let Some(data) = dynamic.shapes.get(&key).and_then(Weak::upgrade) {
            return Shape(data);
        }

        if dynamic.shapes.len() >= dynamic.sweep_at {
            dynamic.shapes.retain(|_, weak| weak.strong_count() > 0);
            dynamic.sweep_at = (dynamic.shapes.len() * 2).max(MIN_SWEEP);
        }

        let shape = Shape::build(&key, layout);
        dynamic.shapes.insert(key, Arc::downgrade(&shape.0));
        shape
    }

    /// Number of distinct shapes currently interned and alive.
    pub fn len(&self) -> usize {
        let live_dynamic = self
            .dynamic
            .read()
            .shapes
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count();
        self.fixed.read().len() + live_dynamic
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ShapeInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeInterner")
            .field("shapes", &self.len())
            .finish()
    }
}
