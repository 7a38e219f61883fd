//! An in-memory class table.
//!
//! `ClassTable` is a small Ruby-flavored object model: single inheritance,
//! mixin modules, a builtin numeric/string/exception hierarchy, native
//! method bodies, implicit conversions, dynamic objects that grow members at
//! runtime, and opaque external objects reachable only by name.
//!
//! The class hierarchy (bases and mixins) should be complete before values
//! of a class are dispatched on: the member search order is fixed into each
//! shape the first time the shape is interned.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{ExternalMember, HostObjectModel};
use crate::candidate::{Candidate, MemberKind, MethodId, ParamType};
use crate::error::HostError;
use crate::operation::{ConversionKind, OperatorKind, Visibility};
use crate::resolve::Rank;
use crate::shape::{Shape, ShapeInterner, ShapeKey, ShapeKind, ShapeLayout, TypeFlags, TypeRef};
use crate::value::{ExternalObject, GuestObject, Value};

/// A native member body: `(receiver, args) -> result`.
pub type NativeFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// A member body of an external object.
pub type ExternalFn = NativeFn;

/// Handles to the builtin types every table starts with.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub object: TypeRef,
    pub kernel: TypeRef,
    pub comparable: TypeRef,
    pub nil: TypeRef,
    pub boolean: TypeRef,
    pub numeric: TypeRef,
    pub integer: TypeRef,
    pub float: TypeRef,
    pub string: TypeRef,
    pub symbol: TypeRef,
    pub array: TypeRef,
    pub class: TypeRef,
    pub exception: TypeRef,
    pub standard_error: TypeRef,
    pub runtime_error: TypeRef,
    pub type_error: TypeRef,
    pub argument_error: TypeRef,
    pub no_method_error: TypeRef,
    pub signal_exception: TypeRef,
    pub external: TypeRef,
}

struct TypeDef {
    name: Arc<str>,
    base: Option<TypeRef>,
    mixins: Vec<TypeRef>,
    flags: TypeFlags,
    /// Instance members.
    members: Vec<Candidate>,
    /// Constructors and class-level methods.
    statics: Vec<Candidate>,
}

#[derive(Clone)]
enum Body {
    Native(NativeFn),
    ExpandoGet(Arc<str>),
    ExpandoSet(Arc<str>),
    ExpandoDelete(Arc<str>),
}

#[derive(Debug, Clone, Copy)]
struct ExpandoIds {
    get: MethodId,
    set: MethodId,
    delete: MethodId,
}

/// An instance of a class, optionally of a constructed generic type.
#[derive(Debug)]
pub struct Instance {
    class: TypeRef,
    type_args: Vec<TypeRef>,
    payload: Value,
}

impl Instance {
    pub fn new(class: TypeRef) -> Self {
        Self {
            class,
            type_args: Vec::new(),
            payload: Value::Nil,
        }
    }

    /// Instantiate a constructed generic type such as `Box<Integer>`.
    pub fn with_type_args(mut self, type_args: Vec<TypeRef>) -> Self {
        self.type_args = type_args;
        self
    }

    /// Attach a wrapped value.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn type_args(&self) -> &[TypeRef] {
        &self.type_args
    }

    pub fn into_value(self) -> Value {
        Value::Object(Arc::new(self))
    }
}

impl GuestObject for Instance {
    fn class(&self) -> TypeRef {
        self.class
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An object whose member set changes at runtime.
///
/// Each distinct member set is a distinct shape, so rules cached for the
/// object before a member was added stop matching afterwards.
#[derive(Debug)]
pub struct DynamicObject {
    class: TypeRef,
    members: RwLock<IndexMap<Arc<str>, Value>>,
}

impl DynamicObject {
    pub fn new(class: TypeRef) -> Self {
        Self {
            class,
            members: RwLock::new(IndexMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.read().get(name).cloned()
    }

    /// Set a member, adding it if absent.
    pub fn set(&self, name: &str, value: Value) {
        self.members.write().insert(Arc::from(name), value);
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.members.write().shift_remove(name)
    }

    pub fn member_names(&self) -> Vec<Arc<str>> {
        self.members.read().keys().cloned().collect()
    }
}

impl GuestObject for DynamicObject {
    fn class(&self) -> TypeRef {
        self.class
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An externally hosted object with name-addressed members.
pub struct OpaqueObject {
    type_name: Arc<str>,
    members: RwLock<IndexMap<Arc<str>, ExternalFn>>,
}

impl OpaqueObject {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: Arc::from(type_name),
            members: RwLock::new(IndexMap::new()),
        }
    }

    /// Add or replace a member.
    pub fn define<F>(&self, name: &str, body: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.members.write().insert(Arc::from(name), Arc::new(body));
    }

    pub fn remove(&self, name: &str) {
        self.members.write().shift_remove(name);
    }

    pub fn into_value(self) -> Value {
        Value::External(Arc::new(self))
    }

    fn lookup(&self, name: &str) -> Option<(usize, ExternalFn)> {
        let members = self.members.read();
        members
            .get_full(name)
            .map(|(index, _, body)| (index, body.clone()))
    }
}

impl fmt::Debug for OpaqueObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueObject")
            .field("type_name", &self.type_name)
            .field("members", &self.members.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExternalObject for OpaqueObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An in-memory host object model.
pub struct ClassTable {
    types: RwLock<Vec<TypeDef>>,
    bodies: RwLock<Vec<Body>>,
    expandos: RwLock<FxHashMap<Arc<str>, ExpandoIds>>,
    conversions: RwLock<FxHashMap<(TypeRef, TypeRef), NativeFn>>,
    shapes: ShapeInterner,
    builtins: Builtins,
}

impl ClassTable {
    /// Create a table holding the builtin hierarchy.
    pub fn new() -> Self {
        let mut types = Vec::new();
        let mut add = |name: &str, base: Option<TypeRef>, flags: TypeFlags| {
            let ty = TypeRef::new(types.len() as u32);
            types.push(TypeDef {
                name: Arc::from(name),
                base,
                mixins: Vec::new(),
                flags,
                members: Vec::new(),
                statics: Vec::new(),
            });
            ty
        };

        let value = TypeFlags::VALUE_TYPE;
        let number = TypeFlags::VALUE_TYPE | TypeFlags::NUMERIC;
        let error = TypeFlags::EXCEPTION | TypeFlags::CONSTRUCTIBLE;

        let object = add("Object", None, TypeFlags::CONSTRUCTIBLE);
        let kernel = add("Kernel", None, TypeFlags::empty());
        let comparable = add("Comparable", None, TypeFlags::empty());
        let nil = add("NilClass", Some(object), value);
        let boolean = add("Boolean", Some(object), value);
        let numeric = add("Numeric", Some(object), TypeFlags::NUMERIC);
        let integer = add("Integer", Some(numeric), number);
        let float = add("Float", Some(numeric), number);
        let string = add("String", Some(object), TypeFlags::CONSTRUCTIBLE);
        let symbol = add("Symbol", Some(object), value);
        let array = add("Array", Some(object), TypeFlags::CONSTRUCTIBLE);
        let class = add("Class", Some(object), TypeFlags::empty());
        let exception = add("Exception", Some(object), error);
        let standard_error = add("StandardError", Some(exception), error);
        let runtime_error = add("RuntimeError", Some(standard_error), error);
        let type_error = add("TypeError", Some(standard_error), error);
        let argument_error = add("ArgumentError", Some(standard_error), error);
        let no_method_error = add("NoMethodError", Some(standard_error), error);
        let signal_exception = add("SignalException", Some(exception), error);
        let external = add("ExternalObject", Some(object), TypeFlags::empty());

        types[object.index() as usize].mixins.push(kernel);
        types[numeric.index() as usize].mixins.push(comparable);
        types[string.index() as usize].mixins.push(comparable);

        Self {
            types: RwLock::new(types),
            bodies: RwLock::new(Vec::new()),
            expandos: RwLock::new(FxHashMap::default()),
            conversions: RwLock::new(FxHashMap::default()),
            shapes: ShapeInterner::new(),
            builtins: Builtins {
                object,
                kernel,
                comparable,
                nil,
                boolean,
                numeric,
                integer,
                float,
                string,
                symbol,
                array,
                class,
                exception,
                standard_error,
                runtime_error,
                type_error,
                argument_error,
                no_method_error,
                signal_exception,
                external,
            },
        }
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Define a type with explicit flags.
    pub fn define_type(&self, name: &str, base: Option<TypeRef>, flags: TypeFlags) -> TypeRef {
        let mut types = self.types.write();
        let ty = TypeRef::new(types.len() as u32);
        types.push(TypeDef {
            name: Arc::from(name),
            base,
            mixins: Vec::new(),
            flags,
            members: Vec::new(),
            statics: Vec::new(),
        });
        ty
    }

    /// Define a constructible class; exception-ness is inherited.
    pub fn define_class(&self, name: &str, base: TypeRef) -> TypeRef {
        let inherited = self.type_flags(base) & TypeFlags::EXCEPTION;
        self.define_type(name, Some(base), TypeFlags::CONSTRUCTIBLE | inherited)
    }

    /// Define a module usable as a mixin.
    pub fn define_module(&self, name: &str) -> TypeRef {
        self.define_type(name, None, TypeFlags::empty())
    }

    /// Mix `module` into `ty`. Later inclusions are searched first.
    pub fn include(&self, ty: TypeRef, module: TypeRef) -> Result<(), HostError> {
        let mut types = self.types.write();
        if types.get(ty.index() as usize).is_none() || types.get(module.index() as usize).is_none() {
            return Err(HostError::Failed(format!("unknown type in include: {} or {}", ty, module)));
        }
        if linearize(&types, module).contains(&ty) {
            return Err(HostError::Failed(format!(
                "cyclic include detected: {} already includes {}",
                types[module.index() as usize].name,
                types[ty.index() as usize].name
            )));
        }
        let def = &mut types[ty.index() as usize];
        if !def.mixins.contains(&module) {
            def.mixins.push(module);
        }
        Ok(())
    }

    fn add_body(&self, body: Body) -> MethodId {
        let mut bodies = self.bodies.write();
        let id = MethodId::new(bodies.len() as u32);
        bodies.push(body);
        id
    }

    fn add_member<S, F>(
        &self,
        owner: TypeRef,
        kind: MemberKind,
        name: &str,
        is_static: bool,
        signature: S,
        body: F,
    ) -> MethodId
    where
        S: FnOnce(Candidate) -> Candidate,
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let id = self.add_body(Body::Native(Arc::new(body)));
        let candidate = signature(Candidate::new(id, kind, name, owner));
        let mut types = self.types.write();
        if let Some(def) = types.get_mut(owner.index() as usize) {
            if is_static {
                def.statics.push(candidate);
            } else {
                def.members.push(candidate);
            }
        }
        id
    }

    /// Define an instance method. `signature` refines the parameter list,
    /// generics and visibility of a public zero-parameter method.
    pub fn define_method<S, F>(&self, owner: TypeRef, name: &str, signature: S, body: F) -> MethodId
    where
        S: FnOnce(Candidate) -> Candidate,
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(owner, MemberKind::Method, name, false, signature, body)
    }

    /// Define an operator member.
    pub fn define_operator<S, F>(&self, owner: TypeRef, op: OperatorKind, signature: S, body: F) -> MethodId
    where
        S: FnOnce(Candidate) -> Candidate,
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(owner, MemberKind::Operator, op.member_name(), false, signature, body)
    }

    /// Define a conversion protocol method (`to_int`, `to_str`, ...).
    pub fn define_conversion<F>(&self, owner: TypeRef, kind: ConversionKind, body: F) -> MethodId
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(owner, MemberKind::Conversion, kind.protocol_method(), false, |c| c, body)
    }

    /// Define a property reader.
    pub fn define_getter<F>(&self, owner: TypeRef, name: &str, body: F) -> MethodId
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(owner, MemberKind::Getter, name, false, |c| c, body)
    }

    /// Define a property writer taking one value of type `param`.
    pub fn define_setter<F>(&self, owner: TypeRef, name: &str, param: ParamType, body: F) -> MethodId
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(owner, MemberKind::Setter, name, false, |c| c.param(param), body)
    }

    /// Define a constructor. Constructors are not inherited.
    pub fn define_constructor<S, F>(&self, owner: TypeRef, signature: S, body: F) -> MethodId
    where
        S: FnOnce(Candidate) -> Candidate,
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(owner, MemberKind::Constructor, "new", true, signature, body)
    }

    /// Define a class-level method, called on the type object.
    pub fn define_class_method<S, F>(&self, owner: TypeRef, name: &str, signature: S, body: F) -> MethodId
    where
        S: FnOnce(Candidate) -> Candidate,
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.add_member(owner, MemberKind::Method, name, true, signature, body)
    }

    /// Register an implicit conversion from `from` values to `to`.
    pub fn add_implicit_conversion<F>(&self, from: TypeRef, to: TypeRef, body: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.conversions.write().insert((from, to), Arc::new(body));
    }

    /// Number of distinct shapes seen so far.
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    fn expando_ids(&self, name: &Arc<str>) -> ExpandoIds {
        if let Some(ids) = self.expandos.read().get(name) {
            return *ids;
        }

        let mut expandos = self.expandos.write();
        if let Some(ids) = expandos.get(name) {
            return *ids;
        }
        let ids = ExpandoIds {
            get: self.add_body(Body::ExpandoGet(name.clone())),
            set: self.add_body(Body::ExpandoSet(name.clone())),
            delete: self.add_body(Body::ExpandoDelete(name.clone())),
        };
        expandos.insert(name.clone(), ids);
        ids
    }

    /// Synthetic accessors for the dynamic members of a shape.
    fn expando_members(&self, shape: &Shape, name: Option<&str>) -> Vec<Candidate> {
        let owner = shape.type_ref();
        let mut out = Vec::new();
        for member in shape.members() {
            if name.is_some_and(|n| n != &**member) {
                continue;
            }
            let ids = self.expando_ids(member);
            out.push(Candidate::new(ids.get, MemberKind::Getter, member, owner));
            out.push(Candidate::new(ids.set, MemberKind::Setter, member, owner).param(ParamType::Any));
            out.push(Candidate::new(ids.delete, MemberKind::Deleter, member, owner));
        }
        out
    }

    fn collect_members(&self, shape: &Shape, name: Option<&str>, visibility: Visibility) -> Vec<Candidate> {
        let mut out = Vec::new();
        match shape.kind() {
            ShapeKind::External => return out,
            ShapeKind::Dynamic => out.extend(self.expando_members(shape, name)),
            ShapeKind::Instance | ShapeKind::Meta => {}
        }

        let types = self.types.read();
        for ty in shape.lookup_order() {
            let Some(def) = types.get(ty.index() as usize) else {
                continue;
            };
            let members = if shape.is_meta() { &def.statics } else { &def.members };
            out.extend(
                members
                    .iter()
                    .filter(|c| visibility.admits(c.visibility))
                    .filter(|c| name.map_or(true, |n| &*c.name == n))
                    .filter(|c| c.kind != MemberKind::Constructor || *ty == shape.type_ref())
                    .cloned(),
            );
        }
        out
    }

    fn layout(&self, key: &ShapeKey) -> ShapeLayout {
        let types = self.types.read();
        let flags = types
            .get(key.type_ref.index() as usize)
            .map(|def| def.flags)
            .unwrap_or_default();
        ShapeLayout {
            flags,
            lookup_order: linearize(&types, key.type_ref),
        }
    }

    fn expando_target<'a>(&self, receiver: &'a Value) -> Result<&'a DynamicObject, HostError> {
        receiver
            .as_object()
            .and_then(|obj| obj.as_any().downcast_ref::<DynamicObject>())
            .ok_or_else(|| HostError::Failed("dynamic member access on a non-dynamic object".to_string()))
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClassTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassTable")
            .field("types", &self.types.read().len())
            .field("bodies", &self.bodies.read().len())
            .field("shapes", &self.shapes)
            .finish()
    }
}

/// Member search order of `ty`: the type, its mixins (last included
/// first, each with its own mixins), then the same for each ancestor.
fn linearize(types: &[TypeDef], ty: TypeRef) -> Vec<TypeRef> {
    let mut order = Vec::new();
    let mut current = Some(ty);
    while let Some(t) = current {
        let Some(def) = types.get(t.index() as usize) else {
            break;
        };
        push_unique(&mut order, t);
        for mixin in def.mixins.iter().rev() {
            for m in linearize(types, *mixin) {
                push_unique(&mut order, m);
            }
        }
        current = def.base;
    }
    order
}

fn push_unique(order: &mut Vec<TypeRef>, ty: TypeRef) {
    if !order.contains(&ty) {
        order.push(ty);
    }
}

impl HostObjectModel for ClassTable {
    fn shape_of(&self, value: &Value) -> Shape {
        let b = &self.builtins;
        let key = match value {
            Value::Nil => ShapeKey::instance(b.nil),
            Value::Bool(_) => ShapeKey::instance(b.boolean),
            Value::Int(_) => ShapeKey::instance(b.integer),
            Value::Float(_) => ShapeKey::instance(b.float),
            Value::Str(_) => ShapeKey::instance(b.string),
            Value::Symbol(_) => ShapeKey::instance(b.symbol),
            Value::Array(_) => ShapeKey::instance(b.array),
            Value::Type(ty) => ShapeKey::meta(*ty),
            Value::Object(obj) => {
                let any = obj.as_any();
                if let Some(inst) = any.downcast_ref::<Instance>() {
                    ShapeKey::generic(inst.class, inst.type_args.clone())
                } else if let Some(dynamic) = any.downcast_ref::<DynamicObject>() {
                    ShapeKey::dynamic(dynamic.class, dynamic.member_names())
                } else {
                    ShapeKey::instance(obj.class())
                }
            }
            Value::External(_) => ShapeKey::external(b.external),
        };
        self.shapes.intern_with(key, |key| self.layout(key))
    }

    fn enumerate_members(&self, shape: &Shape, visibility: Visibility) -> Vec<Candidate> {
        self.collect_members(shape, None, visibility)
    }

    fn members_named(&self, shape: &Shape, name: &str) -> Vec<Candidate> {
        self.collect_members(shape, Some(name), Visibility::Private)
    }

    fn is_a(&self, shape: &Shape, ty: TypeRef) -> bool {
        match shape.kind() {
            ShapeKind::Meta => linearize(&self.types.read(), self.builtins.class).contains(&ty),
            ShapeKind::Instance | ShapeKind::Dynamic | ShapeKind::External => {
                shape.lookup_order().contains(&ty)
            }
        }
    }

    fn convert_rank(&self, shape: &Shape, ty: TypeRef) -> Option<Rank> {
        if !shape.is_meta() && shape.type_ref() == ty {
            return Some(Rank::Exact);
        }
        if self.is_a(shape, ty) {
            return Some(Rank::Widening);
        }
        if shape.is_meta() {
            return None;
        }
        if shape.type_ref() == self.builtins.integer && ty == self.builtins.float {
            return Some(Rank::Widening);
        }
        if self.conversions.read().contains_key(&(shape.type_ref(), ty)) {
            return Some(Rank::ImplicitUserConversion);
        }
        None
    }

    fn type_flags(&self, ty: TypeRef) -> TypeFlags {
        self.types
            .read()
            .get(ty.index() as usize)
            .map(|def| def.flags)
            .unwrap_or_default()
    }

    fn type_name(&self, ty: TypeRef) -> String {
        self.types
            .read()
            .get(ty.index() as usize)
            .map(|def| def.name.to_string())
            .unwrap_or_else(|| ty.to_string())
    }

    fn standard_error(&self) -> TypeRef {
        self.builtins.standard_error
    }

    fn conversion_target(&self, kind: ConversionKind) -> TypeRef {
        let b = &self.builtins;
        match kind {
            ConversionKind::Integer => b.integer,
            ConversionKind::Float => b.float,
            ConversionKind::String => b.string,
            ConversionKind::Array => b.array,
            ConversionKind::Symbol => b.symbol,
        }
    }

    fn external_lookup(&self, receiver: &Value, name: &str) -> Option<ExternalMember> {
        let Value::External(ext) = receiver else {
            return None;
        };
        let opaque = ext.as_any().downcast_ref::<OpaqueObject>()?;
        let (index, _) = opaque.lookup(name)?;
        Some(ExternalMember {
            name: Arc::from(name),
            token: index as u64,
        })
    }

    fn invoke(&self, method: MethodId, receiver: &Value, args: Vec<Value>) -> Result<Value, HostError> {
        // Clone the body out so guest code never runs under the table lock.
        let body = self
            .bodies
            .read()
            .get(method.index() as usize)
            .cloned()
            .ok_or_else(|| HostError::Failed(format!("unknown method id {}", method.index())))?;

        match body {
            Body::Native(f) => f(receiver, &args),
            Body::ExpandoGet(name) => Ok(self.expando_target(receiver)?.get(&name).unwrap_or(Value::Nil)),
            Body::ExpandoSet(name) => {
                let value = args.into_iter().next().unwrap_or(Value::Nil);
                self.expando_target(receiver)?.set(&name, value.clone());
                Ok(value)
            }
            Body::ExpandoDelete(name) => Ok(self.expando_target(receiver)?.remove(&name).unwrap_or(Value::Nil)),
        }
    }

    fn invoke_external(
        &self,
        member: &ExternalMember,
        receiver: &Value,
        args: Vec<Value>,
    ) -> Result<Value, HostError> {
        let opaque = match receiver {
            Value::External(ext) => ext.as_any().downcast_ref::<OpaqueObject>(),
            _ => None,
        }
        .ok_or_else(|| HostError::Failed("late-bound call on a non-external receiver".to_string()))?;

        // The member set may have changed since lookup; the name is authoritative.
        let (_, body) = opaque.lookup(&member.name).ok_or_else(|| {
            HostError::Failed(format!(
                "external member `{}` vanished from {}",
                member.name, opaque.type_name
            ))
        })?;
        body(receiver, &args)
    }

    fn convert_value(&self, value: Value, ty: TypeRef, rank: Rank) -> Result<Value, HostError> {
        match rank {
            Rank::Widening => match value {
                Value::Int(i) if ty == self.builtins.float => Ok(Value::Float(i as f64)),
                other => Ok(other),
            },
            Rank::ImplicitUserConversion => {
                let from = self.shape_of(&value).type_ref();
                let convert = self.conversions.read().get(&(from, ty)).cloned().ok_or_else(|| {
                    HostError::Failed(format!(
                        "no implicit conversion from {} to {}",
                        self.type_name(from),
                        self.type_name(ty)
                    ))
                })?;
                convert(&value, &[])
            }
            Rank::Exact | Rank::BoxedGenericParameter | Rank::VariadicCollected => Ok(value),
        }
    }
}
