//! Candidate implementations.
//!
//! A [`Candidate`] is plain data describing one implementation the resolver
//! may pick: its parameter list, whether it collects trailing arguments,
//! its generic slots, and its visibility. Candidates carry no behavior; the
//! host executes the chosen one through its [`MethodId`].

use std::fmt;
use std::sync::Arc;

use crate::operation::Visibility;
use crate::shape::TypeRef;

/// Host handle to an executable member body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(u32);

impl MethodId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

/// What kind of member a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    Constructor,
    Getter,
    Setter,
    Deleter,
    Operator,
    Conversion,
}

/// The declared type of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Untyped: accepts any argument without conversion.
    Any,
    /// Accepts any numeric argument without conversion.
    Numeric,
    /// A concrete host type.
    Type(TypeRef),
    /// The candidate's generic slot with this index.
    Generic(usize),
    /// A constructed generic type such as `List<T>`.
    Constructed {
        definition: TypeRef,
        args: Vec<ParamType>,
    },
}

impl ParamType {
    /// Check whether the type mentions any generic slot.
    pub fn is_generic(&self) -> bool {
        match self {
            ParamType::Generic(_) => true,
            ParamType::Constructed { args, .. } => args.iter().any(ParamType::is_generic),
            ParamType::Any | ParamType::Numeric | ParamType::Type(_) => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => write!(f, "_"),
            ParamType::Numeric => write!(f, "Numeric"),
            ParamType::Type(ty) => write!(f, "{}", ty),
            ParamType::Generic(slot) => write!(f, "T{}", slot),
            ParamType::Constructed { definition, args } => {
                write!(f, "{}<", definition)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// A constraint on a generic slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericConstraint {
    /// The bound type must be a value type.
    ValueType,
    /// The bound type must be a reference type.
    ReferenceType,
    /// The bound type must be constructible without arguments.
    Constructible,
}

impl fmt::Display for GenericConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GenericConstraint::ValueType => "value type",
            GenericConstraint::ReferenceType => "reference type",
            GenericConstraint::Constructible => "constructible",
        })
    }
}

/// A generic slot of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericSlot {
    /// The slot name, for diagnostics.
    pub name: Arc<str>,
    /// Constraints the bound type must satisfy.
    pub constraints: Vec<GenericConstraint>,
}

impl GenericSlot {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: GenericConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// The argument counts a candidate accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Arity {
    /// Number of mandatory parameters.
    pub required: usize,
    /// Number of defaulted parameters after the mandatory ones.
    pub optional: usize,
    /// Whether trailing arguments are collected.
    pub variadic: bool,
}

impl Arity {
    /// Exactly `required` arguments.
    pub const fn fixed(required: usize) -> Self {
        Self {
            required,
            optional: 0,
            variadic: false,
        }
    }

    /// `required..=required + optional` arguments.
    pub const fn range(required: usize, optional: usize) -> Self {
        Self {
            required,
            optional,
            variadic: false,
        }
    }

    /// At least `required` arguments.
    pub const fn at_least(required: usize) -> Self {
        Self {
            required,
            optional: 0,
            variadic: true,
        }
    }

    pub fn accepts(self, argc: usize) -> bool {
        argc >= self.required && (self.variadic || argc <= self.required + self.optional)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.required)?;
        if self.variadic {
            write!(f, "+")
        } else if self.optional > 0 {
            write!(f, "..{}", self.required + self.optional)
        } else {
            Ok(())
        }
    }
}

/// One resolvable implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// The executable body.
    pub id: MethodId,
    /// The member name.
    pub name: Arc<str>,
    /// The member kind.
    pub kind: MemberKind,
    /// The type that declares the member.
    pub owner: TypeRef,
    /// Mandatory parameters.
    pub params: Vec<ParamType>,
    /// Defaulted parameters following the mandatory ones.
    pub optional: Vec<ParamType>,
    /// Element type of the parameter collecting trailing arguments.
    pub rest: Option<ParamType>,
    /// Generic slots.
    pub generics: Vec<GenericSlot>,
    /// Who may call it.
    pub visibility: Visibility,
}

impl Candidate {
    /// A public method with no parameters; refine with the builder methods.
    pub fn new(id: MethodId, kind: MemberKind, name: &str, owner: TypeRef) -> Self {
        Self {
            id,
            name: Arc::from(name),
            kind,
            owner,
            params: Vec::new(),
            optional: Vec::new(),
            rest: None,
            generics: Vec::new(),
            visibility: Visibility::Public,
        }
    }

    pub fn method(id: MethodId, name: &str, owner: TypeRef) -> Self {
        Self::new(id, MemberKind::Method, name, owner)
    }

    pub fn param(mut self, ty: ParamType) -> Self {
        self.params.push(ty);
        self
    }

    pub fn params<I: IntoIterator<Item = ParamType>>(mut self, params: I) -> Self {
        self.params.extend(params);
        self
    }

    /// Add a parameter the caller may omit.
    pub fn optional(mut self, ty: ParamType) -> Self {
        self.optional.push(ty);
        self
    }

    /// Collect trailing arguments of type `element`.
    pub fn rest(mut self, element: ParamType) -> Self {
        self.rest = Some(element);
        self
    }

    pub fn generic(mut self, slot: GenericSlot) -> Self {
        self.generics.push(slot);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }

    pub fn arity(&self) -> Arity {
        Arity {
            required: self.params.len(),
            optional: self.optional.len(),
            variadic: self.is_variadic(),
        }
    }

    /// Number of mandatory and optional parameters together.
    pub fn fixed_params(&self) -> usize {
        self.params.len() + self.optional.len()
    }

    /// The declared type of the parameter receiving argument `index`.
    pub fn param_for(&self, index: usize) -> Option<&ParamType> {
        match index.checked_sub(self.params.len()) {
            None => self.params.get(index),
            Some(i) => self.optional.get(i).or(self.rest.as_ref()),
        }
    }

    /// The call signature, ignoring owner and body.
    ///
    /// A member with the same signature earlier in the search order
    /// overrides a later one.
    pub fn signature_key(&self) -> SignatureKey {
        SignatureKey {
            kind: self.kind,
            name: self.name.clone(),
            params: self.params.clone(),
            optional: self.optional.clone(),
            rest: self.rest.clone(),
            generic_arity: self.generics.len(),
        }
    }

    /// The signature as a member read sees it: a plain zero-argument
    /// method reads the same member a getter of that name does.
    pub fn read_signature_key(&self) -> SignatureKey {
        let mut key = self.signature_key();
        if self.kind == MemberKind::Method && self.arity() == Arity::fixed(0) {
            key.kind = MemberKind::Getter;
        }
        key
    }
}

/// Identity of a candidate's call signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    kind: MemberKind,
    name: Arc<str>,
    params: Vec<ParamType>,
    optional: Vec<ParamType>,
    rest: Option<ParamType>,
    generic_arity: usize,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.generics.is_empty() {
            write!(f, "<")?;
            for (i, slot) in self.generics.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", slot.name)?;
            }
            write!(f, ">")?;
        }
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        for (i, param) in self.optional.iter().enumerate() {
            if i > 0 || !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "[{}]", param)?;
        }
        if let Some(rest) = &self.rest {
            if self.fixed_params() > 0 {
                write!(f, ", ")?;
            }
            write!(f, "*{}", rest)?;
        }
        write!(f, ")")
    }
}
