//! Operation descriptors.
//!
//! An [`OperationDescriptor`] is the static description of what a call site
//! does: which operation, with how many arguments, on behalf of which
//! caller context. It is fixed when the call site is created and is part of
//! the site's identity, so it is `Eq + Hash`.

use std::fmt;
use std::sync::Arc;

use crate::shape::TypeRef;

/// Member visibility, ordered from most to least restrictive audience.
///
/// A caller at level `L` sees members whose visibility is at most `L`:
/// an external call (`Public`) sees only public members, a call from a
/// subclass context (`Protected`) also sees protected ones, and a call from
/// inside the defining scope (`Private`) sees everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Check whether a caller at this level may see a member with `member` visibility.
    pub fn admits(self, member: Visibility) -> bool {
        member <= self
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        })
    }
}

/// Operators that dispatch to guest-defined members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Compare,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseOr,
    ExclusiveOr,
    Index,
    IndexAssign,
    Negate,
    UnaryPlus,
    OnesComplement,
    Not,
}

impl OperatorKind {
    /// The guest member name implementing this operator.
    pub fn member_name(self) -> &'static str {
        match self {
            OperatorKind::Add => "+",
            OperatorKind::Subtract => "-",
            OperatorKind::Multiply => "*",
            OperatorKind::Divide => "/",
            OperatorKind::Modulo => "%",
            OperatorKind::Power => "**",
            OperatorKind::Equal => "==",
            OperatorKind::NotEqual => "!=",
            OperatorKind::LessThan => "<",
            OperatorKind::LessThanOrEqual => "<=",
            OperatorKind::GreaterThan => ">",
            OperatorKind::GreaterThanOrEqual => ">=",
            OperatorKind::Compare => "<=>",
            OperatorKind::LeftShift => "<<",
            OperatorKind::RightShift => ">>",
            OperatorKind::BitwiseAnd => "&",
            OperatorKind::BitwiseOr => "|",
            OperatorKind::ExclusiveOr => "^",
            OperatorKind::Index => "[]",
            OperatorKind::IndexAssign => "[]=",
            OperatorKind::Negate => "-@",
            OperatorKind::UnaryPlus => "+@",
            OperatorKind::OnesComplement => "~",
            OperatorKind::Not => "!",
        }
    }

    /// Number of operands besides the receiver, or `None` when variable.
    pub fn operand_count(self) -> Option<usize> {
        match self {
            OperatorKind::Negate
            | OperatorKind::UnaryPlus
            | OperatorKind::OnesComplement
            | OperatorKind::Not => Some(0),
            OperatorKind::Index | OperatorKind::IndexAssign => None,
            _ => Some(1),
        }
    }

    /// Map a guest operator name back to its kind.
    pub fn from_member_name(name: &str) -> Option<Self> {
        ALL_OPERATORS
            .iter()
            .copied()
            .find(|op| op.member_name() == name)
    }
}

const ALL_OPERATORS: [OperatorKind; 24] = [
    OperatorKind::Add,
    OperatorKind::Subtract,
    OperatorKind::Multiply,
    OperatorKind::Divide,
    OperatorKind::Modulo,
    OperatorKind::Power,
    OperatorKind::Equal,
    OperatorKind::NotEqual,
    OperatorKind::LessThan,
    OperatorKind::LessThanOrEqual,
    OperatorKind::GreaterThan,
    OperatorKind::GreaterThanOrEqual,
    OperatorKind::Compare,
    OperatorKind::LeftShift,
    OperatorKind::RightShift,
    OperatorKind::BitwiseAnd,
    OperatorKind::BitwiseOr,
    OperatorKind::ExclusiveOr,
    OperatorKind::Index,
    OperatorKind::IndexAssign,
    OperatorKind::Negate,
    OperatorKind::UnaryPlus,
    OperatorKind::OnesComplement,
    OperatorKind::Not,
];

/// Implicit conversion protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    Integer,
    Float,
    String,
    Array,
    Symbol,
}

impl ConversionKind {
    /// The guest method implementing the conversion protocol.
    pub fn protocol_method(self) -> &'static str {
        match self {
            ConversionKind::Integer => "to_int",
            ConversionKind::Float => "to_f",
            ConversionKind::String => "to_str",
            ConversionKind::Array => "to_ary",
            ConversionKind::Symbol => "to_sym",
        }
    }

    /// Human-readable target name used in conversion errors.
    pub fn target_name(self) -> &'static str {
        match self {
            ConversionKind::Integer => "Integer",
            ConversionKind::Float => "Float",
            ConversionKind::String => "String",
            ConversionKind::Array => "Array",
            ConversionKind::Symbol => "Symbol",
        }
    }
}

/// The operation performed by a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Method invocation.
    Call { name: Arc<str> },
    /// Construction; the receiver is the type object.
    CreateInstance,
    /// Member read.
    GetMember { name: Arc<str> },
    /// Member write; the single argument is the new value.
    SetMember { name: Arc<str> },
    /// Member removal.
    DeleteMember { name: Arc<str> },
    /// Operator application; operands are the arguments.
    Operator(OperatorKind),
    /// Protocol conversion of the receiver; a receiver without the
    /// protocol method is a type error.
    Convert(ConversionKind),
    /// Protocol conversion that yields nil when the receiver has no
    /// protocol method.
    TryConvert(ConversionKind),
}

/// Static argument-list shape of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallSignature {
    /// Number of syntactic arguments (a splat counts as one).
    pub argc: usize,
    /// The last syntactic argument is splatted (`f(a, *rest)`).
    pub splat: bool,
}

/// The full static description of a call site's operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationDescriptor {
    /// The operation.
    pub kind: OperationKind,
    /// Syntactic argument shape.
    pub signature: CallSignature,
    /// Visibility level of the calling context.
    pub caller: Visibility,
    /// Explicit generic arguments (`f<Int>(x)`).
    pub type_args: Arc<[TypeRef]>,
}

impl OperationDescriptor {
    fn new(kind: OperationKind, argc: usize) -> Self {
        Self {
            kind,
            signature: CallSignature { argc, splat: false },
            caller: Visibility::Public,
            type_args: Arc::from(Vec::new()),
        }
    }

    /// A method call with `argc` arguments.
    pub fn call(name: &str, argc: usize) -> Self {
        Self::new(OperationKind::Call { name: Arc::from(name) }, argc)
    }

    /// Construction with `argc` constructor arguments.
    pub fn create_instance(argc: usize) -> Self {
        Self::new(OperationKind::CreateInstance, argc)
    }

    pub fn get_member(name: &str) -> Self {
        Self::new(OperationKind::GetMember { name: Arc::from(name) }, 0)
    }

    pub fn set_member(name: &str) -> Self {
        Self::new(OperationKind::SetMember { name: Arc::from(name) }, 1)
    }

    pub fn delete_member(name: &str) -> Self {
        Self::new(OperationKind::DeleteMember { name: Arc::from(name) }, 0)
    }

    /// Operator application; the operand count follows the operator.
    pub fn operator(op: OperatorKind) -> Self {
        Self::new(OperationKind::Operator(op), op.operand_count().unwrap_or(1))
    }

    /// Operator application with an explicit operand count (for `[]`/`[]=`).
    pub fn operator_with_operands(op: OperatorKind, operands: usize) -> Self {
        Self::new(OperationKind::Operator(op), operands)
    }

    pub fn convert(kind: ConversionKind) -> Self {
        Self::new(OperationKind::Convert(kind), 0)
    }

    pub fn try_convert(kind: ConversionKind) -> Self {
        Self::new(OperationKind::TryConvert(kind), 0)
    }

    /// Mark the last argument as splatted.
    pub fn with_splat(mut self) -> Self {
        self.signature.splat = true;
        self
    }

    /// Set the caller's visibility level.
    pub fn with_caller(mut self, caller: Visibility) -> Self {
        self.caller = caller;
        self
    }

    /// Supply explicit generic arguments.
    pub fn with_type_args(mut self, type_args: Vec<TypeRef>) -> Self {
        self.type_args = Arc::from(type_args);
        self
    }

    /// The member name discovery looks for.
    pub fn member_name(&self) -> &str {
        match &self.kind {
            OperationKind::Call { name }
            | OperationKind::GetMember { name }
            | OperationKind::SetMember { name }
            | OperationKind::DeleteMember { name } => name,
            OperationKind::CreateInstance => "new",
            OperationKind::Operator(op) => op.member_name(),
            OperationKind::Convert(kind) | OperationKind::TryConvert(kind) => kind.protocol_method(),
        }
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperationKind::Call { name } => write!(f, "call `{}`", name)?,
            OperationKind::CreateInstance => write!(f, "new")?,
            OperationKind::GetMember { name } => write!(f, "get `{}`", name)?,
            OperationKind::SetMember { name } => write!(f, "set `{}`", name)?,
            OperationKind::DeleteMember { name } => write!(f, "delete `{}`", name)?,
            OperationKind::Operator(op) => write!(f, "operator `{}`", op.member_name())?,
            OperationKind::Convert(kind) => write!(f, "convert to {}", kind.target_name())?,
            OperationKind::TryConvert(kind) => write!(f, "try convert to {}", kind.target_name())?,
        }
        write!(f, "/{}", self.signature.argc)?;
        if self.signature.splat {
            write!(f, "*")?;
        }
        Ok(())
    }
}
