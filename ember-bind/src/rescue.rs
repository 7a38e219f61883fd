//! Exception handler matching.
//!
//! Decides whether a `rescue` clause applies to a raised value. Matcher
//! expressions are arbitrary guest code, so the order they are evaluated in
//! is observable:
//!
//! - explicit matchers are evaluated left to right, each exactly once, and
//!   evaluation stops at the first matcher the raised value is an instance of
//! - a splatted collection is evaluated only after every explicit matcher
//!   failed; all of its elements must be types before any is tested
//! - a clause with no matchers catches the host's standard error type only

use std::sync::Arc;

use tracing::debug;

use crate::error::{BindingError, BindingErrorKind, DispatchError, HostError};
use crate::host::HostObjectModel;
use crate::operation::OperationDescriptor;
use crate::shape::TypeRef;
use crate::value::Value;

/// The case-equality operator a rescue clause applies to each matcher.
const CASE_EQUALITY: &str = "===";

/// The matchers of one rescue clause, as unevaluated expressions `E`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherSpec<E> {
    /// Matchers listed explicitly, in source order.
    pub explicit: Vec<E>,
    /// A trailing `*collection` matcher.
    pub splat: Option<E>,
    /// Variable receiving the raised value (`rescue Foo => e`).
    pub binding: Option<Arc<str>>,
}

impl<E> MatcherSpec<E> {
    /// A clause with no matchers.
    pub fn bare() -> Self {
        Self {
            explicit: Vec::new(),
            splat: None,
            binding: None,
        }
    }

    pub fn new(explicit: Vec<E>) -> Self {
        Self {
            explicit,
            ..Self::bare()
        }
    }

    pub fn with_splat(mut self, splat: E) -> Self {
        self.splat = Some(splat);
        self
    }

    pub fn bind_to(mut self, name: &str) -> Self {
        self.binding = Some(Arc::from(name));
        self
    }

    pub fn is_bare(&self) -> bool {
        self.explicit.is_empty() && self.splat.is_none()
    }
}

/// Which matcher accepted the raised value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchedBy {
    /// The clause had no matchers.
    Bare,
    /// The explicit matcher at this index.
    Explicit(usize),
    /// The element at this index of the splatted collection.
    Splat(usize),
}

/// A successful handler match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerMatch {
    /// The matcher type the raised value is an instance of.
    pub matched_type: TypeRef,
    /// Which matcher it was.
    pub by: MatchedBy,
    /// Variable to bind the raised value to, if any.
    pub binding: Option<Arc<str>>,
}

/// Matching context for one raised value.
struct Matcher<'a> {
    host: &'a dyn HostObjectModel,
    raised: &'a Value,
}

impl Matcher<'_> {
    fn type_error(&self, message: String) -> DispatchError {
        let descriptor = OperationDescriptor::call(CASE_EQUALITY, 1);
        let shape = self.host.shape_of(self.raised);
        BindingError::new(descriptor, vec![shape], BindingErrorKind::TypeError { message }).into()
    }

    fn expect_type(&self, value: &Value) -> Result<TypeRef, DispatchError> {
        value
            .as_type()
            .ok_or_else(|| self.type_error("class or module required for rescue clause".to_string()))
    }

    /// Expand a splatted matcher, validating every element before any test.
    fn expand(&self, collection: &Value) -> Result<Vec<TypeRef>, DispatchError> {
        match collection {
            Value::Array(items) => items.iter().map(|item| self.expect_type(item)).collect(),
            Value::Type(ty) => Ok(vec![*ty]),
            _ => Err(self.type_error(format!(
                "splatted rescue matcher must be a collection of classes, got {}",
                self.host.shape_name(&self.host.shape_of(collection))
            ))),
        }
    }
}

/// Decide whether the clause described by `spec` handles `raised`.
///
/// `eval` evaluates one matcher expression; it is called at most once per
/// expression, left to right, and never after a match is found.
pub fn match_handler<E, F>(
    host: &dyn HostObjectModel,
    raised: &Value,
    spec: &MatcherSpec<E>,
    mut eval: F,
) -> Result<Option<HandlerMatch>, DispatchError>
where
    F: FnMut(&E) -> Result<Value, HostError>,
{
    let matcher = Matcher { host, raised };
    let shape = host.shape_of(raised);
    let found = |matched_type: TypeRef, by: MatchedBy| -> Result<Option<HandlerMatch>, DispatchError> {
        debug!(raised = ?shape, matched = %host.type_name(matched_type), ?by, "rescue matched");
        Ok(Some(HandlerMatch {
            matched_type,
            by,
            binding: spec.binding.clone(),
        }))
    };

    if spec.is_bare() {
        let standard = host.standard_error();
        return if host.is_a(&shape, standard) {
            found(standard, MatchedBy::Bare)
        } else {
            Ok(None)
        };
    }

    for (index, expr) in spec.explicit.iter().enumerate() {
        let ty = matcher.expect_type(&eval(expr)?)?;
        if host.is_a(&shape, ty) {
            return found(ty, MatchedBy::Explicit(index));
        }
    }

    if let Some(expr) = &spec.splat {
        let types = matcher.expand(&eval(expr)?)?;
        if let Some((index, ty)) = types.into_iter().enumerate().find(|(_, ty)| host.is_a(&shape, *ty)) {
            return found(ty, MatchedBy::Splat(index));
        }
    }

    debug!(raised = ?shape, "rescue clause does not apply");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ClassTable, Instance};
    use pretty_assertions::assert_eq;

    fn raise(ty: TypeRef) -> Value {
        Instance::new(ty).into_value()
    }

    /// Evaluates matcher values in place, recording the evaluation order.
    fn recording(log: &mut Vec<usize>) -> impl FnMut(&(usize, Value)) -> Result<Value, HostError> + '_ {
        move |(id, value)| {
            log.push(*id);
            Ok(value.clone())
        }
    }

    #[test]
    fn test_bare_handler_catches_standard_errors_only() {
        let table = ClassTable::new();
        let b = *table.builtins();
        let spec: MatcherSpec<(usize, Value)> = MatcherSpec::bare();

        let caught = match_handler(&table, &raise(b.type_error), &spec, |_| unreachable!()).unwrap();
        assert_eq!(caught.map(|m| m.by), Some(MatchedBy::Bare));

        let missed = match_handler(&table, &raise(b.signal_exception), &spec, |_| unreachable!()).unwrap();
        assert_eq!(missed, None);
    }

    #[test]
    fn test_short_circuit_on_first_match() {
        let table = ClassTable::new();
        let b = *table.builtins();
        let spec = MatcherSpec::new(vec![
            (0, Value::Type(b.argument_error)),
            (1, Value::Type(b.standard_error)),
            (2, Value::Type(b.exception)),
        ])
        .bind_to("e");

        let mut log = Vec::new();
        let result = match_handler(&table, &raise(b.type_error), &spec, recording(&mut log)).unwrap();

        assert_eq!(
            result,
            Some(HandlerMatch {
                matched_type: b.standard_error,
                by: MatchedBy::Explicit(1),
                binding: Some(Arc::from("e")),
            })
        );
        assert_eq!(log, vec![0, 1]);
    }

    #[test]
    fn test_splat_evaluated_after_explicit() {
        let table = ClassTable::new();
        let b = *table.builtins();
        let collection = Value::array(vec![
            Value::Type(b.argument_error),
            Value::Type(b.no_method_error),
            Value::Type(b.type_error),
        ]);
        let spec = MatcherSpec::new(vec![(0, Value::Type(b.runtime_error))]).with_splat((1, collection));

        let mut log = Vec::new();
        let result = match_handler(&table, &raise(b.type_error), &spec, recording(&mut log)).unwrap();
        assert_eq!(result.map(|m| m.by), Some(MatchedBy::Splat(2)));
        assert_eq!(log, vec![0, 1]);

        let mut log = Vec::new();
        let early = match_handler(&table, &raise(b.runtime_error), &spec, recording(&mut log)).unwrap();
        assert_eq!(early.map(|m| m.by), Some(MatchedBy::Explicit(0)));
        assert_eq!(log, vec![0]);
    }

    #[test]
    fn test_splat_miss_falls_through() {
        let table = ClassTable::new();
        let b = *table.builtins();
        let spec = MatcherSpec::bare().with_splat((0, Value::array(vec![Value::Type(b.argument_error)])));

        let result = match_handler(&table, &raise(b.type_error), &spec, recording(&mut Vec::new())).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_non_type_in_splat_is_type_error() {
        let table = ClassTable::new();
        let b = *table.builtins();
        // The matching type comes first, but the collection is validated whole.
        let collection = Value::array(vec![Value::Type(b.type_error), Value::Int(3)]);
        let spec = MatcherSpec::bare().with_splat((0, collection));

        let err = match_handler(&table, &raise(b.type_error), &spec, recording(&mut Vec::new())).unwrap_err();
        let binding = err.as_binding().unwrap();
        assert!(matches!(binding.kind, BindingErrorKind::TypeError { .. }));
    }

    #[test]
    fn test_non_type_explicit_matcher_is_type_error() {
        let table = ClassTable::new();
        let b = *table.builtins();
        let spec = MatcherSpec::new(vec![(0, Value::str("oops")), (1, Value::Type(b.exception))]);

        let mut log = Vec::new();
        let err = match_handler(&table, &raise(b.type_error), &spec, recording(&mut log)).unwrap_err();
        assert_eq!(err.to_string(), "class or module required for rescue clause");
        assert_eq!(log, vec![0]);
    }

    #[test]
    fn test_matcher_evaluation_error_propagates() {
        let table = ClassTable::new();
        let b = *table.builtins();
        let spec = MatcherSpec::new(vec![0usize, 1]);

        let err = match_handler(&table, &raise(b.type_error), &spec, |i| {
            if *i == 0 {
                Err(HostError::Failed("boom".to_string()))
            } else {
                Ok(Value::Type(b.exception))
            }
        })
        .unwrap_err();
        assert!(matches!(err, DispatchError::Host(_)));
    }
}
