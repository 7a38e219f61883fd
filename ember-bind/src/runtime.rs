//! The binder runtime.
//!
//! A [`Runtime`] ties the pieces together for one host: it owns the call
//! sites, answers `dispatch` from their caches, and on a miss runs
//! discovery, resolution and rule compilation before executing the new
//! rule. Nothing here is process-global; two runtimes share no state.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::BinderConfig;
use crate::discovery::{discover, CandidateSet, Discovered, METHOD_MISSING};
use crate::candidate::Arity;
use crate::error::{BindingError, BindingErrorKind, DispatchError, ExpectedArity, HostError, InternalError};
use crate::host::HostObjectModel;
use crate::late_bound::late_bind;
use crate::operation::{ConversionKind, OperationDescriptor, OperationKind};
use crate::rescue::{self, HandlerMatch, MatcherSpec};
use crate::resolve::{ArgSlot, BoundCandidate, OverloadResolver, ResolutionOutcome};
use crate::rule::{Action, Confidence, Invocation, Rule, RuleCompiler};
use crate::shape::Shape;
use crate::site::{CallSite, CallSiteId, CallSiteRegistry};
use crate::value::Value;

/// A binder instance for one host object model.
pub struct Runtime {
    host: Arc<dyn HostObjectModel>,
    config: BinderConfig,
    sites: CallSiteRegistry,
    compiler: RuleCompiler,
}

impl Runtime {
    pub fn new(host: Arc<dyn HostObjectModel>, config: BinderConfig) -> Self {
        let sites = CallSiteRegistry::new(config.cache.clone());
        let compiler = RuleCompiler::new(config.resolution.widen_guards);
        Self {
            host,
            config,
            sites,
            compiler,
        }
    }

    pub fn host(&self) -> &dyn HostObjectModel {
        self.host.as_ref()
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    pub fn sites(&self) -> &CallSiteRegistry {
        &self.sites
    }

    /// The call site for `id`, created on first use.
    pub fn site(&self, id: CallSiteId, descriptor: &OperationDescriptor) -> Result<Arc<CallSite>, InternalError> {
        self.sites.get_or_create(id, descriptor)
    }

    /// Perform the operation of call site `id`.
    pub fn dispatch(
        &self,
        id: CallSiteId,
        descriptor: &OperationDescriptor,
        receiver: &Value,
        args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        let site = self.site(id, descriptor)?;
        self.dispatch_at(&site, receiver, args)
    }

    /// Perform the operation of an already-resolved call site handle.
    pub fn dispatch_at(&self, site: &CallSite, receiver: &Value, args: Vec<Value>) -> Result<Value, DispatchError> {
        if let Some(fault) = site.fault() {
            return Err(InternalError::SiteFaulted {
                site: site.id(),
                reason: fault.to_string(),
            }
            .into());
        }

        let args = expand_args(site.descriptor(), args);
        let receiver_shape = self.host.shape_of(receiver);
        let arg_shapes: Vec<Shape> = args.iter().map(|arg| self.host.shape_of(arg)).collect();

        if let Some(cached) = site.lookup(&receiver_shape, &arg_shapes) {
            site.stats().record_hit();
            trace!(site = %site.id(), "cache hit");
            if self.config.diagnostics.verify_guards {
                self.verify(site, &cached.rule, receiver, &receiver_shape, &arg_shapes)?;
            }
            return self.execute(site, &cached.rule, receiver, args);
        }

        site.stats().record_miss();
        debug!(site = %site.id(), tier = %site.tier(), receiver = ?receiver_shape, "cache miss");

        let rule = match self.bind_shapes(site.descriptor(), receiver, &receiver_shape, &arg_shapes) {
            Ok(rule) => rule,
            Err(err) => {
                site.stats().record_failure();
                debug!(site = %site.id(), error = %err, "binding failed");
                return Err(err.into());
            }
        };

        if rule.is_cacheable() {
            site.stats().record_resolution();
            let installed = site.install(rule.clone(), &receiver_shape, &arg_shapes);
            debug!(site = %site.id(), tier = %site.tier(), ?installed, "rule offered to cache");
        } else {
            site.stats().record_late_bound();
        }
        self.execute(site, &rule, receiver, args)
    }

    /// Bind an operation without consulting or filling any cache.
    pub fn bind(&self, descriptor: &OperationDescriptor, receiver: &Value, args: &[Value]) -> Result<Rule, BindingError> {
        let args = expand_args(descriptor, args.to_vec());
        let receiver_shape = self.host.shape_of(receiver);
        let arg_shapes: Vec<Shape> = args.iter().map(|arg| self.host.shape_of(arg)).collect();
        self.bind_shapes(descriptor, receiver, &receiver_shape, &arg_shapes)
    }

    /// Decide whether a rescue clause handles `raised`.
    pub fn match_handler<E, F>(
        &self,
        raised: &Value,
        spec: &MatcherSpec<E>,
        eval: F,
    ) -> Result<Option<HandlerMatch>, DispatchError>
    where
        F: FnMut(&E) -> Result<Value, HostError>,
    {
        rescue::match_handler(self.host.as_ref(), raised, spec, eval)
    }

    fn bind_shapes(
        &self,
        descriptor: &OperationDescriptor,
        receiver: &Value,
        receiver_shape: &Shape,
        arg_shapes: &[Shape],
    ) -> Result<Rule, BindingError> {
        match descriptor.kind {
            OperationKind::Convert(kind) => {
                return self.bind_conversion(descriptor, kind, true, receiver, receiver_shape, arg_shapes)
            }
            OperationKind::TryConvert(kind) => {
                return self.bind_conversion(descriptor, kind, false, receiver, receiver_shape, arg_shapes)
            }
            _ => {}
        }

        let method_missing = self.config.resolution.method_missing;
        match discover(self.host.as_ref(), descriptor, receiver_shape, method_missing) {
            Discovered::LateBound => late_bind(self.host.as_ref(), descriptor, receiver, receiver_shape, arg_shapes),
            Discovered::Candidates(set) => {
                let bound = self.resolve_set(descriptor, &set, receiver_shape, arg_shapes)?;
                Ok(self.compiler.compile(descriptor, &bound, &set, receiver_shape, arg_shapes))
            }
        }
    }

    /// Bind a protocol conversion. A `strict` conversion of a receiver
    /// without the protocol method is a type error; otherwise it yields nil.
    fn bind_conversion(
        &self,
        descriptor: &OperationDescriptor,
        kind: ConversionKind,
        strict: bool,
        receiver: &Value,
        receiver_shape: &Shape,
        arg_shapes: &[Shape],
    ) -> Result<Rule, BindingError> {
        if !arg_shapes.is_empty() {
            return Err(BindingError::new(
                descriptor.clone(),
                arg_shapes.to_vec(),
                BindingErrorKind::Arity {
                    given: arg_shapes.len(),
                    expected: ExpectedArity::new([Arity::fixed(0)]),
                },
            ));
        }

        let host = self.host.as_ref();
        let target = host.conversion_target(kind);
        if host.is_a(receiver_shape, target) {
            return Ok(self.compiler.compile_identity(receiver_shape));
        }

        match discover(host, descriptor, receiver_shape, false) {
            Discovered::LateBound => match late_bind(host, descriptor, receiver, receiver_shape, &[]) {
                // External shapes are shared, so the nil rule holds for this call only.
                Err(err) if !strict && matches!(err.kind, BindingErrorKind::UndefinedMember { .. }) => Ok(Rule {
                    confidence: Confidence::Low,
                    ..self.compiler.compile_nil(receiver_shape)
                }),
                bound => bound,
            },
            Discovered::Candidates(set) if set.visible.is_empty() && !strict => {
                Ok(self.compiler.compile_nil(receiver_shape))
            }
            Discovered::Candidates(set) if set.visible.is_empty() => Err(BindingError::new(
                descriptor.clone(),
                Vec::new(),
                BindingErrorKind::TypeError {
                    message: format!(
                        "no implicit conversion of {} into {}",
                        host.shape_name(receiver_shape),
                        kind.target_name()
                    ),
                },
            )),
            Discovered::Candidates(set) => {
                let bound = self.resolve_set(descriptor, &set, receiver_shape, &[])?;
                Ok(self.compiler.compile_conversion(kind, target, &bound, receiver_shape))
            }
        }
    }

    /// Resolve discovered candidates, turning every failure into a binding error.
    fn resolve_set(
        &self,
        descriptor: &OperationDescriptor,
        set: &CandidateSet,
        receiver_shape: &Shape,
        arg_shapes: &[Shape],
    ) -> Result<BoundCandidate, BindingError> {
        let host = self.host.as_ref();
        let name = descriptor.member_name();
        let fail = |kind| BindingError::new(descriptor.clone(), arg_shapes.to_vec(), kind);

        if set.visible.is_empty() {
            return Err(fail(match set.hidden.first() {
                Some(hidden) => BindingErrorKind::Visibility {
                    name: name.to_string(),
                    visibility: hidden.visibility,
                    receiver: host.shape_name(receiver_shape),
                },
                None => BindingErrorKind::UndefinedMember {
                    name: name.to_string(),
                    receiver: host.shape_name(receiver_shape),
                },
            }));
        }

        // method_missing receives the requested name as a leading symbol.
        let (resolved_name, shapes): (&str, Cow<'_, [Shape]>) = if set.via_method_missing {
            let mut shapes = Vec::with_capacity(arg_shapes.len() + 1);
            shapes.push(host.shape_of(&Value::symbol(name)));
            shapes.extend_from_slice(arg_shapes);
            (METHOD_MISSING, Cow::Owned(shapes))
        } else {
            (name, Cow::Borrowed(arg_shapes))
        };

        let resolver = OverloadResolver::new(host);
        match resolver.resolve(resolved_name, &set.visible, &shapes, &descriptor.type_args) {
            ResolutionOutcome::Resolved(bound) => Ok(bound),
            ResolutionOutcome::NoMatch(no_match) => {
                let hidden = set
                    .hidden
                    .iter()
                    .find(|c| resolver.bind_candidate(c, arg_shapes, &descriptor.type_args).is_ok());
                Err(fail(match hidden {
                    Some(hidden) => BindingErrorKind::Visibility {
                        name: name.to_string(),
                        visibility: hidden.visibility,
                        receiver: host.shape_name(receiver_shape),
                    },
                    None => no_match.classify(host),
                }))
            }
            ResolutionOutcome::Ambiguous(ambiguity) => Err(fail(ambiguity.to_error_kind(host))),
        }
    }

    /// Re-bind a cache hit and fault the site if the cached rule disagrees.
    fn verify(
        &self,
        site: &CallSite,
        cached: &Rule,
        receiver: &Value,
        receiver_shape: &Shape,
        arg_shapes: &[Shape],
    ) -> Result<(), DispatchError> {
        let fresh = self.bind_shapes(site.descriptor(), receiver, receiver_shape, arg_shapes);
        let fresh = match fresh {
            Ok(rule) if rule.action == cached.action => return Ok(()),
            Ok(rule) => format!("{:?}", rule.action),
            Err(err) => err.to_string(),
        };

        let error = InternalError::UnsoundGuard {
            site: site.id(),
            cached: format!("{:?}", cached.action),
            fresh,
        };
        site.record_fault(error.clone());
        Err(error.into())
    }

    fn execute(&self, site: &CallSite, rule: &Rule, receiver: &Value, args: Vec<Value>) -> Result<Value, DispatchError> {
        match &rule.action {
            Action::Identity => Ok(receiver.clone()),
            Action::Nil => Ok(Value::Nil),
            Action::Invoke(invocation) => self.invoke(site, invocation, receiver, args),
            Action::Convert {
                invocation,
                kind,
                target,
            } => {
                let result = self.invoke(site, invocation, receiver, args)?;
                let host = self.host.as_ref();
                let result_shape = host.shape_of(&result);
                if host.is_a(&result_shape, *target) {
                    return Ok(result);
                }
                let receiver_name = host.shape_name(&host.shape_of(receiver));
                Err(BindingError::type_error(
                    site.descriptor().clone(),
                    format!(
                        "can't convert {} to {} ({}#{} gives {})",
                        receiver_name,
                        kind.target_name(),
                        receiver_name,
                        kind.protocol_method(),
                        host.shape_name(&result_shape)
                    ),
                )
                .into())
            }
            Action::LateBound(member) => Ok(self.host.invoke_external(member, receiver, args)?),
        }
    }

    fn invoke(
        &self,
        site: &CallSite,
        invocation: &Invocation,
        receiver: &Value,
        args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        if args.len() != invocation.expected_args() {
            let error = InternalError::ActionMismatch {
                site: site.id(),
                expected: invocation.expected_args().to_string(),
                given: args.len(),
            };
            warn!(site = %site.id(), %error, "action does not fit its arguments");
            site.record_fault(error.clone());
            return Err(error.into());
        }

        let host = self.host.as_ref();
        let mut all = Vec::with_capacity(invocation.mapping.len());
        if let Some(name) = &invocation.prepend_name {
            all.push(Value::Symbol(name.clone()));
        }
        all.extend(args);

        let mut params = Vec::with_capacity(invocation.fixed_params + 1);
        let mut rest = Vec::new();
        for ((value, slot), conversion) in all.into_iter().zip(&invocation.mapping).zip(&invocation.conversions) {
            let value = match conversion {
                Some(conversion) => host.convert_value(value, conversion.target, conversion.rank)?,
                None => value,
            };
            match slot {
                ArgSlot::Param(_) => params.push(value),
                ArgSlot::Rest(_) => rest.push(value),
            }
        }
        // Omitted optional parameters receive nil, ahead of any collected rest.
        params.resize(invocation.fixed_params, Value::Nil);
        if invocation.collects_rest {
            params.push(Value::array(rest));
        }

        Ok(host.invoke(invocation.method, receiver, params)?)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("sites", &self.sites.len())
            .finish()
    }
}

/// Flatten a trailing splat argument: arrays spread, nil vanishes, anything
/// else is passed as a single argument.
fn expand_args(descriptor: &OperationDescriptor, mut args: Vec<Value>) -> Vec<Value> {
    if !descriptor.signature.splat {
        return args;
    }
    match args.pop() {
        Some(Value::Array(items)) => args.extend(items.iter().cloned()),
        Some(Value::Nil) | None => {}
        Some(other) => args.push(other),
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_args() {
        let plain = OperationDescriptor::call("f", 2);
        let splat = OperationDescriptor::call("f", 2).with_splat();
        let list = Value::array(vec![Value::Int(2), Value::Int(3)]);

        assert_eq!(expand_args(&plain, vec![Value::Int(1), list.clone()]).len(), 2);
        assert_eq!(
            expand_args(&splat, vec![Value::Int(1), list]),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        assert_eq!(expand_args(&splat, vec![Value::Int(1), Value::Nil]), vec![Value::Int(1)]);
        assert_eq!(
            expand_args(&splat, vec![Value::Int(1), Value::Int(9)]),
            vec![Value::Int(1), Value::Int(9)]
        );
    }
}
