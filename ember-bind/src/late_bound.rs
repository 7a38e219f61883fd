//! Late binding for external objects.
//!
//! External receivers expose no member metadata, so nothing about them can
//! be resolved ahead of the call. The member is looked up by name each time
//! and the resulting rule is only good for the call that produced it.

use tracing::debug;

use crate::error::{BindingError, BindingErrorKind};
use crate::host::HostObjectModel;
use crate::operation::OperationDescriptor;
use crate::rule::{Action, Confidence, Guard, Rule};
use crate::shape::Shape;
use crate::value::Value;

/// Bind `descriptor` on an external receiver by name.
pub fn late_bind(
    host: &dyn HostObjectModel,
    descriptor: &OperationDescriptor,
    receiver: &Value,
    receiver_shape: &Shape,
    arg_shapes: &[Shape],
) -> Result<Rule, BindingError> {
    let name = descriptor.member_name();
    let Some(member) = host.external_lookup(receiver, name) else {
        debug!(op = %descriptor, "late-bound lookup failed");
        return Err(BindingError::new(
            descriptor.clone(),
            arg_shapes.to_vec(),
            BindingErrorKind::UndefinedMember {
                name: name.to_string(),
                receiver: host.shape_name(receiver_shape),
            },
        ));
    };

    debug!(op = %descriptor, token = member.token, "late-bound");
    Ok(Rule {
        guard: Guard::exact(receiver_shape, arg_shapes),
        action: Action::LateBound(member),
        confidence: Confidence::Low,
    })
}
