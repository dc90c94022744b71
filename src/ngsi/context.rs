//! Propagation of `Fiware-Service` / `Fiware-ServicePath` on the message.

use crate::model::{FiwareContext, Message};

/// Tenant scope a request is issued in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub service: String,
    pub service_path: String,
}

/// Resolve the scope for this invocation.
///
/// A value already on the message wins over the node default; missing
/// values are filled from the defaults and written back to the message.
pub fn resolve(
    msg: &mut Message,
    default_service: &str,
    default_service_path: &str,
) -> Scope {
    let context = msg.context.get_or_insert_with(FiwareContext::default);
    let service = context.fiware_service.get_or_insert_with(|| default_service.to_string()).clone();
    let service_path = context.fiware_service_path.get_or_insert_with(|| default_service_path.to_string()).clone();

    Scope {
        service,
        service_path,
    }
}

/// Overwrite the scope (and total count) on the outgoing message.
pub fn stamp(
    msg: &mut Message,
    scope: &Scope,
    total_count: Option<u64>,
) {
    let context = msg.context.get_or_insert_with(FiwareContext::default);
    context.fiware_service = Some(scope.service.clone());
    context.fiware_service_path = Some(scope.service_path.clone());
    context.fiware_total_count = total_count;
}
