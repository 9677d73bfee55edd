//! Connector negotiation.
//!
//! The initiator's preferences travel as a `Properties` subtree; this picks
//! the first transport both sides support and fills in the documented
//! defaults for anything left unset, producing the tree that becomes
//! `ConnectorInfo.properties`.

use rtcomp_core::{Properties, Result, RtcError};

use crate::transport::TransportRegistry;

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Negotiate `requested` against the transports this side supports,
/// returning the finalized properties tree, or `PreconditionNotMet` if no
/// `interface_type` candidate is mutually supported.
pub fn negotiate(requested: &Properties, transports: &TransportRegistry) -> Result<Properties> {
    let mut chosen = requested.clone();

    let mut candidates = split_csv(&requested.get("dataport.interface_type"));
    if candidates.is_empty() {
        candidates.push("local".to_string());
    }
    let interface_type = candidates
        .into_iter()
        .find(|candidate| transports.supports(candidate))
        .ok_or_else(|| RtcError::precondition_not_met("no mutually supported interface_type"))?;
    chosen.set("dataport.interface_type", interface_type);

    if chosen.get("dataport.dataflow_type").is_empty() {
        chosen.set("dataport.dataflow_type", "push");
    }
    if chosen.get("dataport.subscription_type").is_empty() {
        chosen.set("dataport.subscription_type", "new");
    }
    if chosen.get("serializer.cdr.endian").is_empty() {
        chosen.set("serializer.cdr.endian", "little");
    }

    Ok(chosen)
}
