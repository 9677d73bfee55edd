//! Connector snapshot metadata.

use rtcomp_core::Properties;

/// Immutable description of one active connection, handed to every listener
/// invocation on that connector. Produced once at connect time; negotiation
/// writes its chosen values into `properties` before the snapshot is frozen.
#[derive(Debug, Clone)]
pub struct ConnectorInfo {
    id: String,
    name: String,
    ports: Vec<String>,
    properties: Properties,
}

impl ConnectorInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ports: Vec<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ports,
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// `true` when the connector is configured to decode little-endian
    /// payloads (`serializer.cdr.endian`, default `little`).
    pub fn is_little_endian(&self) -> bool {
        let endian = self.properties.get("serializer.cdr.endian");
        endian.is_empty() || endian.eq_ignore_ascii_case("little")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_little_endian_when_unset() {
        let info = ConnectorInfo::new("c-1", "out:in", vec!["out".into(), "in".into()], Properties::new_root());
        assert!(info.is_little_endian());
    }

    #[test]
    fn honors_explicit_endian_property() {
        let mut props = Properties::new_root();
        props.set("serializer.cdr.endian", "big");
        let info = ConnectorInfo::new("c-1", "out:in", vec![], props);
        assert!(!info.is_little_endian());
    }
}
