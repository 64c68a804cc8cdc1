//! Factory configuration, parsed from TOML.
//!
//! Only parsing lives here; reading the file is the binary's job.
//!
//! ```toml
//! identity = "5a1d0c"
//!
//! [properties]
//! "portal.loopback.queue_capacity" = "256"
//!
//! [attributes]
//! logging = true
//! ```

use serde::{Deserialize, Serialize};

use crate::{Attributes, KeyId, PortalError, Properties, Result};

/// Everything a factory needs to produce portals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalConfig {
    /// Hex key identity stamped into every portal's attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<KeyId>,

    /// Property store shared by every portal the factory creates.
    #[serde(default)]
    pub properties: Properties,

    /// Template for each portal's initial attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

impl PortalConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`PortalError::Configuration`] carrying the parser's message, including
    /// for unknown top-level keys and malformed identities.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PortalError::configuration(e.to_string()))
    }

    /// Renders this configuration as TOML.
    ///
    /// # Errors
    ///
    /// [`PortalError::Configuration`] if an extension value has no TOML form
    /// (e.g. JSON `null`).
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PortalError::configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let config = PortalConfig::from_toml_str(
            r#"
            identity = "5a1d0c"

            [properties]
            "portal.loopback.queue_capacity" = "256"

            [attributes]
            logging = true

            [attributes.extensions]
            tier = "edge"
            "#,
        )
        .unwrap();

        assert_eq!(config.identity, KeyId::from_hex("5a1d0c"));
        assert_eq!(
            config.properties.get("portal.loopback.queue_capacity"),
            Some("256")
        );
        assert!(config.attributes.logging);
        assert_eq!(config.attributes.extension("tier"), Some(&serde_json::Value::from("edge")));
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(PortalConfig::from_toml_str("").unwrap(), PortalConfig::default());
    }

    #[test]
    fn malformed_identity_is_a_configuration_error() {
        let err = PortalConfig::from_toml_str(r#"identity = "not hex""#).unwrap_err();
        assert!(matches!(err, PortalError::Configuration { .. }), "{err}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PortalConfig::from_toml_str("identiy = \"00\"").is_err());
    }

    #[test]
    fn renders_back_to_toml() {
        let config = PortalConfig {
            identity: KeyId::from_hex("01"),
            properties: Properties::new().with("a", "1"),
            attributes: Attributes::default(),
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PortalConfig::from_toml_str(&text).unwrap(), config);
    }
}
