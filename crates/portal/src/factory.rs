//! The factory: identity and properties shared by the portals it creates.
//!
//! A factory does not choose a backend by itself. Callers hand it a
//! [`PortalStack`] (or a constructor for one) and it binds that stack into a
//! [`Portal`] stamped with the factory's identity and property store.

use std::sync::Arc;

use tracing::info;

use crate::{
    Attributes, BindingBuilder, KeyId, Portal, PortalConfig, PortalStack, Properties, Result,
};

/// Well-known property names.
pub mod property {
    /// Maximum messages the loopback stack queues before `send` blocks.
    pub const LOOPBACK_QUEUE_CAPACITY: &str = "portal.loopback.queue_capacity";

    /// Default receive timeout, in milliseconds, used by callers that do not
    /// pass one explicitly. Absent means wait forever.
    pub const RECEIVE_TIMEOUT_MS: &str = "portal.receive_timeout_ms";
}

/// Produces portals that share one identity and one property store.
#[derive(Debug, Clone)]
pub struct PortalFactory {
    key_id: Option<KeyId>,
    properties: Arc<Properties>,
    attributes: Attributes,
}

impl PortalFactory {
    /// A factory with `key_id` and `properties`, and default attributes.
    pub fn new(key_id: Option<KeyId>, properties: Properties) -> Self {
        Self {
            key_id,
            properties: Arc::new(properties),
            attributes: Attributes::default(),
        }
    }

    /// A factory built from parsed configuration.
    pub fn from_config(config: PortalConfig) -> Self {
        info!(
            identity = ?config.identity.as_ref().map(ToString::to_string),
            properties = config.properties.len(),
            "portal factory configured"
        );
        Self {
            key_id: config.identity,
            properties: Arc::new(config.properties),
            attributes: config.attributes,
        }
    }

    /// Replaces the attributes template used for new portals.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// The identity stamped into new portals.
    pub fn key_id(&self) -> Option<&KeyId> {
        self.key_id.as_ref()
    }

    /// The shared property store.
    pub fn properties(&self) -> &Arc<Properties> {
        &self.properties
    }

    /// Initial attributes for a new portal: the template, with the factory's
    /// identity when it has one.
    pub fn attributes(&self) -> Attributes {
        let mut attributes = self.attributes.clone();
        if self.key_id.is_some() {
            attributes.key_id.clone_from(&self.key_id);
        }
        attributes
    }

    /// Binds `stack` into a new portal.
    pub fn create_portal(&self, stack: impl PortalStack) -> Portal {
        Portal::new(stack, self.attributes(), Arc::clone(&self.properties))
    }

    /// Builds a stack from the factory's properties, then binds it.
    ///
    /// # Errors
    ///
    /// Whatever `construct` returns; no portal is created in that case.
    pub fn create_portal_with<B, E>(
        &self,
        construct: impl FnOnce(&Properties) -> std::result::Result<B, E>,
    ) -> std::result::Result<Portal, E>
    where
        B: PortalStack,
    {
        let stack = construct(&self.properties)?;
        Ok(self.create_portal(stack))
    }

    /// Validates a slot-table binding and wraps it in a new portal.
    ///
    /// # Errors
    ///
    /// [`crate::PortalError::MissingOperation`] if any slot is empty.
    pub fn create_bound_portal<S: Send + Sync + 'static>(
        &self,
        binding: BindingBuilder<S>,
    ) -> Result<Portal> {
        Portal::create(binding, self.attributes(), Arc::clone(&self.properties))
    }
}
