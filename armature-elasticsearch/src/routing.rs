//! Routing resolution.

use std::fmt;

/// Supplies the routing value used when an entity does not carry its own.
pub trait RoutingResolver: Send + Sync + fmt::Debug {
    /// Routing for requests without entity-specific routing.
    fn default_routing(&self) -> Option<String>;
}

/// No routing: the engine routes by document id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRoutingResolver;

impl RoutingResolver for DefaultRoutingResolver {
    fn default_routing(&self) -> Option<String> {
        None
    }
}

/// A constant routing value for every request.
#[derive(Debug, Clone)]
pub struct FixedRoutingResolver {
    routing: String,
}

impl FixedRoutingResolver {
    /// Route everything with `routing`.
    pub fn new(routing: impl Into<String>) -> Self {
        Self {
            routing: routing.into(),
        }
    }
}

impl RoutingResolver for FixedRoutingResolver {
    fn default_routing(&self) -> Option<String> {
        Some(self.routing.clone())
    }
}
