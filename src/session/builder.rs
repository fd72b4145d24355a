use std::sync::Arc;

use uuid::Uuid;

use crate::admission::AdmissionRegistry;
use crate::backend::{Beacon, RunBackend, SpoolBeacon};
use crate::config::SessionConfig;
use crate::cooldown::RateLimitGuard;
use crate::events::Bus;
use crate::sandbox::SandboxControl;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::controller::{Parts, SessionController};
use super::types::RunContext;

/// Builder for a [`SessionController`].
///
/// Players of one process should share the admission registry, the
/// rate-limit guard and the bus; anything not provided is created per player
/// from the config.
pub struct SessionControllerBuilder {
    cfg: SessionConfig,
    backend: Arc<dyn RunBackend>,
    beacon: Arc<dyn Beacon>,
    sandbox: Arc<dyn SandboxControl>,
    spool: Option<Arc<SpoolBeacon>>,
    registry: Option<Arc<AdmissionRegistry>>,
    guard: Option<Arc<RateLimitGuard>>,
    bus: Option<Bus>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    client_tag: Option<String>,
    context: Option<RunContext>,
}

impl SessionControllerBuilder {
    pub fn new(
        cfg: SessionConfig,
        backend: Arc<dyn RunBackend>,
        beacon: Arc<dyn Beacon>,
        sandbox: Arc<dyn SandboxControl>,
    ) -> Self {
        Self {
            cfg,
            backend,
            beacon,
            sandbox,
            spool: None,
            registry: None,
            guard: None,
            bus: None,
            subscribers: Vec::new(),
            client_tag: None,
            context: None,
        }
    }

    /// Uses `spool` as the beacon and replays what earlier players left in it
    /// (see [`SpoolBeacon::drain`]) when this player first starts a session.
    pub fn with_spool(mut self, spool: Arc<SpoolBeacon>) -> Self {
        self.beacon = spool.clone();
        self.spool = Some(spool);
        self
    }

    /// Shares a process-wide admission registry.
    pub fn with_registry(mut self, registry: Arc<AdmissionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Shares a process-wide rate-limit guard.
    pub fn with_guard(mut self, guard: Arc<RateLimitGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Publishes onto an existing bus.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Event subscribers fed from the bus through dedicated workers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Tag recorded with this player's slot reservations.
    pub fn with_client_tag(mut self, tag: impl Into<String>) -> Self {
        self.client_tag = Some(tag.into());
        self
    }

    /// Initial capsule/post context.
    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Builds the player.
    ///
    /// Must be called inside a tokio runtime: the violation listener and
    /// subscriber workers are spawned here.
    pub fn build(self) -> SessionController {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(AdmissionRegistry::new(self.cfg.max_runners_clamped())));
        let guard = self.guard.unwrap_or_default();

        let subscribers = (!self.subscribers.is_empty()).then(|| {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            set.listen(bus.subscribe());
            set
        });

        SessionController::from_parts(Parts {
            cfg: self.cfg,
            client_tag: self
                .client_tag
                .unwrap_or_else(|| format!("player-{}", Uuid::new_v4().simple())),
            context: self.context,
            registry,
            guard,
            backend: self.backend,
            beacon: self.beacon,
            spool: self.spool,
            sandbox: self.sandbox,
            bus,
            subscribers,
        })
    }
}
