//! Event loops of the primary and secondary execution contexts.
//!
//! Each context handles one event at a time: a bus message, a keystroke,
//! or (primary only) a device output byte. Handlers run to completion
//! before the next event is taken.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use ttymux_core::{
    BindingError, BindingParams, Bus, ConfigError, ContextLauncher, Device, Endpoint,
    MessageStream, MuxConfig, Role, Surface, Unit,
};
use ttymux_session::{LivenessWatch, PollWatch, SessionRegistry, Spawner};

use crate::{proxy::SessionProxy, router::IoRouter};

/// The boot context: owns the device and unit 0.
pub struct PrimaryContext {
    endpoint: Arc<Endpoint>,
    registry: Arc<SessionRegistry>,
    router: IoRouter,
    spawner: Spawner,
    messages: MessageStream,
}

impl PrimaryContext {
    /// Build a primary that polls spawned contexts for liveness.
    ///
    /// # Errors
    /// Returns error if the configured poll interval is invalid.
    pub fn new(
        bus: Arc<dyn Bus>,
        device: Arc<dyn Device>,
        surface: Arc<dyn Surface>,
        launcher: Arc<dyn ContextLauncher>,
        config: &MuxConfig,
    ) -> Result<Self, ConfigError> {
        let watch = Arc::new(PollWatch::new(config.liveness_interval()?));
        Ok(Self::with_watch(bus, device, surface, launcher, watch, config))
    }

    /// Build a primary with a custom liveness strategy.
    #[must_use]
    pub fn with_watch(
        bus: Arc<dyn Bus>,
        device: Arc<dyn Device>,
        surface: Arc<dyn Surface>,
        launcher: Arc<dyn ContextLauncher>,
        watch: Arc<dyn LivenessWatch>,
        config: &MuxConfig,
    ) -> Self {
        let endpoint = Arc::new(Endpoint::new(bus, Role::Primary));
        // Subscribe before anything can be spawned so no register is missed.
        let messages = endpoint.subscribe();
        let registry = Arc::new(SessionRegistry::new(
            Arc::clone(&endpoint),
            config.label_prefix.clone(),
        ));
        let router = IoRouter::new(
            Arc::clone(&endpoint),
            Arc::clone(&registry),
            device,
            surface,
        );
        let spawner = Spawner::new(Arc::clone(&registry), launcher, watch);
        tracing::info!(origin = %endpoint.origin(), "Primary context created");

        Self {
            endpoint,
            registry,
            router,
            spawner,
            messages,
        }
    }

    /// Handle for spawning and closing sessions while the loop runs.
    #[must_use]
    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    #[must_use]
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run until the local keystroke stream ends, then close every
    /// session this context spawned.
    pub async fn run<O, K>(self, device_output: O, keystrokes: K)
    where
        O: Stream<Item = (Unit, u8)> + Send + Unpin,
        K: Stream<Item = String> + Send + Unpin,
    {
        let Self {
            endpoint,
            router,
            spawner,
            mut messages,
            ..
        } = self;
        let mut device_output = device_output.fuse();
        let mut keystrokes = keystrokes;

        tracing::info!(origin = %endpoint.origin(), "Primary context running");
        loop {
            tokio::select! {
                Some(msg) = messages.next() => router.handle_message(&msg),
                Some((unit, byte)) = device_output.next() => router.on_output(unit, byte),
                key = keystrokes.next() => match key {
                    Some(text) => router.type_local(&text),
                    None => break,
                },
            }
        }

        spawner.close_all();
        tracing::info!(origin = %endpoint.origin(), "Primary context stopped");
    }
}

/// A spawned context proxying one unit.
pub struct SecondaryContext {
    endpoint: Arc<Endpoint>,
    registry: Arc<SessionRegistry>,
    proxy: SessionProxy,
    messages: MessageStream,
}

impl SecondaryContext {
    /// Bind to the unit named by the creation parameters.
    ///
    /// # Errors
    /// Returns error if the params name the primary's unit.
    pub fn bind(
        bus: Arc<dyn Bus>,
        params: BindingParams,
        surface: Arc<dyn Surface>,
        config: &MuxConfig,
    ) -> Result<Self, BindingError> {
        let unit = params.require_secondary()?.unit;
        let endpoint = Arc::new(Endpoint::new(bus, Role::Secondary));
        let messages = endpoint.subscribe();
        let registry = Arc::new(SessionRegistry::new(
            Arc::clone(&endpoint),
            config.label_prefix.clone(),
        ));
        let proxy = SessionProxy::new(
            Arc::clone(&endpoint),
            Arc::clone(&registry),
            unit,
            surface,
        );
        tracing::debug!(unit = %unit, origin = %endpoint.origin(), "Secondary context bound");

        Ok(Self {
            endpoint,
            registry,
            proxy,
            messages,
        })
    }

    /// Bind from a creation query string such as `unit=3`.
    ///
    /// # Errors
    /// Returns error if the query carries no usable secondary unit.
    pub fn from_query(
        bus: Arc<dyn Bus>,
        query: &str,
        surface: Arc<dyn Surface>,
        config: &MuxConfig,
    ) -> Result<Self, BindingError> {
        Self::bind(bus, BindingParams::from_query(query)?, surface, config)
    }

    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.proxy.unit()
    }

    #[must_use]
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Register, then proxy until the keystroke stream ends; unregister on
    /// the way out.
    pub async fn run<K>(self, keystrokes: K)
    where
        K: Stream<Item = String> + Send + Unpin,
    {
        let Self {
            endpoint,
            proxy,
            mut messages,
            ..
        } = self;
        let mut keystrokes = keystrokes;

        proxy.start();
        tracing::info!(unit = %proxy.unit(), origin = %endpoint.origin(), "Secondary context running");
        loop {
            tokio::select! {
                Some(msg) = messages.next() => proxy.handle_message(&msg),
                key = keystrokes.next() => match key {
                    Some(text) => proxy.keystroke(&text),
                    None => break,
                },
            }
        }
        proxy.shutdown();
        tracing::info!(unit = %proxy.unit(), "Secondary context stopped");
    }
}
