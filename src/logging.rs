//! Injected Logging
//!
//! Adapters, the resolver and the scanner never log through an implicit global.
//! Each one is handed a [`Logger`] when it is built: a component tag plus the
//! `tracing` dispatcher the events should go to. The default logger discards
//! everything, so library users that never install a subscriber pay nothing and
//! tests can capture one component's output in isolation.

use std::fmt;

use tracing::dispatcher::{self, Dispatch};

/// Component-tagged handle onto a `tracing` dispatcher
#[derive(Clone)]
pub struct Logger {
    component: &'static str,
    dispatch: Dispatch,
    enabled: bool,
}

impl Logger {
    /// Logger bound to whatever dispatcher is the default right now
    pub fn current(component: &'static str) -> Self {
        Self {
            component,
            dispatch: dispatcher::get_default(|d| d.clone()),
            enabled: true,
        }
    }

    /// Logger that drops every event
    pub fn noop(component: &'static str) -> Self {
        Self {
            component,
            dispatch: Dispatch::none(),
            enabled: false,
        }
    }

    /// Logger bound to an explicit dispatcher
    pub fn with_dispatch(component: &'static str, dispatch: Dispatch) -> Self {
        Self {
            component,
            dispatch,
            enabled: true,
        }
    }

    /// Same sink, different component tag
    pub fn child(&self, component: &'static str) -> Self {
        Self {
            component,
            dispatch: self.dispatch.clone(),
            enabled: self.enabled,
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        if self.enabled {
            dispatcher::with_default(&self.dispatch, || {
                tracing::debug!(component = self.component, "{}", args)
            });
        }
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        if self.enabled {
            dispatcher::with_default(&self.dispatch, || {
                tracing::info!(component = self.component, "{}", args)
            });
        }
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        if self.enabled {
            dispatcher::with_default(&self.dispatch, || {
                tracing::warn!(component = self.component, "{}", args)
            });
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::noop("hwinv")
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("component", &self.component)
            .field("enabled", &self.enabled)
            .finish()
    }
}
