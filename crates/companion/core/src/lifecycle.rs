//! Start/stop state machine shared by long running services.

use derive_more::Display;
use thiserror::Error;

/// State of a service.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum ServiceState {
    /// Constructed but never started.
    #[default]
    Idle,
    /// Started and not yet stopped.
    Running,
    /// Stopped. A stopped service cannot be started again.
    Stopped,
}

/// Errors returned by invalid [`Lifecycle`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// `start` was called on a running service.
    #[error("{0} already started")]
    AlreadyStarted(&'static str),
    /// `start` or `stop` was called on a stopped service.
    #[error("{0} already stopped")]
    AlreadyStopped(&'static str),
    /// `stop` was called on a service that never started.
    #[error("{0} not started")]
    NotStarted(&'static str),
}

/// `Idle -> Running -> Stopped` transitions for a named service.
///
/// Held by composition in every service that needs idempotent start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    name: &'static str,
    state: ServiceState,
}

impl Lifecycle {
    /// Creates a new idle [`Lifecycle`] for the service called `name`.
    pub const fn new(name: &'static str) -> Self {
        Self { name, state: ServiceState::Idle }
    }

    /// Transitions `Idle -> Running`.
    pub const fn start(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            ServiceState::Idle => {
                self.state = ServiceState::Running;
                Ok(())
            }
            ServiceState::Running => Err(LifecycleError::AlreadyStarted(self.name)),
            ServiceState::Stopped => Err(LifecycleError::AlreadyStopped(self.name)),
        }
    }

    /// Transitions `Running -> Stopped`.
    pub const fn stop(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            ServiceState::Running => {
                self.state = ServiceState::Stopped;
                Ok(())
            }
            ServiceState::Idle => Err(LifecycleError::NotStarted(self.name)),
            ServiceState::Stopped => Err(LifecycleError::AlreadyStopped(self.name)),
        }
    }

    /// Returns the current state.
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    /// Returns `true` while the service is running.
    pub const fn is_running(&self) -> bool {
        matches!(self.state, ServiceState::Running)
    }

    /// Returns the service name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}
