// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::breaker::constants::ERR_POISONED_LOCK;
use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::{ConfigError, ResilienceContext};

/// Named circuit breakers shared across an application.
///
/// Each name maps to one breaker for the lifetime of the registry; the configuration given
/// when a name is first requested wins. Clones of a registry share the same breakers. The
/// internal lock is held only for lookups and inserts, never while a breaker is in use.
///
/// # Examples
///
/// ```
/// use breakwater::breaker::BreakerConfig;
/// use breakwater::{Registry, ResilienceContext};
/// use breakwater_clock::Clock;
///
/// let registry = Registry::new(&ResilienceContext::new(Clock::new_system()));
///
/// let first = registry.get_or_create("ledger", BreakerConfig::default())?;
/// let second = registry.breaker("ledger")?;
/// first.transition_to_open_state();
///
/// assert_eq!(second.state(), first.state());
/// assert_eq!(registry.list(), ["ledger"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    breakers: Arc<Mutex<HashMap<String, CircuitBreaker>>>,
    context: ResilienceContext,
    default_config: BreakerConfig,
}

impl Registry {
    /// Creates an empty registry whose breakers are built from `context`.
    #[must_use]
    pub fn new(context: &ResilienceContext) -> Self {
        Self {
            breakers: Arc::new(Mutex::new(HashMap::new())),
            context: context.clone(),
            default_config: BreakerConfig::default(),
        }
    }

    /// Sets the configuration used by [`breaker`][Self::breaker].
    #[must_use]
    pub fn with_default_config(self, default_config: BreakerConfig) -> Self {
        Self { default_config, ..self }
    }

    /// Returns the breaker registered under `name`, creating it with `config` if needed.
    ///
    /// When the breaker already exists, `config` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the breaker has to be created and `config` is invalid.
    pub fn get_or_create(&self, name: &str, config: BreakerConfig) -> Result<CircuitBreaker, ConfigError> {
        let mut breakers = self.breakers.lock().expect(ERR_POISONED_LOCK);

        if let Some(breaker) = breakers.get(name) {
            return Ok(breaker.clone());
        }

        let breaker = CircuitBreaker::new(name.to_owned(), config, &self.context)?;
        breakers.insert(name.to_owned(), breaker.clone());
        Ok(breaker)
    }

    /// Returns the breaker registered under `name`, creating it with the default configuration
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the breaker has to be created and the default configuration is
    /// invalid.
    pub fn breaker(&self, name: &str) -> Result<CircuitBreaker, ConfigError> {
        self.get_or_create(name, self.default_config.clone())
    }

    /// Returns the breaker registered under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.lock().expect(ERR_POISONED_LOCK).get(name).cloned()
    }

    /// The names of all registered breakers, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.lock().expect(ERR_POISONED_LOCK).keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Unregisters the breaker under `name` and returns it.
    ///
    /// Clones held elsewhere keep working; the next request for `name` creates a new breaker.
    pub fn remove(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.lock().expect(ERR_POISONED_LOCK).remove(name)
    }
}
