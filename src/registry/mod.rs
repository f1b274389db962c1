//! # Adapter Registry
//!
//! In-process registry for the adapter seams: one optional workflow-level
//! [`ContentGenerator`], and per-platform [`FormatterAdapter`] /
//! [`PublisherAdapter`] instances. Publish tasks fail with an
//! `AdapterNotRegistered` error when no publisher is present for their
//! platform; formatting falls back to the capability-table formatter, so a
//! missing formatter is not an error.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::adapters::{ContentGenerator, FormatterAdapter, PublisherAdapter};
use crate::capabilities::Platform;
use crate::error::{CrosspostError, Result};

/// Registry population snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub has_generator: bool,
    pub formatter_count: usize,
    pub publisher_count: usize,
}

/// Holds every injected adapter for the lifetime of the service.
#[derive(Default)]
pub struct AdapterRegistry {
    generator: RwLock<Option<Arc<dyn ContentGenerator>>>,
    formatters: DashMap<Platform, Arc<dyn FormatterAdapter>>,
    publishers: DashMap<Platform, Arc<dyn PublisherAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the workflow-level content generator. Replaces any
    /// previously registered generator.
    pub fn register_generator(&self, generator: Arc<dyn ContentGenerator>) {
        debug!("Registered content generator");
        *self.generator.write() = Some(generator);
    }

    pub fn generator(&self) -> Option<Arc<dyn ContentGenerator>> {
        self.generator.read().clone()
    }

    pub fn register_formatter(&self, formatter: Arc<dyn FormatterAdapter>) {
        let platform = formatter.platform();
        debug!(platform = %platform, "Registered formatter adapter");
        self.formatters.insert(platform, formatter);
    }

    /// Formatter for a platform, if one was injected. Callers fall back to
    /// capability-table formatting when this is `None`.
    pub fn formatter(&self, platform: Platform) -> Option<Arc<dyn FormatterAdapter>> {
        self.formatters.get(&platform).map(|e| Arc::clone(&e))
    }

    pub fn register_publisher(&self, publisher: Arc<dyn PublisherAdapter>) {
        let platform = publisher.platform();
        debug!(platform = %platform, "Registered publisher adapter");
        self.publishers.insert(platform, publisher);
    }

    pub fn publisher(&self, platform: Platform) -> Result<Arc<dyn PublisherAdapter>> {
        self.publishers
            .get(&platform)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| CrosspostError::AdapterNotRegistered {
                kind: "publisher".to_string(),
                platform: platform.as_str().to_string(),
            })
    }

    pub fn has_publisher(&self, platform: Platform) -> bool {
        self.publishers.contains_key(&platform)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            has_generator: self.generator.read().is_some(),
            formatter_count: self.formatters.len(),
            publisher_count: self.publishers.len(),
        }
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("AdapterRegistry")
            .field("has_generator", &stats.has_generator)
            .field("formatter_count", &stats.formatter_count)
            .field("publisher_count", &stats.publisher_count)
            .finish()
    }
}
