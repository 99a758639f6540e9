//! Registry mapping venue ids to adapter factories.

use super::{Exchange, ExchangeError, MarketDataFeed, PaperExchange, PaperFeed, Result};
use crate::config::{ExchangeConfig, PAPER_KIND, PaperConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Trading adapter and market data feed of one venue.
#[derive(Clone)]
pub struct VenueHandle {
    pub exchange: Arc<dyn Exchange>,
    pub feed: Arc<dyn MarketDataFeed>,
}

/// Builds a venue from its configured name, settings and traded pair.
pub type VenueFactory =
    Box<dyn Fn(&str, &ExchangeConfig, &str) -> Result<VenueHandle> + Send + Sync>;

/// VenueRegistry resolves venue ids to adapters. Venues are resolved once at startup.
pub struct VenueRegistry {
    factories: HashMap<String, VenueFactory>,
}

impl VenueRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in `paper` venue.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(PAPER_KIND, Box::new(paper_factory));
        registry
    }

    /// Registers a factory under an id, replacing any previous one.
    pub fn register(&mut self, kind: &str, factory: VenueFactory) {
        info!(kind = %kind, "Registering venue factory");
        self.factories.insert(kind.to_lowercase(), factory);
    }

    /// Returns true if a factory is registered for the id.
    #[cfg(test)]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(&kind.to_lowercase())
    }

    /// Returns all registered ids.
    #[cfg(test)]
    pub fn kinds(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Builds the venue configured under `name` for `pair`.
    pub fn resolve(&self, name: &str, config: &ExchangeConfig, pair: &str) -> Result<VenueHandle> {
        let kind = config.kind(name).to_lowercase();
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| ExchangeError::Internal(format!("unknown venue kind: {}", kind)))?;

        info!(exchange = %name, kind = %kind, pair = %pair, "Loading venue from config");
        factory(name, config, pair)
    }
}

impl Default for VenueRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn paper_factory(name: &str, config: &ExchangeConfig, pair: &str) -> Result<VenueHandle> {
    let paper: PaperConfig = config.paper.clone().unwrap_or_default();
    let exchange = PaperExchange::new(name, pair, paper.base_balance(), paper.quote_balance());
    let feed = match paper.book() {
        Some(snapshot) => PaperFeed::with_snapshot(snapshot),
        None => {
            warn!(exchange = %name, "Paper venue has no book levels, its feed stays empty");
            PaperFeed::new()
        }
    };

    Ok(VenueHandle {
        exchange: Arc::new(exchange),
        feed: Arc::new(feed),
    })
}
