//! Read-through composition of providers.

use std::fmt;
use std::sync::Arc;

use sanduq_support::rendering::render_chain;
use tracing::trace;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::provider::Provider;
use crate::registry::Put;
use crate::value::Value;

/// Several providers acting as one.
///
/// Writes go to the first provider. Reads try each provider in order and
/// return the first hit. A provider that fails with any missing key, its
/// own or one its factory needed, is skipped.
///
/// # Examples
/// ```
/// use sanduq_container::prelude::*;
///
/// let defaults = Container::new();
/// defaults.put_value("timeout", 30_u32).unwrap();
/// defaults.put_value("retries", 3_u32).unwrap();
///
/// let overrides = Container::new();
/// overrides.put_value("timeout", 5_u32).unwrap();
///
/// let chain = ChainContainer::new([overrides, defaults]);
/// assert_eq!(*chain.get_as::<u32>("timeout").unwrap(), 5);
/// assert_eq!(*chain.get_as::<u32>("retries").unwrap(), 3);
/// ```
#[derive(Clone)]
pub struct ChainContainer {
    providers: Arc<[Arc<dyn Provider>]>,
}

impl ChainContainer {
    /// Chains `providers`, first one first. With no providers the chain
    /// holds one empty [`Container`].
    pub fn new<I, P>(providers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Arc<dyn Provider>>,
    {
        let mut providers: Vec<Arc<dyn Provider>> =
            providers.into_iter().map(Into::into).collect();
        if providers.is_empty() {
            providers.push(Container::new().into());
        }
        Self {
            providers: providers.into(),
        }
    }

    /// The chained providers, in lookup order.
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }
}

impl Default for ChainContainer {
    fn default() -> Self {
        Self::new(std::iter::empty::<Container>())
    }
}

impl Provider for ChainContainer {
    fn insert(&self, key: Key, put: Put) -> Result<()> {
        self.providers[0].insert(key, put)
    }

    fn lookup(&self, key: &Key) -> Result<Value> {
        for (depth, provider) in self.providers.iter().enumerate() {
            match provider.lookup(key) {
                Err(e) if e.is_missing_key() => {
                    trace!(key = %key, depth, error = %e, "Missing in chained provider, falling through");
                }
                found => return found,
            }
        }
        Err(Error::missing(key))
    }

    fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = Vec::new();
        for key in self.providers.iter().flat_map(|p| p.keys()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

impl From<ChainContainer> for Arc<dyn Provider> {
    fn from(chain: ChainContainer) -> Self {
        Arc::new(chain)
    }
}

impl fmt::Debug for ChainContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let links: Vec<String> = self
            .providers
            .iter()
            .map(|p| format!("Provider({})", p.keys().len()))
            .collect();
        write!(f, "ChainContainer({})", render_chain(&links))
    }
}
