// Aggregate Queue - weighted multiplexer over named channels

pub mod weighted;

pub use weighted::WeightedSampler;

use crate::domain::{normalize_queue_name, PushInput, QueueName, QueuedItem};
use crate::error::{QueueError, Result};
use crate::port::QueueDriver;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Weight used when a channel is registered without one
pub const DEFAULT_CHANNEL_WEIGHT: u32 = 1;

/// A named, weighted binding to one driver
pub struct Channel {
    name: QueueName,
    driver: Arc<dyn QueueDriver>,
    weight: u32,
}

impl Channel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn driver(&self) -> &Arc<dyn QueueDriver> {
        &self.driver
    }
}

/// Composes several channels behind the `QueueDriver` contract
///
/// Operations naming a channel go straight to its driver. Channel-less push and
/// pop probe channels in weighted random order without replacement; the other
/// channel-less operations visit channels in registration order.
///
/// The registry is built before traffic starts and is read-only afterwards.
pub struct AggregateQueue {
    channels: Vec<Channel>,
    rng: Mutex<StdRng>,
}

impl Default for AggregateQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateQueue {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic probe order (tests, reproducible simulations)
    pub fn with_seed(seed: u64) -> Self {
        Self {
            channels: Vec::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Build from `(name, driver, weight)` triples
    pub fn with_channels<I, S>(channels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Arc<dyn QueueDriver>, u32)>,
        S: AsRef<str>,
    {
        let mut aggregate = Self::new();
        for (name, driver, weight) in channels {
            aggregate.add_channel(name.as_ref(), driver, weight)?;
        }
        Ok(aggregate)
    }

    /// Register a channel
    ///
    /// # Errors
    /// - `QueueError::Configuration` if the name is empty or already registered,
    ///   or the weight is zero. The registry is left untouched.
    pub fn add_channel(
        &mut self,
        name: &str,
        driver: Arc<dyn QueueDriver>,
        weight: u32,
    ) -> Result<&mut Self> {
        let normalized = normalize_queue_name(name.trim());

        if normalized.is_empty() {
            return Err(QueueError::Configuration(
                "Channel name must not be empty".to_string(),
            ));
        }
        if weight == 0 {
            return Err(QueueError::Configuration(format!(
                "Channel ({}) weight must be positive",
                name
            )));
        }
        if self.find_channel(&normalized).is_some() {
            return Err(QueueError::Configuration(format!(
                "Channel ({}) is already registered",
                name
            )));
        }

        debug!(channel = %normalized, weight, "Registered channel");
        self.channels.push(Channel {
            name: normalized,
            driver,
            weight,
        });
        Ok(self)
    }

    /// Register a channel with the default weight
    pub fn add_channel_default(
        &mut self,
        name: &str,
        driver: Arc<dyn QueueDriver>,
    ) -> Result<&mut Self> {
        self.add_channel(name, driver, DEFAULT_CHANNEL_WEIGHT)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn find_channel(&self, normalized: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == normalized)
    }

    fn channel(&self, name: &str) -> Result<&Channel> {
        let normalized = normalize_queue_name(name);
        self.find_channel(&normalized)
            .ok_or(QueueError::ChannelNotFound(normalized))
    }

    fn sampler(&self) -> WeightedSampler<usize> {
        WeightedSampler::new(
            self.channels
                .iter()
                .enumerate()
                .map(|(i, c)| (i, u64::from(c.weight))),
        )
    }

    // The lock is only held for the draw, never across an await
    fn next_candidate(&self, sampler: &mut WeightedSampler<usize>) -> Option<&Channel> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        sampler.draw(&mut *rng).map(|i| &self.channels[i])
    }
}

#[async_trait]
impl QueueDriver for AggregateQueue {
    async fn push(&self, input: PushInput, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        if let Some(name) = queue {
            let channel = self.channel(name)?;
            return channel.driver.push(input, Some(&channel.name)).await;
        }

        let mut sampler = self.sampler();
        while let Some(channel) = self.next_candidate(&mut sampler) {
            match channel.driver.push(input.clone(), Some(&channel.name)).await? {
                Some(item) => {
                    debug!(item_id = %item.id(), channel = %channel.name, "Pushed to channel");
                    return Ok(Some(item));
                }
                None => {
                    warn!(channel = %channel.name, "Channel declined push, trying next");
                }
            }
        }

        warn!("Every channel declined the push");
        Ok(None)
    }

    async fn pop(&self, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        if let Some(name) = queue {
            let channel = self.channel(name)?;
            return channel.driver.pop(Some(&channel.name)).await;
        }

        let mut sampler = self.sampler();
        while let Some(channel) = self.next_candidate(&mut sampler) {
            if let Some(item) = channel.driver.pop(Some(&channel.name)).await? {
                debug!(item_id = %item.id(), channel = %channel.name, "Popped from channel");
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    async fn release(&self, id: &str, queue: Option<&str>) -> Result<()> {
        if let Some(name) = queue {
            let channel = self.channel(name)?;
            return channel.driver.release(id, Some(&channel.name)).await;
        }

        // Release is channel-scoped: locate the owner(s) first
        for channel in &self.channels {
            if channel
                .driver
                .find_by_id(id, Some(&channel.name))
                .await?
                .is_some()
            {
                channel.driver.release(id, Some(&channel.name)).await?;
                debug!(item_id = %id, channel = %channel.name, "Released from channel");
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        if let Some(name) = queue {
            let channel = self.channel(name)?;
            return channel.driver.find_by_id(id, Some(&channel.name)).await;
        }

        for channel in &self.channels {
            if let Some(item) = channel.driver.find_by_id(id, Some(&channel.name)).await? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    async fn size(&self, queue: Option<&str>) -> Result<u64> {
        if let Some(name) = queue {
            let channel = self.channel(name)?;
            return channel.driver.size(Some(&channel.name)).await;
        }

        let mut total = 0;
        for channel in &self.channels {
            total += channel.driver.size(Some(&channel.name)).await?;
        }
        Ok(total)
    }

    async fn list_queues(&self) -> Result<Vec<QueueName>> {
        Ok(self.channels.iter().map(|c| c.name.clone()).collect())
    }
}
