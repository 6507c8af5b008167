use crate::errors::{BridgeError, Resource};
use crate::gate::{Gate, GateGuard};
use crate::keys::{CONTENT_CHANNEL_CAPACITY, ChannelKeys, SIZE_CHANNEL_CAPACITY};
use crate::length;
use crate::registry::{self, Attachment, GateId, RegionId};
use std::ops::{Deref, DerefMut};

/// One shared segment together with the gate that guards it.
pub struct Channel {
    region: RegionId,
    gate: Gate,
    memory: Attachment,
}

impl Channel {
    fn new(region: RegionId, gate: GateId, memory: Attachment) -> Self {
        Self {
            region,
            gate: Gate::new(gate),
            memory,
        }
    }

    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Acquire the gate and borrow the segment until the guard is released.
    pub fn lock(&mut self) -> Result<ChannelGuard<'_>, BridgeError> {
        let gate = self.gate.lock()?;
        Ok(ChannelGuard {
            gate,
            memory: &mut self.memory,
        })
    }
}

/// Exclusive view of a channel's bytes while its gate is held.
pub struct ChannelGuard<'a> {
    gate: GateGuard<'a>,
    memory: &'a mut Attachment,
}

impl ChannelGuard<'_> {
    pub fn release(self) -> Result<(), BridgeError> {
        let ChannelGuard { gate, .. } = self;
        gate.release()
    }
}

impl Deref for ChannelGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.memory.as_slice()
    }
}

impl DerefMut for ChannelGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.memory.as_mut_slice()
    }
}

/// The size channel and the content channel that together carry one
/// variable-length message.
pub struct ChannelPair {
    pub size: Channel,
    pub content: Channel,
}

impl ChannelPair {
    /// Create and initialize both channels (consumer side).
    ///
    /// The size channel holds the sentinel before either gate is released, so
    /// a producer already blocked on a gate can never observe an
    /// uninitialized length. If any step fails, objects created by this call
    /// are removed again; objects that already existed are left alone.
    pub fn create(keys: &ChannelKeys) -> Result<Self, BridgeError> {
        let mut created = Created::default();
        Self::create_inner(keys, &mut created).inspect_err(|_| created.rollback())
    }

    fn create_inner(keys: &ChannelKeys, created: &mut Created) -> Result<Self, BridgeError> {
        let size_gate = registry::create_gate(keys.size_gate)?;
        created.gates.push(size_gate);
        let content_gate = registry::create_gate(keys.content_gate)?;
        created.gates.push(content_gate);

        let size_region = registry::create_region(keys.size_region, SIZE_CHANNEL_CAPACITY)?;
        created.regions.push(size_region);
        let mut size_memory = registry::attach(&size_region)?;

        let content_region =
            registry::create_region(keys.content_region, CONTENT_CHANNEL_CAPACITY)?;
        created.regions.push(content_region);
        let content_memory = registry::attach(&content_region)?;

        length::reset(size_memory.as_mut_slice())?;

        let pair = Self {
            size: Channel::new(size_region, size_gate, size_memory),
            content: Channel::new(content_region, content_gate, content_memory),
        };

        pair.size.gate.release()?;
        pair.content.gate.release()?;

        tracing::info!(
            size_key = keys.size_region,
            content_key = keys.content_region,
            "Channels created"
        );
        Ok(pair)
    }

    /// Attach to channels created by the consumer (producer side).
    pub fn open(keys: &ChannelKeys) -> Result<Self, BridgeError> {
        let size_gate = registry::open_gate(keys.size_gate)?;
        let content_gate = registry::open_gate(keys.content_gate)?;
        let size_region = registry::open_region(keys.size_region, SIZE_CHANNEL_CAPACITY)?;
        let content_region = registry::open_region(keys.content_region, CONTENT_CHANNEL_CAPACITY)?;

        let size_memory = registry::attach(&size_region)?;
        let content_memory = registry::attach(&content_region)?;

        Ok(Self {
            size: Channel::new(size_region, size_gate, size_memory),
            content: Channel::new(content_region, content_gate, content_memory),
        })
    }

    /// Detach and remove both segments and both gates.
    ///
    /// Every step is attempted once regardless of earlier failures. Failures,
    /// including objects that were already removed, are logged and reported
    /// but never returned as errors.
    pub fn teardown(self) -> Teardown {
        let ChannelPair { size, content } = self;
        let mut report = Teardown::default();

        tracing::debug!("Cleaning up shared memory");
        report.record("detach", Resource::Region, size.region.key(), size.memory.detach());
        report.record(
            "detach",
            Resource::Region,
            content.region.key(),
            content.memory.detach(),
        );
        report.record(
            "remove",
            Resource::Region,
            size.region.key(),
            registry::destroy_region(&size.region),
        );
        report.record(
            "remove",
            Resource::Region,
            content.region.key(),
            registry::destroy_region(&content.region),
        );

        tracing::debug!("Cleaning up semaphores");
        report.record(
            "remove",
            Resource::Gate,
            size.gate.id().key(),
            registry::destroy_gate(size.gate.id()),
        );
        report.record(
            "remove",
            Resource::Gate,
            content.gate.id().key(),
            registry::destroy_gate(content.gate.id()),
        );

        report
    }
}

/// One attempted teardown step.
#[derive(Debug)]
pub struct TeardownStep {
    pub action: &'static str,
    pub resource: Resource,
    pub key: i32,
    pub result: Result<(), BridgeError>,
}

#[derive(Debug, Default)]
pub struct Teardown {
    pub steps: Vec<TeardownStep>,
}

impl Teardown {
    fn record(
        &mut self,
        action: &'static str,
        resource: Resource,
        key: i32,
        result: Result<(), BridgeError>,
    ) {
        if let Err(e) = &result {
            tracing::warn!("Teardown: {} of {} with key {} failed: {}", action, resource, key, e);
        }
        self.steps.push(TeardownStep {
            action,
            resource,
            key,
            result,
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &TeardownStep> {
        self.steps.iter().filter(|s| s.result.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Number of removal attempts made for `resource`.
    pub fn removals(&self, resource: Resource) -> usize {
        self.steps
            .iter()
            .filter(|s| s.action == "remove" && s.resource == resource)
            .count()
    }
}

#[derive(Default)]
struct Created {
    regions: Vec<RegionId>,
    gates: Vec<GateId>,
}

impl Created {
    fn rollback(&self) {
        for region in &self.regions {
            if let Err(e) = registry::destroy_region(region) {
                tracing::warn!("Rollback: {}", e);
            }
        }
        for gate in &self.gates {
            if let Err(e) = registry::destroy_gate(gate) {
                tracing::warn!("Rollback: {}", e);
            }
        }
    }
}
