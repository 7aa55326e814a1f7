//! The set of meters known to the engine.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::meter::{Meter, MeterSnapshot};

/// Owns every registered [`Meter`], in registration order.
///
/// Lookups match on each meter's *current* identity. At most one meter per
/// identity is ever inserted; a later [`Meter::set_identity`] is not checked
/// for collisions.
#[derive(Debug, Default)]
pub struct MeterRegistry {
    meters: RwLock<Vec<Arc<Meter>>>,
}

/// Result of [`MeterRegistry::register_or_get`].
#[derive(Debug, Clone)]
pub enum Registration {
    /// A new meter was created.
    Created(Arc<Meter>),
    /// A meter with this identity already existed.
    Existing(Arc<Meter>),
}

impl Registration {
    /// The meter, however it was obtained.
    pub fn meter(&self) -> &Arc<Meter> {
        match self {
            Registration::Created(m) | Registration::Existing(m) => m,
        }
    }

    /// Consume into the meter handle.
    pub fn into_meter(self) -> Arc<Meter> {
        match self {
            Registration::Created(m) | Registration::Existing(m) => m,
        }
    }

    /// Whether a new meter was created.
    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

impl MeterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the meter for `identity`, creating it if needed.
    pub fn register(&self, identity: &str) -> Arc<Meter> {
        self.register_or_get(identity).into_meter()
    }

    /// Like [`register`](Self::register) but reports whether a meter was created.
    pub fn register_or_get(&self, identity: &str) -> Registration {
        let mut meters = self.meters.write();

        if let Some(existing) = meters.iter().find(|m| m.identity_is(identity)) {
            debug!(meter = %identity, "Meter already registered");
            return Registration::Existing(existing.clone());
        }

        let meter = Arc::new(Meter::new(identity));
        meters.push(meter.clone());
        info!(meter = %identity, total = meters.len(), "New meter created");
        Registration::Created(meter)
    }

    /// Find a meter by identity.
    pub fn find(&self, identity: &str) -> Option<Arc<Meter>> {
        self.meters
            .read()
            .iter()
            .find(|m| m.identity_is(identity))
            .cloned()
    }

    /// Whether this exact meter instance is still registered.
    pub fn contains(&self, meter: &Arc<Meter>) -> bool {
        self.meters.read().iter().any(|m| Arc::ptr_eq(m, meter))
    }

    /// All meters, in registration order.
    pub fn list(&self) -> Vec<Arc<Meter>> {
        self.meters.read().clone()
    }

    /// Snapshots of all meters, in registration order.
    pub fn snapshots(&self) -> Vec<MeterSnapshot> {
        self.meters.read().iter().map(|m| m.snapshot()).collect()
    }

    /// Remove the meter with `identity`, returning it if it was present.
    pub fn remove(&self, identity: &str) -> Option<Arc<Meter>> {
        let mut meters = self.meters.write();
        let pos = meters.iter().position(|m| m.identity_is(identity))?;
        let meter = meters.remove(pos);
        info!(meter = %identity, remaining = meters.len(), "Meter removed");
        Some(meter)
    }

    /// Remove exactly this meter instance. Returns false if it was already gone.
    pub fn remove_meter(&self, meter: &Arc<Meter>) -> bool {
        let mut meters = self.meters.write();
        match meters.iter().position(|m| Arc::ptr_eq(m, meter)) {
            Some(pos) => {
                meters.remove(pos);
                info!(meter = %meter.identity(), remaining = meters.len(), "Meter removed");
                true
            }
            None => false,
        }
    }

    /// Number of registered meters.
    pub fn len(&self) -> usize {
        self.meters.read().len()
    }

    /// Whether no meters are registered.
    pub fn is_empty(&self) -> bool {
        self.meters.read().is_empty()
    }
}
