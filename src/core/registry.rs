// Generation-checked slot arena that owns every live mapping.
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::region::Region;

/// Opaque identity of a mapping.
///
/// Low 32 bits hold `slot + 1`, high 32 bits the slot generation, so `0` is
/// never issued and a recycled slot never repeats a live identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct MappingId(u64);

impl MappingId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    fn new(index: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | (u64::from(index) + 1))
    }

    fn slot(self) -> Option<(usize, u32)> {
        let low = (self.0 & u64::from(u32::MAX)) as u32;
        let index = low.checked_sub(1)?;
        Some((index as usize, (self.0 >> 32) as u32))
    }
}

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a mapping.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingState {
    /// Source opened but not yet mapped. Entries are inserted already mapped,
    /// so `Mapping::state` never reports this.
    Created,
    Mapped,
    Unmapped,
}

#[derive(Debug)]
pub struct Mapping {
    id: MappingId,
    source: String,
    region: Region,
    released: AtomicBool,
}

impl Mapping {
    pub fn id(&self) -> MappingId {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn state(&self) -> MappingState {
        if self.released.load(Ordering::Acquire) {
            MappingState::Unmapped
        } else {
            MappingState::Mapped
        }
    }

    pub fn is_released(&self) -> bool {
        self.state() == MappingState::Unmapped
    }
}

struct Slot {
    generation: u32,
    mapping: Option<Arc<Mapping>>,
}

#[derive(Default)]
struct Slots {
    entries: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

/// Lookups share a read lock and hand out `Arc` clones; insertion and
/// removal take the write lock. Dropping the last `Arc` unmaps the region,
/// which always happens outside the lock.
#[derive(Default)]
pub struct Registry {
    slots: RwLock<Slots>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: String, region: Region) -> Result<Arc<Mapping>, Error> {
        let mut slots = self.write();
        let index = match slots.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(slots.entries.len())
                    .ok()
                    .filter(|index| *index < u32::MAX)
                    .ok_or_else(|| {
                        Error::new(ErrorKind::OutOfMemory).with_message("identity space exhausted")
                    })?;
                slots.entries.try_reserve(1).map_err(|err| {
                    Error::new(ErrorKind::OutOfMemory)
                        .with_message("failed to grow registry")
                        .with_source(err)
                })?;
                slots.entries.push(Slot {
                    generation: 0,
                    mapping: None,
                });
                index
            }
        };
        let slot = &mut slots.entries[index as usize];
        let mapping = Arc::new(Mapping {
            id: MappingId::new(index, slot.generation),
            source,
            region,
            released: AtomicBool::new(false),
        });
        slot.mapping = Some(Arc::clone(&mapping));
        slots.live += 1;
        Ok(mapping)
    }

    pub fn get(&self, id: MappingId) -> Result<Arc<Mapping>, Error> {
        let slots = self.read();
        id.slot()
            .and_then(|(index, generation)| {
                slots
                    .entries
                    .get(index)
                    .filter(|slot| slot.generation == generation)
                    .and_then(|slot| slot.mapping.clone())
            })
            .ok_or_else(|| invalid_handle(id))
    }

    pub fn contains(&self, id: MappingId) -> bool {
        self.get(id).is_ok()
    }

    /// Detach the mapping from its identity. Returns `None` when the identity
    /// is unknown or already removed; at most one caller ever gets `Some`.
    pub fn remove(&self, id: MappingId) -> Option<Arc<Mapping>> {
        let (index, generation) = id.slot()?;
        let mut slots = self.write();
        let slot = slots.entries.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let mapping = slot.mapping.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        mapping.released.store(true, Ordering::Release);
        slots.free.push(index as u32);
        slots.live -= 1;
        Some(mapping)
    }

    /// Remove every live mapping; returns how many were removed.
    pub fn drain(&self) -> usize {
        let drained: Vec<Arc<Mapping>> = {
            let mut slots = self.write();
            let mut drained = Vec::with_capacity(slots.live);
            let Slots { entries, free, live } = &mut *slots;
            for (index, slot) in entries.iter_mut().enumerate() {
                if let Some(mapping) = slot.mapping.take() {
                    slot.generation = slot.generation.wrapping_add(1);
                    mapping.released.store(true, Ordering::Release);
                    free.push(index as u32);
                    drained.push(mapping);
                }
            }
            *live = 0;
            drained
        };
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every critical section is a single push/pop/replace, so a panic while
    // holding the lock cannot leave the arena inconsistent.
    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn invalid_handle(id: MappingId) -> Error {
    Error::new(ErrorKind::InvalidHandle).with_message(format!("no live mapping with identity {id}"))
}
