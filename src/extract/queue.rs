//! Pending re-mesh requests

use std::collections::VecDeque;

use crate::math::Region;

/// A region of one renderer slot that needs re-meshing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractRegion {
    pub region: Region,
    /// Renderer slot the region belongs to
    pub slot: usize,
    /// Slot generation at enqueue time; stale entries are skipped by the consumer
    pub generation: u64,
    /// Whether the slot was hidden when the request was made
    pub hidden: bool,
}

impl ExtractRegion {
    pub fn new(region: Region, slot: usize, generation: u64, hidden: bool) -> Self {
        Self { region, slot, generation, hidden }
    }
}

/// FIFO of extraction requests.
///
/// A request is dropped if an entry for the same slot and generation already
/// covers its region.
#[derive(Debug, Default)]
pub struct ExtractQueue {
    items: VecDeque<ExtractRegion>,
}

impl ExtractQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `item`; returns false if it is already covered
    pub fn push(&mut self, item: ExtractRegion) -> bool {
        let covered = self.items.iter().any(|queued| {
            queued.slot == item.slot
                && queued.generation == item.generation
                && queued.region.contains_region(&item.region)
        });
        if covered {
            log::trace!("Extraction of {} for slot {} already queued", item.region, item.slot);
            return false;
        }
        self.items.push_back(item);
        true
    }

    pub fn pop(&mut self) -> Option<ExtractRegion> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractRegion> {
        self.items.iter()
    }
}
