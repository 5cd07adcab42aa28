//! GPU query pools

use crate::error::{Error, Result};
use crate::render::{CommandList, NativeQueryPool, RenderDevice, ResourceId};
use crate::{rhi_debug, rhi_warn};

/// Kind of query stored in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// Event / occlusion style query without a timestamp
    Unknown,
    Timestamp,
}

// ===== DISJOINT RING =====

/// Native disjoint query operation requested by [`TimestampDisjointRing::on_timestamp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisjointAction {
    /// Begin the disjoint query at this index
    Begin(u32),
    /// End the disjoint query at this index
    End(u32),
}

/// Bookkeeping pairing timestamps with clock-disjoint queries
///
/// Timestamps are assumed to come in begin/end pairs. The first timestamp of a
/// pair opens a disjoint query at its own index, the second closes it, and both
/// remember which disjoint query covers them. A timestamp can only be converted
/// once its disjoint query resolved to a non-disjoint clock.
#[derive(Debug, Clone)]
pub struct TimestampDisjointRing {
    recording: bool,
    current: u32,
    table: Vec<u32>,
    frequencies: Vec<Option<u64>>,
    frequency: u64,
}

impl TimestampDisjointRing {
    pub fn new(capacity: u32) -> Self {
        Self {
            recording: false,
            current: 0,
            table: vec![0; capacity as usize],
            frequencies: vec![None; capacity as usize],
            frequency: 0,
        }
    }

    /// Register a timestamp write at `index`
    pub fn on_timestamp(&mut self, index: u32) -> DisjointAction {
        let action = if !self.recording {
            self.current = index;
            if let Some(slot) = self.frequencies.get_mut(index as usize) {
                *slot = None;
            }
            DisjointAction::Begin(index)
        } else {
            DisjointAction::End(self.current)
        };

        if let Some(slot) = self.table.get_mut(index as usize) {
            *slot = self.current;
        }
        self.recording = !self.recording;
        action
    }

    /// Disjoint query covering the timestamp at `index`
    pub fn disjoint_for(&self, index: u32) -> u32 {
        self.table.get(index as usize).copied().unwrap_or(0)
    }

    /// Clock frequency of the disjoint query covering `index`, if resolved
    pub fn resolved_frequency(&self, index: u32) -> Option<u64> {
        self.frequencies.get(self.disjoint_for(index) as usize).copied().flatten()
    }

    /// Record the result of disjoint query `disjoint_index`
    pub fn resolve(&mut self, disjoint_index: u32, frequency: u64) {
        if let Some(slot) = self.frequencies.get_mut(disjoint_index as usize) {
            *slot = Some(frequency);
        }
        self.frequency = self.frequency.max(frequency);
    }

    /// Highest clock frequency seen so far (0 before any resolve)
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Ticks to milliseconds at the highest known frequency
    pub fn ticks_to_milliseconds(&self, ticks: u64) -> f64 {
        if self.frequency == 0 {
            return 0.0;
        }
        ticks as f64 / self.frequency as f64 * 1000.0
    }
}

// ===== QUERY POOL =====

/// Fixed ring of native query slots
///
/// Handles are allocated round robin and wrap to 0 at capacity; a wrapped
/// handle may still be in flight. Results are polled and never block.
pub struct QueryPool {
    id: ResourceId,
    query_type: QueryType,
    capacity: u32,
    next_index: u32,
    native: Option<Box<dyn NativeQueryPool>>,
}

impl QueryPool {
    pub fn create(device: &RenderDevice, query_type: QueryType, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidResource("Query pool capacity must be > 0".to_string()));
        }

        let native = device.backend().create_query_pool(query_type, capacity)?;
        rhi_debug!("flint::QueryPool", "Created {:?} pool with {} slots", query_type, capacity);

        Ok(Self {
            id: ResourceId::next(),
            query_type,
            capacity,
            next_index: 0,
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_query_pool(native);
        }
    }

    /// Next slot of the ring (always `< capacity`)
    pub fn allocate_query_handle(&mut self) -> u32 {
        if self.next_index >= self.capacity {
            self.next_index = 0;
        }
        let index = self.next_index;
        self.next_index += 1;

        if let Some(native) = self.native.as_deref_mut() {
            native.on_allocate(index);
        }
        index
    }

    /// Record a timestamp write into slot `handle`
    pub fn write_timestamp(&mut self, cmd: &mut CommandList, handle: u32) -> Result<()> {
        if self.query_type != QueryType::Timestamp {
            return Err(Error::InvalidState(format!("write_timestamp() on a {:?} query pool", self.query_type)));
        }
        self.check_handle(handle)?;
        cmd.write_timestamp(self.native_mut()?, handle)
    }

    /// Poll the result of slot `handle`
    ///
    /// `None` while the result is not available yet, or when the GPU clock was
    /// disjoint over the measured interval.
    pub fn retrieve_result(&mut self, device: &RenderDevice, handle: u32) -> Option<u64> {
        if handle >= self.capacity {
            return None;
        }
        let native = self.native.as_deref_mut()?;
        device.backend().query_result(native, handle)
    }

    /// Convert a raw timestamp delta to milliseconds
    pub fn convert_to_milliseconds(&self, device: &RenderDevice, ticks: u64) -> f64 {
        match self.native.as_deref() {
            Some(native) => device.backend().timestamp_to_milliseconds(native, ticks),
            None => 0.0,
        }
    }

    /// Milliseconds between two timestamps, once both are available
    pub fn elapsed_milliseconds(&mut self, device: &RenderDevice, start: u32, end: u32) -> Option<f64> {
        let begin = self.retrieve_result(device, start)?;
        let finish = self.retrieve_result(device, end)?;
        if finish < begin {
            rhi_warn!("flint::QueryPool", "Timestamp {} precedes timestamp {}", end, start);
            return None;
        }
        Some(self.convert_to_milliseconds(device, finish - begin))
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn check_handle(&self, handle: u32) -> Result<()> {
        if handle >= self.capacity {
            return Err(Error::InvalidResource(format!(
                "Query handle {} out of range (capacity {})",
                handle, self.capacity
            )));
        }
        Ok(())
    }

    fn native_mut(&mut self) -> Result<&mut dyn NativeQueryPool> {
        match self.native.as_deref_mut() {
            Some(native) => Ok(native),
            None => Err(Error::InvalidResource("Query pool used after destroy()".to_string())),
        }
    }
}

impl Drop for QueryPool {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::QueryPool", "Query pool dropped without destroy(), native object leaked");
        }
    }
}

#[cfg(test)]
#[path = "query_pool_tests.rs"]
mod tests;
