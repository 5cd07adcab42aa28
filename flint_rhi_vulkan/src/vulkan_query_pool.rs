/// VulkanQueryPool - timestamp queries on a VkQueryPool
///
/// Slots are reset from the host when the front-end ring hands them out
/// again, so a stale result is never returned for a reused slot.

use ash::vk;
use flint_rhi::flint::render::{NativeQueryPool, QueryType};
use flint_rhi::flint::{Error, Result};
use flint_rhi::rhi_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub struct VulkanQueryPool {
    ctx: Arc<GpuContext>,
    pub(crate) pool: vk::QueryPool,
    capacity: u32,
}

impl NativeQueryPool for VulkanQueryPool {
    fn on_allocate(&mut self, index: u32) {
        if index < self.capacity {
            unsafe { self.ctx.device.reset_query_pool(self.pool, index, 1) };
        }
    }
}

impl VulkanQueryPool {
    pub(crate) fn create(ctx: &Arc<GpuContext>, query_type: QueryType, capacity: u32) -> Result<Self> {
        if query_type != QueryType::Timestamp {
            return Err(Error::InvalidResource(format!("Unsupported query type {:?}", query_type)));
        }
        if ctx.limits.timestamp_valid_bits == 0 {
            return Err(Error::InvalidResource("The graphics queue does not support timestamps".to_string()));
        }

        let create_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(capacity);
        let pool = unsafe { ctx.device.create_query_pool(&create_info, None) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to create query pool: {:?}", e))?;

        unsafe { ctx.device.reset_query_pool(pool, 0, capacity) };

        Ok(Self { ctx: ctx.clone(), pool, capacity })
    }

    /// Timestamp of `index`, `None` while the GPU has not written it
    pub(crate) fn poll(&self, index: u32) -> Option<u64> {
        if index >= self.capacity {
            return None;
        }
        let mut data = [[0u64; 2]; 1];
        let result = unsafe {
            self.ctx.device.get_query_pool_results(
                self.pool,
                index,
                &mut data,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WITH_AVAILABILITY,
            )
        };
        match result {
            Ok(()) | Err(vk::Result::NOT_READY) => {
                let [value, available] = data[0];
                (available != 0).then(|| mask_timestamp(value, self.ctx.limits.timestamp_valid_bits))
            }
            Err(e) => {
                rhi_err!("flint::vulkan", "Failed to read query {}: {:?}", index, e);
                None
            }
        }
    }

    /// Milliseconds for a raw tick delta
    pub(crate) fn ticks_to_milliseconds(&self, ticks: u64) -> f64 {
        ticks_to_milliseconds(ticks, self.ctx.limits.timestamp_period)
    }
}

impl Drop for VulkanQueryPool {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_query_pool(self.pool, None) };
    }
}

/// Keep only the bits the queue actually writes
pub(crate) fn mask_timestamp(value: u64, valid_bits: u32) -> u64 {
    if valid_bits >= 64 {
        value
    } else {
        value & ((1u64 << valid_bits) - 1)
    }
}

pub(crate) fn ticks_to_milliseconds(ticks: u64, period_ns: f32) -> f64 {
    ticks as f64 * period_ns as f64 / 1_000_000.0
}

#[cfg(test)]
#[path = "vulkan_query_pool_tests.rs"]
mod tests;
