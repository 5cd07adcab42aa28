//! Round-robin command list pool

use crate::error::{Error, Result};
use crate::render::{CommandList, RenderDevice};
use crate::rhi_debug;

/// Round-robin pool; a list handed out again after `capacity` allocations may
/// still be executing, so size the pool for the frames in flight
pub struct CommandListPool {
    command_lists: Vec<CommandList>,
    available_index: usize,
}

impl CommandListPool {
    /// Create `capacity` command lists
    pub fn create(device: &RenderDevice, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidResource("Command list pool capacity must be > 0".to_string()));
        }

        let mut command_lists = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            match CommandList::create(device) {
                Ok(command_list) => command_lists.push(command_list),
                Err(e) => {
                    for mut created in command_lists {
                        created.destroy(device);
                    }
                    return Err(e);
                }
            }
        }

        rhi_debug!("flint::CommandListPool", "Created pool of {} command lists", capacity);

        Ok(Self {
            command_lists,
            available_index: 0,
        })
    }

    /// Pool sized by `RenderDeviceConfig::command_list_capacity`
    pub fn with_default_capacity(device: &RenderDevice) -> Result<Self> {
        Self::create(device, device.config().command_list_capacity)
    }

    /// Next command list in round-robin order
    pub fn allocate(&mut self) -> &mut CommandList {
        let index = self.available_index;
        self.available_index += 1;
        if self.available_index >= self.command_lists.len() {
            self.available_index = 0;
        }
        &mut self.command_lists[index]
    }

    pub fn capacity(&self) -> u32 {
        self.command_lists.len() as u32
    }

    /// Release every native list (the emptied lists reject further use)
    pub fn destroy(&mut self, device: &RenderDevice) {
        for command_list in &mut self.command_lists {
            command_list.destroy(device);
        }
        self.available_index = 0;
    }
}

#[cfg(test)]
#[path = "command_list_pool_tests.rs"]
mod tests;
