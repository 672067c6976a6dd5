// Command and descriptor pools
//
// One command pool on the graphics family with a single primary command
// buffer, and a general-purpose descriptor pool. Nothing is recorded or
// allocated from them here.

use ash::vk;

use crate::error::{Error, Result, VkResultExt};

/// Descriptors of each type the pool can hand out
const DESCRIPTORS_PER_TYPE: u32 = 32;
const MAX_DESCRIPTOR_SETS: u32 = 32;

const POOL_DESCRIPTOR_TYPES: [vk::DescriptorType; 7] = [
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
];

pub struct CommandResources {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub descriptor_pool: vk::DescriptorPool,
}

impl CommandResources {
    pub fn new(device: &ash::Device, graphics_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .creating("command pool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        // Freed along with the pool
        let command_buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(result) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(Error::NativeCreation {
                    what: "command buffer",
                    result,
                });
            }
        };

        let pool_sizes = descriptor_pool_sizes();
        let descriptor_pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(MAX_DESCRIPTOR_SETS);

        let descriptor_pool =
            match unsafe { device.create_descriptor_pool(&descriptor_pool_info, None) } {
                Ok(pool) => pool,
                Err(result) => {
                    unsafe { device.destroy_command_pool(command_pool, None) };
                    return Err(Error::NativeCreation {
                        what: "descriptor pool",
                        result,
                    });
                }
            };

        log::info!("Created command pool on queue family {}", graphics_family);

        Ok(Self {
            command_pool,
            command_buffer,
            descriptor_pool,
        })
    }

    /// # Safety
    /// No command buffer from the pool may still be executing.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_descriptor_pool(self.descriptor_pool, None);
        device.destroy_command_pool(self.command_pool, None);
    }
}

fn descriptor_pool_sizes() -> Vec<vk::DescriptorPoolSize> {
    POOL_DESCRIPTOR_TYPES
        .iter()
        .map(|&ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: DESCRIPTORS_PER_TYPE,
        })
        .collect()
}
