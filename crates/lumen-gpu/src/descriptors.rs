//! Descriptor set management.

use crate::error::Result;
use ash::vk;

/// Sets one allocator pool can hand out.
pub const MAX_DESCRIPTOR_SETS: u32 = 16;
/// Uniform buffer descriptors per pool.
pub const MAX_UNIFORM_BUFFERS: u32 = 16;
/// Storage buffer descriptors per pool.
pub const MAX_STORAGE_BUFFERS: u32 = 16;

/// Description of a single buffer binding within a descriptor set.
#[derive(Clone, Copy)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub range: u64,
    pub descriptor_type: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
}

/// Pool-backed allocator for descriptor sets.
pub struct DescriptorSetAllocator {
    pool: vk::DescriptorPool,
}

impl DescriptorSetAllocator {
    /// Create the backing pool, sized by the module constants.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(MAX_UNIFORM_BUFFERS),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(MAX_STORAGE_BUFFERS),
        ];

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(MAX_DESCRIPTOR_SETS)
            .pool_sizes(&pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);

        let pool = device.create_descriptor_pool(&create_info, None)?;
        Ok(Self { pool })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Reset the pool, freeing all descriptor sets.
    ///
    /// # Safety
    /// The device must be valid and no set from this pool may be in use.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        device.reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        Ok(())
    }

    /// Destroy the pool, invalidating all sets allocated from it.
    ///
    /// # Safety
    /// The device must be valid and no set from this pool may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_descriptor_pool(self.pool, None);
    }
}

/// A descriptor set together with the layout it was allocated against.
///
/// The layout is derived from the bindings, and every binding is written in
/// one batched `vkUpdateDescriptorSets` call at creation time.
pub struct DescriptorSet {
    pub set: vk::DescriptorSet,
    pub layout: vk::DescriptorSetLayout,
}

impl DescriptorSet {
    /// Allocate and fully write a descriptor set.
    ///
    /// # Safety
    /// The device, pool, and every buffer in `bindings` must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        allocator: &DescriptorSetAllocator,
        bindings: &[DescriptorBinding],
    ) -> Result<Self> {
        let layout_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(1)
                    .stage_flags(b.stages)
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
        let layout = device.create_descriptor_set_layout(&layout_info, None)?;

        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(allocator.handle())
            .set_layouts(&layouts);

        let set = match device.allocate_descriptor_sets(&alloc_info) {
            Ok(sets) => sets[0],
            Err(err) => {
                device.destroy_descriptor_set_layout(layout, None);
                return Err(err.into());
            }
        };

        // buffer_info slices borrow from this Vec, so it must outlive the
        // update call.
        let buffer_infos: Vec<vk::DescriptorBufferInfo> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorBufferInfo::default()
                    .buffer(b.buffer)
                    .offset(b.offset)
                    .range(b.range)
            })
            .collect();

        let writes: Vec<vk::WriteDescriptorSet> = bindings
            .iter()
            .zip(buffer_infos.iter())
            .map(|(b, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .buffer_info(std::slice::from_ref(info))
            })
            .collect();

        device.update_descriptor_sets(&writes, &[]);

        Ok(Self { set, layout })
    }

    /// Free the set and its layout.
    ///
    /// # Safety
    /// The device must be valid and the set must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device, allocator: &DescriptorSetAllocator) {
        // Pool was created with FREE_DESCRIPTOR_SET, so individual frees
        // are allowed.
        let _ = device.free_descriptor_sets(allocator.handle(), &[self.set]);
        device.destroy_descriptor_set_layout(self.layout, None);
    }
}
