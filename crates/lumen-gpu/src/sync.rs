//! Synchronization primitives and the per-frame sync bundle.

use crate::error::Result;
use ash::vk;

/// Timeout applied to every blocking wait, in nanoseconds.
pub const GPU_TIMEOUT_NS: u64 = 5_000_000_000;

/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = device.create_semaphore(&create_info, None)?;
    Ok(semaphore)
}

/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };
    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = device.create_fence(&create_info, None)?;
    Ok(fence)
}

/// Block until the fence signals or [`GPU_TIMEOUT_NS`] elapses.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.wait_for_fences(&[fence], true, GPU_TIMEOUT_NS)?;
    Ok(())
}

/// # Safety
/// The device and fence must be valid, and no queue may be waiting on it.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence])?;
    Ok(())
}

/// Synchronization objects for one frame in flight.
///
/// The fence starts unsignaled: the frame loop submits work before it ever
/// waits, so a signaled initial state would mask a missed submit.
pub struct FrameSync {
    pub next_image_acquired: vk::Semaphore,
    pub rendering_finished: vk::Semaphore,
    pub gpu_work_finished: vk::Fence,
}

impl FrameSync {
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        Ok(Self {
            next_image_acquired: create_semaphore(device)?,
            rendering_finished: create_semaphore(device)?,
            gpu_work_finished: create_fence(device, false)?,
        })
    }

    /// # Safety
    /// The device must be valid and no submitted work may still reference
    /// these objects.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.next_image_acquired, None);
        device.destroy_semaphore(self.rendering_finished, None);
        device.destroy_fence(self.gpu_work_finished, None);
    }
}
