//! Swapchain management.

use crate::error::{GpuError, Result};
use crate::instance::QueueFamilies;
use crate::sync::GPU_TIMEOUT_NS;
use ash::vk;

/// Surface format every swapchain is created with.
pub const SWAPCHAIN_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
/// Color space paired with [`SWAPCHAIN_FORMAT`].
pub const SWAPCHAIN_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;
/// FIFO is the only present mode Vulkan guarantees on every driver.
pub const SWAPCHAIN_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// Clamp a desired extent into the surface's supported range, per component.
pub fn clamp_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One image above the minimum, capped by the maximum when one exists.
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

/// EXCLUSIVE when one family owns every role, CONCURRENT otherwise.
pub fn sharing_mode(unique_families: &[u32]) -> vk::SharingMode {
    if unique_families.len() > 1 {
        vk::SharingMode::CONCURRENT
    } else {
        vk::SharingMode::EXCLUSIVE
    }
}

/// Swapchain wrapper.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a new swapchain.
    ///
    /// Resize policy is destroy-then-recreate, so no old swapchain is
    /// passed here.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        desired_extent: vk::Extent2D,
        queue_families: &QueueFamilies,
    ) -> Result<Self> {
        let extent = clamp_extent(surface_capabilities, desired_extent);
        let image_count = select_image_count(surface_capabilities);
        let unique_families = queue_families.unique();
        let mode = sharing_mode(&unique_families);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(SWAPCHAIN_FORMAT)
            .image_color_space(SWAPCHAIN_COLOR_SPACE)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(mode)
            .queue_family_indices(&unique_families)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(SWAPCHAIN_PRESENT_MODE)
            .clipped(true);

        let swapchain = swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = swapchain_loader.get_swapchain_images(swapchain)?;

        let image_views: Vec<_> = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(SWAPCHAIN_FORMAT)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .base_mip_level(0)
                            .level_count(1)
                            .base_array_layer(0)
                            .layer_count(1),
                    );

                device.create_image_view(&view_info, None)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(
            "Swapchain created: {}x{}, {} images",
            extent.width,
            extent.height,
            images.len()
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            format: SWAPCHAIN_FORMAT,
            extent,
        })
    }

    /// Acquire the next image, returning its view and index.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
    ) -> Result<(vk::ImageView, u32)> {
        let (index, _suboptimal) = swapchain_loader.acquire_next_image(
            self.swapchain,
            GPU_TIMEOUT_NS,
            semaphore,
            vk::Fence::null(),
        )?;

        Ok((self.image_views[index as usize], index))
    }

    /// Present an image.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        swapchain_loader.queue_present(queue, &present_info)?;
        Ok(())
    }

    /// Take ownership of the handles, leaving the wrapper drained.
    ///
    /// A drained swapchain holds no views and a null handle, so a second
    /// [`destroy`](Self::destroy) is a no-op.
    fn drain(&mut self) -> (Vec<vk::ImageView>, vk::SwapchainKHR) {
        let views = std::mem::take(&mut self.image_views);
        let handle = std::mem::replace(&mut self.swapchain, vk::SwapchainKHR::null());
        (views, handle)
    }

    /// Destroy the swapchain, views first. Idempotent.
    ///
    /// # Safety
    /// The handles must be valid or already drained, and the swapchain must
    /// not be in use.
    pub unsafe fn destroy(
        &mut self,
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
    ) {
        let (views, handle) = self.drain();
        for view in views {
            device.destroy_image_view(view, None);
        }
        if handle != vk::SwapchainKHR::null() {
            swapchain_loader.destroy_swapchain(handle, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(
        current: vk::Extent2D,
        min: vk::Extent2D,
        max: vk::Extent2D,
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: min,
            max_image_extent: max,
            min_image_count: min_images,
            max_image_count: max_images,
            ..Default::default()
        }
    }

    #[test]
    fn fixed_current_extent_wins() {
        let caps = capabilities(
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            vk::Extent2D {
                width: 1,
                height: 1,
            },
            vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            2,
            8,
        );
        let extent = clamp_extent(
            &caps,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn flexible_extent_clamps_per_component() {
        let caps = capabilities(
            vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            vk::Extent2D {
                width: 100,
                height: 200,
            },
            vk::Extent2D {
                width: 1000,
                height: 2000,
            },
            2,
            8,
        );
        let extent = clamp_extent(
            &caps,
            vk::Extent2D {
                width: 50,
                height: 5000,
            },
        );
        assert_eq!(extent.width, 100);
        assert_eq!(extent.height, 2000);
    }

    #[test]
    fn image_count_is_min_plus_one() {
        let caps = capabilities(
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            2,
            8,
        );
        assert_eq!(select_image_count(&caps), 3);
    }

    #[test]
    fn image_count_respects_maximum() {
        let caps = capabilities(
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            3,
            3,
        );
        assert_eq!(select_image_count(&caps), 3);
    }

    #[test]
    fn zero_maximum_means_unbounded() {
        let caps = capabilities(
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            4,
            0,
        );
        assert_eq!(select_image_count(&caps), 5);
    }

    #[test]
    fn sharing_mode_follows_family_count() {
        assert_eq!(sharing_mode(&[0]), vk::SharingMode::EXCLUSIVE);
        assert_eq!(sharing_mode(&[0, 1]), vk::SharingMode::CONCURRENT);
        assert_eq!(sharing_mode(&[0, 1, 2]), vk::SharingMode::CONCURRENT);
    }

    #[test]
    fn drain_leaves_nothing_for_a_second_destroy() {
        use ash::vk::Handle;

        let mut swapchain = Swapchain {
            swapchain: vk::SwapchainKHR::from_raw(0x1),
            images: vec![vk::Image::from_raw(0x2)],
            image_views: vec![vk::ImageView::from_raw(0x3)],
            format: SWAPCHAIN_FORMAT,
            extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
        };

        let (views, handle) = swapchain.drain();
        assert_eq!(views.len(), 1);
        assert_ne!(handle, vk::SwapchainKHR::null());

        // After a failed recreate the wrapper may be destroyed again; the
        // second pass must find no live handles.
        let (views, handle) = swapchain.drain();
        assert!(views.is_empty());
        assert_eq!(handle, vk::SwapchainKHR::null());
    }
}
