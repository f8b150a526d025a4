//! Vulkan instance creation, debug messenger, and device selection.

use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::{c_void, CStr, CString};

/// Required instance extensions.
pub fn required_instance_extensions() -> Vec<&'static CStr> {
    let extensions = vec![
        ash::ext::debug_utils::NAME,
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
    ];

    extensions
}

/// Validation layers to enable when requested.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Create a Vulkan instance.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name).unwrap_or_default();
    let engine_name = c"Lumen";

    // Imageless framebuffers are core in 1.2, so that is the floor.
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_2);

    let extension_names: Vec<*const i8> = required_instance_extensions()
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    let layers = if enable_validation {
        validation_layers()
    } else {
        vec![]
    };

    // A missing validation layer is a diagnostic loss, not a fatal condition.
    let available_layers = entry.enumerate_instance_layer_properties()?;
    for layer in &layers {
        let found = available_layers
            .iter()
            .any(|props| CStr::from_ptr(props.layer_name.as_ptr()) == *layer);
        if !found {
            tracing::warn!("Validation layer {:?} not available", layer);
        }
    }

    let layer_names: Vec<*const i8> = layers.iter().map(|l| l.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names);

    let instance = entry.create_instance(&create_info, None)?;

    Ok(instance)
}

/// Debug messenger callback routing validation output into `tracing`.
///
/// Always returns `vk::FALSE`: the message is a diagnostic, never a signal
/// to abort the triggering call.
unsafe extern "system" fn debug_messenger_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if data.is_null() {
        String::new()
    } else {
        CStr::from_ptr((*data).p_message)
            .to_string_lossy()
            .into_owned()
    };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!("{message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!("{message}");
    } else {
        tracing::info!("{message}");
    }

    vk::FALSE
}

/// Install the debug messenger.
///
/// # Safety
/// The loader must belong to a live instance.
pub unsafe fn create_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_messenger_callback));

    let messenger = debug_utils.create_debug_utils_messenger(&create_info, None)?;
    Ok(messenger)
}

/// Queue family indices for the three roles the renderer needs.
///
/// A single family may satisfy several roles; `unique` collapses them for
/// device creation and swapchain sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Deduplicated, sorted list of family indices.
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics, self.compute, self.present];
        families.sort_unstable();
        families.dedup();
        families
    }
}

/// Resolve the three queue roles from family properties.
///
/// `present_support[i]` reports surface support for family `i`. Later
/// families overwrite earlier ones for a role, matching a plain forward
/// scan; returns `None` when any role is unsatisfied.
pub fn resolve_queue_families(
    properties: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> Option<QueueFamilies> {
    let mut graphics = None;
    let mut compute = None;
    let mut present = None;

    for (index, family) in properties.iter().enumerate() {
        let index = index as u32;

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index);
        }

        if family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
            compute = Some(index);
        }

        if present_support.get(index as usize).copied().unwrap_or(false) {
            present = Some(index);
        }
    }

    Some(QueueFamilies {
        graphics: graphics?,
        compute: compute?,
        present: present?,
    })
}

/// Select the first physical device satisfying all three queue roles.
///
/// # Safety
/// The instance, surface loader, and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = instance.enumerate_physical_devices()?;

    for device in devices {
        let properties = instance.get_physical_device_properties(device);
        let families = instance.get_physical_device_queue_family_properties(device);

        let mut present_support = Vec::with_capacity(families.len());
        for index in 0..families.len() as u32 {
            let supported = surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .unwrap_or(false);
            present_support.push(supported);
        }

        let Some(queue_families) = resolve_queue_families(&families, &present_support) else {
            continue;
        };

        let device_name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy();
        let memory = instance.get_physical_device_memory_properties(device);
        let device_local_bytes: u64 = memory
            .memory_heaps
            .iter()
            .take(memory.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum();

        tracing::info!("GPU: {device_name}");
        tracing::info!("GPU memory: {} MiB", device_local_bytes / 1024 / 1024);
        tracing::debug!(
            "Queue families: graphics={}, compute={}, present={}",
            queue_families.graphics,
            queue_families.compute,
            queue_families.present
        );

        return Ok((device, queue_families));
    }

    Err(GpuError::NoSuitableDevice)
}

/// Create the logical device and retrieve the three role queues.
///
/// One queue is requested per *unique* family, so the returned queues may
/// alias each other.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilies,
) -> Result<(ash::Device, vk::Queue, vk::Queue, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names = [ash::khr::swapchain::NAME.as_ptr()];

    // The render pass binds attachment views at record time.
    let mut vulkan_1_2_features =
        vk::PhysicalDeviceVulkan12Features::default().imageless_framebuffer(true);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut vulkan_1_2_features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
    let compute_queue = device.get_device_queue(queue_families.compute, 0);
    let present_queue = device.get_device_queue(queue_families.present, 0);

    Ok((device, graphics_queue, compute_queue, present_queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn single_family_covers_all_roles() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let resolved = resolve_queue_families(&families, &[true]).unwrap();
        assert_eq!(
            resolved,
            QueueFamilies {
                graphics: 0,
                compute: 0,
                present: 0
            }
        );
        assert_eq!(resolved.unique(), vec![0]);
    }

    #[test]
    fn roles_spread_over_distinct_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
        ];
        let resolved = resolve_queue_families(&families, &[false, false, true]).unwrap();
        assert_eq!(
            resolved,
            QueueFamilies {
                graphics: 0,
                compute: 1,
                present: 2
            }
        );
        assert_eq!(resolved.unique(), vec![0, 1, 2]);
    }

    #[test]
    fn later_families_win_for_overlapping_roles() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let resolved = resolve_queue_families(&families, &[true, true]).unwrap();
        assert_eq!(
            resolved,
            QueueFamilies {
                graphics: 1,
                compute: 1,
                present: 1
            }
        );
    }

    #[test]
    fn missing_present_support_rejects_device() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        assert!(resolve_queue_families(&families, &[false]).is_none());
    }

    #[test]
    fn missing_compute_rejects_device() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(resolve_queue_families(&families, &[true]).is_none());
    }

    #[test]
    fn unique_is_sorted_and_deduplicated() {
        let families = QueueFamilies {
            graphics: 2,
            compute: 0,
            present: 2,
        };
        assert_eq!(families.unique(), vec![0, 2]);

        let families = QueueFamilies {
            graphics: 1,
            compute: 1,
            present: 1,
        };
        assert_eq!(families.unique(), vec![1]);
    }
}
