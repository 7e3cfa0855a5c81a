/// VulkanDevice - Vulkan implementation of the GraphicsDevice contract
///
/// Owns the instance, the presentation surface, the logical device, its
/// queues and the GPU memory allocator. Every other Vulkan object is created
/// and destroyed on behalf of the frame core through `GraphicsDevice`.

use ash::vk;
use galaxy_3d_frame::galaxy3d::device::QueueFamilies;
use galaxy_3d_frame::galaxy3d::{Config, Error, Result};
use galaxy_3d_frame::{engine_debug, engine_error, engine_info, engine_warn};
use gpu_allocator::vulkan::{Allocation, Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Set while a VulkanDevice is alive
static DEVICE_ALIVE: AtomicBool = AtomicBool::new(false);

/// Claim on the single logical device allowed per process
///
/// Released on drop, including when device creation fails half-way.
struct ProcessDeviceSlot;

impl ProcessDeviceSlot {
    fn acquire() -> Result<Self> {
        DEVICE_ALIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ProcessDeviceSlot)
            .map_err(|_| {
                engine_error!("galaxy3d::vulkan", "A VulkanDevice already exists in this process");
                Error::InitializationFailed("only one VulkanDevice may exist per process".to_string())
            })
    }
}

impl Drop for ProcessDeviceSlot {
    fn drop(&mut self) {
        DEVICE_ALIVE.store(false, Ordering::Release);
    }
}

/// Vulkan graphics device
pub struct VulkanDevice {
    /// Keeps the Vulkan library loaded
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    pub(crate) surface_loader: ash::khr::surface::Instance,
    pub(crate) surface: vk::SurfaceKHR,

    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,

    pub(crate) queue_families: QueueFamilies,
    /// Families a queue was created on (queue index 0 only)
    pub(crate) created_families: Vec<u32>,
    /// vkQueueSubmit and vkQueuePresentKHR require external synchronization
    pub(crate) queue_lock: Mutex<()>,
    pub(crate) anisotropy_supported: bool,

    /// Dropped before the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Memory backing images created through `create_image`, keyed by raw image handle
    pub(crate) image_allocations: Mutex<FxHashMap<u64, Allocation>>,
    /// Memory backing buffers, keyed by raw buffer handle
    pub(crate) buffer_allocations: Mutex<FxHashMap<u64, Allocation>>,

    _slot: ProcessDeviceSlot,
}

impl VulkanDevice {
    /// Create the Vulkan device for a window
    ///
    /// # Arguments
    ///
    /// * `window` - Window providing the display and window handles
    /// * `config` - Application name/version and validation settings
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when another device is alive or a Vulkan call fails,
    /// `NoSuitableDevice` when no GPU can render and present to the surface,
    /// `MissingExtension` when the only candidates lack `VK_KHR_swapchain`.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        config.validate()?;
        let slot = ProcessDeviceSlot::acquire()?;

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.clone()).map_err(|_| {
                Error::InitializationFailed("app_name contains a NUL byte".to_string())
            })?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Galaxy3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("galaxy3d::vulkan", "Failed to get required extensions: {}", e);
                    Error::MissingExtension(format!("surface extensions: {}", e))
                })?
                .to_vec();

            let validation = validation_compiled_in(config.enable_validation);
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let debug_messenger = if validation {
                create_debug_messenger(&entry, &instance, config)?
            } else {
                None
            };

            let window_handle = window.window_handle().map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let (physical_device, queue_families) =
                pick_physical_device(&instance, &surface_loader, surface)?;

            // One queue per distinct family
            let mut created_families = vec![queue_families.graphics];
            for family in [Some(queue_families.present), queue_families.compute].into_iter().flatten() {
                if !created_families.contains(&family) {
                    created_families.push(family);
                }
            }
            let queue_priorities = [1.0];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = created_families
                .iter()
                .map(|&family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let supported_features = instance.get_physical_device_features(physical_device);
            let anisotropy_supported = supported_features.sampler_anisotropy == vk::TRUE;
            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(anisotropy_supported);

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("galaxy3d::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            engine_info!("galaxy3d::vulkan",
                "Vulkan device ready (graphics family {}, present family {}, validation {})",
                queue_families.graphics, queue_families.present,
                if validation { "on" } else { "off" });

            Ok(Self {
                _entry: entry,
                instance,
                debug_messenger,
                surface_loader,
                surface,
                physical_device,
                device,
                swapchain_loader,
                queue_families,
                created_families,
                queue_lock: Mutex::new(()),
                anisotropy_supported,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                image_allocations: Mutex::new(FxHashMap::default()),
                buffer_allocations: Mutex::new(FxHashMap::default()),
                _slot: slot,
            })
        }
    }

    /// Whether a VulkanDevice is currently alive in this process
    pub fn is_alive() -> bool {
        DEVICE_ALIVE.load(Ordering::Acquire)
    }

    /// Name of the selected GPU
    pub fn device_name(&self) -> String {
        unsafe {
            let properties = self.instance.get_physical_device_properties(self.physical_device);
            properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        }
    }
}

/// Validation is only available when compiled in
fn validation_compiled_in(requested: bool) -> bool {
    if requested && !cfg!(feature = "vulkan-validation") {
        engine_warn!("galaxy3d::vulkan",
            "Validation requested but the 'vulkan-validation' feature is disabled");
    }
    requested && cfg!(feature = "vulkan-validation")
}

#[cfg(feature = "vulkan-validation")]
unsafe fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: &Config,
) -> Result<Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    crate::debug::init_debug_config(config.debug_severity);

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::messenger_severity_flags(config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = debug_utils
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| {
            engine_error!("galaxy3d::vulkan", "Failed to create debug messenger: {:?}", e);
            Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
        })?;

    Ok(Some((debug_utils, messenger)))
}

#[cfg(not(feature = "vulkan-validation"))]
unsafe fn create_debug_messenger(
    _entry: &ash::Entry,
    _instance: &ash::Instance,
    _config: &Config,
) -> Result<Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>> {
    Ok(None)
}

/// Preference of a GPU type when several can present
pub(crate) fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

/// Resolve graphics, present and compute families from family capabilities
///
/// `families[i]` is the queue flags of family `i` and whether it can present.
/// Present prefers the graphics family; compute prefers a dedicated family.
pub(crate) fn resolve_queue_families(families: &[(vk::QueueFlags, bool)]) -> Option<QueueFamilies> {
    let graphics = families
        .iter()
        .position(|(flags, _)| flags.contains(vk::QueueFlags::GRAPHICS))? as u32;

    let present = if families[graphics as usize].1 {
        graphics
    } else {
        families.iter().position(|(_, present)| *present)? as u32
    };

    let compute = families
        .iter()
        .position(|(flags, _)| {
            flags.contains(vk::QueueFlags::COMPUTE) && !flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .or_else(|| {
            families
                .iter()
                .position(|(flags, _)| flags.contains(vk::QueueFlags::COMPUTE))
        })
        .map(|index| index as u32);

    Some(QueueFamilies { graphics, present, compute })
}

unsafe fn supports_swapchain_extension(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
    instance
        .enumerate_device_extension_properties(physical_device)
        .map(|extensions| {
            extensions.iter().any(|ext| {
                ext.extension_name_as_c_str()
                    .map(|name| name == ash::khr::swapchain::NAME)
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

/// Pick the best GPU able to render and present to `surface`
unsafe fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
        engine_error!("galaxy3d::vulkan", "Failed to enumerate physical devices: {:?}", e);
        Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
    })?;

    let mut best: Option<(u32, vk::PhysicalDevice, QueueFamilies)> = None;
    let mut lacks_swapchain = false;

    for physical_device in physical_devices {
        let properties = instance.get_physical_device_properties(physical_device);
        let name = properties
            .device_name_as_c_str()
            .map(CStr::to_string_lossy)
            .unwrap_or_default()
            .into_owned();

        let families: Vec<(vk::QueueFlags, bool)> = instance
            .get_physical_device_queue_family_properties(physical_device)
            .iter()
            .enumerate()
            .map(|(index, family)| {
                let present = surface_loader
                    .get_physical_device_surface_support(physical_device, index as u32, surface)
                    .unwrap_or(false);
                (family.queue_flags, present)
            })
            .collect();

        let Some(queue_families) = resolve_queue_families(&families) else {
            engine_debug!("galaxy3d::vulkan", "Skipping '{}': no graphics/present queue", name);
            continue;
        };
        if !supports_swapchain_extension(instance, physical_device) {
            engine_debug!("galaxy3d::vulkan", "Skipping '{}': VK_KHR_swapchain unsupported", name);
            lacks_swapchain = true;
            continue;
        }

        let score = device_type_score(properties.device_type);
        engine_debug!("galaxy3d::vulkan", "Candidate GPU '{}' (score {})", name, score);
        if best.map_or(true, |(best_score, _, _)| score > best_score) {
            best = Some((score, physical_device, queue_families));
        }
    }

    match best {
        Some((_, physical_device, queue_families)) => Ok((physical_device, queue_families)),
        None if lacks_swapchain => {
            engine_error!("galaxy3d::vulkan", "No GPU supports VK_KHR_swapchain");
            Err(Error::MissingExtension("VK_KHR_swapchain".to_string()))
        }
        None => {
            engine_error!("galaxy3d::vulkan", "No GPU can render and present to the surface");
            Err(Error::NoSuitableDevice(
                "no physical device with graphics and present queues".to_string(),
            ))
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Free memory the core never released, while the allocator is alive
            {
                let mut allocator = self.allocator.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                let images = self.image_allocations.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
                let buffers = self.buffer_allocations.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
                if !images.is_empty() || !buffers.is_empty() {
                    engine_warn!("galaxy3d::vulkan",
                        "Device dropped with {} image(s) and {} buffer(s) still allocated",
                        images.len(), buffers.len());
                }
                for (raw, allocation) in images.drain() {
                    allocator.free(allocation).ok();
                    self.device.destroy_image(crate::vulkan_conversions::vk_handle(raw), None);
                }
                for (raw, allocation) in buffers.drain() {
                    allocator.free(allocation).ok();
                    self.device.destroy_buffer(crate::vulkan_conversions::vk_handle(raw), None);
                }
            }

            // 2. Drop allocator: frees VkDeviceMemory blocks BEFORE the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Stop forwarding validation messages, then destroy the messenger
            crate::debug::clear_debug_config();
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 4. Surface, device, instance
            self.surface_loader.destroy_surface(self.surface, None);
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        engine_info!("galaxy3d::vulkan", "Vulkan device destroyed");
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
