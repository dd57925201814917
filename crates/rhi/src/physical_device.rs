//! Physical device (GPU) selection.
//!
//! Every enumerated GPU is scored:
//!
//! 1. A missing required device extension scores -1 (rejected).
//! 2. Missing sampler anisotropy, when required, scores -1 (rejected).
//! 3. Discrete GPUs get a +50 bonus.
//!
//! Among devices with a non-negative score that also expose a queue family
//! supporting both graphics and presentation, the highest score wins. Ties keep
//! the device enumerated first.
//!
//! # Example
//!
//! ```no_run
//! use tessera_rhi::instance::Instance;
//! use tessera_rhi::physical_device::{DeviceRequirements, select_physical_device};
//! use ash::vk;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let device_info = select_physical_device(
//!     instance.handle(),
//!     surface,
//!     &surface_loader,
//!     &DeviceRequirements::default(),
//!     64,
//! )
//! .expect("No suitable GPU found");
//! println!("Selected GPU: {}", device_info.device_name());
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Device extensions every candidate must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Score given to a device that fails a hard requirement.
pub const REJECTED_SCORE: i32 = -1;

/// Bonus for discrete GPUs.
pub const DISCRETE_GPU_BONUS: i32 = 50;

/// What a physical device must offer to be considered at all.
#[derive(Clone, Debug)]
pub struct DeviceRequirements {
    /// Extensions that must all be present.
    pub extensions: Vec<&'static CStr>,
    /// Whether `samplerAnisotropy` is mandatory.
    pub sampler_anisotropy: bool,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            extensions: REQUIRED_DEVICE_EXTENSIONS.to_vec(),
            sampler_anisotropy: true,
        }
    }
}

/// Information about the selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family supporting both graphics and presentation.
    pub queue_family: u32,
    /// Highest usable MSAA sample count after applying the configured cap.
    pub msaa_samples: vk::SampleCountFlags,
    /// Score the device was selected with.
    pub score: i32,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Upper bound for sampler anisotropy on this device.
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_family", &self.queue_family)
            .field("msaa_samples", &self.msaa_samples)
            .field("score", &self.score)
            .finish()
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

/// Scores a device from its type, extensions and features.
///
/// Hard requirements are checked before the bonus, so a discrete GPU missing
/// an extension still scores [`REJECTED_SCORE`].
pub fn score_device(
    device_type: vk::PhysicalDeviceType,
    available_extensions: &[&CStr],
    features: &vk::PhysicalDeviceFeatures,
    requirements: &DeviceRequirements,
) -> i32 {
    let has_extensions = requirements
        .extensions
        .iter()
        .all(|required| available_extensions.contains(required));
    if !has_extensions {
        return REJECTED_SCORE;
    }

    if requirements.sampler_anisotropy && features.sampler_anisotropy == vk::FALSE {
        return REJECTED_SCORE;
    }

    let mut score = 0;
    if device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_GPU_BONUS;
    }
    score
}

/// Returns the first queue family supporting graphics that can also present.
pub fn find_graphics_present_family(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, family)| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|(i, _)| i as u32)
        .find(|&i| supports_present(i))
}

/// Picks the winning candidate from `(score, queue_family)` pairs.
///
/// Candidates with a negative score or no usable queue family are skipped.
/// On equal scores the earlier candidate is kept.
pub fn pick_best_candidate(candidates: &[(i32, Option<u32>)]) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (index, &(score, queue_family)) in candidates.iter().enumerate() {
        if score < 0 || queue_family.is_none() {
            continue;
        }
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Highest sample count supported by both color and depth framebuffers,
/// capped at `max_samples` (itself at most 64).
pub fn max_usable_sample_count(
    limits: &vk::PhysicalDeviceLimits,
    max_samples: u32,
) -> vk::SampleCountFlags {
    let counts =
        limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;

    [
        (64, vk::SampleCountFlags::TYPE_64),
        (32, vk::SampleCountFlags::TYPE_32),
        (16, vk::SampleCountFlags::TYPE_16),
        (8, vk::SampleCountFlags::TYPE_8),
        (4, vk::SampleCountFlags::TYPE_4),
        (2, vk::SampleCountFlags::TYPE_2),
    ]
    .into_iter()
    .find(|&(samples, flag)| samples <= max_samples && counts.contains(flag))
    .map_or(vk::SampleCountFlags::TYPE_1, |(_, flag)| flag)
}

/// Selects the most suitable physical device for rendering to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    requirements: &DeviceRequirements,
    max_msaa_samples: u32,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut candidates = Vec::with_capacity(devices.len());
    for &device in &devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let extension_properties =
            unsafe { instance.enumerate_device_extension_properties(device)? };
        let extensions: Vec<&CStr> = extension_properties
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .collect();

        let score = score_device(properties.device_type, &extensions, &features, requirements);

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let queue_family = find_graphics_present_family(&families, |i| unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        });

        debug!(
            "GPU '{}' ({}) - score {}, graphics+present family {:?}",
            properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy())
                .unwrap_or_default(),
            device_type_name(properties.device_type),
            score,
            queue_family
        );

        candidates.push((score, queue_family));
    }

    let Some(index) = pick_best_candidate(&candidates) else {
        warn!("No GPU passed scoring with a graphics+present queue family");
        return Err(RhiError::NoSuitableGpu);
    };

    let device = devices[index];
    let (score, queue_family) = candidates[index];
    let queue_family = queue_family.ok_or(RhiError::NoSuitableGpu)?;

    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let msaa_samples = max_usable_sample_count(&properties.limits, max_msaa_samples);

    let selected = PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_family,
        msaa_samples,
        score,
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, score {}, MSAA {:?}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        score,
        msaa_samples
    );

    Ok(selected)
}
