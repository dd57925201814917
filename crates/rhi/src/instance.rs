//! Vulkan instance management.
//!
//! This module handles VkInstance creation, the validation layer and the debug
//! messenger.
//!
//! Validation is a runtime switch. The [`DebugMessenger`] is always part of the
//! instance but stays inert when validation is off or the layer is missing.
//!
//! # Example
//!
//! ```no_run
//! use tessera_rhi::instance::Instance;
//!
//! let instance = Instance::new(true, &[]).expect("Failed to create Vulkan instance");
//! assert!(instance.handle().handle() != ash::vk::Instance::null());
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{Level, debug, error, info, trace, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Routes validation layer output into tracing.
///
/// Holds no Vulkan objects when disabled, so it can always be constructed.
pub struct DebugMessenger {
    inner: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl DebugMessenger {
    /// A messenger that reports nothing.
    pub fn inert() -> Self {
        Self { inner: None }
    }

    /// Creates the messenger when `enabled`, otherwise returns an inert one.
    fn new(entry: &Entry, instance: &ash::Instance, enabled: bool) -> RhiResult<Self> {
        if !enabled {
            return Ok(Self::inert());
        }

        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = messenger_create_info();
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        info!("Debug messenger created");

        Ok(Self {
            inner: Some((loader, messenger)),
        })
    }

    /// Whether messages are being forwarded.
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// Destroys the messenger. Must run before the instance is destroyed.
    fn destroy(&mut self) {
        if let Some((loader, messenger)) = self.inner.take() {
            unsafe {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
        }
    }
}

fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Vulkan instance wrapper.
///
/// Dropping it destroys the debug messenger and then the instance.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_messenger: DebugMessenger,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// `surface_extensions` are the platform extensions reported by the window.
    /// When `enable_validation` is set and the Khronos layer is installed, the
    /// layer and debug-utils extension are enabled and the messenger also
    /// covers instance creation itself.
    pub fn new(enable_validation: bool, surface_extensions: &[*const c_char]) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Tessera")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"Tessera")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let extensions = Self::required_extensions(surface_extensions, validation_available);
        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let mut instance_messenger_info = messenger_create_info();
        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        if validation_available {
            create_info = create_info.push_next(&mut instance_messenger_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!(
            "Vulkan instance created (API 1.3, validation {})",
            if validation_available { "on" } else { "off" }
        );

        let debug_messenger = match DebugMessenger::new(&entry, &instance, validation_available) {
            Ok(messenger) => messenger,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        Ok(Self {
            entry,
            instance,
            debug_messenger,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation messages are being reported.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_active()
    }

    /// Surface extensions plus debug-utils when validation is on.
    fn required_extensions(
        surface_extensions: &[*const c_char],
        validation: bool,
    ) -> Vec<*const c_char> {
        let mut extensions = surface_extensions.to_vec();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        extensions
    }

    /// Checks if the Khronos validation layer is available.
    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };

        Ok(available_layers.iter().any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
        }))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.debug_messenger.destroy();
        unsafe {
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Maps a validation message severity onto a tracing level.
pub fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}

fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    }
}

/// Debug callback for validation layer messages.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid (or null) callback data pointer.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let type_str = message_type_name(message_type);

    match severity_level(message_severity) {
        Level::ERROR => error!("[Vulkan {}] {}", type_str, message),
        Level::WARN => warn!("[Vulkan {}] {}", type_str, message),
        Level::DEBUG => debug!("[Vulkan {}] {}", type_str, message),
        _ => trace!("[Vulkan {}] {}", type_str, message),
    }

    // Never abort the call that triggered the message
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_creation_without_validation() {
        match Instance::new(false, &[]) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_instance_creation_with_validation() {
        match Instance::new(true, &[]) {
            Ok(instance) => {
                // Depends on whether the SDK layers are installed
                if instance.has_validation() {
                    assert!(instance.debug_messenger.is_active());
                }
            }
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_inert_messenger() {
        let mut messenger = DebugMessenger::inert();
        assert!(!messenger.is_active());
        messenger.destroy();
        assert!(!messenger.is_active());
    }

    #[test]
    fn test_required_extensions_adds_debug_utils_only_with_validation() {
        let surface = [ash::khr::surface::NAME.as_ptr()];

        let without = Instance::required_extensions(&surface, false);
        assert_eq!(without.len(), 1);

        let with = Instance::required_extensions(&surface, true);
        assert_eq!(with.len(), 2);
        assert_eq!(with[1], ash::ext::debug_utils::NAME.as_ptr());
    }

    #[test]
    fn test_severity_level() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        assert_eq!(severity_level(S::ERROR), Level::ERROR);
        assert_eq!(severity_level(S::WARNING), Level::WARN);
        assert_eq!(severity_level(S::INFO), Level::DEBUG);
        assert_eq!(severity_level(S::VERBOSE), Level::TRACE);
        assert_eq!(severity_level(S::WARNING | S::ERROR), Level::ERROR);
    }

    #[test]
    fn test_message_type_name() {
        use vk::DebugUtilsMessageTypeFlagsEXT as T;
        assert_eq!(message_type_name(T::VALIDATION), "Validation");
        assert_eq!(message_type_name(T::PERFORMANCE), "Performance");
        assert_eq!(message_type_name(T::GENERAL | T::VALIDATION), "Unknown");
    }
}
