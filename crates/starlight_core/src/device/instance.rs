//! Vulkan instance creation
//!
//! Loads the Vulkan library, picks layers and extensions for the windowed or
//! headless case and creates the instance. When the validation layer ends up
//! enabled a debug messenger forwards its output to `log`.

use std::ffi::{c_char, c_void, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};

use super::{VulkanError, VulkanResult};
use crate::config::AppInfo;
use crate::version;
use crate::window::SurfaceProvider;

/// Khronos validation layer
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Layers to enable given what the loader reports
///
/// Validation is only requested when asked for and actually installed.
pub fn required_layers(available: &[vk::LayerProperties], validation: bool) -> Vec<&'static CStr> {
    if !validation {
        return Vec::new();
    }

    let installed = available
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);

    if installed {
        vec![VALIDATION_LAYER]
    } else {
        log::warn!(
            "Validation requested but {} is not installed, continuing without it",
            VALIDATION_LAYER.to_string_lossy()
        );
        Vec::new()
    }
}

/// Instance extensions for the given window and debug setup
pub fn required_extensions(
    window: Option<&dyn SurfaceProvider>,
    debug_utils: bool,
) -> VulkanResult<Vec<CString>> {
    let mut extensions = match window {
        Some(window) => window
            .required_instance_extensions()
            .map_err(|e| {
                VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}"))
            })?
            .into_iter()
            .map(|name| {
                CString::new(name).map_err(|e| {
                    VulkanError::InitializationFailed(format!("Invalid extension name: {e}"))
                })
            })
            .collect::<VulkanResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    if debug_utils {
        extensions.push(DebugUtils::name().to_owned());
    }

    Ok(extensions)
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    instance: Instance,
    entry: Entry,
}

impl VulkanInstance {
    /// Create the instance for `app`, windowed when a surface provider is given
    pub fn new(
        app: &AppInfo,
        window: Option<&dyn SurfaceProvider>,
        enable_validation: bool,
    ) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let available_layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;
        let layers = required_layers(&available_layers, enable_validation);
        let validation = !layers.is_empty();

        let extensions = required_extensions(window, validation)?;

        let app_name = CString::new(app.name.as_str()).map_err(|e| {
            VulkanError::InitializationFailed(format!("Invalid application name: {e}"))
        })?;
        let engine_name = CString::new(version::NAME).map_err(|e| {
            VulkanError::InitializationFailed(format!("Invalid engine name: {e}"))
        })?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(app.packed_version())
            .engine_name(&engine_name)
            .engine_version(version::packed())
            .api_version(vk::API_VERSION_1_3);

        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|name| name.as_ptr()).collect();
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!(
            "Created Vulkan instance for {} {}.{}.{} ({} extension(s), validation: {validation})",
            app.name,
            app.major,
            app.minor,
            app.patch,
            extensions.len()
        );

        Ok(Self {
            debug,
            instance,
            entry,
        })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Loaded instance-level entry points
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Loaded Vulkan library
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Raw instance handle
    pub fn handle(&self) -> vk::Instance {
        self.instance.handle()
    }

    /// Whether validation output is being forwarded to the log
    pub fn validation_enabled(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = &self.debug {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}
