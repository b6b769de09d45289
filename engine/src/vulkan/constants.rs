use vulkanalia::{vk, Version};

pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);
pub const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");
pub const DEVICE_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

/// How many frames the CPU may record ahead of the GPU. Decoupled from the
/// swapchain image count, which is queried from the surface at runtime.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound on sampler descriptor sets, one per loaded texture.
pub const MAX_TEXTURES: u32 = 64;

pub const VERTEX_SHADER_PATH: &str = "shaders/vert.spv";
pub const FRAGMENT_SHADER_PATH: &str = "shaders/frag.spv";
pub const TEXTURE_DIR: &str = "assets/textures";

pub const BACKGROUND_CLEAR_COLOR: [f32; 4] = [0.6, 0.65, 0.4, 1.0];

pub const DEPTH_FORMAT_CANDIDATES: &[vk::Format] = &[
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
];
