use anyhow::Result;
use winit::window::Window;

use crate::config::Config;
use crate::vulkan::VulkanRenderer;
use crate::Mat4;

#[derive(Debug)]
pub struct Renderer {
    pub vk_renderer: VulkanRenderer,
}

impl Renderer {
    /// Creates our Vulkan renderer.
    pub unsafe fn create(window: &Window, config: &Config) -> Result<Self> {
        let vk_renderer = VulkanRenderer::new(window, config)?;

        Ok(Self { vk_renderer })
    }

    /// Renders a frame.
    pub unsafe fn render(&mut self) -> Result<()> {
        self.vk_renderer.draw()?;
        Ok(())
    }

    /// Loads a model file and returns its id.
    pub fn create_mesh_model(&mut self, path: &str) -> Result<usize> {
        unsafe { self.vk_renderer.create_mesh_model(path) }
    }

    /// Replaces the transform of a previously loaded model.
    pub fn update_model(&mut self, model_id: usize, transform: Mat4) -> Result<()> {
        self.vk_renderer.update_model(model_id, transform)
    }

    /// Destroys our Vulkan renderer.
    pub unsafe fn destroy(&mut self) {
        self.vk_renderer.destroy();
    }
}
