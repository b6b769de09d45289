/// Startup options for the engine, fixed for the lifetime of the renderer.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub window_width: u32,
    pub window_height: u32,
    pub validation_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Halfway Engine".to_string(),
            window_width: 1280,
            window_height: 720,
            validation_enabled: cfg!(debug_assertions),
        }
    }
}
