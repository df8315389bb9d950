/// Window and session configuration.
///
/// Read once by `Session::new`; later changes go through the session's setters.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Anti-aliasing samples of the default output (1 disables multisampling).
    pub aa_samples: u32,
    pub clear_color: [f32; 4],
    pub vsync: bool,
}

impl WindowConfig {
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            width,
            height,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_aa_samples(mut self, samples: u32) -> Self {
        self.aa_samples = samples.max(1);
        self
    }

    /// Reference position for pointer deltas before the first move.
    pub fn center(&self) -> (f64, f64) {
        (f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "lumen".to_string(),
            aa_samples: 1,
            clear_color: [0.15, 0.15, 0.15, 1.0],
            vsync: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_800_by_600() {
        let config = WindowConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.center(), (400.0, 300.0));
        assert_eq!(config.clear_color[3], 1.0);
    }

    #[test]
    fn zero_samples_means_single_sampled() {
        let config = WindowConfig::new(320, 240, "demo").with_aa_samples(0);
        assert_eq!(config.aa_samples, 1);
        assert_eq!(config.title, "demo");
    }
}
