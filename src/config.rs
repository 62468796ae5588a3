use crate::drag::SwipeThresholds;

/// Tunables for one viewer session, filled from the command line.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub locale: String,
    pub swipe: SwipeThresholds,
    /// Logical width below which the viewport counts as mobile.
    pub mobile_width: f32,
    /// Treat every viewport as mobile.
    pub force_mobile: bool,
    pub show_thumbnails: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            swipe: SwipeThresholds::default(),
            mobile_width: 768.0,
            force_mobile: false,
            show_thumbnails: true,
        }
    }
}

impl ViewerConfig {
    pub fn is_mobile(&self, logical_width: f32) -> bool {
        self.force_mobile || logical_width < self.mobile_width
    }
}
