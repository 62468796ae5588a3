use clap::Parser;
use std::path::PathBuf;

use crate::config::ViewerConfig;
use crate::drag::SwipeThresholds;

pub const HELP_KEYS: &str = "\
Key Bindings (gallery index):
  Arrows        : Move the selection
  Enter / click : Open the selected photo
  Esc / q       : Quit

Key Bindings (viewer):
  Left / Right  : Previous / next photo
  Esc           : Back to the gallery index
  Wheel         : Zoom in / out (1x to 4x)
  Double-click  : Toggle 2x zoom
  Drag          : Pan when zoomed, swipe when not
  Pinch         : Zoom (touch screens)
  t             : Toggle light / dark theme
  f             : Toggle fullscreen
  q             : Quit
";

#[derive(Parser)]
#[command(name = "gv", about = "A gallery photo viewer", after_help = HELP_KEYS)]
pub struct Cli {
    /// Photos or directories to show
    #[arg(required_unless_present = "manifest")]
    pub paths: Vec<PathBuf>,

    /// Load the gallery from a JSON manifest instead of scanning
    #[arg(short = 'M', long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Follow symbolic links (default: false)
    #[arg(long)]
    pub follow_links: bool,

    /// Locale prefix used in gallery routes
    #[arg(long, default_value = "en")]
    pub locale: String,

    /// Open this photo id directly instead of the index
    #[arg(short, long, value_name = "ID")]
    pub start: Option<String>,

    /// Memory budget for each image cache (e.g. 512MB, 2GB). Default: 10% of RAM.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Always use the mobile behaviour (no full-resolution download, no preloading)
    #[arg(long)]
    pub mobile: bool,

    /// Logical window width below which the viewer behaves as on mobile
    #[arg(long, default_value = "768")]
    pub mobile_width: f32,

    /// Horizontal mouse drag distance that triggers a swipe
    #[arg(long, default_value = "100")]
    pub swipe_threshold_mouse: f32,

    /// Horizontal touch drag distance that triggers a swipe
    #[arg(long, default_value = "80")]
    pub swipe_threshold_touch: f32,

    /// Directory for the cross-navigation slide hint (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    pub session_dir: Option<PathBuf>,

    /// Hide the thumbnail strip in the viewer
    #[arg(long)]
    pub no_thumbnails: bool,
}

impl Cli {
    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig {
            locale: self.locale.clone(),
            swipe: SwipeThresholds {
                mouse: self.swipe_threshold_mouse,
                touch: self.swipe_threshold_touch,
            },
            mobile_width: self.mobile_width,
            force_mobile: self.mobile,
            show_thumbnails: !self.no_thumbnails,
        }
    }
}

pub fn parse_memory_budget(s: &str) -> u64 {
    const MB: f64 = 1024.0 * 1024.0;
    let s = s.trim().to_uppercase();
    let (num, unit, fallback) = if let Some(num) = s.strip_suffix("GB") {
        (num, MB * 1024.0, 1.0)
    } else if let Some(num) = s.strip_suffix("MB") {
        (num, MB, 512.0)
    } else {
        (s.as_str(), MB, 512.0)
    };
    (num.trim().parse::<f64>().unwrap_or(fallback) * unit) as u64
}

pub fn default_memory_budget() -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.total_memory() / 10
}
