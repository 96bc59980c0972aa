//! Configuration system for fluxwm
//!
//! Loads configuration from TOML file at `~/.config/fluxwm/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub focus: FocusConfig,
    pub decorations: DecorationConfig,
    pub colors: WindowColors,
    pub tabs: TabConfig,
    pub workspaces: WorkspaceConfig,
    pub behavior: BehaviorConfig,
    pub screen: ReservedMargins,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config = Self::parse(&content)?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("fluxwm");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string)
            .context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Focus policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusPolicy {
    /// Click to focus
    Click,
    /// Focus follows mouse (focus on enter, unfocus on leave to root)
    FollowsMouse,
    /// Sloppy focus (focus on enter, keep focus on leave)
    Sloppy,
}

impl FocusPolicy {
    /// Pointer-driven policies are the only ones that auto-raise
    pub fn follows_pointer(self) -> bool {
        matches!(self, Self::FollowsMouse | Self::Sloppy)
    }
}

/// Focus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub policy: FocusPolicy,
    /// Raise the focused window after `auto_raise_delay_ms` (pointer policies only)
    pub auto_raise: bool,
    pub auto_raise_delay_ms: u64,
    /// Give focus to newly adopted windows
    pub focus_new: bool,
}

impl FocusConfig {
    pub fn auto_raise_delay(&self) -> Duration {
        Duration::from_millis(self.auto_raise_delay_ms)
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            policy: FocusPolicy::Click,
            auto_raise: true,
            auto_raise_delay_ms: 250,
            focus_new: true,
        }
    }
}

/// Window decoration geometry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    /// Titlebar height in pixels
    pub titlebar_height: u32,
    /// Bottom handle height in pixels
    pub handle_height: u32,
    /// Frame border width in pixels
    pub border_width: u32,
    /// Button size in pixels
    pub button_size: u32,
    /// Resize grip width in pixels
    pub grip_width: u32,
    /// Width of one tab in the tab strip
    pub tab_width: u32,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            titlebar_height: 20,
            handle_height: 6,
            border_width: 1,
            button_size: 14,
            grip_width: 20,
            tab_width: 64,
        }
    }
}

/// Window colors (solid renderer)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowColors {
    /// Focused titlebar color (hex: 0xRRGGBB)
    pub title_focused: u32,
    /// Unfocused titlebar color
    pub title_unfocused: u32,
    /// Handle and grips
    pub handle_focused: u32,
    pub handle_unfocused: u32,
    /// Frame border
    pub border: u32,
    /// Buttons (pressed buttons use `button_pressed`)
    pub button: u32,
    pub button_pressed: u32,
    /// Tab strip
    pub tab_focused: u32,
    pub tab_unfocused: u32,
}

impl Default for WindowColors {
    fn default() -> Self {
        Self {
            title_focused: 0x3b4252,
            title_unfocused: 0x2e3440,
            handle_focused: 0x434c5e,
            handle_unfocused: 0x2e3440,
            border: 0x5e81ac,
            button: 0x4c566a,
            button_pressed: 0x88c0d0,
            tab_focused: 0x5e81ac,
            tab_unfocused: 0x3b4252,
        }
    }
}

/// Tab group configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    /// Keep the tab strip on windows that are alone in their group
    pub always_show: bool,
    /// Iconifying one tab iconifies the whole group
    pub iconify_group: bool,
}

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub count: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { count: 4 }
    }
}

/// Initial placement of windows without a position hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementPolicy {
    Center,
    Cascade,
}

/// Window behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Maximum delay between two titlebar clicks of a double click
    pub double_click_ms: u64,
    pub placement: PlacementPolicy,
    /// Raise a window when it is clicked
    pub raise_on_click: bool,
}

impl BehaviorConfig {
    pub fn double_click_interval(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            double_click_ms: 400,
            placement: PlacementPolicy::Center,
            raise_on_click: true,
        }
    }
}

/// Screen edges reserved for external bars (toolbar, slit)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservedMargins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}
