use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, SealError};
use crate::overlay::StampGeometry;

pub const CONFIG_FILE_NAME: &str = "seal.toml";

pub const DEFAULT_INPUT_DIR: &str = "invoices";
pub const DEFAULT_OUTPUT_DIR: &str = "signed_invoices";
pub const DEFAULT_STAMP_IMAGE: &str = "stamp-blue.png";
pub const DEFAULT_COMPANY_NAME: &str = "Mazda specialist Center";

/// Stamp placement in page points, origin at the bottom-left corner.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PositionSettings {
    pub stamp_x: f32,
    pub stamp_y: f32,
    pub stamp_width: f32,
    pub stamp_height: f32,
    /// Vertical distance from the stamp anchor to the text baseline.
    /// Negative values put the text below the image.
    pub text_y_offset: f32,
}

impl Default for PositionSettings {
    fn default() -> Self {
        Self {
            stamp_x: 400.0,
            stamp_y: 50.0,
            stamp_width: 150.0,
            stamp_height: 100.0,
            text_y_offset: -20.0,
        }
    }
}

/// Everything one batch run needs. Loaded from `seal.toml`, then
/// overridden by command-line flags.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub stamp_image_path: PathBuf,
    /// Printed under the seal. An empty string disables the text line.
    pub company_name: String,
    /// 0-based index of the page that receives the stamp.
    pub target_page: usize,
    pub position_settings: PositionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_directory: PathBuf::from(DEFAULT_INPUT_DIR),
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIR),
            stamp_image_path: PathBuf::from(DEFAULT_STAMP_IMAGE),
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            target_page: 0,
            position_settings: PositionSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Like [`Settings::load`], but never fails: a missing file silently
    /// yields the defaults, an unreadable or malformed one is logged first.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(SealError::Io(err)) if err.kind() == ErrorKind::NotFound => Self::default(),
            Err(err) => {
                log::warn!(
                    "Could not load or parse '{}' ({}). Using built-in defaults.",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn geometry(&self) -> Result<StampGeometry> {
        StampGeometry::try_from(self.position_settings)
    }

    pub fn stamp_text(&self) -> Option<&str> {
        let text = self.company_name.trim();
        if text.is_empty() { None } else { Some(text) }
    }
}

impl TryFrom<PositionSettings> for StampGeometry {
    type Error = SealError;

    fn try_from(p: PositionSettings) -> Result<Self> {
        let values = [
            ("stamp_x", p.stamp_x),
            ("stamp_y", p.stamp_y),
            ("stamp_width", p.stamp_width),
            ("stamp_height", p.stamp_height),
            ("text_y_offset", p.text_y_offset),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SealError::Config(format!("{name} must be a finite number, got {value}")));
        }
        if p.stamp_width <= 0.0 || p.stamp_height <= 0.0 {
            return Err(SealError::Config(format!(
                "stamp size must be positive, got {}x{}",
                p.stamp_width, p.stamp_height
            )));
        }
        Ok(StampGeometry {
            x: p.stamp_x,
            y: p.stamp_y,
            width: p.stamp_width,
            height: p.stamp_height,
            text_offset_y: p.text_y_offset,
        })
    }
}

// --- Command-Line Arguments ---
#[derive(Parser, Debug)]
#[clap(author, version, about = "Stamps a seal image and company name onto every PDF invoice in a folder.")]
pub struct Args {
    #[clap(short, long, default_value = CONFIG_FILE_NAME, help = "Settings file (TOML).")]
    pub config: PathBuf,
    #[clap(short, long, help = "Folder with the invoices to stamp.")]
    pub input: Option<PathBuf>,
    #[clap(short, long, help = "Folder that receives the signed copies.")]
    pub output: Option<PathBuf>,
    #[clap(short, long, help = "Seal image (PNG or JPEG).")]
    pub stamp: Option<PathBuf>,
    #[clap(long, help = "Company name printed under the seal.")]
    pub company: Option<String>,
    #[clap(long, conflicts_with = "company", help = "Stamp the image only, without text.")]
    pub no_text: bool,
    #[clap(short, long, help = "0-based index of the page to stamp.")]
    pub page: Option<usize>,
    #[clap(long, allow_hyphen_values = true)]
    pub x: Option<f32>,
    #[clap(long, allow_hyphen_values = true)]
    pub y: Option<f32>,
    #[clap(long)]
    pub width: Option<f32>,
    #[clap(long)]
    pub height: Option<f32>,
    #[clap(long, allow_hyphen_values = true, help = "Text baseline offset from the seal anchor.")]
    pub text_offset: Option<f32>,
}

impl Args {
    pub fn apply(self, mut settings: Settings) -> Settings {
        if let Some(input) = self.input {
            settings.input_directory = input;
        }
        if let Some(output) = self.output {
            settings.output_directory = output;
        }
        if let Some(stamp) = self.stamp {
            settings.stamp_image_path = stamp;
        }
        if let Some(company) = self.company {
            settings.company_name = company;
        }
        if self.no_text {
            settings.company_name.clear();
        }
        if let Some(page) = self.page {
            settings.target_page = page;
        }

        let pos = &mut settings.position_settings;
        pos.stamp_x = self.x.unwrap_or(pos.stamp_x);
        pos.stamp_y = self.y.unwrap_or(pos.stamp_y);
        pos.stamp_width = self.width.unwrap_or(pos.stamp_width);
        pos.stamp_height = self.height.unwrap_or(pos.stamp_height);
        pos.text_y_offset = self.text_offset.unwrap_or(pos.text_y_offset);
        settings
    }

    pub fn resolve(self) -> Settings {
        let base = Settings::load_or_default(&self.config);
        self.apply(base)
    }
}
