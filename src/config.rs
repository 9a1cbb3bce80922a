//! YAML configuration for md2pdf.
//!
//! Config files are looked up next to the input file, then in the current
//! directory, then in the user's home directory. Every section is optional;
//! missing fields fall back to the defaults below.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::units::{Length, PageSize};

/// File name searched for next to the input and in the working directory.
pub const CONFIG_FILE_NAME: &str = "md2pdf.yaml";

/// File name searched for in the home directory.
pub const HOME_CONFIG_FILE_NAME: &str = ".md2pdf.yaml";

/// Annotated sample config listing every default.
pub const SAMPLE: &str = include_str!("default_config.yaml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub font: FontConfig,
    pub margins: MarginsConfig,
    pub page_size: String,
    pub header: HeaderFooterConfig,
    pub footer: HeaderFooterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// CSS font-family list
    pub family: String,
    #[serde(deserialize_with = "length_value")]
    pub size: String,
    pub line_height: f64,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, \
                     'Helvetica Neue', Arial, sans-serif"
                .to_string(),
            size: "11pt".to_string(),
            line_height: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginsConfig {
    #[serde(deserialize_with = "length_value")]
    pub top: String,
    #[serde(deserialize_with = "length_value")]
    pub bottom: String,
    #[serde(deserialize_with = "length_value")]
    pub left: String,
    #[serde(deserialize_with = "length_value")]
    pub right: String,
}

impl Default for MarginsConfig {
    fn default() -> Self {
        Self {
            top: "2.5cm".to_string(),
            bottom: "2.5cm".to_string(),
            left: "2cm".to_string(),
            right: "2cm".to_string(),
        }
    }
}

/// Header or footer frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFooterConfig {
    /// HTML template; empty disables the frame
    pub content: String,
    #[serde(deserialize_with = "length_value")]
    pub height: String,
}

impl Default for HeaderFooterConfig {
    fn default() -> Self {
        Self {
            content: String::new(),
            height: "1.5cm".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font: FontConfig::default(),
            margins: MarginsConfig::default(),
            page_size: "A4".to_string(),
            header: HeaderFooterConfig::default(),
            footer: HeaderFooterConfig::default(),
        }
    }
}

/// Lengths resolved from a validated config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub size: PageSize,
    pub top: Length,
    pub bottom: Length,
    pub left: Length,
    pub right: Length,
    pub header_height: Length,
    pub footer_height: Length,
    pub font_size: Length,
}

fn search_paths_in(input: &Path, cwd: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);

    let parent = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    paths.push(parent.join(CONFIG_FILE_NAME));

    if let Some(cwd) = cwd {
        paths.push(cwd.join(CONFIG_FILE_NAME));
    }
    if let Some(home) = home {
        paths.push(home.join(HOME_CONFIG_FILE_NAME));
    }
    paths
}

fn first_file(paths: Vec<PathBuf>) -> Option<PathBuf> {
    paths.into_iter().find(|p| p.is_file())
}

/// Accept unquoted numbers such as `top: 0` where a length is expected.
fn length_value<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    })
}

fn length(field: &str, value: &str) -> Result<Length> {
    value
        .parse()
        .map_err(|message: String| Error::invalid_value(field, message))
}

impl Config {
    /// Candidate config locations for `input`, in priority order.
    pub fn search_paths(input: &Path) -> Vec<PathBuf> {
        let cwd = std::env::current_dir().ok();
        let home = dirs::home_dir();
        search_paths_in(input, cwd.as_deref(), home.as_deref())
    }

    /// Find the first existing config file for `input`.
    pub fn find(input: &Path) -> Option<PathBuf> {
        first_file(Self::search_paths(input))
    }

    /// Load a config file, merging its values into the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML text. Empty or comment-only documents yield the defaults.
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value)
    }

    /// Resolve every length in the config, failing on the first bad one.
    pub fn geometry(&self) -> Result<PageGeometry> {
        let size = self
            .page_size
            .parse()
            .map_err(|message: String| Error::invalid_value("page_size", message))?;

        Ok(PageGeometry {
            size,
            top: length("margins.top", &self.margins.top)?,
            bottom: length("margins.bottom", &self.margins.bottom)?,
            left: length("margins.left", &self.margins.left)?,
            right: length("margins.right", &self.margins.right)?,
            header_height: length("header.height", &self.header.height)?,
            footer_height: length("footer.height", &self.footer.height)?,
            font_size: length("font.size", &self.font.size)?,
        })
    }

    /// Check that every value can be rendered.
    ///
    /// A header or footer taller than its margin overlaps the body; that is
    /// reported as a warning only.
    pub fn validate(&self) -> Result<()> {
        let geometry = self.geometry()?;

        if !(self.font.line_height.is_finite() && self.font.line_height > 0.0) {
            return Err(Error::invalid_value(
                "font.line_height",
                format!("{} must be a positive number", self.font.line_height),
            ));
        }

        if !self.header.content.is_empty()
            && geometry.header_height.to_pt() >= geometry.top.to_pt()
        {
            log::warn!(
                "header height {} is not smaller than the top margin {}",
                self.header.height,
                self.margins.top
            );
        }
        if !self.footer.content.is_empty()
            && geometry.footer_height.to_pt() >= geometry.bottom.to_pt()
        {
            log::warn!(
                "footer height {} is not smaller than the bottom margin {}",
                self.footer.height,
                self.margins.bottom
            );
        }

        Ok(())
    }

    /// Write the annotated sample config, refusing to replace an existing file.
    pub fn write_sample(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        fs::write(path, SAMPLE).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
