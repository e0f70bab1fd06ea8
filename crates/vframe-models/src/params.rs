//! Job parameters and output format definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{ModelError, ModelResult};

/// Default output width in pixels.
pub const DEFAULT_TARGET_WIDTH: u32 = 512;

/// Default sampling interval in seconds.
pub const DEFAULT_INTERVAL_SECONDS: f64 = 1.0;

/// Encoded image format of the extracted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless, alpha preserved
    #[default]
    Png,
    /// Quality 95, alpha dropped
    Jpg,
    /// Lossless, alpha preserved
    Webp,
}

impl OutputFormat {
    pub const ALL: &'static [OutputFormat] =
        &[OutputFormat::Png, OutputFormat::Jpg, OutputFormat::Webp];

    /// File extension used for output frames.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// Whether encoded frames keep the alpha channel.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OutputFormat::Jpg)
    }

    /// Look up a format from a file extension (`jpeg` is accepted as an alias).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpg),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" => Ok(OutputFormat::Jpg),
            "webp" => Ok(OutputFormat::Webp),
            _ => Err(ModelError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Processing parameters captured when a job is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct JobParams {
    /// Maximum output width; wider frames are scaled down proportionally
    #[validate(range(min = 1))]
    pub target_width: u32,
    /// Seconds of video between two sampled frames
    #[validate(range(exclusive_min = 0.0))]
    pub interval_seconds: f64,
    /// Encoded image format
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Apply an unsharp mask before resizing
    #[serde(default)]
    pub unblur: bool,
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            output_format: OutputFormat::default(),
            unblur: false,
        }
    }
}

impl JobParams {
    /// Build validated parameters.
    pub fn new(
        target_width: u32,
        interval_seconds: f64,
        output_format: OutputFormat,
        unblur: bool,
    ) -> ModelResult<Self> {
        let params = Self {
            target_width,
            interval_seconds,
            output_format,
            unblur,
        };
        params.check()?;
        Ok(params)
    }

    /// Validate parameters, rejecting non-positive or non-finite values.
    pub fn check(&self) -> ModelResult<()> {
        self.validate()
            .map_err(|e| ModelError::invalid_params(e.to_string()))?;
        if !self.interval_seconds.is_finite() {
            return Err(ModelError::invalid_params("interval_seconds must be finite"));
        }
        Ok(())
    }

    /// Sampling stride in raw frames: `max(1, floor(fps * interval))`.
    pub fn sampling_stride(&self, fps: f64) -> u64 {
        let raw = (fps * self.interval_seconds).floor();
        if raw.is_finite() && raw >= 1.0 {
            raw as u64
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpg);
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        assert!("gif".parse::<OutputFormat>().is_err());
        assert!("jpeg".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_alpha_policy() {
        assert!(OutputFormat::Png.supports_alpha());
        assert!(OutputFormat::Webp.supports_alpha());
        assert!(!OutputFormat::Jpg.supports_alpha());
        assert_eq!(OutputFormat::from_extension("JPEG"), Some(OutputFormat::Jpg));
    }

    #[test]
    fn test_params_validation() {
        assert!(JobParams::new(512, 1.0, OutputFormat::Png, false).is_ok());
        assert!(JobParams::new(0, 1.0, OutputFormat::Png, false).is_err());
        assert!(JobParams::new(512, 0.0, OutputFormat::Png, false).is_err());
        assert!(JobParams::new(512, -1.5, OutputFormat::Png, false).is_err());
        assert!(JobParams::new(512, f64::NAN, OutputFormat::Png, false).is_err());
        assert!(JobParams::new(512, f64::INFINITY, OutputFormat::Png, false).is_err());
    }

    #[test]
    fn test_sampling_stride() {
        let params = JobParams::new(512, 2.0, OutputFormat::Png, false).unwrap();
        assert_eq!(params.sampling_stride(30.0), 60);

        let params = JobParams::new(512, 1.0, OutputFormat::Png, false).unwrap();
        assert_eq!(params.sampling_stride(29.97), 29);

        // Very small intervals never produce a zero stride
        let params = JobParams::new(512, 0.001, OutputFormat::Png, false).unwrap();
        assert_eq!(params.sampling_stride(30.0), 1);
        assert_eq!(params.sampling_stride(0.0), 1);
        assert_eq!(params.sampling_stride(f64::NAN), 1);
    }

    #[test]
    fn test_params_schema() {
        let schema = schemars::schema_for!(JobParams);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("target_width"));
        assert!(json.contains("interval_seconds"));
    }
}
