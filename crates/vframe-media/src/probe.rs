//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Video stream information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels of the decoded frames, after display rotation
    pub width: u32,
    /// Height in pixels of the decoded frames, after display rotation
    pub height: u32,
    /// Display rotation in degrees, normalized to 0, 90, 180 or 270
    pub rotation: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Frame count reported by the container (estimated from duration when absent)
    pub total_frames: u64,
    /// Video codec
    pub codec: String,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotation from the display matrix side data, falling back to the
    /// legacy `rotate` tag.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .or_else(|| self.tags.get("rotate").and_then(|r| r.trim().parse::<f64>().ok()))
            .unwrap_or(0.0);
        normalize_rotation(degrees)
    }
}

/// Map any angle onto 0, 90, 180 or 270, rounding to the nearest quarter turn.
fn normalize_rotation(degrees: f64) -> u32 {
    if !degrees.is_finite() {
        return 0;
    }
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u32
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    // Check FFprobe exists
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Parse FFprobe JSON into [`VideoInfo`].
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let stored_width = video_stream.width.unwrap_or(0);
    let stored_height = video_stream.height.unwrap_or(0);

    // ffmpeg applies the display rotation while decoding, so quarter turns
    // arrive with width and height swapped
    let rotation = video_stream.rotation();
    let (width, height) = if rotation % 180 == 90 {
        (stored_height, stored_width)
    } else {
        (stored_width, stored_height)
    };
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "Invalid frame dimensions {}x{}",
            width, height
        )));
    }

    // Stream duration is more precise than the container's when both exist
    let duration = video_stream
        .duration
        .as_ref()
        .or(probe.format.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| {
            video_stream
                .r_frame_rate
                .as_ref()
                .and_then(|r| parse_frame_rate(r))
        })
        .unwrap_or(30.0);

    let total_frames = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or_else(|| (duration * fps).round().max(0.0) as u64);

    Ok(VideoInfo {
        duration,
        width,
        height,
        rotation,
        fps,
        total_frames,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output_with_nb_frames() {
        let json = br#"{
            "format": {"duration": "10.000000"},
            "streams": [{
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30/1",
                "nb_frames": "300"
            }]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.total_frames, 300);
        assert_eq!(info.codec, "h264");
        assert!((info.fps - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_probe_output_estimates_frames() {
        let json = br#"{
            "format": {"duration": "4.0"},
            "streams": [{
                "codec_type": "video",
                "width": 640,
                "height": 360,
                "avg_frame_rate": "0/0",
                "r_frame_rate": "25/1"
            }]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!((info.fps - 25.0).abs() < 0.001);
        assert_eq!(info.total_frames, 100);
    }

    #[test]
    fn test_rotated_side_data_swaps_dimensions() {
        let json = br#"{
            "format": {"duration": "2.0"},
            "streams": [{
                "codec_type": "video",
                "codec_name": "hevc",
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30/1",
                "nb_frames": "60",
                "side_data_list": [
                    {"side_data_type": "Display Matrix", "displaymatrix": "...", "rotation": -90}
                ]
            }]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.rotation, 270);
        assert_eq!((info.width, info.height), (1080, 1920));
    }

    #[test]
    fn test_rotate_tag_swaps_dimensions() {
        let json = br#"{
            "format": {},
            "streams": [{
                "codec_type": "video",
                "width": 1280,
                "height": 720,
                "r_frame_rate": "25/1",
                "tags": {"rotate": "90", "language": "und"}
            }]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.rotation, 90);
        assert_eq!((info.width, info.height), (720, 1280));
    }

    #[test]
    fn test_upside_down_keeps_dimensions() {
        let json = br#"{
            "format": {},
            "streams": [{
                "codec_type": "video",
                "width": 640,
                "height": 480,
                "side_data_list": [{"rotation": 180}]
            }]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.rotation, 180);
        assert_eq!((info.width, info.height), (640, 480));
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0.0), 0);
        assert_eq!(normalize_rotation(-90.0), 270);
        assert_eq!(normalize_rotation(90.0), 90);
        assert_eq!(normalize_rotation(-180.0), 180);
        assert_eq!(normalize_rotation(450.0), 90);
        assert_eq!(normalize_rotation(89.9), 90);
        assert_eq!(normalize_rotation(f64::NAN), 0);
    }

    #[test]
    fn test_parse_probe_output_without_video() {
        let json = br#"{"format": {}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
