use std::{
    collections::BTreeMap,
    fmt, fs,
    io::{BufWriter, Write},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{events::GestureEvent, systems::Systems, tracking::HandFrame};

/// Load a recorded session. `.msgpack` files are MessagePack, `.jsonl` files
/// hold one frame per line, anything else is a JSON array of frames.
pub fn load_recording(path: &str) -> Result<Vec<HandFrame>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read recording {}", path))?;
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let frames: Vec<HandFrame> = match extension {
        "msgpack" | "mp" => rmp_serde::from_slice(&bytes)
            .map_err(|e| anyhow!("Failed to decode MessagePack recording: {}", e))?,
        "jsonl" => {
            let text = std::str::from_utf8(&bytes)?;
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str::<HandFrame>(line)
                        .with_context(|| format!("Bad frame on line {}", i + 1))
                })
                .collect::<Result<_>>()?
        }
        _ => serde_json::from_slice(&bytes).context("Failed to parse JSON recording")?,
    };

    info!("Loaded {} frames from \"{}\"", frames.len(), path);
    Ok(frames)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    JsonLines,
    MessagePack,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "jsonl" => Ok(OutputFormat::JsonLines),
            "msgpack" => Ok(OutputFormat::MessagePack),
            _ => Err(format!("unknown output format \"{}\" (json, msgpack)", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::JsonLines => f.write_str("json"),
            OutputFormat::MessagePack => f.write_str("msgpack"),
        }
    }
}

/// An event stamped with the frame that produced it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub timestamp: f64,
    #[serde(flatten)]
    pub event: GestureEvent,
}

/// Writes events as JSON lines, or as consecutive MessagePack maps
pub struct EventWriter<W: Write> {
    out: BufWriter<W>,
    format: OutputFormat,
}

impl<W: Write> EventWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        EventWriter {
            out: BufWriter::new(out),
            format,
        }
    }

    pub fn write(&mut self, event: &TimedEvent) -> Result<()> {
        match self.format {
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.out, event)?;
                self.out.write_all(b"\n")?;
            }
            OutputFormat::MessagePack => {
                let payload = rmp_serde::to_vec_named(event)?;
                self.out.write_all(&payload)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        self.out
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush event output: {}", e.error()))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub skipped_frames: usize,
    /// Event count per `GestureEvent::kind()`
    pub counts: BTreeMap<&'static str, usize>,
}

impl ReplaySummary {
    pub fn total_events(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }
}

/// Feed every frame through the pipeline in order, writing each event as it
/// is produced. Frames whose timestamp goes backwards are skipped.
pub fn replay<W: Write>(
    frames: &[HandFrame],
    systems: &mut Systems,
    writer: &mut EventWriter<W>,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    let mut last_timestamp: Option<f64> = None;

    for frame in frames {
        if last_timestamp.is_some_and(|last| frame.timestamp < last) {
            warn!(
                "Frame at t={} is older than the previous one; skipping",
                frame.timestamp
            );
            summary.skipped_frames += 1;
            continue;
        }
        last_timestamp = Some(frame.timestamp);
        summary.frames += 1;

        for event in systems.process_frame(frame) {
            *summary.counts.entry(event.kind()).or_default() += 1;
            if !matches!(event, GestureEvent::Move { .. }) {
                debug!("t={:.3} {:?}", frame.timestamp, event);
            }
            writer.write(&TimedEvent {
                timestamp: frame.timestamp,
                event,
            })?;
        }
    }

    info!(
        "Replayed {} frames ({} skipped), {} events",
        summary.frames,
        summary.skipped_frames,
        summary.total_events()
    );
    for (kind, count) in &summary.counts {
        info!("  {}: {}", kind, count);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixtures::{HandPose, detected_at_screen},
        pipeline_config::PipelineConfig,
        tracking::Hand,
    };

    const FRAME: f64 = 1. / 30.;

    fn palm_frames(n: usize) -> Vec<HandFrame> {
        (0..n)
            .map(|i| {
                HandFrame::new(
                    i as f64 * FRAME,
                    vec![detected_at_screen(HandPose::OpenPalm, Hand::Right, 0.5, 0.6, 0.)],
                )
            })
            .collect()
    }

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("{}-{}", std::process::id(), name))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_load_json_array_and_lines() {
        let frames = palm_frames(3);

        let path = temp_path("recording.json");
        fs::write(&path, serde_json::to_string(&frames).unwrap()).unwrap();
        assert_eq!(load_recording(&path).unwrap().len(), 3);
        let _ = fs::remove_file(&path);

        let path = temp_path("recording.jsonl");
        let lines: Vec<String> = frames
            .iter()
            .map(|f| serde_json::to_string(f).unwrap())
            .collect();
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        let loaded = load_recording(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].timestamp, frames[2].timestamp);
        assert_eq!(loaded[0].hands[0].landmarks.len(), 21);
    }

    #[test]
    fn test_load_msgpack() {
        let path = temp_path("recording.msgpack");
        fs::write(&path, rmp_serde::to_vec_named(&palm_frames(4)).unwrap()).unwrap();
        let loaded = load_recording(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.len(), 4);
    }

    #[test]
    fn test_load_missing_or_broken() {
        assert!(load_recording("/nonexistent/recording.json").is_err());

        let path = temp_path("broken.json");
        fs::write(&path, "[{\"timestamp\": ").unwrap();
        assert!(load_recording(&path).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::JsonLines));
        assert_eq!("MsgPack".parse::<OutputFormat>(), Ok(OutputFormat::MessagePack));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_replay_counts_and_writes_json_lines() {
        let mut systems = Systems::new(&PipelineConfig::default()).unwrap();
        let mut writer = EventWriter::new(Vec::new(), OutputFormat::JsonLines);
        let summary = replay(&palm_frames(5), &mut systems, &mut writer).unwrap();
        let output = String::from_utf8(writer.finish().unwrap()).unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.count("move"), 5);
        assert_eq!(summary.count("palmOpen"), 5);
        assert_eq!(summary.count("gestureChange"), 1);
        assert_eq!(output.lines().count(), summary.total_events());

        let first: serde_json::Value =
            serde_json::from_str(output.lines().next().unwrap()).unwrap();
        assert_eq!(first["timestamp"], 0.);
        assert_eq!(first["type"], "move");
        assert_eq!(first["hand"], "right");
        assert!(output.contains("\"type\":\"palmOpen\""));
    }

    #[test]
    fn test_replay_skips_frames_going_back_in_time() {
        let mut frames = palm_frames(4);
        frames.swap(2, 3);
        let mut systems = Systems::new(&PipelineConfig::default()).unwrap();
        let mut writer = EventWriter::new(Vec::new(), OutputFormat::MessagePack);
        let summary = replay(&frames, &mut systems, &mut writer).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.skipped_frames, 1);
        assert!(!writer.finish().unwrap().is_empty());
    }
}
