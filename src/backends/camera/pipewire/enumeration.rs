// SPDX-License-Identifier: GPL-3.0-only

//! PipeWire camera discovery
//!
//! Cameras are found through `pw-cli ls Node`. Each `Video/Source` node is
//! addressed by `pipewire-serial-<object.serial>` (or `pipewire-<id>` when the
//! serial is missing), the form `pipewiresrc target-object` understands.

use crate::backends::camera::types::CameraPosition;
use tracing::{debug, warn};

/// A camera node exposed by PipeWire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeWireCamera {
    /// `node.description`
    pub name: String,
    /// Target identifier for `pipewiresrc`
    pub target: String,
}

/// Whether GStreamer can open PipeWire sources
pub fn is_pipewire_available() -> bool {
    if gstreamer::init().is_err() {
        return false;
    }

    gstreamer::ElementFactory::find("pipewiresrc").is_some()
}

/// Camera nodes currently known to PipeWire
pub fn enumerate_cameras() -> Vec<PipeWireCamera> {
    let output = match std::process::Command::new("pw-cli")
        .args(["ls", "Node"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(_) => {
            debug!("pw-cli command failed");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = %e, "pw-cli not available");
            return Vec::new();
        }
    };

    let cameras = parse_pw_cli_nodes(&String::from_utf8_lossy(&output.stdout));
    debug!(count = cameras.len(), "Enumerated cameras via pw-cli");
    cameras
}

#[derive(Default)]
struct NodeBlock {
    id: Option<String>,
    serial: Option<String>,
    name: Option<String>,
    video_source: bool,
}

impl NodeBlock {
    fn into_camera(self) -> Option<PipeWireCamera> {
        if !self.video_source {
            return None;
        }
        let id = self.id?;
        let name = self.name?;
        let target = match self.serial {
            Some(serial) => format!("pipewire-serial-{}", serial),
            None => format!("pipewire-{}", id),
        };
        Some(PipeWireCamera { name, target })
    }
}

/// Parse `pw-cli ls Node` output into camera nodes
pub fn parse_pw_cli_nodes(stdout: &str) -> Vec<PipeWireCamera> {
    let mut cameras = Vec::new();
    let mut current = NodeBlock::default();

    for line in stdout.lines() {
        let trimmed = line.trim();

        // "id 76, type PipeWire:Interface:Node/3"
        if let Some(rest) = trimmed.strip_prefix("id ")
            && trimmed.contains("type PipeWire:Interface:Node")
        {
            cameras.extend(std::mem::take(&mut current).into_camera());
            current.id = rest.split(',').next().map(|id| id.trim().to_string());
            continue;
        }

        if trimmed.contains("media.class") && trimmed.contains("\"Video/Source\"") {
            current.video_source = true;
        } else if trimmed.contains("object.serial") {
            current.serial = extract_quoted_value(trimmed);
        } else if trimmed.contains("node.description") {
            current.name = extract_quoted_value(trimmed);
        }
    }
    cameras.extend(current.into_camera());

    cameras
}

/// `property = "value"` -> `value`
fn extract_quoted_value(line: &str) -> Option<String> {
    let start = line.find('"')?;
    let end = line[start + 1..].find('"')?;
    Some(line[start + 1..start + 1 + end].to_string())
}

/// Configured targets win; otherwise the first camera is the back camera and
/// the second the front camera
pub fn resolve_targets(
    cameras: &[PipeWireCamera],
    configured_front: Option<&str>,
    configured_back: Option<&str>,
) -> (Option<String>, Option<String>) {
    let pick = |configured: Option<&str>, index: usize| {
        configured
            .map(str::to_string)
            .or_else(|| cameras.get(index).map(|camera| camera.target.clone()))
    };

    let front = pick(configured_front, 1);
    let back = pick(configured_back, 0);
    for (position, target) in [(CameraPosition::Front, &front), (CameraPosition::Back, &back)] {
        debug!(%position, ?target, "Camera target");
    }
    (front, back)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PW_CLI: &str = r#"
	id 31, type PipeWire:Interface:Node/3
 		object.serial = "31"
 		node.description = "Built-in Audio"
 		media.class = "Audio/Source"
	id 58, type PipeWire:Interface:Node/3
 		object.serial = "2146"
 		node.description = "Rear Camera"
 		media.class = "Video/Source"
	id 60, type PipeWire:Interface:Node/3
 		node.description = "Front Camera"
 		media.class = "Video/Source"
"#;

    #[test]
    fn test_parses_video_sources_only() {
        let cameras = parse_pw_cli_nodes(PW_CLI);
        assert_eq!(
            cameras,
            [
                PipeWireCamera {
                    name: "Rear Camera".into(),
                    target: "pipewire-serial-2146".into(),
                },
                PipeWireCamera {
                    name: "Front Camera".into(),
                    target: "pipewire-60".into(),
                },
            ]
        );
    }

    #[test]
    fn test_configured_targets_override_enumeration() {
        let cameras = parse_pw_cli_nodes(PW_CLI);
        let (front, back) = resolve_targets(&cameras, Some("pipewire-serial-9"), None);
        assert_eq!(front.as_deref(), Some("pipewire-serial-9"));
        assert_eq!(back.as_deref(), Some("pipewire-serial-2146"));
    }

    #[test]
    fn test_single_camera_has_no_front() {
        let cameras = vec![PipeWireCamera {
            name: "Webcam".into(),
            target: "pipewire-serial-1".into(),
        }];
        let (front, back) = resolve_targets(&cameras, None, None);
        assert_eq!(front, None);
        assert_eq!(back.as_deref(), Some("pipewire-serial-1"));
    }
}
