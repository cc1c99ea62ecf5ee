//! Process and accelerator memory readings.
//!
//! Resident memory comes from sysinfo and always succeeds. VRAM is read by
//! shelling out to a vendor tool (`rocm-smi` by default); any problem with
//! the tool degrades to `vram_bytes: None` instead of an error.

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sysinfo::{ProcessRefreshKind, RefreshKind, System};

/// Source reported when only resident memory is known.
pub const FALLBACK_SOURCE: &str = "sysinfo";

pub const DEFAULT_VRAM_TOOL: &str = "rocm-smi";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub resident_bytes: u64,
    pub vram_bytes: Option<u64>,
    pub source: String,
}

/// Reads memory usage for the current process.
#[derive(Debug, Clone)]
pub struct MemoryProbe {
    vram_tool: String,
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new(DEFAULT_VRAM_TOOL)
    }
}

impl MemoryProbe {
    pub fn new(vram_tool: impl Into<String>) -> Self {
        Self { vram_tool: vram_tool.into() }
    }

    /// Never fails. Blocks while the external tool runs.
    pub fn snapshot(&self) -> MemorySnapshot {
        let resident_bytes = resident_bytes();
        match self.read_vram() {
            Some(vram) => MemorySnapshot {
                resident_bytes,
                vram_bytes: Some(vram),
                source: self.vram_tool.clone(),
            },
            None => MemorySnapshot {
                resident_bytes,
                vram_bytes: None,
                source: FALLBACK_SOURCE.to_string(),
            },
        }
    }

    fn read_vram(&self) -> Option<u64> {
        let tool = match which::which(&self.vram_tool) {
            Ok(path) => path,
            Err(_) => {
                tracing::debug!(tool = %self.vram_tool, "VRAM tool not on PATH");
                return None;
            }
        };

        let output = Command::new(&tool)
            .args(["--showmeminfo", "vram"])
            .output()
            .map_err(|e| tracing::debug!(tool = %tool.display(), error = %e, "VRAM tool failed to start"))
            .ok()?;
        if !output.status.success() {
            tracing::debug!(tool = %tool.display(), status = %output.status, "VRAM tool exited with error");
            return None;
        }

        let parsed = parse_used_vram(&String::from_utf8_lossy(&output.stdout));
        if parsed.is_none() {
            tracing::debug!(tool = %tool.display(), "VRAM tool output not recognised");
        }
        parsed
    }
}

fn resident_bytes() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let sys = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new().with_memory()),
    );
    sys.process(pid).map(|p| p.memory()).unwrap_or(0)
}

/// Used VRAM in bytes from `rocm-smi --showmeminfo vram` output.
///
/// Accepts either the `... Used VRAM (MB): 512` form or the byte-reporting
/// `VRAM Total Used Memory (B): 536870912` form.
pub fn parse_used_vram(output: &str) -> Option<u64> {
    static MB_PATTERN: OnceLock<Regex> = OnceLock::new();
    static BYTES_PATTERN: OnceLock<Regex> = OnceLock::new();

    let mb = MB_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)Used VRAM.*?:\s*(\d+)\s*MB").expect("static pattern")
    });
    if let Some(caps) = mb.captures(output) {
        return caps[1].parse::<u64>().ok().map(|v| v.saturating_mul(MIB));
    }

    let bytes = BYTES_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)Total Used Memory \(B\)\s*:\s*(\d+)").expect("static pattern")
    });
    bytes.captures(output).and_then(|caps| caps[1].parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_megabytes() {
        let out = "GPU[0]\t\t: Used VRAM (MB): 512 MB\n";
        assert_eq!(parse_used_vram(out), Some(512 * MIB));
    }

    #[test]
    fn test_parse_bytes_form() {
        let out = "GPU[0]\t\t: VRAM Total Memory (B): 17163091968\n\
                   GPU[0]\t\t: VRAM Total Used Memory (B): 1048576\n";
        assert_eq!(parse_used_vram(out), Some(1_048_576));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_used_vram(""), None);
        assert_eq!(parse_used_vram("WARNING: No AMD GPUs specified"), None);
    }

    #[test]
    fn test_missing_tool_falls_back() {
        let probe = MemoryProbe::new("definitely-not-a-real-vram-tool-3f9a");
        let snap = probe.snapshot();
        assert_eq!(snap.vram_bytes, None);
        assert_eq!(snap.source, FALLBACK_SOURCE);
    }

    #[test]
    fn test_resident_memory_reported() {
        let snap = MemoryProbe::new("definitely-not-a-real-vram-tool-3f9a").snapshot();
        assert!(snap.resident_bytes > 0);
    }
}
