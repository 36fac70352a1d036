//! Local telemetry query: one short, bounded system call per invocation.

use std::io;

/// A local sensor query. Implementations make a single bounded attempt and
/// never retry; callers treat a failure as "no new reading".
pub trait TelemetryProbe: Send + Sync {
    fn sample(&self) -> io::Result<String>;
}

/// SoC temperature as reported by the firmware tool on the gateway image.
pub struct CpuTempProbe;

impl TelemetryProbe for CpuTempProbe {
    fn sample(&self) -> io::Result<String> {
        let output = std::process::Command::new("vcgencmd")
            .arg("measure_temp")
            .output()?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "vcgencmd exited with {}",
                output.status,
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().next().unwrap_or_default().to_string())
    }
}
