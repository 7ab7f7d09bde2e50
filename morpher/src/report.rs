use std::path::Path;

use libmorph::{ExecutionOutcome, MutationOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pass: u32,
    found: bool,
    offset: Option<usize>,
    function_len: Option<usize>,
    insertion_space: Option<u8>,
    injected: bool,
    spans: usize,
}

impl PassReport {
    pub fn new(pass: u32, outcome: &MutationOutcome) -> Self {
        match *outcome {
            MutationOutcome::NotFound => Self {
                pass,
                found: false,
                offset: None,
                function_len: None,
                insertion_space: None,
                injected: false,
                spans: 0,
            },
            MutationOutcome::Mutated {
                offset,
                function_len,
                insertion_space,
                injected,
                spans,
            } => Self {
                pass,
                found: true,
                offset: Some(offset),
                function_len: Some(function_len),
                insertion_space: Some(insertion_space),
                injected,
                spans,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub input: String,
    pub output: String,
    pub image_size: usize,
    pub signature: String,
    pub seed: Option<u64>,
    pub passes: Vec<PassReport>,
    pub execution: Option<String>,
    pub execution_time_ms: u64,
    pub environment: String,
}

impl RunReport {
    pub fn new(input: &Path, output: &Path, image_size: usize, signature: &[u8]) -> Self {
        Self {
            input: input.display().to_string(),
            output: output.display().to_string(),
            image_size,
            signature: signature
                .iter()
                .map(|byte| format!("{:02X}", byte))
                .collect::<Vec<_>>()
                .join(" "),
            seed: None,
            passes: Vec::new(),
            execution: None,
            execution_time_ms: 0,
            environment: std::env::consts::OS.to_string(),
        }
    }

    pub fn record_pass(&mut self, pass: u32, outcome: &MutationOutcome) {
        self.passes.push(PassReport::new(pass, outcome));
    }

    pub fn record_execution(&mut self, outcome: &ExecutionOutcome) {
        self.execution = Some(match outcome {
            ExecutionOutcome::Completed => "completed".to_string(),
            ExecutionOutcome::Faulted(message) => format!("faulted: {}", message),
        });
    }

    pub fn finish(&mut self, start_time: std::time::Instant) {
        self.execution_time_ms = start_time.elapsed().as_millis() as u64;
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_passes() {
        let mut report = RunReport::new(
            Path::new("in.bin"),
            Path::new("out.bin"),
            20,
            &[0x55, 0x48, 0x8B, 0xEC],
        );
        report.record_pass(1, &MutationOutcome::NotFound);
        report.record_pass(
            2,
            &MutationOutcome::Mutated {
                offset: 0,
                function_len: 14,
                insertion_space: 6,
                injected: true,
                spans: 1,
            },
        );
        report.record_execution(&ExecutionOutcome::Completed);

        let value: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["signature"], "55 48 8B EC");
        assert_eq!(value["passes"][0]["found"], false);
        assert_eq!(value["passes"][1]["insertion_space"], 6);
        assert_eq!(value["execution"], "completed");
    }
}
