//! Observability sink injected into the orchestrator.

use std::sync::Mutex;

use tracing::debug;

/// Receives named, labelled measurements.
pub trait ObservabilitySink: Send + Sync {
    fn observe(&self, name: &str, labels: &[(&str, &str)], value: f64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn observe(&self, _name: &str, _labels: &[(&str, &str)], _value: f64) {}
}

/// Emits every measurement as a debug event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ObservabilitySink for LogSink {
    fn observe(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        debug!(metric = name, ?labels, value, "observation");
    }
}

/// One recorded measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Keeps every measurement in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    samples: Mutex<Vec<Sample>>,
}

impl RecordingSink {
    pub fn samples(&self) -> Vec<Sample> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ObservabilitySink for RecordingSink {
    fn observe(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let sample = Sample {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        };
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_labels() {
        let sink = RecordingSink::default();
        sink.observe("transitions", &[("operation", "approve"), ("state", "Approved")], 1.0);

        let samples = sink.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label("operation"), Some("approve"));
        assert_eq!(samples[0].label("missing"), None);
        assert_eq!(samples[0].value, 1.0);
    }
}
