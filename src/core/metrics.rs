use serde_json::{json, Map, Value};
use std::path::Path;

/// Run-scoped diagnostics accumulator. Built per run, threaded through the
/// pipeline stages explicitly, and flattened to a key→value JSON map at the
/// end. Nothing downstream depends on it for correctness.
#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    values: Map<String, Value>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a metric. When both the stored and incoming values are
    /// objects, keys merge instead of replacing, so repeated calls like
    /// `record("match_rate", {"ytd": ..})` accumulate sub-metrics.
    pub fn record(&mut self, key: &str, value: Value) {
        match self.values.entry(key.to_string()) {
            serde_json::map::Entry::Occupied(mut occupied) => {
                match (occupied.get_mut(), value) {
                    (Value::Object(existing), Value::Object(incoming)) => {
                        existing.extend(incoming);
                    }
                    (slot, value) => *slot = value,
                }
            }
            serde_json::map::Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
        }
    }

    pub fn record_rate(&mut self, group: &str, name: &str, rate: f64) {
        self.record(group, json!({ name: rate }));
    }

    pub fn record_flag(&mut self, key: &str, value: bool) {
        self.record(key, Value::Bool(value));
    }

    pub fn record_count(&mut self, key: &str, count: usize) {
        self.record(key, json!(count));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_values_merge_by_key() {
        let mut metrics = RunMetrics::new();
        metrics.record_rate("match_rate", "fy", 0.94);
        metrics.record_rate("match_rate", "ytd", 0.88);
        metrics.record_rate("match_rate", "fy", 0.95);

        let rates = metrics.get("match_rate").unwrap();
        assert_eq!(rates["fy"], json!(0.95));
        assert_eq!(rates["ytd"], json!(0.88));
    }

    #[test]
    fn scalar_values_overwrite() {
        let mut metrics = RunMetrics::new();
        metrics.record_flag("fallback_triggered", false);
        metrics.record_flag("fallback_triggered", true);
        assert_eq!(metrics.get("fallback_triggered"), Some(&Value::Bool(true)));
    }

    #[test]
    fn writes_flat_json() {
        let mut metrics = RunMetrics::new();
        metrics.record_count("negated_labels_extracted", 30);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary_metrics.json");
        metrics.write_to(&path).unwrap();
        let body: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(body["negated_labels_extracted"], json!(30));
    }
}
