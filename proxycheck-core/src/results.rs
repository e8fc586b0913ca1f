use serde::Serialize;
use serde::ser::Serializer;
use serde_json::{Map, Value};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    #[serde(skip)]
    pub name: String,
    pub passed: bool,
    pub details: Map<String, Value>,
}

impl ScenarioResult {
    /// `details` is expected to be a JSON object; anything else is stored as an empty map.
    pub fn new(name: impl Into<String>, passed: bool, details: Value) -> Self {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            name: name.into(),
            passed,
            details,
        }
    }
}

/// Scenario results of one run, in first-recorded order. Recording a name twice replaces the
/// earlier result in place.
#[derive(Debug, Clone, Default)]
pub struct ResultCollector {
    results: Vec<ScenarioResult>,
    warnings: u64,
}

impl ResultCollector {
    pub fn add(&mut self, result: ScenarioResult) {
        match self.results.iter_mut().find(|r| r.name == result.name) {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn add_warning(&mut self) {
        self.warnings = self.warnings.saturating_add(1);
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub fn summary(&self) -> RunSummary {
        let total = self.results.len() as u64;
        let passed = self.results.iter().filter(|r| r.passed).count() as u64;
        let failed = total - passed;
        RunSummary {
            total,
            passed,
            failed,
            warnings: self.warnings,
            pass_rate: format!("{:.2}%", passed as f64 / total.max(1) as f64 * 100.0),
            details: self.results.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub warnings: u64,
    pub pass_rate: String,
    #[serde(serialize_with = "serialize_by_name")]
    pub details: Vec<ScenarioResult>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn serialize_by_name<S>(results: &[ScenarioResult], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(results.iter().map(|r| (r.name.as_str(), r)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_is_derived_from_stored_results() {
        let mut c = ResultCollector::default();
        c.add(ScenarioResult::new("health_endpoint", true, json!({"status": 200})));
        c.add(ScenarioResult::new("caching", false, json!({"bodies_match": false})));
        c.add(ScenarioResult::new("rate_limiting", true, Value::Null));

        let s = c.summary();
        assert_eq!(s.total, 3);
        assert_eq!(s.passed, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.pass_rate, "66.67%");
        assert!(!s.all_passed());
    }

    #[test]
    fn repeated_name_replaces_previous_result() {
        let mut c = ResultCollector::default();
        c.add(ScenarioResult::new("caching", false, Value::Null));
        c.add(ScenarioResult::new("load_test", true, Value::Null));
        c.add(ScenarioResult::new("caching", true, json!({"faster": true})));

        let s = c.summary();
        assert_eq!(s.total, 2);
        assert!(s.all_passed());
        assert_eq!(s.details[0].name, "caching");
        assert_eq!(c.get("caching").map(|r| r.passed), Some(true));
    }

    #[test]
    fn empty_run_has_zero_pass_rate() {
        let s = ResultCollector::default().summary();
        assert_eq!(s.total, 0);
        assert_eq!(s.pass_rate, "0.00%");
        assert!(s.all_passed());
    }

    #[test]
    fn report_json_is_keyed_by_scenario_name() -> Result<()> {
        let mut c = ResultCollector::default();
        c.add(ScenarioResult::new("health_endpoint", true, json!({"status": 200})));
        c.add_warning();

        let v: Value = serde_json::from_str(&c.summary().to_json_pretty()?)?;
        assert_eq!(v["total"], 1);
        assert_eq!(v["warnings"], 1);
        assert_eq!(v["pass_rate"], "100.00%");
        assert_eq!(v["details"]["health_endpoint"]["passed"], true);
        assert_eq!(v["details"]["health_endpoint"]["details"]["status"], 200);
        Ok(())
    }
}
