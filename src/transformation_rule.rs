use serde::Serialize;
use serde_json::{Map, Value};

/// Ordered code translation table. Lookups scan front to back and the first
/// matching source code wins.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ValueMap {
    pub name: &'static str,
    pub entries: &'static [(&'static str, &'static str)],
}

impl ValueMap {
    pub fn lookup(&self, code: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(source, _)| *source == code)
            .map(|(_, target)| *target)
    }

    /// Translate a code, passing unknown codes through unchanged
    pub fn translate<'a>(&self, code: &'a str) -> &'a str {
        self.lookup(code).map_or(code, |target| target)
    }
}

/// Represents a transformation rule that moves one top-level field of an R4
/// resource onto the STU3 output
#[derive(Debug, Clone, Serialize)]
pub struct TransformationRule {
    pub rule_id: String,
    pub source_path: String,
    pub target_path: String,
    pub transformation_type: TransformationType,
    pub condition: Option<Condition>,
}

/// Types of transformations that can be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransformationType {
    /// Copy a field verbatim under the same name
    Copy,
    /// Copy a field verbatim under a new name
    Rename,
    /// Translate a coded string value through a table
    ValueMap(&'static ValueMap),
    /// Resource specific restructuring, named for reporting
    Transform(&'static str),
}

/// Rule guard: the field at `field_path` must equal `expected_value`
#[derive(Debug, Clone, Serialize)]
pub struct Condition {
    pub field_path: String,
    pub expected_value: Value,
}

/// Represents a transformation that was applied during processing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedTransformation {
    pub rule_id: String,
    pub source_path: String,
    pub target_path: String,
    pub transformation_type: TransformationType,
}

/// What happened when a single rule was evaluated
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Applied(AppliedTransformation),
    /// The source field is not present; normal for optional elements
    SourceAbsent,
    /// The source field is present but the rule's condition did not hold
    ConditionUnmet,
}

impl Condition {
    pub fn value_equals(field_path: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            field_path: field_path.into(),
            expected_value: expected.into(),
        }
    }
}

impl TransformationRule {
    pub fn new(
        rule_id: impl Into<String>,
        source_path: impl Into<String>,
        target_path: impl Into<String>,
        transformation_type: TransformationType,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            source_path: source_path.into(),
            target_path: target_path.into(),
            transformation_type,
            condition: None,
        }
    }

    pub fn copy(field: &str) -> Self {
        Self::new(format!("copy.{field}"), field, field, TransformationType::Copy)
    }

    pub fn rename(source: &str, target: &str) -> Self {
        Self::new(
            format!("rename.{source}.{target}"),
            source,
            target,
            TransformationType::Rename,
        )
    }

    pub fn value_map(field: &str, table: &'static ValueMap) -> Self {
        Self::new(
            format!("map.{field}.{}", table.name),
            field,
            field,
            TransformationType::ValueMap(table),
        )
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Check if the rule's condition is satisfied
    pub fn condition_satisfied(&self, resource: &Map<String, Value>) -> bool {
        match &self.condition {
            None => true,
            Some(condition) => get_nested_value(resource, &condition.field_path)
                .is_some_and(|actual| *actual == condition.expected_value),
        }
    }

    /// Evaluate the rule against `source`, writing its result into `target`
    pub fn apply(&self, source: &Map<String, Value>, target: &mut Map<String, Value>) -> RuleOutcome {
        let Some(value) = get_nested_value(source, &self.source_path) else {
            return RuleOutcome::SourceAbsent;
        };
        if !self.condition_satisfied(source) {
            return RuleOutcome::ConditionUnmet;
        }

        let output = match self.transformation_type {
            TransformationType::ValueMap(table) => match value.as_str() {
                Some(code) => Value::String(table.translate(code).to_string()),
                None => value.clone(),
            },
            _ => value.clone(),
        };
        target.insert(self.target_path.clone(), output);

        RuleOutcome::Applied(AppliedTransformation {
            rule_id: self.rule_id.clone(),
            source_path: self.source_path.clone(),
            target_path: self.target_path.clone(),
            transformation_type: self.transformation_type,
        })
    }
}

impl AppliedTransformation {
    /// Record for a restructuring step that is not driven by a rule table
    pub fn transform(name: &'static str, source_path: &str, target_path: &str) -> Self {
        Self {
            rule_id: format!("transform.{name}"),
            source_path: source_path.to_string(),
            target_path: target_path.to_string(),
            transformation_type: TransformationType::Transform(name),
        }
    }
}

/// Build one `Copy` rule per field of an allow-list, preserving its order
pub fn copy_rules(fields: &[&str]) -> Vec<TransformationRule> {
    fields.iter().map(|field| TransformationRule::copy(field)).collect()
}

/// Get a nested value from a JSON object using dot notation
pub fn get_nested_value<'a>(resource: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = resource.get(parts.next()?)?;

    for part in parts {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static STATUS: ValueMap = ValueMap {
        name: "status",
        entries: &[("on-hold", "suspended"), ("stopped", "aborted")],
    };

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_transformation_rule_creation() {
        let rule = TransformationRule::rename("reasonCode", "reason");

        assert_eq!(rule.rule_id, "rename.reasonCode.reason");
        assert_eq!(rule.source_path, "reasonCode");
        assert_eq!(rule.target_path, "reason");
        assert_eq!(rule.transformation_type, TransformationType::Rename);
        assert!(rule.condition.is_none());
    }

    #[test]
    fn test_copy_rule_is_structural_copy() {
        let source = object(json!({"identifier": [{"system": "urn:x", "value": "1"}]}));
        let mut target = Map::new();

        let outcome = TransformationRule::copy("identifier").apply(&source, &mut target);

        assert!(matches!(outcome, RuleOutcome::Applied(_)));
        assert_eq!(target["identifier"], source["identifier"]);
    }

    #[test]
    fn test_absent_source_is_skipped() {
        let source = object(json!({"status": "active"}));
        let mut target = Map::new();

        let outcome = TransformationRule::copy("identifier").apply(&source, &mut target);

        assert_eq!(outcome, RuleOutcome::SourceAbsent);
        assert!(target.is_empty());
    }

    #[test]
    fn test_value_map_translates_and_passes_through() {
        let rule = TransformationRule::value_map("status", &STATUS);
        let mut target = Map::new();

        rule.apply(&object(json!({"status": "on-hold"})), &mut target);
        assert_eq!(target["status"], json!("suspended"));

        rule.apply(&object(json!({"status": "completed"})), &mut target);
        assert_eq!(target["status"], json!("completed"));
    }

    #[test]
    fn test_value_map_first_match_wins() {
        static DUPLICATE: ValueMap = ValueMap {
            name: "dup",
            entries: &[("a", "first"), ("a", "second")],
        };
        assert_eq!(DUPLICATE.lookup("a"), Some("first"));
        assert_eq!(DUPLICATE.lookup("b"), None);
    }

    #[test]
    fn test_condition_value_equals() {
        let rule = TransformationRule::rename("statusReason", "notDoneReason")
            .with_condition(Condition::value_equals("status", "not-done"));

        let not_done = object(json!({"status": "not-done", "statusReason": {"text": "x"}}));
        let completed = object(json!({"status": "completed", "statusReason": {"text": "x"}}));

        let mut target = Map::new();
        assert!(matches!(rule.apply(&not_done, &mut target), RuleOutcome::Applied(_)));
        assert_eq!(target["notDoneReason"], json!({"text": "x"}));

        let mut target = Map::new();
        assert_eq!(rule.apply(&completed, &mut target), RuleOutcome::ConditionUnmet);
        assert!(target.is_empty());
    }

    #[test]
    fn test_condition_fails_when_guard_field_is_missing() {
        let rule = TransformationRule::rename("statusReason", "notDoneReason")
            .with_condition(Condition::value_equals("status", "not-done"));

        assert!(!rule.condition_satisfied(&object(json!({"statusReason": {"text": "x"}}))));
        assert!(rule.condition_satisfied(&object(json!({"status": "not-done"}))));
    }

    #[test]
    fn test_get_nested_value() {
        let resource = object(json!({
            "provision": {"period": {"end": "2030-01-01"}}
        }));

        let value = get_nested_value(&resource, "provision.period.end");
        assert_eq!(value.unwrap().as_str().unwrap(), "2030-01-01");

        let missing = get_nested_value(&resource, "provision.missing.end");
        assert!(missing.is_none());
    }
}
