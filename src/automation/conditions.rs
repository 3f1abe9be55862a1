/// Condition evaluation against the runtime context
///
/// Field paths use simple dot notation resolved against the JSON context.
/// Conditions combine left-to-right through each condition's connector to
/// the next one: OR short-circuits to true on the first satisfied
/// condition, AND (the default) short-circuits to false on the first
/// failure.

use serde_json::Value;

use crate::automation::types::{Condition, ConditionOperator, LogicConnector};

/// Resolve a dot-separated field path against the context.
///
/// "user.plan" on { "user": { "plan": "free" } } yields "free". Any miss
/// along the path yields None.
pub fn resolve_field<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => current = obj.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Evaluate a single condition against the context.
pub fn evaluate_condition(condition: &Condition, context: &Value) -> bool {
    let resolved = resolve_field(context, &condition.field);
    match condition.operator {
        ConditionOperator::Exists => resolved.is_some_and(|v| !v.is_null()),
        ConditionOperator::NotExists => !resolved.is_some_and(|v| !v.is_null()),
        ConditionOperator::Equals => {
            resolved.is_some_and(|v| json_equals(v, &condition.value))
        }
        ConditionOperator::NotEquals => {
            !resolved.is_some_and(|v| json_equals(v, &condition.value))
        }
        ConditionOperator::Contains => resolved.is_some_and(|v| json_contains(v, &condition.value)),
        ConditionOperator::GreaterThan => compare_numeric(resolved, &condition.value)
            .is_some_and(|ordering| ordering == std::cmp::Ordering::Greater),
        ConditionOperator::LessThan => compare_numeric(resolved, &condition.value)
            .is_some_and(|ordering| ordering == std::cmp::Ordering::Less),
    }
}

/// Evaluate the full condition sequence. An empty list is always satisfied.
pub fn evaluate_sequence(conditions: &[Condition], context: &Value) -> bool {
    let Some(first) = conditions.first() else {
        return true;
    };

    let mut satisfied = evaluate_condition(first, context);
    for index in 1..conditions.len() {
        let connector = conditions[index - 1]
            .logic
            .unwrap_or(LogicConnector::And);
        match connector {
            LogicConnector::Or => {
                if satisfied {
                    return true;
                }
                satisfied = evaluate_condition(&conditions[index], context);
            }
            LogicConnector::And => {
                if !satisfied {
                    return false;
                }
                satisfied = evaluate_condition(&conditions[index], context);
            }
        }
    }
    satisfied
}

/// JSON equality with numeric coercion: 1 and 1.0 compare equal.
fn json_equals(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

/// Containment: substring for strings, element membership for arrays.
fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        Value::Array(items) => items.iter().any(|item| json_equals(item, needle)),
        _ => false,
    }
}

fn compare_numeric(resolved: Option<&Value>, value: &Value) -> Option<std::cmp::Ordering> {
    let left = resolved?.as_f64()?;
    let right = value.as_f64()?;
    left.partial_cmp(&right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(field: &str, operator: ConditionOperator, value: Value) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
            logic: None,
        }
    }

    #[test]
    fn empty_sequence_is_always_satisfied() {
        assert!(evaluate_sequence(&[], &json!({})));
        assert!(evaluate_sequence(&[], &json!({ "anything": 1 })));
    }

    #[test]
    fn equals_matches_and_misses() {
        let conditions = [cond("a", ConditionOperator::Equals, json!(1))];
        assert!(evaluate_sequence(&conditions, &json!({ "a": 1 })));
        assert!(!evaluate_sequence(&conditions, &json!({ "a": 2 })));
        assert!(!evaluate_sequence(&conditions, &json!({})));
        // Numeric coercion: 1 and 1.0 are the same value.
        assert!(evaluate_sequence(&conditions, &json!({ "a": 1.0 })));
    }

    #[test]
    fn dot_paths_resolve_nested_fields() {
        let context = json!({ "deal": { "stage": "won", "amount": 1200 } });
        assert!(evaluate_condition(
            &cond("deal.stage", ConditionOperator::Equals, json!("won")),
            &context
        ));
        assert!(evaluate_condition(
            &cond("deal.amount", ConditionOperator::GreaterThan, json!(1000)),
            &context
        ));
        assert!(!evaluate_condition(
            &cond("deal.owner.name", ConditionOperator::Exists, Value::Null),
            &context
        ));
    }

    #[test]
    fn or_short_circuits_on_first_satisfied() {
        let conditions = [
            Condition {
                field: "a".to_string(),
                operator: ConditionOperator::Equals,
                value: json!(1),
                logic: Some(LogicConnector::Or),
            },
            // Deliberately false for every context used below.
            cond("b", ConditionOperator::Equals, json!("never")),
        ];
        // First satisfied: overall true regardless of the second.
        assert!(evaluate_sequence(&conditions, &json!({ "a": 1 })));
        // First fails: outcome falls to the second.
        assert!(!evaluate_sequence(&conditions, &json!({ "a": 2 })));
    }

    #[test]
    fn and_short_circuits_on_first_failure() {
        let conditions = [
            cond("a", ConditionOperator::Equals, json!(1)),
            cond("b", ConditionOperator::Equals, json!(2)),
        ];
        assert!(evaluate_sequence(&conditions, &json!({ "a": 1, "b": 2 })));
        assert!(!evaluate_sequence(&conditions, &json!({ "a": 0, "b": 2 })));
        assert!(!evaluate_sequence(&conditions, &json!({ "a": 1, "b": 0 })));
    }

    #[test]
    fn contains_handles_strings_and_arrays() {
        let context = json!({ "tags": ["vip", "beta"], "note": "urgent follow up" });
        assert!(evaluate_condition(
            &cond("tags", ConditionOperator::Contains, json!("vip")),
            &context
        ));
        assert!(!evaluate_condition(
            &cond("tags", ConditionOperator::Contains, json!("trial")),
            &context
        ));
        assert!(evaluate_condition(
            &cond("note", ConditionOperator::Contains, json!("urgent")),
            &context
        ));
    }

    #[test]
    fn exists_treats_null_as_absent() {
        let context = json!({ "a": null, "b": 0 });
        assert!(!evaluate_condition(
            &cond("a", ConditionOperator::Exists, Value::Null),
            &context
        ));
        assert!(evaluate_condition(
            &cond("b", ConditionOperator::Exists, Value::Null),
            &context
        ));
        assert!(evaluate_condition(
            &cond("missing", ConditionOperator::NotExists, Value::Null),
            &context
        ));
    }

    #[test]
    fn not_equals_is_satisfied_by_absence() {
        let conditions = [cond("a", ConditionOperator::NotEquals, json!(5))];
        assert!(evaluate_sequence(&conditions, &json!({})));
        assert!(evaluate_sequence(&conditions, &json!({ "a": 4 })));
        assert!(!evaluate_sequence(&conditions, &json!({ "a": 5 })));
    }
}
