//! Built-in plan modifiers
//!
//! Plan modifiers run during PlanResourceChange after defaults are applied.
//! The framework only honours `requires_replace` when a prior state exists.

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;

/// Marks an attribute as requiring replacement whenever its value changes
/// (the equivalent of ForceNew)
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = !values_equal(&request.state_value.value, &request.plan_value.value);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Requires replacement only when the predicate holds for the change
pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync + 'static,
{
    pub fn create(predicate: F, description: impl Into<String>) -> Box<dyn PlanModifier> {
        Box::new(Self {
            predicate,
            description: description.into(),
        })
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let changed = !values_equal(&request.state_value.value, &request.plan_value.value);
        let requires_replace = changed && (self.predicate)(&request);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Structural equality; unknown never equals anything, and lists compare
/// order-sensitively (Terraform sends sets in a canonical order)
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("acl_id"),
        }
    }

    #[test]
    fn requires_replace_on_change() {
        let modifier = RequiresReplace;
        assert!(modifier.modify(request("a".into(), "b".into())).requires_replace);
        assert!(!modifier.modify(request("a".into(), "a".into())).requires_replace);
    }

    #[test]
    fn requires_replace_when_value_becomes_unknown() {
        let modifier = RequiresReplace;
        assert!(modifier.modify(request("a".into(), Dynamic::Unknown)).requires_replace);
    }

    #[test]
    fn requires_replace_if_consults_predicate() {
        let modifier = RequiresReplaceIf::create(
            |req: &PlanModifierRequest| req.state_value.value.as_str() == Some("none"),
            "replace when leaving the default ACL",
        );

        assert!(modifier.modify(request("none".into(), "acl-1".into())).requires_replace);
        assert!(!modifier.modify(request("acl-1".into(), "acl-2".into())).requires_replace);
        assert!(!modifier.modify(request("none".into(), "none".into())).requires_replace);
    }

    #[test]
    fn maps_compare_by_content() {
        let a = Dynamic::Map([("k".to_string(), Dynamic::from("v"))].into());
        let b = Dynamic::Map([("k".to_string(), Dynamic::from("v"))].into());
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &Dynamic::Null));
    }
}
