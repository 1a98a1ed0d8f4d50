//! Label selector compiler
//!
//! Turns a Kubernetes label selector into a Calico selector expression.
//! Pod selectors are pinned to the Kubernetes orchestrator so they never
//! match host endpoints or workloads from other orchestrators.

use netpol_common::k8s::{LabelSelector, LabelSelectorOperator};
use netpol_common::ConverterConfig;

/// Selector that matches everything
pub const SELECT_ALL: &str = "all()";

/// What a selector is matching against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorContext {
    /// Namespace labels
    Namespace,
    /// Pod labels
    Pod,
}

/// Compile a label selector into a selector expression
///
/// An absent namespace selector compiles to `""` (unconstrained) while a
/// present but empty one compiles to `all()` (every namespace).
pub fn compile_selector(
    config: &ConverterConfig,
    selector: Option<&LabelSelector>,
    context: SelectorContext,
) -> String {
    let mut clauses = Vec::new();
    if context == SelectorContext::Pod {
        clauses.push(config.orchestrator_clause());
    }

    let Some(selector) = selector else {
        return clauses.join(" && ");
    };

    if context == SelectorContext::Namespace && selector.is_empty() {
        return SELECT_ALL.to_string();
    }

    // BTreeMap iterates in key order
    for (key, value) in &selector.match_labels {
        clauses.push(format!("{} == '{}'", key, value));
    }

    for expr in &selector.match_expressions {
        let values = expr.values.join("', '");
        let clause = match expr.operator {
            LabelSelectorOperator::In => format!("{} in {{ '{}' }}", expr.key, values),
            LabelSelectorOperator::NotIn => format!("{} not in {{ '{}' }}", expr.key, values),
            LabelSelectorOperator::Exists => format!("has({})", expr.key),
            LabelSelectorOperator::DoesNotExist => format!("! has({})", expr.key),
        };
        clauses.push(clause);
    }

    clauses.join(" && ")
}
