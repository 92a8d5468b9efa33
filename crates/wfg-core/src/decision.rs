use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Warn,
    Block,
}

/// The policy gate that produced a non-allow decision.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    IntentContract,
    ReferenceProvenance,
    DeviationApproval,
    BaselineIntegrity,
    ReadBeforeWrite,
    NewScript,
    WorkflowState,
    DefinitionLint,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::IntentContract => "intent_contract",
            Gate::ReferenceProvenance => "reference_provenance",
            Gate::DeviationApproval => "deviation_approval",
            Gate::BaselineIntegrity => "baseline_integrity",
            Gate::ReadBeforeWrite => "read_before_write",
            Gate::NewScript => "new_script",
            Gate::WorkflowState => "workflow_state",
            Gate::DefinitionLint => "definition_lint",
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one tool invocation.
///
/// `Allow` carries nothing. `Warn` and `Block` always carry a machine-readable
/// reason code and a remediation hint for the operator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<Gate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remediation: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            gate: None,
            reason_code: None,
            message: String::new(),
            remediation: String::new(),
            details: Value::Null,
        }
    }

    pub fn block(gate: Gate, reason_code: impl Into<String>, message: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            decision: Decision::Block,
            gate: Some(gate),
            reason_code: Some(reason_code.into()),
            message: message.into(),
            remediation: remediation.into(),
            details: Value::Null,
        }
    }

    pub fn warn(gate: Gate, reason_code: impl Into<String>, message: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            decision: Decision::Warn,
            ..Self::block(gate, reason_code, message, remediation)
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn is_block(&self) -> bool {
        self.decision == Decision::Block
    }

    pub fn is_allow(&self) -> bool {
        self.decision == Decision::Allow
    }

    pub fn reason(&self) -> &str {
        self.reason_code.as_deref().unwrap_or("")
    }
}
