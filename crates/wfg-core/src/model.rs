use serde::{Deserialize, Serialize};

/// Closed vocabulary of evidence kinds. Gate checks name the exact kinds they
/// require; nothing is inferred from the payload.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    ReadFile,
    SearchRepo,
    ArtifactCreated,
    ArtifactUpdated,
    ReferenceDigest,
    CommandExecuted,
    SkillInvoked,
    DecisionMade,
}

impl EvidenceType {
    pub const ALL: [EvidenceType; 8] = [
        EvidenceType::ReadFile,
        EvidenceType::SearchRepo,
        EvidenceType::ArtifactCreated,
        EvidenceType::ArtifactUpdated,
        EvidenceType::ReferenceDigest,
        EvidenceType::CommandExecuted,
        EvidenceType::SkillInvoked,
        EvidenceType::DecisionMade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::ReadFile => "read_file",
            EvidenceType::SearchRepo => "search_repo",
            EvidenceType::ArtifactCreated => "artifact_created",
            EvidenceType::ArtifactUpdated => "artifact_updated",
            EvidenceType::ReferenceDigest => "reference_digest",
            EvidenceType::CommandExecuted => "command_executed",
            EvidenceType::SkillInvoked => "skill_invoked",
            EvidenceType::DecisionMade => "decision_made",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let n = s.trim();
        Self::ALL.into_iter().find(|t| t.as_str() == n)
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a tool invocation an event describes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum HookPhase {
    #[serde(rename = "before", alias = "PreToolUse", alias = "pre")]
    Before,
    #[serde(rename = "after", alias = "PostToolUse", alias = "post")]
    After,
}

impl Default for HookPhase {
    fn default() -> Self {
        HookPhase::Before
    }
}

/// Tool families the gate distinguishes. Unknown tools are carried through
/// by name and never gated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolKind {
    Read,
    Write,
    Edit,
    Bash,
    Search,
    Skill,
    Delegate,
    Other(String),
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Read" | "read" => ToolKind::Read,
            "Write" | "write" => ToolKind::Write,
            "Edit" | "MultiEdit" | "NotebookEdit" | "edit" => ToolKind::Edit,
            "Bash" | "bash" | "shell" => ToolKind::Bash,
            "Grep" | "Glob" | "grep" | "glob" | "search" => ToolKind::Search,
            "Skill" | "skill" => ToolKind::Skill,
            "Task" | "Agent" | "task" | "delegate" => ToolKind::Delegate,
            other => ToolKind::Other(other.to_string()),
        }
    }

    /// Execute, write, edit, skill-invoke and delegate operations.
    pub fn is_dangerous(&self) -> bool {
        matches!(
            self,
            ToolKind::Write | ToolKind::Edit | ToolKind::Bash | ToolKind::Skill | ToolKind::Delegate
        )
    }

    pub fn writes_file(&self) -> bool {
        matches!(self, ToolKind::Write | ToolKind::Edit)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetChoice {
    Reuse,
    Create,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_type_names_round_trip_through_parse() {
        for t in EvidenceType::ALL {
            assert_eq!(EvidenceType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EvidenceType::parse("telepathy"), None);
        assert_eq!(serde_json::to_string(&EvidenceType::SearchRepo).unwrap(), "\"search_repo\"");
    }

    #[test]
    fn hook_phase_accepts_runtime_event_names() {
        let p: HookPhase = serde_json::from_str("\"PostToolUse\"").unwrap();
        assert_eq!(p, HookPhase::After);
        let p: HookPhase = serde_json::from_str("\"before\"").unwrap();
        assert_eq!(p, HookPhase::Before);
    }

    #[test]
    fn dangerous_tools() {
        assert!(ToolKind::from_name("Bash").is_dangerous());
        assert!(ToolKind::from_name("MultiEdit").is_dangerous());
        assert!(ToolKind::from_name("Task").is_dangerous());
        assert!(!ToolKind::from_name("Read").is_dangerous());
        assert!(!ToolKind::from_name("Grep").is_dangerous());
        assert_eq!(ToolKind::from_name("WebFetch"), ToolKind::Other("WebFetch".into()));
    }
}
