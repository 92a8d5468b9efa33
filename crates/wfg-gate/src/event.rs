use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wfg_core::{HookPhase, ToolKind};

/// One tool invocation as delivered by the agent runtime on stdin.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolEvent {
    #[serde(alias = "toolName")]
    pub tool_name: String,
    #[serde(default, alias = "toolInput")]
    pub tool_input: ToolInput,
    #[serde(default, alias = "workingDirectory")]
    pub cwd: Option<PathBuf>,
    #[serde(default, alias = "hookPhase", alias = "hook_event_name")]
    pub hook_event: HookPhase,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolInput {
    #[serde(default, alias = "path", alias = "notebook_path", alias = "filePath")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub subagent_type: Option<String>,
}

impl ToolEvent {
    pub fn new(tool_name: &str, phase: HookPhase) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            hook_event: phase,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.tool_input.file_path = Some(path.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.tool_input.command = Some(command.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tool_input.pattern = Some(pattern.into());
        self
    }

    pub fn kind(&self) -> ToolKind {
        ToolKind::from_name(&self.tool_name)
    }

    pub fn command(&self) -> &str {
        self.tool_input.command.as_deref().unwrap_or("")
    }

    /// The target file, made absolute against `root` when relative.
    pub fn target_path(&self, root: &Path) -> Option<PathBuf> {
        let raw = self.tool_input.file_path.as_deref().filter(|p| !p.is_empty())?;
        let p = PathBuf::from(raw);
        Some(if p.is_absolute() { p } else { root.join(p) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_runtime_payload() {
        let raw = r#"{
            "tool_name": "Edit",
            "tool_input": {"file_path": "src/main.py", "old_string": "a", "new_string": "b"},
            "cwd": "/repo",
            "hook_event": "PreToolUse",
            "session_id": "s-1"
        }"#;
        let e: ToolEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(e.kind(), ToolKind::Edit);
        assert_eq!(e.hook_event, HookPhase::Before);
        assert_eq!(e.target_path(Path::new("/repo")), Some(PathBuf::from("/repo/src/main.py")));
        assert_eq!(e.session_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn phase_defaults_to_before() {
        let e: ToolEvent = serde_json::from_str(r#"{"tool_name": "Bash", "tool_input": {"command": "ls"}}"#).unwrap();
        assert_eq!(e.hook_event, HookPhase::Before);
        assert_eq!(e.command(), "ls");
        assert!(e.target_path(Path::new("/")).is_none());
    }

    #[test]
    fn camel_case_aliases() {
        let e: ToolEvent =
            serde_json::from_str(r#"{"toolName": "Read", "toolInput": {"path": "/a/b.txt"}, "hookPhase": "after"}"#)
                .unwrap();
        assert_eq!(e.hook_event, HookPhase::After);
        assert_eq!(e.tool_input.file_path.as_deref(), Some("/a/b.txt"));
    }
}
