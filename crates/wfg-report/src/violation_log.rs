use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use wfg_core::{now, GateDecision};

const HEADER: &str = "# Mistakes Log\n\nViolations recorded automatically by the workflow guard. Review before starting work.\n\n---\n";

/// Append-only Markdown log of blocked actions.
#[derive(Clone, Debug)]
pub struct ViolationLog {
    path: PathBuf,
}

impl ViolationLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, violation: &str, location: &str, remedy: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let fresh = !self.path.exists();
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open violation log {}", self.path.display()))?;
        if fresh {
            f.write_all(HEADER.as_bytes())?;
        }
        writeln!(
            f,
            "\n## {}\n\n**Violation**: {}\n**Location**: {}\n**Remedy**: {}\n\n---",
            now().to_rfc3339(),
            violation,
            location,
            remedy
        )?;
        Ok(())
    }

    pub fn append_decision(&self, decision: &GateDecision, location: &str) -> Result<()> {
        let violation = format!("[{}] {}", decision.reason(), decision.message);
        self.append(&violation, location, &decision.remediation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wfg_core::Gate;

    #[test]
    fn header_written_once() {
        let dir = tempdir().unwrap();
        let log = ViolationLog::new(dir.path().join("nested/mistakes.md"));
        log.append("edited baseline", "main.py", "restore it").unwrap();
        let d = GateDecision::block(Gate::ReadBeforeWrite, "read_before_write", "not read", "read first");
        log.append_decision(&d, "util.py").unwrap();

        let body = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(body.matches("# Mistakes Log").count(), 1);
        assert!(body.contains("**Violation**: edited baseline"));
        assert!(body.contains("**Violation**: [read_before_write] not read"));
        assert!(body.contains("**Location**: util.py"));
    }
}
