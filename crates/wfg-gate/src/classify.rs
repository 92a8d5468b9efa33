use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use wfg_core::SkillId;

use crate::config::PatternConfig;

fn compile(kind: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("invalid {kind} pattern `{p}`")))
        .collect()
}

/// Compiled form of [`PatternConfig`].
#[derive(Clone, Debug)]
pub struct Classifier {
    baseline: Vec<Regex>,
    dangerous: Vec<Regex>,
    generative: Vec<Regex>,
    approval: Vec<Regex>,
    sensitive: Vec<Regex>,
    script_extensions: Vec<String>,
}

impl Classifier {
    pub fn new(cfg: &PatternConfig) -> Result<Self> {
        Ok(Self {
            baseline: compile("baseline", &cfg.baseline)?,
            dangerous: compile("dangerous command", &cfg.dangerous_commands)?,
            generative: compile("generative command", &cfg.generative_commands)?,
            approval: compile("approval command", &cfg.approval_commands)?,
            sensitive: compile("sensitive path", &cfg.sensitive_paths)?,
            script_extensions: cfg
                .script_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn is_baseline(&self, path: &str) -> bool {
        self.baseline.iter().any(|re| re.is_match(path))
    }

    pub fn is_dangerous_command(&self, command: &str) -> bool {
        self.dangerous.iter().any(|re| re.is_match(command))
    }

    pub fn is_generative_command(&self, command: &str) -> bool {
        self.generative.iter().any(|re| re.is_match(command))
    }

    /// The first approval pattern the command matches, as its source text.
    pub fn approval_pattern(&self, command: &str) -> Option<&str> {
        self.approval.iter().find(|re| re.is_match(command)).map(Regex::as_str)
    }

    pub fn is_sensitive_path(&self, path: &str) -> bool {
        self.sensitive.iter().any(|re| re.is_match(path))
    }

    pub fn is_script(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| self.script_extensions.contains(&e))
    }
}

/// What a prompt classifier found in an operator request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptClassification {
    pub skills: Vec<SkillId>,
    pub requires_same_workflow: bool,
}

impl PromptClassification {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && !self.requires_same_workflow
    }
}

/// Heuristic reading of operator prompts. Results only feed
/// `record_required_skills`; gate decisions never depend on them directly.
pub trait PromptClassifier: Send + Sync {
    fn classify(&self, prompt: &str) -> PromptClassification;
}

pub struct SkillMentionClassifier {
    skill_patterns: Vec<Regex>,
    same_workflow: Vec<Regex>,
}

impl SkillMentionClassifier {
    pub fn new() -> Result<Self> {
        let skill_patterns = [
            r"(?i)\b(?:use|using)\s+(?:the\s+)?([A-Za-z0-9_-]+)\s+skill",
            r"(?:^|\s)/([A-Za-z0-9_-]+)\b",
        ];
        let same_workflow = [
            r"(?i)\b(?:same|identical)\s+(?:workflow|script|method)",
            r"(?i)\bexisting\s+(?:workflow|script)",
            r"(?i)\bas\s+(?:before|last\s+time)\b",
        ];
        Ok(Self {
            skill_patterns: skill_patterns
                .iter()
                .map(|p| Regex::new(p).context("skill mention pattern"))
                .collect::<Result<_>>()?,
            same_workflow: same_workflow
                .iter()
                .map(|p| Regex::new(p).context("same-workflow pattern"))
                .collect::<Result<_>>()?,
        })
    }
}

impl PromptClassifier for SkillMentionClassifier {
    fn classify(&self, prompt: &str) -> PromptClassification {
        let mut seen = BTreeSet::new();
        let mut skills = Vec::new();
        for re in &self.skill_patterns {
            for caps in re.captures_iter(prompt) {
                if let Some(m) = caps.get(1) {
                    if seen.insert(m.as_str().to_string()) {
                        skills.push(SkillId::from_str(m.as_str()));
                    }
                }
            }
        }
        PromptClassification {
            skills,
            requires_same_workflow: self.same_workflow.iter().any(|re| re.is_match(prompt)),
        }
    }
}
