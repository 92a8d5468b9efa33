use wfg_core::{Decision, GateDecision, SkillId};

/// Markdown notice shown to the agent when an action is blocked or warned.
/// Allow decisions render as an empty string.
pub fn format_notice(decision: &GateDecision) -> String {
    let title = match decision.decision {
        Decision::Allow => return String::new(),
        Decision::Warn => "WARNING",
        Decision::Block => "BLOCKED",
    };
    let gate = decision.gate.map(|g| g.as_str()).unwrap_or("workflow");
    let mut s = String::new();
    s.push_str(&format!("=== {} ({}) ===\n\n", title, gate));
    s.push_str(&format!("**Reason:** `{}`\n\n", decision.reason()));
    s.push_str(&format!("{}\n", decision.message));
    if !decision.remediation.is_empty() {
        s.push_str(&format!("\n**Next step:** {}\n", decision.remediation));
    }
    if !decision.details.is_null() {
        let details = serde_json::to_string_pretty(&decision.details).unwrap_or_default();
        s.push_str(&format!("\n```json\n{}\n```\n", details));
    }
    s.push_str(&format!("\n=== END {} ===\n", title));
    s
}

/// Context added to the agent's prompt when the operator named skills or
/// asked to repeat an existing workflow. Empty when neither applies.
pub fn format_prompt_context(skills: &[SkillId], same_workflow: bool) -> String {
    if skills.is_empty() && !same_workflow {
        return String::new();
    }
    let mut lines = vec!["=== SKILL USAGE GUARD ===".to_string(), String::new()];
    if !skills.is_empty() {
        lines.push("**MANDATORY: use the skills the operator named**".to_string());
        lines.push(String::new());
        lines.push("Requested skills:".to_string());
        for skill in skills {
            lines.push(format!("  - {}", skill));
        }
        lines.push(String::new());
        lines.push("Do not reimplement these by hand. Invoke them through the Skill tool or `/<skill>`.".to_string());
        lines.push(String::new());
    }
    if same_workflow {
        lines.push("**CRITICAL: the operator asked for the same workflow**".to_string());
        lines.push(String::new());
        lines.push("1. Find the existing script or workflow file".to_string());
        lines.push("2. Read it before doing anything else".to_string());
        lines.push("3. Work from what it actually does".to_string());
        lines.push("4. Ask before creating any new script".to_string());
        lines.push(String::new());
        lines.push("Do not write a \"simpler\" or \"optimised\" variant instead.".to_string());
        lines.push(String::new());
    }
    lines.push("=== END SKILL USAGE GUARD ===".to_string());
    lines.join("\n")
}
