use wfg_store::StateSummary;

/// Markdown block injected at session start so a resumed agent knows which
/// phase it is in and what it must not touch.
pub fn format_summary(summary: &StateSummary) -> String {
    let mut lines = vec![
        "=== WORKFLOW STATE SUMMARY ===".to_string(),
        String::new(),
        format!("**Workflow**: {}", summary.workflow_id),
        format!(
            "**Mode**: {}",
            if summary.strict_mode { "STRICT (deviations are blocked)" } else { "ADVISORY" }
        ),
        format!("**Current Phase**: {}", summary.current_phase),
        format!("**Started**: {}", summary.started_at),
    ];
    if !summary.completed_phases.is_empty() {
        let done: Vec<String> = summary.completed_phases.iter().map(u32::to_string).collect();
        lines.push(format!("**Completed Phases**: {}", done.join(", ")));
    }
    if let Some(path) = &summary.intent_contract {
        lines.push(format!("**Intent Contract**: {}", path));
    }
    if let Some(objective) = &summary.objective {
        lines.push(format!("**Objective**: {}", objective));
    }
    lines.push(format!("**Skill Phase**: {}", summary.skill_phase.as_str()));
    if let Some(skill) = &summary.active_skill_id {
        match &summary.active_skill_step_id {
            Some(step) => lines.push(format!("**Active**: {} / {}", skill, step)),
            None => lines.push(format!("**Active**: {}", skill)),
        }
    }
    if summary.requires_same_workflow {
        lines.push(String::new());
        lines.push("**CRITICAL**: the operator asked for the same workflow; reuse the existing script".to_string());
    }
    if !summary.pending_skills.is_empty() {
        lines.push(String::new());
        lines.push("**Pending Skills (MANDATORY)**:".to_string());
        for skill in &summary.pending_skills {
            lines.push(format!("  - {}", skill));
        }
    }

    if !summary.baseline.is_empty() {
        lines.push(String::new());
        lines.push("**Baseline Files (do not modify)**:".to_string());
        for pin in &summary.baseline {
            lines.push(format!("  - {} ({}...)", pin.name, pin.short_digest));
        }
    }
    if !summary.skills_used.is_empty() {
        lines.push(String::new());
        lines.push("**Used Skills**:".to_string());
        for skill in &summary.skills_used {
            lines.push(format!("  - {}", skill));
        }
    }
    if !summary.evidence_by_type.is_empty() {
        let counts: Vec<String> = summary.evidence_by_type.iter().map(|(ty, n)| format!("{ty}={n}")).collect();
        lines.push(format!("**Evidence**: {}", counts.join(", ")));
    }
    if !summary.blockers.is_empty() {
        lines.push(String::new());
        lines.push("**BLOCKERS**:".to_string());
        for b in &summary.blockers {
            lines.push(format!("  - {}", b));
        }
    }

    lines.push(String::new());
    lines.push("**RULES**:".to_string());
    lines.push("1. Baseline files must not be modified".to_string());
    lines.push("2. Read a file before editing it".to_string());
    lines.push("3. Actions outside the instructions need prior approval".to_string());
    lines.push("4. Use the Skill tool when a skill is requested".to_string());
    lines.push(String::new());
    lines.push("=== END WORKFLOW STATE ===".to_string());
    lines.join("\n")
}
