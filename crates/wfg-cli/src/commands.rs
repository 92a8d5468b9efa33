use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};
use wfg_contract::{pin_intent_contract, validate_intent_contract};
use wfg_core::{AssetChoice, AssetId, EvidenceType, GateDecision, SkillId, StepId, WorkflowState};
use wfg_gate::{
    apply_start_validation, GateConfig, Guard, HookRunner, PromptClassification, PromptClassifier,
    SkillMentionClassifier, ToolEvent,
};
use wfg_ledger::{
    capture, complete_skill, complete_step, record_asset_reuse_decision, record_deviation_approval, start_skill,
    start_step, TransitionError,
};
use wfg_registry::{
    register_baseline, register_reference_asset, register_reference_file, reset_baseline, Registration,
};
use wfg_report::{format_notice, format_prompt_context, format_summary};
use wfg_store::{summarize, FsStateStore, StateStore};

/// Exit status the host runtime reads as "refuse this tool call".
pub const BLOCK_EXIT_CODE: i32 = 2;

pub fn exit_code(decision: &GateDecision) -> i32 {
    if decision.is_block() {
        BLOCK_EXIT_CODE
    } else {
        0
    }
}

/// What a hook invocation writes: decision JSON for stdout, an optional
/// operator notice for stderr, and the process status.
#[derive(Debug)]
pub struct HookOutput {
    pub decision: GateDecision,
    pub notice: String,
    pub code: i32,
}

/// Where a hook event applies: its own `cwd`, else the process directory.
fn event_root(cwd: Option<PathBuf>, fallback_root: Option<&Path>) -> Option<PathBuf> {
    cwd.or_else(|| fallback_root.map(Path::to_path_buf))
}

/// Evaluate one event from the agent runtime. Nothing in here may fail the
/// host call: unreadable input or config degrades to allow.
pub fn run_hook(raw: &str, fallback_root: Option<&Path>) -> HookOutput {
    let decision = match serde_json::from_str::<ToolEvent>(raw) {
        Ok(event) => match event_root(event.cwd.clone(), fallback_root) {
            Some(root) => match HookRunner::open(root) {
                Ok(runner) => runner.handle(&event),
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "gate unavailable, allowing");
                    GateDecision::allow()
                }
            },
            None => {
                warn!("no working directory for tool event, allowing");
                GateDecision::allow()
            }
        },
        Err(err) => {
            warn!(error = %err, "unreadable tool event, allowing");
            GateDecision::allow()
        }
    };
    HookOutput {
        notice: format_notice(&decision),
        code: exit_code(&decision),
        decision,
    }
}

/// Records skills and same-workflow requests named in an operator prompt
/// and returns the context block for the agent. Always succeeds from the
/// host's point of view.
pub fn run_prompt_hook(raw: &str, fallback_root: Option<&Path>) -> Value {
    let input: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "unreadable prompt event");
            return prompt_output(&PromptClassification::default());
        }
    };
    let prompt = input.get("prompt").and_then(Value::as_str).unwrap_or_default();
    let classifier = match SkillMentionClassifier::new() {
        Ok(c) => c,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "prompt classification skipped");
            return prompt_output(&PromptClassification::default());
        }
    };
    let cwd = input.get("cwd").and_then(Value::as_str).map(PathBuf::from);
    let found = match event_root(cwd, fallback_root).map(HookRunner::open) {
        Some(Ok(runner)) => runner.record_prompt(&classifier, prompt),
        Some(Err(err)) => {
            warn!(error = %format!("{err:#}"), "workflow state unavailable, prompt not recorded");
            classifier.classify(prompt)
        }
        None => classifier.classify(prompt),
    };
    prompt_output(&found)
}

fn prompt_output(found: &PromptClassification) -> Value {
    json!({
        "success": true,
        "requiredSkills": found.skills,
        "requiresSameWorkflow": found.requires_same_workflow,
        "context": format_prompt_context(&found.skills, found.requires_same_workflow),
    })
}

fn failure(reason_code: &str, error: impl std::fmt::Display) -> Value {
    json!({ "success": false, "reasonCode": reason_code, "error": error.to_string() })
}

fn transition_failure(err: TransitionError) -> Value {
    failure(err.reason_code(), &err)
}

/// Administrative commands against the state file of one directory.
pub struct Workspace {
    pub root: PathBuf,
    pub store: FsStateStore,
}

impl Workspace {
    pub fn new(root: PathBuf) -> Self {
        let store = FsStateStore::for_dir(&root);
        Self { root, store }
    }

    fn require_state(&self) -> Result<WorkflowState> {
        self.store
            .load()?
            .ok_or_else(|| anyhow!("no workflow state in {}; run `wfg init` first", self.root.display()))
    }

    fn save(&self, state: &mut WorkflowState) -> Result<()> {
        self.store.save(state)
    }

    /// Admin commands report a damaged config instead of masking it.
    fn guard(&self) -> Result<Guard> {
        let config = GateConfig::load(&self.root)?;
        Guard::new(self.root.clone(), config)
    }

    pub fn init(&self, workflow_id: &str, strict: bool) -> Result<Value> {
        GateConfig::load_or_init(&self.root)?;
        let mut state = WorkflowState::new(workflow_id, strict);
        if let Ok(contract) = validate_intent_contract(&self.root) {
            pin_intent_contract(&mut state, &contract);
        }
        self.save(&mut state)?;
        info!(workflow = workflow_id, strict, "workflow initialised");
        Ok(json!({ "success": true, "state": state }))
    }

    pub fn load(&self) -> Result<Value> {
        let state = self.store.load()?;
        Ok(json!({ "success": state.is_some(), "state": state }))
    }

    pub fn summary(&self, as_json: bool) -> Result<String> {
        let Some(state) = self.store.load()? else {
            return Ok("No workflow state found".to_string());
        };
        let summary = summarize(&state);
        if as_json {
            Ok(serde_json::to_string_pretty(&summary)?)
        } else {
            Ok(format_summary(&summary))
        }
    }

    pub fn register_baseline(&self, path: &Path) -> Result<Value> {
        let mut state = self.require_state()?;
        let full = self.root.join(path);
        if !full.is_file() {
            return Ok(failure("file_not_found", format!("{} is not a file", full.display())));
        }
        let outcome = register_baseline(&mut state, &full);
        match outcome {
            Registration::Unhashable => return Ok(failure("unhashable", format!("could not hash {}", full.display()))),
            Registration::Registered => self.save(&mut state)?,
            Registration::AlreadyRegistered => {}
        }
        Ok(json!({
            "success": true,
            "registered": outcome == Registration::Registered,
            "status": outcome.as_str(),
        }))
    }

    pub fn reset_baseline(&self, basename: &str) -> Result<Value> {
        let mut state = self.require_state()?;
        match reset_baseline(&mut state, basename) {
            Some(entry) => {
                self.save(&mut state)?;
                info!(basename, "baseline reset");
                Ok(json!({ "success": true, "removed": entry }))
            }
            None => Ok(failure("not_registered", format!("no baseline named {basename}"))),
        }
    }

    pub fn check_start(&self, apply: bool) -> Result<Value> {
        let guard = self.guard()?;
        let mut state = self.store.load()?;
        let strict = state.as_ref().map_or(true, WorkflowState::is_strict);
        let validation = guard.validate_workflow_start(strict);
        if apply {
            let state = state.as_mut().context("--apply needs an initialised workflow")?;
            apply_start_validation(state, &validation);
            self.save(state)?;
        }
        Ok(json!({ "success": validation.valid, "validation": validation }))
    }

    pub fn lint(&self) -> Result<Value> {
        let guard = self.guard()?;
        let summary = guard.linter.lint_all(&self.root, &guard.config.paths.definition_dirs);
        Ok(json!({ "success": summary.valid, "lint": summary }))
    }

    pub fn start_skill(&self, skill: &str, details: Value) -> Result<Value> {
        self.transition(|state| start_skill(state, &SkillId::from_str(skill), details))
    }

    pub fn start_step(&self, step: &str) -> Result<Value> {
        self.transition(|state| start_step(state, &StepId::from_str(step)))
    }

    pub fn complete_step(&self, step: &str, required: &[String]) -> Result<Value> {
        let required = parse_evidence_types(required)?;
        self.transition(|state| complete_step(state, &StepId::from_str(step), &required))
    }

    pub fn complete_skill(&self, skill: &str) -> Result<Value> {
        self.transition(|state| complete_skill(state, &SkillId::from_str(skill)))
    }

    /// Failed transitions leave the file untouched.
    fn transition<F>(&self, f: F) -> Result<Value>
    where
        F: FnOnce(&mut WorkflowState) -> Result<(), TransitionError>,
    {
        let mut state = self.require_state()?;
        if let Err(err) = f(&mut state) {
            return Ok(transition_failure(err));
        }
        self.save(&mut state)?;
        Ok(json!({
            "success": true,
            "activeSkillId": state.active_skill_id,
            "activeSkillStepId": state.active_skill_step_id,
        }))
    }

    pub fn capture_evidence(&self, ty: &str, data: Option<&str>) -> Result<Value> {
        let ty = EvidenceType::parse(ty).ok_or_else(|| unknown_evidence_type(ty))?;
        let data = parse_json_arg(data)?;
        let mut state = self.require_state()?;
        let record = capture(&mut state, ty, data);
        self.save(&mut state)?;
        Ok(json!({ "success": true, "evidence": record }))
    }

    pub fn decide(&self, subject: &str, choice: AssetChoice, justification: &str) -> Result<Value> {
        if justification.trim().is_empty() {
            bail!("a justification is required");
        }
        let mut state = self.require_state()?;
        let record = record_asset_reuse_decision(&mut state, subject, choice, justification);
        self.save(&mut state)?;
        Ok(json!({ "success": true, "evidence": record }))
    }

    pub fn register_asset(
        &self,
        asset_id: &str,
        digest: Option<&str>,
        file: Option<&Path>,
        metadata: Option<&str>,
    ) -> Result<Value> {
        let metadata = parse_json_arg(metadata)?;
        let asset_id = AssetId::from_str(asset_id);
        let mut state = self.require_state()?;
        let digest = match (digest, file) {
            (Some(d), _) => {
                register_reference_asset(&mut state, &asset_id, d, metadata);
                d.to_string()
            }
            (None, Some(path)) => register_reference_file(&mut state, &asset_id, &self.root.join(path), metadata)
                .with_context(|| format!("hashing reference asset {}", path.display()))?,
            (None, None) => bail!("either --digest or --file is required"),
        };
        self.save(&mut state)?;
        Ok(json!({ "success": true, "assetId": asset_id, "digest": digest }))
    }

    pub fn approve(&self, deviation: &str, approved_by: Option<&str>) -> Result<Value> {
        let mut state = self.require_state()?;
        record_deviation_approval(&mut state, deviation, approved_by);
        self.save(&mut state)?;
        info!(deviation, "deviation approved");
        Ok(json!({ "success": true, "deviation": deviation }))
    }

    pub fn advance_phase(&self) -> Result<Value> {
        let mut state = self.require_state()?;
        let phase = state.advance_phase();
        self.save(&mut state)?;
        Ok(json!({ "success": true, "currentPhase": phase, "completedPhases": state.completed_phases }))
    }

    pub fn add_blocker(&self, blocker: &str) -> Result<Value> {
        let mut state = self.require_state()?;
        state.add_blocker(blocker);
        self.save(&mut state)?;
        Ok(json!({ "success": true, "blockers": state.blockers }))
    }

    pub fn clear_blockers(&self) -> Result<Value> {
        let mut state = self.require_state()?;
        state.clear_blockers();
        self.save(&mut state)?;
        Ok(json!({ "success": true, "blockers": state.blockers }))
    }

    pub fn pin_contract(&self) -> Result<Value> {
        let mut state = self.require_state()?;
        match validate_intent_contract(&self.root) {
            Ok(contract) => {
                pin_intent_contract(&mut state, &contract);
                self.save(&mut state)?;
                Ok(json!({ "success": true, "intentContract": state.intent_contract_ref }))
            }
            Err(err) => Ok(json!({
                "success": false,
                "reasonCode": err.reason_code(),
                "error": err.to_string(),
                "missingFields": err.missing_fields(),
            })),
        }
    }
}

fn unknown_evidence_type(ty: &str) -> anyhow::Error {
    let known: Vec<&str> = EvidenceType::ALL.iter().map(|t| t.as_str()).collect();
    anyhow!("unknown evidence type `{ty}` (expected one of: {})", known.join(", "))
}

/// Accepts repeated flags and comma-separated lists alike.
fn parse_evidence_types(raw: &[String]) -> Result<Vec<EvidenceType>> {
    raw.iter()
        .flat_map(|r| r.split(','))
        .filter(|s| !s.trim().is_empty())
        .map(|s| EvidenceType::parse(s).ok_or_else(|| unknown_evidence_type(s)))
        .collect()
}

fn parse_json_arg(raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(s) => serde_json::from_str(s).with_context(|| format!("invalid JSON argument: {s}")),
        None => Ok(Value::Null),
    }
}
