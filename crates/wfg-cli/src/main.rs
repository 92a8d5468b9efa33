use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use wfg_core::AssetChoice;

mod commands;

use commands::{run_hook, run_prompt_hook, Workspace};

#[derive(Parser)]
#[command(name = "wfg", version, about = "Workflow fidelity guard for agent tool calls")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Strict,
    Advisory,
}

#[derive(Clone, Copy, ValueEnum)]
enum Choice {
    Reuse,
    Create,
}

impl From<Choice> for AssetChoice {
    fn from(c: Choice) -> Self {
        match c {
            Choice::Reuse => AssetChoice::Reuse,
            Choice::Create => AssetChoice::Create,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh workflow state in the current directory
    Init {
        #[arg(default_value = "default")]
        workflow_id: String,
        #[arg(value_enum, default_value = "strict")]
        mode: Mode,
    },

    /// Print the workflow state as JSON
    Load,

    /// Human-readable state summary
    Summary {
        #[arg(long)]
        json: bool,
    },

    /// Pin a file's digest as a baseline (first registration wins)
    RegisterBaseline { path: PathBuf },

    /// Drop a baseline pin so the file can be re-registered
    ResetBaseline { basename: String },

    /// Evaluate one tool event read from stdin; exits 2 on block
    Hook,

    /// Record skills mentioned in a prompt event read from stdin
    Prompt,

    /// Validate the intent contract and definition files before starting work
    CheckStart {
        /// Write blockers and results into the state
        #[arg(long)]
        apply: bool,
    },

    /// Lint workflow definition files
    Lint,

    /// Skill and step transitions
    #[command(subcommand)]
    Skill(SkillCommand),

    /// Append a typed record to the evidence ledger
    Evidence {
        #[arg(value_name = "TYPE")]
        ty: String,
        /// JSON payload
        #[arg(long)]
        data: Option<String>,
    },

    /// Record an asset reuse/create decision
    Decide {
        subject: String,
        #[arg(value_enum)]
        choice: Choice,
        justification: String,
    },

    /// Reference asset registry
    #[command(subcommand)]
    Asset(AssetCommand),

    /// Approve a deviation such as `bash:sudo` or `write:config.json`
    Approve {
        deviation: String,
        #[arg(long)]
        by: Option<String>,
    },

    /// Phase bookkeeping
    #[command(subcommand)]
    Phase(PhaseCommand),

    /// Manage the state's blocker list
    #[command(subcommand)]
    Blocker(BlockerCommand),

    /// Pin the current intent contract digest
    PinContract,
}

#[derive(Subcommand)]
enum SkillCommand {
    Start {
        skill: String,
        /// JSON details stored with the usage record
        #[arg(long)]
        details: Option<String>,
    },
    Step {
        step: String,
    },
    CompleteStep {
        step: String,
        /// Evidence types the step must hold (repeatable or comma-separated)
        #[arg(long = "require")]
        require: Vec<String>,
    },
    Complete {
        skill: String,
    },
}

#[derive(Subcommand)]
enum AssetCommand {
    Register {
        asset_id: String,
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        digest: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// JSON metadata
        #[arg(long)]
        metadata: Option<String>,
    },
}

#[derive(Subcommand)]
enum PhaseCommand {
    Advance,
}

#[derive(Subcommand)]
enum BlockerCommand {
    Add { text: String },
    Clear,
}

fn read_stdin() -> String {
    let mut raw = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut raw) {
        warn!(error = %err, "failed to read stdin");
    }
    raw
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    // Hooks must answer the host even when the process directory is gone.
    let repo_root = std::env::current_dir();

    let out: Value = match cli.cmd {
        Command::Hook => {
            let out = run_hook(&read_stdin(), repo_root.as_deref().ok());
            println!("{}", serde_json::to_string(&out.decision)?);
            if !out.notice.is_empty() {
                eprintln!("{}", out.notice);
            }
            std::process::exit(out.code);
        }
        Command::Prompt => run_prompt_hook(&read_stdin(), repo_root.as_deref().ok()),
        Command::Summary { json } => {
            println!("{}", Workspace::new(repo_root?).summary(json)?);
            return Ok(());
        }
        cmd => {
            let ws = Workspace::new(repo_root?);
            match dispatch(&ws, cmd) {
                Ok(v) => v,
                Err(err) => json!({ "success": false, "error": format!("{err:#}") }),
            }
        }
    };

    println!("{}", serde_json::to_string(&out)?);
    if out.get("success").and_then(Value::as_bool) == Some(false) {
        std::process::exit(1);
    }
    Ok(())
}

fn dispatch(ws: &Workspace, cmd: Command) -> anyhow::Result<Value> {
    match cmd {
        Command::Init { workflow_id, mode } => ws.init(&workflow_id, matches!(mode, Mode::Strict)),
        Command::Load => ws.load(),
        Command::RegisterBaseline { path } => ws.register_baseline(&path),
        Command::ResetBaseline { basename } => ws.reset_baseline(&basename),
        Command::CheckStart { apply } => ws.check_start(apply),
        Command::Lint => ws.lint(),
        Command::Skill(SkillCommand::Start { skill, details }) => {
            let details = match details {
                Some(d) => serde_json::from_str(&d)?,
                None => Value::Null,
            };
            ws.start_skill(&skill, details)
        }
        Command::Skill(SkillCommand::Step { step }) => ws.start_step(&step),
        Command::Skill(SkillCommand::CompleteStep { step, require }) => ws.complete_step(&step, &require),
        Command::Skill(SkillCommand::Complete { skill }) => ws.complete_skill(&skill),
        Command::Evidence { ty, data } => ws.capture_evidence(&ty, data.as_deref()),
        Command::Decide {
            subject,
            choice,
            justification,
        } => ws.decide(&subject, choice.into(), &justification),
        Command::Asset(AssetCommand::Register {
            asset_id,
            digest,
            file,
            metadata,
        }) => ws.register_asset(&asset_id, digest.as_deref(), file.as_deref(), metadata.as_deref()),
        Command::Approve { deviation, by } => ws.approve(&deviation, by.as_deref()),
        Command::Phase(PhaseCommand::Advance) => ws.advance_phase(),
        Command::Blocker(BlockerCommand::Add { text }) => ws.add_blocker(&text),
        Command::Blocker(BlockerCommand::Clear) => ws.clear_blockers(),
        Command::PinContract => ws.pin_contract(),
        Command::Hook | Command::Prompt | Command::Summary { .. } => {
            anyhow::bail!("handled before dispatch")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn init_defaults_to_strict() {
        let cli = Cli::parse_from(["wfg", "init", "wf-7"]);
        match cli.cmd {
            Command::Init { workflow_id, mode } => {
                assert_eq!(workflow_id, "wf-7");
                assert!(matches!(mode, Mode::Strict));
            }
            _ => panic!("expected init"),
        }
        let cli = Cli::parse_from(["wfg", "init", "wf-7", "advisory"]);
        assert!(matches!(cli.cmd, Command::Init { mode: Mode::Advisory, .. }));
    }

    #[test]
    fn asset_register_needs_digest_or_file() {
        assert!(Cli::try_parse_from(["wfg", "asset", "register", "img1"]).is_err());
        assert!(Cli::try_parse_from(["wfg", "asset", "register", "img1", "--digest", "ab", "--file", "x"]).is_err());
        assert!(Cli::try_parse_from(["wfg", "asset", "register", "img1", "--file", "ref.png"]).is_ok());
    }
}
