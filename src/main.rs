use async_trait::async_trait;
use bashgate::config::Config;
use bashgate::gate::{CommandSource, ExecutionContext, GateRequest, GateSettings, SafetyGate};
use bashgate::llm::{AnthropicClient, LLMClient, LLMError, ModelQuery};
use bashgate::permissions::{BASH_TOOL, PermissionMatcher};
use bashgate::shell::HeuristicPrefixResolver;
use bashgate::{AppResult, CommandGuard, GuardOutcome, classify, should_review};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Parser)]
#[command(name = "bashgate")]
#[command(about = "Layered safety gate for shell commands run by coding agents")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/bashgate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the risk findings for a command
    Classify {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Run the full permission and safety review for a command
    Check(CheckArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// What the user originally asked the agent to do
    #[arg(long)]
    prompt: Option<String>,

    /// The agent's description of the command
    #[arg(long)]
    description: Option<String>,

    /// The command will run in the background
    #[arg(long)]
    background: bool,

    /// The session runs in safe mode
    #[arg(long)]
    safe_mode: bool,

    /// The user typed the command rather than the agent proposing it
    #[arg(long)]
    from_user: bool,

    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

/// Stand-in when no API key is configured; every review fails closed
struct UnavailableClient;

#[async_trait]
impl LLMClient for UnavailableClient {
    async fn query(
        &self,
        _query: ModelQuery<'_>,
        _cancel: &CancellationToken,
    ) -> Result<String, LLMError> {
        Err(LLMError::ApiError("no API key configured".to_string()))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> AppResult<ExitCode> {
    match cli.command {
        Command::Classify { command } => {
            let command = command.join(" ");
            let findings = classify(&command);
            let report = json!({
                "command": command,
                "review_required": should_review(&findings),
                "findings": findings,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Check(args) => {
            let config = match &cli.config {
                Some(path) => Config::load_from(path)?,
                None => Config::load_or_default()?,
            };
            check(&config, args).await
        }
    }
}

async fn check(config: &Config, args: CheckArgs) -> AppResult<ExitCode> {
    let client: Box<dyn LLMClient> = match config.get_api_key() {
        Some(key) => Box::new(AnthropicClient::from_config(&config.llm, key)?),
        None => {
            warn!(env = %config.llm.api_key_env, "no API key, risky commands will be rejected");
            Box::new(UnavailableClient)
        }
    };

    let mut context = ExecutionContext::current();
    context.safe_mode = args.safe_mode;
    context.run_in_background = args.background;
    if args.from_user {
        context.source = CommandSource::User;
    }

    let matcher = PermissionMatcher::new(config.permissions.clone(), &context.cwd);
    let gate = SafetyGate::new(client, GateSettings::from_config(&config.gate));
    let guard = CommandGuard::new(matcher, Box::new(HeuristicPrefixResolver::new()), gate);

    let mut request = GateRequest::new(args.command.join(" "), context);
    if let Some(prompt) = args.prompt {
        request = request.with_user_prompt(prompt);
    }
    if let Some(description) = args.description {
        request = request.with_description(description);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = guard.evaluate(BASH_TOOL, &request, &cancel).await;
    let code = match &outcome {
        GuardOutcome::Proceed => {
            println!("proceed");
            0
        }
        GuardOutcome::NeedsApproval { message } => {
            println!("needs-approval: {}", message);
            1
        }
        GuardOutcome::Rejected { message } => {
            println!("rejected: {}", message);
            2
        }
    };
    Ok(ExitCode::from(code))
}
