//! Composition root: concrete adapters built from [`CliConfig`] and the
//! subcommand handlers that drive them.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use llm::{AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider, RetryingGenerator};
use nodes::PipelineExecutor;
use pipeline::trace::snippet;
use pipeline::{
    AnonId, BriefHints, CandidateSlot, Identity, PipelineResult, QuillError, RunRequestInput,
    RunStore, TextGenerator, UserId,
};
use store::SqliteStore;
use tracing::{info, warn};

use crate::cli::{FeedbackArgs, GenerateArgs, HistoryArgs, IdentityArgs, ProfileArgs};
use crate::config::{CliConfig, LlmSection, ProviderKind};

/// Exit status for a request the pipeline refused to run.
const EXIT_REJECTED: u8 = 2;
/// Exit status for a run that ended without final text.
const EXIT_FAILED: u8 = 1;

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn build_provider(llm: &LlmSection, api_key: String) -> Result<Arc<dyn TextGenerator>> {
    let timeout = Duration::from_secs(llm.timeout_secs);
    let provider: Arc<dyn TextGenerator> = match llm.provider {
        ProviderKind::Openai => {
            let mut config = OpenAiConfig::new(api_key).with_timeout(timeout);
            if let Some(model) = &llm.model {
                config = config.with_model(model);
            }
            if let Some(url) = &llm.base_url {
                config = config.with_base_url(url);
            }
            Arc::new(OpenAiProvider::new(config).context("Failed to create OpenAI provider")?)
        }
        ProviderKind::Anthropic => {
            let mut config = AnthropicConfig::new(api_key).with_timeout(timeout);
            if let Some(model) = &llm.model {
                config = config.with_model(model);
            }
            if let Some(url) = &llm.base_url {
                config = config.with_base_url(url);
            }
            Arc::new(AnthropicProvider::new(config).context("Failed to create Anthropic provider")?)
        }
    };

    if llm.max_retries == 0 {
        return Ok(provider);
    }
    Ok(Arc::new(RetryingGenerator::new(
        provider,
        llm.max_retries,
        Duration::from_millis(llm.retry_backoff_ms),
    )))
}

fn generator_from_env(llm: &LlmSection) -> Result<Arc<dyn TextGenerator>> {
    let name = llm.key_env();
    let api_key = std::env::var(name)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| QuillError::MissingCredential {
            name: name.to_string(),
        })?;
    build_provider(llm, api_key)
}

async fn open_store(config: &CliConfig) -> Result<Option<Arc<SqliteStore>>> {
    let Some(path) = &config.store.database_path else {
        return Ok(None);
    };
    let store = SqliteStore::open(path)
        .await
        .with_context(|| format!("Failed to open run store at {}", path.display()))?;
    Ok(Some(Arc::new(store)))
}

async fn require_store(config: &CliConfig) -> Result<Arc<SqliteStore>> {
    match open_store(config).await? {
        Some(store) => Ok(store),
        None => bail!("No run store configured; set store.database_path"),
    }
}

fn identity(args: &IdentityArgs) -> Result<Identity> {
    if let Some(id) = &args.user_id {
        return UserId::new(id.as_str())
            .map(Identity::User)
            .context("--user must not be blank");
    }
    if let Some(id) = &args.anon_id {
        return AnonId::new(id.as_str())
            .map(Identity::Anonymous)
            .context("--anon must not be blank");
    }
    bail!("One of --user or --anon is required")
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn request_input(args: GenerateArgs) -> Result<RunRequestInput> {
    let previous_text = args
        .previous_file
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))
        })
        .transpose()?;

    Ok(RunRequestInput {
        brief: args.brief,
        hints: BriefHints {
            audience: args.audience,
            event_context: args.event_context,
            tone: args.tone,
            duration: args.duration,
            must_include: args.must_include,
            must_avoid: args.must_avoid,
        },
        user_id: args.identity.user_id,
        anon_id: args.identity.anon_id,
        previous_text,
        previous_instruction: args.previous_instruction,
    })
}

fn print_trace(result: &PipelineResult) {
    for entry in result.trace.entries() {
        eprintln!("[{}] {}", entry.stage, entry.message);
    }
}

pub async fn generate(config: CliConfig, args: GenerateArgs) -> Result<ExitCode> {
    let json = args.json;
    let input = request_input(args)?;

    let generator = generator_from_env(&config.llm)?;
    let mut executor = PipelineExecutor::new(Arc::new(config.runner.clone()), generator);
    if let Some(store) = open_store(&config).await? {
        executor = executor
            .with_run_store(store.clone())
            .with_memory_store(store);
    } else {
        warn!("no store configured; runs will not be saved");
    }

    let result = match executor.submit(input).await {
        Ok(result) => result,
        Err(rejected) => {
            eprintln!("error: {}", rejected.error);
            return Ok(ExitCode::from(EXIT_REJECTED));
        }
    };

    info!(
        run_id = %result.run_id,
        mode = result.mode.as_str(),
        success = result.is_success(),
        "run finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(text) = &result.final_text {
        println!("{text}");
    }

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        print_trace(&result);
        Ok(ExitCode::from(EXIT_FAILED))
    }
}

pub async fn history(config: CliConfig, args: HistoryArgs) -> Result<ExitCode> {
    let identity = identity(&args.identity)?;
    let store = require_store(&config).await?;

    let runs = store
        .recent(&identity, args.limit)
        .await
        .context("Failed to list runs")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(ExitCode::SUCCESS);
    }
    if runs.is_empty() {
        println!("No saved runs for {identity}.");
    }
    for run in &runs {
        println!(
            "{}  {:<8}  {}  {}",
            run.created_at.as_datetime().to_rfc3339(),
            run.mode.as_str(),
            run.run_id,
            snippet(&run.final_text, 72)
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn profile(config: CliConfig, args: ProfileArgs) -> Result<ExitCode> {
    let identity = identity(&args.identity)?;
    let store = require_store(&config).await?;

    match pipeline::MemoryStore::load_traits(store.as_ref(), &identity)
        .await
        .context("Failed to load profile")?
    {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => println!("No profile stored for {identity}."),
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn feedback(config: CliConfig, args: FeedbackArgs) -> Result<ExitCode> {
    let choice = CandidateSlot::from_number(args.choice)
        .with_context(|| format!("--choice must be 1 or 2, got {}", args.choice))?;
    let store = require_store(&config).await?;

    let feedback = store
        .record_feedback(args.run_id, choice)
        .await
        .with_context(|| format!("Failed to record feedback for run {}", args.run_id))?;

    info!(
        run_id = %feedback.run_id,
        agreement = feedback.agreement,
        "feedback recorded"
    );
    let verdict = if feedback.agreement { "agrees" } else { "disagrees" };
    let defaulted = if feedback.judge_defaulted { " (judge defaulted)" } else { "" };
    println!(
        "Candidate {} {verdict} with the judge's pick, candidate {}{defaulted}.",
        feedback.user_choice.number(),
        feedback.judge_winner.number()
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_the_given_flag() {
        let user = identity(&IdentityArgs {
            user_id: Some("u-1".into()),
            anon_id: None,
        })
        .unwrap();
        assert_eq!(user.kind(), "user_id");

        let anon = identity(&IdentityArgs {
            user_id: None,
            anon_id: Some("a-1".into()),
        })
        .unwrap();
        assert_eq!(anon.kind(), "anon_id");

        assert!(identity(&IdentityArgs::default()).is_err());
    }

    #[test]
    fn blank_api_key_is_not_configured() {
        let llm = LlmSection::default();
        assert!(build_provider(&llm, "  ".into()).is_err());
    }

    #[test]
    fn retries_wrap_the_provider() {
        let llm = LlmSection {
            provider: ProviderKind::Anthropic,
            max_retries: 2,
            ..Default::default()
        };
        let provider = build_provider(&llm, "ak-test".into()).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn previous_text_is_read_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("draft.txt");
        std::fs::write(&path, "Friends, colleagues.").unwrap();

        let input = request_input(GenerateArgs {
            brief: "Make it shorter".into(),
            audience: None,
            event_context: None,
            tone: None,
            duration: None,
            must_include: vec![],
            must_avoid: vec!["layoffs".into()],
            identity: IdentityArgs::default(),
            previous_file: Some(path),
            previous_instruction: Some("Retirement toast".into()),
            json: false,
        })
        .unwrap();

        assert_eq!(input.previous_text.as_deref(), Some("Friends, colleagues."));
        assert_eq!(input.hints.must_avoid, vec!["layoffs"]);
    }

    #[tokio::test]
    async fn history_requires_a_store() {
        let args = HistoryArgs {
            identity: IdentityArgs {
                user_id: Some("u-1".into()),
                anon_id: None,
            },
            limit: 5,
            json: false,
        };
        let err = history(CliConfig::default(), args).await.unwrap_err();
        assert!(err.to_string().contains("No run store configured"));
    }

    #[tokio::test]
    async fn feedback_for_an_unsaved_run_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = CliConfig::default();
        config.store.database_path = Some(dir.path().join("quill.db"));
        let args = FeedbackArgs {
            run_id: pipeline::RunId::new_random(),
            choice: 1,
        };

        let err = feedback(config, args).await.unwrap_err();

        assert!(err.to_string().contains("Failed to record feedback"));
    }
}
