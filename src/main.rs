mod adapters;
mod config;
mod core;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::azure::{AzureClient, ChangeEntry, ChangeKind};
use crate::adapters::llm::{create_adapter, LLMAdapter, LLMRequest, ModelConfig};
use crate::core::postprocess::{self, ValidationIssue};
use crate::core::prompt::{self, PromptKind};
use crate::core::review_table::{parse_review_table, ReviewIssue};
use crate::core::threads::extract_pending_comments;
use crate::core::{DiffBlock, WorkItemSummary};

/// Changed files reviewed per PR, in listing order. Everything past the
/// cap is ignored to keep the prompt bounded.
const MAX_REVIEW_FILES: usize = 10;

#[derive(Parser)]
#[command(name = "adoprompt")]
#[command(about = "Turn Azure DevOps work items and PR review threads into AI assistant prompts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    model: Option<String>,

    #[arg(long, global = true)]
    temperature: Option<f32>,

    #[arg(long, global = true)]
    max_tokens: Option<usize>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate a backend spec from a work item")]
    Backend {
        #[arg(help = "Work item id")]
        id: u64,

        #[arg(long, help = "Post the generated spec back onto the work item")]
        post: bool,

        #[arg(long, help = "Print the assembled prompt instead of calling the LLM")]
        prompt_only: bool,

        #[arg(short, long, help = "Write output to a file instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Generate a React/Tailwind frontend spec from a work item")]
    Frontend {
        #[arg(help = "Work item id")]
        id: u64,

        #[arg(long, help = "Post the generated spec back onto the work item")]
        post: bool,

        #[arg(long, help = "Print the assembled prompt instead of calling the LLM")]
        prompt_only: bool,

        #[arg(short, long, help = "Write output to a file instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Report whether a work item is complete enough to implement")]
    Completeness {
        #[arg(help = "Work item id")]
        id: u64,

        #[arg(long, help = "Print the assembled prompt instead of calling the LLM")]
        prompt_only: bool,

        #[arg(short, long, help = "Write output to a file instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Review a pull request's changed files")]
    Review {
        #[arg(help = "Pull request id")]
        id: u64,

        #[arg(long, help = "Repository name (defaults to ADO_DEFAULT_REPO)")]
        repo: Option<String>,

        #[arg(long, help = "Post one anchored comment per finding (asks first)")]
        post_comments: bool,

        #[arg(long, help = "Print the assembled prompt instead of calling the LLM")]
        prompt_only: bool,

        #[arg(short, long, help = "Write output to a file instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Turn a PR's unresolved review comments into a fix-it prompt")]
    Comments {
        #[arg(help = "Pull request id")]
        id: u64,

        #[arg(long, help = "Repository name (defaults to ADO_DEFAULT_REPO)")]
        repo: Option<String>,

        #[arg(short, long, help = "Write output to a file instead of stdout")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        eprintln!();
        eprintln!("Likely causes:");
        eprintln!("  - ADO_ORGANIZATION / ADO_PROJECT / ADO_PAT not set or expired");
        eprintln!("  - the work item or pull request id does not exist in this project");
        eprintln!("  - LLM_API_KEY missing or the LLM endpoint is unreachable");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("Failed to load configuration")?;
    config.merge_with_cli(cli.model, cli.temperature, cli.max_tokens);

    match cli.command {
        Commands::Backend {
            id,
            post,
            prompt_only,
            output,
        } => {
            spec_command(config, PromptKind::Backend, id, post, prompt_only, output).await
        }
        Commands::Frontend {
            id,
            post,
            prompt_only,
            output,
        } => {
            spec_command(
                config,
                PromptKind::FrontendReactTailwind,
                id,
                post,
                prompt_only,
                output,
            )
            .await
        }
        Commands::Completeness {
            id,
            prompt_only,
            output,
        } => completeness_command(config, id, prompt_only, output).await,
        Commands::Review {
            id,
            repo,
            post_comments,
            prompt_only,
            output,
        } => review_command(config, id, repo, post_comments, prompt_only, output).await,
        Commands::Comments { id, repo, output } => {
            comments_command(config, id, repo, output).await
        }
    }
}

async fn spec_command(
    config: config::Config,
    kind: PromptKind,
    id: u64,
    post: bool,
    prompt_only: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    config.validate_tracker()?;
    let azure = AzureClient::new(&config)?;

    info!("Fetching work item #{} with parents", id);
    let (item, parents) = azure.get_work_item_chain(id).await?;
    let (system, user) = prompt::build_work_item_prompt(kind, &item, &parents);

    if prompt_only {
        return emit_output(&user, output).await;
    }

    config.validate_llm()?;
    let adapter = create_adapter(&ModelConfig::from_config(&config))?;
    info!("Generating {:?} artifact with model {}", kind, adapter.model_name());
    let artifact = generate_artifact(adapter.as_ref(), kind, system, user).await?;

    emit_output(&artifact, output).await?;

    if post {
        azure.post_work_item_comment(id, &artifact).await?;
        println!("Posted spec to work item #{}", id);
    }

    Ok(())
}

async fn completeness_command(
    config: config::Config,
    id: u64,
    prompt_only: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    config.validate_tracker()?;
    let azure = AzureClient::new(&config)?;

    info!("Fetching work item #{}", id);
    let raw = azure.get_work_item(id, false).await?;
    // The structured projection keeps paragraph breaks the analyst
    // prompt reasons about.
    let item = WorkItemSummary::from_raw_structured(&raw);
    let (system, user) = prompt::build_work_item_prompt(PromptKind::Completeness, &item, &[]);

    if prompt_only {
        return emit_output(&user, output).await;
    }

    config.validate_llm()?;
    let adapter = create_adapter(&ModelConfig::from_config(&config))?;
    let report = generate_artifact(adapter.as_ref(), PromptKind::Completeness, system, user).await?;
    emit_output(&report, output).await
}

async fn review_command(
    config: config::Config,
    id: u64,
    repo: Option<String>,
    post_comments: bool,
    prompt_only: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    config.validate_tracker()?;
    let repo = config.repo_name(repo)?;
    let azure = AzureClient::new(&config)?;

    info!("Fetching pull request !{} in {}", id, repo);
    let pull_request = azure.get_pull_request(&repo, id).await?;
    let source_commit = pull_request
        .last_merge_source_commit
        .as_ref()
        .map(|c| c.commit_id.clone())
        .context("Pull request has no source commit; is it still being created?")?;
    let target_commit = pull_request
        .last_merge_target_commit
        .as_ref()
        .map(|c| c.commit_id.clone());

    // Linked work items are context, not a requirement; fetch failures
    // only cost us the context.
    let mut work_items = Vec::new();
    for item_id in azure.get_pr_work_item_ids(&repo, id).await.unwrap_or_default() {
        match azure.get_work_item(item_id, false).await {
            Ok(raw) => work_items.push(WorkItemSummary::from_raw(&raw)),
            Err(err) => warn!("Skipping linked work item #{}: {}", item_id, err),
        }
    }

    let iteration = azure.get_latest_iteration(&repo, id).await?;
    let changes = azure.get_iteration_changes(&repo, id, iteration).await?;
    info!("Iteration {} has {} changed file(s)", iteration, changes.len());

    let mut blocks = Vec::new();
    let mut reviewed: Vec<ChangeEntry> = Vec::new();
    for change in changes {
        if reviewed.len() >= MAX_REVIEW_FILES {
            warn!("File cap reached; remaining changes are not reviewed");
            break;
        }
        if change.change_type == ChangeKind::Delete {
            continue;
        }

        let new_content = azure
            .get_file_content(&repo, &change.path, &source_commit)
            .await?;
        let Some(new_content) = new_content else {
            warn!("No source content for {}; skipping", change.path);
            continue;
        };

        let old_content = match (&change.change_type, &target_commit) {
            (ChangeKind::Add, _) | (_, None) => None,
            (_, Some(commit)) => azure.get_file_content(&repo, &change.path, commit).await?,
        };

        blocks.push(DiffBlock::render(
            change.path.clone(),
            old_content.as_deref(),
            &new_content,
        ));
        reviewed.push(change);
    }

    let (system, user) = prompt::build_review_prompt(&blocks, &work_items);

    if prompt_only {
        return emit_output(&user, output).await;
    }

    config.validate_llm()?;
    let adapter = create_adapter(&ModelConfig::from_config(&config))?;
    let response = adapter
        .complete(LLMRequest {
            system_prompt: Some(system),
            user_prompt: user,
            temperature: Some(0.2),
            max_tokens: None,
        })
        .await?;

    let issues = parse_review_table(&postprocess::clean_llm_output(&response.content));
    let summary = format_review_summary(&pull_request.title, &issues);
    emit_output(&summary, output).await?;

    if post_comments && !issues.is_empty() {
        let question = format!(
            "Post {} comment(s) to PR !{} in {}? [y/N] ",
            issues.len(),
            id,
            repo
        );
        if !confirm(&question)? {
            println!("Skipped posting.");
            return Ok(());
        }

        let mut posted = 0usize;
        for issue in &issues {
            let Some(change) = match_change_for_issue(&reviewed, &issue.file_name) else {
                warn!("No changed file matches {}; finding not posted", issue.file_name);
                continue;
            };
            let text = format!("{} [{}] {}\n\nSuggested fix: {}", issue.severity, issue.category, issue.issue, issue.fix);
            azure
                .post_file_comment(
                    &repo,
                    id,
                    iteration,
                    change.change_tracking_id,
                    &change.path,
                    issue.line,
                    &text,
                )
                .await?;
            posted += 1;
        }

        azure
            .post_thread_comment(&repo, id, &format!("Automated review: {} finding(s) posted.", posted))
            .await?;
        println!("Posted {} comment(s) to PR !{}", posted, id);
    }

    Ok(())
}

async fn comments_command(
    config: config::Config,
    id: u64,
    repo: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    config.validate_tracker()?;
    let repo = config.repo_name(repo)?;
    let azure = AzureClient::new(&config)?;

    let threads = azure.get_threads(&repo, id).await?;
    let pending = extract_pending_comments(&threads);
    info!(
        "{} thread(s), {} pending comment(s)",
        threads.len(),
        pending.len()
    );

    if pending.is_empty() {
        println!("No unresolved comments on PR !{}", id);
        return Ok(());
    }

    let prompt = prompt::build_comment_fixes_prompt(id, &pending);
    emit_output(&prompt, output).await
}

/// One LLM call, cleaned and validated; a single retry when the output
/// merely looks cut off, a stand-in section when the model skipped the
/// acceptance criteria, warnings for anything else.
async fn generate_artifact(
    adapter: &dyn LLMAdapter,
    kind: PromptKind,
    system: String,
    user: String,
) -> Result<String> {
    let request = LLMRequest {
        system_prompt: Some(system),
        user_prompt: user,
        temperature: None,
        max_tokens: None,
    };

    let response = adapter.complete(request.clone()).await?;
    let mut text = postprocess_artifact(kind, &response.content);
    let mut validation = validate_artifact(kind, &text);

    if !validation.passed && validation.retryable() {
        info!("Output failed validation ({} issue(s)); retrying once", validation.issues.len());
        let response = adapter.complete(request).await?;
        text = postprocess_artifact(kind, &response.content);
        validation = validate_artifact(kind, &text);
    }

    if let Some(marker) = kind.patchable_section() {
        let missing = ValidationIssue::MissingSection(marker.to_string());
        if validation.issues.contains(&missing) {
            text.push_str(&format!("\n\n{}\nAC: (verify manually)\n", marker));
            validation.issues.retain(|issue| *issue != missing);
        }
    }

    for issue in &validation.issues {
        warn!("Validation: {}", issue);
    }

    Ok(text)
}

fn postprocess_artifact(kind: PromptKind, raw: &str) -> String {
    let cleaned = postprocess::clean_llm_output(raw);
    postprocess::filter_excluded_terms(&cleaned, kind.excluded_terms())
}

fn validate_artifact(kind: PromptKind, text: &str) -> postprocess::Validation {
    postprocess::validate_sections(text, kind.required_sections(), kind.check_parens())
}

fn format_review_summary(title: &str, issues: &[ReviewIssue]) -> String {
    let mut output = format!("# Review: {}\n\n", title);

    if issues.is_empty() {
        output.push_str("No findings.\n");
        return output;
    }

    output.push_str(&format!("{} finding(s):\n\n", issues.len()));
    for issue in issues {
        output.push_str(&format!(
            "- {} [{}] {}:{} {} (fix: {})\n",
            issue.severity, issue.category, issue.file_name, issue.line, issue.issue, issue.fix
        ));
    }
    output
}

/// A finding names a bare file; anchor it to the changed path ending in
/// that name.
fn match_change_for_issue<'a>(
    changes: &'a [ChangeEntry],
    file_name: &str,
) -> Option<&'a ChangeEntry> {
    changes.iter().find(|change| {
        change.path == file_name || change.path.ends_with(&format!("/{}", file_name))
    })
}

fn confirm(question: &str) -> Result<bool> {
    print!("{}", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn emit_output(text: &str, output: Option<PathBuf>) -> Result<()> {
    if let Some(path) = output {
        tokio::fs::write(&path, text).await?;
        info!("Output written to {}", path.display());
    } else {
        println!("{}", text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_summary_lists_findings() {
        let issues = vec![ReviewIssue {
            severity: "🔴 CRITICAL".to_string(),
            category: "Bugs".to_string(),
            file_name: "Query.cs".to_string(),
            line: 45,
            issue: "null check missing".to_string(),
            fix: "add null check".to_string(),
        }];
        let summary = format_review_summary("Add export", &issues);
        assert!(summary.contains("# Review: Add export"));
        assert!(summary.contains("Query.cs:45"));
        assert!(summary.contains("fix: add null check"));

        let empty = format_review_summary("Add export", &[]);
        assert!(empty.contains("No findings."));
    }

    #[test]
    fn issue_file_names_match_full_change_paths() {
        let changes = vec![
            ChangeEntry {
                path: "/src/data/Query.cs".to_string(),
                change_type: ChangeKind::Edit,
                change_tracking_id: 3,
            },
            ChangeEntry {
                path: "/src/OtherQuery.cs".to_string(),
                change_type: ChangeKind::Edit,
                change_tracking_id: 4,
            },
        ];

        let matched = match_change_for_issue(&changes, "Query.cs").unwrap();
        assert_eq!(matched.change_tracking_id, 3);
        assert!(match_change_for_issue(&changes, "Missing.cs").is_none());
    }

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative("  YES  \n"));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("n\n"));
        assert!(!is_affirmative("yep\n"));
    }
}
