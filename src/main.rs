//! Demo CLI: drives a scripted action sequence against the in-memory stub
//! browser and prints the outcome plus the journal tail.

use std::path::PathBuf;
use std::sync::Arc;

use actor_core_types::{PageTarget, Point, Rect};
use actor_kernel::config::ActorConfig;
use actor_kernel::runtime::ActorRuntime;
use actor_kernel::stub::{StubBrowser, StubContextFetcher};
use actor_kernel::{FrameInterface, TabInterface};
use actor_page_content::{AnnotatedPageContent, ContentNode};
use actor_tool_requests::{
    ClickCount, ClickRequest, ClickType, NavigateRequest, PageToolFields, ToolRequest,
    TypeMode, TypeRequest,
};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "actor-kernel", version, about = "Agentic browsing actor kernel")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Configuration file (TOML/YAML/JSON, overlaid with ACTOR_* env vars).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an action sequence against a seeded stub browser.
    Demo {
        /// JSON file holding an array of tool requests. Tab handle 1 is the
        /// seeded tab. Defaults to a click+type+navigate sequence.
        #[arg(long)]
        script: Option<PathBuf>,

        /// Extra hosts to add to the policy blocklist.
        #[arg(long = "block-host")]
        block_hosts: Vec<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn seeded_content(document_identifier: &str) -> AnnotatedPageContent {
    let button =
        ContentNode::element(document_identifier, 11, Rect::new(40, 40, 120, 32)).with_label("Search");
    let input =
        ContentNode::element(document_identifier, 12, Rect::new(40, 90, 320, 32)).with_label("Query");
    AnnotatedPageContent::new(
        ContentNode::container(document_identifier, Rect::new(0, 0, 1280, 800))
            .with_children(vec![button, input]),
    )
}

fn default_script(tab: actor_core_types::TabHandle) -> Vec<ToolRequest> {
    vec![
        ToolRequest::Click(ClickRequest {
            page: PageToolFields {
                tab,
                target: PageTarget::Coordinate(Point::new(50, 50)),
            },
            click_type: ClickType::Left,
            count: ClickCount::Single,
        }),
        ToolRequest::Type(TypeRequest {
            page: PageToolFields {
                tab,
                target: PageTarget::DomNode {
                    node_id: 12,
                    document_identifier: "unset".to_string(),
                },
            },
            text: "rust actor kernel".to_string(),
            follow_by_enter: false,
            mode: TypeMode::Replace,
        }),
        ToolRequest::Navigate(NavigateRequest {
            tab,
            url: Url::parse("https://example.com/results").expect("static url"),
        }),
    ]
}

async fn run_demo(
    config: ActorConfig,
    script: Option<PathBuf>,
    block_hosts: Vec<String>,
) -> Result<()> {
    let mut config = config;
    config.policy.blocked_hosts.extend(block_hosts);

    let browser = StubBrowser::new();
    let tab = browser.open_tab("https://example.com/");
    let tab_handle = tab.handle();
    let document = tab.main_frame().document_identifier();
    tab.set_content(seeded_content(&document));

    let runtime = ActorRuntime::builder()
        .with_config(config)
        .with_tabs(browser.clone())
        .with_fetcher(StubContextFetcher::new(browser.clone()))
        .build()?;
    let service = runtime.service();

    let task_id = service.create_task();
    let task = service.get_task(task_id).context("task just created")?;
    browser.install_navigation_gate(
        Arc::new(actor_site_policy::BlocklistSitePolicy::new(
            runtime.config().policy.clone(),
        )?),
        task.execution_engine(),
    );

    let added = task.add_tab(tab_handle).await;
    anyhow::ensure!(added.is_ok(), "add_tab failed: {}", added.to_debug_string());

    // Seed the engine's time-of-use baseline before acting.
    service
        .request_tab_observation(task_id)
        .await
        .context("initial observation")?;

    let actions = match script {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let mut actions: Vec<ToolRequest> =
                serde_json::from_str(&raw).context("parsing action script")?;
            // Node targets in scripts rarely know the live document id;
            // patch in the seeded tab's document.
            for action in &mut actions {
                patch_document_identifier(action, &document);
            }
            actions
        }
        None => {
            let mut actions = default_script(tab_handle);
            for action in &mut actions {
                patch_document_identifier(action, &document);
            }
            actions
        }
    };

    println!("performing {} action(s) on task {task_id}", actions.len());
    let outcome = service
        .perform_actions(task_id, actions)
        .await
        .context("sequence callback dropped")?;

    match outcome.index_of_failed_action {
        None if outcome.is_ok() => println!("sequence finished: {}", outcome.code),
        None => println!("sequence failed: {}", outcome.code),
        Some(index) => println!("sequence failed at action {index}: {}", outcome.code),
    }
    println!(
        "task state: {}, tab now at {}",
        task.state(),
        tab.committed_url()
    );

    println!("\njournal tail:");
    for entry in runtime.journal().tail(15) {
        println!(
            "  {} [{}] {:<32} {}",
            entry.recorded_at.format("%H:%M:%S%.3f"),
            entry.track,
            entry.event,
            entry.details
        );
    }

    service.stop_task(task_id);
    Ok(())
}

fn patch_document_identifier(action: &mut ToolRequest, document: &str) {
    let target = match action {
        ToolRequest::Click(r) => Some(&mut r.page.target),
        ToolRequest::Type(r) => Some(&mut r.page.target),
        ToolRequest::Scroll(r) => Some(&mut r.page.target),
        ToolRequest::MoveMouse(r) => Some(&mut r.page.target),
        ToolRequest::Select(r) => Some(&mut r.page.target),
        _ => None,
    };
    if let Some(PageTarget::DomNode {
        document_identifier,
        ..
    }) = target
    {
        *document_identifier = document.to_string();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ActorConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Demo {
            script,
            block_hosts,
        } => run_demo(config, script, block_hosts).await,
    }
}
