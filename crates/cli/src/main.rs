//! gh-tidy CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse and validate arguments**: repository slugs, the threshold, the
//!    exclusion pattern and pull request states are all checked before any
//!    request is sent.
//! 2. **Wire logging**: a `tracing-subscriber` registry writing to stderr, in
//!    text or JSON. Results go to stdout.
//! 3. **Construct infrastructure**: a [`github::Session`] authenticated from
//!    `GITHUB_TOKEN`, sharing one cancellation token with the Ctrl-C handler.
//! 4. **Run the command** against the [`tidy::RemoteRepository`] port and
//!    print the per-repository report.

mod args;
mod commands;
mod duration;
mod logging;
mod output;
mod prompt;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use github::{Session, SessionConfig};
use serde::Serialize;
use tidy::{
    RefName, RefType, RemoteRepository, RepositorySlug, StalenessFilter, TidyError, Timestamp,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::args::{Cli, Command, GlobalArgs, OutputFormat, StaleArgs, StaleTarget};
use crate::commands::{DeleteRefsRequest, StalePullRequestsRequest, StaleRefsRequest};
use crate::output::Report;
use crate::prompt::{Assume, Confirm, TerminalPrompt};

/// A fully validated command, ready to run.
#[derive(Debug)]
enum Plan {
    StaleRefs(StaleRefsRequest),
    StalePullRequests(StalePullRequestsRequest),
    Delete(DeleteRefsRequest),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.global.log_format, cli.global.verbose);

    let invocation = uuid::Uuid::new_v4();
    let span = tracing::info_span!("gh_tidy", %invocation);

    match run(cli).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let started = Instant::now();
    let Cli { global, command } = cli;

    let plan = plan(command, global.owner.as_deref())?;
    let config = SessionConfig::default()
        .with_worker_count(global.worker_count)?
        .with_enterprise_endpoint(global.enterprise.clone());

    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());

    let session = Session::from_env(config, cancel).context("unable to start a GitHub session")?;
    info!(endpoint = session.endpoint(), "session created");

    let mut confirm: Box<dyn Confirm> = if global.force {
        Box::new(Assume)
    } else {
        Box::new(TerminalPrompt::stdio())
    };

    let rendered = execute(&session, plan, &global, confirm.as_mut()).await?;

    if let Some(line) = runtime_line(rendered, global.timed, started.elapsed()) {
        println!("{line}");
    }
    Ok(())
}

/// The `--timed` footer. Nothing is printed after an empty report.
fn runtime_line(rendered: bool, timed: bool, elapsed: Duration) -> Option<String> {
    (rendered && timed).then(|| format!("\nruntime: {elapsed:?}"))
}

/// Validates the parsed arguments without touching the network.
fn plan(command: Command, owner: Option<&str>) -> anyhow::Result<Plan> {
    match command {
        Command::Stale(StaleArgs { threshold, target }) => {
            let threshold = chrono::Duration::from_std(threshold)
                .map_err(|_| TidyError::configuration("the threshold is too large"))?;
            let filter = |exclude: Option<String>| -> anyhow::Result<StalenessFilter> {
                let filter = StalenessFilter::new(threshold, Timestamp::now());
                Ok(match exclude {
                    Some(pattern) => {
                        filter.with_exclusion(regex::Regex::new(&pattern).map_err(TidyError::from)?)
                    }
                    None => filter,
                })
            };

            Ok(match target {
                StaleTarget::Branches(args) => Plan::StaleRefs(StaleRefsRequest {
                    repositories: commands::resolve_repositories(&args.repositories, owner)?,
                    ref_type: RefType::Branch,
                    filter: filter(args.exclude)?,
                }),
                StaleTarget::Tags(args) => Plan::StaleRefs(StaleRefsRequest {
                    repositories: commands::resolve_repositories(&args.repositories, owner)?,
                    ref_type: RefType::Tag,
                    filter: filter(args.exclude)?,
                }),
                StaleTarget::Prs(args) => Plan::StalePullRequests(StalePullRequestsRequest {
                    repositories: commands::resolve_repositories(&args.repositories, owner)?,
                    states: github::parse_states(&args.states)?,
                    filter: filter(args.exclude)?,
                }),
            })
        }
        Command::Delete(args) => {
            let default_owner = owner.and_then(tidy::OwnerName::new);
            let repository = RepositorySlug::resolve(&args.repository, default_owner.as_ref())?;
            let names = args.refs.into_iter().filter_map(RefName::new).collect();
            Ok(Plan::Delete(DeleteRefsRequest { repository, names }))
        }
    }
}

/// Runs the plan and reports whether any output was printed.
async fn execute<R: RemoteRepository>(
    remote: &R,
    plan: Plan,
    global: &GlobalArgs,
    confirm: &mut dyn Confirm,
) -> anyhow::Result<bool> {
    match plan {
        Plan::StaleRefs(request) => {
            let report = commands::find_stale_refs(remote, &request).await?;
            let rendered = print_report(&report, global.format)?;
            if global.remove {
                let removed = commands::remove_refs(remote, &report, request.ref_type, confirm).await?;
                info!(removed, "stale refs deleted");
            }
            Ok(rendered)
        }
        Plan::StalePullRequests(request) => {
            let report = commands::find_stale_pull_requests(remote, &request).await?;
            let rendered = print_report(&report, global.format)?;
            if global.remove {
                let closed = commands::close_pull_requests(remote, &report, confirm).await?;
                info!(closed, "stale pull requests closed");
            }
            Ok(rendered)
        }
        Plan::Delete(request) => {
            let report = commands::delete_named_refs(remote, &request, confirm).await?;
            print_report(&report, global.format)
        }
    }
}

fn print_report<T: Serialize>(report: &Report<T>, format: OutputFormat) -> anyhow::Result<bool> {
    let Some(text) = output::render(report, format)? else {
        return Ok(false);
    };
    println!("{}", text.trim_end());
    Ok(true)
}

/// The first Ctrl-C cancels in-flight work; a second one exits immediately.
fn watch_for_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, cancelling outstanding requests");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
