//! Command-line surface.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::duration::parse_duration;

const EXAMPLES: &str = "\
Examples:
  # Without --rm every command is a dry run, except 'delete'
  gh-tidy stale branches <owner/repo> -t 72h
  gh-tidy stale prs      <owner/repo> -t 72h -s OPEN -s MERGED
  gh-tidy stale tags     <owner/repo> -t 72h --exclude '^v1\\.'
  gh-tidy delete         <owner/repo> --ref <branch_name> --ref <tag_name>

The GITHUB_TOKEN environment variable must hold a token with repo scope.";

#[derive(Debug, Parser)]
#[command(name = "gh-tidy", version)]
#[command(about = "Find and remove stale GitHub branches, tags and pull requests")]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// The GitHub owner, used for repositories given without an 'owner/' prefix
    #[arg(short, long, global = true)]
    pub owner: Option<String>,

    /// Output format of the results
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    /// Remove (delete or close) what the command found
    #[arg(long = "rm", global = true)]
    pub remove: bool,

    /// Skip every confirmation prompt
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Print the total execution time after the results
    #[arg(long, global = true)]
    pub timed: bool,

    /// Mutations allowed in flight at once
    #[arg(long, default_value_t = github::DEFAULT_WORKER_COUNT, global = true)]
    pub worker_count: usize,

    /// GitHub Enterprise API endpoint to use instead of github.com
    #[arg(long, env = "GH_ENTERPRISE_URL", global = true)]
    pub enterprise: Option<String>,

    /// Format of diagnostic logs written to stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Report refs or pull requests without recent activity
    #[command(visible_alias = "inactive")]
    Stale(StaleArgs),

    /// Delete branches or tags by name
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct StaleArgs {
    /// Items whose last activity is older than this are stale (e.g. 72h, 1h30m, 4w)
    #[arg(short, long, value_parser = parse_duration, default_value = "672h", global = true)]
    pub threshold: Duration,

    #[command(subcommand)]
    pub target: StaleTarget,
}

#[derive(Debug, Subcommand)]
pub enum StaleTarget {
    /// Stale branches
    #[command(visible_aliases = ["b", "br"])]
    Branches(RefFilterArgs),

    /// Stale tags
    #[command(visible_alias = "t")]
    Tags(RefFilterArgs),

    /// Stale pull requests
    #[command(visible_alias = "pr")]
    Prs(PullRequestFilterArgs),
}

#[derive(Debug, Args)]
pub struct RefFilterArgs {
    /// One or more repositories as 'owner/repo' (or 'repo' with --owner)
    #[arg(required = true, value_name = "OWNER/REPO")]
    pub repositories: Vec<String>,

    /// Never report names matching this regular expression
    #[arg(long, value_name = "REGEX")]
    pub exclude: Option<String>,
}

#[derive(Debug, Args)]
pub struct PullRequestFilterArgs {
    /// One or more repositories as 'owner/repo' (or 'repo' with --owner)
    #[arg(required = true, value_name = "OWNER/REPO")]
    pub repositories: Vec<String>,

    /// Never report pull requests whose source branch matches this regular expression
    #[arg(long, value_name = "REGEX")]
    pub exclude: Option<String>,

    /// Pull request states to consider: OPEN, CLOSED or MERGED
    #[arg(short, long = "state", default_values_t = [String::from("OPEN")])]
    pub states: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// The repository as 'owner/repo' (or 'repo' with --owner)
    #[arg(value_name = "OWNER/REPO")]
    pub repository: String,

    /// Branch or tag name to delete; repeat for several
    #[arg(long = "ref", value_name = "NAME", required = true)]
    pub refs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gh-tidy").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn stale_branches_defaults() {
        let cli = parse(&["stale", "branches", "octo/repo"]);
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert_eq!(cli.global.worker_count, 20);
        assert!(!cli.global.remove);
        let Command::Stale(stale) = cli.command else {
            panic!("expected stale");
        };
        assert_eq!(stale.threshold, Duration::from_secs(672 * 3600));
        let StaleTarget::Branches(args) = stale.target else {
            panic!("expected branches");
        };
        assert_eq!(args.repositories, ["octo/repo"]);
        assert_eq!(args.exclude, None);
    }

    #[test]
    fn aliases_and_global_flags() {
        let cli = parse(&[
            "inactive", "br", "a/b", "c/d", "-t", "72h", "--rm", "-f", "--format", "yaml",
            "--exclude", "^main$",
        ]);
        assert!(cli.global.remove);
        assert!(cli.global.force);
        assert_eq!(cli.global.format, OutputFormat::Yaml);
        let Command::Stale(stale) = cli.command else {
            panic!("expected stale");
        };
        assert_eq!(stale.threshold, Duration::from_secs(72 * 3600));
        let StaleTarget::Branches(args) = stale.target else {
            panic!("expected branches");
        };
        assert_eq!(args.repositories, ["a/b", "c/d"]);
        assert_eq!(args.exclude.as_deref(), Some("^main$"));
    }

    #[test]
    fn pull_request_states_are_repeatable() {
        let cli = parse(&["stale", "pr", "a/b", "-s", "OPEN", "-s", "MERGED"]);
        let Command::Stale(stale) = cli.command else {
            panic!("expected stale");
        };
        let StaleTarget::Prs(args) = stale.target else {
            panic!("expected prs");
        };
        assert_eq!(args.states, ["OPEN", "MERGED"]);

        let cli = parse(&["stale", "prs", "a/b"]);
        let Command::Stale(stale) = cli.command else {
            panic!("expected stale");
        };
        let StaleTarget::Prs(args) = stale.target else {
            panic!("expected prs");
        };
        assert_eq!(args.states, ["OPEN"]);
    }

    #[test]
    fn delete_requires_a_ref() {
        assert!(Cli::try_parse_from(["gh-tidy", "delete", "a/b"]).is_err());
        let cli = parse(&["delete", "a/b", "--ref", "old", "--ref", "v0.1"]);
        let Command::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(args.repository, "a/b");
        assert_eq!(args.refs, ["old", "v0.1"]);
    }

    #[test]
    fn stale_requires_a_repository_and_a_valid_threshold() {
        assert!(Cli::try_parse_from(["gh-tidy", "stale", "tags"]).is_err());
        assert!(Cli::try_parse_from(["gh-tidy", "stale", "tags", "a/b", "-t", "soon"]).is_err());
    }
}
