use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;

use jira_checkin::checkin::comment::changeset_comment;
use jira_checkin::checkin::strip_issue_prefix;
use jira_checkin::checkin::vcs::Changeset;
use jira_checkin::config::Config;
use jira_checkin::jira::{Credentials, Issue, IssueRepository, JiraClient, MetadataCache};
use jira_checkin::logging;
use jira_checkin::notify::{ConsoleNotifier, NotificationSink};
use jira_checkin::section::IssueSection;
use jira_checkin::settings::SqliteSettings;

#[derive(Parser, Debug)]
#[command(name = "jira-checkin")]
#[command(about = "Jira issue lists and check-in comments from the command line")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jira-checkin/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Log on with the configured account and remember it
  Login,

  /// List one page of issues
  Issues {
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Apply the status and summary filters
    #[arg(long)]
    filter: bool,

    /// Hide issues whose status is done (with --filter)
    #[arg(long)]
    exclude_done: bool,

    /// Summary text to match (with --filter)
    #[arg(long)]
    summary: Option<String>,

    /// Issue types to include, comma separated; empty for all
    #[arg(long, value_delimiter = ',')]
    types: Option<Vec<String>>,
  },

  /// Show an issue by key
  Show { key: String },

  /// List the tenant's issue types
  Types,

  /// Post the check-in comment for a changeset to an issue
  Annotate {
    #[arg(long)]
    issue: String,

    /// YAML changeset description
    #[arg(long)]
    changeset: PathBuf,

    /// Print the comment body instead of posting it
    #[arg(long)]
    dry_run: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;

  let config = Config::load(args.config.as_deref())?;
  let client = Arc::new(JiraClient::new(&config.jira));
  let notifier = Arc::new(ConsoleNotifier);

  let credentials = || -> Result<Credentials> {
    Ok(Credentials {
      user_name: config.jira.email.clone(),
      password: Config::get_api_token()?,
      subdomain: config.jira.subdomain.clone(),
    })
  };

  let section = || -> Result<IssueSection> {
    Ok(IssueSection::new(
      client.clone(),
      Arc::new(SqliteSettings::open()?),
      notifier.clone(),
      MetadataCache::global(),
      config.list.clone(),
    ))
  };

  match args.command {
    Commands::Login => {
      let name = section()?.log_on(&credentials()?).await?;
      println!("Logged on as {}", name);
    }

    Commands::Issues {
      page,
      filter,
      exclude_done,
      summary,
      types,
    } => {
      let section = section()?;
      section.connect(&credentials()?).await?;

      let mut filters = section.filters();
      if let Some(types) = types {
        filters.issue_types = section
          .issue_types()
          .into_iter()
          .map(|choice| choice.issue_type.name)
          .filter(|name| types.iter().any(|t| t.eq_ignore_ascii_case(name)))
          .collect();
      }
      filters.filter_active |= filter;
      filters.exclude_done |= exclude_done;
      if let Some(summary) = summary {
        filters.summary = summary;
      }
      // One reload whether or not the filters moved
      if !section.apply_filters(filters).await? {
        section.refresh().await?;
      }
      if page > 1 {
        section.load_page(page).await?;
      }

      let view = section
        .page_view()
        .await
        .ok_or_else(|| eyre!("Not logged on"))?;
      for issue in &view.items {
        println!("{:<14} {:<16} {}", issue.key, issue.status, issue.summary);
      }
      println!("{}  ({})", view.page_info, section.issue_type_text());
    }

    Commands::Show { key } => {
      let section = section()?;
      section.connect(&credentials()?).await?;
      if !section.add_by_key(&key).await? {
        return Err(eyre!("Could not find Issue with Key: {}", key));
      }
      if let Some(issue) = section.selected() {
        print_issue(&issue);
      }
    }

    Commands::Types => {
      let section = section()?;
      section.connect(&credentials()?).await?;
      for choice in section.issue_types() {
        let mark = if choice.checked { "x" } else { " " };
        println!(
          "[{}] {:<20} {}",
          mark, choice.issue_type.name, choice.issue_type.description
        );
      }
    }

    Commands::Annotate {
      issue,
      changeset: path,
      dry_run,
    } => {
      let contents = std::fs::read_to_string(&path)
        .map_err(|e| eyre!("Failed to read changeset {}: {}", path.display(), e))?;
      let mut changeset: Changeset = serde_yaml::from_str(&contents)
        .map_err(|e| eyre!("Failed to parse changeset {}: {}", path.display(), e))?;
      if changeset.url.is_empty() {
        changeset.url = config.vcs.changeset_url(changeset.id);
      }

      let comment = strip_issue_prefix(&issue, &changeset.comment);
      let body = changeset_comment(&changeset, comment);
      if dry_run {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
      }

      client.authenticate(&credentials()?).await?;
      if client.add_comment(&issue, &body.to_value()).await? {
        notifier.info(&format!("Jira Comment added to {}", issue), None);
      } else {
        return Err(eyre!("Jira did not accept the comment for {}", issue));
      }
    }
  }

  Ok(())
}

fn print_issue(issue: &Issue) {
  println!("{}: {}", issue.key, issue.summary);
  println!("  Status:       {} ({})", issue.status, issue.status_category);
  if let Some(parent) = &issue.parent_key {
    println!(
      "  Parent:       {} {}",
      parent,
      issue.parent_summary.as_deref().unwrap_or_default()
    );
  }
  println!("  Fix Versions: {}", issue.fix_versions);
  println!("  Sprint:       {}", issue.sprint);
  println!(
    "  Assignee:     {}",
    issue.assignee.as_deref().unwrap_or("Unassigned")
  );
  println!("  {}", issue.detail_url());
}
