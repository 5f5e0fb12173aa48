//! DriveShare CLI: browse shared folders and manage share links
//!
//! Usage:
//!   driveshare-cli login --email <addr> [--code <otp>]   Admin sign-in
//!   driveshare-cli browse [--share <id>] [--folder <id>]  List a folder
//!   driveshare-cli get <file> [--share <id>] [-o <path>]  Download a file
//!   driveshare-cli shares list|create|update|delete       Manage share links
//!   driveshare-cli ask <question> [--share <id>]          Ask about a folder

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::ExposeSecret;
use tokio::io::{AsyncBufReadExt, BufReader};

use driveshare::assistant::{Assistant, GeminiBackend};
use driveshare::auth::LoginFlow;
use driveshare::catalog::{filter_entries, format_size, EntryKind, ViewMode};
use driveshare::config::{default_config_path, load_config, save_config, PortalConfig};
use driveshare::context::AppContext;
use driveshare::download::{download_tracked, resolve_destination, ProgressFn};
use driveshare::notifications::{DownloadTracker, NotificationCenter, SharedDownloads, SharedNotifications, ToastKind};
use driveshare::portal::{NewShare, ShareUpdate};
use driveshare::shares::{share_url, ShareManager};
use driveshare::{Access, AccumulationOutcome, Entry, FolderBrowser, FolderView, LoadState, ScriptBackend};

#[derive(Parser)]
#[command(
    name = "driveshare-cli",
    about = "DriveShare CLI: client file-sharing portal for cloud-storage folders",
    version
)]
struct Cli {
    /// Config file (default: <config dir>/driveshare/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as administrator with a one-time code
    Login {
        #[arg(long)]
        email: String,
        /// Code received by email; prompts for it when omitted
        #[arg(long)]
        code: Option<String>,
    },
    /// Forget the stored admin session
    Logout,
    /// List a folder
    Browse {
        #[command(flatten)]
        target: Target,
        /// Only show entries whose name contains this text
        #[arg(long)]
        search: Option<String>,
        /// Detailed one-entry-per-line view
        #[arg(long)]
        list: bool,
        /// Keep a navigation prompt open
        #[arg(short, long)]
        interactive: bool,
    },
    /// Download a file by ID or name
    Get {
        file: String,
        #[command(flatten)]
        target: Target,
        /// Destination file or directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage share links (admin)
    Shares {
        #[command(subcommand)]
        action: SharesCommand,
    },
    /// Ask the assistant about a folder
    Ask {
        question: String,
        #[command(flatten)]
        target: Target,
    },
    /// Show or toggle the color theme
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(clap::Args)]
struct Target {
    /// Share link ID (client access)
    #[arg(long)]
    share: Option<String>,
    /// Folder ID (default: configured root)
    #[arg(long)]
    folder: Option<String>,
}

#[derive(Subcommand)]
enum SharesCommand {
    List,
    Create {
        /// Folder ID or folder URL
        folder: String,
        #[arg(long)]
        label: String,
        /// Custom link ID (letters, digits, '-' and '_')
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        logo: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        logo: Option<String>,
    },
    Delete {
        id: String,
    },
}

struct App {
    config: PortalConfig,
    config_path: PathBuf,
    context: AppContext,
    toasts: SharedNotifications,
    downloads: SharedDownloads,
}

impl App {
    fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(default_config_path);
        let mut config = load_config(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        config.apply_env_overrides();
        let context = AppContext::load(config_path.with_file_name("context.json"));
        let toasts = NotificationCenter::shared(config.toast_ttl());
        Ok(Self {
            config,
            config_path,
            context,
            toasts,
            downloads: DownloadTracker::shared(),
        })
    }

    fn backend(&self) -> Result<Arc<ScriptBackend>> {
        self.config.validate()?;
        Ok(Arc::new(ScriptBackend::new(
            self.config.http_client()?,
            self.config.script_url.clone(),
        )))
    }

    fn access(&self, share: Option<&str>) -> Result<Access> {
        if let Some(share) = share {
            return Ok(Access::share(share));
        }
        match self.context.session() {
            Some(session) => Ok(Access::admin(session.token.clone())),
            None => bail!("Not signed in. Run `driveshare-cli login --email <addr>` or pass --share <id>"),
        }
    }

    fn browser(&self, target: &Target) -> Result<FolderBrowser<ScriptBackend>> {
        let access = self.access(target.share.as_deref())?;
        Ok(FolderBrowser::new(
            self.backend()?,
            access,
            self.config.root_folder_id.clone(),
            self.config.limits(),
        )
        .with_notifications(self.toasts.clone()))
    }

    fn share_manager(&self) -> Result<ShareManager<ScriptBackend>> {
        let session = self
            .context
            .session()
            .ok_or_else(|| anyhow!("Share management requires an admin session. Run `driveshare-cli login` first"))?;
        Ok(ShareManager::new(self.backend()?, session.token.clone()))
    }

    /// Print live toasts once, then drop them
    fn flush_toasts(&self) {
        let Ok(mut center) = self.toasts.lock() else { return };
        let shown: Vec<(String, ToastKind, String)> = center
            .visible()
            .map(|t| (t.id.clone(), t.kind, t.message.clone()))
            .collect();
        for (id, kind, message) in shown {
            let marker = match kind {
                ToastKind::Success => "✓",
                ToastKind::Error => "✗",
                ToastKind::Info => "ℹ",
            };
            eprintln!("{} {}", marker, message);
            center.dismiss(&id);
        }
        center.prune(Instant::now());
    }
}

fn render_view(view: &FolderView, query: &str, mode: ViewMode) {
    if let Some(label) = &view.share_label {
        println!("{}", label);
    }
    let crumbs: Vec<&str> = view.path.iter().map(|p| p.name.as_str()).collect();
    println!("/{}", crumbs.join("/"));

    let entries = filter_entries(&view.entries, query);
    if entries.is_empty() {
        println!(
            "{}",
            if query.trim().is_empty() { "This folder is empty" } else { "No matching files" }
        );
        return;
    }
    match mode {
        ViewMode::List => {
            for entry in &entries {
                println!(
                    "{:<7} {:>10}  {:<24}  {}  [{}]",
                    EntryKind::of(entry).label(),
                    format_size(entry),
                    entry.last_updated,
                    entry.name,
                    entry.id
                );
            }
        }
        ViewMode::Grid => {
            let names: Vec<String> = entries
                .iter()
                .map(|e| if e.is_container() { format!("{}/", e.name) } else { e.name.clone() })
                .collect();
            for row in names.chunks(4) {
                println!("{}", row.iter().map(|n| format!("{:<28}", n)).collect::<String>().trim_end());
            }
        }
    }
    if view.truncated {
        println!("(listing truncated)");
    }
}

fn report_outcome(outcome: &AccumulationOutcome, state: &LoadState) -> Result<()> {
    match outcome {
        AccumulationOutcome::Failed(failure) if failure.is_blocking() => {
            Err(anyhow!("{}", failure.error()))
        }
        _ => {
            if let LoadState::Errored(failure) = state {
                tracing::debug!("Listing ended with partial failure: {}", failure.error());
            }
            Ok(())
        }
    }
}

fn find_entry<'a>(view: &'a FolderView, needle: &str) -> Option<&'a Entry> {
    view.entries
        .iter()
        .find(|e| e.id == needle)
        .or_else(|| view.entries.iter().find(|e| e.name.eq_ignore_ascii_case(needle)))
}

async fn download_with_progress(app: &App, entry: &Entry, dest: &Path) -> Result<()> {
    let bar = ProgressBar::new(entry.size);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .map_err(|e| anyhow!("progress template: {}", e))?
            .progress_chars("=> "),
    );
    bar.set_message(entry.name.clone());
    let handle = bar.clone();
    let on_progress: ProgressFn = Box::new(move |done, total| {
        if total > 0 {
            handle.set_length(total);
        }
        handle.set_position(done);
    });

    let client = app.config.http_client()?;
    let result = download_tracked(&client, entry, dest, &app.downloads, &app.toasts, Some(on_progress)).await;
    bar.finish_and_clear();
    result?;
    println!("Saved {}", resolve_destination(entry, dest).display());
    Ok(())
}

/// Split `get` arguments into the file and an optional `-o <dest>`
fn split_get_args(arg: &str) -> (&str, &str) {
    [" -o ", " --output "]
        .iter()
        .find_map(|flag| arg.rsplit_once(flag))
        .map_or((arg.trim(), "."), |(name, dest)| (name.trim(), dest.trim()))
}

async fn interactive(app: &App, browser: &FolderBrowser<ScriptBackend>, mut mode: ViewMode) -> Result<()> {
    let expiry = tokio::spawn(driveshare::notifications::run_expiry(
        app.toasts.clone(),
        Duration::from_millis(500),
    ));
    let mut query = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Commands: ls, cd <id|name>, up, home, refresh, find <text>, view, get <id|name> [-o <dest>], ask <question>, quit");

    let mut assistant = Assistant::new(Arc::new(GeminiBackend::new(
        app.config.http_client()?,
        &app.config.assistant,
    )));

    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        let (cmd, arg) = line.split_once(' ').map_or((line, ""), |(c, a)| (c, a.trim()));

        let outcome = match cmd {
            "" => None,
            "quit" | "exit" | "q" => break,
            "ls" => {
                if let Some(view) = browser.snapshot().await.view {
                    render_view(&view, &query, mode);
                }
                None
            }
            "cd" => {
                let snapshot = browser.snapshot().await;
                let target = snapshot
                    .view
                    .as_ref()
                    .and_then(|v| find_entry(v, arg))
                    .filter(|e| e.is_container())
                    .map(|e| e.id.clone())
                    .unwrap_or_else(|| arg.to_string());
                query.clear();
                Some(browser.open(&target).await)
            }
            "up" => {
                query.clear();
                browser.open_parent().await
            }
            "home" => {
                query.clear();
                let ticket = browser.reset_home().await;
                Some(browser.load(&ticket).await)
            }
            "refresh" => {
                let ticket = browser.refresh().await;
                Some(browser.load(&ticket).await)
            }
            "find" => {
                query = arg.to_string();
                if let Some(view) = browser.snapshot().await.view {
                    render_view(&view, &query, mode);
                }
                None
            }
            "view" => {
                mode = mode.toggle();
                println!("View: {:?}", mode);
                None
            }
            "get" => {
                let (name, dest) = split_get_args(arg);
                let snapshot = browser.snapshot().await;
                match snapshot.view.as_ref().and_then(|v| find_entry(v, name)) {
                    Some(entry) => {
                        if let Err(e) = download_with_progress(app, entry, Path::new(dest)).await {
                            eprintln!("Error: {}", e);
                        }
                    }
                    None => eprintln!("No file named {}", name),
                }
                None
            }
            "ask" => {
                let snapshot = browser.snapshot().await;
                if let Some(reply) = assistant.ask(arg, snapshot.view.as_ref()).await {
                    println!("{}", reply.text);
                }
                None
            }
            other => {
                eprintln!("Unknown command: {}", other);
                None
            }
        };

        if let Some(outcome) = outcome {
            let snapshot = browser.snapshot().await;
            match (&outcome, &snapshot.view) {
                (AccumulationOutcome::Failed(f), _) if f.is_blocking() => eprintln!("Error: {}", f.error()),
                (_, Some(view)) => render_view(view, &query, mode),
                _ => {}
            }
        }
        app.flush_toasts();
    }

    expiry.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    driveshare::init_tracing();
    let cli = Cli::parse();
    let mut app = App::load(cli.config)?;

    match cli.command {
        Commands::Login { email, code } => {
            let backend = app.backend()?;
            let mut flow = match code {
                Some(_) => LoginFlow::awaiting_code(backend, &email)?,
                None => {
                    let mut flow = LoginFlow::new(backend);
                    flow.request_code(&email).await?;
                    eprintln!("Verification code sent to {}", email.trim());
                    flow
                }
            }
            .with_notifications(app.toasts.clone());

            let code = match code {
                Some(code) => code,
                None => {
                    eprint!("Verification code: ");
                    BufReader::new(tokio::io::stdin())
                        .lines()
                        .next_line()
                        .await?
                        .unwrap_or_default()
                }
            };
            let session = flow.verify(&code).await?;
            app.context.login(session)?;
            app.flush_toasts();
        }
        Commands::Logout => {
            app.context.logout()?;
            println!("Signed out");
        }
        Commands::Browse {
            target,
            search,
            list,
            interactive: repl,
        } => {
            let browser = app.browser(&target)?;
            let folder = target.folder.clone().unwrap_or_else(|| app.config.root_folder_id.clone());
            let outcome = browser.open(&folder).await;
            let snapshot = browser.snapshot().await;
            app.flush_toasts();
            report_outcome(&outcome, &snapshot.state)?;

            let mode = if list { ViewMode::List } else { ViewMode::Grid };
            if let Some(view) = &snapshot.view {
                render_view(view, search.as_deref().unwrap_or(""), mode);
            }
            if repl {
                interactive(&app, &browser, mode).await?;
            }
        }
        Commands::Get { file, target, output } => {
            let browser = app.browser(&target)?;
            let folder = target.folder.clone().unwrap_or_else(|| app.config.root_folder_id.clone());
            let outcome = browser.open(&folder).await;
            let snapshot = browser.snapshot().await;
            report_outcome(&outcome, &snapshot.state)?;

            let view = snapshot.view.ok_or_else(|| anyhow!("Folder could not be listed"))?;
            let entry = find_entry(&view, &file).ok_or_else(|| anyhow!("No file named {} in {}", file, view.name))?;
            let dest = output.unwrap_or_else(|| PathBuf::from("."));
            let result = download_with_progress(&app, entry, &dest).await;
            app.flush_toasts();
            result?;
        }
        Commands::Shares { action } => {
            let manager = app.share_manager()?;
            let portal = app.config.portal_url.clone();
            let link_for = |id: &str| portal.as_deref().and_then(|base| share_url(base, id).ok());
            match action {
                SharesCommand::List => {
                    let shares = manager.list().await?;
                    if shares.is_empty() {
                        println!("No active shares");
                    }
                    for share in shares {
                        println!(
                            "{:<20} {:<28} folder={} clicks={} created={}",
                            share.id, share.label, share.folder_id, share.clicks, share.created
                        );
                        if let Some(url) = link_for(&share.id) {
                            println!("  {}", url);
                        }
                    }
                }
                SharesCommand::Create { folder, label, path, logo } => {
                    let link = manager
                        .create(&NewShare {
                            folder_id: folder,
                            label,
                            custom_path: path,
                            logo_url: logo,
                        })
                        .await?;
                    println!("Created share {}", link.id);
                    if let Some(url) = link_for(&link.id) {
                        println!("{}", url);
                    }
                }
                SharesCommand::Update { id, label, logo } => {
                    let link = manager
                        .update(&ShareUpdate {
                            share_id: id,
                            label,
                            logo_url: logo,
                        })
                        .await?;
                    println!("Updated share {} ({})", link.id, link.label);
                }
                SharesCommand::Delete { id } => {
                    manager.delete(&id).await?;
                    println!("Deleted share {}", id);
                }
            }
        }
        Commands::Ask { question, target } => {
            let browser = app.browser(&target)?;
            let folder = target.folder.clone().unwrap_or_else(|| app.config.root_folder_id.clone());
            let outcome = browser.open(&folder).await;
            let snapshot = browser.snapshot().await;
            report_outcome(&outcome, &snapshot.state)?;

            let backend = Arc::new(GeminiBackend::new(app.config.http_client()?, &app.config.assistant));
            let mut assistant = Assistant::new(backend);
            if let Some(reply) = assistant.ask(&question, snapshot.view.as_ref()).await {
                println!("{}", reply.text);
            }
        }
        Commands::Theme { toggle } => {
            if toggle {
                app.context.toggle_theme()?;
            }
            println!("{}", app.context.theme());
        }
        Commands::Config { init } => {
            if init && !app.config_path.exists() {
                save_config(&app.config_path, &PortalConfig::default())?;
                println!("Wrote {}", app.config_path.display());
            }
            let config = &app.config;
            println!("config file:   {}", app.config_path.display());
            println!("script url:    {}", config.script_url);
            println!("root folder:   {}", config.root_folder_id);
            println!("portal url:    {}", config.portal_url.as_deref().unwrap_or("-"));
            println!("page limit:    {}", config.max_pages);
            println!("entry limit:   {}", config.max_entries);
            println!("assistant:     {} ({})", config.assistant.model, if config.assistant.api_key.is_some() { "key set" } else { "no key" });
            match app.context.session() {
                Some(session) => println!(
                    "signed in:     {} (token {} chars)",
                    session.email,
                    session.token.expose_secret().len()
                ),
                None => println!("signed in:     no"),
            }
            if let Err(e) = config.validate() {
                println!("status:        {}", e);
            }
        }
    }

    Ok(())
}
