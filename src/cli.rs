use clap::{Args, Parser, Subcommand};
use magang_notify::adapters::TokioTimeProvider;
use magang_notify::config::{self, ConfigError, FileConfig};
use magang_notify::feed::{
    FeedDriver, FeedEvent, FileDismissalStore, HttpFeedSource, NotificationFeed,
};
use magang_notify::types::role::Role;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use time::Duration;
use tokio::sync::mpsc;

const DEFAULT_AUTH_COOKIE_NAME: &str = "magang_auth";

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(config::AppConfig),
    Watch(WatchArgs),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Init(ref args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::AuthKey) => return RunOutcome::Exit(run_auth_key()),
        Some(Command::Watch(ref args)) => return RunOutcome::Watch(args.clone()),
        Some(Command::Serve) | Some(Command::IssueToken(_)) | None => {}
    }

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    if let Some(Command::IssueToken(args)) = &cli.command {
        return RunOutcome::Exit(run_issue_token(&config, args));
    }

    RunOutcome::Serve(config)
}

#[derive(Parser, Debug)]
#[command(
    name = "magang-notify",
    version,
    about = "Role-based push notification service for the internship portal"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// TOML settings file; flags and environment variables override it.
    #[arg(long, env = "MAGANG_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[arg(long, env = "MAGANG_LISTEN")]
    listen: Option<SocketAddr>,
    /// SQLite database file. Without it notifications live in memory.
    #[arg(long, env = "MAGANG_DATABASE")]
    database: Option<PathBuf>,
    #[arg(long, env = "MAGANG_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "MAGANG_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "MAGANG_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "MAGANG_AUTH_KEY", global = true)]
    auth_key: Option<String>,
    #[arg(long, env = "MAGANG_AUTH_TOKEN_TTL", global = true)]
    auth_token_ttl: Option<String>,
    #[arg(long, env = "MAGANG_AUTH_COOKIE_NAME")]
    auth_cookie_name: Option<String>,
    #[arg(long, env = "MAGANG_DEDUP_WINDOW_SECS")]
    dedup_window_secs: Option<i64>,
    #[arg(long, env = "MAGANG_PUSH_TTL_SECS")]
    push_ttl_secs: Option<u32>,
    #[arg(long, env = "MAGANG_PUSH_ICON")]
    push_icon: Option<String>,
    #[arg(long, env = "MAGANG_PUSH_BADGE")]
    push_badge: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Generate VAPID credentials.
    Init(InitArgs),
    /// Generate an HS256 key for role tokens.
    AuthKey,
    /// Sign a role token with the configured auth key.
    IssueToken(IssueTokenArgs),
    /// Follow a role's unread notifications on a running server.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct IssueTokenArgs {
    #[arg(long)]
    role: Role,
    #[arg(long)]
    subject: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct WatchArgs {
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,
    #[arg(long)]
    role: Role,
    #[arg(long, env = "MAGANG_TOKEN")]
    token: Option<String>,
    #[arg(long, default_value = "30s")]
    interval: String,
    /// Where dismissed toasts are remembered between runs.
    #[arg(long, default_value = ".magang-notify")]
    state_dir: PathBuf,
}

fn run_init(args: &InitArgs) -> i32 {
    let credentials = match magang_notify::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match &args.subject {
        Some(subject) => (subject.clone(), false),
        None => ("mailto:admin@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("MAGANG_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("MAGANG_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("MAGANG_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace MAGANG_VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!("[vapid]");
    println!("private_key = \"{}\"", credentials.private_key);
    println!("public_key = \"{}\"", credentials.public_key);
    println!("subject = \"{subject}\"");
    0
}

fn run_auth_key() -> i32 {
    let secret = match magang_notify::auth::generate_auth_key() {
        Ok(secret) => secret,
        Err(err) => {
            eprintln!("failed to generate auth key: {err}");
            return 1;
        }
    };
    println!("{secret}");
    0
}

fn run_issue_token(config: &config::AppConfig, args: &IssueTokenArgs) -> i32 {
    let auth = match magang_notify::auth::AuthState::from_config(config) {
        Ok(Some(auth)) => auth,
        Ok(None) => {
            eprintln!("error: --auth-key is required to issue tokens");
            return 2;
        }
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };
    match auth.issue_token(&args.subject, args.role) {
        Ok(token) => {
            println!("{token}");
            0
        }
        Err(err) => {
            eprintln!("failed to issue token: {err}");
            1
        }
    }
}

pub(crate) async fn run_watch(args: WatchArgs) -> i32 {
    let interval = match config::parse_duration(&args.interval)
        .and_then(|interval| {
            std::time::Duration::try_from(interval)
                .map_err(|err| ConfigError::Invalid(format!("invalid interval: {err}")))
        }) {
        Ok(interval) => interval,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };
    let source = match HttpFeedSource::new(&args.server, args.token.clone()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    let feed = Arc::new(NotificationFeed::new(
        source,
        FileDismissalStore::new(&args.state_dir),
    ));
    let driver = FeedDriver::new(feed, TokioTimeProvider, interval);
    let (sender, mut events) = mpsc::channel(16);
    let role = args.role;
    let task = tokio::spawn(async move { driver.run(role, sender).await });

    println!("watching {role} notifications on {}", args.server);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(FeedEvent::Toast(notification)) => {
                    println!("[{}] {}: {}", notification.id, notification.title, notification.message);
                    if let Some(link) = &notification.link {
                        println!("      {link}");
                    }
                }
                Some(FeedEvent::ToastDismissed(_)) => {}
                Some(FeedEvent::Unread { count }) => println!("{count} unread"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(events);
    task.abort();
    0
}

fn resolve_config(cli: &Cli) -> Result<config::AppConfig, ConfigError> {
    let file = match cli.config.as_deref() {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let defaults = config::AppConfig::default();

    let dedup_window = match cli
        .dedup_window_secs
        .or(file.notifications.dedup_window_secs)
    {
        Some(secs) if secs < 0 => {
            return Err(ConfigError::Invalid(
                "dedup window cannot be negative".to_string(),
            ));
        }
        Some(secs) => Duration::seconds(secs),
        None => defaults.dedup_window,
    };

    Ok(config::AppConfig {
        listen: cli.listen.or(file.listen).unwrap_or(defaults.listen),
        database: cli.database.clone().or(file.database.clone()),
        vapid_private_key: cli
            .vapid_private_key
            .clone()
            .or(file.vapid.private_key.clone()),
        vapid_public_key: cli
            .vapid_public_key
            .clone()
            .or(file.vapid.public_key.clone()),
        vapid_subject: cli.vapid_subject.clone().or(file.vapid.subject.clone()),
        auth: resolve_auth_config(cli, &file)?,
        push: config::PushConfig {
            icon: cli
                .push_icon
                .clone()
                .or(file.push.icon.clone())
                .unwrap_or(defaults.push.icon),
            badge: cli
                .push_badge
                .clone()
                .or(file.push.badge.clone())
                .unwrap_or(defaults.push.badge),
            ttl: cli
                .push_ttl_secs
                .or(file.push.ttl_secs)
                .unwrap_or(defaults.push.ttl),
        },
        dedup_window,
    })
}

fn resolve_auth_config(
    cli: &Cli,
    file: &FileConfig,
) -> Result<Option<config::AuthConfig>, ConfigError> {
    let key = cli.auth_key.as_deref().or(file.auth.key.as_deref());
    let token_ttl = cli
        .auth_token_ttl
        .as_deref()
        .or(file.auth.token_ttl.as_deref());
    let cookie_name = cli
        .auth_cookie_name
        .as_deref()
        .or(file.auth.cookie_name.as_deref());

    if key.is_none() && token_ttl.is_none() && cookie_name.is_none() {
        return Ok(None);
    }

    let key = key
        .ok_or_else(|| {
            ConfigError::Invalid("auth is configured but --auth-key is missing".to_string())
        })?
        .trim();
    if key.is_empty() {
        return Err(ConfigError::Invalid("auth key cannot be empty".to_string()));
    }

    if let Some(name) = cookie_name
        && name.trim().is_empty()
    {
        return Err(ConfigError::Invalid(
            "auth cookie name cannot be empty".to_string(),
        ));
    }

    let token_ttl = match token_ttl {
        Some(raw) => config::parse_duration(raw)?,
        None => default_auth_token_ttl(),
    };
    let cookie_name = cookie_name
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| DEFAULT_AUTH_COOKIE_NAME.to_string());

    Ok(Some(config::AuthConfig {
        key: key.to_string(),
        token_ttl,
        cookie_name,
    }))
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(14)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli::try_parse_from(["magang-notify"]).expect("parse cli")
    }

    fn create_temp_root(test_name: &str) -> PathBuf {
        let mut root = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        root.push(format!("magang-notify-cli-{}-{}", test_name, nanos));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }

    #[test]
    fn resolve_auth_config__should_require_auth_key_when_options_present() {
        // Given
        let mut cli = base_cli();
        cli.auth_token_ttl = Some("1h".to_string());

        // When
        let result = resolve_auth_config(&cli, &FileConfig::default());

        // Then
        assert!(result.is_err());
    }

    #[test]
    fn resolve_auth_config__should_apply_defaults_when_auth_key_present() {
        // Given
        let mut cli = base_cli();
        cli.auth_key = Some("base64-key".to_string());

        // When
        let config = resolve_auth_config(&cli, &FileConfig::default())
            .expect("resolve auth config")
            .expect("auth config");

        // Then
        assert_eq!(config.key, "base64-key");
        assert_eq!(config.token_ttl, default_auth_token_ttl());
        assert_eq!(config.cookie_name, DEFAULT_AUTH_COOKIE_NAME);
    }

    #[test]
    fn resolve_config__should_prefer_flags_over_file() {
        // Given
        let root = create_temp_root("merge");
        let path = root.join("magang.toml");
        std::fs::write(
            &path,
            r#"
listen = "0.0.0.0:8080"

[vapid]
subject = "mailto:file@sekolah.sch.id"

[auth]
key = "file-key"
token_ttl = "2h"

[notifications]
dedup_window_secs = 30
"#,
        )
        .expect("write config");
        let mut cli = base_cli();
        cli.config = Some(path);
        cli.vapid_subject = Some("mailto:flag@sekolah.sch.id".to_string());
        cli.push_ttl_secs = Some(60);

        // When
        let config = resolve_config(&cli).expect("resolve config");

        // Then
        assert_eq!(config.listen, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.vapid_subject.as_deref(), Some("mailto:flag@sekolah.sch.id"));
        assert_eq!(config.dedup_window, Duration::seconds(30));
        assert_eq!(config.push.ttl, 60);
        assert_eq!(config.push.icon, config::DEFAULT_ICON);
        let auth = config.auth.expect("auth config");
        assert_eq!(auth.key, "file-key");
        assert_eq!(auth.token_ttl, Duration::hours(2));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn resolve_config__should_reject_negative_dedup_window() {
        let mut cli = base_cli();
        cli.dedup_window_secs = Some(-5);

        assert!(matches!(resolve_config(&cli), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn cli__should_parse_watch_and_issue_token_subcommands() {
        // When
        let watch = Cli::try_parse_from(["magang-notify", "watch", "--role", "guru"])
            .expect("parse watch");
        let issue = Cli::try_parse_from([
            "magang-notify",
            "issue-token",
            "--role",
            "Siswa",
            "--subject",
            "andi",
        ])
        .expect("parse issue-token");
        let unknown = Cli::try_parse_from(["magang-notify", "watch", "--role", "admin"]);

        // Then
        match watch.command {
            Some(Command::Watch(args)) => {
                assert_eq!(args.role, Role::Guru);
                assert_eq!(args.interval, "30s");
                assert_eq!(args.server, "http://127.0.0.1:3000");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        match issue.command {
            Some(Command::IssueToken(args)) => {
                assert_eq!(args.role, Role::Siswa);
                assert_eq!(args.subject, "andi");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(unknown.is_err());
    }
}
