use anyhow::{Context, Result};
use audiopoll_core::{
    format_duration, AppConfig, Catalog, FeedbackDraft, IdentityDraft, SubmitMode,
    ValidationErrors,
};
use audiopoll_engine::{ListeningTracker, Session, SessionConfig, Stage, TrackerConfig};
use audiopoll_media::{MediaElement, PlayOutcome, SimulatedElement};
use audiopoll_relay::{build_fields, FeedbackSubmitter, FieldOptions, HttpRelay};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use url::Url;

mod commands;
mod views;

use commands::ShellCommand;

#[derive(Parser, Debug)]
#[command(
    name = "audiopoll",
    about = "Identify -> listen to a lecture -> unlock feedback -> relay it"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run,
    Catalog {
        #[arg(long)]
        json: bool,
    },
    Doctor,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.command.unwrap_or(Commands::Run);
    let cfg_path = cli.config.unwrap_or_else(default_config_path);

    match cmd {
        Commands::Config {
            action: ConfigAction::Init,
        } => {
            init_config(&cfg_path)?;
            println!("Initialized config at {}", cfg_path.display());
            Ok(())
        }
        Commands::Catalog { json } => print_catalog(json),
        Commands::Doctor => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            doctor(&cfg, &cfg_path).await
        }
        Commands::Run => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            cfg.validate(&Catalog::builtin())
                .with_context(|| format!("invalid configuration {}", cfg_path.display()))?;
            run(cfg).await
        }
    }
}

fn build_element(cfg: &AppConfig) -> Box<dyn MediaElement> {
    let element = SimulatedElement::new();
    if cfg.player.block_first_play {
        Box::new(element.block_first_play())
    } else {
        Box::new(element)
    }
}

struct Shell {
    session: Session,
    submitter: FeedbackSubmitter,
    field_opts: FieldOptions,
    skip_secs: f64,
}

enum Next {
    Continue,
    Quit,
}

async fn run(cfg: AppConfig) -> Result<()> {
    let catalog = Catalog::builtin();
    let relay = HttpRelay::from_config(&cfg.relay).context("failed to set up feedback relay")?;
    info!(
        endpoint = %relay.endpoint(),
        mode = ?cfg.relay.submit_mode,
        "feedback relay ready"
    );

    let mut shell = Shell {
        session: Session::new(
            SessionConfig::from_app_config(&cfg, &catalog),
            catalog,
            build_element(&cfg),
        ),
        submitter: FeedbackSubmitter::new(
            Arc::new(relay),
            cfg.relay.submit_mode,
            cfg.relay.confirmation_url.clone(),
        ),
        field_opts: FieldOptions {
            confirmation_url: cfg.relay.confirmation_url.clone(),
            captcha: cfg.relay.captcha,
        },
        skip_secs: cfg.player.skip_secs,
    };

    info!(backend = shell.session.media().element_name(), "audiopoll started");
    println!("{}", views::stage_prompt(shell.session.stage()));

    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.player.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            now = ticker.tick() => {
                let elapsed = now.saturating_duration_since(last_tick);
                last_tick = now;
                let out = shell.session.tick(elapsed).await;
                if out.threshold.is_some() {
                    if let Some(course) = shell.session.stage().course() {
                        println!("{}", views::feedback_unlocked(course));
                    }
                }
            }
            line = lines.next_line() => {
                match line.context("failed to read from stdin")? {
                    Some(line) => match commands::parse(&line) {
                        Ok(Some(cmd)) => {
                            if let Next::Quit = shell.handle(cmd).await {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => println!("{err}"),
                    },
                    None => {
                        info!("stdin closed; shutting down");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c; shutting down");
                break;
            }
        }
    }

    let abandoned = shell
        .submitter
        .drain(Duration::from_millis(cfg.relay.timeout_ms))
        .await;
    if abandoned > 0 {
        println!("{abandoned} avis n'ont pas pu être envoyés avant la fermeture.");
    }

    Ok(())
}

impl Shell {
    async fn handle(&mut self, cmd: ShellCommand) -> Next {
        match cmd {
            ShellCommand::Identity {
                first_name,
                last_name,
                email,
            } => self.identify(IdentityDraft {
                first_name,
                last_name,
                email,
            }),
            ShellCommand::Courses => {
                println!("{}", views::catalog(self.session.flow().catalog()))
            }
            ShellCommand::Pick { course_id } => match self.session.pick_course(&course_id) {
                Ok(stage) => {
                    println!("{}", views::full(&self.session));
                    println!("{}", views::stage_prompt(stage));
                }
                Err(err) => println!("{err}"),
            },
            ShellCommand::Play => self.play().await,
            ShellCommand::Pause => self.session.pause(),
            ShellCommand::Toggle => {
                if let Some(outcome) = self.session.toggle().await {
                    report_play(&outcome);
                }
            }
            ShellCommand::Seek { to } => {
                self.session.seek(to);
                println!("{}", views::compact(&self.session));
            }
            ShellCommand::Skip { delta } => self.skip(delta),
            ShellCommand::Forward => self.skip(self.skip_secs),
            ShellCommand::Back => self.skip(-self.skip_secs),
            ShellCommand::Rate { multiplier } => {
                if !self.session.set_rate(multiplier) {
                    println!("Vitesse invalide: {multiplier}");
                }
            }
            ShellCommand::Restart => match self.session.restart_course() {
                Ok(_) => self.play().await,
                Err(err) => println!("{err}"),
            },
            ShellCommand::Status => println!("{}", views::compact(&self.session)),
            ShellCommand::Player => println!("{}", views::full(&self.session)),
            ShellCommand::Feedback {
                rating,
                comments,
                pay,
                amount,
            } => {
                let draft = FeedbackDraft {
                    rating,
                    comments: comments.join(" "),
                    willing_to_pay: pay,
                    amount,
                };
                self.submit_feedback(draft).await
            }
            ShellCommand::Next => {
                println!("{}", views::next_courses(&self.session.next_courses()))
            }
            ShellCommand::Quit => return Next::Quit,
        }
        Next::Continue
    }

    fn identify(&mut self, draft: IdentityDraft) {
        let user = match draft.validate() {
            Ok(user) => user,
            Err(errors) => return print_field_errors(&errors),
        };
        match self.session.submit_identity(user) {
            Ok(stage) => {
                if let Stage::SelectingCourse = stage {
                    println!("{}", views::catalog(self.session.flow().catalog()));
                }
                println!("{}", views::stage_prompt(stage));
            }
            Err(err) => println!("{err}"),
        }
    }

    async fn play(&mut self) {
        let outcome = self.session.play().await;
        report_play(&outcome);
    }

    fn skip(&mut self, delta: f64) {
        self.session.skip(delta);
        println!("{}", views::compact(&self.session));
    }

    async fn submit_feedback(&mut self, draft: FeedbackDraft) {
        let Some(ctx) = self.session.feedback_context() else {
            println!("Le formulaire d'avis n'est pas encore disponible.");
            println!("{}", views::compact(&self.session));
            return;
        };
        let feedback = match draft.validate() {
            Ok(feedback) => feedback,
            Err(errors) => {
                print_field_errors(&errors);
                return;
            }
        };

        let fields = build_fields(&ctx, &feedback, &self.field_opts, chrono::Utc::now());
        match self.submitter.submit(fields).await {
            Ok(redirect) => {
                if let Err(err) = self.session.record_submission() {
                    warn!(error = %err, "submission recorded outside of the feedback stage");
                }
                info!(course = ctx.course.id, rating = feedback.rating, "feedback submitted");
                println!("{}", views::CONFIRMATION);
                println!("-> {}", redirect.destination);
                println!("{}", views::next_courses(&self.session.next_courses()));
            }
            Err(err) => {
                error!(error = %err, "feedback submission failed");
                println!("L'envoi a échoué ({err}). Vous pouvez réessayer.");
            }
        }
    }
}

fn report_play(outcome: &PlayOutcome) {
    match outcome {
        PlayOutcome::Started | PlayOutcome::AlreadyPlaying => {}
        PlayOutcome::NoSource => println!("Aucun cours chargé (pick <ID>)."),
        PlayOutcome::Blocked(reason) => {
            println!("La lecture n'a pas pu démarrer ({reason}). Réessayez avec play.")
        }
    }
}

fn print_field_errors(errors: &ValidationErrors) {
    for err in &errors.errors {
        println!("  {}: {}", err.field, err.message);
    }
}

fn print_catalog(json: bool) -> Result<()> {
    let catalog = Catalog::builtin();
    if json {
        let out = serde_json::to_string_pretty(catalog.courses())
            .context("failed to serialize catalog")?;
        println!("{out}");
    } else {
        println!("{}", views::catalog(&catalog));
    }
    Ok(())
}

async fn doctor(cfg: &AppConfig, cfg_path: &Path) -> Result<()> {
    println!("== audiopoll doctor ==");
    println!(
        "Config: {} ({})",
        cfg_path.display(),
        if cfg_path.exists() { "found" } else { "defaults" }
    );

    let catalog = Catalog::builtin();
    match cfg.validate(&catalog) {
        Ok(()) => println!("Config valid"),
        Err(err) => println!("Config invalid: {err}"),
    }

    println!("Relay endpoint: {}", cfg.relay.endpoint);
    println!(
        "Submit mode: {}",
        match cfg.relay.submit_mode {
            SubmitMode::AwaitAck => "await acknowledgement",
            SubmitMode::FireAndForget => "fire and forget",
        }
    );
    match relay_reachable(&cfg.relay.endpoint).await {
        Ok(true) => println!("Relay host: reachable"),
        Ok(false) => println!("Relay host: not reachable"),
        Err(err) => println!("Relay host: {err}"),
    }

    let tracker = ListeningTracker::new(TrackerConfig::from_app_config(cfg));
    println!("Courses:");
    for course in catalog.courses() {
        let required = tracker
            .required_for(f64::from(course.duration_seconds))
            .unwrap_or(0);
        println!(
            "  {:<6} {}  feedback after {}",
            course.id,
            format_duration(course.duration_seconds),
            format_duration(required),
        );
    }
    if let Some(id) = &cfg.flow.fixed_course {
        println!("Fixed course: {id}");
    }

    Ok(())
}

async fn relay_reachable(endpoint: &str) -> Result<bool> {
    let url = Url::parse(endpoint).with_context(|| format!("invalid endpoint {endpoint}"))?;
    let host = url
        .host_str()
        .with_context(|| format!("endpoint {endpoint} has no host"))?;
    let port = url
        .port_or_known_default()
        .with_context(|| format!("endpoint {endpoint} has no port"))?;
    let addr = format!("{host}:{port}");
    Ok(
        tokio::time::timeout(Duration::from_secs(2), tokio::net::TcpStream::connect(addr))
            .await
            .ok()
            .and_then(Result::ok)
            .is_some(),
    )
}

fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("audiopoll").join("config.toml")
}

fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let toml = AppConfig::default().to_toml()?;
    std::fs::write(path, toml)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

fn load_or_default(path: &Path) -> Result<AppConfig> {
    let mut cfg = if !path.exists() {
        AppConfig::default()
    } else {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        AppConfig::from_toml(&data).with_context(|| format!("failed to parse {}", path.display()))?
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("AUDIOPOLL_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.log_level = v;
        }
    }
    if let Ok(v) = std::env::var("AUDIOPOLL_RELAY_ENDPOINT") {
        if !v.trim().is_empty() {
            cfg.relay.endpoint = v;
        }
    }
    if let Ok(v) = std::env::var("AUDIOPOLL_SUBMIT_MODE") {
        match SubmitMode::parse(&v) {
            Some(mode) => cfg.relay.submit_mode = mode,
            None => eprintln!(
                "ignoring AUDIOPOLL_SUBMIT_MODE={v}: expected await_ack or fire_and_forget"
            ),
        }
    }
    if let Ok(v) = std::env::var("AUDIOPOLL_COURSE") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.flow.fixed_course = Some(v.to_string());
        }
    }
}
