use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use console_core::{
    views::{self, HistoryFilter},
    AlertMonitor, AlertSink, ConsoleEvent, ConsoleState, SubscriptionManager,
};
use incident_api::{ApiContext, Confirm, ConfirmedTransition, Escalation, PreConfirmed, Transition};
use serde::Serialize;
use shared::{
    domain::{DocumentPath, Incident, IncidentId, IncidentPriority, LogMessage, OperatorId, UnitType},
    error::{ApiError, ApiException},
    protocol::Snapshot,
};
use storage::{RecordStore, Storage};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod seed;

#[derive(Parser, Debug)]
#[command(name = "dispatch-console", about = "Emergency dispatch operator console")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    operator: Option<String>,
    /// Print operation outcomes as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load demo signals into an empty store.
    Seed,
    /// Live incidents.
    List {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Resolved and cancelled incidents, newest first.
    History {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<IncidentPriority>,
    },
    Show {
        incident: String,
    },
    Dispatch {
        incident: String,
        #[arg(value_parser = parse_unit)]
        unit: UnitType,
    },
    Escalate {
        incident: String,
    },
    Resolve {
        incident: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    FalseAlarm {
        incident: String,
        #[arg(long)]
        yes: bool,
    },
    /// Append an operator transmission to the incident log.
    Message {
        incident: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Show or change operator settings.
    Settings {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        audio_alerts: Option<bool>,
        #[arg(long)]
        real_time_feed: Option<bool>,
        #[arg(long)]
        ai_dispatch: Option<bool>,
    },
    /// Follow the live feed and sound alerts for new high-severity signals.
    Watch,
}

fn parse_priority(raw: &str) -> Result<IncidentPriority, String> {
    IncidentPriority::parse(raw).ok_or_else(|| format!("unknown priority '{raw}'"))
}

fn parse_unit(raw: &str) -> Result<UnitType, String> {
    UnitType::parse(raw).ok_or_else(|| format!("unknown unit type '{raw}' (police, medical, fire)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = config::load_settings(&cli.config)?;
    if let Some(database_url) = cli.database_url.clone() {
        settings.database_url = database_url;
    }
    if let Some(operator) = cli.operator.clone() {
        settings.operator_id = operator;
    }

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let database_url = config::normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(%database_url, %error, "failed to open record store");
        error
    })?;
    info!(%database_url, "record store ready");

    let console = Console {
        ctx: ApiContext::new(Arc::new(storage)),
        operator: OperatorId(settings.operator_id),
        json: cli.json,
    };

    match console.run(cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            match err.downcast_ref::<ApiException>() {
                Some(api) => eprintln!("{}", ApiError::new(api.code, api.message.clone()).operator_message()),
                None => eprintln!("error: {err:#}"),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn api<T>(result: Result<T, ApiError>) -> anyhow::Result<T> {
    result.map_err(|err| ApiException::from(err).into())
}

struct Console {
    ctx: ApiContext,
    operator: OperatorId,
    json: bool,
}

impl Console {
    fn store(&self) -> Arc<dyn RecordStore> {
        self.ctx.store.clone()
    }

    async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Seed => {
                let created = seed::seed_demo_incidents(self.ctx.store.as_ref()).await?;
                if created.is_empty() {
                    println!("store already holds incidents; nothing seeded");
                } else {
                    println!("seeded {} incidents", created.len());
                }
            }
            Command::List { search } => {
                let incidents = api(incident_api::list_incidents(&self.ctx).await)?;
                let feed = views::active_feed(&incidents, &search);
                if feed.is_empty() {
                    println!("no active signals");
                }
                for incident in feed {
                    println!("{}", incident_line(incident));
                }
            }
            Command::History { search, priority } => {
                let incidents = api(incident_api::list_incidents(&self.ctx).await)?;
                let filter = HistoryFilter {
                    query: search,
                    priority,
                };
                for incident in views::history(&incidents, &filter) {
                    let closed = incident
                        .date
                        .map(|date| date.to_string())
                        .unwrap_or_else(|| "-".into());
                    println!("{closed}  {}", incident_line(incident));
                }
            }
            Command::Show { incident } => {
                let id = self.resolve_id(&incident).await?;
                let incident = api(incident_api::get_incident(&self.ctx, &id).await)?;
                let logs = api(incident_api::list_logs(&self.ctx, &id).await)?;
                print_incident(&incident, &logs);
            }
            Command::Dispatch { incident, unit } => {
                let id = self.resolve_id(&incident).await?;
                let transition = api(incident_api::dispatch(&self.ctx, &id, unit).await)?;
                self.report(&transition, || print_transition(&transition))?;
            }
            Command::Escalate { incident } => {
                let id = self.resolve_id(&incident).await?;
                let outcome = api(incident_api::escalate(&self.ctx, &id).await)?;
                self.report(&outcome, || match &outcome {
                    Escalation::Escalated { from, transition } => {
                        println!("escalated {from} -> {}", transition.incident.priority);
                        print_transition(transition);
                    }
                    Escalation::AlreadyCritical => println!("already at Critical; nothing to do"),
                })?;
            }
            Command::Resolve { incident, yes } => {
                let id = self.resolve_id(&incident).await?;
                let outcome =
                    api(incident_api::resolve(&self.ctx, &id, confirmer(yes)).await)?;
                self.report(&outcome, || print_confirmed(&outcome))?;
            }
            Command::FalseAlarm { incident, yes } => {
                let id = self.resolve_id(&incident).await?;
                let outcome =
                    api(incident_api::mark_false_alarm(&self.ctx, &id, confirmer(yes)).await)?;
                self.report(&outcome, || print_confirmed(&outcome))?;
            }
            Command::Message { incident, text } => {
                let id = self.resolve_id(&incident).await?;
                let text = text.join(" ");
                match api(incident_api::append_operator_message(&self.ctx, &id, &text).await)? {
                    Some(log) => self.report(&log, || println!("{}", log_line(&log)))?,
                    None => println!("empty message; nothing sent"),
                }
            }
            Command::Settings {
                display_name,
                audio_alerts,
                real_time_feed,
                ai_dispatch,
            } => {
                let store = self.store();
                let mut settings =
                    console_core::load_or_init_settings(store.as_ref(), &self.operator).await?;
                let changed = display_name.is_some()
                    || audio_alerts.is_some()
                    || real_time_feed.is_some()
                    || ai_dispatch.is_some();
                if let Some(v) = display_name {
                    settings.display_name = v;
                }
                if let Some(v) = audio_alerts {
                    settings.audio_alerts = v;
                }
                if let Some(v) = real_time_feed {
                    settings.real_time_feed = v;
                }
                if let Some(v) = ai_dispatch {
                    settings.ai_dispatch = v;
                }
                if changed {
                    console_core::save_settings(store.as_ref(), &self.operator, &settings).await?;
                    info!(operator_id = %self.operator, "operator settings saved");
                }
                println!(
                    "{}",
                    serde_json::to_string_pretty(&settings).context("failed to render settings")?
                );
            }
            Command::Watch => self.watch().await?,
        }
        Ok(())
    }

    /// Accepts a store id or the signal number shown in titles ("4092").
    async fn resolve_id(&self, raw: &str) -> anyhow::Result<IncidentId> {
        let raw = raw.trim().trim_start_matches('#');
        let incidents = api(incident_api::list_incidents(&self.ctx).await)?;
        let signal_title = format!("Signal #{raw}");
        let found = incidents
            .iter()
            .find(|incident| incident.id.as_str() == raw)
            .or_else(|| incidents.iter().find(|incident| incident.title == signal_title));
        Ok(found
            .map(|incident| incident.id.clone())
            .unwrap_or_else(|| IncidentId::from(raw)))
    }

    fn report<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> anyhow::Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("failed to render outcome")?
            );
        } else {
            human();
        }
        Ok(())
    }

    async fn watch(&self) -> anyhow::Result<()> {
        let store = self.store();
        let settings = console_core::load_or_init_settings(store.as_ref(), &self.operator).await?;

        let manager = SubscriptionManager::new(store);
        let mut events = manager.subscribe_events();
        let monitor = AlertMonitor::spawn(
            manager.subscribe_events(),
            Arc::new(TerminalAlert),
            settings.audio_alerts,
        );
        manager.watch(DocumentPath::Incidents);
        manager.watch(DocumentPath::OperatorSettings(self.operator.clone()));

        println!(
            "{} ({}) on duty; watching the live feed, ctrl-c to stop",
            settings.display_name, settings.operator_id
        );

        let mut state = ConsoleState::new();
        let mut followed: Option<IncidentId> = None;
        loop {
            let event = tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(ConsoleEvent::Snapshot {
                    snapshot: Snapshot::Incidents(incidents),
                    ..
                }) => {
                    state.apply_incidents(incidents);
                    print_feed(&state);

                    let selected = state.selected_id().cloned();
                    if selected != followed {
                        if let Some(previous) = followed.take() {
                            manager.unwatch(&DocumentPath::IncidentLogs(previous)).await;
                        }
                        if let Some(id) = &selected {
                            manager.watch(DocumentPath::IncidentLogs(id.clone()));
                        }
                        followed = selected;
                    }
                }
                Ok(ConsoleEvent::Snapshot {
                    snapshot: Snapshot::Logs(logs),
                    path: DocumentPath::IncidentLogs(id),
                }) => {
                    if followed.as_ref() == Some(&id) {
                        if let Some(last) = logs.last() {
                            println!("  {}", log_line(last));
                        }
                    }
                }
                Ok(ConsoleEvent::Snapshot { .. }) => {}
                Ok(ConsoleEvent::SubscriptionError { path, message }) => {
                    eprintln!("feed {path} unavailable, retrying on next change: {message}");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "console fell behind the live feed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        monitor.stop();
        manager.teardown().await;
        println!("signed off");
        Ok(())
    }
}

fn confirmer(preconfirmed: bool) -> &'static dyn Confirm {
    if preconfirmed {
        &PreConfirmed
    } else {
        &StdinConfirm
    }
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

struct TerminalAlert;

impl AlertSink for TerminalAlert {
    fn alert(&self, incidents: &[Incident]) {
        for incident in incidents {
            warn!(incident_id = %incident.id, priority = %incident.priority, "high-severity signal");
            println!("\x07*** {} ***", incident_line(incident));
        }
    }
}

fn incident_line(incident: &Incident) -> String {
    format!(
        "{} {:<14} {:<8} {:<10} {} @ {}  [{}]",
        views::priority_marker(incident.priority),
        incident.title,
        incident.priority,
        incident.status,
        incident.kind,
        incident.location,
        incident.id
    )
}

fn log_line(log: &LogMessage) -> String {
    format!(
        "{} {} {}",
        log.timestamp.format("%H:%M:%S"),
        views::sender_tag(log.sender),
        log.content
    )
}

fn print_feed(state: &ConsoleState) {
    let feed = views::active_feed(state.incidents(), "");
    println!("-- {} active signals --", feed.len());
    for incident in feed {
        let cursor = if state.selected_id() == Some(&incident.id) { ">" } else { " " };
        println!("{cursor}{}", incident_line(incident));
    }
}

fn print_incident(incident: &Incident, logs: &[LogMessage]) {
    println!("{}", incident_line(incident));
    println!("  sector:  {}", incident.sector);
    if let Some(date) = incident.date {
        println!("  closed:  {date}");
    }
    let subject = &incident.subject;
    println!(
        "  subject: {} ({}, {}), blood {}, phone {}",
        subject.name, subject.age, subject.gender, subject.blood_type, subject.phone
    );
    if !subject.conditions.is_empty() {
        println!("  conditions: {}", subject.conditions.join(", "));
    }
    println!("  emergency contact: {}", subject.emergency_contact);
    println!("  -- transmissions --");
    for log in logs {
        println!("  {}", log_line(log));
    }
}

fn print_transition(transition: &Transition) {
    println!("{}", incident_line(&transition.incident));
    println!("  {}", log_line(&transition.log));
}

fn print_confirmed(outcome: &ConfirmedTransition) {
    match outcome {
        ConfirmedTransition::Applied(transition) => print_transition(transition),
        ConfirmedTransition::Declined => println!("cancelled; nothing changed"),
    }
}
