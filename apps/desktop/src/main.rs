mod config;
mod render;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    ClientError, InterviewStore, JobSiftClient, RestoreOutcome, Route,
};
use config::{load_settings, normalize_database_url, DEFAULT_CONFIG_FILE};
use serde::Serialize;
use shared::{
    domain::{ApplicationStatus, InterviewId, WorkMode},
    protocol::{InterviewCreate, InterviewFilters, InterviewUpdate},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jobsift", about = "Track job applications against a JobSift backend")]
struct Args {
    /// Backend API base, e.g. http://localhost:8000/api/v1
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Print raw JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        full_name: String,
    },
    Logout,
    Whoami {
        /// Re-fetch the user from the backend.
        #[arg(long)]
        refresh: bool,
    },
    Dashboard,
    #[command(subcommand)]
    Interviews(InterviewCommand),
    Metadata,
}

#[derive(Subcommand, Debug)]
enum InterviewCommand {
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        status: Option<ApplicationStatus>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        from_date: Option<NaiveDate>,
        #[arg(long)]
        to_date: Option<NaiveDate>,
    },
    Show {
        id: InterviewId,
    },
    Create {
        #[arg(long)]
        company: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        work_mode: WorkMode,
        #[command(flatten)]
        details: DetailArgs,
    },
    Update {
        id: InterviewId,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        work_mode: Option<WorkMode>,
        #[command(flatten)]
        details: DetailArgs,
    },
    Delete {
        id: InterviewId,
    },
}

#[derive(ClapArgs, Debug)]
struct DetailArgs {
    #[arg(long)]
    status: Option<ApplicationStatus>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    next_milestone: Option<String>,
    #[arg(long)]
    contact_name: Option<String>,
    #[arg(long)]
    contact_email: Option<String>,
    #[arg(long)]
    contact_phone: Option<String>,
    #[arg(long)]
    salary_min: Option<f64>,
    #[arg(long)]
    salary_max: Option<f64>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    travel: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    /// RFC 3339 or naive ISO 8601 (UTC).
    #[arg(long, value_parser = parse_timestamp)]
    date: Option<DateTime<Utc>>,
}

impl DetailArgs {
    fn into_create(self, company: String, role: String, work_mode: WorkMode) -> InterviewCreate {
        InterviewCreate {
            company_description: self.description,
            application_status: self.status,
            location: self.location,
            next_milestone: self.next_milestone,
            contact_name: self.contact_name,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            salary_range_min: self.salary_min,
            salary_range_max: self.salary_max,
            currency: self.currency,
            language: self.language,
            travel_requirements: self.travel,
            notes: self.notes,
            interview_date: self.date,
            ..InterviewCreate::new(company, role, work_mode)
        }
    }

    fn into_update(
        self,
        company: Option<String>,
        role: Option<String>,
        work_mode: Option<WorkMode>,
    ) -> InterviewUpdate {
        InterviewUpdate {
            company_name: company,
            company_description: self.description,
            role_title: role,
            work_mode,
            application_status: self.status,
            location: self.location,
            next_milestone: self.next_milestone,
            contact_name: self.contact_name,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            salary_range_min: self.salary_min,
            salary_range_max: self.salary_max,
            currency: self.currency,
            language: self.language,
            travel_requirements: self.travel,
            notes: self.notes,
            interview_date: self.date,
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    shared::protocol::timestamp::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not an ISO 8601 timestamp"))
}

impl Command {
    /// The view a command stands in for; `None` when it is not guarded.
    fn route(&self) -> Option<Route> {
        match self {
            Command::Login { .. } => Some(Route::Login),
            Command::Register { .. } => Some(Route::Register),
            Command::Logout => None,
            Command::Whoami { .. } | Command::Dashboard => Some(Route::Dashboard),
            Command::Metadata => Some(Route::NewInterview),
            Command::Interviews(command) => Some(match command {
                InterviewCommand::List { .. } => Route::Interviews,
                InterviewCommand::Create { .. } => Route::NewInterview,
                InterviewCommand::Show { id }
                | InterviewCommand::Update { id, .. }
                | InterviewCommand::Delete { id } => Route::InterviewDetails(*id),
            }),
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let mut settings = load_settings(&args.config)?;
    if let Some(api_url) = args.api_url {
        settings.api_base_url = api_url;
    }
    if let Some(database_url) = args.database_url.as_deref() {
        settings.database_url = normalize_database_url(database_url);
    }
    debug!(
        api_base_url = %settings.api_base_url,
        database_url = %settings.database_url,
        page_size = settings.page_size,
        "jobsift: settings loaded"
    );

    let client = JobSiftClient::open(&settings.client_config(), &settings.database_url).await?;

    match client.start().await {
        RestoreOutcome::CredentialDiscarded { reason } => {
            warn!(%reason, "jobsift: stored session expired; sign in again");
        }
        outcome => debug!(?outcome, "jobsift: session restored"),
    }

    if let Some(route) = args.command.route() {
        let navigation = client.navigate(&route.path()).await;
        if navigation.redirected {
            eprintln!(
                "{} is not available here; redirected to {}",
                navigation.requested, navigation.rendered
            );
            if navigation.rendered == Route::Login {
                eprintln!("sign in with `jobsift login --email <EMAIL> --password <PASSWORD>`");
            }
            return Ok(ExitCode::from(2));
        }
    }

    run(&client, args.command, args.json).await?;
    Ok(ExitCode::SUCCESS)
}

async fn run(client: &JobSiftClient, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = client.session.login(&email, &password).await?;
            info!(email = %user.email, "jobsift: signed in");
            emit(json, &user, || render::user(&user))
        }
        Command::Register {
            email,
            password,
            full_name,
        } => {
            let user = client
                .session
                .register(&email, &password, &full_name)
                .await?;
            // Registration returns no credential; exchange the password for one.
            client
                .session
                .login(&email, &password)
                .await
                .context("registered, but signing in afterwards failed")?;
            emit(json, &user, || render::user(&user))
        }
        Command::Logout => {
            client.session.logout().await;
            println!("Signed out.");
            Ok(())
        }
        Command::Whoami { refresh } => {
            let user = if refresh {
                client.session.refresh_user().await?
            } else {
                client
                    .session
                    .current_user()
                    .await
                    .context("no signed-in user")?
            };
            emit(json, &user, || render::user(&user))
        }
        Command::Dashboard => {
            let summary = surface(
                &client.interviews,
                client.interviews.fetch_dashboard_summary().await,
            )
            .await?;
            emit(json, &summary, || render::dashboard(&summary))
        }
        Command::Metadata => {
            let metadata =
                surface(&client.interviews, client.interviews.fetch_metadata().await).await?;
            emit(json, &metadata, || render::metadata(&metadata))
        }
        Command::Interviews(command) => run_interviews(&client.interviews, command, json).await,
    }
}

async fn run_interviews(
    store: &InterviewStore,
    command: InterviewCommand,
    json: bool,
) -> Result<()> {
    match command {
        InterviewCommand::List {
            page,
            status,
            company,
            from_date,
            to_date,
        } => {
            let filters = InterviewFilters {
                status,
                company,
                from_date,
                to_date,
            };
            let interviews = surface(store, store.fetch_interviews(page, Some(filters)).await).await?;
            let state = store.snapshot().await;
            emit(json, &interviews, || render::interview_list(&state))
        }
        InterviewCommand::Show { id } => {
            let interview = surface(store, store.fetch_interview(id).await).await?;
            emit(json, &interview, || render::interview(&interview))
        }
        InterviewCommand::Create {
            company,
            role,
            work_mode,
            details,
        } => {
            let data = details.into_create(company, role, work_mode);
            let interview = surface(store, store.create_interview(data).await).await?;
            info!(interview_id = %interview.id, "jobsift: interview created");
            emit(json, &interview, || render::interview(&interview))
        }
        InterviewCommand::Update {
            id,
            company,
            role,
            work_mode,
            details,
        } => {
            let data = details.into_update(company, role, work_mode);
            if data.is_empty() {
                anyhow::bail!("nothing to update; pass at least one field");
            }
            let interview = surface(store, store.update_interview(id, data).await).await?;
            emit(json, &interview, || render::interview(&interview))
        }
        InterviewCommand::Delete { id } => {
            surface(store, store.delete_interview(id).await).await?;
            println!("Deleted interview {id}.");
            Ok(())
        }
    }
}

/// Attaches the store's user-facing message to a failed operation.
async fn surface<T>(store: &InterviewStore, result: Result<T, ClientError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let message = store
                .snapshot()
                .await
                .error
                .unwrap_or_else(|| err.to_string());
            Err(anyhow::Error::new(err).context(message))
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
