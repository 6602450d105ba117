//! parkdesk - operator console for a parking facility
//!
//! This is the main entry point. It wires together:
//! - Configuration loading
//! - The local ledger store
//! - The GraphQL backend
//! - The core console (monitor, dashboard, exits, entries)

mod render;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parkdesk_api::{HistoryQuery, VehicleType, format_amount};
use parkdesk_backend::ParkingBackend;
use parkdesk_config::{Settings, load_config, load_config_or_default, validate_endpoint};
use parkdesk_core::{Console, CoreEvent, EntryRequest, RefreshOutcome, RefreshSource};
use parkdesk_graphql::GraphQlBackend;
use parkdesk_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use parkdesk_util::{
    ChargeId, STORE_FILENAME, SessionId, default_config_path, is_mock_time_active,
    parse_local_datetime,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// parkdesk - Operator console for a parking facility
#[derive(Parser, Debug)]
#[command(name = "parkdesk")]
#[command(about = "Operator console for a parking facility", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/parkdesk/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// GraphQL endpoint override (or set PARKDESK_ENDPOINT env var)
    #[arg(short, long, env = "PARKDESK_ENDPOINT")]
    endpoint: Option<String>,

    /// Data directory override (or set PARKDESK_DATA_DIR env var)
    #[arg(short, long, env = "PARKDESK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live view of parked vehicles and today's figures
    Monitor {
        /// Only show sessions whose phone or plate contains this
        #[arg(short, long, default_value = "")]
        filter: String,
    },

    /// Log a vehicle entry and collect the base fee
    Entry {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        plate: String,
        #[arg(long = "type", default_value = "car")]
        vehicle_type: String,
    },

    /// Show the entry fee for a vehicle class
    Fee {
        #[arg(default_value = "car")]
        vehicle_type: String,
    },

    /// Quote and process a vehicle exit
    Exit {
        session_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Today's figures
    Stats,

    /// Past transactions
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = parkdesk_api::DEFAULT_PAGE_SIZE)]
        page_size: u32,
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "type")]
        vehicle_type: Option<String>,
        /// Local date or date-time, e.g. 2025-01-15 or "2025-01-15 08:00:00"
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },

    /// Overstay charges still owed after exit
    Reconcile {
        /// Retry collection of this charge
        #[arg(long)]
        collect: Option<String>,
    },
}

/// Console plus the settings it was built from
struct App {
    console: Arc<Console>,
    settings: Settings,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let mut settings = if args.config == default_config_path() {
            load_config_or_default(&args.config)
        } else {
            load_config(&args.config)
        }
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        if let Some(endpoint) = &args.endpoint {
            validate_endpoint(endpoint)
                .map_err(|e| anyhow::anyhow!("Invalid endpoint {endpoint:?}: {e}"))?;
            settings.service.endpoint = endpoint.clone();
        }
        if let Some(data_dir) = &args.data_dir {
            settings.service.data_dir = data_dir.clone();
        }

        info!(
            config_path = %args.config.display(),
            endpoint = %settings.service.endpoint,
            capacity = settings.facility.capacity,
            "Configuration loaded"
        );

        let data_dir = &settings.service.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(STORE_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        debug!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ConfigLoaded {
            endpoint: settings.service.endpoint.clone(),
            capacity: settings.facility.capacity,
        }))?;

        let token = settings.service.auth_token();
        if token.is_none() {
            warn!(
                env = %settings.service.auth_token_env,
                "No auth token set, requests will be unauthenticated"
            );
        }

        let backend: Arc<dyn ParkingBackend> = Arc::new(GraphQlBackend::new(
            settings.service.endpoint.clone(),
            token,
            settings.service.request_timeout,
        )?);

        if is_mock_time_active() {
            warn!("Mock time is active, quotes use the shifted clock");
        }

        Ok(Self {
            console: Arc::new(Console::new(backend, store, &settings.facility)),
            settings,
        })
    }

    fn symbol(&self) -> &str {
        &self.settings.display.currency_symbol
    }

    async fn run(self, command: Command) -> Result<()> {
        match command {
            Command::Monitor { filter } => self.monitor(filter).await,
            Command::Entry {
                phone,
                plate,
                vehicle_type,
            } => self.entry(phone, plate, vehicle_type).await,
            Command::Fee { vehicle_type } => self.fee(vehicle_type).await,
            Command::Exit { session_id, yes } => self.exit(session_id, yes).await,
            Command::Stats => self.stats().await,
            Command::History {
                page,
                page_size,
                status,
                vehicle_type,
                from,
                to,
                search,
            } => {
                let query = HistoryQuery {
                    page,
                    page_size,
                    status,
                    vehicle_type: vehicle_type.as_deref().map(VehicleType::parse),
                    start_date: from.as_deref().map(parse_local_datetime).transpose()?,
                    end_date: to.as_deref().map(parse_local_datetime).transpose()?,
                    search,
                };
                self.history(query).await
            }
            Command::Reconcile { collect } => self.reconcile(collect).await,
        }
    }

    async fn monitor(self, mut filter: String) -> Result<()> {
        let console = self.console.clone();
        let store = console.store().clone();
        store.append_audit(AuditEvent::new(AuditEventType::ConsoleStarted))?;

        let mut events = console.subscribe();
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        // Independent cycles; a slow dashboard never delays the session list
        let mut session_timer = tokio::time::interval(self.settings.facility.session_refresh);
        session_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut dashboard_timer = tokio::time::interval(self.settings.facility.dashboard_refresh);
        dashboard_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Monitor running");
        println!("Enter: refresh now | f <text>: filter | f: clear filter | q: quit");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down");
                    break;
                }

                // Refreshes run as their own tasks; a superseded one finishes
                // and is discarded as stale
                _ = session_timer.tick() => {
                    let console = console.clone();
                    tokio::spawn(async move {
                        console.refresh_sessions().await;
                    });
                }
                _ = dashboard_timer.tick() => {
                    let console = console.clone();
                    tokio::spawn(async move {
                        console.refresh_dashboard().await;
                    });
                }

                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        match line {
                            "" => {
                                let console = console.clone();
                                tokio::spawn(async move {
                                    console.refresh_all().await;
                                });
                            }
                            "q" | "quit" => break,
                            "f" => {
                                filter.clear();
                                self.print_sessions(&filter).await;
                            }
                            _ if line.starts_with("f ") => {
                                filter = line[2..].trim().to_string();
                                self.print_sessions(&filter).await;
                            }
                            other => println!("Unknown input {other:?}"),
                        }
                    }
                    Ok(None) => {
                        debug!("Stdin closed, manual refresh disabled");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        stdin_open = false;
                    }
                },

                Ok(event) = events.recv() => match event {
                    CoreEvent::Refreshed { source: RefreshSource::Sessions, .. } => {
                        self.print_sessions(&filter).await;
                    }
                    CoreEvent::Refreshed { source: RefreshSource::Dashboard, .. } => {
                        self.print_dashboard().await;
                    }
                    CoreEvent::RefreshFailed { source, error } => {
                        println!("! {source:?} refresh failed: {error} (showing previous data)");
                    }
                    other => debug!(?other, "Console event"),
                },
            }
        }

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ConsoleStopped)) {
            warn!(error = %e, "Failed to log console shutdown");
        }
        info!("Monitor stopped");
        Ok(())
    }

    async fn print_sessions(&self, filter: &str) {
        let views = self
            .console
            .visible_sessions(filter, parkdesk_util::now())
            .await;
        print!("{}", render::session_table(&views, filter));
        println!(
            "{}",
            render::refresh_footer("Sessions", &self.console.sessions_status().await)
        );
    }

    async fn print_dashboard(&self) {
        if let Some(summary) = self.console.dashboard_summary().await {
            print!("{}", render::dashboard_panel(&summary, self.symbol()));
        }
        println!(
            "{}",
            render::refresh_footer("Dashboard", &self.console.dashboard_status().await)
        );
    }

    async fn entry(self, phone: String, plate: String, vehicle_type: String) -> Result<()> {
        let request = EntryRequest::new(phone, plate, VehicleType::parse(&vehicle_type));
        let receipt = self.console.log_entry(&request).await?;

        println!(
            "Entry logged: session {} for {}",
            receipt.session_id,
            receipt.vehicle_number.as_deref().unwrap_or("-")
        );
        println!(
            "Base fee collected: {}",
            format_amount(self.symbol(), receipt.base_fee_paid)
        );
        Ok(())
    }

    async fn fee(self, vehicle_type: String) -> Result<()> {
        let vehicle_type = VehicleType::parse(&vehicle_type);
        let fee = self.console.entry_fee(&vehicle_type).await?;
        println!(
            "{}: {} for the first {}h",
            vehicle_type,
            format_amount(self.symbol(), fee.base_fee),
            fee.base_hours
        );
        Ok(())
    }

    async fn exit(self, session_id: String, yes: bool) -> Result<()> {
        if let RefreshOutcome::Failed { error } = self.console.refresh_sessions().await {
            bail!("Could not load active sessions: {error}");
        }

        let session_id = SessionId::new(session_id);
        let quote = self
            .console
            .open_exit(&session_id, parkdesk_util::now())
            .await?;
        print!("{}", render::quote_panel(&quote, self.symbol()));

        if !yes && !confirm("Process exit?")? {
            println!("Cancelled.");
            return Ok(());
        }

        let tx = self.console.confirm_exit(quote).await?;
        print!("{}", render::exit_result(&tx, self.symbol()));
        Ok(())
    }

    async fn stats(self) -> Result<()> {
        if let RefreshOutcome::Failed { error } = self.console.refresh_dashboard().await {
            bail!("Failed to load stats: {error}");
        }
        self.print_dashboard().await;
        Ok(())
    }

    async fn history(self, query: HistoryQuery) -> Result<()> {
        let page = self.console.history(&query).await?;
        print!(
            "{}",
            render::history_table(&page, query.page, query.page_size, self.symbol())
        );
        Ok(())
    }

    async fn reconcile(self, collect: Option<String>) -> Result<()> {
        if let Some(charge_id) = collect {
            let charge_id = ChargeId::new(charge_id);
            self.console.collect_outstanding(&charge_id).await?;
            println!("Charge {charge_id} collected and settled.");
        }

        let charges = self.console.unsettled_charges()?;
        print!("{}", render::ledger_table(&charges, self.symbol()));
        Ok(())
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "parkdesk starting");

    let app = App::new(&args)?;
    app.run(args.command).await
}
