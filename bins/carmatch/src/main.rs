//! CarMatch command line binary
//!
//! Initializes and validates configuration, and runs the match notification
//! flows against a marketplace store so they can be exercised end to end.

use anyhow::{Context, Result};
use cli::{Cli, Commands, RunArgs, VehicleTypeArg};
use common::types::UserIdentity;
use config::{generate_default_config, load_config, save_config, validate_config, CarMatchConfig};
use matching_engine::handoff::{listing_match_message, requirement_match_message, whatsapp_link};
use matching_engine::{
    create_profile_store, create_store_from_config, FlowState, MarketplaceStore, MatchingEngine,
    MatchNotificationFlow, Matches, PageContext, PendingMatchPersistence, Requirement,
    RequirementCriteria, RequirementPostOutcome, SessionTracker, VehicleCriteria, VehicleListing,
    VehicleType,
};
use observability::{init_logging_with_default, init_metrics, LogFormat, DEFAULT_DIRECTIVE};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Marketplace fixtures loaded with `--seed`
#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    listings: Vec<VehicleListing>,
    #[serde(default)]
    requirements: Vec<Requirement>,
    /// Phone numbers by user id, for the WhatsApp handoff
    #[serde(default)]
    contacts: HashMap<String, String>,
}

/// Everything a matching command needs
struct Runtime {
    config: CarMatchConfig,
    store: Arc<dyn MarketplaceStore>,
    persistence: PendingMatchPersistence,
    user: UserIdentity,
    contacts: HashMap<String, String>,
}

impl Runtime {
    fn flow(&self, context: PageContext) -> MatchNotificationFlow {
        MatchNotificationFlow::new(
            context,
            MatchingEngine::new(self.store.clone()),
            self.persistence.clone(),
            SessionTracker::new(),
            self.config.recheck_delay(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let (format, level) = logging_for(&cli.command);
    init_logging_with_default("carmatch", format, &level)?;
    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Commands::Init { output } => {
            info!("Executing 'init' command");
            init_command(output)
        }
        Commands::Validate { config } => {
            info!("Executing 'validate' command");
            validate_command(config)
        }
        Commands::MatchVehicle {
            env,
            vehicle_type,
            make,
            model,
            year,
            dont_show_again,
        } => {
            info!("Executing 'match-vehicle' command");
            let runtime = prepare(&env).await?;
            let vehicle = VehicleCriteria::new(vehicle_type_of(vehicle_type), make, model, year);
            match_vehicle_command(&runtime, vehicle, dont_show_again).await
        }
        Commands::MatchRequirement {
            env,
            vehicle_type,
            make,
            model,
            year_min,
            year_max,
        } => {
            info!("Executing 'match-requirement' command");
            let runtime = prepare(&env).await?;
            let requirement = RequirementCriteria {
                vehicle_type: vehicle_type_of(vehicle_type),
                make,
                model,
                year_range_min: year_min,
                year_range_max: year_max,
            };
            match_requirement_command(&runtime, requirement).await
        }
        Commands::Recheck { env, now } => {
            info!("Executing 'recheck' command");
            let runtime = prepare(&env).await?;
            recheck_command(&runtime, now).await
        }
    }
}

/// Log format and level from the command's config file, defaults when unavailable
fn logging_for(command: &Commands) -> (LogFormat, String) {
    let defaults = (LogFormat::Pretty, DEFAULT_DIRECTIVE.to_string());
    let path = match command {
        Commands::Init { .. } => return defaults,
        Commands::Validate { config } => config,
        Commands::MatchVehicle { env, .. }
        | Commands::MatchRequirement { env, .. }
        | Commands::Recheck { env, .. } => &env.config,
    };

    let Ok(config) = load_config(path) else {
        return defaults;
    };
    let format = LogFormat::parse(&config.logging.format).unwrap_or_default();
    if config.logging.level.trim().is_empty() {
        (format, defaults.1)
    } else {
        (format, config.logging.level)
    }
}

fn vehicle_type_of(arg: VehicleTypeArg) -> VehicleType {
    match arg {
        VehicleTypeArg::Car => VehicleType::Car,
        VehicleTypeArg::Bike => VehicleType::Bike,
    }
}

// ============================================================================
// Setup
// ============================================================================

fn load_checked_config(path: &Path) -> Result<CarMatchConfig> {
    let config = load_config(path)?;
    let report = validate_config(&config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot run due to configuration errors");
    }

    Ok(config)
}

fn load_seed(path: &Path) -> Result<SeedFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {:?}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse seed file: {:?}", path))
}

async fn prepare(env: &RunArgs) -> Result<Runtime> {
    let config = load_checked_config(&env.config)?;

    if config.metrics.enabled {
        init_metrics(config.metrics.port)?;
    }

    let store = create_store_from_config(&config.store).await?;
    let mut contacts = HashMap::new();
    if let Some(seed_path) = &env.seed {
        let seed = load_seed(seed_path)?;
        info!(
            listings = seed.listings.len(),
            requirements = seed.requirements.len(),
            "Loading seed data"
        );
        for listing in seed.listings {
            store.insert_listing(listing).await?;
        }
        for requirement in seed.requirements {
            store.insert_requirement(requirement).await?;
        }
        contacts = seed.contacts;
    }

    let profile = create_profile_store(&config.notifications.profile_storage)?;

    Ok(Runtime {
        config,
        store,
        persistence: PendingMatchPersistence::new(profile),
        user: UserIdentity::new(env.user.clone(), env.email.clone()),
        contacts,
    })
}

// ============================================================================
// Matching commands
// ============================================================================

async fn match_vehicle_command(
    runtime: &Runtime,
    vehicle: VehicleCriteria,
    dont_show_again: bool,
) -> Result<()> {
    let flow = runtime.flow(PageContext::VehiclePost);

    if !flow.after_vehicle_posted(&runtime.user, &vehicle).await {
        println!(
            "No match notification to show for {} {} {} ({}).",
            vehicle.year, vehicle.make, vehicle.model, vehicle.vehicle_type
        );
        return Ok(());
    }

    print_state(runtime, &flow.state());
    if dont_show_again {
        flow.dont_show_again(&runtime.user);
        println!("Dismissed permanently; this match will not be shown again.");
    }

    flow.dispose();
    if runtime.persistence.get_pending_vehicle_match().as_ref() == Some(&vehicle) {
        println!("Saved as pending; it will be re-checked on the next landing page visit.");
    }
    Ok(())
}

async fn match_requirement_command(
    runtime: &Runtime,
    requirement: RequirementCriteria,
) -> Result<()> {
    let flow = runtime.flow(PageContext::RequirementForm);

    match flow.after_requirement_posted(&runtime.user, &requirement).await {
        RequirementPostOutcome::ShowMatches(_) => print_state(runtime, &flow.state()),
        RequirementPostOutcome::CloseForm => {
            println!("Requirement posted. No matching listings to show right now.");
        }
    }
    Ok(())
}

async fn recheck_command(runtime: &Runtime, now: bool) -> Result<()> {
    let flow = runtime.flow(PageContext::Home);

    if now {
        flow.recheck_pending(&runtime.user).await;
    } else if flow.start(&runtime.user) {
        info!(
            delay_seconds = runtime.config.notifications.recheck_delay_seconds,
            "Waiting before re-checking pending match"
        );
        flow.wait_recheck().await;
    }

    match flow.state() {
        state @ FlowState::Showing(_) => print_state(runtime, &state),
        _ => println!("Nothing to show."),
    }
    Ok(())
}

fn print_state(runtime: &Runtime, state: &FlowState) {
    let FlowState::Showing(notification) = state else {
        return;
    };

    match &notification.matches {
        Matches::Requirements(requirements) => {
            println!("{} matching requirement(s):", requirements.len());
            for r in requirements {
                println!(
                    "  - [{}] {} {} {} (posted by {})",
                    r.id,
                    r.vehicle_type,
                    r.make.as_deref().unwrap_or("any make"),
                    r.model.as_deref().unwrap_or("any model"),
                    r.posted_by
                );
                print_handoff(runtime, &r.posted_by, &requirement_match_message(r));
            }
        }
        Matches::Listings(listings) => {
            println!("{} matching listing(s):", listings.len());
            for l in listings {
                println!(
                    "  - [{}] {} {} {} at {} (posted by {})",
                    l.id, l.year, l.make, l.model, l.price, l.posted_by
                );
                print_handoff(runtime, &l.posted_by, &listing_match_message(l));
            }
        }
        Matches::None => {}
    }
}

/// WhatsApp link to the counterpart when their phone is known, else the text
fn print_handoff(runtime: &Runtime, counterpart: &str, message: &str) {
    let Some(phone) = runtime.contacts.get(counterpart) else {
        println!("      {}", message);
        return;
    };

    match whatsapp_link(phone, message) {
        Ok(link) => println!("      {}", link),
        Err(e) => {
            warn!(error = %e, counterpart, "Failed to build WhatsApp link");
            println!("      {}", message);
        }
    }
}

// ============================================================================
// Config commands
// ============================================================================

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Marketplace: {}", config.marketplace.name);
    println!("Version: {}", config.marketplace.version);
    println!("Store: {}", config.store.store_type);
    println!(
        "Profile storage: {}",
        config.notifications.profile_storage.storage_type
    );
    println!(
        "Re-check delay: {}s",
        config.notifications.recheck_delay_seconds
    );

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!(
        "  2. Run 'carmatch validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'carmatch match-vehicle --config {:?} --seed seeds/demo.yaml ...' to try matching",
        output_path
    );

    Ok(())
}
