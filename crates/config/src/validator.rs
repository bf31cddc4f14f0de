use crate::*;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Marketplace name is required")]
    MissingMarketplaceName,

    #[error("Invalid version format: {0}. Must be in format X.Y.Z (e.g., 1.0.0)")]
    InvalidVersionFormat(String),

    #[error("Invalid store type: {0}. Must be one of: memory, postgres")]
    InvalidStoreType(String),

    #[error("Store: {message}")]
    InvalidStore { message: String },

    #[error("Invalid profile storage type: {0}. Must be one of: memory, file")]
    InvalidProfileStorageType(String),

    #[error("Notifications: {message}")]
    InvalidNotifications { message: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Environment variable placeholder in '{field}' was not resolved")]
    UnresolvedEnvVar { field: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

const STORE_TYPES: [&str; 2] = ["memory", "postgres"];
const PROFILE_STORAGE_TYPES: [&str; 2] = ["memory", "file"];
const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

pub fn validate_config(config: &CarMatchConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_marketplace(&config.marketplace, &mut report);
    validate_store(&config.store, &mut report);
    validate_notifications(&config.notifications, &mut report);
    validate_observability(config, &mut report);

    report
}

fn validate_marketplace(marketplace: &MarketplaceConfig, report: &mut ValidationReport) {
    if marketplace.name.trim().is_empty() {
        report.add_error(ValidationError::MissingMarketplaceName);
    }

    if marketplace.description.is_empty() {
        report.add_warning("marketplace.description", "Description is empty");
    }

    let version_ok = Regex::new(r"^\d+\.\d+\.\d+$")
        .map(|re| re.is_match(&marketplace.version))
        .unwrap_or(false);
    if !version_ok {
        report.add_error(ValidationError::InvalidVersionFormat(marketplace.version.clone()));
    }
}

fn validate_store(store: &StoreConfig, report: &mut ValidationReport) {
    let store_type = store.store_type.to_lowercase();
    if !STORE_TYPES.contains(&store_type.as_str()) {
        report.add_error(ValidationError::InvalidStoreType(store.store_type.clone()));
        return;
    }

    if store_type == "memory" {
        report.add_warning(
            "store.type",
            "In-memory store is not persistent; listings and requirements are lost on exit",
        );
        return;
    }

    let Some(pg) = &store.postgres else {
        report.add_error(ValidationError::InvalidStore {
            message: "postgres block is required when store.type is postgres".to_string(),
        });
        return;
    };

    for (field, value) in [
        ("store.postgres.host", &pg.host),
        ("store.postgres.database", &pg.database),
        ("store.postgres.user", &pg.user),
        ("store.postgres.password", &pg.password),
    ] {
        if value.is_empty() {
            report.add_error(ValidationError::InvalidStore {
                message: format!("{} is required", field),
            });
        } else if has_unresolved_env_vars(value) {
            report.add_error(ValidationError::UnresolvedEnvVar {
                field: field.to_string(),
            });
        }
    }

    if pg.max_connections == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "store.postgres.max_connections".to_string(),
        });
    }
}

fn validate_notifications(notifications: &NotificationsConfig, report: &mut ValidationReport) {
    if notifications.recheck_delay_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "notifications.recheck_delay_seconds".to_string(),
        });
    } else if notifications.recheck_delay_seconds > 60 {
        report.add_warning(
            "notifications.recheck_delay_seconds",
            "Delays above 60 seconds mean most page visits end before the recheck runs",
        );
    }

    if notifications.recheck_delay_seconds == default_recheck_delay_seconds() {
        report.add_default(
            "notifications.recheck_delay_seconds",
            &default_recheck_delay_seconds().to_string(),
        );
    }

    let profile = &notifications.profile_storage;
    let storage_type = profile.storage_type.to_lowercase();
    if !PROFILE_STORAGE_TYPES.contains(&storage_type.as_str()) {
        report.add_error(ValidationError::InvalidProfileStorageType(
            profile.storage_type.clone(),
        ));
        return;
    }

    if storage_type == "file" && profile.path.as_deref().map_or(true, str::is_empty) {
        report.add_error(ValidationError::InvalidNotifications {
            message: "profile_storage.path is required for the file backend".to_string(),
        });
    }

    if storage_type == "memory" {
        report.add_warning(
            "notifications.profile_storage.type",
            "Pending matches and dismissals will not survive a restart",
        );
    }
}

fn validate_observability(config: &CarMatchConfig, report: &mut ValidationReport) {
    if !LOG_FORMATS.contains(&config.logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }

    if config.logging.level.trim().is_empty() {
        report.add_warning("logging.level", "Empty filter directive, 'info' is used instead");
    }

    if config.metrics.enabled && config.metrics.port == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "metrics.port".to_string(),
        });
    }
}
