pub fn default_version() -> String {
    "1.0.0".to_string()
}

pub fn default_store_type() -> String {
    "memory".to_string()
}

pub fn default_postgres_port() -> u16 {
    5432
}

pub fn default_ssl_mode() -> String {
    "require".to_string()
}

pub fn default_max_connections() -> u32 {
    20
}

pub fn default_connection_timeout() -> u64 {
    30
}

pub fn default_recheck_delay_seconds() -> u64 {
    5
}

pub fn default_profile_storage_type() -> String {
    "memory".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}
