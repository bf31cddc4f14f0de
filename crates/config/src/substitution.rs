//! `${VAR}` substitution for configuration files
//!
//! Supported forms: `${VAR}`, `$VAR`, and `${VAR:-fallback}`. A placeholder
//! whose variable is unset and has no fallback is left verbatim so the
//! validator can report it against the field it appears in. Full-line `#`
//! comments are copied through untouched.

use anyhow::Result;
use regex::{Captures, Regex};
use std::env;
use tracing::{debug, warn};

const ENV_VAR_PATTERN: &str = r"\$\{(\w+)(?::-([^}]*))?\}|\$(\w+)";

/// Substitute environment variables into raw config text
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(ENV_VAR_PATTERN)?;
    let mut missing: Vec<String> = Vec::new();

    let mut substituted = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            substituted.push_str(line);
        } else {
            substituted.push_str(&substitute_line(&re, line, &mut missing));
        }
    }

    if !missing.is_empty() {
        warn!(vars = ?missing, "Environment variables not set, placeholders kept");
    }

    Ok(substituted)
}

fn substitute_line(re: &Regex, line: &str, missing: &mut Vec<String>) -> String {
    re.replace_all(line, |caps: &Captures<'_>| {
        let placeholder = caps.get(0).map_or("", |m| m.as_str());
        let Some(name) = caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str()) else {
            return placeholder.to_string();
        };

        match (env::var(name), caps.get(2)) {
            (Ok(value), _) => {
                debug!(var = name, "Substituting environment variable");
                value
            }
            (Err(_), Some(fallback)) => {
                debug!(var = name, "Environment variable not set, using inline fallback");
                fallback.as_str().to_string()
            }
            (Err(_), None) => {
                missing.push(name.to_string());
                placeholder.to_string()
            }
        }
    })
    .into_owned()
}

/// Whether a value still contains a placeholder after substitution
pub fn has_unresolved_env_vars(content: &str) -> bool {
    Regex::new(ENV_VAR_PATTERN)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}
