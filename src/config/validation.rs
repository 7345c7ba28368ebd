//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate pool sizing for both planes
//! - Validate listener settings and detect colliding bind addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before any pool or socket is created

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{Config, ListenerSpec, ServerConfig};
use crate::plane::Plane;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Pool sizing out of range.
    #[error("{pool} pool: {reason}")]
    PoolSize { pool: &'static str, reason: String },

    /// Listener setting out of range.
    #[error("{plane} listener #{index}: {reason}")]
    Listener {
        plane: Plane,
        index: usize,
        reason: String,
    },

    /// Two listeners bind the same fixed address.
    #[error("{first} and {second} listeners both bind {address}")]
    DuplicateBind {
        address: String,
        first: Plane,
        second: Plane,
    },

    /// Both planes end up without listeners.
    #[error("no plane has a listener; the server would be unreachable")]
    NoReachablePlane,
}

/// Check pool bounds: `min >= 1`, `max >= 2`, `max >= min`.
pub fn check_pool_size(min_threads: usize, max_threads: usize) -> Result<(), String> {
    if min_threads < 1 {
        return Err(format!("min_threads must be at least 1 (got {min_threads})"));
    }
    if max_threads < 2 {
        return Err(format!("max_threads must be at least 2 (got {max_threads})"));
    }
    if max_threads < min_threads {
        return Err(format!(
            "max_threads ({max_threads}) must not be less than min_threads ({min_threads})"
        ));
    }
    Ok(())
}

/// Validate the whole configuration.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let errors = validate_server(&config.server);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the server section, returning every problem found.
pub fn validate_server(server: &ServerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(reason) = check_pool_size(server.min_threads, server.max_threads) {
        errors.push(ValidationError::PoolSize {
            pool: "application",
            reason,
        });
    }
    if let Err(reason) = check_pool_size(server.admin_min_threads, server.admin_max_threads) {
        errors.push(ValidationError::PoolSize {
            pool: "admin",
            reason,
        });
    }

    let mut seen: HashSet<(String, u16)> = HashSet::new();
    let mut owners: Vec<((String, u16), Plane)> = Vec::new();

    for plane in [Plane::Application, Plane::Admin] {
        let specs = plane.effective_specs(server);
        for (index, spec) in specs.iter().enumerate() {
            check_listener(plane, index, spec, &mut errors);

            let http = spec.http();
            if http.port == 0 {
                continue;
            }
            let key = (http.host().to_ascii_lowercase(), http.port);
            if !seen.insert(key.clone()) {
                let first = owners
                    .iter()
                    .find(|(owned, _)| *owned == key)
                    .map(|(_, owner)| *owner)
                    .unwrap_or(plane);
                errors.push(ValidationError::DuplicateBind {
                    address: format!("{}:{}", key.0, key.1),
                    first,
                    second: plane,
                });
            } else {
                owners.push((key, plane));
            }
        }
    }

    if Plane::Application.effective_specs(server).is_empty()
        && Plane::Admin.effective_specs(server).is_empty()
    {
        errors.push(ValidationError::NoReachablePlane);
    }

    errors
}

fn check_listener(
    plane: Plane,
    index: usize,
    spec: &ListenerSpec,
    errors: &mut Vec<ValidationError>,
) {
    let http = spec.http();
    let mut push = |reason: String| {
        errors.push(ValidationError::Listener {
            plane,
            index,
            reason,
        })
    };

    if http.max_connections == 0 {
        push("max_connections must be greater than 0".to_string());
    }
    if http.accept_queue_size == 0 {
        push("accept_queue_size must be greater than 0".to_string());
    }
    if http.idle_timeout_secs == 0 {
        push("idle_timeout_secs must be greater than 0".to_string());
    }
    if let Some(host) = &http.bind_host {
        if host.trim().is_empty() {
            push("bind_host must not be blank".to_string());
        }
    }
    if let ListenerSpec::Https(tls) = spec {
        if tls.cert_path.as_os_str().is_empty() {
            push("cert_path must be set".to_string());
        }
        if tls.key_path.as_os_str().is_empty() {
            push("key_path must be set".to_string());
        }
    }
}
