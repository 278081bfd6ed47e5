//! CLI Command Handlers
//!
//! Each handler takes CLI args, the shared services and Output, and returns
//! an ExitCode.

use pstream::api::{ClientError, PStreamApi};
use pstream::config::ProxyConfig;
use pstream::proxy;
use pstream::settings::InstanceSettings;

use crate::cli::{
    DetailsCmd, ExitCode, InstanceCmd, InstanceStatus, MockAction, MockCmd, MockStatus, Output,
    SearchCmd, ServeCmd, SourcesCmd, ValidationResult,
};

/// Services built once at the composition root
pub struct Services {
    pub api: PStreamApi,
    pub settings: InstanceSettings,
}

/// Exit code for a failed client call
pub fn exit_code_for(err: &ClientError) -> ExitCode {
    match err {
        ClientError::Forbidden(_) => ExitCode::Forbidden,
        e if e.is_network_error() => ExitCode::NetworkError,
        _ => ExitCode::Error,
    }
}

fn client_failure(output: &Output, context: &str, err: ClientError) -> ExitCode {
    output.error(format!("{}: {}", context, err), exit_code_for(&err))
}

// =============================================================================
// Catalog Commands
// =============================================================================

pub async fn home_cmd(services: &Services, output: &Output) -> ExitCode {
    output.info("Fetching home feed...");

    match services.api.fetch_home().await {
        Ok(items) => match output.print_list(&items) {
            Ok(()) => ExitCode::Success,
            Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
        },
        Err(e) => client_failure(output, "Home feed failed", e),
    }
}

pub async fn search_cmd(cmd: SearchCmd, services: &Services, output: &Output) -> ExitCode {
    if cmd.query.trim().is_empty() {
        return output.error("Search query cannot be empty", ExitCode::InvalidArgs);
    }

    output.info(format!("Searching for: {}", cmd.query));

    match services.api.search(&cmd.query).await {
        Ok(mut results) => {
            if let Some(limit) = cmd.limit {
                results.truncate(limit);
            }
            match output.print_list(&results) {
                Ok(()) => ExitCode::Success,
                Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
            }
        }
        Err(e) => client_failure(output, "Search failed", e),
    }
}

pub async fn details_cmd(cmd: DetailsCmd, services: &Services, output: &Output) -> ExitCode {
    if cmd.id.trim().is_empty() {
        return output.error("ID cannot be empty", ExitCode::InvalidArgs);
    }

    output.info(format!("Getting details for: {}", cmd.id));

    match services.api.fetch_details(&cmd.id).await {
        Ok(Some(item)) => {
            if let Err(e) = output.print(&item) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Ok(None) => output.error(
            format!("Unexpected details response for {}", cmd.id),
            ExitCode::Error,
        ),
        Err(e) => client_failure(output, "Details failed", e),
    }
}

pub async fn sources_cmd(cmd: SourcesCmd, services: &Services, output: &Output) -> ExitCode {
    output.info(format!("Fetching sources for: {}", cmd.tmdb_id));

    match services
        .api
        .fetch_sources(&cmd.tmdb_id, cmd.media_type.into())
        .await
    {
        Ok(sources) => match output.print_list(&sources) {
            Ok(()) => ExitCode::Success,
            Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
        },
        Err(e) => client_failure(output, "Sources failed", e),
    }
}

// =============================================================================
// Settings Commands
// =============================================================================

pub fn mock_cmd(cmd: MockCmd, services: &Services, output: &Output) -> ExitCode {
    let result = match cmd.action {
        MockAction::On => services.api.set_mock_mode(true),
        MockAction::Off => services.api.set_mock_mode(false),
        MockAction::Status => Ok(()),
    };
    if let Err(e) = result {
        return output.error(format!("Failed to save mock mode: {}", e), ExitCode::Error);
    }

    let status = MockStatus {
        enabled: services.api.is_mock_mode(),
    };
    match output.print(&status) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

pub async fn instance_cmd(cmd: InstanceCmd, services: &Services, output: &Output) -> ExitCode {
    let settings = &services.settings;

    let printed = match cmd {
        InstanceCmd::Show => match settings.stored_instance_url() {
            Ok(stored) => output.print(InstanceStatus {
                active: settings.instance_url(),
                stored,
            }),
            Err(e) => {
                return output.error(format!("Failed to read settings: {}", e), ExitCode::Error)
            }
        },
        InstanceCmd::Set { url } => match settings.set_instance_url(&url) {
            Ok(stored) => {
                output.info("Stored. Requests still use the fixed proxy endpoint.");
                output.print(InstanceStatus {
                    active: settings.instance_url(),
                    stored: Some(stored),
                })
            }
            Err(e) => {
                return output.error(format!("Failed to save settings: {}", e), ExitCode::Error)
            }
        },
        InstanceCmd::Validate { url } => {
            output.info(format!("Validating: {}", url));
            let valid = settings.validate_instance_url(&url).await;
            output.print(ValidationResult { url, valid })
        }
        InstanceCmd::Reset => match settings.reset_instance_url() {
            Ok(()) => output.print(InstanceStatus {
                active: settings.instance_url(),
                stored: None,
            }),
            Err(e) => {
                return output.error(format!("Failed to save settings: {}", e), ExitCode::Error)
            }
        },
    };

    match printed {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

pub async fn serve_cmd(cmd: ServeCmd, output: &Output) -> ExitCode {
    let mut config = match ProxyConfig::load() {
        Ok(config) => config,
        Err(e) => {
            return output.error(format!("Invalid proxy config: {:#}", e), ExitCode::InvalidArgs)
        }
    };
    if let Some(port) = cmd.port {
        config.port = port;
    }

    output.info(format!("Starting edge proxy on port {}", config.port));

    match proxy::serve(config).await {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Proxy failed: {:#}", e), ExitCode::Error),
    }
}
