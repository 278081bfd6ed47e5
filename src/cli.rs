//! CLI - Command Line Interface for PStream
//!
//! Every catalog call goes through the secure API client. All output is
//! JSON-parseable with `--json`.
//!
//! # Examples
//!
//! ```bash
//! # Browse and search through the proxy
//! pstream home --json
//! pstream search "blade runner"
//! pstream sources 603 --type movie
//!
//! # Development
//! pstream mock on
//! pstream serve --port 3003
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

use pstream::models::MediaKind;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error or timeout
    NetworkError = 3,
    /// Request targeted the forbidden backend port
    Forbidden = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// PStream - browse the catalog through the edge proxy
#[derive(Parser, Debug)]
#[command(
    name = "pstream",
    version,
    about = "Secure client and edge proxy for PStream",
    long_about = "Query the PStream catalog through the edge proxy, manage \
                  client settings, or run the proxy itself.\n\n\
                  The client never talks to the internal backend directly.",
    after_help = "EXAMPLES:\n\
                  pstream home                        Show the home feed\n\
                  pstream search \"the batman\"         Search the catalog\n\
                  pstream sources 603 -t movie        List playable sources\n\
                  pstream serve                       Run the edge proxy"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the home feed
    Home,

    /// Search for movies and TV shows
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Get details for a catalog item
    #[command(visible_alias = "i")]
    Details(DetailsCmd),

    /// List playable sources for a title
    #[command(visible_alias = "src")]
    Sources(SourcesCmd),

    /// Toggle or inspect mock mode
    Mock(MockCmd),

    /// Manage the instance URL setting
    #[command(subcommand)]
    Instance(InstanceCmd),

    /// Run the edge proxy
    Serve(ServeCmd),
}

/// Search the catalog by query
#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Search query (title, keywords)
    #[arg(required = true)]
    pub query: String,

    /// Maximum number of results
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,
}

/// Details for one item
#[derive(Args, Debug)]
pub struct DetailsCmd {
    /// Catalog ID (TMDB ID or internal ID)
    pub id: String,
}

/// Sources for one title
#[derive(Args, Debug)]
pub struct SourcesCmd {
    /// TMDB ID
    pub tmdb_id: String,

    /// Media type
    #[arg(long = "type", short = 't', value_enum, default_value = "movie")]
    pub media_type: MediaTypeArg,
}

/// Media type accepted by the sources route
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTypeArg {
    /// Movies
    Movie,
    /// TV shows
    Tv,
}

impl From<MediaTypeArg> for MediaKind {
    fn from(arg: MediaTypeArg) -> Self {
        match arg {
            MediaTypeArg::Movie => MediaKind::Movie,
            MediaTypeArg::Tv => MediaKind::Tv,
        }
    }
}

/// Mock mode switch
#[derive(Args, Debug)]
pub struct MockCmd {
    #[arg(value_enum, default_value = "status")]
    pub action: MockAction,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockAction {
    /// Serve fixture data instead of calling the proxy
    On,
    /// Use the proxy
    Off,
    /// Show whether mock mode is active
    Status,
}

#[derive(Subcommand, Debug)]
pub enum InstanceCmd {
    /// Show the active instance URL
    Show,
    /// Store an instance URL
    Set {
        /// Proxy base URL
        url: String,
    },
    /// Check that a URL is a reachable PStream proxy
    Validate {
        /// Proxy base URL
        url: String,
    },
    /// Forget the stored instance URL
    Reset,
}

/// Edge proxy options
#[derive(Args, Debug)]
pub struct ServeCmd {
    /// Listen port (overrides PROXY_PORT)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            success: false,
            data: None,
            error: Some(msg.into()),
            code: code.into(),
        }
    }
}

/// Mock mode state
#[derive(Debug, Serialize, Deserialize)]
pub struct MockStatus {
    pub enabled: bool,
}

/// Instance settings state
#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub active: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<String>,
}

/// Instance validation result
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    pub url: String,
    pub valid: bool,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print one line per item in plain mode, the JSON wrapper otherwise
    pub fn print_list<T: Serialize + std::fmt::Display>(&self, items: &[T]) -> anyhow::Result<()> {
        if self.json {
            return self.print(items);
        }
        for item in items {
            println!("{}", item);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
