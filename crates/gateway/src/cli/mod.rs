pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

/// ConvoAgent: a conversational agent backend.
#[derive(Debug, Parser)]
#[command(name = "convoagent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Send a single message through the pipeline and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Channel-local user id.
        #[arg(long, default_value = "cli")]
        user: String,
        /// Channel the user belongs to (defaults to `identity.default_channel`).
        #[arg(long)]
        channel: Option<String>,
        /// Model override (e.g. "gpt-4o").
        #[arg(long)]
        model: Option<String>,
        /// Print the full outcome as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `CA_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: ca_domain::config::Config
pub fn load_config() -> anyhow::Result<(ca_domain::config::Config, String)> {
    let config_path = std::env::var("CA_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(std::path::Path::new(&config_path))?;
    Ok((config, config_path))
}

/// Parse `path`; a missing file yields the defaults.
pub fn load_config_from(path: &std::path::Path) -> anyhow::Result<ca_domain::config::Config> {
    if !path.exists() {
        return Ok(ca_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.port, 3210);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();
        let err = load_config_from(&path).unwrap_err().to_string();
        assert!(err.contains("config.toml"));
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["convoagent", "run", "hello"]);
        match cli.command {
            Some(Command::Run { message, user, channel, json, .. }) => {
                assert_eq!(message, "hello");
                assert_eq!(user, "cli");
                assert!(channel.is_none());
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
