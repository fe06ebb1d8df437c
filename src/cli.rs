//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the persona engine binary.

use clap::{Parser, Subcommand};

/// Persona Engine - persona routing and sequential conversation execution
///
/// Routes chat messages to personas by weighted rule matching and executes
/// them through a bounded worker pool that keeps each conversation strictly
/// ordered.
#[derive(Parser, Debug)]
#[command(name = "persona-engine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat loop against the built-in mock backend
    Chat {
        /// Path to configuration file
        #[arg(short, long, env = "PERSONA_ENGINE_CONFIG")]
        config: Option<String>,

        /// Conversation id for this session
        #[arg(long, default_value = "local")]
        conversation: String,

        /// Sender id attached to submitted messages
        #[arg(long, default_value = "cli")]
        sender: String,
    },

    /// Route a single message and print the decision without executing it
    Route {
        /// Message text to route
        message: String,

        /// Path to configuration file
        #[arg(short, long, env = "PERSONA_ENGINE_CONFIG")]
        config: Option<String>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Persona catalog management
    Persona {
        #[command(subcommand)]
        subcommand: PersonaSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonaSubcommand {
    /// List all personas in the catalog
    List {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show one persona definition in full
    Show {
        /// Persona: analyst, creative, researcher, advisor, mentor
        persona: String,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Verifies that the CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_chat_defaults() {
        let cli = Cli::parse_from(["persona-engine", "chat"]);
        match cli.command {
            Commands::Chat {
                config,
                conversation,
                sender,
            } => {
                assert!(config.is_none());
                assert_eq!(conversation, "local");
                assert_eq!(sender, "cli");
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_chat_with_config() {
        let cli = Cli::parse_from(["persona-engine", "chat", "--config", "/path/to/config.toml"]);
        match cli.command {
            Commands::Chat { config, .. } => {
                assert_eq!(config, Some("/path/to/config.toml".to_string()));
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_route_command() {
        let cli = Cli::parse_from(["persona-engine", "route", "analyze this dataset"]);
        match cli.command {
            Commands::Route { message, json, .. } => {
                assert_eq!(message, "analyze this dataset");
                assert!(!json);
            }
            _ => panic!("Expected Route command"),
        }
    }

    #[test]
    fn test_route_json_flag() {
        let cli = Cli::parse_from(["persona-engine", "route", "--json", "hello"]);
        match cli.command {
            Commands::Route { json, .. } => assert!(json),
            _ => panic!("Expected Route command"),
        }
    }

    #[test]
    fn test_persona_list() {
        let cli = Cli::parse_from(["persona-engine", "persona", "list"]);
        match cli.command {
            Commands::Persona {
                subcommand: PersonaSubcommand::List { config },
            } => assert!(config.is_none()),
            _ => panic!("Expected Persona List command"),
        }
    }

    #[test]
    fn test_persona_show() {
        let cli = Cli::parse_from(["persona-engine", "persona", "show", "advisor"]);
        match cli.command {
            Commands::Persona {
                subcommand: PersonaSubcommand::Show { persona, .. },
            } => assert_eq!(persona, "advisor"),
            _ => panic!("Expected Persona Show command"),
        }
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["persona-engine", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::parse_from(["persona-engine", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["persona-engine", "config", "init", "--force"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Init { path, force },
            } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
