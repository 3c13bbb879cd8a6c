//! Management command framework for modeltype.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI
//! commands and [`CommandRegistry`] for registering and dispatching them.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use modeltype_cli::command::ManagementCommand;
//! use modeltype_core::{ModelTypeResult, Settings};
//!
//! struct GreetCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for GreetCommand {
//!     fn name(&self) -> &'static str { "greet" }
//!     fn help(&self) -> &'static str { "Say hello" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         _settings: &Settings,
//!     ) -> ModelTypeResult<()> {
//!         println!("Hello from modeltype!");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use modeltype_core::{ModelTypeError, ModelTypeResult, Settings};

/// The global option naming a settings file.
pub const SETTINGS_ARG: &str = "settings";

/// A management command that can be registered and invoked through the CLI.
///
/// Implementations define a name, help text, optional arguments, and an
/// async handler. Commands must be `Send + Sync`.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name used to invoke this command.
    fn name(&self) -> &'static str;

    /// Returns a short help description for this command.
    fn help(&self) -> &'static str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings)
        -> ModelTypeResult<()>;
}

/// A registry of management commands, keyed by name.
pub struct CommandRegistry {
    commands: HashMap<&'static str, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a management command, replacing any command with the same
    /// name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        self.commands.insert(command.name(), command);
    }

    /// Returns the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap `Command` with every registered subcommand
    /// and the global `--settings` option.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("modeltype")
            .about("Typed client schema generation for model registries")
            .subcommand_required(true)
            .arg(
                clap::Arg::new(SETTINGS_ARG)
                    .long(SETTINGS_ARG)
                    .global(true)
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Settings file (TOML, or JSON by extension)"),
            );

        let mut entries: Vec<_> = self.commands.values().collect();
        entries.sort_by_key(|cmd| cmd.name());
        for cmd in entries {
            let subcmd = clap::Command::new(cmd.name()).about(cmd.help());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }
        app
    }

    /// Dispatches to the subcommand named in `matches`.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> ModelTypeResult<()> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            ModelTypeError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self.get(name).ok_or_else(|| {
            ModelTypeError::ConfigurationError(format!("Unknown command: {name}"))
        })?;

        tracing::debug!(command = name, "Running command");
        cmd.handle(sub_matches, settings).await
    }
}

/// Returns the settings file given on the command line, wherever it appeared.
pub fn settings_path(matches: &clap::ArgMatches) -> Option<PathBuf> {
    matches
        .subcommand()
        .and_then(|(_, sub)| sub.get_one::<PathBuf>(SETTINGS_ARG))
        .or_else(|| matches.get_one::<PathBuf>(SETTINGS_ARG))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCommand {
        cmd_name: &'static str,
    }

    #[async_trait]
    impl ManagementCommand for TestCommand {
        fn name(&self) -> &'static str {
            self.cmd_name
        }

        fn help(&self) -> &'static str {
            "A test command"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .action(clap::ArgAction::SetTrue),
            )
        }

        async fn handle(
            &self,
            _matches: &clap::ArgMatches,
            _settings: &Settings,
        ) -> ModelTypeResult<()> {
            Ok(())
        }
    }

    struct FailingCommand;

    #[async_trait]
    impl ManagementCommand for FailingCommand {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn help(&self) -> &'static str {
            "A command that always fails"
        }

        async fn handle(
            &self,
            _matches: &clap::ArgMatches,
            _settings: &Settings,
        ) -> ModelTypeResult<()> {
            Err(ModelTypeError::ConfigurationError("deliberate failure".to_string()))
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_list_commands_sorted_and_replaced() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "zebra" }));
        registry.register(Box::new(TestCommand { cmd_name: "alpha" }));
        registry.register(Box::new(TestCommand { cmd_name: "alpha" }));
        assert_eq!(registry.list_commands(), vec!["alpha", "zebra"]);
        assert_eq!(registry.get("alpha").unwrap().help(), "A test command");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_build_cli_with_arguments() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "test" }));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["modeltype", "test", "--verbose"])
            .unwrap();
        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "test");
        assert!(sub_matches.get_flag("verbose"));
    }

    #[test]
    fn test_settings_path_is_global() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "test" }));

        let after = registry
            .build_cli()
            .try_get_matches_from(["modeltype", "test", "--settings", "a.toml"])
            .unwrap();
        assert_eq!(settings_path(&after), Some(PathBuf::from("a.toml")));

        let before = registry
            .build_cli()
            .try_get_matches_from(["modeltype", "--settings", "b.json", "test"])
            .unwrap();
        assert_eq!(settings_path(&before), Some(PathBuf::from("b.json")));

        let none = registry
            .build_cli()
            .try_get_matches_from(["modeltype", "test"])
            .unwrap();
        assert_eq!(settings_path(&none), None);
    }

    #[tokio::test]
    async fn test_execute() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "test" }));
        registry.register(Box::new(FailingCommand));
        let settings = Settings::default();

        let matches = registry
            .build_cli()
            .try_get_matches_from(["modeltype", "test"])
            .unwrap();
        assert!(registry.execute(&matches, &settings).await.is_ok());

        let matches = registry
            .build_cli()
            .try_get_matches_from(["modeltype", "fail"])
            .unwrap();
        assert!(registry.execute(&matches, &settings).await.is_err());
    }
}
