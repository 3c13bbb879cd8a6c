use anyhow::Context as _;
use modeltype_cli::command::{settings_path, CommandRegistry};
use modeltype_cli::commands::register_builtin_commands;
use modeltype_core::logging::setup_logging;
use modeltype_core::settings_loader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match settings_path(&matches) {
        Some(path) => settings_loader::from_file_with_env(&path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => settings_loader::from_env(),
    };
    if !setup_logging(&settings) {
        tracing::debug!("A tracing subscriber was already installed");
    }

    registry.execute(&matches, &settings).await?;
    Ok(())
}
