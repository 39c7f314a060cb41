mod cli;
mod config;
mod diagnostics;
mod paths;
mod run;

use anyhow::Result;
use cli::{Command, ConfigAction};
use config::FileConfig;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Verify(args)) => run::verify(args),
        Some(Command::Adapters(args)) => diagnostics::list_adapters(args.json),
        Some(Command::Config(config_cmd)) => handle_config_command(config_cmd.action),
        None => run::run(cli.run),
    }
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    let paths = AppPaths::discover()?;

    match action {
        ConfigAction::Where => {
            println!("Configuration:");
            println!("  dir:   {}", paths.config_dir().display());
            println!("  file:  {}", paths.config_file().display());
            if !paths.config_file().exists() {
                println!("  (file not present; built-in defaults apply)");
            }
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = paths.config_file();
            if path.exists() && !force {
                anyhow::bail!(
                    "config file already exists at {}; pass --force to overwrite",
                    path.display()
                );
            }
            FileConfig::template().persist(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}
