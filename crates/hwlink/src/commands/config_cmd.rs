//! Config subcommand handlers.

use hwlink_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg: Config = config::load(global)?;
            // Reject values the provider would refuse.
            cfg.to_provider_config()?;

            let out = match global.output {
                OutputFormat::Table => toml::to_string_pretty(&cfg)?,
                format => output::render_single(format, &cfg, |_| String::new())?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }
    }
}
