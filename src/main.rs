//! filedash - offline layer and command-line companion for the file dashboard

use clap::Parser;

mod actions;
mod cache;
mod challenge;
mod cli;
mod client;
mod config;
mod error;
mod feedback;
mod fetch;
mod output;
mod router;

use cli::{
    AdminCommands, CacheCommands, Cli, CommandContext, Commands, GlobalOptions, PrefsCommands,
    SecurityCommands,
};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    log::debug!("Parsed command: {:?}", cli.command);

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Status => cli::status::run(&opts),
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(opts.format),
            CacheCommands::Clear { region } => cli::cache::clear(region, opts.format),
            CacheCommands::Path => cli::cache::path(),
        },
        Commands::Fetch { url, output } => {
            let ctx = CommandContext::new(&opts)?;
            cli::fetch::run(&ctx, &url, output.as_deref()).await
        }
        Commands::Share { path, content_type } => {
            let ctx = CommandContext::new(&opts)?;
            cli::share::share(&ctx, &path, content_type.as_deref()).await
        }
        Commands::Take { key, output, keep } => {
            let ctx = CommandContext::new(&opts)?;
            cli::share::take(&ctx, key, &output, keep).await
        }
        Commands::Install => {
            let ctx = CommandContext::new(&opts)?;
            cli::install::run(&ctx).await
        }
        Commands::Serve { port } => {
            let ctx = CommandContext::new(&opts)?;
            cli::serve::run(&ctx, port).await
        }
        Commands::Prefs(prefs_cmd) => {
            let ctx = CommandContext::new(&opts)?;
            match prefs_cmd {
                PrefsCommands::Show => cli::prefs::show(&ctx),
                PrefsCommands::Set { key, value } => cli::prefs::set(&ctx, &key, value),
                PrefsCommands::Seen { warning } => cli::prefs::seen(&ctx, &warning),
            }
        }
        Commands::Login { username } => {
            let ctx = CommandContext::new(&opts)?;
            cli::login::run(&ctx, username).await
        }
        Commands::Admin(admin_cmd) => {
            let ctx = CommandContext::new(&opts)?;
            match admin_cmd {
                AdminCommands::KillSwitch { name, state } => {
                    cli::admin::kill_switch(&ctx, &name, state).await
                }
                AdminCommands::LogLevel { level } => cli::admin::log_level(&ctx, &level).await,
            }
        }
        Commands::Security(security_cmd) => {
            let ctx = CommandContext::new(&opts)?;
            match security_cmd {
                SecurityCommands::List => cli::security::list(&ctx).await,
                SecurityCommands::DeleteTotp => cli::security::delete_totp(&ctx).await,
                SecurityCommands::DeleteWebauthn { id } => {
                    cli::security::delete_webauthn(&ctx, &id).await
                }
            }
        }
    }
}
