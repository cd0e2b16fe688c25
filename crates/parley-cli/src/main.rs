use std::fs::OpenOptions;

use anyhow::Context;
use anyhow::Result;
use clap::CommandFactory;
use clap::FromArgMatches;
use clap::Parser;
use clap::Subcommand;
use log::LevelFilter;
use parley_cli::account;
use parley_cli::backend::Backend;
use parley_cli::chat;
use parley_core::Config;

#[derive(Parser, Debug)]
#[clap(
    name = "parley",
    author,
    version = "0.1.0",
    about = "Chat client for the Parley backend"
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(
        long = "backend-url",
        id = "backend-url",
        global = true,
        help = "Base URL of the chat backend [default: http://localhost:8000]"
    )]
    backend_url: Option<String>,

    #[clap(
        long = "config-file",
        id = "config-file",
        global = true,
        help = "Path to the TOML config file"
    )]
    config_file: Option<String>,

    #[clap(
        long = "page-size",
        id = "page-size",
        global = true,
        help = "Number of messages fetched per history page [default: 20]"
    )]
    page_size: Option<String>,

    #[clap(
        long = "state-dir",
        id = "state-dir",
        global = true,
        help = "Directory holding the active session and login credential"
    )]
    state_dir: Option<String>,

    #[clap(
        long = "timeout",
        id = "timeout",
        global = true,
        help = "Timeout of non-streaming backend requests, in milliseconds [default: 30000]"
    )]
    timeout: Option<String>,

    #[clap(long, short, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the access token
    Login {
        #[clap(long, short)]
        email: String,

        #[clap(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account, then log in
    Signup {
        #[clap(long, short)]
        email: String,

        #[clap(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[clap(long, short)]
        username: Option<String>,
    },
    /// Ask the backend to send a password reset link
    ForgotPassword {
        #[clap(long, short)]
        email: String,
    },
    /// Set a new password with the token from the reset link
    ResetPassword {
        #[clap(long, short)]
        token: String,

        #[clap(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored token and active session
    Logout,
    /// List your chat sessions
    Sessions,
    /// Chat in line mode (default command)
    Chat {
        #[clap(long, short, help = "Send a single message, print the reply and exit")]
        message: Option<String>,
    },
    /// Print a default config file
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command();
    let matches = cmd.clone().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    let interactive = matches!(
        cli.command,
        None | Some(Commands::Chat { message: None })
    );

    if interactive {
        // The chat owns the terminal, so logs go to a file.
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open("parley.log")
            .context("Failed to create parley.log file")?;

        env_logger::Builder::new()
            .filter_level(log_level_filter)
            .target(env_logger::Target::Pipe(Box::new(log_file)))
            .init();
    } else {
        env_logger::Builder::new()
            .filter_level(log_level_filter)
            .init();
    }

    let mut arg_matches = vec![&matches];
    if let Some((_, subcommand_matches)) = matches.subcommand() {
        arg_matches.push(subcommand_matches);
    }
    Config::load(cmd.clone(), arg_matches).await?;

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let backend = Backend::from_config();

    match cli.command {
        Some(Commands::Login { email, password }) => {
            let password = account::read_password(password)?;
            account::login(&backend, &email, &password).await
        }
        Some(Commands::Signup {
            email,
            password,
            username,
        }) => {
            let password = account::read_password(password)?;
            account::signup(&backend, &email, &password, username.as_deref()).await
        }
        Some(Commands::ForgotPassword { email }) => account::forgot_password(&backend, &email).await,
        Some(Commands::ResetPassword { token, password }) => {
            let password = account::read_password(password)?;
            account::reset_password(&backend, &token, &password).await
        }
        Some(Commands::Logout) => account::logout(&backend).await,
        Some(Commands::Sessions) => account::list_sessions(&backend).await,
        Some(Commands::Config) => {
            println!("{}", Config::serialize_default(cmd));
            Ok(())
        }
        Some(Commands::Chat {
            message: Some(message),
        }) => chat::send_once(&backend, &message).await,
        Some(Commands::Chat { message: None }) | None => chat::run_chat(&backend).await,
    }
}
