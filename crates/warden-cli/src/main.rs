use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use warden_core::config::CONFIG_PATH_ENV;
use warden_core::{LogFormat, LoggingConfig, WardenConfig};
use warden_token::LoginType;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Warden node keys and tokens")]
struct Cli {
    /// Configuration file (defaults to ./warden.yaml when present)
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Node keypair management
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Issue, verify and inspect tokens
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },

    /// Hash a password or pass code for the users file.
    HashSecret {
        /// Secret to hash. Read from stdin when omitted.
        secret: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Load the node keypair, generating it if the key directory has none.
    Ensure,

    /// Print the public key. Never generates.
    Show {
        /// Also report where the private key lives (its contents are never printed)
        #[arg(long, default_value_t = false)]
        private: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Log in as a user from the users file and print the issued token.
    Issue {
        /// YAML users file (`users: [...]`)
        #[arg(long)]
        users: PathBuf,

        /// email or contactNo
        #[arg(long, default_value = "email")]
        login_type: LoginType,

        /// Email address or phone number
        #[arg(long)]
        identifier: String,

        /// Password, or pass code with --pass-code
        #[arg(long)]
        secret: String,

        #[arg(long, default_value_t = false)]
        pass_code: bool,

        /// Bind the session to this device
        #[arg(long)]
        device_id: Option<String>,

        #[arg(long)]
        device_token: Option<String>,

        /// Write the token to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Verify a token and print its claims.
    Verify {
        /// YAML users file, for device checks
        #[arg(long)]
        users: PathBuf,

        /// Token string or path to a file holding it
        token: String,
    },

    /// Show a token's header and expiry without verifying it.
    Inspect {
        /// Token string or path to a file holding it
        token: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("✖ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = WardenConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging);
    tracing::debug!(
        key_dir = %config.keys.directory.display(),
        signing = %config.token.signing_algorithm,
        accepted = ?config.token.accepted(),
        ttl_secs = config.token.ttl.as_secs(),
        "Configuration loaded"
    );

    match cli.cmd {
        Command::Keys { cmd } => match cmd {
            KeysCommand::Ensure => commands::keys::ensure(&config)?,
            KeysCommand::Show { private } => commands::keys::show(&config, private)?,
        },

        Command::Token { cmd } => match cmd {
            TokenCommand::Issue {
                users,
                login_type,
                identifier,
                secret,
                pass_code,
                device_id,
                device_token,
                output,
            } => {
                let mut request = warden_auth::LoginRequest::new(login_type, identifier, secret);
                request.use_pass_code = pass_code;
                request.device_id = device_id;
                request.device_token = device_token;
                commands::token::issue(&config, &users, &request, output).await?
            }
            TokenCommand::Verify { users, token } => {
                commands::token::verify(&config, &users, &token).await?
            }
            TokenCommand::Inspect { token } => commands::token::inspect(&token)?,
        },

        Command::HashSecret { secret } => commands::hash::hash_secret(secret)?,
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
/// overrides the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
