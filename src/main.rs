use std::{io, path::PathBuf, process, time::Duration};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::Instant,
};

use tapdeck::{
    config::Config,
    error::{ErrorKind, Result},
    http::Method,
    remote::{Client, Volume},
    secrets::RefreshSecret,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// TOML file with `client_id`, `client_secret` and `refresh_token`. Keep
    /// it private: it grants control over your Spotify account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// Name of the Spotify Connect device to control
    ///
    /// Matched exactly, including case.
    ///
    /// [default: system hostname]
    #[arg(short, long, env = "TAPDECK_DEVICE", value_hint = ValueHint::Hostname)]
    device: Option<String>,

    /// Root certificate to trust exclusively (PEM)
    ///
    /// Pins TLS to a single certificate authority instead of the system
    /// roots.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    ca_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Play an album, playlist, artist or track from the start
    Play {
        /// Spotify URI or open.spotify.com link
        uri: String,
    },

    /// Turn shuffle on
    Shuffle {
        /// Turn shuffle off instead
        #[arg(long, default_value_t = false)]
        off: bool,
    },

    /// Skip to the next track
    Next,

    /// Set the playback volume in percent
    Volume { volume: Volume },

    /// List the devices available on the account
    Devices,

    /// Fetch an access token to verify the secrets
    Token,

    /// Call a Web API endpoint directly
    Call {
        /// GET, POST or PUT
        method: Method,

        /// Path such as `v1/me/player`
        path: String,

        /// JSON request body
        body: Option<String>,
    },

    /// Read URIs from standard input, one per line, and play them
    ///
    /// The lines `next` and `shuffle` skip and shuffle instead.
    Watch {
        /// Re-authenticate and look up the device again before acting after
        /// this many seconds without input
        #[arg(long, value_name = "SECS", default_value_t = 1800)]
        idle_reset: u64,
    },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            // Quiet and verbose are mutually exclusive, so this arm means:
            // quiet mode.
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("tapdeck", level);
    }

    logger.init();
}

/// Loads the refresh secret, pointing at the documentation when the file
/// does not exist yet.
fn load_secret(secrets_file: &str) -> Result<RefreshSecret> {
    let secret = RefreshSecret::from_file(secrets_file);

    if let Err(ref e) = secret {
        if e.kind == ErrorKind::NotFound {
            info!("copy secrets.toml.example to {secrets_file} and fill in your credentials");
        }
    }

    secret
}

/// Logs the outcome of an operation and tells whether it succeeded.
fn report(action: &str, status: u16) -> bool {
    let success = (200..300).contains(&status);
    if success {
        info!("{action}: HTTP {status}");
    } else if status == 0 {
        error!("{action}: no response from Spotify");
    } else {
        error!("{action}: HTTP {status}");
    }
    success
}

/// Plays URIs read from standard input until it closes or the user
/// interrupts.
async fn watch(client: &mut Client, idle_reset: Duration) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_activity = Instant::now();
    info!("waiting for input");

    loop {
        tokio::select! {
            // Prioritize shutdown signals.
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down gracefully");
                break Ok(());
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("end of input");
                    break Ok(());
                };

                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                let idle = last_activity.elapsed();
                if idle > idle_reset {
                    info!("idle for {}s", idle.as_secs());
                    client.reset_state().await;
                }

                match line {
                    "next" => report("next", client.next().await),
                    "shuffle" => report("shuffle", client.shuffle().await),
                    uri => report(uri, client.play(uri).await),
                };
                last_activity = Instant::now();
            }
        }
    }
}

/// Runs the command. Returns whether it succeeded.
///
/// # Errors
///
/// Returns an error when the secrets cannot be loaded, the configuration is
/// invalid, or reading standard input fails.
async fn run(args: Args) -> Result<bool> {
    let secret = load_secret(&args.secrets_file)?;
    debug!("secret: {secret:?}");

    let device_name = args
        .device
        .or_else(sysinfo::System::host_name)
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());

    let mut config = Config::new(secret, device_name)?;
    config.ca_file = args.ca_file;
    config.request_timeout = Duration::from_secs(args.timeout);
    info!("controlling device \"{}\"", config.device_name);

    let mut client = Client::new(&config)?;

    let success = match args.command {
        Command::Play { uri } => report("play", client.play(&uri).await),
        Command::Shuffle { off } => report("shuffle", client.set_shuffle(!off).await),
        Command::Next => report("next", client.next().await),
        Command::Volume { volume } => {
            report(&format!("volume {volume}"), client.set_volume(volume).await)
        }
        Command::Devices => match client.devices().await {
            Some(devices) => {
                if devices.is_empty() {
                    warn!("no devices available; is Spotify running on your speaker?");
                }
                for device in &devices {
                    println!("{device}");
                }
                true
            }
            None => false,
        },
        Command::Token => {
            client.fetch_token().await;
            if client.is_token_valid() {
                info!(
                    "access token valid; refreshing in {}s",
                    client.token_time_to_live().as_secs()
                );
            }
            client.is_token_valid()
        }
        Command::Call { method, path, body } => {
            let url = client.url(&path)?;
            let outcome = client
                .call(method, url, body.as_deref().unwrap_or_default())
                .await;
            if let Some(payload) = outcome.payload {
                println!("{payload}");
            }
            report(&format!("{method} {path}"), outcome.status)
        }
        Command::Watch { idle_reset } => {
            watch(&mut client, Duration::from_secs(idle_reset)).await?;
            true
        }
    };

    Ok(success)
}

/// Main entry point of the application.
///
/// Control requests are strictly sequential, so a single-threaded runtime
/// is enough and keeps memory use down on small boards.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    match run(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}
