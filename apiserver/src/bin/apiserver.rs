//! This is the primary binary for the routing-daemon configuration API
//! server.

#![deny(rust_2018_idioms)]

#[macro_use]
extern crate log;

use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use snafu::ResultExt;
use std::env;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use apiserver::{serve, ServerSettings};

type Result<T> = std::result::Result<T, error::Error>;

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("{}", source))]
        Server { source: apiserver::server::Error },

        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: log::SetLoggerError },
    }
}

/// Stores user-supplied arguments.
struct Args {
    address: String,
    port: u16,
    config_path: PathBuf,
    schema_path: PathBuf,
    exec_command: String,
    target_path: PathBuf,
    log_level: LevelFilter,
}

/// Informs the user about proper usage of the program and exits.
fn usage() -> ! {
    let program_name = env::args().next().unwrap_or_else(|| "program".to_string());
    eprintln!(
        r"Usage: {}
            -a|--address ADDRESS
            -p|--port PORT
            -c|--config PATH
            -s|--schema PATH
            -e|--exec COMMAND
            -t|--target PATH
            [ --log-level trace|debug|info|warn|error ]

    ADDRESS and PORT are the HTTP bind address.
    CONFIG is the running configuration document, SCHEMA its schema.
    COMMAND addresses the routing daemon's control binary, and TARGET is
    where the rendered daemon configuration is written.",
        program_name
    );
    process::exit(2);
}

/// Prints a more specific message before exiting through usage().
fn usage_msg<S: AsRef<str>>(msg: S) -> ! {
    eprintln!("{}\n", msg.as_ref());
    usage();
}

/// Parses user arguments into an Args structure.
fn parse_args(args: env::Args) -> Args {
    let mut address = None;
    let mut port = None;
    let mut config_path = None;
    let mut schema_path = None;
    let mut exec_command = None;
    let mut target_path = None;
    let mut log_level = None;

    let mut iter = args.skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "-a" | "--address" => {
                address = Some(
                    iter.next()
                        .unwrap_or_else(|| usage_msg("Did not give argument to --address")),
                )
            }

            "-p" | "--port" => {
                let port_str = iter
                    .next()
                    .unwrap_or_else(|| usage_msg("Did not give argument to --port"));
                port = Some(port_str.parse::<u16>().unwrap_or_else(|e| {
                    usage_msg(format!("Invalid port '{}': {}", port_str, e))
                }));
            }

            "-c" | "--config" => {
                config_path = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| usage_msg("Did not give argument to --config")),
                ))
            }

            "-s" | "--schema" => {
                schema_path = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| usage_msg("Did not give argument to --schema")),
                ))
            }

            "-e" | "--exec" => {
                exec_command = Some(
                    iter.next()
                        .unwrap_or_else(|| usage_msg("Did not give argument to --exec")),
                )
            }

            "-t" | "--target" => {
                target_path = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| usage_msg("Did not give argument to --target")),
                ))
            }

            "--log-level" => {
                let log_level_str = iter
                    .next()
                    .unwrap_or_else(|| usage_msg("Did not give argument to --log-level"));
                log_level = Some(LevelFilter::from_str(&log_level_str).unwrap_or_else(|_| {
                    usage_msg(format!("Invalid log level '{}'", log_level_str))
                }));
            }

            _ => usage(),
        }
    }

    Args {
        address: address.unwrap_or_else(|| usage()),
        port: port.unwrap_or_else(|| usage()),
        config_path: config_path.unwrap_or_else(|| usage()),
        schema_path: schema_path.unwrap_or_else(|| usage()),
        exec_command: exec_command.unwrap_or_else(|| usage()),
        target_path: target_path.unwrap_or_else(|| usage()),
        log_level: log_level.unwrap_or(LevelFilter::Info),
    }
}

/// Starts the web server to accept user requests, dispatching those requests
/// through the configuration pipeline.
async fn run() -> Result<()> {
    let args = parse_args(env::args());

    // TerminalMode::Mixed will send errors to stderr and anything less to
    // stdout.
    TermLogger::init(
        args.log_level,
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context(error::LoggerSnafu)?;

    info!(
        "Starting server at {}:{} with config at '{}'",
        args.address,
        args.port,
        args.config_path.display(),
    );

    serve(ServerSettings {
        address: args.address,
        port: args.port,
        config_path: args.config_path,
        schema_path: args.schema_path,
        exec_command: args.exec_command,
        target_path: args.target_path,
    })
    .await
    .context(error::ServerSnafu)
}

// Returning a Result from main makes it print a Debug representation of the
// error, but with Snafu we have nice Display representations of the error, so
// we wrap "main" (run) and print any error.
#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", e);
        process::exit(1);
    }
}
