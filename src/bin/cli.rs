//! urlstore CLI Client
//!
//! Command-line interface for interacting with a urlstore server, plus
//! offline inspection of a log file.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use urlstore::log::LogReplay;
use urlstore::protocol::{read_response, write_command, Command, Response, Status};

/// urlstore CLI
#[derive(Parser, Debug)]
#[command(name = "urlstore-cli")]
#[command(about = "CLI for the urlstore URL shortener")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a url and print its key
    Put {
        /// The url to shorten
        url: String,
    },

    /// Resolve a key to its url
    Get {
        /// The short key
        key: String,
    },

    /// Print the number of stored entries
    Count,

    /// Ping the server
    Ping,

    /// Check a log file offline and report how replay would end
    Verify {
        /// Path to the log file
        log_file: PathBuf,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    let command = match args.command {
        Commands::Verify { log_file } => return verify(&log_file),
        Commands::Put { url } => Command::Put { url },
        Commands::Get { key } => Command::Get { key },
        Commands::Count => Command::Count,
        Commands::Ping => Command::Ping,
    };

    match send(&args.server, &command) {
        Ok(response) => print_response(&response),
        Err(e) => {
            tracing::error!("Request to {} failed: {}", args.server, e);
            ExitCode::FAILURE
        }
    }
}

fn send(server: &str, command: &Command) -> urlstore::Result<Response> {
    let stream = TcpStream::connect(server)?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let mut reader = BufReader::new(stream);

    write_command(&mut writer, command)?;
    read_response(&mut reader)
}

fn print_response(response: &Response) -> ExitCode {
    match response.status {
        Status::Ok => {
            println!("{}", response.payload_text().unwrap_or_default());
            ExitCode::SUCCESS
        }
        Status::NotFound => {
            eprintln!("(not found)");
            ExitCode::FAILURE
        }
        Status::Error => {
            eprintln!("error: {}", response.payload_text().unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

fn verify(path: &Path) -> ExitCode {
    let result = match LogReplay::verify(path) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Cannot read {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("records:     {}", result.records_replayed);
    println!("valid bytes: {}", result.valid_len);

    match result.stop_reason {
        None => {
            println!("status:      clean");
            ExitCode::SUCCESS
        }
        Some(reason) => {
            println!("status:      {}", reason);
            ExitCode::FAILURE
        }
    }
}
