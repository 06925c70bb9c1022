//! cartremote CLI Client
//!
//! Sends one request to a running host and prints the response line.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use cartremote::discovery::Discovery;
use clap::{Parser, Subcommand};

/// cartremote CLI
#[derive(Parser, Debug)]
#[command(name = "cartremote-cli")]
#[command(about = "CLI for the cartremote remoting protocol")]
struct Args {
    /// Server address; defaults to the newest discovery record, then 127.0.0.1:8000
    #[arg(short, long)]
    server: Option<String>,

    /// Directory holding discovery records
    #[arg(long)]
    discovery_dir: Option<PathBuf>,

    /// Response timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Show the server banner
    Hello,

    /// Read memory
    Peek {
        /// Start address (decimal or 0x hex)
        addr: String,
        /// Number of bytes
        size: String,
    },

    /// Write memory
    Poke {
        /// Start address (decimal or 0x hex)
        addr: String,
        /// Hex bytes, e.g. "0a ff 10"
        data: String,
    },

    /// Evaluate a Lua expression
    Eval {
        /// Expression to evaluate
        expr: String,
    },

    /// Run a Lua statement
    Exec {
        /// Code to run
        code: String,
    },

    /// List visible Lua globals
    Globals,

    /// Show the current FPS
    Fps,

    /// List discovery records
    Sessions,

    /// Send a raw request (without the id)
    Raw {
        /// Request text, e.g. `load "game.lua" 1`
        line: String,
    },
}

fn main() {
    let args = Args::parse();
    let discovery_dir = args.discovery_dir.clone().or_else(Discovery::default_dir);

    let request = match &args.command {
        Commands::Sessions => {
            list_sessions(discovery_dir);
            return;
        }
        Commands::Ping => "ping".to_string(),
        Commands::Hello => "hello".to_string(),
        Commands::Peek { addr, size } => format!("peek {} {}", addr, size),
        Commands::Poke { addr, data } => format!("poke {} <{}>", addr, data),
        Commands::Eval { expr } => format!("evalexpr {}", quote(expr)),
        Commands::Exec { code } => format!("eval {}", quote(code)),
        Commands::Globals => "listglobals".to_string(),
        Commands::Fps => "getfps".to_string(),
        Commands::Raw { line } => line.clone(),
    };

    let server = args
        .server
        .clone()
        .or_else(|| newest_session(discovery_dir))
        .unwrap_or_else(|| "127.0.0.1:8000".to_string());

    match send(&server, &request, Duration::from_millis(args.timeout_ms)) {
        Ok(line) => println!("{}", line),
        Err(e) => {
            eprintln!("{}: {}", server, e);
            std::process::exit(1);
        }
    }
}

/// Quote `s` as a request string literal; characters the grammar cannot
/// carry (tabs, newlines, non-ASCII) become spaces.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push(' '),
        }
    }
    out.push('"');
    out
}

fn send(server: &str, request: &str, timeout: Duration) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(server)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.write_all(format!("1 {}\n", request).as_bytes())?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

fn newest_session(dir: Option<PathBuf>) -> Option<String> {
    let records = Discovery::list(&dir?).ok()?;
    records
        .first()
        .map(|r| format!("{}:{}", r.host, r.port))
}

fn list_sessions(dir: Option<PathBuf>) {
    let Some(dir) = dir else {
        eprintln!("no discovery directory");
        return;
    };
    match Discovery::list(&dir) {
        Ok(records) => {
            for r in records {
                println!(
                    "pid {:>7}  {}:{}  started {}  ({})",
                    r.pid, r.host, r.port, r.started_at, r.remoting_version
                );
            }
        }
        Err(e) => eprintln!("{}: {}", dir.display(), e),
    }
}
