//! czdb-search: look up IP addresses in a CZDB database from the command line.

use clap::Parser;
use czdb_search::{OpenOptions, SearchMode, Searcher};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "czdb-search")]
#[command(version)]
#[command(about = "Look up IP addresses in a CZDB database", long_about = None)]
struct Cli {
    /// Path to the CZDB database file
    #[arg(short = 'p', long = "path")]
    db_path: PathBuf,

    /// Base64 encoded decryption key
    #[arg(short, long, env = "CZDB_KEY", hide_env_values = true)]
    key: String,

    /// Search mode: memory or btree
    #[arg(short, long, default_value = "btree")]
    mode: SearchMode,

    /// Reject databases issued to another client or past their expiration date
    #[arg(long)]
    verify_license: bool,

    /// Print database information before querying
    #[arg(long)]
    info: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Addresses to look up; reads them interactively from stdin when omitted
    ips: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let searcher = match OpenOptions::new()
        .mode(cli.mode)
        .verify_license(cli.verify_license)
        .open(&cli.db_path, &cli.key)
    {
        Ok(searcher) => searcher,
        Err(e) => {
            eprintln!("Error initializing database searcher: {}", e);
            std::process::exit(1);
        }
    };

    if cli.info {
        println!("{}", searcher.info());
    }

    if cli.ips.is_empty() {
        if let Err(e) = interactive(&searcher) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    } else {
        let mut failed = false;
        for ip in &cli.ips {
            failed |= !print_result(&searcher, ip);
        }
        if failed {
            std::process::exit(1);
        }
    }
}

fn print_result(searcher: &Searcher, ip: &str) -> bool {
    match searcher.search(ip) {
        Ok(region) => {
            println!("{}\t{}", ip, region);
            true
        }
        Err(e) => {
            eprintln!("Error searching for IP {}: {}", ip, e);
            false
        }
    }
}

fn interactive(searcher: &Searcher) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Enter IP address (or 'q' to quit): ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let input = line?;
        let input = input.trim();
        match input {
            "" => continue,
            "q" | "quit" => break,
            ip => {
                print_result(searcher, ip);
            }
        }
    }
    Ok(())
}
