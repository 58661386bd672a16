//! Sealpost command-line client.
//!
//! # Usage
//!
//! ```bash
//! # Create an account on this device (stores the private key locally)
//! sealpost register --username alice --email alice@example.com --password hunter22
//!
//! # Sign in on another device
//! sealpost --data-dir ~/.sealpost-laptop login --email alice@example.com --password hunter22
//!
//! # Find someone to talk to, then chat
//! sealpost users --search bo
//! sealpost chat --peer 2
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod chat;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sealpost_client::{HttpConfig, Session, SyncConfig, transport::HttpApi};
use sealpost_core::{AccountService, RedbStore, User, UserDirectory};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sealpost end-to-end encrypted messaging client
#[derive(Parser, Debug)]
#[command(name = "sealpost")]
#[command(about = "End-to-end encrypted two-party messaging client")]
#[command(version)]
struct Args {
    /// Base URL of the Sealpost API
    #[arg(short, long, default_value = "http://localhost:8000")]
    server: String,

    /// Directory holding this device's local profile
    #[arg(short, long, default_value = ".sealpost")]
    data_dir: PathBuf,

    /// Interval between conversation polls, in milliseconds
    #[arg(long, default_value = "3000")]
    poll_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and keep its private key on this device
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in to an existing account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and remove the private key from this device
    Logout,
    /// List users, or search them by username
    Users {
        #[arg(long)]
        search: Option<String>,
    },
    /// Chat with a peer until `/quit` or end of input
    Chat {
        /// Peer user id
        #[arg(long)]
        peer: String,
    },
}

fn open_profile(data_dir: &Path) -> Result<RedbStore, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    Ok(RedbStore::open(data_dir.join("sealpost.redb"))?)
}

fn signed_in(store: RedbStore) -> Result<Session<RedbStore>, Box<dyn std::error::Error>> {
    Session::restore(store)?.ok_or_else(|| "not signed in, run `sealpost login` first".into())
}

fn describe(user: &User) -> String {
    let key = if user.public_key.is_some() { "" } else { "  (no public key)" };
    format!("{:<12} {}{key}", user.id, user.username)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let api = HttpApi::new(&HttpConfig::with_base_url(&args.server))?;
    let store = open_profile(&args.data_dir)?;

    tracing::debug!(server = %args.server, data_dir = %args.data_dir.display(), "profile opened");

    match args.command {
        Command::Register { username, email, password } => {
            let registration = api.register(&username, &email, &password).await?;
            let session = Session::sign_in(store, registration.user, registration.private_key)?;
            println!("registered {}", describe(session.user()));
        },
        Command::Login { email, password } => {
            let registration = api.login(&email, &password).await?;
            let session = Session::sign_in(store, registration.user, registration.private_key)?;
            println!("signed in as {}", describe(session.user()));
            if session.private_key()?.is_none() {
                eprintln!("no private key on this device, incoming messages cannot be decrypted");
            }
        },
        Command::Logout => match Session::restore(store)? {
            Some(session) => {
                session.sign_out()?;
                println!("signed out");
            },
            None => println!("not signed in"),
        },
        Command::Users { search } => {
            let session = Session::restore(store)?;
            let excluding = session.as_ref().map(Session::user_id);
            let users = match search {
                Some(query) => api.search_users(&query, excluding).await?,
                None => api.list_users(excluding).await?,
            };
            for user in &users {
                println!("{}", describe(user));
            }
        },
        Command::Chat { peer } => {
            let session = signed_in(store)?;
            let peer = api.get_user(&peer.as_str().into()).await?;
            let config = SyncConfig::from_millis(args.poll_interval_ms);
            chat::run(session, api, peer, config).await?;
        },
    }

    Ok(())
}
