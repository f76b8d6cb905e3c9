use clap::{Parser, Subcommand};

/// crawldeck: authenticated admin backend for Scrapyd crawl daemons
#[derive(Parser)]
#[command(name = "crawldeck", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind (overrides CRAWLDECK_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides CRAWLDECK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage directory users (requires DATABASE_URL)
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Add {
        #[arg(long)]
        username: String,
        #[arg(long, env = "CRAWLDECK_NEW_USER_PASSWORD")]
        password: String,
        /// Scope embedded in the user's tokens
        #[arg(long, default_value = "user")]
        scope: String,
    },
    /// List users
    List,
    /// Block a user from authenticating
    Deactivate { username: String },
    /// Re-enable a deactivated user
    Activate { username: String },
}
