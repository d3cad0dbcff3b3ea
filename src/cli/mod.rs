// PassGuard — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, serve, add-user, list-users, delete-user, activity.

mod commands;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// PassGuard — role-based credential management backend.
#[derive(Parser, Debug)]
#[command(name = "passguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the database and seed the root account (idempotent).
    Init {
        /// Email for the root account.
        #[arg(long)]
        email: String,

        /// Password for the root account.
        #[arg(long)]
        password: String,
    },

    /// Start the JSON-RPC gateway on a Unix domain socket.
    Serve,

    /// Create a user account directly in the database.
    AddUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "")]
        full_name: String,

        /// One of: super_admin, admin, user.
        #[arg(long, default_value = "user")]
        role: String,

        /// Comma-separated category grants (web_software, database, network).
        #[arg(long, default_value = "")]
        categories: String,
    },

    /// List all visible user accounts.
    ListUsers,

    /// Delete a user account and its activity trail.
    DeleteUser {
        /// Numeric id of the account to delete.
        id: i64,
    },

    /// Show the activity log, newest first.
    Activity {
        /// Include entries normally hidden from the audit surface.
        #[arg(long, default_value = "false")]
        include_privileged: bool,

        /// Maximum number of entries to print.
        #[arg(long)]
        limit: Option<u32>,

        /// Number of entries to skip.
        #[arg(long, default_value = "0")]
        offset: u32,
    },
}
