// Command-line interface

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "seowatch")]
#[command(about = "SeoWatch - scheduled SEO monitoring and optimization", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the API server and the scan scheduler
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long, env = "HOST")]
        host: Option<String>,
    },

    /// Run database migrations
    Migrate,

    /// Run one scheduler cycle now and print the report
    Rescan,

    /// Analyze a URL and print its score without storing anything
    Scan {
        /// Website URL; a bare domain is treated as https
        url: String,
    },

    /// Create a user and print a session token
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long, default_value = "free")]
        plan: String,

        /// member or admin
        #[arg(long, default_value = "member")]
        role: String,
    },

    /// Move a user to another plan
    SetPlan {
        #[arg(long)]
        email: String,

        #[arg(long)]
        plan: String,
    },

    /// Sync plan limits from the plans file into the database
    SyncPlans,
}
