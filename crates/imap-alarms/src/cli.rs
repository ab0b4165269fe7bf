//! Clap derive structures for the `imap-alarms` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this module
//! depends on nothing but clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// imap-alarms -- mirror OpenNMS alarms into a mailbox
#[derive(Debug, Parser)]
#[command(
    name = "imap-alarms",
    version,
    about = "Mirror OpenNMS alarms into a mailbox and sync flags back",
    long_about = "Keeps one mail message per non-cleared OpenNMS alarm.\n\n\
        Reading a message acknowledges its alarm, marking it unread\n\
        unacknowledges it, and deleting it clears the alarm.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (default: ./imap-alarms.toml)
    #[arg(long, env = "IMAP_ALARMS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// OpenNMS base URL
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// OpenNMS user
    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,

    /// OpenNMS password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Advertised IMAP port of the mailbox
    #[arg(long, global = true)]
    pub imap_port: Option<u16>,

    /// Mailbox login
    #[arg(long, global = true)]
    pub imap_username: Option<String>,

    /// Mailbox password
    #[arg(long, global = true)]
    pub imap_password: Option<String>,

    /// Mailbox address, also used as sender and recipient
    #[arg(long, global = true)]
    pub imap_email: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Seconds between reconciliation cycles
    #[arg(long, short = 'd', global = true)]
    pub delay: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// What a failed alarm fetch does
    #[arg(long, global = true)]
    pub on_fetch_error: Option<FetchErrorMode>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FetchErrorMode {
    /// Log and retry on the next cycle
    Skip,
    /// Stop with an error
    Fatal,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted
    Run,

    /// Run a single reconciliation cycle and print the counts
    Once,

    /// Print the effective configuration (secrets redacted)
    Config,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
