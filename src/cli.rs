//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use bookmeta_core::provider::DEFAULT_MAX_RESULTS;
use bookmeta_core::{ReadingStatus, Region};
use clap::{Args as ClapArgs, Parser, Subcommand};

/// Resolve, deduplicate and enrich book records.
///
/// Bookmeta searches a local catalog and an ordered chain of bibliographic
/// providers (Google Books, Open Library, Amazon), stores one canonical row per
/// book and fills missing metadata without overwriting what is already there.
#[derive(Parser, Debug)]
#[command(name = "bookmeta")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/bookmeta/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Catalog database file (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the catalog and providers for a title, author or ISBN
    Search(SearchArgs),
    /// Add a book to a user's library, creating it when needed
    Add(AddArgs),
    /// Enrich catalog books from their external ids
    Enrich(EnrichArgs),
    /// List other editions of a catalog book
    Editions(EditionsArgs),
    /// Build marketplace purchase links
    Links(LinksArgs),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SearchArgs {
    /// Free-text query or ISBN
    pub term: String,

    /// Maximum number of results (1-40)
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_RESULTS, value_parser = clap::value_parser!(u32).range(1..=40))]
    pub max_results: u32,

    /// Locale used to pick the marketplace region (e.g. pt-BR, en-US)
    #[arg(long)]
    pub locale: Option<String>,

    /// Attach marketplace purchase links to each result
    #[arg(long)]
    pub links: bool,
}

#[derive(ClapArgs, Debug, Clone)]
#[command(group(
    clap::ArgGroup::new("identifier")
        .required(true)
        .args(["isbn", "google_id", "asin", "book_id"])
))]
pub struct AddArgs {
    /// Library owner
    #[arg(short, long)]
    pub user: String,

    /// ISBN-10 or ISBN-13
    #[arg(long)]
    pub isbn: Option<String>,

    /// Google Books volume id
    #[arg(long)]
    pub google_id: Option<String>,

    /// Amazon ASIN
    #[arg(long)]
    pub asin: Option<String>,

    /// Existing catalog book id
    #[arg(long)]
    pub book_id: Option<i64>,

    /// Hide the entry from other users
    #[arg(long)]
    pub private: bool,

    /// Reading status (want_to_read, reading, read, abandoned)
    #[arg(long, default_value_t = ReadingStatus::WantToRead)]
    pub status: ReadingStatus,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct EnrichArgs {
    /// Catalog book ids, processed one at a time
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<i64>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct EditionsArgs {
    /// Catalog book id
    pub book_id: i64,
}

#[derive(ClapArgs, Debug, Clone)]
#[command(group(
    clap::ArgGroup::new("target")
        .required(true)
        .args(["isbn", "asin", "title"])
))]
pub struct LinksArgs {
    /// ISBN to search for
    #[arg(long)]
    pub isbn: Option<String>,

    /// ASIN for a direct product link
    #[arg(long)]
    pub asin: Option<String>,

    /// Title to search for
    #[arg(long)]
    pub title: Option<String>,

    /// Marketplace regions (BR, US, UK, CA); defaults to all
    #[arg(short, long = "region", value_delimiter = ',')]
    pub regions: Vec<Region>,
}
