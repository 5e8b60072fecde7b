//! Command-line interface parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use animeverse_api::traits::CatalogIds;
use animeverse_core::config::StoreKind;

/// Resolve anime cover and banner art
#[derive(Parser, Debug)]
#[command(name = "animeverse")]
#[command(about = "Resolve anime cover and banner art from Jikan and AniList")]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the user config
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve images for an entry and print them as JSON
    Resolve {
        #[command(flatten)]
        ids: IdArgs,

        /// Override the configured image store
        #[arg(long, value_enum)]
        store: Option<StoreArg>,
    },
    /// Show the locally stored images for an entry
    Lookup {
        #[command(flatten)]
        ids: IdArgs,
    },
    /// Delete local rows older than `store.stale_after_days`
    Prune,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// MyAnimeList ID (cover art via Jikan)
    #[arg(long, value_name = "ID")]
    pub mal_id: Option<u64>,

    /// AniList ID (banner art via AniList)
    #[arg(long, value_name = "ID")]
    pub anilist_id: Option<u64>,
}

impl IdArgs {
    pub fn catalog_ids(&self) -> CatalogIds {
        CatalogIds::new(self.mal_id, self.anilist_id)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreArg {
    Local,
    Remote,
    None,
}

impl From<StoreArg> for StoreKind {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Local => StoreKind::Local,
            StoreArg::Remote => StoreKind::Remote,
            StoreArg::None => StoreKind::None,
        }
    }
}

/// Default log filter for the verbosity flag.
pub fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "animeverse=debug,animeverse_core=debug,animeverse_api=debug,animeverse_runtime=debug"
    } else {
        "animeverse=info,animeverse_core=info,animeverse_api=info,animeverse_runtime=info"
    }
}
