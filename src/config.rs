use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::ports::{self, FileStore, KeyValueStore, MemoryStore, SeedSource, StaticSeed};
use crate::store::MenuStore;

/// Terminal editor for hierarchical navigation menus.
#[derive(Parser, Debug)]
#[command(name = "menu-editor", version)]
pub struct Cli {
    /// Directory holding persisted state, exports and the log file
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Seed document used when nothing is persisted (file path or http(s) URL)
    #[arg(long, value_name = "PATH|URL")]
    pub seed: Option<String>,

    /// Keep state in memory only; nothing is written to the data directory
    #[arg(long)]
    pub ephemeral: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Write the current menu as a JSON document
    Export { path: Option<PathBuf> },
    /// Write the current menu as an HTML fragment
    Html { path: Option<PathBuf> },
    /// Discard persisted state and reload the seed
    Reset,
}

pub struct AppPaths {
    pub data_dir: PathBuf,
    pub store_dir: PathBuf,
    pub export_file: PathBuf,
    pub html_file: PathBuf,
    pub log_file: PathBuf,
}

impl AppPaths {
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Unable to determine home directory")?
                .join(".local/menu-editor"),
        };
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Unable to create {}", data_dir.display()))?;
        Ok(Self::in_dir(data_dir))
    }

    pub fn in_dir(data_dir: PathBuf) -> Self {
        Self {
            store_dir: data_dir.join("store"),
            export_file: data_dir.join("menu-export.json"),
            html_file: data_dir.join("menu.html"),
            log_file: data_dir.join("menu-editor.log"),
            data_dir,
        }
    }
}

impl Cli {
    pub fn seed_source(&self) -> Result<Box<dyn SeedSource>> {
        match &self.seed {
            Some(location) => ports::seed_from_location(location)
                .with_context(|| format!("Invalid seed location {location}")),
            None => Ok(Box::new(StaticSeed::bundled())),
        }
    }

    pub fn build_store(&self, paths: &AppPaths) -> Result<MenuStore> {
        let storage: Box<dyn KeyValueStore> = if self.ephemeral {
            Box::new(MemoryStore::new())
        } else {
            Box::new(FileStore::new(paths.store_dir.clone()))
        };
        Ok(MenuStore::new(storage, self.seed_source()?))
    }
}
