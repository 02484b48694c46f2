use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use super::Compression;

#[derive(Args)]
pub struct SearchArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Part of a name, matched without regard to case
    query: String,

    /// Search folder names instead of file names
    #[arg(long, default_value_t = false)]
    folders: bool,

    /// Compression of the archive tables
    #[arg(long, value_enum, default_value_t)]
    compression: Compression,
}

impl SearchArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file, self.compression)?;
        let root = archive.directory();

        let count = if self.folders {
            let found = root.search_directories(&self.query);
            for (path, _) in &found {
                println!("{}", path.blue());
            }
            found.len()
        } else {
            let found = root.search_files(&self.query);
            for (path, handle) in &found {
                println!("{:>10}  {path}", handle.size().dimmed());
            }
            found.len()
        };

        println!("{} matches for {:?}", count.bold(), self.query);
        Ok(())
    }
}
