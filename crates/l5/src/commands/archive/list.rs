use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use super::Compression;

#[derive(Args)]
pub struct ListArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Only list what is below this folder
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Print a folder tree instead of one file per line
    #[arg(long, default_value_t = false)]
    tree: bool,

    /// Compression of the archive tables
    #[arg(long, value_enum, default_value_t)]
    compression: Compression,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file, self.compression)?;
        let folder = archive.directory().resolve(&self.path)?;

        if self.tree {
            print!("{folder}");
            return Ok(());
        }

        let base = self.path.trim_end_matches('/');
        let files = folder.all_files();
        for (path, handle) in &files {
            println!("{:>10}  {base}{path}", handle.size().dimmed());
        }

        let folders = folder
            .all_folders()
            .iter()
            .filter(|(_, dir)| dir.files().is_empty() && dir.folders().is_empty())
            .map(|(path, _)| format!("{base}{path}"))
            .join(", ");
        if !folders.is_empty() {
            println!("{} {folders}", "empty:".yellow());
        }

        println!(
            "{} {} files, {} bytes",
            archive.kind().bold(),
            files.len(),
            folder.size()
        );
        Ok(())
    }
}
