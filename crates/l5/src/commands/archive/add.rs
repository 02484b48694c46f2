use clap::Args;
use l5_archive::FileHandle;
use miette::{Context, IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::info;

use super::{split_path, EditArgs};

#[derive(Args)]
pub struct AddArgs {
    #[command(flatten)]
    archive: EditArgs,

    /// A local file to add
    #[arg(short, long, value_name = "FILE")]
    source: PathBuf,

    /// Full path of the file inside the archive, folders are created as needed
    #[arg(short, long)]
    path: String,

    /// Replace the content of an existing file
    #[arg(long, default_value_t = false)]
    replace: bool,
}

impl AddArgs {
    pub fn handle(&self) -> Result<()> {
        let data = std::fs::read(&self.source)
            .into_diagnostic()
            .context(format!("reading {}", self.source.display()))?;

        let mut archive = self.archive.open()?;
        let root = archive.directory_mut();
        let (parent, name) = split_path(&self.path)?;

        if self.replace && root.exists(&self.path) {
            info!("replacing {}", self.path);
            root.resolve_mut(parent)?.replace_file(name, data)?;
        } else {
            info!("adding {}", self.path);
            root.insert_file(&self.path, FileHandle::from_bytes(data))?;
        }

        self.archive.save(&mut archive)
    }
}
