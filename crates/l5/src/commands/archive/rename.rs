use clap::Args;
use miette::Result;
use tracing::info;

use super::{split_path, EditArgs};

#[derive(Args)]
pub struct RenameArgs {
    #[command(flatten)]
    archive: EditArgs,

    /// Full path of a file or a folder inside the archive
    #[arg(short, long)]
    path: String,

    /// The new name, without any folder
    #[arg(short, long)]
    name: String,
}

impl RenameArgs {
    pub fn handle(&self) -> Result<()> {
        let mut archive = self.archive.open()?;
        let (parent, old) = split_path(&self.path)?;
        let parent = archive.directory_mut().resolve_mut(parent)?;

        if parent.files().contains_key(old) {
            parent.rename_file(old, &self.name)?;
        } else {
            parent.rename_folder(old, &self.name)?;
        }
        info!("renamed {} to {}", self.path, self.name);

        self.archive.save(&mut archive)
    }
}
