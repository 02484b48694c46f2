use clap::Args;
use miette::Result;
use tracing::info;

use super::{split_path, EditArgs};

#[derive(Args)]
pub struct RemoveArgs {
    #[command(flatten)]
    archive: EditArgs,

    /// Full path of a file or a folder inside the archive
    #[arg(short, long)]
    path: String,
}

impl RemoveArgs {
    pub fn handle(&self) -> Result<()> {
        let mut archive = self.archive.open()?;
        let (parent, name) = split_path(&self.path)?;
        let parent = archive.directory_mut().resolve_mut(parent)?;

        if parent.files().contains_key(name) {
            parent.remove_file(name)?;
            info!("removed file {}", self.path);
        } else {
            let folder = parent.remove_folder(name)?;
            info!("removed folder {} with {} files", self.path, folder.all_files().len());
        }

        self.archive.save(&mut archive)
    }
}
