use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    path::{Component, Path, PathBuf},
};
use tracing::info;

use super::Compression;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract what is below this folder
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Compression of the archive tables
    #[arg(long, value_enum, default_value_t)]
    compression: Compression,
}

/// Map an archive path below `base`, rejecting anything that would leave it
fn target(base: &Path, path: &str) -> Result<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(miette!("refusing to extract {path:?} outside of the target"));
    }
    Ok(base.join(relative))
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file, self.compression)?;
        let folder = archive.directory().resolve(&self.path)?;

        for (path, _) in folder.all_folders() {
            let p = target(&self.directory, &path)?;
            std::fs::create_dir_all(&p)
                .into_diagnostic()
                .context(format!("creating {}", p.display()))?;
        }

        for (path, handle) in folder.all_files() {
            let p = target(&self.directory, &path)?;
            info!("writing {}", p.display());

            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", p.display()))?
            };

            handle
                .copy_to(&mut out)
                .context(format!("copying {path}"))?;
        }
        Ok(())
    }
}
