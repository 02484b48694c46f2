use clap::Args;
use l5_archive::{Archive, ArchiveKind, ArchiveOptions, FileHandle, Format};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use super::{Compression, Kind};

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// The archive format, guessed from the target extension when missing
    #[arg(short, long, value_enum)]
    kind: Option<Kind>,

    /// Compression of the archive tables
    #[arg(long, value_enum, default_value_t)]
    compression: Compression,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

/// Archive path of `path` below `base`, separated by '/'
fn archive_path(base: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).into_diagnostic()?;
    let segments = relative
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", relative.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("/{}", segments.join("/")))
}

impl PackArgs {
    fn kind(&self) -> Result<ArchiveKind> {
        if let Some(kind) = self.kind {
            return Ok(kind.into());
        }
        match Format::from_extension(&self.file)? {
            Format::Archive(kind) => Ok(kind),
            Format::Zip => Err(miette!(
                help = "pass --kind to pick an archive format",
                "zip files can not be written"
            )),
        }
    }

    pub fn handle(&self) -> Result<()> {
        let kind = self.kind()?;
        info!("creating {} as {kind}", self.file.display());

        if self.file.exists() && !self.overwrite {
            return Err(miette!(
                help = "pass --overwrite to replace it",
                "{} already exists",
                self.file.display()
            ));
        }

        let entries = WalkDir::new(&self.directory)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .collect::<Vec<_>>();

        if !entries.iter().any(|e| !e.file_type().is_dir()) {
            return Err(miette!("directory is empty"));
        }

        let options = ArchiveOptions::builder()
            .table_compression(self.compression.into())
            .build();
        let mut archive = Archive::new(kind, options);
        let root = archive.directory_mut();

        for entry in entries {
            let name = archive_path(&self.directory, entry.path())?;
            if entry.file_type().is_dir() {
                root.create_folder_all(&name);
                continue;
            }
            info!("packing {name}");

            let data = std::fs::read(entry.path())
                .into_diagnostic()
                .context(format!("reading {}", entry.path().display()))?;
            root.insert_file(&name, FileHandle::from_bytes(data))
                .context(format!("adding {name}"))?;
        }

        root.sort_alphabetically();
        super::save(&mut archive, &self.file)
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::archive_path;

    #[test]
    fn archive_paths_use_slashes() {
        let base = Path::new("input");
        assert_eq!(
            archive_path(base, &base.join("data").join("x.bin")).ok(),
            Some("/data/x.bin".to_owned())
        );
        assert!(archive_path(base, Path::new("elsewhere/x.bin")).is_err());
    }
}
