use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use l5_archive::{Archive, ArchiveKind, ArchiveOptions, CompressionMethod, Format};
use miette::{miette, Context, Result};
use tracing::{debug, info};

pub mod add;
pub mod extract;
pub mod list;
pub mod pack;
pub mod remove;
pub mod rename;
pub mod search;

#[derive(clap::Subcommand)]
pub enum ArchiveCommands {
    /// List the files of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Find files and folders by name
    Search(search::SearchArgs),
    /// Pack a directory into a new archive
    Pack(pack::PackArgs),
    /// Add or replace a file
    Add(add::AddArgs),
    /// Remove a file or a folder
    Remove(remove::RemoveArgs),
    /// Rename a file or a folder
    Rename(rename::RenameArgs),
}

impl ArchiveCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            ArchiveCommands::List(list) => list.handle(),
            ArchiveCommands::Extract(extract) => extract.handle(),
            ArchiveCommands::Search(search) => search.handle(),
            ArchiveCommands::Pack(pack) => pack.handle(),
            ArchiveCommands::Add(add) => add.handle(),
            ArchiveCommands::Remove(remove) => remove.handle(),
            ArchiveCommands::Rename(rename) => rename.handle(),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    #[default]
    None,
    Zlib,
}

impl From<Compression> for CompressionMethod {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => CompressionMethod::None,
            Compression::Zlib => CompressionMethod::Zlib,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Arc0,
    Xfsa,
    Xpck,
    Xfsp,
}

impl From<Kind> for ArchiveKind {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Arc0 => ArchiveKind::Arc0,
            Kind::Xfsa => ArchiveKind::Xfsa,
            Kind::Xpck => ArchiveKind::Xpck,
            Kind::Xfsp => ArchiveKind::Xfsp,
        }
    }
}

/// Arguments shared by every command editing an existing archive
#[derive(Args)]
pub struct EditArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Where to write the result, the input is replaced when missing
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Compression of the archive tables
    #[arg(long, value_enum, default_value_t)]
    compression: Compression,
}

impl EditArgs {
    pub fn open(&self) -> Result<Archive> {
        open(&self.file, self.compression)
    }

    /// Save `archive` to the output, refusing to overwrite a ZIP input with archive data
    pub fn save(&self, archive: &mut Archive) -> Result<()> {
        let target = match &self.output {
            Some(output) => output,
            None if matches!(Format::from_extension(&self.file), Ok(Format::Zip)) => {
                return Err(miette!(
                    help = "pass --output to write a new archive",
                    "{} is a zip file and can only be read",
                    self.file.display()
                ));
            }
            None => &self.file,
        };
        save(archive, target)
    }
}

pub fn open(path: &Path, compression: Compression) -> Result<Archive> {
    let options = ArchiveOptions::builder()
        .table_compression(compression.into())
        .build();
    let archive = Archive::open_path(path, options)
        .context(format!("opening {}", path.display()))?;
    debug!("opened {} as {}", path.display(), archive.kind());
    Ok(archive)
}

pub fn save(archive: &mut Archive, path: &Path) -> Result<()> {
    info!("writing {}", path.display());
    let mut last_logged = 0;
    archive
        .save(
            path,
            Some(&mut |percent: u8| {
                if percent >= last_logged + 10 || percent == 100 {
                    debug!("{percent}%");
                    last_logged = percent;
                }
            }),
        )
        .context(format!("writing {}", path.display()))
}

/// Split an archive path into its folder and its last name
pub fn split_path(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let (parent, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
    if name.is_empty() {
        return Err(miette!("{path:?} does not name a file or a folder"));
    }
    Ok((parent, name))
}

#[cfg(test)]
mod test {
    use super::split_path;

    #[test]
    fn split_paths() {
        assert_eq!(split_path("/data/x.bin").ok(), Some(("/data", "x.bin")));
        assert_eq!(split_path("/data/sub/").ok(), Some(("/data", "sub")));
        assert_eq!(split_path("readme.txt").ok(), Some(("", "readme.txt")));
        assert!(split_path("/").is_err());
    }
}
