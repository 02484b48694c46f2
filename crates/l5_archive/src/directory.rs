//! In-memory tree of the folders and files of an archive.

use std::{
    cmp::Ordering,
    collections::VecDeque,
    fmt::{self, Display},
    mem,
    sync::Arc,
};

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::{
    error::{Error, FileNotFoundError, Result},
    stream::{EntryStatus, FileHandle},
};

/// A folder holding named subfolders and files
///
/// Folder names are unique among siblings and file names are unique within a folder, both
/// case-sensitive. Paths are `/` separated and empty segments are ignored, so `"/data/sub"`,
/// `"data/sub/"` and `"data//sub"` all resolve to the same folder.
///
/// Traversals that visit a whole subtree use an explicit stack, so deep trees do not exhaust the call
/// stack.
#[derive(Default)]
pub struct VirtualDirectory {
    name: String,
    folders: Vec<VirtualDirectory>,
    files: IndexMap<String, FileHandle>,
    status: EntryStatus,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn split_file_path(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", trimmed),
    }
}

/// Case-insensitive ordering, falling back to ordinal order for names differing only in case
fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::CustomError(format!(
            "{name:?} is not a valid entry name"
        )));
    }
    Ok(())
}

impl VirtualDirectory {
    /// An empty folder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folders: Vec::new(),
            files: IndexMap::new(),
            status: EntryStatus::default(),
        }
    }

    /// An empty unnamed root
    pub fn root() -> Self {
        Self::default()
    }

    /// Name of this folder, empty for a root
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Immediate subfolders
    pub fn folders(&self) -> &[VirtualDirectory] {
        &self.folders
    }

    /// Files directly inside this folder
    pub fn files(&self) -> &IndexMap<String, FileHandle> {
        &self.files
    }

    /// Modification marker
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Whether the folder has neither files nor subfolders
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }

    /// Immediate subfolder by name
    pub fn folder(&self, name: &str) -> Option<&VirtualDirectory> {
        self.folders.iter().find(|f| f.name == name)
    }

    /// Immediate subfolder by name
    pub fn folder_mut(&mut self, name: &str) -> Option<&mut VirtualDirectory> {
        self.folders.iter_mut().find(|f| f.name == name)
    }

    /// Walk a `/` separated path down from this folder
    pub fn resolve(&self, path: &str) -> Result<&VirtualDirectory> {
        let mut current = self;
        for segment in segments(path) {
            current = current
                .folder(segment)
                .ok_or_else(|| Error::PathNotFound(path.to_owned()))?;
        }
        Ok(current)
    }

    /// Walk a `/` separated path down from this folder
    pub fn resolve_mut(&mut self, path: &str) -> Result<&mut VirtualDirectory> {
        let mut current = self;
        for segment in segments(path) {
            current = current
                .folder_mut(segment)
                .ok_or_else(|| Error::PathNotFound(path.to_owned()))?;
        }
        Ok(current)
    }

    /// Whether `path` names a folder or a file below this folder
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok() || self.file(path).is_ok()
    }

    /// File at a full path such as `/data/x.bin`
    pub fn file(&self, path: &str) -> Result<&FileHandle> {
        let (parent, name) = split_file_path(path);
        self.resolve(parent)
            .ok()
            .and_then(|dir| dir.files.get(name))
            .ok_or_else(|| FileNotFoundError::Path(path.to_owned()).into())
    }

    /// File at a full path such as `/data/x.bin`
    pub fn file_mut(&mut self, path: &str) -> Result<&mut FileHandle> {
        let (parent, name) = split_file_path(path);
        self.resolve_mut(parent)
            .ok()
            .and_then(|dir| dir.files.get_mut(name))
            .ok_or_else(|| FileNotFoundError::Path(path.to_owned()).into())
    }

    /// Content of the file at `path`, loading it if needed
    pub fn read_file(&self, path: &str) -> Result<Arc<[u8]>> {
        self.file(path)?.read()
    }

    pub(crate) fn attach_folder(&mut self, folder: VirtualDirectory) -> Result<&mut VirtualDirectory> {
        if self.folder(&folder.name).is_some() {
            return Err(Error::DuplicateName(folder.name.clone()));
        }
        self.folders.push(folder);
        let last = self.folders.len() - 1;
        Ok(&mut self.folders[last])
    }

    /// Append a folder without checking its name, [`VirtualDirectory::reorganize`] merges duplicates
    pub(crate) fn push_folder(&mut self, folder: VirtualDirectory) {
        self.folders.push(folder);
    }

    pub(crate) fn attach_file(&mut self, name: impl Into<String>, handle: FileHandle) -> Result<()> {
        let name = name.into();
        if self.files.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        self.files.insert(name, handle);
        Ok(())
    }

    /// Walk `segments` down from this folder, creating missing folders with `status`
    pub(crate) fn ensure_path<'s>(
        &mut self,
        segments: impl IntoIterator<Item = &'s str>,
        status: EntryStatus,
    ) -> &mut VirtualDirectory {
        let mut current = self;
        for segment in segments {
            let index = match current.folders.iter().position(|f| f.name == segment) {
                Some(index) => index,
                None => {
                    let mut folder = VirtualDirectory::new(segment);
                    folder.status = status;
                    current.folders.push(folder);
                    current.folders.len() - 1
                }
            };
            current = &mut current.folders[index];
        }
        current
    }

    /// Add an existing folder as a child, marking it as added
    ///
    /// Fails with [`Error::DuplicateName`] when a sibling already has that name, the tree is left as
    /// it was.
    pub fn add_folder(&mut self, mut folder: VirtualDirectory) -> Result<&mut VirtualDirectory> {
        validate_name(&folder.name)?;
        folder.status = EntryStatus::Added;
        self.attach_folder(folder)
    }

    /// Create an empty child folder
    pub fn create_folder(&mut self, name: &str) -> Result<&mut VirtualDirectory> {
        self.add_folder(VirtualDirectory::new(name))
    }

    /// Create every missing folder along `path`, existing folders are reused
    pub fn create_folder_all(&mut self, path: &str) -> &mut VirtualDirectory {
        self.ensure_path(segments(path), EntryStatus::Added)
    }

    /// Add a file directly to this folder
    pub fn add_file(&mut self, name: &str, mut handle: FileHandle) -> Result<()> {
        validate_name(name)?;
        handle.set_status(EntryStatus::Added);
        self.attach_file(name, handle)
    }

    /// Add a file at a full path, creating the folders leading to it
    pub fn insert_file(&mut self, path: &str, handle: FileHandle) -> Result<()> {
        let (parent, name) = split_file_path(path);
        validate_name(name)?;
        if self
            .resolve(parent)
            .is_ok_and(|dir| dir.files.contains_key(name))
        {
            return Err(Error::DuplicateName(name.to_owned()));
        }
        self.create_folder_all(parent).add_file(name, handle)
    }

    /// Replace the content of an existing file of this folder
    pub fn replace_file(&mut self, name: &str, data: impl Into<Arc<[u8]>>) -> Result<()> {
        let handle = self
            .files
            .get_mut(name)
            .ok_or_else(|| FileNotFoundError::Name(name.to_owned()))?;
        handle.set_content(data);
        handle.set_status(EntryStatus::Replaced);
        Ok(())
    }

    /// Detach a file from this folder
    pub fn remove_file(&mut self, name: &str) -> Result<FileHandle> {
        self.files
            .shift_remove(name)
            .ok_or_else(|| FileNotFoundError::Name(name.to_owned()).into())
    }

    /// Detach a subfolder and everything below it
    pub fn remove_folder(&mut self, name: &str) -> Result<VirtualDirectory> {
        let index = self
            .folders
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::PathNotFound(name.to_owned()))?;
        Ok(self.folders.remove(index))
    }

    /// Rename a file in place, keeping its position
    pub fn rename_file(&mut self, old: &str, new: &str) -> Result<()> {
        validate_name(new)?;
        if old == new {
            return Ok(());
        }
        if self.files.contains_key(new) {
            return Err(Error::DuplicateName(new.to_owned()));
        }
        let (index, _, mut handle) = self
            .files
            .shift_remove_full(old)
            .ok_or_else(|| FileNotFoundError::Name(old.to_owned()))?;
        handle.set_status(EntryStatus::Replaced);
        self.files.shift_insert(index, new.to_owned(), handle);
        Ok(())
    }

    /// Rename a subfolder
    pub fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        validate_name(new)?;
        if old == new {
            return Ok(());
        }
        if self.folder(new).is_some() {
            return Err(Error::DuplicateName(new.to_owned()));
        }
        let folder = self
            .folder_mut(old)
            .ok_or_else(|| Error::PathNotFound(old.to_owned()))?;
        folder.name = new.to_owned();
        folder.status = EntryStatus::Replaced;
        Ok(())
    }

    /// Every folder of the subtree with its path, this folder first as `/`
    ///
    /// Paths end with a separator (`/data/`, `/data/sub/`) and parents come before their children.
    pub fn all_folders(&self) -> Vec<(String, &VirtualDirectory)> {
        let mut result = Vec::new();
        let mut stack = vec![("/".to_owned(), self)];
        while let Some((path, dir)) = stack.pop() {
            for child in dir.folders.iter().rev() {
                stack.push((format!("{path}{}/", child.name), child));
            }
            result.push((path, dir));
        }
        result
    }

    /// Every file of the subtree with its full path
    pub fn all_files(&self) -> Vec<(String, &FileHandle)> {
        self.all_folders()
            .into_iter()
            .flat_map(|(path, dir)| {
                dir.files
                    .iter()
                    .map(move |(name, handle)| (format!("{path}{name}"), handle))
            })
            .collect()
    }

    /// Every folder of the subtree, this one first
    fn subtree(&self) -> Vec<&VirtualDirectory> {
        let mut result = Vec::new();
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            stack.extend(dir.folders.iter());
            result.push(dir);
        }
        result
    }

    /// Total size in bytes of every file in the subtree
    pub fn size(&self) -> u64 {
        self.subtree()
            .par_iter()
            .map(|dir| dir.files.values().map(FileHandle::size).sum::<u64>())
            .sum()
    }

    /// Folders of the subtree whose name contains `query`, ignoring case
    pub fn search_directories(&self, query: &str) -> Vec<(String, &VirtualDirectory)> {
        let query = query.to_lowercase();
        let mut found: Vec<_> = self
            .all_folders()
            .into_par_iter()
            .skip(1)
            .filter(|(_, dir)| dir.name.to_lowercase().contains(&query))
            .collect();
        found.sort_by(|(a, _), (b, _)| a.cmp(b));
        found
    }

    /// Files of the subtree whose name contains `query`, ignoring case
    pub fn search_files(&self, query: &str) -> Vec<(String, &FileHandle)> {
        let query = query.to_lowercase();
        let mut found: Vec<_> = self
            .all_folders()
            .into_par_iter()
            .flat_map_iter(|(path, dir)| {
                let query = &query;
                dir.files
                    .iter()
                    .filter(move |(name, _)| name.to_lowercase().contains(query.as_str()))
                    .map(move |(name, handle)| (format!("{path}{name}"), handle))
            })
            .collect();
        found.sort_by(|(a, _), (b, _)| a.cmp(b));
        found
    }

    /// Sort folders and files of the whole subtree by name, ignoring case
    pub fn sort_alphabetically(&mut self) {
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            dir.folders.sort_by(|a, b| compare_names(&a.name, &b.name));
            dir.files.sort_by(|a, _, b, _| compare_names(a, b));
            stack.extend(dir.folders.iter_mut());
        }
    }

    /// Expand folders whose names are paths into nested folders
    ///
    /// Formats that only store leaf directories name them `data/sub/`. Each such folder is moved to
    /// the matching nested location, creating missing intermediate folders and merging with folders
    /// that already exist there. Running it again changes nothing.
    pub fn reorganize(&mut self) {
        let mut queue = VecDeque::from([self]);
        while let Some(dir) = queue.pop_front() {
            dir.expand_nested_names();
            queue.extend(dir.folders.iter_mut());
        }
    }

    fn expand_nested_names(&mut self) {
        let is_nested = |f: &VirtualDirectory| f.name.is_empty() || f.name.contains('/');
        loop {
            for folder in mem::take(&mut self.folders) {
                if !is_nested(&folder) && self.folder(&folder.name).is_none() {
                    self.folders.push(folder);
                    continue;
                }
                let path: Vec<String> = segments(&folder.name).map(str::to_owned).collect();
                self.ensure_path(path.iter().map(String::as_str), folder.status)
                    .merge(folder);
            }
            if !self.folders.iter().any(is_nested) {
                break;
            }
        }
    }

    /// Move the content of `other` into this folder, existing files win over incoming ones
    fn merge(&mut self, other: VirtualDirectory) {
        let mut work = vec![(Vec::<String>::new(), other)];
        while let Some((path, mut source)) = work.pop() {
            let target = self.ensure_path(path.iter().map(String::as_str), source.status);
            for (name, handle) in mem::take(&mut source.files) {
                target.files.entry(name).or_insert(handle);
            }
            for child in mem::take(&mut source.folders).into_iter().rev() {
                let mut child_path = path.clone();
                child_path.push(child.name.clone());
                work.push((child_path, child));
            }
        }
    }

    /// Full path of a folder of this subtree, matched by identity
    pub fn path_of(&self, target: &VirtualDirectory) -> Option<String> {
        self.all_folders()
            .into_iter()
            .find(|(_, dir)| std::ptr::eq(*dir, target))
            .map(|(path, _)| path)
    }

    /// Clear the modification marker of every folder and file in the subtree
    pub fn reset_status(&mut self) {
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            dir.status = EntryStatus::Original;
            dir.files
                .values_mut()
                .for_each(|f| f.set_status(EntryStatus::Original));
            stack.extend(dir.folders.iter_mut());
        }
    }
}

impl Clone for VirtualDirectory {
    fn clone(&self) -> Self {
        enum Visit<'a> {
            Enter(&'a VirtualDirectory),
            Leave(&'a VirtualDirectory),
        }

        // children are rebuilt before their parent, in order
        let mut work = vec![Visit::Enter(self)];
        let mut built: Vec<VirtualDirectory> = Vec::new();
        while let Some(visit) = work.pop() {
            match visit {
                Visit::Enter(dir) => {
                    work.push(Visit::Leave(dir));
                    work.extend(dir.folders.iter().rev().map(Visit::Enter));
                }
                Visit::Leave(dir) => {
                    let folders = built.split_off(built.len() - dir.folders.len());
                    built.push(VirtualDirectory {
                        name: dir.name.clone(),
                        folders,
                        files: dir.files.clone(),
                        status: dir.status,
                    });
                }
            }
        }
        built.pop().unwrap_or_default()
    }
}

impl Drop for VirtualDirectory {
    fn drop(&mut self) {
        let mut stack = mem::take(&mut self.folders);
        while let Some(mut dir) = stack.pop() {
            stack.append(&mut dir.folders);
        }
    }
}

impl fmt::Debug for VirtualDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualDirectory")
            .field("name", &self.name)
            .field(
                "folders",
                &self.folders.iter().map(|d| &d.name).collect::<Vec<_>>(),
            )
            .field("files", &self.files)
            .field("status", &self.status)
            .finish()
    }
}

impl Display for VirtualDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![(0usize, self)];
        while let Some((depth, dir)) = stack.pop() {
            let indent = "  ".repeat(depth);
            writeln!(f, "{indent}{}/", dir.name)?;
            for (name, handle) in &dir.files {
                writeln!(f, "{indent}  {name} ({} bytes)", handle.size())?;
            }
            stack.extend(dir.folders.iter().rev().map(|child| (depth + 1, child)));
        }
        Ok(())
    }
}
