//! Path resolution: run/ignore specs to an ordered, deduplicated file list.
//!
//! A spec names a directory (walked recursively, lexicographic per level), a
//! code or documentation file (taken as is), or any other file, which is read
//! as a manifest of further specs, one per line. Inside a manifest, only files
//! with a manifest extension are expanded again; any other file is taken as
//! is. Manifests are expanded with an explicit worklist so nesting depth is
//! bounded and cycles are detected.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::core::dialect::ExtensionTable;
use crate::core::filter::{IgnoreSet, filter_candidates};

/// Final ordered list of files to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFileSet {
    pub files: Vec<PathBuf>,
}

impl ResolvedFileSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Files and directories produced by expanding one spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Any unresolvable entry fails the whole expansion.
    Strict,
    /// Unresolvable entries are logged and skipped.
    Lenient,
}

struct Work {
    /// Path as written, anchored only once it is processed.
    spec: PathBuf,
    depth: usize,
    /// Manifests currently being expanded above this entry.
    chain: Vec<PathBuf>,
}

const DEFAULT_MANIFEST_EXTENSIONS: [&str; 1] = ["list"];

#[derive(Debug, Clone)]
pub struct Resolver {
    base: PathBuf,
    extensions: ExtensionTable,
    manifest_extensions: Vec<String>,
    max_depth: usize,
}

impl Resolver {
    /// `base` anchors relative specs; `extensions` decides which files are code.
    pub fn new(base: impl Into<PathBuf>, extensions: ExtensionTable, max_depth: usize) -> Self {
        Self {
            base: base.into(),
            extensions,
            manifest_extensions: DEFAULT_MANIFEST_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_depth,
        }
    }

    /// Extensions that mark a file listed inside a manifest as a nested manifest.
    pub fn with_manifest_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.manifest_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Resolve `run_spec` minus everything matched by `ignore_spec`.
    #[instrument(skip(self), fields(base = %self.base.display()))]
    pub fn resolve(&self, run_spec: &str, ignore_spec: Option<&str>) -> Result<ResolvedFileSet> {
        let candidates = self.expand(run_spec)?;
        let ignore = match ignore_spec {
            Some(spec) => self.ignore_set(spec),
            None => IgnoreSet::default(),
        };
        let files = filter_candidates(candidates.files, &ignore);
        debug!(files = files.len(), "resolved file set");
        Ok(ResolvedFileSet { files })
    }

    /// Expand a run spec. Missing paths fail the expansion.
    pub fn expand(&self, spec: &str) -> Result<Expansion> {
        self.expand_with(spec, Mode::Strict)
    }

    /// Expand an ignore spec. Never fails; bad entries ignore nothing.
    ///
    /// Manifests named by the spec are ignored themselves as well as expanded.
    pub fn ignore_set(&self, spec: &str) -> IgnoreSet {
        let mut ignore = IgnoreSet::default();
        match self.expand_with(spec, Mode::Lenient) {
            Ok(expansion) => {
                for file in expansion.files {
                    ignore.add_file(file);
                }
                for dir in expansion.dirs {
                    ignore.add_dir(dir);
                }
            }
            Err(err) => warn!(spec, err = %format!("{err:#}"), "ignore spec not usable"),
        }
        ignore
    }

    fn expand_with(&self, spec: &str, mode: Mode) -> Result<Expansion> {
        let mut expansion = Expansion::default();
        let mut stack = vec![Work {
            spec: PathBuf::from(spec.trim()),
            depth: 0,
            chain: Vec::new(),
        }];

        while let Some(work) = stack.pop() {
            match self.expand_one(work, mode, &mut expansion, &mut stack) {
                Ok(()) => {}
                Err(err) if mode == Mode::Lenient => {
                    warn!(err = %format!("{err:#}"), "skipping unresolvable ignore entry");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(expansion)
    }

    fn expand_one(
        &self,
        work: Work,
        mode: Mode,
        out: &mut Expansion,
        stack: &mut Vec<Work>,
    ) -> Result<()> {
        let path = match work.chain.last() {
            Some(manifest) => {
                if !work.spec.is_absolute() && !is_explicitly_relative(&work.spec) {
                    bail!(
                        "ambiguous relative path {} in manifest {} (use an absolute path or prefix with ./)",
                        work.spec.display(),
                        manifest.display()
                    );
                }
                let anchored = self.anchor(&work.spec);
                fs::canonicalize(&anchored).with_context(|| {
                    format!(
                        "manifest {} references missing path {}",
                        manifest.display(),
                        anchored.display()
                    )
                })?
            }
            None => {
                let anchored = self.anchor(&work.spec);
                fs::canonicalize(&anchored)
                    .with_context(|| format!("path {} does not exist", anchored.display()))?
            }
        };

        if path.is_dir() {
            return self.walk_dir(&path, out);
        }
        if self.is_code_file(&path) {
            out.files.push(path);
            return Ok(());
        }
        if !work.chain.is_empty() && !self.is_manifest_file(&path) {
            out.files.push(path);
            return Ok(());
        }

        if mode == Mode::Lenient {
            out.files.push(path.clone());
        }
        if work.chain.contains(&path) {
            warn!(manifest = %path.display(), "manifest includes itself, skipping");
            return Ok(());
        }
        if work.depth >= self.max_depth {
            bail!(
                "manifest nesting deeper than {} at {}",
                self.max_depth,
                path.display()
            );
        }

        let entries = read_manifest(&path)?;
        debug!(manifest = %path.display(), entries = entries.len(), "expanding manifest");
        let mut chain = work.chain;
        chain.push(path);
        for spec in entries.into_iter().rev() {
            stack.push(Work {
                spec,
                depth: work.depth + 1,
                chain: chain.clone(),
            });
        }
        Ok(())
    }

    fn walk_dir(&self, dir: &Path, out: &mut Expansion) -> Result<()> {
        out.dirs.push(dir.to_path_buf());
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
            if entry.file_type().is_file() {
                out.files.push(entry.into_path());
            }
        }
        Ok(())
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    fn is_code_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.lookup(ext).is_some())
    }

    fn is_manifest_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.manifest_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

/// Manifest entries in line order, blank lines skipped.
fn read_manifest(manifest: &Path) -> Result<Vec<PathBuf>> {
    let contents = fs::read_to_string(manifest)
        .with_context(|| format!("read manifest {}", manifest.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn is_explicitly_relative(path: &Path) -> bool {
    matches!(
        path.components().next(),
        Some(Component::CurDir | Component::ParentDir)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dialect::{Dialect, FileKind};

    fn table() -> ExtensionTable {
        ExtensionTable::new([
            ("py", FileKind::Source(Dialect::Python)),
            ("groovy", FileKind::Source(Dialect::Groovy)),
            ("md", FileKind::Documentation),
        ])
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, "x\n").expect("write");
    }

    fn names(root: &Path, set: &ResolvedFileSet) -> Vec<String> {
        let root = fs::canonicalize(root).expect("canonicalize");
        set.files
            .iter()
            .map(|file| {
                file.strip_prefix(&root)
                    .expect("under root")
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn walks_directory_lexicographically() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("c.txt"));
        touch(&root.join("a.py"));
        touch(&root.join("b/z.md"));
        touch(&root.join("b/a.py"));

        let resolver = Resolver::new(root, table(), 8);
        let set = resolver.resolve(".", None).expect("resolve");
        assert_eq!(names(root, &set), vec!["a.py", "b/a.py", "b/z.md", "c.txt"]);
    }

    #[test]
    fn single_code_file_resolves_to_itself() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(&temp.path().join("only.py"));
        let resolver = Resolver::new(temp.path(), table(), 8);
        let set = resolver.resolve("only.py", None).expect("resolve");
        assert_eq!(names(temp.path(), &set), vec!["only.py"]);
    }

    #[test]
    fn manifests_expand_transitively_in_line_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("one.py"));
        touch(&root.join("two.md"));
        touch(&root.join("dir/three.py"));
        fs::write(root.join("inner.list"), "./dir\n\n./one.py\n").expect("write");
        fs::write(root.join("outer.list"), "./two.md\n./inner.list\n./two.md\n").expect("write");

        let resolver = Resolver::new(root, table(), 8);
        let set = resolver.resolve("outer.list", None).expect("resolve");
        assert_eq!(names(root, &set), vec!["two.md", "dir/three.py", "one.py"]);
    }

    #[test]
    fn manifest_with_missing_entry_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::write(root.join("run.list"), "./missing.py\n").expect("write");
        let resolver = Resolver::new(root, table(), 8);
        let err = resolver.resolve("run.list", None).unwrap_err();
        assert!(format!("{err:#}").contains("references missing path"));
    }

    #[test]
    fn manifest_rejects_bare_relative_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a.py"));
        fs::write(root.join("run.list"), "a.py\n").expect("write");
        let resolver = Resolver::new(root, table(), 8);
        let err = resolver.resolve("run.list", None).unwrap_err();
        assert!(format!("{err:#}").contains("ambiguous relative path"));
    }

    #[test]
    fn missing_run_path_fails_but_empty_dir_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir(root.join("empty")).expect("mkdir");
        let resolver = Resolver::new(root, table(), 8);
        assert!(resolver.resolve("nope", None).is_err());
        let set = resolver.resolve("empty", None).expect("resolve");
        assert!(set.is_empty());
    }

    #[test]
    fn self_referencing_manifest_terminates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a.py"));
        fs::write(root.join("loop.list"), "./loop.list\n./a.py\n").expect("write");
        let resolver = Resolver::new(root, table(), 8);
        let set = resolver.resolve("loop.list", None).expect("resolve");
        assert_eq!(names(root, &set), vec!["a.py"]);
    }

    #[test]
    fn manifest_depth_is_bounded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::write(root.join("m0.list"), "./m1.list\n").expect("write");
        fs::write(root.join("m1.list"), "./m2.list\n").expect("write");
        fs::write(root.join("m2.list"), "./m3.list\n").expect("write");
        fs::write(root.join("m3.list"), "").expect("write");
        let resolver = Resolver::new(root, table(), 2);
        let err = resolver.resolve("m0.list", None).unwrap_err();
        assert!(err.to_string().contains("nesting deeper than 2"));
    }

    #[test]
    fn ignore_directory_excludes_descendants() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a.py"));
        touch(&root.join("sub_dir/b.py"));
        touch(&root.join("sub_dir/deeper/c.md"));
        fs::write(root.join("ignore.list"), "./sub_dir/\n").expect("write");

        let resolver = Resolver::new(root, table(), 8);
        let set = resolver
            .resolve(".", Some("ignore.list"))
            .expect("resolve");
        assert_eq!(names(root, &set), vec!["a.py"]);
    }

    #[test]
    fn ignore_list_excludes_plain_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a.py"));
        fs::write(root.join("c.txt"), "Some notes
spanning lines
").expect("write");
        fs::write(root.join("ignore.list"), "./c.txt
").expect("write");

        let resolver = Resolver::new(root, table(), 8);
        let set = resolver
            .resolve(".", Some("ignore.list"))
            .expect("resolve");
        assert_eq!(names(root, &set), vec!["a.py"]);
    }

    #[test]
    fn manifest_entries_without_manifest_extension_are_plain_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a.py"));
        fs::write(root.join("LICENSE"), "MIT License

Copyright
").expect("write");
        fs::write(root.join("notes.txt"), "free text
").expect("write");
        fs::write(root.join("run.list"), "./a.py
./LICENSE
./notes.txt
").expect("write");

        let resolver = Resolver::new(root, table(), 8);
        let set = resolver.resolve("run.list", None).expect("resolve");
        assert_eq!(names(root, &set), vec!["a.py", "LICENSE", "notes.txt"]);
    }

    #[test]
    fn manifest_extensions_are_configurable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a.py"));
        fs::write(root.join("nested.files"), "./a.py
").expect("write");
        fs::write(root.join("run.list"), "./nested.files
").expect("write");

        let plain = Resolver::new(root, table(), 8);
        let set = plain.resolve("run.list", None).expect("resolve");
        assert_eq!(names(root, &set), vec!["nested.files"]);

        let nested = Resolver::new(root, table(), 8).with_manifest_extensions([".FILES", "list"]);
        let set = nested.resolve("run.list", None).expect("resolve");
        assert_eq!(names(root, &set), vec!["a.py"]);
    }

    #[test]
    fn ignore_never_fails_on_missing_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a.py"));
        fs::write(root.join("ignore.list"), "./gone.py\nbare.py\n./a.py\n").expect("write");

        let resolver = Resolver::new(root, table(), 8);
        let set = resolver
            .resolve("a.py", Some("ignore.list"))
            .expect("resolve");
        assert!(set.is_empty());
        let set = resolver.resolve("a.py", Some("no-such-ignore")).expect("resolve");
        assert_eq!(set.len(), 1);
    }
}
