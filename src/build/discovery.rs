//! Source discovery for the kernel tree.
//!
//! Walks the source root and pairs every compilable unit with the object
//! artifact it will produce. Object paths mirror the source's relative
//! directory and keep the full filename (`mm/pmm.c` -> `mm/pmm.c.o`), so
//! `a/init.c`, `b/init.c` and `init.s` never collide in the staging tree.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffix appended to a unit's relative path to name its object.
pub const OBJECT_SUFFIX: &str = ".o";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// C sources (`.c`).
    Native,
    /// Assembly sources (`.s`, `.S`).
    Assembly,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "c" => Some(SourceKind::Native),
            "s" | "S" => Some(SourceKind::Assembly),
            _ => None,
        }
    }
}

/// One compilable file and the object it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub source: PathBuf,
    /// Source path relative to the source root.
    pub relative: PathBuf,
    pub kind: SourceKind,
    pub object: PathBuf,
}

/// Object path for `relative` under `staging_dir`.
pub fn object_path(staging_dir: &Path, relative: &Path) -> PathBuf {
    let mut name = OsString::from(relative.as_os_str());
    name.push(OBJECT_SUFFIX);
    staging_dir.join(name)
}

/// Enumerate compilable units under `source_root`.
///
/// Each directory lists its own files before descending into its
/// subdirectories; both groups are sorted by file name. The returned order is
/// stable for a fixed tree and is also the link order.
pub fn discover_sources(source_root: &Path, staging_dir: &Path) -> Result<Vec<SourceUnit>> {
    if !source_root.is_dir() {
        bail!("kernel source tree not found at {}", source_root.display());
    }

    let mut units = Vec::new();
    let walk = WalkDir::new(source_root).sort_by(|a, b| {
        a.file_type()
            .is_dir()
            .cmp(&b.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    });
    for entry in walk {
        let entry = entry
            .with_context(|| format!("walking kernel source tree '{}'", source_root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = SourceKind::from_path(entry.path()) else {
            continue;
        };
        let relative = entry
            .path()
            .strip_prefix(source_root)
            .with_context(|| format!("relativizing '{}'", entry.path().display()))?
            .to_path_buf();
        units.push(SourceUnit {
            source: entry.path().to_path_buf(),
            object: object_path(staging_dir, &relative),
            relative,
            kind,
        });
    }

    log::debug!(
        "discovered {} compile units under '{}'",
        units.len(),
        source_root.display()
    );
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn test_kinds() {
        assert_eq!(SourceKind::from_path(Path::new("a.c")), Some(SourceKind::Native));
        assert_eq!(SourceKind::from_path(Path::new("a.s")), Some(SourceKind::Assembly));
        assert_eq!(SourceKind::from_path(Path::new("a.S")), Some(SourceKind::Assembly));
        assert_eq!(SourceKind::from_path(Path::new("a.h")), None);
        assert_eq!(SourceKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_object_path_appends_suffix() {
        assert_eq!(
            object_path(Path::new("/bin/kernel"), Path::new("mm/pmm.c")),
            Path::new("/bin/kernel/mm/pmm.c.o")
        );
    }

    #[test]
    fn test_discovers_only_sources() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("kernel");
        touch(&src, "kernel.c");
        touch(&src, "arch/boot.s");
        touch(&src, "include/kernel.h");
        touch(&src, "link.ld");

        let units = discover_sources(&src, Path::new("/stage")).unwrap();

        let rel: Vec<_> = units.iter().map(|u| u.relative.clone()).collect();
        assert_eq!(rel, vec![PathBuf::from("kernel.c"), PathBuf::from("arch/boot.s")]);
        assert_eq!(units[1].kind, SourceKind::Assembly);
        assert_eq!(units[1].object, Path::new("/stage/arch/boot.s.o"));
    }

    #[test]
    fn test_files_come_before_subdirectories() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("kernel");
        for rel in ["z.c", "m/b.c", "a.c", "m/a.s", "b/x.c", "m/k/y.c", "m/z.c"] {
            touch(&src, rel);
        }

        let units = discover_sources(&src, Path::new("/stage")).unwrap();

        let rel: Vec<_> = units.iter().map(|u| u.relative.clone()).collect();
        let expected: Vec<PathBuf> = ["a.c", "z.c", "b/x.c", "m/a.s", "m/b.c", "m/z.c", "m/k/y.c"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(rel, expected);
    }

    #[test]
    fn test_same_basename_in_different_dirs_stays_unique() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("kernel");
        touch(&src, "init.c");
        touch(&src, "drivers/init.c");
        touch(&src, "mm/init.c");
        touch(&src, "init.s");

        let units = discover_sources(&src, Path::new("/stage")).unwrap();
        let objects: HashSet<_> = units.iter().map(|u| u.object.clone()).collect();

        assert_eq!(units.len(), 4);
        assert_eq!(objects.len(), 4);
    }

    #[test]
    fn test_order_is_stable() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("kernel");
        for rel in ["z.c", "a.c", "m/b.c", "m/a.s"] {
            touch(&src, rel);
        }

        let first = discover_sources(&src, Path::new("/stage")).unwrap();
        let second = discover_sources(&src, Path::new("/stage")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_tree_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(discover_sources(&temp.path().join("nope"), temp.path()).is_err());
    }
}
