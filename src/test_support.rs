//! Fake external tools for unit tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Compiler stand-in: writes `OBJ:<source contents>` to the `-o` path and
/// fails with a diagnostic when the source contains `FAIL`.
pub(crate) const FAKE_CC: &str = r#"#!/bin/sh
src=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -c) src="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if grep -q FAIL "$src"; then
  echo "error: cannot compile $src" >&2
  exit 1
fi
{ printf 'OBJ:'; cat "$src"; } > "$out"
"#;

/// Linker stand-in: concatenates the object operands, in order, into `-o`.
pub(crate) const FAKE_LD: &str = r#"#!/bin/sh
out=""
objs=""
while [ $# -gt 0 ]; do
  case "$1" in
    -T) shift 2 ;;
    -o) out="$2"; shift 2 ;;
    -*) shift ;;
    *) objs="$objs $1"; shift ;;
  esac
done
cat $objs > "$out"
"#;

/// Write an executable shell script named `name` into `dir`.
pub(crate) fn fake_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
