//! Locating fuzz-target binaries in a build output directory.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Symbol every libFuzzer harness links in; its presence in an executable
/// is what distinguishes a target from build helpers in the same dir.
const ENGINE_SYMBOL: &[u8] = b"LLVMFuzzerTestOneInput";

/// Returns every fuzz target directly under `out_dir`, sorted by path so
/// batch order is stable across runs.
pub fn fuzz_targets(out_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    for entry in fs::read_dir(out_dir)? {
        let path = entry?.path();
        if is_fuzz_target(&path)? {
            targets.push(path);
        }
    }
    targets.sort();
    Ok(targets)
}

/// A fuzz target is a regular, executable file embedding the engine
/// entry-point symbol.
pub fn is_fuzz_target(path: &Path) -> io::Result<bool> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
        return Ok(false);
    }
    let content = fs::read(path)?;
    Ok(content
        .windows(ENGINE_SYMBOL.len())
        .any(|w| w == ENGINE_SYMBOL))
}
