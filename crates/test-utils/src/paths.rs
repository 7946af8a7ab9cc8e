//! Test data locations and scratch directories.

use std::path::{Path, PathBuf};

/// Environment variable pointing at a directory of real input files.
pub const TEST_DATA_ENV: &str = "S2_ORBITS_TEST_DATA";

/// `testdata/` at the workspace root.
pub fn testdata_dir() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/test-utils -> workspace root
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .join("testdata")
}

/// Look a real data file up in `$S2_ORBITS_TEST_DATA`, then in `testdata/`.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let from_env = std::env::var_os(TEST_DATA_ENV).map(|dir| PathBuf::from(dir).join(name));
    from_env
        .into_iter()
        .chain(std::iter::once(testdata_dir().join(name)))
        .find(|path| path.is_file())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("s2_orbits_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Write `content` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test fixture");
    path
}
