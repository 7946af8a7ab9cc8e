//! Test support for the s2-orbits workspace.
//!
//! - [`fixtures`]: KML documents, grid/track/acquisition placemarks and
//!   catalog CSVs built in memory
//! - [`generators`]: rings and tracks in lon/lat
//! - [`paths`]: optional real data files and scratch directories
//! - assertion macros for floating-point results

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve a real data file or return early from the test.
///
/// ```ignore
/// let grid = test_utils::require_test_file!("S2A_OPER_GIP_TILPAR_MPC.kml");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: '{}' not found (set {} or add it to testdata/)",
                    $name,
                    $crate::TEST_DATA_ENV
                );
                return;
            }
        }
    }};
}

/// Assert `|left - right| <= epsilon`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        let diff = (left - right).abs();
        assert!(
            diff <= epsilon,
            "assertion failed: `left ~= right`\n  left: {:?}\n right: {:?}\n  diff: {:?} > {:?}",
            left,
            right,
            diff,
            epsilon
        );
    }};
}

/// Assert two `(x, y)` pairs are within `epsilon` on both axes.
#[macro_export]
macro_rules! assert_coords_approx_eq {
    (($x1:expr, $y1:expr), ($x2:expr, $y2:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($x1, $x2, $epsilon);
        $crate::assert_approx_eq!($y1, $y2, $epsilon);
    }};
}
