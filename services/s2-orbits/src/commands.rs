//! Coverage subcommands: orbit joins and existence filters.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use coverage::{
    load_acquisition_file, load_grid, load_ground_tracks, write_parquet, CoverageConfig,
    CoverageEngine, CoverageRun, ExistenceFilter, ExistenceFilterBuilder, Footprint,
    ProgressCallback, Tile, ZoneProgress,
};
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::progress;

/// Settings shared by every coverage subcommand.
pub struct RunContext {
    pub config: CoverageConfig,
    pub cancel: Arc<AtomicBool>,
    pub show_progress: bool,
}

impl RunContext {
    pub fn new(config: CoverageConfig, cancel: Arc<AtomicBool>, show_progress: bool) -> Self {
        Self {
            config,
            cancel,
            show_progress,
        }
    }
}

/// One written output file and the run that produced it.
#[derive(Debug)]
pub struct JoinOutput {
    pub path: PathBuf,
    pub run: CoverageRun,
}

/// Buffer ground tracks into swaths and join them against the grid.
pub fn join_orbits(
    ctx: &RunContext,
    grid: &Path,
    tracks: &Path,
    tracks_layer: Option<&str>,
    out: &Path,
    filter: Option<&Path>,
) -> Result<JoinOutput> {
    let tiles = load_grid(grid, &ctx.config.grid_layer)?;
    let tracks = load_ground_tracks(tracks, tracks_layer, &ctx.config.orbit_field)?;
    info!(tiles = tiles.len(), tracks = tracks.len(), "Loaded orbit join inputs");

    let pb = progress::bar(0, "zones", ctx.show_progress);
    let engine = build_engine(ctx, filter, &pb)?;
    let run = run_join(&engine, &tiles, &tracks, &pb)?;

    let written = write_parquet(out, &run.records)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), records = written, "Wrote orbit coverage");

    Ok(JoinOutput {
        path: out.to_path_buf(),
        run,
    })
}

/// Join acquisition segments against the grid.
///
/// Without `per_file` every input is combined into the single file `out`;
/// with it, `out` is a directory receiving one `<input stem>.parquet` per input.
pub fn join_acquisitions(
    ctx: &RunContext,
    grid: &Path,
    inputs: &[PathBuf],
    out: &Path,
    per_file: bool,
    filter: Option<&Path>,
) -> Result<Vec<JoinOutput>> {
    let tiles = load_grid(grid, &ctx.config.grid_layer)?;
    let pb = progress::bar(0, "zones", ctx.show_progress);
    let engine = build_engine(ctx, filter, &pb)?;
    let layer = ctx.config.acquisition_layer.as_str();

    if per_file {
        std::fs::create_dir_all(out)
            .with_context(|| format!("creating output directory {}", out.display()))?;

        let paths = per_file_outputs(out, inputs);
        let mut outputs = Vec::with_capacity(inputs.len());
        for (input, path) in inputs.iter().zip(paths) {
            let segments = load_acquisition_file(input, layer)?;
            info!(input = %input.display(), segments = segments.len(), "Loaded acquisition plan");

            let run = run_join(&engine, &tiles, &segments, &pb)?;
            let written = write_parquet(&path, &run.records)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), records = written, "Wrote acquisition coverage");

            outputs.push(JoinOutput { path, run });
        }
        return Ok(outputs);
    }

    let mut segments = Vec::new();
    for input in inputs {
        let loaded = load_acquisition_file(input, layer)?;
        info!(input = %input.display(), segments = loaded.len(), "Loaded acquisition plan");
        segments.extend(loaded);
    }

    let run = run_join(&engine, &tiles, &segments, &pb)?;
    let written = write_parquet(out, &run.records)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), records = written, "Wrote acquisition coverage");

    Ok(vec![JoinOutput {
        path: out.to_path_buf(),
        run,
    }])
}

/// Stream catalog CSVs into an existence filter.
pub fn build_existence_filter(
    ctx: &RunContext,
    catalogs: &[PathBuf],
    product_column: &str,
    tile_column: &str,
) -> Result<ExistenceFilter> {
    let pb = progress::counter("catalog rows", ctx.show_progress);
    let handle = pb.clone();

    let mut builder = ExistenceFilterBuilder::new(ctx.config.catalog_chunk_size)?
        .with_columns(product_column, tile_column)
        .with_cancel_flag(ctx.cancel.clone())
        .with_progress(Arc::new(move |rows| handle.set_position(rows as u64)));

    for catalog in catalogs {
        pb.set_message(catalog.display().to_string());
        builder.add_path(catalog)?;
    }
    pb.finish_and_clear();

    let filter = builder.build();
    info!(tiles = filter.len(), pairs = filter.pair_count(), "Built existence filter");
    Ok(filter)
}

/// Print the output path, record count and any skipped zones of a run.
pub fn write_summary<W: Write>(output: &JoinOutput, out: &mut W) -> std::io::Result<()> {
    let run = &output.run;
    writeln!(
        out,
        "{}: {} records",
        output.path.display(),
        run.records.len()
    )?;
    if run.is_complete() {
        return Ok(());
    }

    writeln!(out, "  skipped {} zone(s):", run.skipped.len())?;
    for skipped in &run.skipped {
        writeln!(
            out,
            "    {}  {} ({} tiles)",
            skipped.key,
            skipped.reason,
            skipped.tiles.len()
        )?;
    }
    Ok(())
}

/// Engine with the optional existence filter and a zone progress bar attached.
fn build_engine(
    ctx: &RunContext,
    filter: Option<&Path>,
    pb: &ProgressBar,
) -> Result<CoverageEngine> {
    let handle = pb.clone();
    let callback: ProgressCallback = Arc::new(move |p: ZoneProgress| {
        handle.set_length(p.total as u64);
        handle.set_position(p.completed as u64);
        handle.set_message(p.key.to_string());
    });

    let mut engine = CoverageEngine::new(ctx.config.clone())?
        .with_cancel_flag(ctx.cancel.clone())
        .with_progress(callback);

    if let Some(path) = filter {
        let filter = ExistenceFilter::from_path(path)?;
        info!(
            path = %path.display(),
            tiles = filter.len(),
            pairs = filter.pair_count(),
            "Loaded existence filter"
        );
        engine = engine.with_filter(filter);
    }
    Ok(engine)
}

/// Run one join and log the zones lost to geometry faults.
fn run_join<F: Footprint>(
    engine: &CoverageEngine,
    tiles: &[Tile],
    footprints: &[F],
    pb: &ProgressBar,
) -> Result<CoverageRun> {
    pb.reset();
    let result = engine.run(tiles, footprints);
    pb.finish_and_clear();

    let run = result?;
    for zone in run.faulted() {
        warn!(zone = %zone.key, reason = %zone.reason, "Zone skipped");
    }
    Ok(run)
}

/// One `<stem>.parquet` per input. Inputs sharing a stem get `_2`, `_3`, ...
/// in input order so no output overwrites another.
fn per_file_outputs(dir: &Path, inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut used = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "coverage".to_string());

            let mut name = format!("{}.parquet", stem);
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{}_{}.parquet", stem, n);
                n += 1;
            }
            if n > 2 {
                warn!(input = %input.display(), output = %name, "Output name already taken, renamed");
            }
            dir.join(name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverage::SkipReason;
    use test_utils::{
        acquisition_placemark, catalog_csv, grid_placemark, kml_document, meridian_track,
        product_id, rect_ring, square_ring, temp_test_dir, track_placemark,
    };

    fn context() -> RunContext {
        RunContext::new(
            CoverageConfig::default(),
            Arc::new(AtomicBool::new(false)),
            false,
        )
    }

    fn write_grid(dir: &Path) -> PathBuf {
        let path = dir.join("grid.kml");
        let kml = kml_document(
            "Features",
            &[
                grid_placemark("33UUU", &[square_ring(14.5, 52.0, 1.0)]),
                grid_placemark("60UXU", &[square_ring(177.0, 52.0, 1.0)]),
            ],
        );
        std::fs::write(&path, kml).unwrap();
        path
    }

    #[test]
    fn test_join_orbits_writes_output() {
        let dir = temp_test_dir();
        let grid = write_grid(dir.path());
        let tracks = dir.path().join("tracks.kml");
        std::fs::write(
            &tracks,
            kml_document(
                "Tracks",
                &[track_placemark(22, &meridian_track(14.6, 40.0, 60.0, 20))],
            ),
        )
        .unwrap();
        let out = dir.path().join("out/orbits.parquet");

        let output = join_orbits(&context(), &grid, &tracks, None, &out, None).unwrap();

        assert!(out.exists());
        assert_eq!(output.run.records.len(), 1);
        assert_eq!(output.run.records[0].tile_id.as_str(), "33UUU");
        assert_eq!(output.run.skipped.len(), 1);
        assert_eq!(output.run.skipped[0].reason, SkipReason::Antimeridian);
    }

    #[test]
    fn test_join_acquisitions_per_file() {
        let dir = temp_test_dir();
        let grid = write_grid(dir.path());

        let mut inputs = Vec::new();
        for (name, orbit) in [("plan_a.kml", 22u8), ("plan_b.kml", 65u8)] {
            let path = dir.path().join(name);
            let kml = kml_document(
                "NOMINAL",
                &[acquisition_placemark(
                    &format!("seg-{}", orbit),
                    orbit,
                    &rect_ring(13.0, 50.0, 16.0, 54.0),
                )],
            );
            std::fs::write(&path, kml).unwrap();
            inputs.push(path);
        }

        let out_dir = dir.path().join("per_file");
        let outputs =
            join_acquisitions(&context(), &grid, &inputs, &out_dir, true, None).unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].path, out_dir.join("plan_a.parquet"));
        assert_eq!(outputs[1].path, out_dir.join("plan_b.parquet"));
        assert!(outputs.iter().all(|o| o.path.exists()));
        assert_eq!(outputs[1].run.records[0].orbit.0, 65);

        let combined = dir.path().join("combined.parquet");
        let outputs =
            join_acquisitions(&context(), &grid, &inputs, &combined, false, None).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].run.records.len(), 2);
    }

    #[test]
    fn test_missing_filter_file_is_fatal() {
        let dir = temp_test_dir();
        let grid = write_grid(dir.path());
        let tracks = dir.path().join("tracks.kml");
        std::fs::write(&tracks, kml_document("Tracks", &[])).unwrap();

        let result = join_orbits(
            &context(),
            &grid,
            &tracks,
            None,
            &dir.path().join("o.parquet"),
            Some(&dir.path().join("missing.json")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_build_existence_filter() {
        let dir = temp_test_dir();
        let catalog = dir.path().join("catalog.csv");
        let rows = vec![
            (product_id("33UUU", 22, 1), "33UUU".to_string()),
            (product_id("33UUU", 65, 2), "33UUU".to_string()),
            (product_id("33UUU", 22, 3), "33UUU".to_string()),
        ];
        std::fs::write(&catalog, catalog_csv(&rows)).unwrap();

        let filter =
            build_existence_filter(&context(), &[catalog], "product_id", "mgrs_tile").unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.pair_count(), 2);
    }

    #[test]
    fn test_summary_lists_skipped_zones() {
        let dir = temp_test_dir();
        let grid = write_grid(dir.path());
        let tracks = dir.path().join("tracks.kml");
        std::fs::write(&tracks, kml_document("Tracks", &[])).unwrap();
        let out = dir.path().join("empty.parquet");
        let output = join_orbits(&context(), &grid, &tracks, None, &out, None).unwrap();

        let mut buf = Vec::new();
        write_summary(&output, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("0 records"));
        assert!(text.contains("skipped 1 zone(s)"));
        assert!(text.contains("60N  antimeridian zone (1 tiles)"));
    }

    #[test]
    fn test_per_file_output_name() {
        assert_eq!(
            per_file_outputs(Path::new("out"), &[PathBuf::from("/data/S2A_plan.kml")]),
            vec![PathBuf::from("out/S2A_plan.parquet")]
        );
    }

    #[test]
    fn test_per_file_outputs_never_collide() {
        let inputs = [
            PathBuf::from("a/plan.kml"),
            PathBuf::from("b/plan.kml"),
            PathBuf::from("plan_2.kml"),
            PathBuf::from("c/plan.KML"),
        ];
        assert_eq!(
            per_file_outputs(Path::new("out"), &inputs),
            vec![
                PathBuf::from("out/plan.parquet"),
                PathBuf::from("out/plan_2.parquet"),
                PathBuf::from("out/plan_2_2.parquet"),
                PathBuf::from("out/plan_3.parquet"),
            ]
        );
    }

    #[test]
    fn test_join_acquisitions_same_stem_keeps_both() {
        let dir = temp_test_dir();
        let grid = write_grid(dir.path());

        let mut inputs = Vec::new();
        for (sub, orbit) in [("s2a", 22u8), ("s2b", 65u8)] {
            let plan_dir = dir.path().join(sub);
            std::fs::create_dir_all(&plan_dir).unwrap();
            let path = plan_dir.join("plan.kml");
            let kml = kml_document(
                "NOMINAL",
                &[acquisition_placemark(
                    &format!("seg-{}", orbit),
                    orbit,
                    &rect_ring(13.0, 50.0, 16.0, 54.0),
                )],
            );
            std::fs::write(&path, kml).unwrap();
            inputs.push(path);
        }

        let out_dir = dir.path().join("per_file");
        let outputs =
            join_acquisitions(&context(), &grid, &inputs, &out_dir, true, None).unwrap();

        assert_eq!(outputs[0].path, out_dir.join("plan.parquet"));
        assert_eq!(outputs[1].path, out_dir.join("plan_2.parquet"));
        assert!(outputs.iter().all(|o| o.path.exists()));
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);
    }
}
