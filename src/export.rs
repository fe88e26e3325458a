use crate::catalog::RunParameters;
use crate::pipeline::ResultRow;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADERS: [&str; 2] = ["Game Title", "Release Date"];

/// `<category>_<country>_last9months.csv`, lowercase, spaces as underscores.
pub fn output_file_name(params: &RunParameters) -> String {
    format!(
        "{}_{}_last9months.csv",
        params.category.name.to_lowercase().replace(' ', "_"),
        params.country.code.to_lowercase()
    )
}

/// Header line plus one record per row; dates as `YYYY-MM-DD`.
pub fn write_csv<W: Write>(writer: W, rows: &[ResultRow]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADERS)?;
    for row in rows {
        let date = row.release_date.format("%Y-%m-%d").to_string();
        csv.write_record([row.title.as_str(), date.as_str()])?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the run's CSV into `dir` and return the file path.
pub fn export(dir: &Path, params: &RunParameters, rows: &[ResultRow]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = dir.join(output_file_name(params));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_csv(file, rows).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "exported");
    Ok(path)
}
