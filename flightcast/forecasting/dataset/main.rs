//! Table-shaped flight records and their grouping into trajectories.

/// Hold-out splitting.
pub mod split;
/// Seeded synthetic flights.
pub mod synthetic;

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use split::{holdout_tail, DEFAULT_HOLDOUT_FRACTION};
pub use synthetic::SyntheticFlights;

use crate::{
    error::ForecastError,
    point::{Point, Trajectory, TrajectoryId},
};

/// One row of the training table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Timestamp.
    pub t: f64,
    /// Owning trajectory; rows without one share the default id. Numeric ids
    /// are kept as their decimal text.
    #[serde(
        default,
        deserialize_with = "opaque_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub trajectory_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

fn opaque_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Signed(value) => value.to_string(),
        RawId::Unsigned(value) => value.to_string(),
        RawId::Float(value) => value.to_string(),
    }))
}

impl TableRow {
    /// Coordinates of the row.
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.x, self.y, self.t)
    }
}

/// Failures while reading a dataset file.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// File could not be opened or read.
    #[error("reading dataset {}", path.display())]
    Io {
        /// Dataset path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A line is not a valid row.
    #[error("dataset line {line} is not a valid row")]
    Json {
        /// 1-based line number.
        line: usize,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// A CSV record is not a valid row.
    #[error("dataset line {line} is not a valid csv row")]
    Csv {
        /// 1-based line number, header included.
        line: usize,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },
    /// Rows parsed but do not form valid trajectories.
    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

/// Reads a row table, as CSV when the extension is `.csv` and as JSON lines
/// (`{"x":..,"y":..,"t":..,"trajectory_id":..}`, blank lines skipped) otherwise.
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<TableRow>, DatasetError> {
    let path = path.as_ref();
    let io_error = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    if is_csv(path) {
        return read_csv_rows(file);
    }
    read_rows(BufReader::new(file)).map_err(|err| match err {
        DatasetError::Io { source, .. } => io_error(source),
        other => other,
    })
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// JSON-lines rows from any buffered reader.
pub fn read_rows(reader: impl BufRead) -> Result<Vec<TableRow>, DatasetError> {
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: PathBuf::new(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|source| DatasetError::Json {
            line: index + 1,
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// CSV rows with an `x,y,t[,trajectory_id]` header, in any column order.
pub fn read_csv_rows(reader: impl Read) -> Result<Vec<TableRow>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    reader
        .deserialize()
        .enumerate()
        .map(|(index, row)| {
            row.map_err(|source| DatasetError::Csv {
                line: source
                    .position()
                    .and_then(|pos| usize::try_from(pos.line()).ok())
                    .unwrap_or(index + 2),
                source,
            })
        })
        .collect()
}

/// Writes rows as CSV with an `x,y,t,trajectory_id` header; missing ids are left empty.
pub fn save_csv_rows(path: impl AsRef<Path>, rows: &[TableRow]) -> Result<(), DatasetError> {
    let path = path.as_ref();
    let io_error = |source: csv::Error| DatasetError::Io {
        path: path.to_path_buf(),
        source: source.into(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(io_error)?;
    writer
        .write_record(["x", "y", "t", "trajectory_id"])
        .map_err(io_error)?;
    for row in rows {
        writer
            .write_record([
                row.x.to_string(),
                row.y.to_string(),
                row.t.to_string(),
                row.trajectory_id.clone().unwrap_or_default(),
            ])
            .map_err(io_error)?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Groups rows by trajectory id in order of first appearance, keeping row order within each group.
pub fn group_trajectories(
    rows: impl IntoIterator<Item = TableRow>,
) -> Result<Vec<Trajectory>, ForecastError> {
    let mut groups: IndexMap<TrajectoryId, Vec<Point>> = IndexMap::new();
    for row in rows {
        let id = row
            .trajectory_id
            .as_deref()
            .map_or_else(TrajectoryId::default, TrajectoryId::new);
        groups.entry(id).or_default().push(row.point());
    }
    groups
        .into_iter()
        .map(|(id, points)| Trajectory::new(id, points))
        .collect()
}

/// [`load_rows`] followed by [`group_trajectories`].
pub fn load_trajectories(path: impl AsRef<Path>) -> Result<Vec<Trajectory>, DatasetError> {
    Ok(group_trajectories(load_rows(path)?)?)
}

/// Flattens trajectories back into rows, e.g. to persist a synthetic dataset.
#[must_use]
pub fn to_rows(trajectories: &[Trajectory]) -> Vec<TableRow> {
    trajectories
        .iter()
        .flat_map(|trajectory| {
            trajectory.points().iter().map(move |point| TableRow {
                x: point.x,
                y: point.y,
                t: point.t,
                trajectory_id: Some(trajectory.id().as_str().to_owned()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Cursor};
    use tempfile::tempdir;

    fn row(x: f64, id: Option<&str>) -> TableRow {
        TableRow {
            x,
            y: 0.0,
            t: x,
            trajectory_id: id.map(str::to_owned),
        }
    }

    #[test]
    fn groups_in_first_appearance_order() {
        let rows = vec![
            row(1.0, Some("b")),
            row(2.0, Some("a")),
            row(3.0, Some("b")),
            row(4.0, None),
            row(5.0, Some("a")),
        ];
        let trajectories = group_trajectories(rows).unwrap();
        let ids: Vec<&str> = trajectories.iter().map(|t| t.id().as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "default"]);
        let xs: Vec<f64> = trajectories[0].points().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 3.0]);
        assert_eq!(trajectories[2].len(), 1);
    }

    #[test]
    fn reads_rows_and_skips_blank_lines() {
        let input = "{\"x\":1.0,\"y\":2.0,\"t\":0.0,\"trajectory_id\":\"f1\"}\n\n{\"x\":1.5,\"y\":2.5,\"t\":0.1}\n";
        let rows = read_rows(Cursor::new(input)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trajectory_id.as_deref(), Some("f1"));
        assert_eq!(rows[1].trajectory_id, None);
    }

    #[test]
    fn reports_offending_line() {
        let input = "{\"x\":1.0,\"y\":2.0,\"t\":0.0}\n{\"x\":\"oops\"}\n";
        match read_rows(Cursor::new(input)) {
            Err(DatasetError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn numeric_ids_are_opaque_text() {
        let input = "{\"x\":0.0,\"y\":0.0,\"t\":0.0,\"trajectory_id\":7}\n{\"x\":1.0,\"y\":0.0,\"t\":1.0,\"trajectory_id\":null}\n";
        let rows = read_rows(Cursor::new(input)).unwrap();
        assert_eq!(rows[0].trajectory_id.as_deref(), Some("7"));
        assert_eq!(rows[1].trajectory_id, None);
    }

    #[test]
    fn reads_csv_rows_with_integer_ids() {
        let input = "x,y,t,trajectory_id\n1.0,2.0,0.0,0\n1.5, 2.5 ,0.1,\n3.0,4.0,0.2,north\n";
        let rows = read_csv_rows(Cursor::new(input)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].trajectory_id.as_deref(), Some("0"));
        assert_eq!(rows[1].y, 2.5);
        assert_eq!(rows[1].trajectory_id, None);
        assert_eq!(rows[2].trajectory_id.as_deref(), Some("north"));

        let reordered = "t,x,y\n0.5,1.0,2.0\n";
        let rows = read_csv_rows(Cursor::new(reordered)).unwrap();
        assert_eq!(rows[0].point(), Point::new(1.0, 2.0, 0.5));
        assert_eq!(rows[0].trajectory_id, None);
    }

    #[test]
    fn reports_offending_csv_line() {
        let input = "x,y,t\n1.0,2.0,0.0\n1.0,oops,0.1\n";
        match read_csv_rows(Cursor::new(input)) {
            Err(DatasetError::Csv { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn csv_rows_round_trip_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flights.csv");
        let original = group_trajectories(vec![
            row(1.0, Some("3")),
            row(2.5, Some("3")),
            row(0.125, Some("4")),
        ])
        .unwrap();
        save_csv_rows(&path, &to_rows(&original)).unwrap();
        assert_eq!(load_trajectories(&path).unwrap(), original);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.jsonl");
        match load_rows(&path) {
            Err(DatasetError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rows_round_trip_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flights.jsonl");
        let original = group_trajectories(vec![row(1.0, Some("f")), row(2.0, Some("f"))]).unwrap();
        let lines: Vec<String> = to_rows(&original)
            .iter()
            .map(|row| serde_json::to_string(row).unwrap())
            .collect();
        fs::write(&path, lines.join("\n")).unwrap();
        assert_eq!(load_trajectories(&path).unwrap(), original);
    }
}
