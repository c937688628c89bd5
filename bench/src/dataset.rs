//! On-disk dataset artifacts: the flat CSV table and the nested JSON array.

use crate::error::DatasetError;
use etl_core::{FlatRecord, NestedRecord};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FLAT_FILE_NAME: &str = "data.csv";
pub const NESTED_FILE_NAME: &str = "data.json";

/// The pair of generated dataset files.
///
/// Both files are removed when the value is dropped, whether or not they were
/// fully written.
#[derive(Debug)]
pub struct DatasetFiles {
    flat: PathBuf,
    nested: PathBuf,
    keep: bool,
}

impl DatasetFiles {
    /// Claim the dataset paths inside `dir`. Nothing is written yet.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            flat: dir.join(FLAT_FILE_NAME),
            nested: dir.join(NESTED_FILE_NAME),
            keep: false,
        }
    }

    pub fn flat_path(&self) -> &Path {
        &self.flat
    }

    pub fn nested_path(&self) -> &Path {
        &self.nested
    }

    /// Give up ownership without deleting the files.
    pub fn into_paths(mut self) -> (PathBuf, PathBuf) {
        self.keep = true;
        (self.flat.clone(), self.nested.clone())
    }
}

impl Drop for DatasetFiles {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in [&self.flat, &self.nested] {
            match fs::remove_file(path) {
                Ok(()) => log::debug!("Removed dataset file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {e}", path.display()),
            }
        }
    }
}

/// Write the flat table, header first, overwriting `path`.
pub fn write_flat(path: &Path, records: &[FlatRecord]) -> Result<(), DatasetError> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| DatasetError::io(path, e))?;
    Ok(())
}

/// Write the nested documents as one pretty-printed JSON array, overwriting `path`.
pub fn write_nested(path: &Path, records: &[NestedRecord]) -> Result<(), DatasetError> {
    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| DatasetError::io(path, e))?;
    Ok(())
}

/// Open the flat table for streaming reads.
pub fn open_flat(path: &Path) -> Result<csv::Reader<BufReader<File>>, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    Ok(csv::Reader::from_reader(BufReader::new(file)))
}

/// Read every row of the flat table.
pub fn read_flat(path: &Path) -> Result<Vec<FlatRecord>, DatasetError> {
    let mut reader = open_flat(path)?;
    reader
        .deserialize()
        .collect::<Result<Vec<FlatRecord>, _>>()
        .map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Read the nested JSON array.
pub fn read_nested(path: &Path) -> Result<Vec<NestedRecord>, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Fail with [`DatasetError::Missing`] unless `path` is an existing file.
pub fn require(path: &Path) -> Result<(), DatasetError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(DatasetError::Missing {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(DatasetError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_core::Metadata;

    fn flat(id: u64) -> FlatRecord {
        FlatRecord {
            id,
            name: "John Smith".to_string(),
            age: 40,
            city: "Chicago".to_string(),
            hobbies: "sports,music".to_string(),
        }
    }

    #[test]
    fn flat_file_has_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FLAT_FILE_NAME);
        write_flat(&path, &[flat(1), flat(2)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,name,age,city,hobbies"));
        assert_eq!(lines.next(), Some("1,John Smith,40,Chicago,\"sports,music\""));
        assert_eq!(lines.count(), 1);

        let back = read_flat(&path).unwrap();
        assert_eq!(back, vec![flat(1), flat(2)]);
    }

    #[test]
    fn nested_file_is_single_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(NESTED_FILE_NAME);
        let doc = NestedRecord {
            id: 1,
            name: "Mary Jones".to_string(),
            age: 22,
            city: "Dallas".to_string(),
            hobbies: vec!["yoga".to_string(), "sports".to_string()],
            metadata: Metadata {
                created_year: 2021,
                active: false,
                score: 7.5,
            },
        };
        write_nested(&path, &[doc.clone()]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert_eq!(read_nested(&path).unwrap(), vec![doc]);
    }

    #[test]
    fn missing_files_are_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope").join(FLAT_FILE_NAME);

        assert!(matches!(read_flat(&gone), Err(DatasetError::Missing { .. })));
        assert!(matches!(read_nested(&gone), Err(DatasetError::Missing { .. })));
        assert!(matches!(require(&gone), Err(DatasetError::Missing { .. })));
        assert!(matches!(require(dir.path()), Err(DatasetError::Missing { .. })));
    }

    #[test]
    fn dropping_files_guard_removes_both() {
        let dir = tempfile::tempdir().unwrap();
        let files = DatasetFiles::in_dir(dir.path());
        write_flat(files.flat_path(), &[flat(1)]).unwrap();
        write_nested(files.nested_path(), &[]).unwrap();
        let (flat_path, nested_path) = (
            files.flat_path().to_path_buf(),
            files.nested_path().to_path_buf(),
        );
        assert!(flat_path.exists() && nested_path.exists());

        drop(files);
        assert!(!flat_path.exists());
        assert!(!nested_path.exists());
    }

    #[test]
    fn into_paths_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = DatasetFiles::in_dir(dir.path());
        write_flat(files.flat_path(), &[flat(1)]).unwrap();

        let (flat_path, _) = files.into_paths();
        assert!(flat_path.exists());
    }
}
