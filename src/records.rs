//! CSV record files.
//!
//! Input needs a header row; the record name comes from the first configured
//! search column present in that header. Output always has the header
//! [`OUTPUT_HEADER`] and replaces the target path atomically.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::RecordFileError;
use crate::pipeline::Record;

/// Column used when no search columns are given.
pub const DEFAULT_SEARCH_COLUMN: &str = "name";

pub const OUTPUT_HEADER: [&str; 4] = ["name", "lookup_result", "matched_value", "match_type"];

/// Read input records from a CSV file.
///
/// Header names are compared after trimming, ignoring ASCII case. Rows
/// shorter than the header yield an empty name.
pub fn read_records<P: AsRef<Path>>(
    path: P,
    search_columns: &[String],
) -> Result<Vec<Record>, RecordFileError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RecordFileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| RecordFileError::MalformedInput(format!("unreadable header: {e}")))?
        .clone();
    let column = name_column(&headers, search_columns)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| RecordFileError::MalformedInput(e.to_string()))?;
        records.push(Record::new(row.get(column).unwrap_or_default()));
    }

    tracing::debug!(path = %path.display(), records = records.len(), column, "read input records");
    Ok(records)
}

fn name_column(
    headers: &csv::StringRecord,
    search_columns: &[String],
) -> Result<usize, RecordFileError> {
    let wanted: Vec<&str> = if search_columns.is_empty() {
        vec![DEFAULT_SEARCH_COLUMN]
    } else {
        search_columns.iter().map(|c| c.trim()).collect()
    };

    wanted
        .iter()
        .find_map(|want| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(want))
        })
        .ok_or_else(|| {
            RecordFileError::MalformedInput(format!(
                "header has none of the search columns [{}]",
                wanted.join(", ")
            ))
        })
}

/// Write processed records to `path`, replacing it atomically.
///
/// Rows go to a temporary file in the same directory, which is renamed over
/// `path` only after a successful flush. A failure at any step leaves the
/// original file untouched. An existing file keeps its permissions.
pub fn write_records<P: AsRef<Path>>(path: P, records: &[Record]) -> Result<(), RecordFileError> {
    let path = path.as_ref();
    let dir = parent_dir(path);
    let mut tmp = NamedTempFile::new_in(&dir)?;

    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(OUTPUT_HEADER)?;
        for record in records {
            writer.write_record([
                record.name.as_str(),
                if record.result { "true" } else { "false" },
                record.matched_value.as_str(),
                record.match_type.as_str(),
            ])?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    match fs::metadata(path) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    tmp.persist(path).map_err(|e| RecordFileError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    tracing::debug!(path = %path.display(), records = records.len(), "wrote processed records");
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matcher::MatchType;
    use std::fs;

    fn write_input(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("input.csv");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn reads_default_name_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(dir.path(), "id,Name\n1,John Smith\n2,\n3,Jane\n");

        let records = read_records(&path, &[]).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["John Smith", "", "Jane"]);
        assert!(records.iter().all(|r| !r.result));
    }

    #[test]
    fn first_present_search_column_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(dir.path(), "company,person\nAcme,Bob\n");

        let cols = vec!["missing".to_string(), "person".to_string(), "company".to_string()];
        let records = read_records(&path, &cols).unwrap();
        assert_eq!(records[0].name, "Bob");
    }

    #[test]
    fn missing_column_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(dir.path(), "id,title\n1,x\n");

        let err = read_records(&path, &[]).unwrap_err();
        assert!(matches!(err, RecordFileError::MalformedInput(_)));
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records(dir.path().join("nope.csv"), &[]).unwrap_err();
        assert!(matches!(err, RecordFileError::Open { .. }));
    }

    #[test]
    fn write_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(dir.path(), "name\nold contents\n");

        let mut hit = Record::new("Mr John Smith");
        hit.result = true;
        hit.matched_value = "john smith".into();
        hit.match_type = MatchType::ContainsLookup;
        write_records(&path, &[hit, Record::new("nobody, really")]).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert_eq!(
            body,
            "name,lookup_result,matched_value,match_type\n\
             Mr John Smith,true,john smith,contains_lookup\n\
             \"nobody, really\",false,,\n"
        );
        // Only the target file remains; the temp file was renamed away.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn write_keeps_target_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = write_input(dir.path(), "name
jane
");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        write_records(&path, &[Record::new("jane")]).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn empty_output_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_records(&path, &[]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "name,lookup_result,matched_value,match_type\n"
        );
    }
}
