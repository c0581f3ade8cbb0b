use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{DataError, DataResult};
use crate::table::{Table, Value};

/// MIME type browsers send for `.csv` uploads
pub const CSV_MIME: &str = "text/csv";

/// MIME type browsers send for `.xlsx` uploads
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Cell contents read as missing values in CSV input
const NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

/// The two upload formats the explorer understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    Csv,
    Spreadsheet,
}

impl MediaType {
    /// Resolves the declared media type of an upload
    ///
    /// The declared tag wins when it is one of the two supported MIME types.
    /// Browsers sometimes send a generic tag (`application/octet-stream`, an
    /// empty string, or `application/vnd.ms-excel` for CSV files on Windows);
    /// in that case the file name extension decides.
    ///
    /// # Arguments
    /// * `declared` - Content type sent with the upload
    /// * `file_name` - Original file name, if the browser sent one
    ///
    /// # Returns
    /// * `DataResult<MediaType>` - The format, or `UnsupportedFileType`
    pub fn detect(declared: &str, file_name: Option<&str>) -> DataResult<Self> {
        let declared = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match declared.as_str() {
            CSV_MIME => return Ok(MediaType::Csv),
            XLSX_MIME => return Ok(MediaType::Spreadsheet),
            "" | "application/octet-stream" | "application/vnd.ms-excel" => {}
            _ => return Err(DataError::UnsupportedFileType(declared)),
        }

        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(MediaType::Csv),
            Some("xlsx") => Ok(MediaType::Spreadsheet),
            _ => Err(DataError::UnsupportedFileType(if declared.is_empty() {
                file_name.unwrap_or("unknown").to_string()
            } else {
                declared
            })),
        }
    }
}

/// A file as received from the browser
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: Option<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadedFile {
            name,
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn media_type(&self) -> DataResult<MediaType> {
        MediaType::detect(&self.content_type, self.name.as_deref())
    }
}

/// Result of ingesting one upload
#[derive(Clone, Debug)]
pub enum Ingested {
    Table(Arc<Table>),
    Workbook(Arc<Workbook>),
}

/// Ingests an uploaded file according to its media type
///
/// CSV files are parsed completely. Workbooks are only opened to read the
/// sheet names; sheets are parsed later with [`Workbook::parse_sheet`].
pub fn load(file: &UploadedFile) -> DataResult<Ingested> {
    parse(file.media_type()?, &file.bytes)
}

/// Ingests `bytes` already known to be of format `media`
pub fn parse(media: MediaType, bytes: &[u8]) -> DataResult<Ingested> {
    match media {
        MediaType::Csv => Ok(Ingested::Table(Arc::new(from_csv(bytes)?))),
        MediaType::Spreadsheet => Ok(Ingested::Workbook(Arc::new(Workbook::open(
            bytes.to_vec(),
        )?))),
    }
}

/// Parse comma-separated bytes with a header row into a [`Table`]
///
/// # Arguments
/// * `bytes` - Raw file content, UTF-8 encoded
///
/// # Returns
/// * `DataResult<Table>` - The table, or an error describing the first bad row
///
/// # Errors
/// * `EmptyFile` if there is no header row
/// * `RaggedRow` if a record has more fields than the header
/// * `Csv` for invalid UTF-8 or malformed quoting
pub fn from_csv(bytes: &[u8]) -> DataResult<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.is_empty() {
        return Err(DataError::EmptyFile);
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() > header.len() {
            return Err(DataError::RaggedRow {
                row: index + 1,
                found: record.len(),
                expected: header.len(),
            });
        }
        rows.push(record.iter().map(parse_field).collect());
    }

    Ok(Table::from_rows(header, rows))
}

fn parse_field(field: &str) -> Value {
    if NA_VALUES.contains(&field) {
        return Value::Missing;
    }
    match field.trim().parse::<f64>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::Text(field.to_string()),
    }
}

/// An opened `.xlsx` workbook whose sheets are parsed on demand
#[derive(Debug)]
pub struct Workbook {
    bytes: Arc<[u8]>,
    sheet_names: Vec<String>,
}

impl Workbook {
    /// Opens a workbook from memory and reads its sheet names
    pub fn open(bytes: Vec<u8>) -> DataResult<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let sheet_names = {
            let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(&bytes[..]))?;
            workbook.sheet_names()
        };

        Ok(Workbook { bytes, sheet_names })
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Parses one sheet into a [`Table`]
    ///
    /// The first row of the sheet's used range is the header. An empty sheet
    /// gives an empty table.
    pub fn parse_sheet(&self, name: &str) -> DataResult<Table> {
        if !self.sheet_names.iter().any(|s| s == name) {
            return Err(DataError::UnknownSheet(name.to_string()));
        }

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(&self.bytes[..]))?;
        let range = workbook.worksheet_range(name)?;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(cells) => cells.iter().map(header_name).collect(),
            None => return Ok(Table::default()),
        };

        let data = rows
            .map(|cells| cells.iter().map(cell_value).collect())
            .collect();

        Ok(Table::from_rows(header, data))
    }
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) if s.is_empty() => Value::Missing,
        Data::String(s) => Value::Text(s.clone()),
        Data::Bool(b) => Value::Text(if *b { "True" } else { "False" }.to_string()),
        Data::Empty | Data::Error(_) => Value::Missing,
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_declared_types() {
        assert_eq!(MediaType::detect("text/csv", None).unwrap(), MediaType::Csv);
        assert_eq!(
            MediaType::detect("text/csv; charset=utf-8", None).unwrap(),
            MediaType::Csv
        );
        assert_eq!(
            MediaType::detect(XLSX_MIME, None).unwrap(),
            MediaType::Spreadsheet
        );
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            MediaType::detect("application/octet-stream", Some("data.CSV")).unwrap(),
            MediaType::Csv
        );
        assert_eq!(
            MediaType::detect("", Some("book.xlsx")).unwrap(),
            MediaType::Spreadsheet
        );
    }

    #[test]
    fn test_detect_rejects_other_types() {
        let err = MediaType::detect("application/pdf", Some("report.csv")).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedFileType(t) if t == "application/pdf"));

        let err = MediaType::detect("application/octet-stream", Some("notes.txt")).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedFileType(_)));
    }

    #[test]
    fn test_from_csv_header_and_rows() {
        let table = from_csv(b"time,value,label\n1,2.5,a\n2,NA,b\n3,4,\n").unwrap();

        assert_eq!(table.column_names(), vec!["time", "value", "label"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column("value").unwrap().values[1], Value::Missing);
        assert_eq!(table.column("label").unwrap().values[2], Value::Missing);
        assert!(table.column("value").unwrap().is_numeric());
        assert!(!table.column("label").unwrap().is_numeric());
    }

    #[test]
    fn test_from_csv_rejects_long_rows() {
        let err = from_csv(b"a,b\n1,2\n3,4,5\n").unwrap_err();
        assert!(matches!(
            err,
            DataError::RaggedRow {
                row: 2,
                found: 3,
                expected: 2
            }
        ));
    }

    #[test]
    fn test_from_csv_empty_input() {
        assert!(matches!(from_csv(b"").unwrap_err(), DataError::EmptyFile));
    }

    #[test]
    fn test_from_csv_invalid_utf8() {
        let err = from_csv(b"a,b\n1,\xff\xfe\n").unwrap_err();
        assert!(matches!(err, DataError::Csv(_)));
    }

    #[test]
    fn test_load_unsupported_type() {
        let file = UploadedFile::new(Some("x.json".into()), "application/json", b"{}".to_vec());
        assert!(matches!(
            load(&file).unwrap_err(),
            DataError::UnsupportedFileType(_)
        ));
    }

    #[test]
    fn test_open_garbage_workbook_is_an_error() {
        assert!(matches!(
            Workbook::open(b"not a zip".to_vec()).unwrap_err(),
            DataError::Workbook(_)
        ));
    }
}
