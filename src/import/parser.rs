use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, DataType, Reader, Xls, Xlsx, open_workbook_from_rs};
use serde::Serialize;
use serde_json::{Number, Value};
use utoipa::ToSchema;

/// Header row plus raw data rows of the first worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<Value>>,
}

pub fn parse_spreadsheet(file_name: &str, bytes: &[u8]) -> Result<ParsedSheet> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "xlsx" | "xlsm" => {
            let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e| anyhow!("Failed to open Excel file: {}", e))?;
            read_first_sheet(workbook)?
        }
        "xls" => {
            let workbook: Xls<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e| anyhow!("Failed to open Excel file: {}", e))?;
            read_first_sheet(workbook)?
        }
        "csv" => read_csv(bytes)?,
        other => bail!("Unsupported file type: {:?}", other),
    };

    into_sheet(table)
}

fn read_first_sheet<R>(mut workbook: R) -> Result<Vec<Vec<Value>>>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    let sheet_names = workbook.sheet_names().to_owned();
    let first_sheet = sheet_names
        .first()
        .ok_or_else(|| anyhow!("Excel file has no sheets"))?;

    let range = workbook
        .worksheet_range(first_sheet)
        .map_err(|e| anyhow!("Failed to read sheet {}: {}", first_sheet, e))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_value).collect())
        .collect())
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match cell.as_date() {
            Some(date) => Value::String(date.to_string()),
            None => Number::from_f64(dt.as_f64())
                .map(Value::Number)
                .unwrap_or(Value::Null),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        _ => Value::Null,
    }
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<Value>>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", index + 1))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Value::Null
                    } else {
                        Value::String(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn into_sheet(table: Vec<Vec<Value>>) -> Result<ParsedSheet> {
    let mut table = table.into_iter();
    let header_row = table.next().ok_or_else(|| anyhow!("Spreadsheet is empty"))?;

    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect();

    let rows = table
        .map(|mut row| {
            if row.len() < headers.len() {
                row.resize(headers.len(), Value::Null);
            }
            row
        })
        .collect();

    Ok(ParsedSheet { headers, rows })
}
