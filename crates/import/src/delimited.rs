use serde::ser::{Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Single-byte field separator. An empty setting falls back to `,`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter(u8);

impl Delimiter {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "" => return Ok(Delimiter::default()),
            "\\t" | "tab" => return Ok(Delimiter(b'\t')),
            _ => {}
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() && c != '\n' && c != '\r' => Ok(Delimiter(c as u8)),
            _ => Err(ParseError::InvalidDelimiter(s.to_string())),
        }
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Delimiter(b',')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub delimiter: Delimiter,
    pub has_header: bool,
}

impl ParseOptions {
    pub fn new(delimiter: &str, has_header: bool) -> Result<Self, ParseError> {
        Ok(Self {
            delimiter: Delimiter::parse(delimiter)?,
            has_header,
        })
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::default(),
            has_header: true,
        }
    }
}

/// One statement line keyed by column name, in column order.
///
/// A line shorter than the header simply lacks the trailing columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRow {
    cells: Vec<(String, String)>,
}

impl ParsedRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // Repeated header names keep their first position and take the last value.
    fn insert(&mut self, column: &str, value: &str) {
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some(cell) => cell.1 = value.to_string(),
            None => self.cells.push((column.to_string(), value.to_string())),
        }
    }
}

impl FromIterator<(String, String)> for ParsedRow {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut row = ParsedRow::default();
        for (k, v) in iter {
            row.insert(&k, &v);
        }
        row
    }
}

impl Serialize for ParsedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    /// Header names, or `col1..colN` for headerless input.
    pub columns: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

/// Splits pasted statement text into rows.
///
/// Quoted fields are not recognised: a delimiter inside quotes splits the
/// field like any other.
pub fn parse_text(text: &str, options: &ParseOptions) -> Result<ParsedTable, ParseError> {
    let cleaned = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(options.delimiter.as_byte())
        .quoting(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(cleaned.as_bytes());

    let mut records = reader.records();
    let mut table = ParsedTable::default();

    if options.has_header {
        let Some(header) = records.next().transpose()? else {
            return Ok(table);
        };
        table.columns = header.iter().map(str::to_string).collect();
        for result in records {
            let record = result?;
            let row = table
                .columns
                .iter()
                .zip(record.iter())
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect();
            table.rows.push(row);
        }
    } else {
        let mut width = 0;
        for result in records {
            let record = result?;
            width = width.max(record.len());
            let row = record
                .iter()
                .enumerate()
                .map(|(idx, value)| (positional_name(idx), value.to_string()))
                .collect();
            table.rows.push(row);
        }
        table.columns = (0..width).map(positional_name).collect();
    }

    Ok(table)
}

fn positional_name(idx: usize) -> String {
    format!("col{}", idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comma(has_header: bool) -> ParseOptions {
        ParseOptions {
            delimiter: Delimiter::default(),
            has_header,
        }
    }

    const SAMPLE: &str = "date,amount,description\n2024-01-01,100,Coffee\n2024-01-02,-50,Gas";

    // ── delimiter ─────────────────────────────────────────────────────────────

    #[test]
    fn delimiter_defaults_to_comma() {
        assert_eq!(Delimiter::parse("").unwrap().as_char(), ',');
    }

    #[test]
    fn delimiter_accepts_single_ascii_and_tab_aliases() {
        assert_eq!(Delimiter::parse(";").unwrap().as_byte(), b';');
        assert_eq!(Delimiter::parse("\t").unwrap().as_byte(), b'\t');
        assert_eq!(Delimiter::parse("\\t").unwrap().as_byte(), b'\t');
    }

    #[test]
    fn delimiter_rejects_multi_char_and_non_ascii() {
        assert!(matches!(Delimiter::parse(";;"), Err(ParseError::InvalidDelimiter(_))));
        assert!(matches!(Delimiter::parse("§"), Err(ParseError::InvalidDelimiter(_))));
    }

    // ── parse_text ────────────────────────────────────────────────────────────

    #[test]
    fn parses_header_and_rows() {
        let table = parse_text(SAMPLE, &comma(true)).unwrap();
        assert_eq!(table.columns, vec!["date", "amount", "description"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("date"), Some("2024-01-01"));
        assert_eq!(table.rows[0].get("amount"), Some("100"));
        assert_eq!(table.rows[0].get("description"), Some("Coffee"));
        assert_eq!(table.rows[1].get("amount"), Some("-50"));
        assert_eq!(table.rows[1].get("description"), Some("Gas"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "Date;Amount;Details\r\n\r\n01/02/2024; 12.00 ;Lunch\r\n  \r\n03/02/2024;-4;Bus\r\n";
        let options = ParseOptions::new(";", true).unwrap();
        assert_eq!(parse_text(text, &options).unwrap(), parse_text(text, &options).unwrap());
    }

    #[test]
    fn drops_blank_lines_and_trims_cells() {
        let text = "\n  date , amount \n\n 2024-01-01 ,  7.5 \n   \n";
        let table = parse_text(text, &comma(true)).unwrap();
        assert_eq!(table.columns, vec!["date", "amount"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("amount"), Some("7.5"));
    }

    #[test]
    fn short_row_lacks_trailing_columns() {
        let text = "date,amount,description\n2024-01-01,100";
        let table = parse_text(text, &comma(true)).unwrap();
        assert_eq!(table.rows[0].get("amount"), Some("100"));
        assert_eq!(table.rows[0].get("description"), None);
        assert_eq!(table.rows[0].len(), 2);
    }

    #[test]
    fn extra_cells_beyond_header_are_ignored() {
        let table = parse_text("a,b\n1,2,3", &comma(true)).unwrap();
        assert_eq!(table.rows[0].len(), 2);
    }

    #[test]
    fn headerless_input_gets_positional_names() {
        let table = parse_text("2024-01-01,100,Coffee\n2024-01-02,-50", &comma(false)).unwrap();
        assert_eq!(table.columns, vec!["col1", "col2", "col3"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("col3"), Some("Coffee"));
        assert_eq!(table.rows[1].get("col3"), None);
    }

    #[test]
    fn quoted_delimiters_are_not_special() {
        let table = parse_text("d,desc\n2024-01-01,\"Smith, John\"", &comma(true)).unwrap();
        assert_eq!(table.rows[0].get("desc"), Some("\"Smith"));
    }

    #[test]
    fn header_only_and_empty_input_yield_no_rows() {
        assert!(parse_text("date,amount", &comma(true)).unwrap().rows.is_empty());
        let empty = parse_text("  \n\n", &comma(true)).unwrap();
        assert!(empty.rows.is_empty());
        assert!(empty.columns.is_empty());
    }

    #[test]
    fn row_serializes_as_ordered_map() {
        let table = parse_text(SAMPLE, &comma(true)).unwrap();
        let json = serde_json::to_string(&table.rows[0]).unwrap();
        assert_eq!(json, r#"{"date":"2024-01-01","amount":"100","description":"Coffee"}"#);
    }
}
