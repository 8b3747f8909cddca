use guestlist_core::NewGuest;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::traits::GuestStore;

/// Writes per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Title of the name column in the sheets staff export.
const NAME_HEADER: &str = "שם";

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCsv {
    pub guests: Vec<NewGuest>,
    /// Data lines dropped for lacking a positive row number or a name.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub batches: usize,
}

fn is_header(line: &str, cells: &[String]) -> bool {
    line.contains(NAME_HEADER)
        || line.contains("Column")
        || cells.iter().any(|c| c.eq_ignore_ascii_case("name"))
}

/// Split one line on commas, treating quoted sections as literal text.
fn split_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    values.push(current.trim().to_string());
    values
}

/// Leading-digit integer parse: `"12a"` reads as 12. Anything not positive is rejected.
fn parse_row_number(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().filter(|n| *n > 0)
}

/// Parse the guest sheet export.
///
/// Columns: row number, name, phone, age, gender, framework, responsibility,
/// notes. Lines up to and including the header are skipped; when no header is
/// found the first line is treated as one.
pub fn parse_guest_csv(content: &str) -> ParsedCsv {
    let lines: Vec<&str> = content.trim().lines().map(str::trim).collect();

    let header_index = lines
        .iter()
        .position(|line| is_header(line, &split_line(line)))
        .unwrap_or(0);

    let mut parsed = ParsedCsv::default();
    for line in lines.iter().skip(header_index + 1) {
        if line.is_empty() {
            continue;
        }
        let values = split_line(line);
        let cell = |i: usize| values.get(i).cloned().unwrap_or_default();

        let row_number = values.first().and_then(|v| parse_row_number(v));
        let name = cell(1);
        let Some(row_number) = row_number.filter(|_| !name.is_empty()) else {
            debug!(line, "skipping csv line without row number or name");
            parsed.skipped += 1;
            continue;
        };

        parsed.guests.push(NewGuest {
            row_number,
            name,
            phone: cell(2),
            age: cell(3),
            gender: cell(4),
            framework: cell(5),
            responsibility: cell(6),
            notes: cell(7),
            ..NewGuest::default()
        });
    }
    parsed
}

/// Write guests in fixed-size transactions. A failing batch stops the import;
/// earlier batches stay committed.
pub fn import_guests(
    store: &mut dyn GuestStore,
    guests: &[NewGuest],
    options: &ImportOptions,
) -> Result<ImportReport, StorageError> {
    let batch_size = options.batch_size.max(1);
    let mut report = ImportReport::default();

    for (index, chunk) in guests.chunks(batch_size).enumerate() {
        store.add_batch(chunk)?;
        report.batches += 1;
        report.imported += chunk.len();
        info!(
            batch = index + 1,
            imported = report.imported,
            total = guests.len(),
            "import batch committed"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use guestlist_core::ConfirmationStatus;

    use super::*;
    use crate::SqliteStore;

    #[test]
    fn skips_preamble_and_header() {
        let csv = ",,,\nמספר שורה,שם,טלפון,גיל,מגדר,מסגרת,באחריות,הערות\n1,Dana,0501234567,34,F,Choir,Avi,\"likes tea, no sugar\"\n";
        let parsed = parse_guest_csv(csv);
        assert_eq!(parsed.guests.len(), 1);
        let guest = &parsed.guests[0];
        assert_eq!(guest.row_number, 1);
        assert_eq!(guest.name, "Dana");
        assert_eq!(guest.phone, "0501234567");
        assert_eq!(guest.framework, "Choir");
        assert_eq!(guest.notes, "likes tea, no sugar");
        assert!(!guest.already_spoke);
        assert_eq!(guest.confirmation_status, ConfirmationStatus::NotYetHandled);
        assert_eq!(guest.handled_by, "");
    }

    #[test]
    fn rejects_rows_without_number_or_name() {
        let csv = "row,name,phone\n0,Zero,1\n-2,Negative,1\nx,Text,1\n5,,1\n7b,Lenient,1\n8,Short\n";
        let parsed = parse_guest_csv(csv);
        let names: Vec<&str> = parsed.guests.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Lenient", "Short"]);
        assert_eq!(parsed.guests[0].row_number, 7);
        assert_eq!(parsed.guests[1].phone, "");
        assert_eq!(parsed.skipped, 4);
    }

    #[test]
    fn first_line_is_header_when_none_detected() {
        let parsed = parse_guest_csv("1,A\n2,B\n");
        assert_eq!(parsed.guests.len(), 1);
        assert_eq!(parsed.guests[0].name, "B");
    }

    #[test]
    fn import_commits_in_batches() -> Result<(), Box<dyn std::error::Error>> {
        let mut store = SqliteStore::open_in_memory()?;
        let guests: Vec<NewGuest> = (1..=7).map(|n| NewGuest::new(n, format!("g{n}"))).collect();

        let report = import_guests(&mut store, &guests, &ImportOptions { batch_size: 3 })?;
        assert_eq!(report, ImportReport { imported: 7, batches: 3 });
        assert_eq!(store.count()?, 7);
        Ok(())
    }
}
