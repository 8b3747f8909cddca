use std::collections::BTreeSet;

use guestlist_core::{ConfirmationStatus, GuestRecord};

use crate::error::EngineError;

const ALL_SENTINEL: &str = "all";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ConfirmationStatus),
}

impl StatusFilter {
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        if s.trim() == ALL_SENTINEL {
            return Ok(Self::All);
        }
        Ok(Self::Only(ConfirmationStatus::parse(s)?))
    }

    fn matches(&self, record: &GuestRecord) -> bool {
        match self {
            Self::All => true,
            Self::Only(status) => record.confirmation_status == *status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FrameworkFilter {
    #[default]
    All,
    Only(String),
}

impl FrameworkFilter {
    pub fn parse(s: &str) -> Self {
        if s == ALL_SENTINEL {
            Self::All
        } else {
            Self::Only(s.to_string())
        }
    }

    fn matches(&self, record: &GuestRecord) -> bool {
        match self {
            Self::All => true,
            Self::Only(framework) => record.framework == *framework,
        }
    }
}

/// Search, status and framework predicates, ANDed. The default matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub search: String,
    pub status: StatusFilter,
    pub framework: FrameworkFilter,
}

impl ListFilter {
    pub fn matches(&self, record: &GuestRecord) -> bool {
        self.matches_search(record) && self.status.matches(record) && self.framework.matches(record)
    }

    /// Case-insensitive against the name, plain substring against the phone.
    fn matches_search(&self, record: &GuestRecord) -> bool {
        if self.search.is_empty() {
            return true;
        }
        record
            .name
            .to_lowercase()
            .contains(&self.search.to_lowercase())
            || record.phone.contains(&self.search)
    }
}

/// Counts over the filtered set. The per-status counts sum to `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuestStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub declined: usize,
    pub maybe: usize,
    pub no_answer: usize,
    pub spoke: usize,
}

impl GuestStats {
    pub fn collect<'a>(records: impl IntoIterator<Item = &'a GuestRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            if record.already_spoke {
                stats.spoke += 1;
            }
            *stats.slot(record.confirmation_status) += 1;
        }
        stats
    }

    pub fn by_status(&self, status: ConfirmationStatus) -> usize {
        match status {
            ConfirmationStatus::NotYetHandled => self.pending,
            ConfirmationStatus::Confirmed => self.confirmed,
            ConfirmationStatus::Declined => self.declined,
            ConfirmationStatus::Maybe => self.maybe,
            ConfirmationStatus::NoAnswer => self.no_answer,
        }
    }

    fn slot(&mut self, status: ConfirmationStatus) -> &mut usize {
        match status {
            ConfirmationStatus::NotYetHandled => &mut self.pending,
            ConfirmationStatus::Confirmed => &mut self.confirmed,
            ConfirmationStatus::Declined => &mut self.declined,
            ConfirmationStatus::Maybe => &mut self.maybe,
            ConfirmationStatus::NoAnswer => &mut self.no_answer,
        }
    }
}

/// The derived list shown for one snapshot under one filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestListView {
    sorted: Vec<GuestRecord>,
    visible: Vec<usize>,
    frameworks: Vec<String>,
    next_row_number: Option<i64>,
    stats: GuestStats,
}

impl GuestListView {
    /// `records` arrive in store order; that order breaks row-number ties.
    pub fn build(mut records: Vec<GuestRecord>, filter: &ListFilter) -> Self {
        records.sort_by_key(|record| record.row_number);

        let frameworks = records
            .iter()
            .filter(|record| !record.framework.is_empty())
            .map(|record| record.framework.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let next_row_number = records
            .iter()
            .map(|record| record.row_number)
            .max()
            .map_or(Some(1), |max| max.checked_add(1));

        let mut view = Self {
            sorted: records,
            visible: Vec::new(),
            frameworks,
            next_row_number,
            stats: GuestStats::default(),
        };
        view.refilter(filter);
        view
    }

    pub fn refilter(&mut self, filter: &ListFilter) {
        self.visible = self
            .sorted
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.matches(record))
            .map(|(index, _)| index)
            .collect();
        self.stats = GuestStats::collect(self.visible_records());
    }

    /// Every record, sorted by row number.
    pub fn records(&self) -> &[GuestRecord] {
        &self.sorted
    }

    pub fn visible_records(&self) -> impl Iterator<Item = &GuestRecord> {
        self.visible.iter().map(|&index| &self.sorted[index])
    }

    pub fn frameworks(&self) -> &[String] {
        &self.frameworks
    }

    /// One past the highest row number, or 1 for an empty list. `None` when
    /// the highest row number is `i64::MAX`.
    pub fn next_row_number(&self) -> Option<i64> {
        self.next_row_number
    }

    pub fn stats(&self) -> &GuestStats {
        &self.stats
    }

    pub fn shown(&self) -> usize {
        self.visible.len()
    }

    pub fn total(&self) -> usize {
        self.sorted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guestlist_core::{GuestId, Timestamp};

    fn guest(row: i64, name: &str) -> GuestRecord {
        let mut record = GuestRecord::from_fields(GuestId::new(), Timestamp::ZERO, Vec::new());
        record.row_number = row;
        record.name = name.into();
        record
    }

    fn rows(view: &GuestListView) -> Vec<i64> {
        view.visible_records().map(|r| r.row_number).collect()
    }

    #[test]
    fn sorts_by_row_number_and_suggests_next() {
        let view = GuestListView::build(
            vec![guest(3, "c"), guest(1, "a"), guest(2, "b")],
            &ListFilter::default(),
        );
        assert_eq!(rows(&view), vec![1, 2, 3]);
        assert_eq!(view.next_row_number(), Some(4));
    }

    #[test]
    fn empty_collection_starts_at_one() {
        let view = GuestListView::build(Vec::new(), &ListFilter::default());
        assert_eq!(view.next_row_number(), Some(1));
        assert_eq!(view.stats().total, 0);
    }

    #[test]
    fn highest_possible_row_number_leaves_no_next() {
        let view = GuestListView::build(
            vec![guest(i64::MAX, "last"), guest(1, "first")],
            &ListFilter::default(),
        );
        assert_eq!(rows(&view), vec![1, i64::MAX]);
        assert_eq!(view.next_row_number(), None);
        assert_eq!(view.stats().total, 2);
    }

    #[test]
    fn equal_row_numbers_keep_store_order() {
        let view = GuestListView::build(
            vec![guest(2, "first"), guest(1, "x"), guest(2, "second")],
            &ListFilter::default(),
        );
        let names: Vec<&str> = view.visible_records().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["x", "first", "second"]);
    }

    #[test]
    fn search_matches_name_case_insensitively_and_phone_verbatim() {
        let mut dana = guest(1, "Dana");
        dana.phone = "0521111111".into();
        let mut other = guest(2, "Yossi");
        other.phone = "0501234567".into();
        let records = vec![dana, other];

        let by_name = ListFilter {
            search: "dan".into(),
            ..ListFilter::default()
        };
        assert_eq!(rows(&GuestListView::build(records.clone(), &by_name)), vec![1]);

        let by_phone = ListFilter {
            search: "05".into(),
            ..ListFilter::default()
        };
        assert_eq!(rows(&GuestListView::build(records.clone(), &by_phone)), vec![1, 2]);

        let narrow = ListFilter {
            search: "050".into(),
            ..ListFilter::default()
        };
        assert_eq!(rows(&GuestListView::build(records, &narrow)), vec![2]);
    }

    #[test]
    fn frameworks_are_unique_sorted_and_non_empty() {
        let mut a = guest(1, "a");
        a.framework = "Scouts".into();
        let mut b = guest(2, "b");
        b.framework = "Choir".into();
        let mut c = guest(3, "c");
        c.framework = "Scouts".into();
        let mut d = guest(4, "d");
        d.framework = "scouts".into();
        let view = GuestListView::build(vec![a, b, c, d, guest(5, "e")], &ListFilter::default());
        assert_eq!(view.frameworks(), ["Choir", "Scouts", "scouts"]);
    }

    #[test]
    fn stats_cover_filtered_set_only() {
        let mut records = Vec::new();
        let mut row = 0;
        for (i, status) in ConfirmationStatus::ALL.into_iter().enumerate() {
            for n in 0..3 {
                row += 1;
                let mut record = guest(row, &format!("guest {row}"));
                record.confirmation_status = status;
                record.framework = if n == 0 { "Choir".into() } else { "Scouts".into() };
                record.already_spoke = i % 2 == 0;
                records.push(record);
            }
        }

        let all = GuestListView::build(records.clone(), &ListFilter::default());
        assert_eq!(all.stats().total, 15);
        for status in ConfirmationStatus::ALL {
            assert_eq!(all.stats().by_status(status), 3);
        }

        let scouts = ListFilter {
            framework: FrameworkFilter::Only("Scouts".into()),
            ..ListFilter::default()
        };
        let view = GuestListView::build(records, &scouts);
        let stats = view.stats();
        let summed: usize = ConfirmationStatus::ALL
            .into_iter()
            .map(|s| stats.by_status(s))
            .sum();
        assert_eq!(stats.total, 10);
        assert_eq!(summed, stats.total);
        assert_eq!(stats.spoke, 6);
        assert_eq!(view.shown(), 10);
        assert_eq!(view.total(), 15);
    }

    #[test]
    fn status_filter_parses_sentinel_and_values() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(StatusFilter::parse("all")?, StatusFilter::All);
        assert_eq!(
            StatusFilter::parse("declined")?,
            StatusFilter::Only(ConfirmationStatus::Declined)
        );
        assert!(StatusFilter::parse("bogus").is_err());
        assert_eq!(FrameworkFilter::parse("all"), FrameworkFilter::All);
        Ok(())
    }

    #[test]
    fn filters_combine_with_and() {
        let mut a = guest(1, "Dana");
        a.confirmation_status = ConfirmationStatus::Confirmed;
        let mut b = guest(2, "Daniel");
        b.confirmation_status = ConfirmationStatus::Declined;
        let filter = ListFilter {
            search: "dan".into(),
            status: StatusFilter::Only(ConfirmationStatus::Confirmed),
            framework: FrameworkFilter::All,
        };
        assert_eq!(rows(&GuestListView::build(vec![a, b], &filter)), vec![1]);
    }
}
