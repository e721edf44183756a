//! Visit streak and page view counters.

use super::{Field, Property, PropertyBinding};
use crate::api::UserData;
use crate::model::document::DocumentMap;
use std::any::Any;
use std::collections::BTreeMap;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

const LAST_VISIT_DATE_KEY: &str = "lastVisitDate";
const CONSECUTIVE_VISITS_KEY: &str = "consecutiveVisits";
const NUM_PAGEVIEWS_KEY: &str = "numPageviews";
const PAGEVIEWS_PER_DAY_KEY: &str = "pageviewsPerDay";

const DOCUMENT_KEYS: &[&str] = &[
    LAST_VISIT_DATE_KEY,
    CONSECUTIVE_VISITS_KEY,
    NUM_PAGEVIEWS_KEY,
    PAGEVIEWS_PER_DAY_KEY,
];

/// Tracks the consecutive-day visit streak and page views per UTC day.
///
/// `pageviewsPerDay` is keyed by the UTC day start in epoch milliseconds,
/// rendered as a string because document keys are strings.
pub struct LastVisitProperty {
    last_visit_date: Field<i64>,
    consecutive_visits: Field<u32>,
    num_pageviews: Field<u64>,
    pageviews_per_day: Field<BTreeMap<String, u64>>,
    binding: PropertyBinding,
}

impl LastVisitProperty {
    pub fn new() -> Self {
        Self {
            last_visit_date: Field::new(LAST_VISIT_DATE_KEY),
            consecutive_visits: Field::new(CONSECUTIVE_VISITS_KEY),
            num_pageviews: Field::new(NUM_PAGEVIEWS_KEY),
            pageviews_per_day: Field::new(PAGEVIEWS_PER_DAY_KEY),
            binding: PropertyBinding::default(),
        }
    }

    pub fn last_visit_date(&self) -> Option<i64> {
        self.last_visit_date.get().copied()
    }

    pub fn consecutive_visits(&self) -> u32 {
        self.consecutive_visits.get().copied().unwrap_or(0)
    }

    pub fn num_pageviews(&self) -> u64 {
        self.num_pageviews.get().copied().unwrap_or(0)
    }

    pub fn pageviews_per_day(&self) -> BTreeMap<String, u64> {
        self.pageviews_per_day.get().cloned().unwrap_or_default()
    }

    /// Records one page view at `now_ms` and updates the streak.
    pub fn record_visit(&mut self, now_ms: i64) {
        let today = now_ms.div_euclid(DAY_MS);
        let current = self.consecutive_visits();
        let streak = match self.last_visit_date() {
            Some(last_ms) => match today - last_ms.div_euclid(DAY_MS) {
                gap if gap <= 0 => current.max(1),
                1 => current.saturating_add(1),
                _ => 1,
            },
            None => 1,
        };

        self.last_visit_date.set(now_ms);
        self.consecutive_visits.set(streak);
        self.num_pageviews.set(self.num_pageviews().saturating_add(1));
        *self
            .pageviews_per_day
            .get_or_insert_with(BTreeMap::new)
            .entry((today * DAY_MS).to_string())
            .or_insert(0) += 1;

        self.binding.commit(self.export_value(), "lastVisit");
    }
}

impl Default for LastVisitProperty {
    fn default() -> Self {
        Self::new()
    }
}

impl Property for LastVisitProperty {
    fn id(&self) -> &'static str {
        "lastVisit"
    }

    fn document_keys(&self) -> &'static [&'static str] {
        DOCUMENT_KEYS
    }

    fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut PropertyBinding {
        &mut self.binding
    }

    fn reset(&mut self) {
        self.last_visit_date.clear();
        self.consecutive_visits.clear();
        self.num_pageviews.clear();
        self.pageviews_per_day.clear();
    }

    fn export_value(&self) -> DocumentMap {
        let mut document = DocumentMap::new();
        self.last_visit_date.export_into(&mut document);
        self.consecutive_visits.export_into(&mut document);
        self.num_pageviews.export_into(&mut document);
        self.pageviews_per_day.export_into(&mut document);
        document
    }

    fn import_value_from_object(&mut self, document: &DocumentMap) {
        self.last_visit_date.import_from(document);
        self.consecutive_visits.import_from(document);
        self.num_pageviews.import_from(document);
        self.pageviews_per_day.import_from(document);
    }

    fn expose_api(&self, api: &mut UserData) {
        api.last_visit_date = self.last_visit_date();
        api.consecutive_visits = self.consecutive_visits();
        api.num_pageviews = self.num_pageviews();
        api.pageviews_per_day = self.pageviews_per_day();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{LastVisitProperty, DAY_MS};

    const DAY_ONE_NOON: i64 = 1_700_000_000_000 / DAY_MS * DAY_MS + DAY_MS / 2;

    #[test]
    fn first_visit_starts_streak() {
        let mut visits = LastVisitProperty::new();
        visits.record_visit(DAY_ONE_NOON);

        assert_eq!(visits.consecutive_visits(), 1);
        assert_eq!(visits.num_pageviews(), 1);
        assert_eq!(visits.last_visit_date(), Some(DAY_ONE_NOON));
    }

    #[test]
    fn same_day_counts_views_and_next_day_extends_streak() {
        let mut visits = LastVisitProperty::new();
        visits.record_visit(DAY_ONE_NOON);
        visits.record_visit(DAY_ONE_NOON + 60_000);
        visits.record_visit(DAY_ONE_NOON + DAY_MS);

        assert_eq!(visits.consecutive_visits(), 2);
        assert_eq!(visits.num_pageviews(), 3);
        let per_day = visits.pageviews_per_day();
        assert_eq!(per_day.len(), 2);
        assert_eq!(per_day.values().copied().collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn gap_resets_streak() {
        let mut visits = LastVisitProperty::new();
        visits.record_visit(DAY_ONE_NOON);
        visits.record_visit(DAY_ONE_NOON + DAY_MS);
        visits.record_visit(DAY_ONE_NOON + 4 * DAY_MS);

        assert_eq!(visits.consecutive_visits(), 1);
    }
}
