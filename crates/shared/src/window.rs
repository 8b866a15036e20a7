use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::models::FeedEntry;

/// The previous UTC calendar day, computed once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DayWindow {
    /// The UTC day before `now`: [00:00:00, 23:59:59.999999]
    pub fn previous_day(now: DateTime<Utc>) -> Self {
        let yesterday = now.date_naive() - Duration::days(1);
        Self::for_date(yesterday)
    }

    pub fn for_date(date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        let end = start + Duration::days(1) - Duration::microseconds(1);
        Self { start, end }
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// Keep entries stamped inside the window; undated entries are dropped
    pub fn filter(&self, entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
        entries
            .into_iter()
            .filter(|entry| entry.timestamp.is_some_and(|t| self.contains(t)))
            .collect()
    }

    /// Most recent entry inside the window. On equal timestamps the one
    /// that appears first in the feed wins.
    pub fn latest(&self, entries: Vec<FeedEntry>) -> Option<FeedEntry> {
        let mut latest: Option<FeedEntry> = None;
        for entry in self.filter(entries) {
            let newer = match &latest {
                Some(current) => entry.timestamp > current.timestamp,
                None => true,
            };
            if newer {
                latest = Some(entry);
            }
        }
        latest
    }
}
