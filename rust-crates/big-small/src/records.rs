//! Vocabulary of the results feed: digits, colors, sizes, rounds and the
//! paginated record book shown under the timer.

use chrono::{
    DateTime,
    Timelike,
    Utc,
};
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

use crate::timer::DurationId;

pub const DEFAULT_RECORDS_PER_PAGE: usize = 5;
const PAGE_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digit(u8);

impl Digit {
    pub fn new(value: u8) -> Option<Self> {
        (value <= 9).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Green,
    Violet,
}

impl Color {
    /// Display color of a drawn number: zero is violet, even numbers green,
    /// odd numbers red.
    pub fn for_number(digit: Digit) -> Self {
        match digit.value() {
            0 => Color::Violet,
            n if n % 2 == 0 => Color::Green,
            _ => Color::Red,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Violet => "violet",
        }
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // the feed sometimes reports composite colors such as "red,violet";
        // the first recognised component wins
        raw.split(|c: char| !c.is_ascii_alphabetic())
            .find_map(|part| match part.to_ascii_lowercase().as_str() {
                "red" => Some(Color::Red),
                "green" => Some(Color::Green),
                "violet" | "purple" => Some(Color::Violet),
                _ => None,
            })
            .ok_or_else(|| anyhow::anyhow!("unknown color '{raw}'"))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Red => "Red",
            Color::Green => "Green",
            Color::Violet => "Violet",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    Big,
    Small,
}

impl Size {
    pub fn for_number(digit: Digit) -> Self {
        if digit.value() >= 5 { Size::Big } else { Size::Small }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Size::Big => "big",
            Size::Small => "small",
        }
    }
}

impl FromStr for Size {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "big" => Ok(Size::Big),
            "small" => Ok(Size::Small),
            _ => Err(anyhow::anyhow!("unknown size label '{raw}'")),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Size::Big => "Big",
            Size::Small => "Small",
        };
        write!(f, "{name}")
    }
}

/// Identifier of a betting round ("period").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoundId(String);

impl RoundId {
    pub fn new(period: impl Into<String>) -> Self {
        Self(period.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Round opened after `period` closed. Numeric periods are incremented
    /// keeping their width; anything else is taken verbatim.
    pub fn following(period: &str) -> Self {
        Self::new(period)
            .offset(1)
            .unwrap_or_else(|| Self::new(period))
    }

    /// Date-based identifier used when the feed is unavailable:
    /// `YYYYMMDD` + duration minutes + 1-based cycle index within the day.
    /// Two clients with the same clock agree on it.
    pub fn fallback(duration: DurationId, now_millis: i64) -> Self {
        let now: DateTime<Utc> =
            DateTime::from_timestamp_millis(now_millis).unwrap_or_default();
        let minute_of_day = now.hour() * 60 + now.minute();
        let cycle = minute_of_day / duration.minutes().max(1) + 1;
        Self(format!(
            "{}{:02}{:04}",
            now.format("%Y%m%d"),
            duration.minutes(),
            cycle
        ))
    }

    fn offset(&self, delta: i128) -> Option<Self> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: i128 = self.0.parse().ok()?;
        let shifted = value.checked_add(delta)?;
        if shifted < 0 {
            return None;
        }
        Some(Self(format!("{:0width$}", shifted, width = self.0.len())))
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub period: String,
    pub number: Digit,
    pub color: Color,
    pub size: Size,
}

/// Stand-in history for when the feed cannot be reached, so the table never
/// stays empty. Periods count back from `round`.
pub fn placeholder_records<R: Rng>(
    round: &RoundId,
    count: usize,
    rng: &mut R,
) -> Vec<GameRecord> {
    (1..=count)
        .map(|back| {
            let number = Digit(rng.random_range(0..=9));
            let period = round
                .offset(-(back as i128))
                .unwrap_or_else(|| round.clone());
            GameRecord {
                period: period.0,
                number,
                color: Color::for_number(number),
                size: Size::for_number(number),
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RecordBook {
    records: Vec<GameRecord>,
    per_page: usize,
    current_page: usize,
}

impl Default for RecordBook {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDS_PER_PAGE)
    }
}

impl RecordBook {
    pub fn new(per_page: usize) -> Self {
        Self {
            records: Vec::new(),
            per_page: per_page.max(1),
            current_page: 1,
        }
    }

    pub fn replace(&mut self, records: Vec<GameRecord>) {
        self.records = records;
        self.current_page = self.current_page.min(self.total_pages()).max(1);
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&GameRecord> {
        self.records.first()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.records.len().div_ceil(self.per_page)
    }

    pub fn go_to(&mut self, page: usize) {
        self.current_page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn next_page(&mut self) {
        self.go_to(self.current_page + 1);
    }

    pub fn prev_page(&mut self) {
        self.go_to(self.current_page.saturating_sub(1));
    }

    pub fn page_records(&self) -> &[GameRecord] {
        let start = (self.current_page - 1) * self.per_page;
        let end = (start + self.per_page).min(self.records.len());
        self.records.get(start..end).unwrap_or(&[])
    }

    /// 1-based inclusive range of the records on the current page.
    pub fn showing(&self) -> Option<(usize, usize)> {
        if self.records.is_empty() {
            return None;
        }
        let first = (self.current_page - 1) * self.per_page + 1;
        let last = (self.current_page * self.per_page).min(self.records.len());
        Some((first, last))
    }

    /// Page numbers for the pager: at most five, kept around the current
    /// page and pinned to either end of the book.
    pub fn page_window(&self) -> Vec<usize> {
        let total = self.total_pages();
        let shown = total.min(PAGE_WINDOW);
        let start = if total <= PAGE_WINDOW || self.current_page <= 3 {
            1
        } else if self.current_page + 2 >= total {
            total - (PAGE_WINDOW - 1)
        } else {
            self.current_page - 2
        };
        (start..start + shown).collect()
    }
}
