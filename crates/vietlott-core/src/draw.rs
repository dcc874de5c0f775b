//! Canonical draw record shared by the crawler, the store, and the streak engine.

use serde::{Deserialize, Serialize};

/// One parsed draw result.
///
/// Field order is the on-disk column order of the JSONL dataset, so keep it
/// stable: `date, id, result, page, process_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    /// ISO `YYYY-MM-DD` date.
    pub date: String,
    /// Draw identifier. Opaque; ordered as a plain string.
    pub id: String,
    pub result: Vec<u32>,
    /// Page index the record was fetched from.
    pub page: i64,
    /// ISO 8601 local timestamp of when the page was parsed.
    pub process_time: String,
}

impl DrawRecord {
    /// Sum of the drawn numbers.
    pub fn sum(&self) -> u32 {
        self.result.iter().sum()
    }

    /// Key the dataset is ordered by.
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.date, &self.id)
    }
}

/// Sort records ascending by `(date, id)`.
///
/// Stable, so records sharing a key keep their relative order.
pub fn sort_draws(draws: &mut [DrawRecord]) {
    draws.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Whether `draws` is ascending by `(date, id)`.
pub fn is_sorted(draws: &[DrawRecord]) -> bool {
    draws.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key())
}

#[cfg(test)]
pub(crate) fn draw(date: &str, id: &str, result: &[u32]) -> DrawRecord {
    DrawRecord {
        date: date.into(),
        id: id.into(),
        result: result.to_vec(),
        page: 0,
        process_time: "2024-01-01T00:00:00.000000".into(),
    }
}
