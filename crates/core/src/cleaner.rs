//! Removes records that reference omitted media, missed calls and similar placeholders.

use crate::turns::Record;

/// Drop every record whose prompt or completion contains one of `ignore_keywords`.
///
/// Relative order of the remaining records is preserved. Empty keywords are ignored.
pub fn clean<S: AsRef<str>>(records: Vec<Record>, ignore_keywords: &[S]) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| !record.contains_any(ignore_keywords))
        .collect()
}
