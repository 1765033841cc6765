//! Turning descriptors into concrete periods for an as-of date.

use chrono::{Datelike, Months, NaiveDate};
use finquery_core::{PeriodDescriptor, PeriodItem, PeriodType, PeriodUnit, QueryError, Result};
use tracing::debug;

use crate::grammar::MAX_RELATIVE_COUNT;

/// Month in which the calendar year ends.
pub const CALENDAR_YEAR_END: u32 = 12;

fn check_month(fiscal_year_end_month: u32) -> Result<()> {
    if (1..=12).contains(&fiscal_year_end_month) {
        Ok(())
    } else {
        Err(QueryError::InvalidParameter(format!(
            "fiscal_year_end_month must be within 1..=12, got {fiscal_year_end_month}"
        )))
    }
}

/// Fiscal year label and quarter containing `date`.
///
/// Fiscal years are labelled by the calendar year in which they end, so with
/// a September year end, October 2023 falls in Q1 of FY2024.
#[must_use]
pub fn fiscal_quarter_of(date: NaiveDate, fiscal_year_end_month: u32) -> (i32, u8) {
    let month = date.month() as i32;
    let end = fiscal_year_end_month as i32;
    let year = if month > end { date.year() + 1 } else { date.year() };
    // Always in 1..=4
    let quarter = ((month - end - 1).rem_euclid(12) / 3 + 1) as u8;
    (year, quarter)
}

/// Concrete periods covered by a descriptor as of `as_of`.
///
/// Absolute descriptors return their items unchanged. `relative` descriptors
/// yield the last `count` completed periods before the one containing
/// `as_of`, oldest first; `latest` yields the single most recent completed
/// period. Fiscal calendars apply when the descriptor asks to be normalized
/// to fiscal periods.
///
/// # Errors
/// Returns [`QueryError::InvalidParameter`] if `fiscal_year_end_month` is not
/// a month number, or if a relative window is longer than
/// [`MAX_RELATIVE_COUNT`].
pub fn resolve_items(
    descriptor: &PeriodDescriptor,
    as_of: NaiveDate,
    fiscal_year_end_month: u32,
) -> Result<Vec<PeriodItem>> {
    check_month(fiscal_year_end_month)?;

    let (count, unit) = match descriptor.period_type {
        PeriodType::Single | PeriodType::Range | PeriodType::Multi => {
            return Ok(descriptor.items.clone());
        }
        PeriodType::Relative => match descriptor.relative {
            Some(window) if window.count > MAX_RELATIVE_COUNT => {
                return Err(QueryError::InvalidParameter(format!(
                    "relative window of {} periods exceeds {MAX_RELATIVE_COUNT}",
                    window.count
                )));
            }
            Some(window) => (window.count, window.unit),
            None => return Ok(Vec::new()),
        },
        PeriodType::Latest => (1, descriptor.granularity.unit()),
    };

    let year_end = if descriptor.normalize_to_fiscal {
        fiscal_year_end_month
    } else {
        CALENDAR_YEAR_END
    };
    let (year, quarter) = fiscal_quarter_of(as_of, year_end);
    let count = i64::from(count);

    let items: Vec<PeriodItem> = match unit {
        PeriodUnit::Year => {
            let current = i64::from(year);
            (current - count..current)
                .filter_map(|y| i32::try_from(y).ok())
                .map(PeriodItem::year)
                .collect()
        }
        PeriodUnit::Quarter => {
            let current = i64::from(year) * 4 + i64::from(quarter) - 1;
            (current - count..current)
                .filter_map(|i| {
                    let year = i32::try_from(i.div_euclid(4)).ok()?;
                    let quarter = u8::try_from(i.rem_euclid(4) + 1).ok()?;
                    Some(PeriodItem::quarter(year, quarter))
                })
                .collect()
        }
    };

    debug!(
        period_type = %descriptor.period_type,
        %as_of,
        year_end,
        resolved = items.len(),
        "Resolved period items"
    );
    Ok(items)
}

/// First and last day of a period.
///
/// With `fiscal_year_end_month` 12 this is the calendar period. Returns
/// `None` for dates chrono cannot represent.
///
/// # Errors
/// Returns [`QueryError::InvalidParameter`] if `fiscal_year_end_month` is not
/// a month number.
pub fn period_bounds(
    item: PeriodItem,
    fiscal_year_end_month: u32,
) -> Result<Option<(NaiveDate, NaiveDate)>> {
    check_month(fiscal_year_end_month)?;

    // The fiscal year labelled `item.year` ends in `fiscal_year_end_month` of that year.
    let Some(year_end) = NaiveDate::from_ymd_opt(item.year, fiscal_year_end_month, 1) else {
        return Ok(None);
    };
    let Some(year_start) = year_end.checked_sub_months(Months::new(11)) else {
        return Ok(None);
    };

    let (first_month, months) = match item.quarter {
        Some(q) => {
            let offset = 3 * u32::from(q.saturating_sub(1));
            (year_start.checked_add_months(Months::new(offset)), 3)
        }
        None => (Some(year_start), 12),
    };

    let bounds = first_month.and_then(|start| {
        let end = start
            .checked_add_months(Months::new(months))?
            .pred_opt()?;
        Some((start, end))
    });
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquery_core::{Granularity, RelativeWindow};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fiscal_quarter_of() {
        // September year end
        assert_eq!(fiscal_quarter_of(date(2023, 10, 1), 9), (2024, 1));
        assert_eq!(fiscal_quarter_of(date(2023, 9, 30), 9), (2023, 4));
        assert_eq!(fiscal_quarter_of(date(2024, 3, 15), 9), (2024, 2));
        // Calendar
        assert_eq!(fiscal_quarter_of(date(2024, 1, 1), 12), (2024, 1));
        assert_eq!(fiscal_quarter_of(date(2024, 12, 31), 12), (2024, 4));
    }

    #[test]
    fn test_absolute_items_unchanged() {
        let desc = PeriodDescriptor::absolute(
            PeriodType::Range,
            Granularity::CalendarYear,
            vec![PeriodItem::year(2020), PeriodItem::year(2021)],
        );
        let items = resolve_items(&desc, date(2024, 6, 1), 12).unwrap();
        assert_eq!(items, desc.items);
    }

    #[test]
    fn test_oversized_window_rejected() {
        let desc = PeriodDescriptor::relative(
            RelativeWindow {
                count: 4_000_000_000,
                unit: PeriodUnit::Quarter,
            },
            Granularity::CalendarQuarter,
            false,
        );
        assert!(matches!(
            resolve_items(&desc, date(2024, 6, 1), 12),
            Err(QueryError::InvalidParameter(_))
        ));

        let desc = PeriodDescriptor::relative(
            RelativeWindow {
                count: MAX_RELATIVE_COUNT,
                unit: PeriodUnit::Year,
            },
            Granularity::CalendarYear,
            false,
        );
        let items = resolve_items(&desc, date(2024, 6, 1), 12).unwrap();
        assert_eq!(items.len(), 100);
        assert_eq!(items.last(), Some(&PeriodItem::year(2023)));
    }

    #[test]
    fn test_relative_quarters() {
        let desc = PeriodDescriptor::relative(
            RelativeWindow {
                count: 3,
                unit: PeriodUnit::Quarter,
            },
            Granularity::CalendarQuarter,
            false,
        );
        let items = resolve_items(&desc, date(2024, 5, 10), 12).unwrap();
        assert_eq!(
            items,
            vec![
                PeriodItem::quarter(2023, 3),
                PeriodItem::quarter(2023, 4),
                PeriodItem::quarter(2024, 1),
            ]
        );
    }

    #[test]
    fn test_relative_fiscal_years() {
        let desc = PeriodDescriptor::relative(
            RelativeWindow {
                count: 2,
                unit: PeriodUnit::Year,
            },
            Granularity::FiscalYear,
            true,
        );
        // FY2024 (Oct 2023 - Sep 2024) is in progress, so FY2022 and FY2023 are the last two
        let items = resolve_items(&desc, date(2023, 11, 1), 9).unwrap();
        assert_eq!(items, vec![PeriodItem::year(2022), PeriodItem::year(2023)]);
    }

    #[test]
    fn test_latest_quarter() {
        let desc = PeriodDescriptor::latest(Granularity::CalendarQuarter, false);
        let items = resolve_items(&desc, date(2024, 1, 15), 9).unwrap();
        assert_eq!(items, vec![PeriodItem::quarter(2023, 4)]);
    }

    #[test]
    fn test_invalid_year_end_month() {
        let desc = PeriodDescriptor::latest(Granularity::CalendarYear, false);
        assert!(resolve_items(&desc, date(2024, 1, 15), 13).is_err());
        assert!(period_bounds(PeriodItem::year(2024), 0).is_err());
    }

    #[test]
    fn test_period_bounds() {
        assert_eq!(
            period_bounds(PeriodItem::year(2023), 12).unwrap(),
            Some((date(2023, 1, 1), date(2023, 12, 31)))
        );
        assert_eq!(
            period_bounds(PeriodItem::year(2024), 9).unwrap(),
            Some((date(2023, 10, 1), date(2024, 9, 30)))
        );
        assert_eq!(
            period_bounds(PeriodItem::quarter(2024, 1), 9).unwrap(),
            Some((date(2023, 10, 1), date(2023, 12, 31)))
        );
        assert_eq!(
            period_bounds(PeriodItem::quarter(2024, 2), 12).unwrap(),
            Some((date(2024, 4, 1), date(2024, 6, 30)))
        );
    }
}
