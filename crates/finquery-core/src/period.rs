//! Period descriptors produced by the time-period grammar.
//!
//! This module defines [`PeriodType`] for the shape of a period expression,
//! [`Granularity`] for its unit and fiscal/calendar flavour, and
//! [`PeriodDescriptor`] which bundles both with the concrete [`PeriodItem`]s.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Warning;

/// Shape of the period expression found in a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// One year or one quarter.
    Single,
    /// An inclusive span of years.
    Range,
    /// Several quarters of one year, or several listed years.
    Multi,
    /// A window relative to now ("last 3 quarters").
    Relative,
    /// No usable period; the most recent data is implied.
    #[default]
    Latest,
}

impl PeriodType {
    /// Returns true if the period covers more than one point in time.
    #[must_use]
    pub const fn is_span(&self) -> bool {
        matches!(self, Self::Range | Self::Multi | Self::Relative)
    }

    /// Returns the wire name of this period type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Range => "range",
            Self::Multi => "multi",
            Self::Relative => "relative",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    /// Twelve months.
    Year,
    /// Three months.
    Quarter,
}

/// Unit and fiscal/calendar flavour of a period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// January to December year.
    #[default]
    CalendarYear,
    /// Company reporting year.
    FiscalYear,
    /// Calendar quarter (Jan-Mar, Apr-Jun, ...).
    CalendarQuarter,
    /// Company reporting quarter.
    FiscalQuarter,
}

impl Granularity {
    /// Builds a granularity from a unit and a fiscal flag.
    #[must_use]
    pub const fn new(unit: PeriodUnit, fiscal: bool) -> Self {
        match (unit, fiscal) {
            (PeriodUnit::Year, false) => Self::CalendarYear,
            (PeriodUnit::Year, true) => Self::FiscalYear,
            (PeriodUnit::Quarter, false) => Self::CalendarQuarter,
            (PeriodUnit::Quarter, true) => Self::FiscalQuarter,
        }
    }

    /// Returns true for the fiscal variants.
    #[must_use]
    pub const fn is_fiscal(&self) -> bool {
        matches!(self, Self::FiscalYear | Self::FiscalQuarter)
    }

    /// Returns the unit of this granularity.
    #[must_use]
    pub const fn unit(&self) -> PeriodUnit {
        match self {
            Self::CalendarYear | Self::FiscalYear => PeriodUnit::Year,
            Self::CalendarQuarter | Self::FiscalQuarter => PeriodUnit::Quarter,
        }
    }

    /// Returns the wire name of this granularity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CalendarYear => "calendar_year",
            Self::FiscalYear => "fiscal_year",
            Self::CalendarQuarter => "calendar_quarter",
            Self::FiscalQuarter => "fiscal_quarter",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete year or quarter.
///
/// Whether the year is fiscal or calendar is carried by the enclosing
/// descriptor's [`Granularity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodItem {
    /// Year label.
    pub year: i32,
    /// Quarter (1-4) when the granularity is quarterly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u8>,
}

impl PeriodItem {
    /// A whole year.
    #[must_use]
    pub const fn year(year: i32) -> Self {
        Self {
            year,
            quarter: None,
        }
    }

    /// A quarter of a year.
    #[must_use]
    pub const fn quarter(year: i32, quarter: u8) -> Self {
        Self {
            year,
            quarter: Some(quarter),
        }
    }
}

impl fmt::Display for PeriodItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter {
            Some(q) => write!(f, "Q{} {}", q, self.year),
            None => write!(f, "{}", self.year),
        }
    }
}

/// A window relative to the time of the query, e.g. "last 3 quarters".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativeWindow {
    /// Number of periods.
    pub count: u32,
    /// Period unit.
    pub unit: PeriodUnit,
}

/// Structured result of parsing the temporal part of a query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodDescriptor {
    /// Shape of the expression.
    #[serde(rename = "type")]
    pub period_type: PeriodType,
    /// Unit and fiscal/calendar flavour.
    pub granularity: Granularity,
    /// Whether downstream consumers should map the period onto fiscal calendars.
    pub normalize_to_fiscal: bool,
    /// Concrete periods in order; empty for `relative` and `latest`.
    pub items: Vec<PeriodItem>,
    /// Relative window for `relative` descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<RelativeWindow>,
    /// Ambiguities noticed while parsing, without duplicates.
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl PeriodDescriptor {
    /// Creates a `latest` descriptor.
    #[must_use]
    pub const fn latest(granularity: Granularity, normalize_to_fiscal: bool) -> Self {
        Self {
            period_type: PeriodType::Latest,
            granularity,
            normalize_to_fiscal,
            items: Vec::new(),
            relative: None,
            warnings: Vec::new(),
        }
    }

    /// Creates a descriptor over concrete items.
    #[must_use]
    pub fn absolute(period_type: PeriodType, granularity: Granularity, items: Vec<PeriodItem>) -> Self {
        Self {
            period_type,
            granularity,
            normalize_to_fiscal: granularity.is_fiscal(),
            items,
            relative: None,
            warnings: Vec::new(),
        }
    }

    /// Creates a `relative` descriptor.
    #[must_use]
    pub const fn relative(
        window: RelativeWindow,
        granularity: Granularity,
        normalize_to_fiscal: bool,
    ) -> Self {
        Self {
            period_type: PeriodType::Relative,
            granularity,
            normalize_to_fiscal,
            items: Vec::new(),
            relative: Some(window),
            warnings: Vec::new(),
        }
    }

    /// Adds a warning unless an identical one is already present.
    pub fn push_warning(&mut self, warning: Warning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Adds a warning and returns the descriptor.
    #[must_use]
    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.push_warning(warning);
        self
    }

    /// Returns true if this is the `latest` fallback.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.period_type == PeriodType::Latest
    }
}
