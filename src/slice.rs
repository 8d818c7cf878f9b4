//! Percentage slice expressions understood by corpus loaders.
//!
//! Grammar: `<split>[<start>%:<end>%]`, optionally concatenated with `+`.
//! Either bound may be omitted (`train[:40%]`, `train[60%:]`) and a bare split
//! name selects the whole split.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::constants::slices::{CONCAT_SEPARATOR, FULL_PERCENT};
use crate::errors::FoldError;
use crate::types::SplitName;

/// Half-open percentage window `[start%, end%)` over one split.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PercentRange {
    /// Split the window applies to.
    pub split: SplitName,
    /// Inclusive start percent.
    pub start: u32,
    /// Exclusive end percent.
    pub end: u32,
}

impl PercentRange {
    /// Build a range, rejecting boundaries above 100%.
    pub fn new(split: impl Into<SplitName>, start: u32, end: u32) -> Result<Self, FoldError> {
        let split = split.into();
        if split.trim().is_empty() {
            return Err(FoldError::InvalidArgument(
                "slice split name must not be empty".to_string(),
            ));
        }
        if start > FULL_PERCENT || end > FULL_PERCENT {
            return Err(FoldError::InvalidArgument(format!(
                "slice bounds must be within 0..=100 percent, got {split}[{start}%:{end}%]"
            )));
        }
        Ok(Self { split, start, end })
    }

    /// Resolve the window to row indices for a split holding `total` rows.
    ///
    /// Boundaries round to the closest row (ties to even); an inverted window is empty.
    pub fn row_bounds(&self, total: usize) -> Range<usize> {
        let from = percent_to_row(self.start, total);
        let to = percent_to_row(self.end, total);
        from..to.max(from)
    }

    /// Width of the window in percentage points.
    pub fn width(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

impl fmt::Display for PercentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}%:{}%]", self.split, self.start, self.end)
    }
}

/// Concatenation of percentage windows materialized as one dataset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SliceExpr {
    ranges: Vec<PercentRange>,
}

impl SliceExpr {
    /// Expression selecting a single window.
    pub fn single(range: PercentRange) -> Self {
        Self {
            ranges: vec![range],
        }
    }

    /// Expression concatenating `ranges` in order.
    pub fn concat(ranges: Vec<PercentRange>) -> Result<Self, FoldError> {
        if ranges.is_empty() {
            return Err(FoldError::InvalidArgument(
                "slice expression needs at least one range".to_string(),
            ));
        }
        Ok(Self { ranges })
    }

    /// Windows in concatenation order.
    pub fn ranges(&self) -> &[PercentRange] {
        &self.ranges
    }

    /// Total width in percentage points across all windows.
    pub fn percent_width(&self) -> u32 {
        self.ranges.iter().map(PercentRange::width).sum()
    }
}

impl fmt::Display for SliceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, range) in self.ranges.iter().enumerate() {
            if idx > 0 {
                write!(f, "{CONCAT_SEPARATOR}")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

impl FromStr for SliceExpr {
    type Err = FoldError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let ranges = raw
            .split(CONCAT_SEPARATOR)
            .map(parse_range)
            .collect::<Result<Vec<_>, _>>()?;
        SliceExpr::concat(ranges)
    }
}

fn parse_range(raw: &str) -> Result<PercentRange, FoldError> {
    let raw = raw.trim();
    let Some(open) = raw.find('[') else {
        return PercentRange::new(raw, 0, FULL_PERCENT);
    };
    let split = &raw[..open];
    let body = raw[open + 1..].strip_suffix(']').ok_or_else(|| {
        FoldError::InvalidArgument(format!("slice '{raw}' is missing a closing ']'"))
    })?;
    let (start, end) = body.split_once(':').ok_or_else(|| {
        FoldError::InvalidArgument(format!("slice '{raw}' must look like split[start%:end%]"))
    })?;
    let start = parse_bound(raw, start)?.unwrap_or(0);
    let end = parse_bound(raw, end)?.unwrap_or(FULL_PERCENT);
    PercentRange::new(split, start, end)
}

fn parse_bound(raw: &str, bound: &str) -> Result<Option<u32>, FoldError> {
    let bound = bound.trim();
    if bound.is_empty() {
        return Ok(None);
    }
    let digits = bound.strip_suffix('%').ok_or_else(|| {
        FoldError::InvalidArgument(format!(
            "slice '{raw}' bound '{bound}' must be a percentage like 40%"
        ))
    })?;
    digits.trim().parse::<u32>().map(Some).map_err(|_| {
        FoldError::InvalidArgument(format!(
            "slice '{raw}' bound '{bound}' is not a whole percentage"
        ))
    })
}

/// Closest-row rounding of `percent` of `total`, ties resolved to the even row.
fn percent_to_row(percent: u32, total: usize) -> usize {
    let scaled = u128::from(percent) * total as u128;
    let hundred = u128::from(FULL_PERCENT);
    let quotient = scaled / hundred;
    let remainder = scaled % hundred;
    let rounded = if remainder * 2 > hundred || (remainder * 2 == hundred && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    };
    (rounded as usize).min(total)
}
