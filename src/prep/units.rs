//! Precipitation unit conversion.
//!
//! Weather sources report precipitation as a daily rate (mm/day) averaged over
//! the month. Seasonal totals need millimetres per calendar month, so the rate
//! is scaled by the actual number of days in that month.

use chrono::NaiveDate;

use crate::error::PipelineError;

/// Number of days in `month` of `year` (leap years included).
pub fn days_in_month(year: i32, month: u32) -> Result<u32, PipelineError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| PipelineError::Data(format!("invalid month {month} for year {year}")))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| PipelineError::Data(format!("year {year} is outside the supported calendar")))?;
    Ok((next - first).num_days() as u32)
}

/// Convert a daily precipitation rate into the monthly total (mm).
pub fn monthly_rainfall(year: i32, month: u32, rate_mm_per_day: f64) -> Result<f64, PipelineError> {
    if !(1..=12).contains(&month) {
        return Err(PipelineError::Data(format!("month {month} is outside 1-12")));
    }
    if !rate_mm_per_day.is_finite() {
        return Err(PipelineError::Data(format!(
            "non-finite precipitation rate for {year}-{month:02}"
        )));
    }
    if rate_mm_per_day < 0.0 {
        return Err(PipelineError::Data(format!(
            "negative precipitation rate {rate_mm_per_day} for {year}-{month:02}"
        )));
    }
    Ok(rate_mm_per_day * days_in_month(year, month)? as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rainfall_scales_by_calendar_days() {
        let expected = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (i, days) in expected.iter().enumerate() {
            let month = i as u32 + 1;
            let total = monthly_rainfall(2021, month, 2.5).unwrap();
            assert!((total - 2.5 * *days as f64).abs() < 1e-12, "month {month}");
        }
    }

    #[test]
    fn leap_february_has_29_days() {
        assert_eq!(days_in_month(2020, 2).unwrap(), 29);
        assert_eq!(days_in_month(1900, 2).unwrap(), 28);
        assert_eq!(days_in_month(2000, 2).unwrap(), 29);
        assert!((monthly_rainfall(2024, 2, 1.0).unwrap() - 29.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_month_and_negative_rate() {
        assert!(matches!(monthly_rainfall(2021, 0, 1.0), Err(PipelineError::Data(_))));
        assert!(matches!(monthly_rainfall(2021, 13, 1.0), Err(PipelineError::Data(_))));
        assert!(matches!(monthly_rainfall(2021, 5, -0.1), Err(PipelineError::Data(_))));
        assert!(matches!(monthly_rainfall(2021, 5, f64::NAN), Err(PipelineError::Data(_))));
    }
}
