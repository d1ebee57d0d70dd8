//! Scalar functions for timestamp handling.
//!
//! Calendar convention (UTC throughout):
//! - `hour_of_day` 0..=23
//! - `day_of_year` 1..=366
//! - `week_of_year` ISO 8601 week number, 1..=53
//! - `month_of_year` 1..=12
//! - `calendar_year` proleptic Gregorian year
//! - `day_of_week` 1 = Sunday ... 7 = Saturday

use chrono::{DateTime, Datelike, Timelike, Utc};
use datafusion::arrow::array::{Array, Int32Array, Int64Array, TimestampMillisecondArray};
use datafusion::arrow::datatypes::{DataType, TimeUnit};
use datafusion::common::DataFusionError;
use datafusion::error::Result;
use datafusion::execution::context::SessionContext;
use datafusion::logical_expr::{ColumnarValue, ScalarUDF, Volatility, create_udf};
use std::sync::Arc;

pub const EPOCH_MILLIS_TO_TIMESTAMP: &str = "epoch_millis_to_timestamp";

/// A calendar field extracted from a `start_time` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPart {
    Hour,
    DayOfYear,
    WeekOfYear,
    Month,
    Year,
    Weekday,
}

impl CalendarPart {
    pub fn function_name(&self) -> &'static str {
        match self {
            CalendarPart::Hour => "hour_of_day",
            CalendarPart::DayOfYear => "day_of_year",
            CalendarPart::WeekOfYear => "week_of_year",
            CalendarPart::Month => "month_of_year",
            CalendarPart::Year => "calendar_year",
            CalendarPart::Weekday => "day_of_week",
        }
    }

    pub fn extract(&self, datetime: &DateTime<Utc>) -> i32 {
        match self {
            CalendarPart::Hour => datetime.hour() as i32,
            CalendarPart::DayOfYear => datetime.ordinal() as i32,
            CalendarPart::WeekOfYear => datetime.iso_week().week() as i32,
            CalendarPart::Month => datetime.month() as i32,
            CalendarPart::Year => datetime.year(),
            CalendarPart::Weekday => datetime.weekday().number_from_sunday() as i32,
        }
    }

    const ALL: [CalendarPart; 6] = [
        CalendarPart::Hour,
        CalendarPart::DayOfYear,
        CalendarPart::WeekOfYear,
        CalendarPart::Month,
        CalendarPart::Year,
        CalendarPart::Weekday,
    ];
}

/// Registers all UDFs with the SessionContext
pub fn register_udfs(ctx: &SessionContext) {
    ctx.register_udf(epoch_millis_to_timestamp_udf());
    for part in CalendarPart::ALL {
        ctx.register_udf(calendar_part_udf(part));
    }
}

/// `Int64` epoch milliseconds to `Timestamp(Millisecond, None)`.
pub fn epoch_millis_to_timestamp_udf() -> ScalarUDF {
    create_udf(
        EPOCH_MILLIS_TO_TIMESTAMP,
        vec![DataType::Int64],
        DataType::Timestamp(TimeUnit::Millisecond, None),
        Volatility::Immutable,
        Arc::new(convert_to_timestamp),
    )
}

/// `Timestamp(Millisecond, None)` to the `Int32` calendar field `part`.
pub fn calendar_part_udf(part: CalendarPart) -> ScalarUDF {
    create_udf(
        part.function_name(),
        vec![DataType::Timestamp(TimeUnit::Millisecond, None)],
        DataType::Int32,
        Volatility::Immutable,
        Arc::new(move |args: &[ColumnarValue]| extract_calendar_part(part, args)),
    )
}

/// Converts Unix timestamp (milliseconds) to Arrow Timestamp. Values chrono
/// cannot represent become null.
fn convert_to_timestamp(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let int_array = arrays[0]
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| DataFusionError::Internal("Expected int64 array".to_string()))?;

    let result: TimestampMillisecondArray = int_array
        .iter()
        .map(|opt_ts| {
            opt_ts.and_then(|ts| DateTime::from_timestamp_millis(ts).map(|dt| dt.timestamp_millis()))
        })
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}

fn extract_calendar_part(part: CalendarPart, args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let ts_array = arrays[0]
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .ok_or_else(|| {
            DataFusionError::Internal("Expected millisecond timestamp array".to_string())
        })?;

    let result: Int32Array = ts_array
        .iter()
        .map(|opt_ts| {
            opt_ts
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| part.extract(&dt))
        })
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn parts_of(ms: Option<i64>, part: CalendarPart) -> Option<i32> {
        let input = TimestampMillisecondArray::from(vec![ms]);
        let result = extract_calendar_part(part, &[ColumnarValue::Array(Arc::new(input))]).unwrap();

        match result {
            ColumnarValue::Array(array) => {
                let ints = array.as_any().downcast_ref::<Int32Array>().unwrap();
                if ints.is_null(0) { None } else { Some(ints.value(0)) }
            }
            ColumnarValue::Scalar(_) => panic!("Expected Array result"),
        }
    }

    #[test]
    fn test_convert_to_timestamp() {
        let input = Int64Array::from(vec![Some(1600000000000), None, Some(i64::MAX)]);

        let result = convert_to_timestamp(&[ColumnarValue::Array(Arc::new(input))]).unwrap();

        if let ColumnarValue::Array(array) = result {
            let ts_array = array
                .as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .unwrap();
            assert_eq!(ts_array.value(0), 1600000000000);
            assert!(ts_array.is_null(1));
            assert!(ts_array.is_null(2));
        } else {
            panic!("Expected Array result");
        }
    }

    #[test]
    fn test_calendar_parts_of_reference_instant() {
        // 2020-09-13T12:26:40Z, a Sunday in ISO week 37
        let ms = Some(1600000000000);

        assert_eq!(parts_of(ms, CalendarPart::Hour), Some(12));
        assert_eq!(parts_of(ms, CalendarPart::DayOfYear), Some(257));
        assert_eq!(parts_of(ms, CalendarPart::WeekOfYear), Some(37));
        assert_eq!(parts_of(ms, CalendarPart::Month), Some(9));
        assert_eq!(parts_of(ms, CalendarPart::Year), Some(2020));
        assert_eq!(parts_of(ms, CalendarPart::Weekday), Some(1));
        assert_eq!(parts_of(None, CalendarPart::Hour), None);
    }

    #[test]
    fn test_weekday_runs_sunday_to_saturday() {
        // 2018-11-03 is a Saturday, 2018-11-05 a Monday
        assert_eq!(CalendarPart::Weekday.extract(&at(1541203200000)), 7);
        assert_eq!(CalendarPart::Weekday.extract(&at(1541376000000)), 2);
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2021-01-01 belongs to ISO week 53 of 2020
        let new_year = at(1609459200000);

        assert_eq!(CalendarPart::WeekOfYear.extract(&new_year), 53);
        assert_eq!(CalendarPart::Year.extract(&new_year), 2021);
        assert_eq!(CalendarPart::DayOfYear.extract(&new_year), 1);
    }

    #[test]
    fn test_leap_day_of_year() {
        // 2020-12-31T23:00:00Z
        let last_hour = at(1609455600000);

        assert_eq!(CalendarPart::DayOfYear.extract(&last_hour), 366);
        assert_eq!(CalendarPart::Hour.extract(&last_hour), 23);
    }
}
