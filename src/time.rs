//! Temporal codecs
//!
//! Each temporal type has one fixed numeric decomposition:
//!
//! | Type | Payload |
//! |---|---|
//! | `Duration` | u64 seconds, u32 nanos |
//! | `SystemTime` | i64 epoch seconds, u32 nanos |
//! | [`Period`] | i32 years, i32 months, i32 days |
//! | [`Year`] | i32 |
//! | [`MonthDay`] | u8 month, u8 day |
//! | `NaiveDate` | i64 epoch day |
//! | `NaiveTime` | i64 nanos of day |
//! | `NaiveDateTime` | i64 epoch day, i64 nanos of day |
//! | `DateTime<Utc>` | i64 epoch seconds, u32 nanos |
//!
//! The chrono types require the `chrono` feature.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::codec::{Codec, Externalize, Shape};
use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Corruption, Result};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Amount of time in calendar units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Period {
    /// Years
    pub years: i32,
    /// Months
    pub months: i32,
    /// Days
    pub days: i32,
}

impl Period {
    /// Create a period
    pub const fn new(years: i32, months: i32, days: i32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }
}

/// Proleptic calendar year
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Year(pub i32);

/// Month and day of month, without a year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthDay {
    month: u8,
    day: u8,
}

impl MonthDay {
    /// Create a month-day; `None` when the day does not exist in any year
    pub const fn new(month: u8, day: u8) -> Option<Self> {
        let max_day = match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 => 29,
            _ => return None,
        };
        if day == 0 || day > max_day {
            return None;
        }
        Some(Self { month, day })
    }

    /// Month, 1 to 12
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Day of month, 1 to 31
    pub const fn day(&self) -> u8 {
        self.day
    }
}

#[inline]
fn get_nanos(source: &mut dyn Source) -> Result<u32> {
    let nanos = source.get_u32()?;
    if nanos >= NANOS_PER_SEC {
        return Err(Corruption::InvalidTemporal.into());
    }
    Ok(nanos)
}

/// Split an instant into epoch seconds (floored) and non-negative nanos
fn instant_parts(time: &SystemTime) -> (i64, u32) {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (after.as_secs() as i64, after.subsec_nanos()),
        Err(err) => {
            let before = err.duration();
            let secs = -(before.as_secs() as i64);
            match before.subsec_nanos() {
                0 => (secs, 0),
                nanos => (secs - 1, NANOS_PER_SEC - nanos),
            }
        }
    }
}

fn instant_from_parts(secs: i64, nanos: u32) -> Option<SystemTime> {
    let whole = if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_secs(secs as u64))?
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))?
    };
    whole.checked_add(Duration::from_nanos(u64::from(nanos)))
}

struct DurationCodec;
struct InstantCodec;
struct PeriodCodec;
struct YearCodec;
struct MonthDayCodec;

impl Codec<Duration> for DurationCodec {
    fn encode(&self, value: &Duration, sink: &mut dyn Sink) -> Result<()> {
        sink.put_u64(value.as_secs())?;
        sink.put_u32(value.subsec_nanos())
    }

    fn decode(&self, source: &mut dyn Source) -> Result<Duration> {
        let secs = source.get_u64()?;
        let nanos = get_nanos(source)?;
        Ok(Duration::new(secs, nanos))
    }
}

impl Codec<SystemTime> for InstantCodec {
    fn encode(&self, value: &SystemTime, sink: &mut dyn Sink) -> Result<()> {
        let (secs, nanos) = instant_parts(value);
        sink.put_i64(secs)?;
        sink.put_u32(nanos)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<SystemTime> {
        let secs = source.get_i64()?;
        let nanos = get_nanos(source)?;
        instant_from_parts(secs, nanos).ok_or_else(|| Corruption::InvalidTemporal.into())
    }
}

impl Codec<Period> for PeriodCodec {
    fn encode(&self, value: &Period, sink: &mut dyn Sink) -> Result<()> {
        sink.put_i32(value.years)?;
        sink.put_i32(value.months)?;
        sink.put_i32(value.days)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<Period> {
        Ok(Period::new(
            source.get_i32()?,
            source.get_i32()?,
            source.get_i32()?,
        ))
    }
}

impl Codec<Year> for YearCodec {
    fn encode(&self, value: &Year, sink: &mut dyn Sink) -> Result<()> {
        sink.put_i32(value.0)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<Year> {
        source.get_i32().map(Year)
    }
}

impl Codec<MonthDay> for MonthDayCodec {
    fn encode(&self, value: &MonthDay, sink: &mut dyn Sink) -> Result<()> {
        sink.put_u8(value.month)?;
        sink.put_u8(value.day)
    }

    fn decode(&self, source: &mut dyn Source) -> Result<MonthDay> {
        let month = source.get_u8()?;
        let day = source.get_u8()?;
        MonthDay::new(month, day).ok_or_else(|| Corruption::InvalidTemporal.into())
    }
}

macro_rules! temporal {
    ($($ty:ty => $codec:ident;)*) => {$(
        impl Externalize for $ty {
            fn shape() -> Shape<Self> {
                static CODEC: $codec = $codec;
                Shape::Temporal(&CODEC)
            }
        }
    )*};
}

temporal! {
    Duration => DurationCodec;
    SystemTime => InstantCodec;
    Period => PeriodCodec;
    Year => YearCodec;
    MonthDay => MonthDayCodec;
}

#[cfg(feature = "chrono")]
mod calendar {
    use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

    use super::{get_nanos, Codec, Corruption, Externalize, Result, Shape, Sink, Source};

    const NANOS_PER_SEC: i64 = 1_000_000_000;

    /// Days from 0001-01-01 to 1970-01-01
    const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

    fn epoch_day(date: &NaiveDate) -> i64 {
        i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE
    }

    fn date_from_epoch_day(day: i64) -> Option<NaiveDate> {
        let days_from_ce = i32::try_from(day.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?).ok()?;
        NaiveDate::from_num_days_from_ce_opt(days_from_ce)
    }

    fn nano_of_day(time: &NaiveTime) -> i64 {
        i64::from(time.num_seconds_from_midnight()) * NANOS_PER_SEC + i64::from(time.nanosecond())
    }

    fn time_from_nano_of_day(nanos: i64) -> Option<NaiveTime> {
        if nanos < 0 {
            return None;
        }
        let secs = u32::try_from(nanos / NANOS_PER_SEC).ok()?;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, (nanos % NANOS_PER_SEC) as u32)
    }

    fn invalid<T>(value: Option<T>) -> Result<T> {
        value.ok_or_else(|| Corruption::InvalidTemporal.into())
    }

    struct DateCodec;
    struct TimeCodec;
    struct DateTimeCodec;
    struct UtcCodec;

    impl Codec<NaiveDate> for DateCodec {
        fn encode(&self, value: &NaiveDate, sink: &mut dyn Sink) -> Result<()> {
            sink.put_i64(epoch_day(value))
        }

        fn decode(&self, source: &mut dyn Source) -> Result<NaiveDate> {
            invalid(date_from_epoch_day(source.get_i64()?))
        }
    }

    impl Codec<NaiveTime> for TimeCodec {
        fn encode(&self, value: &NaiveTime, sink: &mut dyn Sink) -> Result<()> {
            sink.put_i64(nano_of_day(value))
        }

        fn decode(&self, source: &mut dyn Source) -> Result<NaiveTime> {
            invalid(time_from_nano_of_day(source.get_i64()?))
        }
    }

    impl Codec<NaiveDateTime> for DateTimeCodec {
        fn encode(&self, value: &NaiveDateTime, sink: &mut dyn Sink) -> Result<()> {
            sink.put_i64(epoch_day(&value.date()))?;
            sink.put_i64(nano_of_day(&value.time()))
        }

        fn decode(&self, source: &mut dyn Source) -> Result<NaiveDateTime> {
            let date = invalid(date_from_epoch_day(source.get_i64()?))?;
            let time = invalid(time_from_nano_of_day(source.get_i64()?))?;
            Ok(NaiveDateTime::new(date, time))
        }
    }

    impl Codec<DateTime<Utc>> for UtcCodec {
        fn encode(&self, value: &DateTime<Utc>, sink: &mut dyn Sink) -> Result<()> {
            sink.put_i64(value.timestamp())?;
            sink.put_u32(value.timestamp_subsec_nanos())
        }

        fn decode(&self, source: &mut dyn Source) -> Result<DateTime<Utc>> {
            let secs = source.get_i64()?;
            let nanos = get_nanos(source)?;
            invalid(DateTime::from_timestamp(secs, nanos))
        }
    }

    temporal! {
        NaiveDate => DateCodec;
        NaiveTime => TimeCodec;
        NaiveDateTime => DateTimeCodec;
        DateTime<Utc> => UtcCodec;
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ByteCursor;
    use crate::error::Error;

    fn roundtrip<T: Externalize + PartialEq + std::fmt::Debug>(value: T, len: usize) {
        let Shape::Temporal(codec) = T::shape() else {
            unreachable!()
        };
        let mut buf: Vec<u8> = Vec::new();
        codec.encode(&value, &mut buf).unwrap();
        assert_eq!(buf.len(), len);
        assert_eq!(codec.decode(&mut ByteCursor::new(&buf)).unwrap(), value);
    }

    #[test]
    fn test_fixed_layouts() {
        roundtrip(Duration::new(90, 500), 12);
        roundtrip(Period::new(1, -2, 30), 12);
        roundtrip(Year(-44), 4);
        roundtrip(MonthDay::new(2, 29).unwrap(), 2);
    }

    #[test]
    fn test_instant_before_epoch() {
        let before = UNIX_EPOCH - Duration::new(1, 250_000_000);
        assert_eq!(instant_parts(&before), (-2, 750_000_000));
        roundtrip(before, 12);
        roundtrip(UNIX_EPOCH + Duration::new(1_700_000_000, 42), 12);
        roundtrip(UNIX_EPOCH - Duration::from_secs(10), 12);
    }

    #[test]
    fn test_month_day_validation() {
        assert!(MonthDay::new(4, 31).is_none());
        assert!(MonthDay::new(13, 1).is_none());
        assert!(MonthDay::new(1, 0).is_none());

        let Shape::Temporal(codec) = MonthDay::shape() else {
            unreachable!()
        };
        assert!(matches!(
            codec.decode(&mut ByteCursor::new(&[2, 30])),
            Err(Error::StreamCorruption(Corruption::InvalidTemporal))
        ));
    }

    #[test]
    fn test_nanos_out_of_range() {
        let mut buf: Vec<u8> = Vec::new();
        buf.put_u64(1).unwrap();
        buf.put_u32(NANOS_PER_SEC).unwrap();
        let Shape::Temporal(codec) = Duration::shape() else {
            unreachable!()
        };
        assert!(codec.decode(&mut ByteCursor::new(&buf)).is_err());
    }
}
