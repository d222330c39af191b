//! Field level decoders.
//!
//! Every function here fails soft: malformed input yields `None`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use num_traits::FromPrimitive;
use regex::Regex;

use crate::{FixFlag, LinkQuality};

const KNOTS_TO_KPH: f32 = 1.852;
const FEET_TO_METRES: f32 = 0.3048;

/// Parse a generic numeric field. Empty or unparsable fields are absent.
pub fn parse_num<T: FromStr>(value: &str) -> Option<T> {
    if value.is_empty() {
        return None;
    }
    value.parse().ok()
}

/// Parse an integer field.
pub fn parse_int(value: &str) -> Option<i32> {
    parse_num(value)
}

/// Parse a floating point field.
pub fn parse_float(value: &str) -> Option<f32> {
    parse_num(value)
}

/// Degrees are everything before the two digits preceding the decimal point.
fn parse_angle(value: &str) -> Option<f64> {
    lazy_static! {
        static ref RE: Regex =
            Regex::new(r"^(?<deg>\d+)(?<min>\d{2}\.\d*)$").expect("Failed to compile regex");
    }
    let caps = RE.captures(value)?;
    let deg = caps["deg"].parse::<f64>().ok()?;
    let min = caps["min"].parse::<f64>().ok()?;
    Some(deg + min / 60.0)
}

/// Parse a `DDMM.mmm` latitude, negated for the southern hemisphere.
pub fn parse_lat(value: &str, hemisphere: &str) -> Option<f64> {
    let value = value.trim_end_matches(&['N', 'S'][..]);
    let lat = parse_angle(value)?;
    Some(if hemisphere == "S" { -lat } else { lat })
}

/// Parse a `DDDMM.mmm` longitude, negated for the western hemisphere.
pub fn parse_lon(value: &str, hemisphere: &str) -> Option<f64> {
    let lon = parse_angle(value)?;
    Some(if hemisphere == "W" { -lon } else { lon })
}

/// Parse `hhmmss[.sss]`. Whatever follows position 7 is taken as milliseconds.
pub fn parse_time(time: &str) -> Option<NaiveTime> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^(?<hour>\d{2})(?<minute>\d{2})(?<second>\d{2})(\.\d*)?$")
            .expect("Failed to compile regex");
    }
    let caps = RE.captures(time)?;
    let millis = match time.get(7..) {
        Some(frac) if !frac.is_empty() => frac.parse::<u32>().ok()?,
        _ => 0,
    };
    if millis >= 1000 {
        return None;
    }
    NaiveTime::from_hms_milli_opt(
        caps["hour"].parse().ok()?,
        caps["minute"].parse().ok()?,
        caps["second"].parse().ok()?,
        millis,
    )
}

/// Combine a time field with a `ddmmyy` date field (years offset by 2000).
///
/// Sentences that carry only a time of day (GGA, GNS, GLL) pass an empty
/// date and get today's UTC date.
pub fn parse_date_time(time: &str, date: &str) -> Option<DateTime<Utc>> {
    let time = parse_time(time)?;
    let date = if date.is_empty() {
        Utc::now().date_naive()
    } else {
        if date.len() != 6 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let day = date[..2].parse().ok()?;
        let month = date[2..4].parse().ok()?;
        let year = date[4..6].parse::<i32>().ok()? + 2000;
        NaiveDate::from_ymd_opt(year, month, day)?
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Combine a time field with separate day, month and year fields.
///
/// All of day, month and year must be present and nonzero.
pub fn parse_date_time_parts(
    time: &str,
    day: &str,
    month: &str,
    year: &str,
) -> Option<DateTime<Utc>> {
    let time = parse_time(time)?;
    let day = parse_num::<u32>(day).unwrap_or_default();
    let month = parse_num::<u32>(month).unwrap_or_default();
    let year = parse_num::<i32>(year).unwrap_or_default();
    if day == 0 || month == 0 || year == 0 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Speed over ground, knots converted to km/h.
pub fn parse_speed(knots: &str) -> Option<f32> {
    parse_float(knots).map(|speed| speed * KNOTS_TO_KPH)
}

/// Bearing in degrees. Values outside `[0, 360]` are absent.
pub fn parse_bearing(value: &str) -> Option<f32> {
    parse_float(value).filter(|bearing| (0.0..=360.0).contains(bearing))
}

/// Magnetic declination in degrees, negated when west.
pub fn parse_declination(value: &str, hemisphere: &str) -> Option<f32> {
    let magvar = parse_float(value)?;
    Some(if hemisphere == "W" { -magvar } else { magvar })
}

/// Altitude in metres. Feet are converted, any other unit passes through.
pub fn parse_altitude(value: &str, unit: &str) -> Option<f32> {
    let altitude = parse_float(value)?;
    if unit.eq_ignore_ascii_case("f") {
        Some(altitude * FEET_TO_METRES)
    } else {
        Some(altitude)
    }
}

/// GGA quality indicator.
pub fn parse_link_quality(value: &str) -> Option<LinkQuality> {
    parse_int(value).and_then(LinkQuality::from_i32)
}

/// RMC status flag.
pub fn parse_fix(value: &str) -> FixFlag {
    FixFlag::from(value)
}
