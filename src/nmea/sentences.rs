//! Decoders for the sentences registered by default.
//!
//! Each decoder builds a [`PositionUpdate`], emits the discrete signals
//! derived from it, and finishes with the aggregate update.

use std::sync::Arc;

use crate::{
    Dop, EstimatedError, FixFlag, NmeaError, NmeaSignal, Position, PositionUpdate, Satellite,
};

use super::{
    fields::{
        parse_altitude, parse_bearing, parse_date_time, parse_date_time_parts, parse_declination,
        parse_fix, parse_float, parse_lat, parse_link_quality, parse_lon, parse_num,
        parse_speed,
    },
    registry::{DecodeFn, SentenceFields},
};

type Decoded = Result<Vec<NmeaSignal>, NmeaError>;

pub(crate) fn defaults() -> Vec<(&'static str, &'static str, DecodeFn)> {
    vec![
        ("RMC", "Recommended minimum", Arc::new(decode_rmc) as DecodeFn),
        ("GGA", "Essential fix data", Arc::new(decode_gga)),
        ("GNS", "Fix data", Arc::new(decode_gns)),
        ("GLL", "Lat/Lon", Arc::new(decode_gll)),
        ("GSA", "DOP and active satellites", Arc::new(decode_gsa)),
        ("GSV", "Satellites in view", Arc::new(decode_gsv)),
        ("ZDA", "Date and time", Arc::new(decode_zda)),
        ("RMM", "Garmin currently active horizontal datum", Arc::new(decode_pgrmm)),
        ("RMZ", "Garmin altitude in feet", Arc::new(decode_pgrmz)),
        ("RME", "Garmin estimated error", Arc::new(decode_pgrme)),
        ("HDG", "Garmin compass output", Arc::new(decode_hdg)),
        ("HDT", "Heading from true north", Arc::new(decode_hdt)),
    ]
}

/// Parse a position from latitude/hemisphere/longitude/hemisphere fields.
fn parse_position(lat: &str, ns: &str, lon: &str, ew: &str) -> Option<Position> {
    if lat.is_empty() || ns.is_empty() || lon.is_empty() || ew.is_empty() {
        return None;
    }
    Some(Position::new(parse_lat(lat, ns)?, parse_lon(lon, ew)?))
}

/// Signals derived from the update, followed by the update itself.
fn emit(update: PositionUpdate, mut signals: Vec<NmeaSignal>) -> Vec<NmeaSignal> {
    let mut out = Vec::with_capacity(signals.len() + 8);
    if let Some(position) = update.position {
        out.push(NmeaSignal::Position(position));
    }
    if let Some(timestamp) = update.timestamp {
        out.push(NmeaSignal::DateTime(timestamp));
    }
    if let Some(speed) = update.speed {
        out.push(NmeaSignal::Speed(speed));
    }
    if let Some(bearing) = update.bearing {
        out.push(NmeaSignal::Bearing(bearing));
    }
    if let Some(declination) = update.declination {
        out.push(NmeaSignal::Declination(declination));
    }
    match update.fix {
        FixFlag::Obtained => out.push(NmeaSignal::FixObtained),
        FixFlag::Lost => out.push(NmeaSignal::FixLost),
        FixFlag::Unknown => {}
    }
    if let Some(altitude) = update.altitude {
        out.push(NmeaSignal::Altitude(altitude));
    }
    if let Some(quality) = update.link_quality {
        out.push(NmeaSignal::LinkQuality(quality));
    }
    if let Some(count) = update.satellites {
        out.push(NmeaSignal::SatellitesInView(count));
    }
    out.append(&mut signals);
    out.push(NmeaSignal::PositionUpdate(update));
    out
}

/// `$--RMC,hhmmss.ss,A,llll.ll,a,yyyyy.yy,a,x.x,x.x,ddmmyy,x.x,a*hh`
fn decode_rmc(f: &SentenceFields) -> Decoded {
    f.expect_len(12)?;
    let update = PositionUpdate {
        position: parse_position(f.get(3), f.get(4), f.get(5), f.get(6)),
        timestamp: parse_date_time(f.get(1), f.get(9)),
        speed: parse_speed(f.get(7)),
        bearing: parse_bearing(f.get(8)),
        fix: parse_fix(f.get(2)),
        declination: parse_declination(f.get(10), f.get(11)),
        ..PositionUpdate::new("RMC")
    };
    Ok(emit(update, vec![]))
}

/// `$--GGA,hhmmss.ss,llll.ll,a,yyyyy.yy,a,q,xx,x.x,x.x,M,x.x,M,x.x,xxxx*hh`
fn decode_gga(f: &SentenceFields) -> Decoded {
    f.expect_len(11)?;
    let update = PositionUpdate {
        timestamp: parse_date_time(f.get(1), ""),
        position: parse_position(f.get(2), f.get(3), f.get(4), f.get(5)),
        link_quality: parse_link_quality(f.get(6)),
        satellites: parse_num(f.get(7)),
        hdop: parse_float(f.get(8)),
        altitude: parse_altitude(f.get(9), f.get(10)),
        ..PositionUpdate::new("GGA")
    };
    Ok(emit(update, vec![]))
}

/// `$--GNS,hhmmss.ss,llll.ll,a,yyyyy.yy,a,c--c,xx,x.x,x.x,x.x,x.x,x.x*hh`
fn decode_gns(f: &SentenceFields) -> Decoded {
    f.expect_len(10)?;
    let update = PositionUpdate {
        timestamp: parse_date_time(f.get(1), ""),
        position: parse_position(f.get(2), f.get(3), f.get(4), f.get(5)),
        satellites: parse_num(f.get(7)),
        hdop: parse_float(f.get(8)),
        altitude: parse_altitude(f.get(9), "M"),
        ..PositionUpdate::new("GNS")
    };
    Ok(emit(update, vec![]))
}

/// `$--GLL,llll.ll,a,yyyyy.yy,a,hhmmss.ss,A*hh`
fn decode_gll(f: &SentenceFields) -> Decoded {
    f.expect_len(6)?;
    let update = PositionUpdate {
        position: parse_position(f.get(1), f.get(2), f.get(3), f.get(4)),
        timestamp: parse_date_time(f.get(5), ""),
        ..PositionUpdate::new("GLL")
    };
    Ok(emit(update, vec![]))
}

/// `$--GSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39`
fn decode_gsa(f: &SentenceFields) -> Decoded {
    f.expect_len(18)?;
    let mut signals = Vec::new();
    if let Some(fix_type) = parse_num::<u8>(f.get(2)) {
        signals.push(NmeaSignal::FixType(fix_type));
    }
    let mut update = PositionUpdate::new("GSA");
    if let (Some(pdop), Some(hdop), Some(vdop)) = (
        parse_float(f.get(15)),
        parse_float(f.get(16)),
        parse_float(f.get(17)),
    ) {
        signals.push(NmeaSignal::Precision(Dop { pdop, hdop, vdop }));
        update.pdop = Some(pdop);
        update.hdop = Some(hdop);
        update.vdop = Some(vdop);
    }
    Ok(emit(update, signals))
}

/// `$--GSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*75`
///
/// Up to four satellite blocks of prn, elevation, azimuth and SNR. A block
/// is reported only when all four are present.
fn decode_gsv(f: &SentenceFields) -> Decoded {
    f.expect_len(4)?;
    let update = PositionUpdate {
        satellites: parse_num(f.get(3)),
        ..PositionUpdate::new("GSV")
    };
    let signals = (1..=4)
        .map(|block| block * 4)
        .filter(|&index| index + 3 < f.len())
        .filter_map(|index| {
            Some(Satellite {
                prn: parse_num(f.get(index))?,
                elevation_deg: parse_num(f.get(index + 1))?,
                azimuth_deg: parse_num(f.get(index + 2))?,
                snr_db: parse_num(f.get(index + 3))?,
            })
        })
        .map(NmeaSignal::Satellite)
        .collect();
    Ok(emit(update, signals))
}

/// `$--ZDA,hhmmss.ss,dd,mm,yyyy,xx,yy*CC`
fn decode_zda(f: &SentenceFields) -> Decoded {
    f.expect_len(7)?;
    f.require(&[1, 2, 3, 4, 5, 6])?;
    let timestamp = parse_date_time_parts(f.get(1), f.get(2), f.get(3), f.get(4))
        .ok_or_else(|| NmeaError::MalformedField {
            sentence: f.id().to_string(),
            field: 1,
        })?;
    let update = PositionUpdate {
        timestamp: Some(timestamp),
        ..PositionUpdate::new("ZDA")
    };
    Ok(emit(update, vec![]))
}

/// `$PGRMM,NAD27 Canada*2F`
fn decode_pgrmm(f: &SentenceFields) -> Decoded {
    f.expect_len(2)?;
    let mut signals = Vec::new();
    if !f.get(1).is_empty() {
        signals.push(NmeaSignal::MapDatum(f.get(1).to_string()));
    }
    Ok(emit(PositionUpdate::new("RMM"), signals))
}

/// `$PGRMZ,93,f,3*21`: altitude, always reported in feet by the device
fn decode_pgrmz(f: &SentenceFields) -> Decoded {
    f.expect_len(3)?;
    let update = PositionUpdate {
        altitude: parse_altitude(f.get(1), f.get(2)),
        ..PositionUpdate::new("RMZ")
    };
    Ok(emit(update, vec![]))
}

/// `$PGRME,15.0,M,45.0,M,25.0,M*1C`
fn decode_pgrme(f: &SentenceFields) -> Decoded {
    f.expect_len(7)?;
    let error = EstimatedError {
        horizontal: parse_altitude(f.get(1), f.get(2)),
        vertical: parse_altitude(f.get(3), f.get(4)),
        spherical: parse_altitude(f.get(5), f.get(6)),
    };
    Ok(emit(
        PositionUpdate::new("RME"),
        vec![NmeaSignal::EstimatedError(error)],
    ))
}

/// `$HCHDG,101.1,,,7.1,W*3C`: magnetic heading, deviation, variation
fn decode_hdg(f: &SentenceFields) -> Decoded {
    f.expect_len(6)?;
    let mut signals = Vec::new();
    if let Some(heading) = parse_bearing(f.get(1)) {
        signals.push(NmeaSignal::Heading(heading));
    }
    let update = PositionUpdate {
        declination: parse_declination(f.get(4), f.get(5)),
        ..PositionUpdate::new("HDG")
    };
    Ok(emit(update, signals))
}

/// `$GPHDT,123.456,T*32`
fn decode_hdt(f: &SentenceFields) -> Decoded {
    f.expect_len(2)?;
    let signals = match parse_bearing(f.get(1)) {
        Some(heading) => vec![NmeaSignal::Heading(heading)],
        None => vec![],
    };
    Ok(emit(PositionUpdate::new("HDT"), signals))
}
