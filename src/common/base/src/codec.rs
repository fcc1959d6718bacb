use bytes::{Buf, BufMut};

use crate::record::{
    AttitudeRecord, AttitudeSample, CommentRecord, FileHeaderRecord, HistoryRecord,
    NavigationErrorRecord, ParameterRecord, PingRecord, Record, RecordTime, RecordType,
    ScaleFactor, SoundSpeedPoint, SummaryRecord, VelocityProfileRecord,
};

/// Bytes of framing before each payload: type code and payload length.
pub const RECORD_HEADER_SIZE: usize = 8;

/// encode_record frames a record for a log file: type code, payload
/// length, payload, all big-endian.
pub fn encode_record(record: &Record) -> Vec<u8> {
    let payload = encode_payload(record);
    let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
    buf.put_u32(record.record_type().code());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    buf
}

fn encode_payload(record: &Record) -> Vec<u8> {
    let mut buf = Vec::new();
    match record {
        Record::FileHeader(r) => {
            put_string(&mut buf, &r.version);
        }
        Record::Ping(r) => {
            put_time(&mut buf, &r.time);
            buf.put_f64(r.latitude);
            buf.put_f64(r.longitude);
            buf.put_f64(r.heading);
            buf.put_u32(r.scale_factors.len() as u32);
            for sf in &r.scale_factors {
                buf.put_u32(sf.subrecord_id);
                buf.put_f64(sf.multiplier);
                buf.put_f64(sf.offset);
            }
            buf.put_u32(r.depths.len() as u32);
            for depth in &r.depths {
                buf.put_f64(*depth);
            }
        }
        Record::VelocityProfile(r) => {
            put_time(&mut buf, &r.observation_time);
            put_time(&mut buf, &r.application_time);
            buf.put_u32(r.points.len() as u32);
            for point in &r.points {
                buf.put_f64(point.depth);
                buf.put_f64(point.sound_speed);
            }
        }
        Record::Parameters(r) => {
            put_time(&mut buf, &r.time);
            buf.put_u32(r.entries.len() as u32);
            for entry in &r.entries {
                put_string(&mut buf, entry);
            }
        }
        Record::Comment(r) => {
            put_time(&mut buf, &r.time);
            put_string(&mut buf, &r.text);
        }
        Record::History(r) => {
            put_time(&mut buf, &r.time);
            put_string(&mut buf, &r.host);
            put_string(&mut buf, &r.operator);
            put_string(&mut buf, &r.comment);
        }
        Record::NavigationError(r) => {
            put_time(&mut buf, &r.time);
            buf.put_i32(r.record_id);
            buf.put_f64(r.latitude_error);
            buf.put_f64(r.longitude_error);
        }
        Record::Summary(r) => {
            put_time(&mut buf, &r.start_time);
            put_time(&mut buf, &r.end_time);
            buf.put_f64(r.min_latitude);
            buf.put_f64(r.max_latitude);
            buf.put_f64(r.min_longitude);
            buf.put_f64(r.max_longitude);
            buf.put_f64(r.min_depth);
            buf.put_f64(r.max_depth);
        }
        Record::Attitude(r) => {
            put_time(&mut buf, &r.base_time);
            buf.put_u32(r.samples.len() as u32);
            for sample in &r.samples {
                buf.put_u32(sample.offset_ms);
                buf.put_f64(sample.pitch);
                buf.put_f64(sample.roll);
                buf.put_f64(sample.heave);
            }
        }
    }
    buf
}

/// decode_record rebuilds a record from its framed type code and payload.
pub fn decode_record(code: u32, payload: &[u8]) -> anyhow::Result<Record> {
    let typ = match RecordType::from_code(code) {
        Some(typ) => typ,
        None => return Err(anyhow!("unknown record type code: {}", code)),
    };

    let mut buf = payload;
    let record = match typ {
        RecordType::ScaleFactors => {
            return Err(anyhow!(
                "record type code {} is an index slot, not a wire record",
                code
            ));
        }
        RecordType::FileHeader => Record::FileHeader(FileHeaderRecord {
            version: get_string(&mut buf)?,
        }),
        RecordType::Ping => {
            let time = get_time(&mut buf)?;
            let latitude = get_f64(&mut buf)?;
            let longitude = get_f64(&mut buf)?;
            let heading = get_f64(&mut buf)?;

            let n = get_u32(&mut buf)? as usize;
            let mut scale_factors = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                scale_factors.push(ScaleFactor {
                    subrecord_id: get_u32(&mut buf)?,
                    multiplier: get_f64(&mut buf)?,
                    offset: get_f64(&mut buf)?,
                });
            }

            let n = get_u32(&mut buf)? as usize;
            let mut depths = Vec::with_capacity(n.min(4096));
            for _ in 0..n {
                depths.push(get_f64(&mut buf)?);
            }

            Record::Ping(PingRecord {
                time,
                latitude,
                longitude,
                heading,
                scale_factors,
                depths,
            })
        }
        RecordType::VelocityProfile => {
            let observation_time = get_time(&mut buf)?;
            let application_time = get_time(&mut buf)?;
            let n = get_u32(&mut buf)? as usize;
            let mut points = Vec::with_capacity(n.min(4096));
            for _ in 0..n {
                points.push(SoundSpeedPoint {
                    depth: get_f64(&mut buf)?,
                    sound_speed: get_f64(&mut buf)?,
                });
            }
            Record::VelocityProfile(VelocityProfileRecord {
                observation_time,
                application_time,
                points,
            })
        }
        RecordType::Parameters => {
            let time = get_time(&mut buf)?;
            let n = get_u32(&mut buf)? as usize;
            let mut entries = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                entries.push(get_string(&mut buf)?);
            }
            Record::Parameters(ParameterRecord { time, entries })
        }
        RecordType::Comment => Record::Comment(CommentRecord {
            time: get_time(&mut buf)?,
            text: get_string(&mut buf)?,
        }),
        RecordType::History => Record::History(HistoryRecord {
            time: get_time(&mut buf)?,
            host: get_string(&mut buf)?,
            operator: get_string(&mut buf)?,
            comment: get_string(&mut buf)?,
        }),
        RecordType::NavigationError => Record::NavigationError(NavigationErrorRecord {
            time: get_time(&mut buf)?,
            record_id: get_i32(&mut buf)?,
            latitude_error: get_f64(&mut buf)?,
            longitude_error: get_f64(&mut buf)?,
        }),
        RecordType::Summary => Record::Summary(SummaryRecord {
            start_time: get_time(&mut buf)?,
            end_time: get_time(&mut buf)?,
            min_latitude: get_f64(&mut buf)?,
            max_latitude: get_f64(&mut buf)?,
            min_longitude: get_f64(&mut buf)?,
            max_longitude: get_f64(&mut buf)?,
            min_depth: get_f64(&mut buf)?,
            max_depth: get_f64(&mut buf)?,
        }),
        RecordType::Attitude => {
            let base_time = get_time(&mut buf)?;
            let n = get_u32(&mut buf)? as usize;
            let mut samples = Vec::with_capacity(n.min(4096));
            for _ in 0..n {
                samples.push(AttitudeSample {
                    offset_ms: get_u32(&mut buf)?,
                    pitch: get_f64(&mut buf)?,
                    roll: get_f64(&mut buf)?,
                    heave: get_f64(&mut buf)?,
                });
            }
            Record::Attitude(AttitudeRecord { base_time, samples })
        }
    };

    Ok(record)
}

fn put_time(buf: &mut Vec<u8>, time: &RecordTime) {
    buf.put_i64(time.seconds);
    buf.put_i32(time.nanoseconds);
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn need(buf: &[u8], n: usize) -> anyhow::Result<()> {
    if buf.remaining() < n {
        return Err(anyhow!(
            "record payload truncated: need {} bytes, have {}",
            n,
            buf.remaining()
        ));
    }
    Ok(())
}

fn get_time(buf: &mut &[u8]) -> anyhow::Result<RecordTime> {
    need(buf, 12)?;
    Ok(RecordTime::new(buf.get_i64(), buf.get_i32()))
}

fn get_u32(buf: &mut &[u8]) -> anyhow::Result<u32> {
    need(buf, 4)?;
    Ok(buf.get_u32())
}

fn get_i32(buf: &mut &[u8]) -> anyhow::Result<i32> {
    need(buf, 4)?;
    Ok(buf.get_i32())
}

fn get_f64(buf: &mut &[u8]) -> anyhow::Result<f64> {
    need(buf, 8)?;
    Ok(buf.get_f64())
}

fn get_string(buf: &mut &[u8]) -> anyhow::Result<String> {
    let len = get_u32(buf)? as usize;
    need(buf, len)?;
    let s = String::from_utf8(buf[..len].to_vec())
        .map_err(|e| anyhow!("invalid string in record: {}", e))?;
    buf.advance(len);
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let records = vec![
            Record::FileHeader(FileHeaderRecord {
                version: "SWL-v01.00".to_string(),
            }),
            Record::Ping(PingRecord {
                time: RecordTime::new(1400, 250_000_000),
                latitude: 43.25,
                longitude: -70.5,
                heading: 181.5,
                scale_factors: vec![ScaleFactor {
                    subrecord_id: 1,
                    multiplier: 100.0,
                    offset: 0.0,
                }],
                depths: vec![11.5, 11.75, 12.0],
            }),
            Record::Summary(SummaryRecord {
                start_time: RecordTime::new(1400, 0),
                end_time: RecordTime::new(1500, 900),
                min_latitude: 43.0,
                max_latitude: 44.0,
                min_longitude: -71.0,
                max_longitude: -70.0,
                min_depth: 9.0,
                max_depth: 15.0,
            }),
        ];

        for record in records {
            let framed = encode_record(&record);
            let code = u32::from_be_bytes(framed[..4].try_into().unwrap());
            let len = u32::from_be_bytes(framed[4..8].try_into().unwrap()) as usize;
            assert_eq!(framed.len(), RECORD_HEADER_SIZE + len);

            let decoded = decode_record(code, &framed[8..]).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn test_decode_truncated_payload() {
        let record = Record::Comment(CommentRecord {
            time: RecordTime::new(100, 0),
            text: "launch point".to_string(),
        });
        let framed = encode_record(&record);

        let err = decode_record(RecordType::Comment.code(), &framed[8..framed.len() - 4]);
        assert!(err.is_err());
    }

    #[test]
    fn test_decode_unknown_type() {
        assert!(decode_record(99, &[]).is_err());
        // Slot 0 is index-only and must never decode from the wire.
        assert!(decode_record(0, &[]).is_err());
    }
}
