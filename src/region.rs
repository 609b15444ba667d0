use rmpv::{Value, decode::read_value};
use std::io::Cursor;

use crate::{CzError, bytes::strip_non_printable, meta::GeoMap};

fn decode_err(err: rmpv::decode::Error) -> CzError {
    CzError::RecordDecode(err.to_string())
}

fn string_value(value: Value, what: &str) -> Result<String, CzError> {
    match value {
        Value::String(s) => Ok(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        Value::Nil => Ok(String::new()),
        other => Err(CzError::RecordDecode(format!("expected {what} string, found {other}"))),
    }
}

/// Decode a region payload into a string, applying geo mapping if needed.
///
/// The payload holds a packed `(length << 24) | pointer` into the geo section, or zero, followed
/// by a fallback string. Selected geo columns are emitted first, each followed by a tab, with
/// empty columns rendered as `null`; the fallback string comes last. Characters outside
/// printable ASCII are removed from every part after the empty check.
///
/// 解析区域数据为字符串，必要时应用地理映射。
pub fn decode_region(region_bytes: &[u8], geo: &GeoMap) -> Result<String, CzError> {
    let mut cursor = Cursor::new(region_bytes);
    let geo_pos_mix_size = match read_value(&mut cursor).map_err(decode_err)? {
        Value::Integer(i) => i
            .as_u64()
            .ok_or_else(|| CzError::RecordDecode(format!("negative geo position {i}")))?,
        other => {
            return Err(CzError::RecordDecode(format!(
                "expected geo position integer, found {other}"
            )));
        }
    };
    let other_data = strip_non_printable(&string_value(
        read_value(&mut cursor).map_err(decode_err)?,
        "fallback",
    )?);
    if geo_pos_mix_size == 0 {
        return Ok(other_data);
    }

    let data_len = ((geo_pos_mix_size >> 24) & 0xff) as usize;
    let data_ptr = (geo_pos_mix_size & 0x00ff_ffff) as usize;
    let Some(region_data) = geo.data.get(data_ptr..data_ptr + data_len) else {
        return Ok(other_data);
    };

    let Value::Array(values) = read_value(&mut Cursor::new(region_data)).map_err(decode_err)?
    else {
        return Err(CzError::RecordDecode("geo columns are not an array".into()));
    };
    let mut region = String::new();
    for (index, v) in values.iter().enumerate() {
        if !geo.column_selected(index) {
            continue;
        }
        match v.as_str().unwrap_or("") {
            "" => region.push_str("null"),
            value => region.push_str(&strip_non_printable(value)),
        }
        region.push('\t');
    }
    region.push_str(&other_data);
    Ok(region)
}
