// Chart format detection and decoding entry points

mod official;
mod pec;
mod rpe;

use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::chart::{Chart, ChartFormat, Viewport};
use crate::error::ChartError;

pub use official::OfficialDecoder;
pub use pec::PecDecoder;
pub use rpe::RpeDecoder;

/// Knobs that change how authored data is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Added to RPE `easingType` before the easing table lookup.
    pub easing_shift: i32,
}

impl ChartFormat {
    /// Detect the format from raw chart text.
    pub fn detect(text: &str) -> Result<Self, ChartError> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::detect_value(&value),
            Err(_) => Ok(ChartFormat::Pec),
        }
    }

    /// Detect the format of an already parsed JSON document.
    pub fn detect_value(value: &Value) -> Result<Self, ChartError> {
        let Some(obj) = value.as_object() else {
            // A bare number is a PEC file holding only its offset line.
            return if value.is_number() {
                Ok(ChartFormat::Pec)
            } else {
                Err(ChartError::UnknownFormat)
            };
        };
        let Some(lines) = obj.get("judgeLineList") else {
            return Err(ChartError::UnknownFormat);
        };
        if obj.contains_key("META") && obj.contains_key("BPMList") {
            return Ok(ChartFormat::Rpe);
        }
        if obj.contains_key("formatVersion") {
            return Ok(ChartFormat::Official);
        }
        let layered = lines
            .as_array()
            .is_some_and(|ls| ls.iter().any(|l| l.get("eventLayers").is_some()));
        if layered {
            Ok(ChartFormat::Rpe)
        } else {
            Ok(ChartFormat::Official)
        }
    }
}

/// Detect and decode a chart from its text.
pub fn decode_chart(
    text: &str,
    viewport: Viewport,
    options: ParseOptions,
) -> Result<Chart, ChartError> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => return Ok(PecDecoder::decode_str(text, viewport)),
    };
    let format = ChartFormat::detect_value(&value)?;
    log::debug!("detected {} chart", format.name());
    match format {
        ChartFormat::Official => OfficialDecoder::decode_value(value, viewport),
        ChartFormat::Rpe => RpeDecoder::decode_value(value, viewport, options),
        ChartFormat::Pec => Ok(PecDecoder::decode_str(text, viewport)),
    }
}

/// Read and decode a chart file. `.pec` and `.pe` files skip detection.
pub fn decode_chart_file(
    path: &Path,
    viewport: Viewport,
    options: ParseOptions,
) -> Result<Chart, ChartError> {
    let text = std::fs::read_to_string(path).map_err(|source| ChartError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let is_pec = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pec") || e.eq_ignore_ascii_case("pe"));
    if is_pec {
        return Ok(PecDecoder::decode_str(&text, viewport));
    }
    decode_chart(&text, viewport, options)
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Booleans authored as `true`, `1`, or `"1"`.
pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}
