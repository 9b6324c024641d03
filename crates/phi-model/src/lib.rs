// Chart data model: animation tracks, tempo maps, lines, notes, format decoders

mod bpm;
mod chart;
pub mod easing;
mod error;
mod line;
mod note;
pub mod parse;
pub mod track;

pub use bpm::{Beat, BpmEntry, BpmMap, OFFICIAL_UNIT_SECONDS, TimeBase, UnitTimeBase};
pub use chart::{Chart, ChartFormat, ChartMeta, Viewport};
pub use easing::Easing;
pub use error::ChartError;
pub use line::{Line, LineTexture, resolve_hierarchy};
pub use note::{ALWAYS_VISIBLE, Note, NoteKind};
pub use parse::{
    OfficialDecoder, ParseOptions, PecDecoder, RpeDecoder, decode_chart, decode_chart_file,
};
pub use track::{
    ColorTrack, IntegralTrack, LayeredTrack, Rgb, Segment, TextTrack, Track,
};
