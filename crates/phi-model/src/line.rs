use crate::error::ChartError;
use crate::track::{ColorTrack, IntegralTrack, LayeredTrack, Rgb, TextTrack, Track};

/// Custom line sprite.
#[derive(Debug, Clone, Default)]
pub struct LineTexture {
    pub path: String,
    /// Pivot in texture-relative coordinates
    pub anchor: [f64; 2],
    pub is_gif: bool,
    /// Gif playback progress in 0..1
    pub gif_progress: Option<Track>,
}

/// A judgment line and all of its animated properties.
///
/// Positions are viewport pixels, rotation is radians, opacity is raw (may be
/// negative), scroll is pixels of note travel.
#[derive(Debug, Clone, Default)]
pub struct Line {
    pub id: usize,
    pub name: String,
    pub x: LayeredTrack,
    pub y: LayeredTrack,
    pub rotation: LayeredTrack,
    pub opacity: LayeredTrack,
    pub scroll: IntegralTrack,
    pub color: Option<ColorTrack>,
    pub scale_x: Option<Track>,
    pub scale_y: Option<Track>,
    pub text: Option<TextTrack>,
    pub texture: Option<LineTexture>,
    pub base_color: Rgb,
    pub parent: Option<usize>,
    pub rotate_with_parent: bool,
    /// Ancestors whose position adds onto this line, nearest first
    pub position_ancestors: Vec<usize>,
    /// Ancestors whose rotation adds onto this line, nearest first
    pub rotation_ancestors: Vec<usize>,
}

impl Line {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            opacity: LayeredTrack::constant(1.0),
            base_color: Rgb::WHITE,
            rotate_with_parent: true,
            ..Self::default()
        }
    }

    /// Last authored event end across the transform tracks.
    pub fn last_event_time(&self) -> Option<f64> {
        [&self.x, &self.y, &self.rotation, &self.opacity]
            .iter()
            .flat_map(|p| p.layers().iter().filter_map(Track::end_time))
            .filter(|t| t.is_finite())
            .reduce(f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

/// Compile parent links into per-line ancestor chains.
///
/// Parents outside the line table are treated as no parent. A cycle fails the
/// whole chart.
pub fn resolve_hierarchy(lines: &mut [Line]) -> Result<(), ChartError> {
    let n = lines.len();
    let parents: Vec<Option<usize>> = lines
        .iter()
        .map(|l| l.parent.filter(|&p| p < n))
        .collect();
    let mut state = vec![Visit::New; n];
    let mut position: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut rotation: Vec<Vec<usize>> = vec![Vec::new(); n];

    for start in 0..n {
        let mut path = Vec::new();
        let mut cur = Some(start);
        while let Some(i) = cur {
            match state[i] {
                Visit::Done => break,
                Visit::Active => return Err(ChartError::ParentCycle { line: lines[i].id }),
                Visit::New => {
                    state[i] = Visit::Active;
                    path.push(i);
                    cur = parents[i];
                }
            }
        }
        for &i in path.iter().rev() {
            if let Some(p) = parents[i] {
                let mut chain = Vec::with_capacity(position[p].len() + 1);
                chain.push(p);
                chain.extend_from_slice(&position[p]);
                position[i] = chain;
                if lines[i].rotate_with_parent {
                    let mut chain = Vec::with_capacity(rotation[p].len() + 1);
                    chain.push(p);
                    chain.extend_from_slice(&rotation[p]);
                    rotation[i] = chain;
                }
            }
            state[i] = Visit::Done;
        }
    }

    for ((line, pos), rot) in lines.iter_mut().zip(position).zip(rotation) {
        line.position_ancestors = pos;
        line.rotation_ancestors = rot;
    }
    Ok(())
}
