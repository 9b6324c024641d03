// Scene evaluation: line transforms, note placement, visibility precompute

pub mod kinematics;
pub mod visibility;

pub use kinematics::{KinematicsOptions, LineState, eval_line_state, note_world_position};
pub use visibility::{
    LOOKBACK_HORIZON, first_visible_time, group_simultaneous_notes, precompute_first_visible,
};
