//! Track and clip data model shared by the extractor, retargeter and
//! writer. Tracks own their time and value arrays; times are seconds.

use glam::{DVec3, Quat, Vec3};
use std::collections::HashMap;

/// Rest-pose attributes captured from a bone's model node. Rotations are
/// radians; translation is raw source units. Kept for diagnostics — the
/// retarget stage uses its own calibration table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RestTransform {
    pub pre_rotation: Option<DVec3>,
    pub post_rotation: Option<DVec3>,
    pub rotation: Option<DVec3>,
    pub translation: Option<DVec3>,
}

/// A bone's orientation time series.
///
/// Invariants: times strictly increase, one unit quaternion per time, and
/// adjacent quaternions have a non-negative dot product (unrolled).
#[derive(Clone, Debug)]
pub struct RotationTrack {
    pub bone: String,
    pub times: Vec<f64>,
    pub rotations: Vec<Quat>,
    pub rest: RestTransform,
}

/// A bone's translation time series, in raw source units.
#[derive(Clone, Debug)]
pub struct PositionTrack {
    pub bone: String,
    pub times: Vec<f64>,
    pub positions: Vec<Vec3>,
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    /// Negative means "compute from the track extents".
    pub duration: f64,
    /// The overall duration the source file declares. Playback always
    /// recomputes from track extents; this is kept for diagnostics.
    pub declared_duration: Option<f64>,
    pub rotation_tracks: Vec<RotationTrack>,
    pub position_tracks: Vec<PositionTrack>,
    /// Bone name to parent bone name, as named in the source file.
    pub parents: HashMap<String, String>,
}

/// A rotation track expressed in the destination rig's local space and
/// coordinate system. The source bone name is kept for reference.
#[derive(Clone, Debug)]
pub struct RetargetedRotationTrack {
    pub bone: String,
    pub source_bone: String,
    pub times: Vec<f64>,
    pub rotations: Vec<Quat>,
}

/// A translation track in destination units (scaled, offset, Z-flipped).
#[derive(Clone, Debug)]
pub struct RetargetedPositionTrack {
    pub bone: String,
    pub source_bone: String,
    pub times: Vec<f64>,
    pub positions: Vec<Vec3>,
}

#[derive(Clone, Debug)]
pub struct RetargetedClip {
    pub name: String,
    pub duration: f64,
    pub rotation_tracks: Vec<RetargetedRotationTrack>,
    pub position_tracks: Vec<RetargetedPositionTrack>,
}
