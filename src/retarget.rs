//! Mixamo-rig to MMD-rig retargeting.
//!
//! Each bone's local-space quaternion track is re-expressed in the
//! destination rig's local space by a precomputed similarity transform
//! `q' = q_l · q · q_r`, bone names are remapped to the Japanese standard
//! names, translations are rescaled, and the whole result is flipped into
//! the destination coordinate system by negating Z and W.
//!
//! The calibration tables describe the standard T-pose source rig. The
//! source rig holds its arms straight out; the destination rest pose holds
//! them about 35° down, so the arm chains carry an extra Z-axis adjustment
//! on one or both sides of the composition.

use crate::extract::strip_rig_prefix;
use crate::model::{
    AnimationClip, RetargetedClip, RetargetedPositionTrack, RetargetedRotationTrack,
};
use glam::{Quat, Vec3};
use std::collections::HashMap;
use std::sync::OnceLock;

const POSITION_SCALE: f32 = 1.0 / 12.5;
const POSITION_Y_OFFSET: f32 = -8.3;
const ARM_ADJUST_DEG: f32 = 35.0;

/// Rest orientation of the left outbound arm chain (shoulder through
/// fingertips) in source local space; the right chain is its X-mirror,
/// the leg chains a half-turn about Z (the bones run straight down).
const LEFT_ARM_REST: Quat = Quat::from_xyzw(0.5, 0.5, -0.5, 0.5);
const RIGHT_ARM_REST: Quat = Quat::from_xyzw(0.5, -0.5, 0.5, 0.5);
const LEG_REST: Quat = Quat::from_xyzw(0.0, 0.0, 1.0, 0.0);

/// Every source bone with a destination name.
const SOURCE_BONES: [&str; 52] = [
    "Hips",
    "Spine",
    "Spine1",
    "Spine2",
    "Neck",
    "Head",
    "LeftShoulder",
    "LeftArm",
    "LeftForeArm",
    "LeftHand",
    "RightShoulder",
    "RightArm",
    "RightForeArm",
    "RightHand",
    "LeftUpLeg",
    "LeftLeg",
    "LeftFoot",
    "LeftToeBase",
    "RightUpLeg",
    "RightLeg",
    "RightFoot",
    "RightToeBase",
    "LeftHandThumb1",
    "LeftHandThumb2",
    "LeftHandThumb3",
    "LeftHandIndex1",
    "LeftHandIndex2",
    "LeftHandIndex3",
    "LeftHandMiddle1",
    "LeftHandMiddle2",
    "LeftHandMiddle3",
    "LeftHandRing1",
    "LeftHandRing2",
    "LeftHandRing3",
    "LeftHandPinky1",
    "LeftHandPinky2",
    "LeftHandPinky3",
    "RightHandThumb1",
    "RightHandThumb2",
    "RightHandThumb3",
    "RightHandIndex1",
    "RightHandIndex2",
    "RightHandIndex3",
    "RightHandMiddle1",
    "RightHandMiddle2",
    "RightHandMiddle3",
    "RightHandRing1",
    "RightHandRing2",
    "RightHandRing3",
    "RightHandPinky1",
    "RightHandPinky2",
    "RightHandPinky3",
];

/// Maps a source bone name (with or without the rig namespace prefix) to
/// its Japanese destination name. Unmapped names pass through unchanged.
pub fn map_bone_name(source: &str) -> &str {
    mmd_bone_name(strip_rig_prefix(source)).unwrap_or(source)
}

fn mmd_bone_name(bone: &str) -> Option<&'static str> {
    Some(match bone {
        "Hips" => "センター",
        "Spine" => "上半身",
        "Spine1" => "上半身2",
        "Spine2" => "上半身3",
        "Neck" => "首",
        "Head" => "頭",
        "LeftShoulder" => "左肩",
        "LeftArm" => "左腕",
        "LeftForeArm" => "左ひじ",
        "LeftHand" => "左手首",
        "RightShoulder" => "右肩",
        "RightArm" => "右腕",
        "RightForeArm" => "右ひじ",
        "RightHand" => "右手首",
        "LeftUpLeg" => "左足",
        "LeftLeg" => "左ひざ",
        "LeftFoot" => "左足首",
        "LeftToeBase" => "左つま先",
        "RightUpLeg" => "右足",
        "RightLeg" => "右ひざ",
        "RightFoot" => "右足首",
        "RightToeBase" => "右つま先",
        "LeftHandThumb1" => "左親指０",
        "LeftHandThumb2" => "左親指１",
        "LeftHandThumb3" => "左親指２",
        "LeftHandIndex1" => "左人指１",
        "LeftHandIndex2" => "左人指２",
        "LeftHandIndex3" => "左人指３",
        "LeftHandMiddle1" => "左中指１",
        "LeftHandMiddle2" => "左中指２",
        "LeftHandMiddle3" => "左中指３",
        "LeftHandRing1" => "左薬指１",
        "LeftHandRing2" => "左薬指２",
        "LeftHandRing3" => "左薬指３",
        "LeftHandPinky1" => "左小指１",
        "LeftHandPinky2" => "左小指２",
        "LeftHandPinky3" => "左小指３",
        "RightHandThumb1" => "右親指０",
        "RightHandThumb2" => "右親指１",
        "RightHandThumb3" => "右親指２",
        "RightHandIndex1" => "右人指１",
        "RightHandIndex2" => "右人指２",
        "RightHandIndex3" => "右人指３",
        "RightHandMiddle1" => "右中指１",
        "RightHandMiddle2" => "右中指２",
        "RightHandMiddle3" => "右中指３",
        "RightHandRing1" => "右薬指１",
        "RightHandRing2" => "右薬指２",
        "RightHandRing3" => "右薬指３",
        "RightHandPinky1" => "右小指１",
        "RightHandPinky2" => "右小指２",
        "RightHandPinky3" => "右小指３",
        _ => return None,
    })
}

/// Rest orientation `q_a` of a source bone in its rig's local space.
/// Bones absent here take the identity path: the animated quaternion is
/// kept as-is, subject only to the final coordinate flip.
fn rest_orientation(bone: &str) -> Option<Quat> {
    match bone {
        "LeftShoulder" | "LeftArm" | "LeftForeArm" | "LeftHand" => Some(LEFT_ARM_REST),
        "RightShoulder" | "RightArm" | "RightForeArm" | "RightHand" => Some(RIGHT_ARM_REST),
        "LeftUpLeg" | "LeftLeg" | "LeftFoot" | "LeftToeBase" | "RightUpLeg" | "RightLeg"
        | "RightFoot" | "RightToeBase" => Some(LEG_REST),
        _ if is_left_finger(bone) => Some(LEFT_ARM_REST),
        _ if is_right_finger(bone) => Some(RIGHT_ARM_REST),
        _ => None,
    }
}

fn is_left_finger(bone: &str) -> bool {
    bone.starts_with("LeftHand") && bone != "LeftHand"
}

fn is_right_finger(bone: &str) -> bool {
    bone.starts_with("RightHand") && bone != "RightHand"
}

/// The precomputed sides of a bone's similarity transform.
#[derive(Copy, Clone, Debug)]
struct BonePair {
    q_l: Quat,
    q_r: Quat,
}

/// Per-bone `(q_l, q_r)` pairs, computed once and immutable afterwards.
///
/// Baseline: `q_l = q_a`, `q_r = q_a⁻¹`. The arm and forearm chains then
/// fold in the 35° rest-pose adjustment: arms and fingers before the
/// composition (`rot(Z, ∓35°) · q_a`), forearms and fingers after it
/// (`q_a⁻¹ · rot(Z, ±35°)`).
fn transform_pairs() -> &'static HashMap<&'static str, BonePair> {
    static PAIRS: OnceLock<HashMap<&'static str, BonePair>> = OnceLock::new();
    PAIRS.get_or_init(|| {
        let adjust_l = Quat::from_rotation_z(ARM_ADJUST_DEG.to_radians());
        let adjust_r = Quat::from_rotation_z(-ARM_ADJUST_DEG.to_radians());

        let mut pairs = HashMap::new();
        for bone in SOURCE_BONES {
            let Some(q_a) = rest_orientation(bone) else {
                continue;
            };
            let mut q_l = q_a;
            let mut q_r = q_a.conjugate();
            if bone == "LeftArm" || is_left_finger(bone) {
                q_l = adjust_r * q_a;
            } else if bone == "RightArm" || is_right_finger(bone) {
                q_l = adjust_l * q_a;
            }
            if bone == "LeftForeArm" || is_left_finger(bone) {
                q_r = q_a.conjugate() * adjust_l;
            } else if bone == "RightForeArm" || is_right_finger(bone) {
                q_r = q_a.conjugate() * adjust_r;
            }
            pairs.insert(bone, BonePair { q_l, q_r });
        }
        pairs
    })
}

/// Retargets every clip onto the destination rig.
pub fn retarget(clips: &[AnimationClip]) -> Vec<RetargetedClip> {
    clips.iter().map(retarget_clip).collect()
}

fn retarget_clip(clip: &AnimationClip) -> RetargetedClip {
    let pairs = transform_pairs();

    let rotation_tracks: Vec<_> = clip
        .rotation_tracks
        .iter()
        .map(|track| {
            let pair = pairs.get(strip_rig_prefix(&track.bone)).copied();
            let rotations = track
                .rotations
                .iter()
                .map(|q| {
                    let q = match pair {
                        Some(p) => p.q_l * *q * p.q_r,
                        None => *q,
                    };
                    flip_handedness(q)
                })
                .collect();
            RetargetedRotationTrack {
                bone: map_bone_name(&track.bone).to_string(),
                source_bone: track.bone.clone(),
                times: track.times.clone(),
                rotations,
            }
        })
        .collect();

    let position_tracks: Vec<_> = clip
        .position_tracks
        .iter()
        .map(|track| {
            let q_l = pairs
                .get(strip_rig_prefix(&track.bone))
                .map_or(Quat::IDENTITY, |p| p.q_l);
            let positions = track
                .positions
                .iter()
                .map(|v| {
                    let v = (q_l * *v) * POSITION_SCALE;
                    Vec3::new(v.x, v.y + POSITION_Y_OFFSET, -v.z)
                })
                .collect();
            RetargetedPositionTrack {
                bone: map_bone_name(&track.bone).to_string(),
                source_bone: track.bone.clone(),
                times: track.times.clone(),
                positions,
            }
        })
        .collect();

    let mut duration = clip.duration;
    if duration <= 0.0 {
        duration = rotation_tracks
            .iter()
            .filter_map(|t| t.times.last())
            .chain(position_tracks.iter().filter_map(|t| t.times.last()))
            .fold(0.0, |acc, t| acc.max(*t));
    }

    RetargetedClip {
        name: clip.name.clone(),
        duration,
        rotation_tracks,
        position_tracks,
    }
}

/// Flips a rotation into the destination coordinate system.
fn flip_handedness(q: Quat) -> Quat {
    Quat::from_xyzw(q.x, q.y, -q.z, -q.w)
}
