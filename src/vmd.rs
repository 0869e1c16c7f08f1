//! VMD motion-data writer.
//!
//! Encodes a retargeted clip into the destination keyframe container:
//! little-endian throughout, bone names in Shift-JIS, one 111-byte record
//! per bone per keyframe, and a single property keyframe that switches the
//! standard IK chains off so the raw per-bone rotations play back as
//! authored. The writer is infallible: numeric anomalies are replaced with
//! safe defaults, never propagated.

use crate::math::slerp;
use crate::model::{RetargetedClip, RetargetedPositionTrack, RetargetedRotationTrack};
use encoding_rs::SHIFT_JIS;
use glam::{Quat, Vec3};
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_FPS: f32 = 30.0;

const SIGNATURE: &str = "Vocaloid Motion Data 0002";
const SIGNATURE_LEN: usize = 30;
const MODEL_NAME_LEN: usize = 20;
const BONE_NAME_LEN: usize = 15;
const IK_NAME_LEN: usize = 20;

/// Neutral linear value for every byte of the per-record Bézier table.
const INTERPOLATION_FILL: u8 = 20;
const INTERPOLATION_LEN: usize = 64;

/// The IK chains disabled by the property keyframe.
const DISABLED_IK_BONES: [&str; 6] = [
    "左足ＩＫ",
    "右足ＩＫ",
    "左つま先ＩＫ",
    "右つま先ＩＫ",
    "左腕ＩＫ",
    "右腕ＩＫ",
];

const TIME_QUANTUM: f64 = 1e-6;

/// Encodes a retargeted clip as a complete VMD blob at the given output
/// frame rate.
pub fn write_vmd(clip: &RetargetedClip, fps: f32) -> Vec<u8> {
    let frames = collect_bone_frames(clip, fps);

    let mut out = BinaryOutput::default();
    out.put_fixed_str(SIGNATURE, SIGNATURE_LEN);
    out.put_fixed_str("", MODEL_NAME_LEN);

    out.put_u32(frames.len() as u32);
    for frame in &frames {
        write_bone_frame(&mut out, frame);
    }

    out.put_u32(0); // morph keyframes
    out.put_u32(0); // camera keyframes
    out.put_u32(0); // light keyframes
    out.put_u32(0); // self-shadow keyframes

    out.put_u32(1); // property keyframes
    write_property_keyframe(&mut out);

    out.bytes
}

#[derive(Clone, Debug)]
struct BoneFrame {
    name: String,
    frame: u32,
    position: Vec3,
    rotation: Quat,
}

/// A destination bone's pair of tracks. A bone may carry either or both.
#[derive(Default)]
struct Channel<'a> {
    rotation: Option<&'a RetargetedRotationTrack>,
    position: Option<&'a RetargetedPositionTrack>,
}

/// One record per bone per time in the union of that bone's rotation and
/// position timelines, sorted by frame index, ties by bone name.
fn collect_bone_frames(clip: &RetargetedClip, fps: f32) -> Vec<BoneFrame> {
    let mut order: Vec<&str> = Vec::new();
    let mut channels: HashMap<&str, Channel<'_>> = HashMap::new();
    for track in &clip.rotation_tracks {
        let channel = channels.entry(&track.bone).or_insert_with(|| {
            order.push(&track.bone);
            Channel::default()
        });
        channel.rotation.get_or_insert(track);
    }
    for track in &clip.position_tracks {
        let channel = channels.entry(&track.bone).or_insert_with(|| {
            order.push(&track.bone);
            Channel::default()
        });
        channel.position.get_or_insert(track);
    }

    let mut frames = Vec::new();
    for name in order {
        let channel = &channels[name];
        let mut keys = BTreeSet::new();
        if let Some(track) = channel.rotation {
            keys.extend(track.times.iter().map(|t| quantize(*t)));
        }
        if let Some(track) = channel.position {
            keys.extend(track.times.iter().map(|t| quantize(*t)));
        }
        for key in keys {
            let time = key as f64 * TIME_QUANTUM;
            frames.push(BoneFrame {
                name: name.to_string(),
                frame: (time * f64::from(fps)).round() as u32,
                position: channel
                    .position
                    .map_or(Vec3::ZERO, |t| sample_position(&t.times, &t.positions, key)),
                rotation: channel
                    .rotation
                    .map_or(Quat::IDENTITY, |t| sample_rotation(&t.times, &t.rotations, key)),
            });
        }
    }

    frames.sort_by(|a, b| a.frame.cmp(&b.frame).then_with(|| a.name.cmp(&b.name)));
    frames
}

fn quantize(t: f64) -> i64 {
    (t / TIME_QUANTUM).round() as i64
}

fn sample_rotation(times: &[f64], rotations: &[Quat], at: i64) -> Quat {
    if rotations.is_empty() {
        return Quat::IDENTITY;
    }
    match times.binary_search_by_key(&at, |t| quantize(*t)) {
        Ok(i) => rotations[i],
        Err(0) => rotations[0],
        Err(i) if i == rotations.len() => rotations[rotations.len() - 1],
        Err(i) => {
            let time = at as f64 * TIME_QUANTUM;
            let s = (time - times[i - 1]) / (times[i] - times[i - 1]);
            slerp(rotations[i - 1], rotations[i], s as f32)
        }
    }
}

fn sample_position(times: &[f64], positions: &[Vec3], at: i64) -> Vec3 {
    if positions.is_empty() {
        return Vec3::ZERO;
    }
    match times.binary_search_by_key(&at, |t| quantize(*t)) {
        Ok(i) => positions[i],
        Err(0) => positions[0],
        Err(i) if i == positions.len() => positions[positions.len() - 1],
        Err(i) => {
            let time = at as f64 * TIME_QUANTUM;
            let s = ((time - times[i - 1]) / (times[i] - times[i - 1])) as f32;
            positions[i - 1].lerp(positions[i], s)
        }
    }
}

/// One 111-byte bone-frame record. Non-finite position components write 0;
/// a rotation with any non-finite component writes the identity.
fn write_bone_frame(out: &mut BinaryOutput, frame: &BoneFrame) {
    out.put_fixed_str(&frame.name, BONE_NAME_LEN);
    out.put_u32(frame.frame);

    out.put_f32(finite_or_zero(frame.position.x));
    out.put_f32(finite_or_zero(frame.position.y));
    out.put_f32(finite_or_zero(frame.position.z));

    let q = frame.rotation;
    let q = if q.x.is_finite() && q.y.is_finite() && q.z.is_finite() && q.w.is_finite() {
        q
    } else {
        Quat::IDENTITY
    };
    out.put_f32(q.x);
    out.put_f32(q.y);
    out.put_f32(q.z);
    out.put_f32(q.w);

    out.bytes
        .resize(out.bytes.len() + INTERPOLATION_LEN, INTERPOLATION_FILL);
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Frame 0, model visible, six IK chains disabled.
fn write_property_keyframe(out: &mut BinaryOutput) {
    out.put_u32(0);
    out.put_u8(1);
    out.put_u32(DISABLED_IK_BONES.len() as u32);
    for name in DISABLED_IK_BONES {
        out.put_fixed_str(name, IK_NAME_LEN);
        out.put_u8(0);
    }
}

/// Little-endian byte sink, the writing mirror of the reader's cursor.
#[derive(Default)]
struct BinaryOutput {
    bytes: Vec<u8>,
}

impl BinaryOutput {
    fn put_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    fn put_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f32(&mut self, v: f32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Shift-JIS encodes into a fixed-width field: truncated at the field
    /// width, NUL-padded below it.
    fn put_fixed_str(&mut self, s: &str, len: usize) {
        let (encoded, _, _) = SHIFT_JIS.encode(s);
        let n = encoded.len().min(len);
        self.bytes.extend_from_slice(&encoded[..n]);
        self.bytes.resize(self.bytes.len() + (len - n), 0);
    }
}
