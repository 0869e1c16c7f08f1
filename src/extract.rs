//! Animation extraction.
//!
//! Walks the decoded object graph through its connection list
//! (AnimationStack → AnimationLayer → AnimationCurveNode → AnimationCurve,
//! with each curve node also connected to the Model it animates), resolves
//! per-axis scalar curves into merged-timeline rotation and translation
//! tracks, and assembles unit-quaternion rotation tracks that survive
//! arcs of 180° and more.
//!
//! Format damage is fatal upstream in the parser; here every missing piece
//! of structure just skips the affected track or clip with a warning.

use crate::math::{euler_zxy_from_quat, quat_from_euler_zxy, unroll};
use crate::model::{AnimationClip, PositionTrack, RestTransform, RotationTrack};
use crate::node::{Document, Node};
use glam::{DVec3, Vec3};
use log::warn;
use std::collections::HashMap;

/// Exact number of source time ticks per second.
const TICKS_PER_SECOND: f64 = 46_186_158_000.0;

/// Merged timelines are keyed at microsecond resolution; rounding here
/// keeps double-precision tick division from minting spurious duplicate
/// keys.
const TIME_QUANTUM: f64 = 1e-6;

/// Per-axis degree deltas at or above this are subdivided so quaternion
/// interpolation cannot alias the intended sweep.
const SUBDIVISION_THRESHOLD_DEG: f64 = 180.0;

const RIG_PREFIX: &str = "mixamorig:";

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// An object-to-object edge from the connection list.
#[derive(Clone, Debug)]
struct Connection<'a> {
    src: i64,
    dst: i64,
    relationship: Option<&'a str>,
}

/// Extracts every animation clip from a parsed document. A file without
/// animation structure yields an empty list, never an error.
pub fn extract_clips(doc: &Document) -> Vec<AnimationClip> {
    let Some(objects) = doc.root.child("Objects") else {
        warn!("document has no Objects node; nothing to extract");
        return Vec::new();
    };
    let connections = collect_connections(&doc.root);
    let by_id = index_objects(objects);

    let mut clips = Vec::new();
    for stack in objects.children("AnimationStack") {
        if let Some(clip) = extract_stack(stack, &connections, &by_id) {
            clips.push(clip);
        }
    }
    clips
}

/// Single pass over the `Connections` group, keeping the object-to-object
/// (`OO`) edges in declaration order.
fn collect_connections<'a>(root: &'a Node) -> Vec<Connection<'a>> {
    let Some(group) = root.child("Connections") else {
        return Vec::new();
    };
    group
        .children("C")
        .filter(|c| c.prop_str(0) == Some("OO"))
        .filter_map(|c| {
            Some(Connection {
                src: c.prop_i64(1)?,
                dst: c.prop_i64(2)?,
                relationship: c.prop_str(3),
            })
        })
        .collect()
}

/// ID → node index over `Objects`, built once so connection endpoints
/// resolve without walking the tree again.
fn index_objects(objects: &Node) -> HashMap<i64, &Node> {
    objects
        .children
        .iter()
        .filter_map(|n| Some((n.prop_i64(0)?, n)))
        .collect()
}

/// Connection sources pointing at `dst_id`, restricted to nodes with the
/// expected tag, in connection-declaration order.
fn sources_into<'a>(
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &'a Node>,
    dst_id: i64,
    expected_tag: &str,
) -> Vec<(i64, &'a Node)> {
    connections
        .iter()
        .filter(|c| c.dst == dst_id)
        .filter_map(|c| {
            let node = *by_id.get(&c.src)?;
            (node.name == expected_tag).then_some((c.src, node))
        })
        .collect()
}

fn extract_stack(
    stack: &Node,
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &Node>,
) -> Option<AnimationClip> {
    let stack_id = stack.prop_i64(0)?;
    let name = match stack.prop_str(1).map(short_name) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => "Animation".to_string(),
    };
    let declared_duration = stack
        .property70("LocalStop")
        .and_then(|p| p.prop_number(4))
        .map(|ticks| ticks / TICKS_PER_SECOND);

    let layers = sources_into(connections, by_id, stack_id, "AnimationLayer");
    if layers.is_empty() {
        warn!("animation stack {name:?} has no layer connected; skipping");
        return None;
    }

    let mut rotation_tracks = Vec::new();
    let mut position_tracks = Vec::new();
    for (layer_id, _layer) in layers {
        for (curve_node_id, curve_node) in
            sources_into(connections, by_id, layer_id, "AnimationCurveNode")
        {
            let Some(model) = curve_node_model(connections, by_id, curve_node_id) else {
                continue;
            };
            let Some(bone) = model.prop_str(1).map(short_name).filter(|n| !n.is_empty()) else {
                warn!("animated model {} has no name; skipping", model.prop_i64(0).unwrap_or(0));
                continue;
            };

            match curve_node.prop_str(1).map(short_name) {
                Some("R") => {
                    if let Some(track) =
                        build_rotation_track(bone, model, connections, by_id, curve_node_id)
                    {
                        rotation_tracks.push(track);
                    }
                }
                Some("T") => {
                    if let Some(track) =
                        build_position_track(bone, connections, by_id, curve_node_id)
                    {
                        position_tracks.push(track);
                    }
                }
                // Scale and any other animated attributes are not converted.
                _ => {}
            }
        }
    }

    let parents = build_parent_map(connections, by_id, &rotation_tracks, &position_tracks);

    Some(AnimationClip {
        name,
        duration: -1.0,
        declared_duration,
        rotation_tracks,
        position_tracks,
        parents,
    })
}

/// The model a curve node animates: the destination of the first
/// connection out of the curve node that carries a relationship string.
fn curve_node_model<'a>(
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &'a Node>,
    curve_node_id: i64,
) -> Option<&'a Node> {
    connections
        .iter()
        .find(|c| c.src == curve_node_id && c.relationship.is_some_and(|r| !r.is_empty()))
        .and_then(|c| by_id.get(&c.dst).copied())
        .filter(|n| n.name == "Model")
}

/// One axis of a curve node: (quantized µs, value) keys in source order,
/// keys colliding after rounding collapsed to the last writer.
struct AxisCurve {
    keys: Vec<(i64, f64)>,
}

impl AxisCurve {
    /// Linear sample at a quantized time, clamped at the ends.
    fn sample(&self, at: i64) -> f64 {
        match self.keys.binary_search_by_key(&at, |(k, _)| *k) {
            Ok(i) => self.keys[i].1,
            Err(0) => self.keys[0].1,
            Err(i) if i == self.keys.len() => self.keys[i - 1].1,
            Err(i) => {
                let (k0, v0) = self.keys[i - 1];
                let (k1, v1) = self.keys[i];
                let t = (at - k0) as f64 / (k1 - k0) as f64;
                v0 + (v1 - v0) * t
            }
        }
    }
}

fn quantize(t: f64) -> i64 {
    (t / TIME_QUANTUM).round() as i64
}

/// Resolves the `AnimationCurve` feeding one axis of a curve node: the
/// source of a connection into the curve node whose relationship is the
/// bare axis letter or ends with `|X`/`|Y`/`|Z`.
fn axis_curve<'a>(
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &'a Node>,
    curve_node_id: i64,
    axis: char,
) -> Option<&'a Node> {
    let bare = axis.to_string();
    let suffix = format!("|{axis}");
    connections
        .iter()
        .find(|c| {
            c.dst == curve_node_id
                && c.relationship
                    .is_some_and(|r| r == bare || r.ends_with(&suffix))
        })
        .and_then(|c| by_id.get(&c.src).copied())
        .filter(|n| n.name == "AnimationCurve")
}

/// Pulls the key times (seconds) and values off an `AnimationCurve` node.
/// Times and values live as `KeyTime`/`KeyValueFloat` child nodes, or — in
/// older exports — directly at property indices 4 and 5.
fn curve_keys(curve: &Node, bone: &str) -> Option<AxisCurve> {
    let times = curve
        .child("KeyTime")
        .and_then(|n| n.prop_i64_array(0))
        .or_else(|| curve.prop_i64_array(4))?;
    let values = curve
        .child("KeyValueFloat")
        .and_then(|n| n.prop_f32_array(0))
        .or_else(|| curve.prop_f32_array(5))?;
    if times.len() != values.len() {
        warn!(
            "curve for bone {bone:?} has {} times but {} values; skipping",
            times.len(),
            values.len()
        );
        return None;
    }

    let mut keys: Vec<(i64, f64)> = Vec::with_capacity(times.len());
    for (ticks, value) in times.iter().zip(values) {
        let key = quantize(*ticks as f64 / TICKS_PER_SECOND);
        match keys.last_mut() {
            Some((last, slot)) if *last == key => *slot = f64::from(*value),
            _ => keys.push((key, f64::from(*value))),
        }
    }
    Some(AxisCurve { keys })
}

fn axis_curves(
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &Node>,
    curve_node_id: i64,
    bone: &str,
) -> Option<[AxisCurve; 3]> {
    let mut axes = Vec::with_capacity(3);
    for axis in ['X', 'Y', 'Z'] {
        let Some(curve) = axis_curve(connections, by_id, curve_node_id, axis) else {
            warn!("bone {bone:?} is missing its {axis} curve; skipping track");
            return None;
        };
        let curve = curve_keys(curve, bone)?;
        if curve.keys.is_empty() {
            warn!("bone {bone:?} has an empty {axis} curve; skipping track");
            return None;
        }
        axes.push(curve);
    }
    axes.try_into().ok()
}

/// Union of the three axis timelines, with each axis linearly resampled at
/// every merged time.
fn merge_axes(axes: &[AxisCurve; 3]) -> (Vec<f64>, Vec<DVec3>) {
    let mut merged: Vec<i64> = axes
        .iter()
        .flat_map(|a| a.keys.iter().map(|(k, _)| *k))
        .collect();
    merged.sort_unstable();
    merged.dedup();

    let times = merged.iter().map(|k| *k as f64 * TIME_QUANTUM).collect();
    let triplets = merged
        .iter()
        .map(|k| DVec3::new(axes[0].sample(*k), axes[1].sample(*k), axes[2].sample(*k)))
        .collect();
    (times, triplets)
}

fn build_rotation_track(
    bone: &str,
    model: &Node,
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &Node>,
    curve_node_id: i64,
) -> Option<RotationTrack> {
    let axes = axis_curves(connections, by_id, curve_node_id, bone)?;
    let (times, degrees) = merge_axes(&axes);
    let (times, eulers) = subdivide_large_arcs(&times, &degrees);

    let mut rotations: Vec<_> = eulers.iter().map(|e| quat_from_euler_zxy(*e)).collect();
    unroll(&mut rotations);

    Some(RotationTrack {
        bone: bone.to_string(),
        times,
        rotations,
        rest: rest_transform(model),
    })
}

fn build_position_track(
    bone: &str,
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &Node>,
    curve_node_id: i64,
) -> Option<PositionTrack> {
    let axes = axis_curves(connections, by_id, curve_node_id, bone)?;
    let (times, triplets) = merge_axes(&axes);
    let positions = triplets
        .iter()
        .map(|p| Vec3::new(p.x as f32, p.y as f32, p.z as f32))
        .collect();
    Some(PositionTrack {
        bone: bone.to_string(),
        times,
        positions,
    })
}

/// Splits every adjacent key pair whose per-axis degree delta reaches 180°
/// into equal sub-intervals, so the quaternion track cannot alias a sweep
/// down to its shortest-arc shadow.
///
/// Sub-interval boundaries are taken on the Euler segment and round-tripped
/// through a quaternion; for the single-axis sweeps this targets, that is
/// the great-circle path itself, and it stays defined at the 360° antipode
/// where an endpoint slerp degenerates. Input degrees, output radians; the
/// first key and every segment endpoint are emitted in exact Euler form.
fn subdivide_large_arcs(times: &[f64], degrees: &[DVec3]) -> (Vec<f64>, Vec<DVec3>) {
    let mut out_times = Vec::with_capacity(times.len());
    let mut out_eulers = Vec::with_capacity(times.len());
    if times.is_empty() {
        return (out_times, out_eulers);
    }

    out_times.push(times[0]);
    out_eulers.push(degrees[0] * DEG_TO_RAD);
    for i in 1..times.len() {
        let (t0, t1) = (times[i - 1], times[i]);
        let (e0, e1) = (degrees[i - 1], degrees[i]);
        let delta = e1 - e0;
        let max_abs = delta.x.abs().max(delta.y.abs()).max(delta.z.abs());
        if max_abs >= SUBDIVISION_THRESHOLD_DEG {
            let segments = (max_abs / SUBDIVISION_THRESHOLD_DEG).ceil() as usize;
            for k in 1..segments {
                let s = k as f64 / segments as f64;
                let boundary = quat_from_euler_zxy((e0 + delta * s) * DEG_TO_RAD);
                out_times.push(t0 + (t1 - t0) * s);
                out_eulers.push(euler_zxy_from_quat(boundary));
            }
        }
        out_times.push(t1);
        out_eulers.push(e1 * DEG_TO_RAD);
    }
    (out_times, out_eulers)
}

/// Rest-pose attributes off the model node. Rotations arrive in degrees
/// and are stored in radians.
fn rest_transform(model: &Node) -> RestTransform {
    let rotation = |name| model_vec3(model, name).map(|v| v * DEG_TO_RAD);
    RestTransform {
        pre_rotation: rotation("PreRotation"),
        post_rotation: rotation("PostRotation"),
        rotation: rotation("Lcl Rotation"),
        translation: model_vec3(model, "Lcl Translation"),
    }
}

/// A named vector off a model: a `Properties70` entry (values at property
/// indices 4..6), or — in legacy files — a direct child node holding a
/// numeric array.
fn model_vec3(model: &Node, name: &str) -> Option<DVec3> {
    if let Some(entry) = model.property70(name) {
        let x = entry.prop_number(4)?;
        let y = entry.prop_number(5)?;
        let z = entry.prop_number(6)?;
        return Some(DVec3::new(x, y, z));
    }
    let values = model.child(name)?.prop_f64_array(0)?;
    if values.len() < 3 {
        return None;
    }
    Some(DVec3::new(values[0], values[1], values[2]))
}

/// Case-insensitively strips the Mixamo rig namespace prefix.
pub(crate) fn strip_rig_prefix(name: &str) -> &str {
    if name.len() >= RIG_PREFIX.len() && name[..RIG_PREFIX.len()].eq_ignore_ascii_case(RIG_PREFIX) {
        &name[RIG_PREFIX.len()..]
    } else {
        name
    }
}

/// Parent map for the tracked bones, from the model-to-model edges of the
/// connection list. Models match tracked bones by name after prefix
/// stripping on either side.
fn build_parent_map(
    connections: &[Connection<'_>],
    by_id: &HashMap<i64, &Node>,
    rotation_tracks: &[RotationTrack],
    position_tracks: &[PositionTrack],
) -> HashMap<String, String> {
    let mut child_to_parent: HashMap<String, String> = HashMap::new();
    for c in connections {
        let (Some(child), Some(parent)) = (model_name(by_id, c.src), model_name(by_id, c.dst))
        else {
            continue;
        };
        child_to_parent
            .entry(strip_rig_prefix(child).to_string())
            .or_insert_with(|| parent.to_string());
    }

    let tracked = rotation_tracks
        .iter()
        .map(|t| t.bone.as_str())
        .chain(position_tracks.iter().map(|t| t.bone.as_str()));
    let mut parents = HashMap::new();
    for bone in tracked {
        if let Some(parent) = child_to_parent.get(strip_rig_prefix(bone)) {
            parents.insert(bone.to_string(), parent.clone());
        }
    }
    parents
}

fn model_name<'a>(by_id: &HashMap<i64, &'a Node>, id: i64) -> Option<&'a str> {
    by_id
        .get(&id)
        .filter(|n| n.name == "Model")
        .and_then(|n| n.prop_str(1))
        .map(short_name)
}

/// Final segment of a qualified object name: `Model::mixamorig:Hips`
/// names the bone `mixamorig:Hips`.
fn short_name(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}
