use crate::model::{RetargetedClip, RetargetedPositionTrack, RetargetedRotationTrack};
use crate::write_vmd;
use glam::{Quat, Vec3};

const HEADER_LEN: usize = 50;
const RECORD_LEN: usize = 111;
const RECORDS_AT: usize = HEADER_LEN + 4;

fn clip(
    rotation_tracks: Vec<RetargetedRotationTrack>,
    position_tracks: Vec<RetargetedPositionTrack>,
) -> RetargetedClip {
    RetargetedClip {
        name: "clip".to_string(),
        duration: 1.0,
        rotation_tracks,
        position_tracks,
    }
}

fn rot_track(bone: &str, times: Vec<f64>, rotations: Vec<Quat>) -> RetargetedRotationTrack {
    RetargetedRotationTrack {
        bone: bone.to_string(),
        source_bone: bone.to_string(),
        times,
        rotations,
    }
}

fn pos_track(bone: &str, times: Vec<f64>, positions: Vec<Vec3>) -> RetargetedPositionTrack {
    RetargetedPositionTrack {
        bone: bone.to_string(),
        source_bone: bone.to_string(),
        times,
        positions,
    }
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().expect("u32 field"))
}

fn f32_at(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes(bytes[at..at + 4].try_into().expect("f32 field"))
}

fn record_at(bytes: &[u8], index: usize) -> &[u8] {
    let start = RECORDS_AT + index * RECORD_LEN;
    &bytes[start..start + RECORD_LEN]
}

fn shift_jis(s: &str) -> Vec<u8> {
    let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(s);
    encoded.into_owned()
}

/// Total size for N bone frames: header, bone count, records, the four
/// empty section counts, the property count, one property keyframe.
fn expected_len(records: usize) -> usize {
    HEADER_LEN + 4 + RECORD_LEN * records + 4 * 4 + 4 + 135
}

#[test]
fn empty_clip_still_produces_a_complete_blob() {
    let bytes = write_vmd(&clip(vec![], vec![]), 30.0);
    assert_eq!(bytes.len(), expected_len(0));

    assert_eq!(&bytes[..25], b"Vocaloid Motion Data 0002");
    assert!(bytes[25..30].iter().all(|b| *b == 0), "signature padding");
    assert!(bytes[30..50].iter().all(|b| *b == 0), "model name");

    assert_eq!(u32_at(&bytes, 50), 0); // bone frames
    assert_eq!(u32_at(&bytes, 54), 0); // morph frames
    assert_eq!(u32_at(&bytes, 58), 0); // camera
    assert_eq!(u32_at(&bytes, 62), 0); // light
    assert_eq!(u32_at(&bytes, 66), 0); // self shadow
    assert_eq!(u32_at(&bytes, 70), 1); // property frames
}

#[test]
fn property_keyframe_disables_the_six_ik_chains() {
    let bytes = write_vmd(&clip(vec![], vec![]), 30.0);
    let keyframe_at = 74;

    assert_eq!(u32_at(&bytes, keyframe_at), 0, "frame index");
    assert_eq!(bytes[keyframe_at + 4], 1, "visibility");
    assert_eq!(u32_at(&bytes, keyframe_at + 5), 6, "IK entry count");

    let entries_at = keyframe_at + 9;
    for i in 0..6 {
        let entry = &bytes[entries_at + i * 21..entries_at + (i + 1) * 21];
        assert_eq!(entry[20], 0, "entry {i} enable flag");
        assert_ne!(entry[0], 0, "entry {i} has a name");
    }

    // Second chain is the right leg IK, with its known byte sequence.
    let second = &bytes[entries_at + 21..entries_at + 21 + 20];
    assert_eq!(
        &second[..8],
        &[0x89, 0x45, 0x91, 0xab, 0x82, 0x68, 0x82, 0x6a],
        "right leg IK name"
    );
    assert!(second[8..].iter().all(|b| *b == 0), "name padding");
}

#[test]
fn two_identity_keys_produce_two_records_at_thirty_fps() {
    let q = Quat::from_xyzw(0.0, 0.0, 0.0, -1.0);
    let bytes = write_vmd(
        &clip(vec![rot_track("センター", vec![0.0, 1.0], vec![q; 2])], vec![]),
        30.0,
    );
    assert_eq!(bytes.len(), expected_len(2));
    assert_eq!(u32_at(&bytes, 50), 2);

    let name = shift_jis("センター");
    for (index, frame) in [(0usize, 0u32), (1, 30)] {
        let record = record_at(&bytes, index);
        assert_eq!(&record[..name.len()], name.as_slice(), "record {index} name");
        assert!(record[name.len()..15].iter().all(|b| *b == 0), "name padding");
        assert_eq!(u32_at(record, 15), frame, "record {index} frame");
        // Position defaults to zero for a rotation-only bone.
        assert_eq!(f32_at(record, 19), 0.0);
        assert_eq!(f32_at(record, 23), 0.0);
        assert_eq!(f32_at(record, 27), 0.0);
        assert_eq!(f32_at(record, 31), 0.0, "x");
        assert_eq!(f32_at(record, 35), 0.0, "y");
        assert_eq!(f32_at(record, 39), 0.0, "z");
        assert_eq!(f32_at(record, 43), -1.0, "w");
    }

    // The bone name encodes to its known byte sequence.
    assert_eq!(name, vec![0x83, 0x5a, 0x83, 0x93, 0x83, 0x5e, 0x81, 0x5b]);
}

#[test]
fn interpolation_table_is_filled_with_twenty() {
    let bytes = write_vmd(
        &clip(
            vec![rot_track("頭", vec![0.0], vec![Quat::IDENTITY])],
            vec![],
        ),
        30.0,
    );
    let record = record_at(&bytes, 0);
    assert!(record[47..111].iter().all(|b| *b == 20));
}

#[test]
fn frame_index_rounds_time_times_fps() {
    let bytes = write_vmd(
        &clip(
            vec![rot_track("頭", vec![0.4999, 1.02], vec![Quat::IDENTITY; 2])],
            vec![],
        ),
        30.0,
    );
    assert_eq!(u32_at(record_at(&bytes, 0), 15), 15); // 14.997 rounds up
    assert_eq!(u32_at(record_at(&bytes, 1), 15), 31); // 30.6 rounds up
}

#[test]
fn equal_frames_order_lexicographically_by_bone_name() {
    let bytes = write_vmd(
        &clip(
            vec![
                rot_track("頭", vec![0.0], vec![Quat::IDENTITY]),
                rot_track("センター", vec![0.0], vec![Quat::IDENTITY]),
            ],
            vec![],
        ),
        30.0,
    );
    assert_eq!(u32_at(&bytes, 50), 2);
    let first = record_at(&bytes, 0);
    let second = record_at(&bytes, 1);
    let center = shift_jis("センター");
    let head = shift_jis("頭");
    assert_eq!(&first[..center.len()], center.as_slice());
    assert_eq!(&second[..head.len()], head.as_slice());
}

#[test]
fn records_sort_by_frame_index() {
    let bytes = write_vmd(
        &clip(
            vec![
                rot_track("頭", vec![0.0, 2.0], vec![Quat::IDENTITY; 2]),
                rot_track("センター", vec![1.0], vec![Quat::IDENTITY]),
            ],
            vec![],
        ),
        30.0,
    );
    let frames: Vec<u32> = (0..3).map(|i| u32_at(record_at(&bytes, i), 15)).collect();
    assert_eq!(frames, vec![0, 30, 60]);
    let middle = record_at(&bytes, 1);
    let center = shift_jis("センター");
    assert_eq!(&middle[..center.len()], center.as_slice());
}

#[test]
fn position_only_bone_writes_identity_rotation() {
    let bytes = write_vmd(
        &clip(
            vec![],
            vec![pos_track("センター", vec![0.0], vec![Vec3::new(1.0, 2.0, 3.0)])],
        ),
        30.0,
    );
    let record = record_at(&bytes, 0);
    assert_eq!(f32_at(record, 19), 1.0);
    assert_eq!(f32_at(record, 23), 2.0);
    assert_eq!(f32_at(record, 27), 3.0);
    assert_eq!(f32_at(record, 31), 0.0);
    assert_eq!(f32_at(record, 35), 0.0);
    assert_eq!(f32_at(record, 39), 0.0);
    assert_eq!(f32_at(record, 43), 1.0);
}

#[test]
fn union_times_interpolate_the_missing_channel() {
    // Rotation keyed at 0 and 1, position keyed at 0.5 only: three merged
    // records, the middle rotation slerped halfway.
    let q1 = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);
    let bytes = write_vmd(
        &clip(
            vec![rot_track("センター", vec![0.0, 1.0], vec![Quat::IDENTITY, q1])],
            vec![pos_track("センター", vec![0.5], vec![Vec3::new(0.0, 5.0, 0.0)])],
        ),
        30.0,
    );
    assert_eq!(u32_at(&bytes, 50), 3);

    let middle = record_at(&bytes, 1);
    assert_eq!(u32_at(middle, 15), 15);
    let expected = Quat::from_rotation_x(std::f32::consts::FRAC_PI_4);
    assert!((f32_at(middle, 31) - expected.x).abs() <= 1e-5);
    assert!((f32_at(middle, 43) - expected.w).abs() <= 1e-5);
    assert_eq!(f32_at(middle, 23), 5.0, "position key");

    // The position clamps to its single key at the outer times.
    assert_eq!(f32_at(record_at(&bytes, 0), 23), 5.0);
    assert_eq!(f32_at(record_at(&bytes, 2), 23), 5.0);
}

#[test]
fn non_finite_values_write_safe_defaults() {
    let bytes = write_vmd(
        &clip(
            vec![rot_track(
                "頭",
                vec![0.0],
                vec![Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0)],
            )],
            vec![pos_track(
                "頭",
                vec![0.0],
                vec![Vec3::new(f32::INFINITY, 4.0, f32::NAN)],
            )],
        ),
        30.0,
    );
    let record = record_at(&bytes, 0);
    assert_eq!(f32_at(record, 19), 0.0, "position x zeroed");
    assert_eq!(f32_at(record, 23), 4.0, "finite component kept");
    assert_eq!(f32_at(record, 27), 0.0, "position z zeroed");
    // Any bad rotation component replaces the whole quaternion.
    assert_eq!(f32_at(record, 31), 0.0);
    assert_eq!(f32_at(record, 35), 0.0);
    assert_eq!(f32_at(record, 39), 0.0);
    assert_eq!(f32_at(record, 43), 1.0);
}

#[test]
fn long_bone_names_truncate_at_the_field_width() {
    let name = "センターセンターセンター"; // 24 Shift-JIS bytes
    let bytes = write_vmd(
        &clip(vec![rot_track(name, vec![0.0], vec![Quat::IDENTITY])], vec![]),
        30.0,
    );
    let record = record_at(&bytes, 0);
    let encoded = shift_jis(name);
    assert_eq!(&record[..15], &encoded[..15]);
    assert_eq!(u32_at(record, 15), 0, "frame follows the name field");
}
