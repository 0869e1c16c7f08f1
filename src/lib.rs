//! Mixamo-rig FBX animation to MMD VMD motion-data converter.
//!
//! Three stages make up the pipeline: the binary container decoder
//! ([`parse_document`]), the animation extractor ([`extract_clips`]), and
//! the retarget + encode pair ([`retarget`], [`write_vmd`]). [`load`] and
//! [`convert`] compose them.
//!
//! The crate is IO-free: every stage consumes and produces in-memory
//! values. Fetching the source bytes and playing back the emitted motion
//! data are caller concerns.

#![forbid(unsafe_code)]

mod binary;
mod error;
mod extract;
mod math;
mod model;
mod node;
mod retarget;
mod vmd;

pub use binary::*;
pub use error::*;
pub use extract::*;
pub use math::*;
pub use model::*;
pub use node::*;
pub use retarget::*;
pub use vmd::*;



#[cfg(test)]
mod math_tests;



#[cfg(test)]
mod vmd_tests;

/// Parses an FBX binary document and extracts its animation clips. A file
/// with no animation structure yields an empty list.
pub fn load(bytes: &[u8]) -> Result<Vec<AnimationClip>, Error> {
    let document = parse_document(bytes)?;
    Ok(extract_clips(&document))
}

/// The whole pipeline: parse, extract, retarget, and encode the first clip
/// at the given frame rate. A source without animation still produces a
/// well-formed motion blob (no bone frames, IK chains disabled).
pub fn convert(bytes: &[u8], fps: f32) -> Result<Vec<u8>, Error> {
    let clips = load(bytes)?;
    let clip = retarget(&clips)
        .into_iter()
        .next()
        .unwrap_or_else(|| RetargetedClip {
            name: String::new(),
            duration: 0.0,
            rotation_tracks: Vec::new(),
            position_tracks: Vec::new(),
        });
    Ok(write_vmd(&clip, fps))
}
