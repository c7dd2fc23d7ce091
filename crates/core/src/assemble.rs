use crate::{
    error::AssemblyError,
    interval::Interval,
    types::{CaptionResult, Segment},
};

/// Combine per-modality caption results into one segment per interval.
///
/// All three sequences must come from the same ordered interval list: equal
/// lengths and matching intervals position by position. Segment ids come
/// from the visual results.
pub fn assemble(
    visual: Vec<CaptionResult>,
    speech: Vec<CaptionResult>,
    audio: Vec<CaptionResult>,
) -> Result<Vec<Segment>, AssemblyError> {
    if visual.len() != speech.len() || visual.len() != audio.len() {
        return Err(AssemblyError::LengthMismatch {
            visual: visual.len(),
            speech: speech.len(),
            audio: audio.len(),
        });
    }

    for (index, ((v, s), a)) in visual.iter().zip(&speech).zip(&audio).enumerate() {
        check_interval(index, "speech", &v.interval, &s.interval)?;
        check_interval(index, "audio", &v.interval, &a.interval)?;
    }

    let segments = visual
        .into_iter()
        .zip(speech)
        .zip(audio)
        .map(|((v, s), a)| Segment {
            id: v.id,
            interval: v.interval,
            window: None,
            visual_caption: v.caption,
            speech_caption: s.caption,
            audio_caption: a.caption,
            visual_caption_translated: None,
            speech_caption_translated: None,
        })
        .collect();

    Ok(segments)
}

fn check_interval(
    index: usize,
    modality: &'static str,
    expected: &Interval,
    found: &Interval,
) -> Result<(), AssemblyError> {
    if expected.same_bounds(found) {
        return Ok(());
    }
    Err(AssemblyError::IntervalMismatch {
        index,
        modality,
        expected_start: expected.start(),
        expected_end: expected.end(),
        found_start: found.start(),
        found_end: found.end(),
    })
}
