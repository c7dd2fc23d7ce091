use crate::{
    interval::Interval,
    types::{RankedEntry, Segment},
};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

pub fn format_interval(interval: &Interval) -> String {
    format!(
        "{}–{}",
        format_timestamp(interval.start()),
        format_timestamp(interval.end())
    )
}

/// Format processed segments with their time ranges and captions
pub fn format_segments_readable(segments: &[Segment]) -> String {
    let mut output = String::new();

    for segment in segments {
        output.push_str(&format!(
            "### [{}] {}\n\n",
            format_interval(&segment.interval),
            segment.id
        ));

        let captions = [
            ("Visual", &segment.visual_caption, &segment.visual_caption_translated),
            ("Speech", &segment.speech_caption, &segment.speech_caption_translated),
            ("Audio", &segment.audio_caption, &None),
        ];
        for (label, caption, translated) in captions {
            let Some(caption) = caption else { continue };
            output.push_str(&format!("**{}:** {}\n", label, caption.trim()));
            if let Some(translated) = translated {
                output.push_str(&format!("  ↳ {}\n", translated.trim()));
            }
        }
        output.push('\n');
    }

    output
}

/// One line per ranked result: position, id and a title or caption if the
/// metadata carries one.
pub fn format_results_readable(results: &[RankedEntry]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(rank, entry)| {
            let label = ["title", "captions"]
                .iter()
                .find_map(|key| entry.metadata.get(*key).and_then(|v| v.as_str()));
            match label {
                Some(label) => format!("{:>3}. {}  {}", rank + 1, entry.video_id, label.trim()),
                None => format!("{:>3}. {}", rank + 1, entry.video_id),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
