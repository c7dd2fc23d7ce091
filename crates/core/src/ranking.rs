//! Tiered overlap ranking across the visual, speech and metadata sources.
//!
//! No score is involved: an id's position depends only on which sources
//! agree on it. Within a tier, ids follow the discovery order of the source
//! whose entries are emitted (visual before speech when both hold the id).

use std::collections::HashSet;

use crate::{
    normalize::{NormalizedSource, SourceEntry},
    types::RankedEntry,
};

/// Unmatched metadata records appended after the speech/metadata overlap.
pub const META_BACKFILL_LIMIT: usize = 30;

/// Which of the three sources produced anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCoverage {
    All,
    VisualMeta,
    SpeechMeta,
    VisualSpeech,
    VisualOnly,
    SpeechOnly,
    MetaOnly,
    Nothing,
}

impl SourceCoverage {
    pub fn of(visual: &NormalizedSource, speech: &NormalizedSource, meta: &NormalizedSource) -> Self {
        match (!visual.is_empty(), !speech.is_empty(), !meta.is_empty()) {
            (true, true, true) => SourceCoverage::All,
            (true, false, true) => SourceCoverage::VisualMeta,
            (false, true, true) => SourceCoverage::SpeechMeta,
            (true, true, false) => SourceCoverage::VisualSpeech,
            (true, false, false) => SourceCoverage::VisualOnly,
            (false, true, false) => SourceCoverage::SpeechOnly,
            (false, false, true) => SourceCoverage::MetaOnly,
            (false, false, false) => SourceCoverage::Nothing,
        }
    }
}

/// Accumulates ranked output while guaranteeing a canonical id lands in at
/// most one tier.
#[derive(Default)]
struct TierWriter {
    emitted: HashSet<String>,
    out: Vec<RankedEntry>,
}

impl TierWriter {
    fn is_emitted(&self, canonical_id: &str) -> bool {
        self.emitted.contains(canonical_id)
    }

    /// Emit every entry `source` holds for `canonical_id`.
    fn emit_group(&mut self, source: &NormalizedSource, canonical_id: &str) {
        if !self.emitted.insert(canonical_id.to_string()) {
            return;
        }
        self.out.extend(source.entries_for(canonical_id).map(ranked));
    }

    /// Emit a single entry under its canonical id.
    fn emit_entry(&mut self, entry: &SourceEntry) {
        if self.emitted.insert(entry.canonical_id.clone()) {
            self.out.push(ranked(entry));
        }
    }

    fn finish(self) -> Vec<RankedEntry> {
        self.out
    }
}

fn ranked(entry: &SourceEntry) -> RankedEntry {
    RankedEntry {
        video_id: entry.original_id.clone(),
        metadata: entry.metadata.clone(),
    }
}

/// Merge the three normalized sources into one ordered answer.
pub fn rank(
    visual: &NormalizedSource,
    speech: &NormalizedSource,
    meta: &NormalizedSource,
) -> Vec<RankedEntry> {
    let coverage = SourceCoverage::of(visual, speech, meta);
    tracing::debug!(
        ?coverage,
        visual = visual.len(),
        speech = speech.len(),
        meta = meta.len(),
        "ranking search sources"
    );

    let mut writer = TierWriter::default();

    match coverage {
        SourceCoverage::All => {
            // Tier 1: all three agree.
            for id in visual.canonical_ids() {
                if speech.contains(id) && meta.contains(id) {
                    writer.emit_group(visual, id);
                }
            }
            // Tier 2: visual plus one other source.
            for id in visual.canonical_ids() {
                if !writer.is_emitted(id) && (meta.contains(id) || speech.contains(id)) {
                    writer.emit_group(visual, id);
                }
            }
            // Tier 3: speech and metadata without visual.
            for id in speech.canonical_ids() {
                if !writer.is_emitted(id) && meta.contains(id) {
                    writer.emit_group(speech, id);
                }
            }
            // Tier 4: metadata leftovers, one record per id.
            for id in meta.canonical_ids() {
                if let Some(entry) = meta.lookup(id) {
                    writer.emit_entry(entry);
                }
            }
        }
        SourceCoverage::VisualMeta => emit_overlap(&mut writer, visual, meta),
        SourceCoverage::VisualSpeech => emit_overlap(&mut writer, visual, speech),
        SourceCoverage::SpeechMeta => {
            emit_overlap(&mut writer, speech, meta);
            let backfill = meta
                .entries()
                .iter()
                .filter(|entry| !writer.is_emitted(&entry.canonical_id))
                .take(META_BACKFILL_LIMIT)
                .map(ranked)
                .collect::<Vec<_>>();
            writer.out.extend(backfill);
        }
        SourceCoverage::VisualOnly => writer.out.extend(visual.entries().iter().map(ranked)),
        SourceCoverage::SpeechOnly => writer.out.extend(speech.entries().iter().map(ranked)),
        // Only the first metadata record is returned when no vector source
        // matched anything.
        SourceCoverage::MetaOnly => writer.out.extend(meta.entries().first().map(ranked)),
        SourceCoverage::Nothing => {}
    }

    writer.finish()
}

/// Emit `primary`'s entries for every id `other` also holds.
fn emit_overlap(writer: &mut TierWriter, primary: &NormalizedSource, other: &NormalizedSource) {
    for id in primary.canonical_ids() {
        if other.contains(id) {
            writer.emit_group(primary, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::normalize::{RawResultSet, normalize};

    fn vector_source(ids: &[&str]) -> NormalizedSource {
        let metadatas: Vec<Value> = ids.iter().map(|id| json!({"from": id})).collect();
        let raw = RawResultSet::batched_from_value(
            "vector",
            json!({"ids": [ids], "metadatas": [metadatas]}),
        )
        .expect("parses");
        normalize("vector", raw).expect("normalizes")
    }

    fn meta_source(ids: &[&str]) -> NormalizedSource {
        let records: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "title": format!("title {id}")}))
            .collect();
        let raw = RawResultSet::flat_from_value("metadata", Value::Array(records)).expect("parses");
        normalize("metadata", raw).expect("normalizes")
    }

    fn ids(entries: &[RankedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.video_id.as_str()).collect()
    }

    #[test]
    fn nothing_in_nothing_out() {
        let empty = NormalizedSource::default();
        assert_eq!(rank(&empty, &empty, &empty), Vec::<RankedEntry>::new());
    }

    #[test]
    fn visual_only_returns_every_entry_in_lookup_order() {
        let visual = vector_source(&["a_0", "b_0"]);
        let empty = NormalizedSource::default();

        let out = rank(&visual, &empty, &empty);
        assert_eq!(ids(&out), vec!["a_0", "b_0"]);
        assert_eq!(out[0].metadata, json!({"from": "a_0"}));
    }

    #[test]
    fn speech_only_returns_every_entry() {
        let speech = vector_source(&["s_0", "s_1", "t_0"]);
        let empty = NormalizedSource::default();

        assert_eq!(ids(&rank(&empty, &speech, &empty)), vec!["s_0", "s_1", "t_0"]);
    }

    #[test]
    fn meta_only_returns_exactly_the_first_record() {
        let meta = meta_source(&["M1", "M2"]);
        let empty = NormalizedSource::default();

        let out = rank(&empty, &empty, &meta);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].video_id, "M1");
        assert_eq!(out[0].metadata, json!({"id": "M1", "title": "title M1"}));
    }

    #[test]
    fn all_sources_end_to_end_tiers() {
        let visual = vector_source(&["X_0", "X_1"]);
        let speech = vector_source(&["X_0", "Y_0"]);
        let meta = meta_source(&["X", "Z"]);

        let out = rank(&visual, &speech, &meta);
        assert_eq!(ids(&out), vec!["X_0", "X_1", "Z"]);
    }

    #[test]
    fn triple_precedes_pairwise_precedes_leftovers() {
        // A: all three. B: visual+meta. C: visual+speech. D: speech+meta.
        // E: meta only. F: visual only. G: speech only.
        let visual = vector_source(&["F_0", "C_0", "B_0", "A_0"]);
        let speech = vector_source(&["G_0", "D_0", "C_1", "A_3"]);
        let meta = meta_source(&["E", "D", "B", "A"]);

        let out = rank(&visual, &speech, &meta);
        assert_eq!(ids(&out), vec!["A_0", "C_0", "B_0", "D_0", "E"]);
    }

    #[test]
    fn ids_never_repeat_across_tiers() {
        let visual = vector_source(&["A_0", "B_0"]);
        let speech = vector_source(&["A_1", "B_1"]);
        let meta = meta_source(&["A", "B", "A"]);

        let out = rank(&visual, &speech, &meta);
        assert_eq!(ids(&out), vec!["A_0", "B_0"]);
    }

    #[test]
    fn visual_meta_keeps_only_the_overlap() {
        let visual = vector_source(&["A_0", "B_0", "C_0"]);
        let meta = meta_source(&["C", "A", "Q"]);
        let empty = NormalizedSource::default();

        assert_eq!(ids(&rank(&visual, &empty, &meta)), vec!["A_0", "C_0"]);
    }

    #[test]
    fn visual_speech_keeps_only_the_overlap_with_visual_metadata() {
        let visual = vector_source(&["A_0", "B_0"]);
        let speech = vector_source(&["B_4", "Q_0"]);
        let empty = NormalizedSource::default();

        let out = rank(&visual, &speech, &empty);
        assert_eq!(ids(&out), vec!["B_0"]);
        assert_eq!(out[0].metadata, json!({"from": "B_0"}));
    }

    #[test]
    fn speech_meta_backfills_up_to_limit() {
        let speech = vector_source(&["K_0"]);
        let meta_ids: Vec<String> = std::iter::once("K".to_string())
            .chain((0..40).map(|n| format!("M{n}")))
            .collect();
        let meta_refs: Vec<&str> = meta_ids.iter().map(String::as_str).collect();
        let meta = meta_source(&meta_refs);
        let empty = NormalizedSource::default();

        let out = rank(&empty, &speech, &meta);
        assert_eq!(out.len(), 1 + META_BACKFILL_LIMIT);
        assert_eq!(out[0].video_id, "K_0");
        assert_eq!(out[1].video_id, "M0");
        assert_eq!(out[META_BACKFILL_LIMIT].video_id, "M29");
    }

    #[test]
    fn unknown_canonical_ids_still_participate() {
        let raw = RawResultSet::batched_from_value(
            "visual",
            json!({"ids": [[null, "A_0"]], "metadatas": [[{"n": 0}, {"n": 1}]]}),
        )
        .expect("parses");
        let visual = normalize("visual", raw).expect("normalizes");
        let empty = NormalizedSource::default();

        let out = rank(&visual, &empty, &empty);
        assert_eq!(ids(&out), vec!["null", "A_0"]);
    }
}
