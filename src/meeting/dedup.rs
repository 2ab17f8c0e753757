//! Transcript deduplication.
//!
//! Speech-to-text produces overlapping and fragmentary entries: partial
//! utterances, re-sends of the same line, and re-assembled concatenations
//! of earlier lines. This module collapses them into a minimal ordered
//! transcript. The merge is heuristic and approximate; comparisons are
//! byte-exact (no case folding or punctuation stripping) and strictly
//! speaker-scoped.

use super::record::TranscriptEntry;

/// A shorter text is a fragment of a longer one when it is contained in it
/// and is under this fraction of the longer text's length.
const FRAGMENT_RATIO: f64 = 0.8;

/// Two texts are the same utterance when this fraction of either side's
/// sentences appears in the other side.
const SENTENCE_OVERLAP_RATIO: f64 = 0.7;

/// Sentences at or below this length are ignored by the overlap check.
const MIN_SENTENCE_CHARS: usize = 5;

/// Minimum number of prior same-speaker entries before the concatenation
/// guard applies.
const CONCAT_GUARD_MIN_ENTRIES: usize = 2;

/// Merge overlapping and fragmentary transcript entries into an ordered,
/// deduplicated list. Idempotent: running the merge on its own output
/// changes nothing.
pub fn dedup_transcripts(entries: &[TranscriptEntry]) -> Vec<TranscriptEntry> {
    let mut sorted: Vec<&TranscriptEntry> = entries
        .iter()
        .filter(|e| !e.text.trim().is_empty())
        .collect();
    sorted.sort_by_key(|e| e.timestamp);

    let mut merged: Vec<TranscriptEntry> = Vec::with_capacity(sorted.len());

    'candidates: for candidate in sorted {
        for i in 0..merged.len() {
            if merged[i].speaker != candidate.speaker {
                continue;
            }
            let existing = &merged[i];

            if existing.text == candidate.text {
                continue 'candidates;
            }

            // Fragment of an already-kept utterance.
            if existing.text.contains(&candidate.text)
                && (candidate.text.len() as f64) < FRAGMENT_RATIO * existing.text.len() as f64
            {
                continue 'candidates;
            }

            // The candidate supersedes a kept fragment; replace in place.
            if candidate.text.contains(&existing.text)
                && (existing.text.len() as f64) < FRAGMENT_RATIO * candidate.text.len() as f64
            {
                merged[i] = candidate.clone();
                continue 'candidates;
            }

            // Same utterance re-transcribed with small differences.
            if sentence_overlap(&existing.text, &candidate.text) {
                if candidate.text.len() > existing.text.len() {
                    merged[i] = candidate.clone();
                }
                continue 'candidates;
            }
        }

        if is_reassembled_duplicate(&merged, candidate) {
            continue 'candidates;
        }

        merged.push(candidate.clone());
    }

    merged
}

/// Whether a candidate is a re-assembly of several earlier entries from the
/// same speaker: its text starts with a prefix of those entries' texts
/// concatenated in accumulation order.
fn is_reassembled_duplicate(merged: &[TranscriptEntry], candidate: &TranscriptEntry) -> bool {
    let prior: Vec<&str> = merged
        .iter()
        .filter(|e| e.speaker == candidate.speaker)
        .map(|e| e.text.as_str())
        .collect();
    if prior.len() < CONCAT_GUARD_MIN_ENTRIES {
        return false;
    }

    let concat = prior.join(" ");
    let mut limit = concat
        .len()
        .min((FRAGMENT_RATIO * candidate.text.len() as f64) as usize);
    while limit > 0 && !concat.is_char_boundary(limit) {
        limit -= 1;
    }
    limit > 0 && candidate.text.contains(&concat[..limit])
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() > MIN_SENTENCE_CHARS)
        .collect()
}

fn sentence_overlap(a: &str, b: &str) -> bool {
    let sentences_a = split_sentences(a);
    let sentences_b = split_sentences(b);
    if sentences_a.is_empty() || sentences_b.is_empty() {
        return false;
    }

    let shared_fraction = |own: &[&str], other: &[&str]| {
        let shared = own
            .iter()
            .filter(|s| other.iter().any(|o| o.contains(**s) || s.contains(*o)))
            .count();
        shared as f64 / own.len() as f64
    };

    shared_fraction(&sentences_a, &sentences_b) >= SENTENCE_OVERLAP_RATIO
        || shared_fraction(&sentences_b, &sentences_a) >= SENTENCE_OVERLAP_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(speaker: &str, text: &str, offset_secs: i64) -> TranscriptEntry {
        TranscriptEntry {
            speaker: speaker.to_string(),
            text: text.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            confidence: None,
            participant_id: None,
        }
    }

    #[test]
    fn test_blank_entries_dropped() {
        let entries = vec![
            entry("Alice", "", 0),
            entry("Alice", "   ", 1),
            entry("Alice", "Hello there", 2),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Hello there");
    }

    #[test]
    fn test_sorted_by_timestamp() {
        let entries = vec![
            entry("Bob", "second point", 10),
            entry("Alice", "first point", 0),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged[0].speaker, "Alice");
        assert_eq!(merged[1].speaker, "Bob");
    }

    #[test]
    fn test_exact_duplicate_discarded() {
        let entries = vec![
            entry("Alice", "We ship on Friday", 0),
            entry("Alice", "We ship on Friday", 3),
        ];
        assert_eq!(dedup_transcripts(&entries).len(), 1);
    }

    #[test]
    fn test_fragment_merged_into_longer_entry() {
        // The example from the merge contract: a partial utterance followed
        // by the full one collapses to the single longer entry.
        let entries = vec![
            entry("Alice", "Hello every", 0),
            entry("Alice", "Hello everyone, let's start the meeting", 1),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Hello everyone, let's start the meeting");
    }

    #[test]
    fn test_later_fragment_discarded() {
        let entries = vec![
            entry("Alice", "Hello everyone, let's start the meeting", 0),
            entry("Alice", "Hello every", 1),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Hello everyone, let's start the meeting");
    }

    #[test]
    fn test_near_full_substring_caught_by_overlap_not_fragment_rule() {
        // Contained but above the fragment ratio, so the containment rules
        // pass; the sentence-overlap rule still collapses the pair and
        // keeps the longer text.
        let entries = vec![
            entry("Alice", "the quarterly numbers look good", 0),
            entry("Alice", "the quarterly numbers look good today", 1),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "the quarterly numbers look good today");
    }

    #[test]
    fn test_no_merge_across_speakers() {
        let entries = vec![
            entry("Alice", "Hello everyone, let's start the meeting", 0),
            entry("Bob", "Hello every", 1),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_sentence_overlap_keeps_longer_text() {
        let entries = vec![
            entry(
                "Alice",
                "We need to fix the login bug. The release slips otherwise.",
                0,
            ),
            entry(
                "Alice",
                "We need to fix the login bug. The release slips otherwise. I'll own it.",
                2,
            ),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].text.ends_with("I'll own it."));
    }

    #[test]
    fn test_concatenation_guard_discards_reassembly() {
        // The candidate is mostly the first two entries re-assembled in
        // order, with a short tail of noise. No per-entry rule matches
        // (no full containment, sentence overlap below threshold), so the
        // concatenation guard is what discards it.
        let entries = vec![
            entry(
                "Alice",
                "Alpha point number one. Beta point number two. Gamma point number three.",
                0,
            ),
            entry("Alice", "Delta point number four.", 5),
            entry(
                "Alice",
                "Alpha point number one. Beta point number two. Bye now",
                10,
            ),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 2);
        assert!(merged[1].text.starts_with("Delta"));
    }

    #[test]
    fn test_reassembly_containing_whole_entry_superseded_instead() {
        // A candidate that fully contains an earlier short entry hits the
        // supersede rule before the concat guard is ever consulted.
        let entries = vec![
            entry("Alice", "We reviewed the roadmap", 0),
            entry("Alice", "Budget approval is pending", 5),
            entry(
                "Alice",
                "We reviewed the roadmap Budget approval is pending and one more thing",
                10,
            ),
        ];
        let merged = dedup_transcripts(&entries);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].text.ends_with("one more thing"));
        assert_eq!(merged[1].text, "Budget approval is pending");
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let entries = vec![
            entry("Alice", "Hello every", 0),
            entry("Alice", "Hello everyone, let's start the meeting", 1),
            entry("Bob", "Morning all. Quick update from my side.", 2),
            entry("Bob", "Morning all", 3),
            entry("Alice", "Let's look at the metrics dashboard together", 4),
        ];
        let once = dedup_transcripts(&entries);
        let twice = dedup_transcripts(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_case_sensitive_comparisons() {
        // Normalization is intentionally unspecified upstream; we compare
        // byte-exact, so differing case survives as two entries.
        let entries = vec![
            entry("Alice", "hello everyone how are you", 0),
            entry("Alice", "Hello Everyone How Are You", 1),
        ];
        assert_eq!(dedup_transcripts(&entries).len(), 2);
    }
}
