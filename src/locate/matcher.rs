//! Deterministic fuzzy matching between detection records and archive keys.
//!
//! Archive uploads drift from the dataset paths in small ways: extension
//! case, a re-encoded container, or a renamed file that still carries the
//! recording timestamp. The matcher tolerates exactly those drifts and
//! refuses to guess beyond them.

use crate::config::MatcherConfig;
use crate::error::{Error, Result};
use crate::index::DetectionRecord;

/// Pick the archive key for a record from a partition listing.
///
/// Same inputs always give the same answer: token matches win, ties break
/// on the lexicographically smallest key, and anything still ambiguous is
/// an error rather than a guess.
pub(crate) fn best_match(
    config: &MatcherConfig,
    record: &DetectionRecord,
    expected_key: &str,
    listing: &[String],
) -> Result<String> {
    let expected_stem = normalize(filename(expected_key), config);

    let mut plausible: Vec<&String> = listing
        .iter()
        .filter(|key| {
            let stem = normalize(filename(key), config);
            stem.contains(&expected_stem) || expected_stem.contains(&stem)
        })
        .collect();
    plausible.sort();

    let token = fold_case(
        &record
            .recording_timestamp
            .format(&config.timestamp_token)
            .to_string(),
        config,
    );
    let with_token: Vec<&&String> = plausible
        .iter()
        .filter(|key| fold_case(filename(key), config).contains(&token))
        .collect();

    if let Some(key) = with_token.first() {
        return Ok((***key).clone());
    }

    match plausible.as_slice() {
        [] => Err(Error::AudioNotFound {
            detection_id: record.detection_id(),
            expected_key: expected_key.to_string(),
        }),
        [only] => Ok((*only).clone()),
        several => Err(Error::AmbiguousResolution {
            detection_id: record.detection_id(),
            candidates: several.iter().map(|k| (*k).clone()).collect(),
        }),
    }
}

fn filename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn fold_case(value: &str, config: &MatcherConfig) -> String {
    if config.case_insensitive {
        value.to_ascii_lowercase()
    } else {
        value.to_string()
    }
}

fn normalize(name: &str, config: &MatcherConfig) -> String {
    let stem = if config.ignore_extension {
        name.rsplit_once('.').map_or(name, |(stem, _)| stem)
    } else {
        name
    };
    fold_case(stem, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(path: &str) -> DetectionRecord {
        DetectionRecord {
            site_id: "site_a".to_string(),
            recording_timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .and_then(|d| d.and_hms_opt(5, 15, 0))
                .unwrap(),
            species_label: "Turdus merula".to_string(),
            model_confidence: 0.9,
            source_relative_path: path.to_string(),
            offset_seconds: 12.0,
        }
    }

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn extension_case_drift_resolves() {
        let r = record("site_a/rec_20240601T051500.wav");
        let listing = keys(&["audio/site_a/rec_20240601T051500.WAV"]);
        let key = best_match(
            &MatcherConfig::default(),
            &r,
            "audio/site_a/rec_20240601T051500.wav",
            &listing,
        )
        .unwrap();
        assert_eq!(key, "audio/site_a/rec_20240601T051500.WAV");
    }

    #[test]
    fn reencoded_container_resolves() {
        let r = record("site_a/rec_20240601T051500.wav");
        let listing = keys(&[
            "audio/site_a/rec_20240601T051500.flac",
            "audio/site_a/rec_20240601T061500.flac",
        ]);
        let key = best_match(
            &MatcherConfig::default(),
            &r,
            "audio/site_a/rec_20240601T051500.wav",
            &listing,
        )
        .unwrap();
        assert_eq!(key, "audio/site_a/rec_20240601T051500.flac");
    }

    #[test]
    fn timestamp_token_disambiguates_renames() {
        let r = record("site_a/rec.wav");
        // Both are plausible stems for "rec"; only one carries the token.
        let listing = keys(&[
            "audio/site_a/rec_20240601T051500_part2.wav",
            "audio/site_a/rec_backup.wav",
        ]);
        let key = best_match(&MatcherConfig::default(), &r, "audio/site_a/rec.wav", &listing)
            .unwrap();
        assert_eq!(key, "audio/site_a/rec_20240601T051500_part2.wav");
    }

    #[test]
    fn token_ties_break_lexicographically() {
        let r = record("site_a/rec.wav");
        let listing = keys(&[
            "audio/site_a/rec_20240601T051500_b.wav",
            "audio/site_a/rec_20240601T051500_a.wav",
        ]);
        let key = best_match(&MatcherConfig::default(), &r, "audio/site_a/rec.wav", &listing)
            .unwrap();
        assert_eq!(key, "audio/site_a/rec_20240601T051500_a.wav");
    }

    #[test]
    fn no_candidate_is_audio_not_found() {
        let r = record("site_a/rec_20240601T051500.wav");
        let listing = keys(&["audio/site_a/unrelated_20240705T090000.wav"]);
        let result = best_match(
            &MatcherConfig::default(),
            &r,
            "audio/site_a/rec_20240601T051500.wav",
            &listing,
        );
        assert!(matches!(result, Err(Error::AudioNotFound { .. })));
    }

    #[test]
    fn multiple_tokenless_candidates_are_ambiguous() {
        let r = record("site_a/rec.wav");
        let listing = keys(&["audio/site_a/rec_a.wav", "audio/site_a/rec_b.wav"]);
        let result = best_match(&MatcherConfig::default(), &r, "audio/site_a/rec.wav", &listing);
        match result {
            Err(Error::AmbiguousResolution { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }
}
