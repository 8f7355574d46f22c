//! Similarity ranking of a probe embedding against stored candidates.
//!
//! No threshold is applied here; whether the best match is "good enough"
//! is the caller's policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Embedding, FaceRecord, MatchResult};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatchError {
    #[error("probe embedding is empty")]
    EmptyProbe,
    #[error("candidate set is empty")]
    NoCandidates,
}

/// A stored embedding with its opaque reference id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub embedding: Embedding,
}

/// Rank all candidates by cosine similarity to the probe, descending.
/// Tie order among equal similarities is unspecified. Candidates of a
/// different length than the probe produce a degenerate similarity and are
/// the caller's responsibility to filter upstream.
pub fn rank(probe: &Embedding, candidates: &[Candidate]) -> Result<Vec<MatchResult>, MatchError> {
    if probe.values.is_empty() {
        return Err(MatchError::EmptyProbe);
    }
    if candidates.is_empty() {
        return Err(MatchError::NoCandidates);
    }

    let mut results: Vec<MatchResult> = candidates
        .iter()
        .map(|c| MatchResult {
            reference_id: c.id.clone(),
            similarity: probe.similarity(&c.embedding),
        })
        .collect();

    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    Ok(results)
}

/// Pick the probe face out of a detection result: largest bounding-box
/// area wins, first in detection order on ties.
pub fn strongest_face(faces: &[FaceRecord]) -> Option<&FaceRecord> {
    faces
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.bbox.area().cmp(&b.bbox.area()).then(ib.cmp(ia)))
        .map(|(_, face)| face)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn candidate(id: &str, values: Vec<f32>) -> Candidate {
        Candidate {
            id: id.to_string(),
            embedding: Embedding::new(values),
        }
    }

    fn face(x: i32, width: i32, height: i32, confidence: f32) -> FaceRecord {
        FaceRecord {
            bbox: BoundingBox { x, y: 0, width, height },
            confidence,
            embedding: Embedding::new(vec![1.0]),
            landmarks: None,
            age: None,
            gender: None,
        }
    }

    #[test]
    fn test_identical_probe_and_candidate() {
        let probe = Embedding::new(vec![0.5, 0.5, 0.0]);
        let results = rank(&probe, &[candidate("a", vec![0.5, 0.5, 0.0])]).unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_unit_vectors() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let results = rank(&probe, &[candidate("a", vec![0.0, 1.0])]).unwrap();
        assert!(results[0].similarity.abs() < 1e-6);
    }

    #[test]
    fn test_empty_probe_rejected() {
        let probe = Embedding::new(vec![]);
        let err = rank(&probe, &[candidate("a", vec![1.0])]).unwrap_err();
        assert_eq!(err, MatchError::EmptyProbe);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let probe = Embedding::new(vec![1.0]);
        assert_eq!(rank(&probe, &[]).unwrap_err(), MatchError::NoCandidates);
    }

    #[test]
    fn test_sorted_descending_regardless_of_input_order() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let a = candidate("best", vec![1.0, 0.0]);
        let b = candidate("mid", vec![1.0, 1.0]);
        let c = candidate("worst", vec![-1.0, 0.0]);

        for perm in [
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), a.clone(), b.clone()],
            vec![b.clone(), c.clone(), a.clone()],
        ] {
            let results = rank(&probe, &perm).unwrap();
            let ids: Vec<&str> = results.iter().map(|r| r.reference_id.as_str()).collect();
            assert_eq!(ids, vec!["best", "mid", "worst"]);
            assert!(results
                .windows(2)
                .all(|w| w[0].similarity >= w[1].similarity));
        }
    }

    #[test]
    fn test_no_threshold_applied() {
        // Even strongly negative similarities are reported, not filtered.
        let probe = Embedding::new(vec![1.0, 0.0]);
        let results = rank(&probe, &[candidate("a", vec![-1.0, 0.0])]).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].similarity < -0.9);
    }

    #[test]
    fn test_strongest_face_by_area() {
        let faces = vec![face(0, 60, 60, 0.99), face(100, 120, 110, 0.70)];
        let strongest = strongest_face(&faces).unwrap();
        assert_eq!(strongest.bbox.x, 100);
    }

    #[test]
    fn test_strongest_face_tie_prefers_first() {
        let faces = vec![face(0, 80, 80, 0.5), face(200, 80, 80, 0.9)];
        let strongest = strongest_face(&faces).unwrap();
        assert_eq!(strongest.bbox.x, 0);
    }

    #[test]
    fn test_strongest_face_empty() {
        assert!(strongest_face(&[]).is_none());
    }
}
