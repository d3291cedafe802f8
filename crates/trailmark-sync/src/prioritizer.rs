//! File transfer prioritizer
//!
//! Bulk file transfer is bandwidth- and time-bounded, so pending binary
//! payloads are ordered by a heuristic that front-loads cheap, fresh,
//! user-visible content. Scoring is a pure, monotonic combination of three
//! independent weighted factors:
//!
//! 1. **Type weight** - media files over GPS tracks over anything else
//! 2. **Size weight** - smaller files score higher (quick wins, fast drain)
//! 3. **Recency weight** - created within the last day highest, within the
//!    last week moderate, older nothing
//!
//! Candidates are ephemeral and recomputed per scheduling pass.

use chrono::{DateTime, Duration, Utc};

use trailmark_core::domain::{EntityType, FileSyncCandidate};

// Type weights
const WEIGHT_MEDIA: i64 = 100;
const WEIGHT_TRACK: i64 = 75;
const WEIGHT_GENERIC: i64 = 50;

// Size weights (smaller is better)
const SIZE_SMALL_BYTES: u64 = 1024 * 1024; // 1 MiB
const SIZE_MEDIUM_BYTES: u64 = 10 * 1024 * 1024; // 10 MiB
const SIZE_LARGE_BYTES: u64 = 50 * 1024 * 1024; // 50 MiB
const WEIGHT_SIZE_SMALL: i64 = 50;
const WEIGHT_SIZE_MEDIUM: i64 = 30;
const WEIGHT_SIZE_LARGE: i64 = 15;
const WEIGHT_SIZE_HUGE: i64 = 5;
const WEIGHT_SIZE_UNKNOWN: i64 = 10;

// Recency weights
const WEIGHT_FRESH: i64 = 50; // created within the last day
const WEIGHT_RECENT: i64 = 25; // within the last week

// Category thresholds
const THRESHOLD_HIGH: i64 = 150;
const THRESHOLD_MEDIUM: i64 = 100;

/// Urgency bucket for a scored candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransferCategory {
    High,
    Medium,
    Low,
}

/// Scores one transfer candidate (higher = transferred sooner)
pub fn score(
    entity_type: EntityType,
    file_size_bytes: Option<u64>,
    created_at: Option<DateTime<Utc>>,
) -> i64 {
    type_weight(entity_type) + size_weight(file_size_bytes) + recency_weight(created_at)
}

fn type_weight(entity_type: EntityType) -> i64 {
    match entity_type {
        EntityType::MediaItem => WEIGHT_MEDIA,
        EntityType::Track => WEIGHT_TRACK,
        _ => WEIGHT_GENERIC,
    }
}

fn size_weight(file_size_bytes: Option<u64>) -> i64 {
    match file_size_bytes {
        Some(size) if size < SIZE_SMALL_BYTES => WEIGHT_SIZE_SMALL,
        Some(size) if size < SIZE_MEDIUM_BYTES => WEIGHT_SIZE_MEDIUM,
        Some(size) if size < SIZE_LARGE_BYTES => WEIGHT_SIZE_LARGE,
        Some(_) => WEIGHT_SIZE_HUGE,
        None => WEIGHT_SIZE_UNKNOWN,
    }
}

fn recency_weight(created_at: Option<DateTime<Utc>>) -> i64 {
    let Some(created) = created_at else {
        return 0;
    };
    let age = Utc::now().signed_duration_since(created);
    if age <= Duration::days(1) {
        WEIGHT_FRESH
    } else if age <= Duration::days(7) {
        WEIGHT_RECENT
    } else {
        0
    }
}

/// Scores and sorts candidates, highest score first
///
/// The sort is stable, so candidates with equal scores keep their input
/// order.
pub fn prioritize(mut candidates: Vec<FileSyncCandidate>) -> Vec<FileSyncCandidate> {
    for candidate in &mut candidates {
        candidate.score = score(
            candidate.entity_type,
            candidate.file_size_bytes,
            candidate.created_at,
        );
    }
    candidates.sort_by_key(|c| std::cmp::Reverse(c.score));
    candidates
}

/// Buckets scored candidates into urgency categories by fixed thresholds
pub fn group_by_category(
    candidates: Vec<FileSyncCandidate>,
) -> std::collections::HashMap<TransferCategory, Vec<FileSyncCandidate>> {
    let mut groups: std::collections::HashMap<TransferCategory, Vec<FileSyncCandidate>> =
        std::collections::HashMap::new();
    for candidate in prioritize(candidates) {
        let category = if candidate.score >= THRESHOLD_HIGH {
            TransferCategory::High
        } else if candidate.score >= THRESHOLD_MEDIUM {
            TransferCategory::Medium
        } else {
            TransferCategory::Low
        };
        groups.entry(category).or_default().push(candidate);
    }
    groups
}
