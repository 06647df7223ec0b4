use crate::models::{Severity, Vulnerability};

const MAX_SCORE: i64 = 100;
const MISSING_HEADER_PENALTY: i64 = 5;

/// 100, minus 5 per missing header, minus each finding's severity penalty,
/// clamped to [0, 100]. Order of `vulnerabilities` does not matter.
pub fn score(missing_header_count: usize, vulnerabilities: &[Vulnerability]) -> u8 {
    score_severities(missing_header_count, vulnerabilities.iter().map(|v| v.severity))
}

pub fn score_severities<I>(missing_header_count: usize, severities: I) -> u8
where
    I: IntoIterator<Item = Severity>,
{
    let header_penalty = i64::try_from(missing_header_count)
        .unwrap_or(i64::MAX)
        .saturating_mul(MISSING_HEADER_PENALTY);
    let finding_penalty = severities
        .into_iter()
        .fold(0i64, |acc, s| acc.saturating_add(s.penalty() as i64));

    MAX_SCORE
        .saturating_sub(header_penalty)
        .saturating_sub(finding_penalty)
        .clamp(0, MAX_SCORE) as u8
}
