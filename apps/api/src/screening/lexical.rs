//! Lexical (hard-skill) matching of job skills against resume text.
//!
//! A skill counts as present when it is a substring of the resume or its
//! partial-similarity ratio against the resume exceeds `FUZZY_THRESHOLD`.
//! Similarity is the Indel (LCS) ratio `2 * lcs / (len_a + len_b)`, taken
//! over every alignment of the shorter string against the longer one,
//! including the partial overlaps at either edge.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::screening::{round2, NEUTRAL_SCORE};

/// Partial ratio (0–100) a skill must exceed to count as a fuzzy hit.
pub const FUZZY_THRESHOLD: f64 = 75.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexicalMatch {
    /// 0 – 100, two decimals.
    pub score: f64,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

/// Scores `job_skills` against `resume_text`.
///
/// An empty skill list yields the neutral score with nothing missing.
/// CPU-bound on long resumes; call from `spawn_blocking` on the request path.
pub fn score(job_skills: &[String], resume_text: &str) -> LexicalMatch {
    if job_skills.is_empty() {
        return LexicalMatch {
            score: NEUTRAL_SCORE,
            present: vec![],
            missing: vec![],
        };
    }

    let resume = resume_text.to_lowercase();
    let resume_chars: Vec<char> = resume.chars().collect();
    let mut present = Vec::new();
    let mut missing = Vec::new();

    for skill in job_skills {
        if skill_present(skill, &resume, &resume_chars) {
            present.push(skill.clone());
        } else {
            missing.push(skill.clone());
        }
    }

    let score = present.len() as f64 / job_skills.len() as f64 * 100.0;
    LexicalMatch {
        score: round2(score),
        present,
        missing,
    }
}

/// `resume` must already be lowercase. A blank skill is malformed and never present.
fn skill_present(skill: &str, resume: &str, resume_chars: &[char]) -> bool {
    let skill = skill.trim().to_lowercase();
    if skill.is_empty() {
        return false;
    }
    if resume.contains(&skill) {
        return true;
    }
    let skill_chars: Vec<char> = skill.chars().collect();
    partial_ratio_chars(&skill_chars, resume_chars) > FUZZY_THRESHOLD
}

/// Best Indel similarity (0–100) of the shorter string against any
/// alignment with the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    partial_ratio_chars(&a, &b)
}

fn partial_ratio_chars(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.len() < b.len() {
        return aligned_ratio(a, b);
    }
    if b.len() < a.len() {
        return aligned_ratio(b, a);
    }
    let forward = aligned_ratio(a, b);
    if forward >= 100.0 {
        forward
    } else {
        forward.max(aligned_ratio(b, a))
    }
}

/// Slides `needle` across `haystack` (`needle.len() <= haystack.len()`):
/// growing prefixes, full-width windows, then shrinking suffixes. A window
/// whose boundary character is absent from `needle` cannot beat its
/// neighbour and is skipped.
fn aligned_ratio(needle: &[char], haystack: &[char]) -> f64 {
    let n = needle.len();
    let lcs = LcsMatcher::new(needle);
    let needle_chars: HashSet<char> = needle.iter().copied().collect();
    let in_needle = &needle_chars;
    let ratio = |window: &[char]| indel_ratio(n, window.len(), lcs.lcs_len(window));

    let prefixes = (1..n)
        .filter(move |&end| in_needle.contains(&haystack[end - 1]))
        .map(move |end| &haystack[..end]);
    let full = (0..=haystack.len() - n)
        .filter(move |&start| in_needle.contains(&haystack[start + n - 1]))
        .map(move |start| &haystack[start..start + n]);
    let suffixes = (haystack.len() - n + 1..haystack.len())
        .filter(move |&start| in_needle.contains(&haystack[start]))
        .map(move |start| &haystack[start..]);

    let mut best = 0.0_f64;
    for window in prefixes.chain(full).chain(suffixes) {
        best = best.max(ratio(window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn indel_ratio(len_a: usize, len_b: usize, lcs: usize) -> f64 {
    let total = len_a + len_b;
    if total == 0 {
        return 100.0;
    }
    (2 * lcs) as f64 / total as f64 * 100.0
}

/// Longest-common-subsequence length against a fixed pattern. Patterns of
/// up to 64 chars use the bit-parallel recurrence (one word op per text
/// char); longer ones fall back to a two-row table.
struct LcsMatcher<'a> {
    pattern: &'a [char],
    ascii: [u64; 128],
    other: HashMap<char, u64>,
}

impl<'a> LcsMatcher<'a> {
    fn new(pattern: &'a [char]) -> Self {
        let mut ascii = [0u64; 128];
        let mut other = HashMap::new();
        if pattern.len() <= 64 {
            for (i, &c) in pattern.iter().enumerate() {
                let bit = 1u64 << i;
                if (c as u32) < 128 {
                    ascii[c as usize] |= bit;
                } else {
                    *other.entry(c).or_insert(0) |= bit;
                }
            }
        }
        Self {
            pattern,
            ascii,
            other,
        }
    }

    fn mask(&self, c: char) -> u64 {
        if (c as u32) < 128 {
            self.ascii[c as usize]
        } else {
            self.other.get(&c).copied().unwrap_or(0)
        }
    }

    fn lcs_len(&self, text: &[char]) -> usize {
        let m = self.pattern.len();
        if m > 64 {
            return lcs_table(self.pattern, text);
        }
        let mut s = u64::MAX;
        for &c in text {
            let u = s & self.mask(c);
            s = s.wrapping_add(u) | s.wrapping_sub(u);
        }
        let live = if m == 64 { u64::MAX } else { (1u64 << m) - 1 };
        (!s & live).count_ones() as usize
    }
}

fn lcs_table(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
