//! Version comparators.
//!
//! Each ecosystem orders versions its own way: npm sorts with a
//! numeric-aware collation, PyPI follows PEP 440, Maven follows the
//! Maven version comparator. Unparseable versions fall back to the
//! numeric-aware collation so ordering stays total and deterministic.

use std::cmp::Ordering;

/// Numeric-aware, case-insensitive collation.
///
/// Runs of digits compare as numbers, everything else compares as
/// lowercase text, so `1.9.0 < 1.10.0` and `2.0.0-beta < 2.0.0-rc`.
pub fn numeric_lexical_cmp(a: &str, b: &str) -> Ordering {
    let mut left = segments(a);
    let mut right = segments(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Segment::Number(n), Segment::Number(m)) => n.cmp(&m),
                    (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
                    (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
                    (Segment::Text(s), Segment::Text(t)) => s.cmp(&t),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Text(String),
}

fn segments(input: &str) -> impl Iterator<Item = Segment> + '_ {
    let mut chars = input.chars().peekable();
    std::iter::from_fn(move || {
        let first = *chars.peek()?;
        if first.is_ascii_digit() {
            let mut n: u64 = 0;
            while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                n = n.saturating_mul(10).saturating_add(c as u64 - '0' as u64);
                chars.next();
            }
            Some(Segment::Number(n))
        } else {
            let mut text = String::new();
            while let Some(c) = chars.peek().copied().filter(|c| !c.is_ascii_digit()) {
                text.push(c.to_ascii_lowercase());
                chars.next();
            }
            Some(Segment::Text(text))
        }
    })
}

// ============================================================================
// PEP 440
// ============================================================================

/// Parsed PEP 440 version key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Pep440Key {
    epoch: u64,
    release: Vec<u64>,
    /// dev < pre(a/b/rc) < final < post, encoded so the derived ordering
    /// on the tuple matches PEP 440.
    phase: i8,
    pre_number: u64,
    post_number: u64,
    dev_number: u64,
}

const PHASE_DEV: i8 = -2;
const PHASE_PRE_A: i8 = -1;
// a/b/rc are distinguished through pre_number's pairing below
const PHASE_FINAL: i8 = 0;
const PHASE_POST: i8 = 1;

/// Compare two versions under PEP 440.
///
/// Handles epochs, release segments, pre-releases (`a`/`b`/`rc` with the
/// usual aliases), post-releases and dev-releases; local version labels
/// are ignored. Returns `None` when either side does not parse.
pub fn pep440_cmp(a: &str, b: &str) -> Option<Ordering> {
    let left = parse_pep440(a)?;
    let right = parse_pep440(b)?;
    Some(left.cmp(&right))
}

fn parse_pep440(input: &str) -> Option<Pep440Key> {
    let lower = input.trim().to_ascii_lowercase();
    let lower = lower.strip_prefix('v').unwrap_or(&lower);
    // local version label is not ordering-relevant here
    let lower = lower.split('+').next()?;

    let (epoch, rest) = match lower.split_once('!') {
        Some((e, rest)) => (e.parse::<u64>().ok()?, rest),
        None => (0, lower),
    };

    let mut release: Vec<u64> = Vec::new();
    let mut phase = PHASE_FINAL;
    let mut pre_kind: u64 = 0;
    let mut pre_number: u64 = 0;
    let mut post_number: u64 = 0;
    let mut dev_number: u64 = 0;
    let mut has_dev = false;

    // spread digit/alpha boundaries so "1.0rc1" tokenizes like "1.0.rc.1"
    let mut spread = String::with_capacity(rest.len() + 4);
    let mut prev: Option<char> = None;
    for c in rest.chars() {
        if matches!(c, '-' | '_') {
            spread.push('.');
        } else {
            if let Some(p) = prev {
                if p.is_ascii_alphanumeric()
                    && c.is_ascii_alphanumeric()
                    && p.is_ascii_digit() != c.is_ascii_digit()
                {
                    spread.push('.');
                }
            }
            spread.push(c);
        }
        prev = Some(c);
    }

    let mut parts = spread.split('.').filter(|p| !p.is_empty()).peekable();

    while let Some(part) = parts.next() {
        if let Ok(n) = part.parse::<u64>() {
            if phase == PHASE_FINAL && pre_kind == 0 && !has_dev && post_number == 0 {
                release.push(n);
                continue;
            }
            return None;
        }

        // the qualifier's number, when present, is the next token
        let word = part;
        let number = parts
            .peek()
            .and_then(|p| p.parse::<u64>().ok())
            .map(|n| {
                parts.next();
                n
            })
            .unwrap_or(0);

        match word {
            "a" | "alpha" => {
                phase = PHASE_PRE_A;
                pre_kind = 1;
                pre_number = number;
            }
            "b" | "beta" => {
                phase = PHASE_PRE_A;
                pre_kind = 2;
                pre_number = number;
            }
            "rc" | "c" | "pre" | "preview" => {
                phase = PHASE_PRE_A;
                pre_kind = 3;
                pre_number = number;
            }
            "post" | "r" | "rev" => {
                post_number = number.saturating_add(1);
            }
            "dev" => {
                has_dev = true;
                dev_number = number;
            }
            _ => return None,
        }
    }

    if release.is_empty() {
        return None;
    }
    // trailing zeros are insignificant: 1.0 == 1.0.0
    while release.len() > 1 && release.last() == Some(&0) {
        release.pop();
    }

    // dev releases sort before any pre-release of the same release number
    let phase = if has_dev && phase == PHASE_FINAL && post_number == 0 {
        PHASE_DEV
    } else {
        phase
    };
    let phase = if post_number > 0 { PHASE_POST } else { phase };

    Some(Pep440Key {
        epoch,
        release,
        phase,
        pre_number: pre_kind * 1_000_000 + pre_number,
        post_number,
        dev_number: if has_dev { dev_number } else { u64::MAX },
    })
}

// ============================================================================
// Maven
// ============================================================================

/// Compare two versions the way Maven's `ComparableVersion` does, for the
/// orderings that occur in practice: dot/dash-separated numeric and
/// qualifier tokens, with the canonical qualifier ladder
/// `alpha < beta < milestone < rc < snapshot < (release) < sp`.
pub fn maven_cmp(a: &str, b: &str) -> Ordering {
    let left = maven_tokens(a);
    let right = maven_tokens(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let x = left.get(i).cloned().unwrap_or(MavenToken::Number(0));
        let y = right.get(i).cloned().unwrap_or(MavenToken::Number(0));
        let ord = x.cmp(&y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MavenToken {
    /// Qualifier rank below release; release itself is rank 5.
    Qualifier(u8, String),
    Number(u64),
}

impl Ord for MavenToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MavenToken::Number(n), MavenToken::Number(m)) => n.cmp(m),
            // any number (including 0 padding == release) beats a pre-release
            // qualifier and loses to sp
            (MavenToken::Number(_), MavenToken::Qualifier(rank, _)) => 5u8.cmp(rank),
            (MavenToken::Qualifier(rank, _), MavenToken::Number(_)) => rank.cmp(&5u8),
            (MavenToken::Qualifier(r1, q1), MavenToken::Qualifier(r2, q2)) => {
                r1.cmp(r2).then_with(|| q1.cmp(q2))
            }
        }
    }
}

impl PartialOrd for MavenToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn maven_tokens(input: &str) -> Vec<MavenToken> {
    let lower = input.trim().to_ascii_lowercase();
    let mut tokens = Vec::new();
    for run in lower.split(['.', '-']) {
        if run.is_empty() {
            continue;
        }
        // split letter/digit boundaries inside a run ("1alpha" -> 1, alpha)
        let mut current = String::new();
        let mut current_is_digit = run.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false);
        for c in run.chars() {
            if c.is_ascii_digit() != current_is_digit {
                push_maven_token(&mut tokens, &current, current_is_digit);
                current.clear();
                current_is_digit = c.is_ascii_digit();
            }
            current.push(c);
        }
        push_maven_token(&mut tokens, &current, current_is_digit);
    }
    tokens
}

fn push_maven_token(tokens: &mut Vec<MavenToken>, run: &str, is_digit: bool) {
    if run.is_empty() {
        return;
    }
    if is_digit {
        tokens.push(MavenToken::Number(run.parse().unwrap_or(u64::MAX)));
        return;
    }
    let rank = match run {
        "alpha" | "a" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "ga" | "final" | "release" => 5,
        "sp" => 6,
        _ => 7, // unknown qualifiers sort after sp, alphabetically
    };
    tokens.push(MavenToken::Qualifier(rank, run.to_string()));
}
