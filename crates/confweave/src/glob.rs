//! Shell-style wildcard matching on whole relative paths.
//!
//! `*` matches any run of characters (path separators included) and `?`
//! matches exactly one character. Everything else is literal. The matcher is
//! anchored at both ends and never translates the pattern into a regex.

/// Returns whether `candidate` matches `pattern`.
pub fn matches(pattern: &str, candidate: &str, case_sensitive: bool) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    let same = |p: char, c: char| p == '?' || chars_equal(p, c, case_sensitive);

    if !pattern.contains(&'*') {
        return pattern.len() == candidate.len()
            && pattern.iter().zip(&candidate).all(|(&p, &c)| same(p, c));
    }

    let mut pat = &pattern[..];
    let mut text = &candidate[..];

    // Literal prefix up to the first star.
    while let (Some(&p), Some(&c)) = (pat.first(), text.first()) {
        if p == '*' {
            break;
        }
        if !same(p, c) {
            return false;
        }
        pat = &pat[1..];
        text = &text[1..];
    }
    if text.is_empty() {
        return only_stars(pat);
    }

    // Literal suffix after the last star.
    while let (Some(&p), Some(&c)) = (pat.last(), text.last()) {
        if p == '*' {
            break;
        }
        if !same(p, c) {
            return false;
        }
        pat = &pat[..pat.len() - 1];
        text = &text[..text.len() - 1];
    }
    if text.is_empty() {
        return only_stars(pat);
    }

    // `pat` now starts and ends with a star. Find each segment between two
    // stars, leftmost first.
    while pat.len() > 1 && !text.is_empty() {
        let next_star = match pat[1..].iter().position(|&c| c == '*') {
            Some(offset) => offset + 1,
            None => break,
        };
        if next_star == 1 {
            pat = &pat[1..];
            continue;
        }

        let segment = &pat[1..next_star];
        if segment.len() > text.len() {
            return false;
        }
        let found = (0..=text.len() - segment.len()).find(|&start| {
            segment
                .iter()
                .zip(&text[start..start + segment.len()])
                .all(|(&p, &c)| same(p, c))
        });

        match found {
            Some(start) => {
                text = &text[start + segment.len()..];
                pat = &pat[next_star..];
            }
            None => return false,
        }
    }

    only_stars(pat)
}

fn only_stars(pattern: &[char]) -> bool {
    pattern.iter().all(|&c| c == '*')
}

fn chars_equal(a: char, b: char, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a == b || a.to_lowercase().eq(b.to_lowercase())
    }
}
