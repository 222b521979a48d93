//! "Did you mean" suggestions for misspelled names.
//!
//! Names are compared using
//! [Levenshtein distance](https://en.wikipedia.org/wiki/Levenshtein_distance),
//!     computed with the usual dynamic program over two rolling rows.
//! Only the distance is needed here, so the space used is linear in the length
//!     of the shorter word.

/// Returns the Levenshtein distance between two strings, counted in characters.
pub fn distance(a: &str, b: &str) -> usize {
    let (a, b): (Vec<char>, Vec<char>) = if a.chars().count() < b.chars().count() {
        (b.chars().collect(), a.chars().collect())
    } else {
        (a.chars().collect(), b.chars().collect())
    };
    // previous[j] is the distance between a[..i] and b[..j].
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0_usize; b.len() + 1];
    for (i, a_i) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_j) in b.iter().enumerate() {
            current[j + 1] = if a_i == b_j {
                previous[j]
            } else {
                1 + previous[j].min(previous[j + 1]).min(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Ranks every word in the dictionary by its distance to the search word.
///
/// The closest words come first; ties are broken alphabetically so the
///     output does not depend on the order of the dictionary.
pub fn ranked<'a, I>(dictionary: I, word: &str) -> Vec<(&'a str, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ranked: Vec<(&'a str, usize)> = dictionary
        .into_iter()
        .map(|candidate| (candidate, distance(word, candidate)))
        .collect();
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
    ranked
}

/// Returns the dictionary word closest to the search word, if it is close enough
///     to be a plausible misspelling.
///
/// A word is close enough if at most a third of its characters (and at least one)
///     need to change.
pub fn closest<'a, I>(dictionary: I, word: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let threshold = std::cmp::max(1, word.chars().count() / 3);
    ranked(dictionary, word)
        .into_iter()
        .next()
        .filter(|(_, d)| *d <= threshold)
        .map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! distance_tests {
        ( $( ($name: ident, $a: expr, $b: expr, $want: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(distance($a, $b), $want);
                    assert_eq!(distance($b, $a), $want);
                }
            )+
        };
    }

    distance_tests![
        (identical, "stringify", "stringify", 0),
        (empty_left, "", "concat", 6),
        (both_empty, "", "", 0),
        (one_substitution, "concat", "cancat", 1),
        (one_insertion, "unvar", "unvars", 1),
        (one_deletion, "expand", "expnd", 1),
        (transposition_is_two, "ls", "sl", 2),
        (kitten_sitting, "kitten", "sitting", 3),
        (unicode, "caf\u{e9}", "cafe", 1),
    ];

    #[test]
    fn ranked_orders_by_distance_then_name() {
        let got = ranked(["lst", "ls", "layer", "lookahead"], "ls");
        assert_eq!(
            got,
            vec![("ls", 0), ("lst", 1), ("layer", 4), ("lookahead", 8)]
        );
    }

    #[test]
    fn closest_finds_misspelling() {
        assert_eq!(
            closest(["stringify", "concat", "unvar"], "stringfy"),
            Some("stringify")
        );
    }

    #[test]
    fn closest_rejects_distant_words() {
        assert_eq!(closest(["stringify", "concat"], "hygienize"), None);
    }

    #[test]
    fn closest_empty_dictionary() {
        assert_eq!(closest([], "token"), None);
    }
}
