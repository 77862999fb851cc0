use std::cmp::Ordering;
use std::path::Path;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;
    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                out.push(make_chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(last) = in_digits {
        out.push(make_chunk(&s[start..], last));
    }
    out
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits { Chunk::Number(s) } else { Chunk::Text(s) }
}

/// Compares two digit runs by value without parsing, so arbitrarily long
/// runs cannot overflow. Equal values fall back to the shorter (fewer leading
/// zeros) run first.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Natural ordering of two strings: embedded numbers compare by value,
/// everything else by character code. Numbers sort before text.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_chunks = chunks(a);
    let b_chunks = chunks(b);
    for (x, y) in a_chunks.iter().zip(b_chunks.iter()) {
        let ord = match (x, y) {
            (Chunk::Number(x), Chunk::Number(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a_chunks.len().cmp(&b_chunks.len())
}

/// Orders paths naturally by file name; the full path breaks ties so the
/// result never depends on the order the paths were listed in.
pub fn sort_paths_naturally(a: &Path, b: &Path) -> Ordering {
    let a_name = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let b_name = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    natural_cmp(&a_name, &b_name).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(natural_cmp("frame_2", "frame_10"), Ordering::Less);
        assert_eq!(natural_cmp("img10.png", "img2.png"), Ordering::Greater);
        assert_eq!(natural_cmp("a1.png", "a1.png"), Ordering::Equal);
    }

    #[test]
    fn leading_zeros_and_long_runs() {
        assert_eq!(natural_cmp("x007", "x7"), Ordering::Greater);
        assert_eq!(natural_cmp("x007", "x8"), Ordering::Less);
        assert_eq!(
            natural_cmp("n99999999999999999999999", "n100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn prefixes_sort_first() {
        assert_eq!(natural_cmp("clip", "clip2"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn sorting_is_independent_of_input_order() {
        let expected: Vec<PathBuf> = ["a1.png", "a2.png", "a10.png", "b.jpg"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let mut shuffled = vec![
            expected[3].clone(),
            expected[2].clone(),
            expected[0].clone(),
            expected[1].clone(),
        ];
        shuffled.sort_by(|a, b| sort_paths_naturally(a, b));
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn same_name_in_two_directories_is_still_ordered() {
        let mut paths = vec![PathBuf::from("videos/1.mp4"), PathBuf::from("images/1.mp4")];
        paths.sort_by(|a, b| sort_paths_naturally(a, b));
        assert_eq!(paths[0], PathBuf::from("images/1.mp4"));
    }
}
