//! Timestamp-insensitive transcript comparison

use std::collections::{HashMap, HashSet};

/// Strip the `[+N.NNNs]` prefix and blank lines so runs taken at different
/// speeds compare equal.
pub fn normalize_transcript(transcript: &str) -> Vec<String> {
    transcript
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.starts_with("[+") {
                match line.find("] ") {
                    Some(end) => line[end + 2..].to_string(),
                    None => line.to_string(),
                }
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Line diff of two transcripts after normalization.
///
/// Lines only in `expected` are prefixed `- `, lines only in `actual` with
/// `+ `. Returns an empty string when the transcripts are equivalent.
pub fn diff_transcripts(actual: &str, expected: &str) -> String {
    let a = normalize_transcript(actual);
    let b = normalize_transcript(expected);
    if a == b {
        return String::new();
    }

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];

    // Compare interned ids rather than strings in the quadratic part
    let mut ids = HashMap::new();
    let a_ids = intern(a, &mut ids);
    let b_ids = intern(b, &mut ids);

    let mut ops = Vec::with_capacity(a.len() + b.len());
    let shared: HashSet<usize> = a_ids.iter().copied().collect();
    if b_ids.iter().any(|id| shared.contains(id)) {
        edit_script(&a_ids, &b_ids, 0, 0, &mut ops);
    } else {
        ops.extend((0..a.len()).map(Edit::Added));
        ops.extend((0..b.len()).map(Edit::Removed));
    }

    ops.into_iter()
        .map(|op| match op {
            Edit::Added(i) => format!("+ {}", a[i]),
            Edit::Removed(j) => format!("- {}", b[j]),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn intern<'a>(lines: &'a [String], ids: &mut HashMap<&'a str, usize>) -> Vec<usize> {
    lines
        .iter()
        .map(|line| {
            let next = ids.len();
            *ids.entry(line.as_str()).or_insert(next)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Edit {
    /// Index into `actual`
    Added(usize),
    /// Index into `expected`
    Removed(usize),
}

/// Hirschberg's divide and conquer LCS: linear space, emits only the
/// non-matching lines in order. `ao` and `bo` are the offsets of the slices
/// within the full inputs.
fn edit_script(a: &[usize], b: &[usize], ao: usize, bo: usize, out: &mut Vec<Edit>) {
    if a.is_empty() {
        out.extend((bo..bo + b.len()).map(Edit::Removed));
        return;
    }
    if b.is_empty() {
        out.extend((ao..ao + a.len()).map(Edit::Added));
        return;
    }
    if a.len() == 1 {
        match b.iter().position(|&id| id == a[0]) {
            Some(k) => {
                out.extend((bo..bo + k).map(Edit::Removed));
                out.extend((bo + k + 1..bo + b.len()).map(Edit::Removed));
            }
            None => {
                out.push(Edit::Added(ao));
                out.extend((bo..bo + b.len()).map(Edit::Removed));
            }
        }
        return;
    }

    let mid = a.len() / 2;
    let front = lcs_prefix_row(&a[..mid], b);
    let back = lcs_suffix_row(&a[mid..], b);
    let split = (0..=b.len())
        .max_by_key(|&k| (front[k] + back[k], std::cmp::Reverse(k)))
        .unwrap_or(0);

    edit_script(&a[..mid], &b[..split], ao, bo, out);
    edit_script(&a[mid..], &b[split..], ao + mid, bo + split, out);
}

/// `row[j]` is the LCS length of `a` and `b[..j]`.
fn lcs_prefix_row(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut prev = vec![0; b.len() + 1];
    let mut cur = vec![0; b.len() + 1];
    for &x in a {
        for j in 1..=b.len() {
            cur[j] = if x == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(cur[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

/// `row[j]` is the LCS length of `a` and `b[j..]`.
fn lcs_suffix_row(a: &[usize], b: &[usize]) -> Vec<usize> {
    let m = b.len();
    let mut prev = vec![0; m + 1];
    let mut cur = vec![0; m + 1];
    for &x in a.iter().rev() {
        for j in (0..m).rev() {
            cur[j] = if x == b[j] {
                prev[j + 1] + 1
            } else {
                prev[j].max(cur[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(prefix: &str, n: usize) -> String {
        (0..n).map(|i| format!("{} {}\n", prefix, i)).collect()
    }

    #[test]
    fn test_large_disjoint_transcripts() {
        let actual = numbered("STATE a", 12_000);
        let expected = numbered("STATE b", 12_000);
        let diff = diff_transcripts(&actual, &expected);

        let lines: Vec<&str> = diff.lines().collect();
        assert_eq!(lines.len(), 24_000);
        assert_eq!(lines[0], "+ STATE a 0");
        assert_eq!(lines[12_000], "- STATE b 0");
    }

    #[test]
    fn test_large_transcripts_with_one_change() {
        let expected = numbered("STATE poll", 20_000);
        let actual = expected.replace("STATE poll 10000\n", "STATE failure\n");
        let diff = diff_transcripts(&actual, &expected);
        assert_eq!(diff, "+ STATE failure\n- STATE poll 10000");
    }

    #[test]
    fn test_interleaved_changes_keep_order() {
        let expected = "STATE a\nSTATE b\nSTATE c\nSTATE d\nSTATE e\n";
        let actual = "STATE a\nSTATE x\nSTATE c\nSTATE e\nSTATE y\n";
        let diff = diff_transcripts(actual, expected);
        assert_eq!(diff, "+ STATE x\n- STATE b\n- STATE d\n+ STATE y");
    }

    #[test]
    fn test_shared_lines_in_large_input_are_not_reported() {
        let mut expected = String::new();
        let mut actual = String::new();
        for i in 0..3_000 {
            expected.push_str(&format!("STATE shared {}\nSTATE old {}\n", i, i));
            actual.push_str(&format!("STATE shared {}\nSTATE new {}\n", i, i));
        }
        let diff = diff_transcripts(&actual, &expected);
        assert_eq!(diff.lines().count(), 6_000);
        assert!(!diff.contains("shared"));
    }
}
