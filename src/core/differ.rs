use serde::Serialize;

/// One classified line of an alignment between an old and a new text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "line", rename_all = "lowercase")]
pub enum DiffRecord {
    Unchanged(String),
    Added(String),
    Removed(String),
}

impl DiffRecord {
    pub fn is_change(&self) -> bool {
        !matches!(self, DiffRecord::Unchanged(_))
    }
}

#[cfg(test)]
impl DiffRecord {
    fn line(&self) -> &str {
        match self {
            DiffRecord::Unchanged(l) | DiffRecord::Added(l) | DiffRecord::Removed(l) => l,
        }
    }
}

/// Line-level diff algorithm. Implementations must emit a minimal edit
/// script whose Removed+Unchanged lines rebuild `old` and whose
/// Added+Unchanged lines rebuild `new`.
pub trait DiffStrategy: Send + Sync {
    fn diff(&self, old: &[&str], new: &[&str]) -> Vec<DiffRecord>;

    fn name(&self) -> &'static str;
}

/// Longest-common-subsequence differ. At a substitution the removed lines
/// come before the added ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct LcsDiffer;

impl DiffStrategy for LcsDiffer {
    fn diff(&self, old: &[&str], new: &[&str]) -> Vec<DiffRecord> {
        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let old_mid = &old[prefix..old.len() - suffix];
        let new_mid = &new[prefix..new.len() - suffix];

        let mut records = Vec::with_capacity(old.len().max(new.len()));
        records.extend(old[..prefix].iter().map(|l| DiffRecord::Unchanged(l.to_string())));
        align_middle(old_mid, new_mid, &mut records);
        records.extend(old[old.len() - suffix..].iter().map(|l| DiffRecord::Unchanged(l.to_string())));
        records
    }

    fn name(&self) -> &'static str {
        "lcs"
    }
}

fn align_middle(old: &[&str], new: &[&str], records: &mut Vec<DiffRecord>) {
    let (n, m) = (old.len(), new.len());
    if n == 0 {
        records.extend(new.iter().map(|l| DiffRecord::Added(l.to_string())));
        return;
    }
    if m == 0 {
        records.extend(old.iter().map(|l| DiffRecord::Removed(l.to_string())));
        return;
    }

    // lcs[i * width + j] = LCS length of old[i..] and new[j..]
    let width = m + 1;
    let mut lcs = vec![0usize; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if old[i] == new[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            records.push(DiffRecord::Unchanged(old[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            records.push(DiffRecord::Removed(old[i].to_string()));
            i += 1;
        } else {
            records.push(DiffRecord::Added(new[j].to_string()));
            j += 1;
        }
    }
    records.extend(old[i..].iter().map(|l| DiffRecord::Removed(l.to_string())));
    records.extend(new[j..].iter().map(|l| DiffRecord::Added(l.to_string())));
}

/// Split normalized text into diffable lines. Empty text has no lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl DiffStats {
    pub fn from_records(records: &[DiffRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            match record {
                DiffRecord::Added(_) => stats.added += 1,
                DiffRecord::Removed(_) => stats.removed += 1,
                DiffRecord::Unchanged(_) => stats.unchanged += 1,
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild_old(records: &[DiffRecord]) -> Vec<&str> {
        records
            .iter()
            .filter(|r| !matches!(r, DiffRecord::Added(_)))
            .map(DiffRecord::line)
            .collect()
    }

    fn rebuild_new(records: &[DiffRecord]) -> Vec<&str> {
        records
            .iter()
            .filter(|r| !matches!(r, DiffRecord::Removed(_)))
            .map(DiffRecord::line)
            .collect()
    }

    #[test]
    fn test_identical_inputs_are_all_unchanged() {
        let lines = ["a", "b", "a", ""];
        let records = LcsDiffer.diff(&lines, &lines);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| !r.is_change()));
        assert_eq!(rebuild_new(&records), lines);
    }

    #[test]
    fn test_empty_old_is_all_added() {
        let records = LcsDiffer.diff(&[], &["x", "y"]);
        assert_eq!(
            records,
            vec![DiffRecord::Added("x".into()), DiffRecord::Added("y".into())]
        );
    }

    #[test]
    fn test_empty_new_is_all_removed() {
        let records = LcsDiffer.diff(&["x", "y"], &[]);
        assert_eq!(
            records,
            vec![DiffRecord::Removed("x".into()), DiffRecord::Removed("y".into())]
        );
    }

    #[test]
    fn test_substitution_removes_before_adding() {
        let records = LcsDiffer.diff(&["A", "B", "C"], &["A", "X", "C"]);
        assert_eq!(
            records,
            vec![
                DiffRecord::Unchanged("A".into()),
                DiffRecord::Removed("B".into()),
                DiffRecord::Added("X".into()),
                DiffRecord::Unchanged("C".into()),
            ]
        );
    }

    #[test]
    fn test_reconstruction_and_minimality() {
        let cases: [(&[&str], &[&str]); 5] = [
            (&["a", "b", "c", "a", "b", "b", "a"], &["c", "b", "a", "b", "a", "c"]),
            (&["x", "a", "y"], &["a"]),
            (&["same", "same"], &["same", "other", "same"]),
            (&["1", "2", "3", "4"], &["4", "3", "2", "1"]),
            (&[""], &["", ""]),
        ];

        for (old, new) in cases {
            let records = LcsDiffer.diff(old, new);
            assert_eq!(rebuild_old(&records), old);
            assert_eq!(rebuild_new(&records), new);

            // Minimal script keeps exactly LCS-many lines
            let stats = DiffStats::from_records(&records);
            assert_eq!(stats.added + stats.unchanged, new.len());
            assert_eq!(stats.removed + stats.unchanged, old.len());
        }

        // Myers' classic example: LCS of length 4
        let stats = DiffStats::from_records(&LcsDiffer.diff(
            &["a", "b", "c", "a", "b", "b", "a"],
            &["c", "b", "a", "b", "a", "c"],
        ));
        assert_eq!(stats.unchanged, 4);
    }

    #[test]
    fn test_split_lines() {
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a\r\nb\n"), vec!["a", "b", ""]);
        assert_eq!(split_lines("A\nB\nC"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_stats_count_changes() {
        let unchanged = LcsDiffer.diff(&["a"], &["a"]);
        assert!(!unchanged.iter().any(DiffRecord::is_change));
        assert_eq!(DiffStats::from_records(&unchanged).unchanged, 1);

        let changed = LcsDiffer.diff(&["a"], &["b"]);
        let stats = DiffStats::from_records(&changed);
        assert_eq!((stats.added, stats.removed, stats.unchanged), (1, 1, 0));
    }
}
