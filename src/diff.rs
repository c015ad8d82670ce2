use crate::query::diff::FileChanges;

/// Reduce a unified diff to the `(file, {line ranges})` sets the diff-impact
/// query consumes. Ranges refer to the post-change file (the `+++` side);
/// deleted files and pure context are ignored.
pub fn parse_unified_diff(text: &str) -> Vec<FileChanges> {
    let mut changes: Vec<FileChanges> = Vec::new();
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            let path = rest.split_whitespace().next().unwrap_or("");
            let path = path.strip_prefix("b/").unwrap_or(path);
            if path == "/dev/null" || path.is_empty() {
                current = None;
                continue;
            }
            changes.push(FileChanges {
                file: path.to_owned(),
                ranges: Vec::new(),
            });
            current = Some(changes.len() - 1);
        } else if line.starts_with("@@")
            && let Some(idx) = current
            && let Some(range) = parse_hunk_header(line)
        {
            changes[idx].ranges.push(range);
        }
    }

    changes.retain(|c| !c.ranges.is_empty());
    changes
}

/// Parse `@@ -a,b +c,d @@` into the new-side inclusive range `(c, c+d-1)`.
/// A zero-length hunk (pure deletion) marks the single line at the deletion
/// point.
fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    let plus = line.split_whitespace().find(|part| part.starts_with('+'))?;
    let spec = &plus[1..];
    let (start, count) = match spec.split_once(',') {
        Some((s, c)) => (s.parse::<u32>().ok()?, c.parse::<u32>().ok()?),
        None => (spec.parse::<u32>().ok()?, 1),
    };
    let start = start.max(1);
    let end = if count == 0 {
        start
    } else {
        start + count - 1
    };
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_hunk() {
        let diff = "\
--- a/x.ts
+++ b/x.ts
@@ -10,4 +12,5 @@
 context
+added
 context
";
        let changes = parse_unified_diff(diff);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].file, "x.ts");
        assert_eq!(changes[0].ranges, vec![(12, 16)]);
    }

    #[test]
    fn test_parse_multiple_files_and_hunks() {
        let diff = "\
--- a/a.ts
+++ b/a.ts
@@ -1,2 +1,3 @@
@@ -20 +22 @@
--- a/b.py
+++ b/b.py
@@ -5,0 +7,2 @@
";
        let changes = parse_unified_diff(diff);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].ranges, vec![(1, 3), (22, 22)]);
        assert_eq!(changes[1].file, "b.py");
        assert_eq!(changes[1].ranges, vec![(7, 8)]);
    }

    #[test]
    fn test_deleted_file_ignored() {
        let diff = "\
--- a/gone.ts
+++ /dev/null
@@ -1,5 +0,0 @@
";
        assert!(parse_unified_diff(diff).is_empty());
    }

    #[test]
    fn test_pure_deletion_marks_single_line() {
        assert_eq!(parse_hunk_header("@@ -4,2 +3,0 @@"), Some((3, 3)));
    }
}
