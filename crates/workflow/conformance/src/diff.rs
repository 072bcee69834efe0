//! Line-based unified diff

const CONTEXT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edit {
    Equal,
    Delete,
    Insert,
}

/// Render a unified diff of two texts; empty when they are identical
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let script = edit_script(&old_lines, &new_lines);

    if script.iter().all(|(edit, _)| *edit == Edit::Equal) {
        return String::new();
    }

    let mut out = format!("--- {}\n+++ {}\n", old_label, new_label);
    for (start, end) in hunk_ranges(&script) {
        let (mut old_pos, mut new_pos) = (0, 0);
        for (edit, _) in &script[..start] {
            match edit {
                Edit::Equal => {
                    old_pos += 1;
                    new_pos += 1;
                }
                Edit::Delete => old_pos += 1,
                Edit::Insert => new_pos += 1,
            }
        }

        let hunk = &script[start..end];
        let old_len = hunk.iter().filter(|(e, _)| *e != Edit::Insert).count();
        let new_len = hunk.iter().filter(|(e, _)| *e != Edit::Delete).count();
        let old_start = if old_len == 0 { old_pos } else { old_pos + 1 };
        let new_start = if new_len == 0 { new_pos } else { new_pos + 1 };
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_start, old_len, new_start, new_len
        ));

        for (edit, line) in hunk {
            let prefix = match edit {
                Edit::Equal => ' ',
                Edit::Delete => '-',
                Edit::Insert => '+',
            };
            out.push(prefix);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Shortest edit script via longest common subsequence
fn edit_script<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<(Edit, &'a str)> {
    let (n, m) = (old.len(), new.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut script = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            script.push((Edit::Equal, old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            script.push((Edit::Delete, old[i]));
            i += 1;
        } else {
            script.push((Edit::Insert, new[j]));
            j += 1;
        }
    }
    script.extend(old[i..].iter().map(|line| (Edit::Delete, *line)));
    script.extend(new[j..].iter().map(|line| (Edit::Insert, *line)));
    script
}

/// Script ranges covered by each hunk, changes plus surrounding context
fn hunk_ranges(script: &[(Edit, &str)]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (i, (edit, _)) in script.iter().enumerate() {
        if *edit == Edit::Equal {
            continue;
        }
        let start = i.saturating_sub(CONTEXT);
        let end = (i + 1 + CONTEXT).min(script.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }
    ranges
}
