use crate::fragment::Fragment;

/// Fragments judged to sit on one visual text line, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct LineCluster<'a> {
    pub fragments: Vec<&'a Fragment>,
}

/// Group fragments into lines by their vertical centers.
///
/// Distinct centers are sorted and walked top to bottom; a value more than
/// `tolerance` below its predecessor opens a new line. The tolerance chains,
/// so one line can span more than `tolerance` when intermediate centers link
/// it together. Lines come back topmost first and partition the input.
pub fn cluster(fragments: &[Fragment], tolerance: f64) -> Vec<LineCluster<'_>> {
    let mut keys: Vec<f64> = fragments.iter().map(|f| f.bbox.center_y()).collect();
    keys.sort_by(f64::total_cmp);
    keys.dedup_by(|a, b| a.total_cmp(b).is_eq());

    let ids = assign_line_ids(&keys, tolerance);
    let line_count = ids.last().map_or(0, |last| last + 1);

    let mut lines: Vec<Vec<&Fragment>> = vec![Vec::new(); line_count];
    for fragment in fragments {
        let key = fragment.bbox.center_y();
        let slot = match keys.binary_search_by(|k| k.total_cmp(&key)) {
            Ok(i) | Err(i) => i.min(keys.len() - 1),
        };
        lines[ids[slot]].push(fragment);
    }

    lines
        .into_iter()
        .filter(|l| !l.is_empty())
        .map(|fragments| LineCluster { fragments })
        .collect()
}

/// Line id for each sorted, distinct key.
fn assign_line_ids(sorted: &[f64], tolerance: f64) -> Vec<usize> {
    if tolerance == 0.0 || sorted.len() < 2 {
        return (0..sorted.len()).collect();
    }

    let mut ids = Vec::with_capacity(sorted.len());
    let mut line = 0;
    let mut last = sorted[0];
    ids.push(line);
    for &key in &sorted[1..] {
        let joins = key <= last + tolerance;
        if !joins {
            line += 1;
        }
        ids.push(line);
        last = key;
    }
    ids
}
