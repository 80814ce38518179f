use crate::fragment::Fragment;

/// Render one line of fragments as text, left to right.
///
/// A single space separates consecutive fragments. With `reconstruct_spacing`
/// the separator grows by one space per `horizontal_unit` of pixel gap, which
/// keeps statement columns roughly aligned as runs of spaces.
pub fn collate(line: &[&Fragment], horizontal_unit: f64, reconstruct_spacing: bool) -> String {
    let mut ordered = line.to_vec();
    ordered.sort_by(|a, b| a.bbox.x1.total_cmp(&b.bbox.x1));

    let mut out = String::new();
    let mut last_right = 0.0f64;
    // A non-positive unit would never advance the cursor.
    let fill_gaps = reconstruct_spacing && horizontal_unit > 0.0;

    for fragment in ordered {
        out.push(' ');
        last_right += horizontal_unit;
        if fill_gaps {
            let pad = gap_spaces(fragment.bbox.x1 - last_right, horizontal_unit);
            out.extend(std::iter::repeat(' ').take(pad));
        }
        out.push_str(&fragment.text);
        last_right = fragment.bbox.x2;
    }

    if reconstruct_spacing {
        match out.strip_prefix(' ') {
            Some(rest) => rest.to_string(),
            None => out,
        }
    } else {
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Extra spaces for `gap` pixels: one per whole `unit` the cursor can advance
/// while staying short of the next fragment.
fn gap_spaces(gap: f64, unit: f64) -> usize {
    let steps = (gap / unit).ceil() - 1.0;
    if steps.is_finite() && steps > 0.0 {
        steps as usize
    } else {
        0
    }
}
