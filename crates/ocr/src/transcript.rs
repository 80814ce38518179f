use crate::cluster::cluster;
use crate::collate::collate;
use crate::config::LayoutOptions;
use crate::fragment::Fragment;
use crate::metrics::Metrics;

/// Rebuild a multi-line transcript from positioned fragments with default tuning.
pub fn assemble(fragments: &[Fragment], reconstruct_spacing: bool) -> String {
    let options = LayoutOptions { reconstruct_spacing, ..LayoutOptions::default() };
    assemble_with(fragments, &options)
}

/// Rebuild a transcript: estimate metrics, cluster into lines, collate each line
/// and join them top to bottom with `\n`.
pub fn assemble_with(fragments: &[Fragment], options: &LayoutOptions) -> String {
    if fragments.is_empty() {
        return String::new();
    }

    let metrics = Metrics::estimate(fragments, options);
    cluster(fragments, metrics.vertical_tolerance)
        .iter()
        .map(|line| collate(&line.fragments, metrics.horizontal_unit, options.reconstruct_spacing))
        .collect::<Vec<_>>()
        .join("\n")
}
