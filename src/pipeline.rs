//! Jobs of the digest: collection, upload, publishing and the dashboard.
pub mod collect;
pub mod daily;
pub mod dashboard;
pub mod insight;
pub mod report;
pub mod summarize;
pub mod upload;
pub mod weekly;

use serde::Serialize;

use crate::scoring::Selection;

/// Selector counters summed over every category of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub input: usize,
    pub selected: usize,
    pub disqualified: usize,
    pub below_minimum: usize,
}

impl SelectionStats {
    pub fn record(&mut self, selection: &Selection) {
        self.input += selection.input_count;
        self.selected += selection.selected_count();
        self.disqualified += selection.disqualified;
        self.below_minimum += selection.below_minimum;
    }
}
