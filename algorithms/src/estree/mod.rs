//! Even–Shiloach tree maintainers.

pub mod bucket;
pub mod fifo;
mod ml_data;
pub mod multi_level;
mod vertex_data;

/// Tuning knobs shared by the ES-tree maintainers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EsTreeParams {
    /// Maximum number of times a single vertex may be enqueued during one
    /// restore pass before the pass is abandoned for a full recomputation.
    pub requeue_limit: u32,
    /// Fraction of the vertex count that may be affected by one restore
    /// pass; exceeding it abandons the pass for a full recomputation.
    pub max_affected_ratio: f64,
}

impl Default for EsTreeParams {
    fn default() -> Self {
        Self { requeue_limit: 5, max_affected_ratio: 0.5 }
    }
}

impl EsTreeParams {
    pub(crate) fn affected_limit(&self, graph_size: usize) -> usize {
        if self.max_affected_ratio < 1.0 {
            (self.max_affected_ratio * graph_size as f64).floor() as usize
        } else {
            graph_size
        }
    }
}

/// Profiling counters common to the ES-tree maintainers.
#[derive(Debug, Default, Clone)]
pub(crate) struct EsTreeCounters {
    pub moves_down: u64,
    pub moves_up: u64,
    pub level_increase: u64,
    pub level_decrease: u64,
    pub max_level_increase: u64,
    pub max_level_decrease: u64,
    pub dec_unreachable_head: u64,
    pub dec_non_tree: u64,
    pub inc_unreachable_tail: u64,
    pub inc_non_tree: u64,
    pub reruns: u64,
    pub max_requeued: u64,
    pub max_affected: u64,
    pub total_affected: u64,
    pub rerun_requeued: u64,
    pub rerun_num_affected: u64,
}

impl EsTreeCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_level_increase(&mut self, diff: u64) {
        self.moves_down += 1;
        self.level_increase += diff;
        self.max_level_increase = self.max_level_increase.max(diff);
    }

    pub fn record_level_decrease(&mut self, diff: u64) {
        self.moves_up += 1;
        self.level_decrease += diff;
        self.max_level_decrease = self.max_level_decrease.max(diff);
    }

    pub fn record_affected(&mut self, processed: u64) {
        self.total_affected += processed;
        self.max_affected = self.max_affected.max(processed);
    }

    pub fn profile(&self, params: &EsTreeParams) -> Vec<(&'static str, u64)> {
        vec![
            ("vertices_moved_down", self.moves_down),
            ("vertices_moved_up", self.moves_up),
            ("total_level_increase", self.level_increase),
            ("total_level_decrease", self.level_decrease),
            ("max_level_increase", self.max_level_increase),
            ("max_level_decrease", self.max_level_decrease),
            ("dec_head_unreachable", self.dec_unreachable_head),
            ("dec_nontree", self.dec_non_tree),
            ("inc_tail_unreachable", self.inc_unreachable_tail),
            ("inc_nontree", self.inc_non_tree),
            ("requeue_limit", params.requeue_limit as u64),
            ("max_affected_ratio_percent", (params.max_affected_ratio * 100.0) as u64),
            ("max_requeued", self.max_requeued),
            ("total_affected", self.total_affected),
            ("max_affected", self.max_affected),
            ("reruns", self.reruns),
            ("rerun_requeued", self.rerun_requeued),
            ("rerun_num_affected", self.rerun_num_affected),
        ]
    }
}
