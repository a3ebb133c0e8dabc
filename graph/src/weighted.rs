//! A dynamic directed graph whose arcs carry weights.
//!
//! Weights travel through the operation log as first-class records, so
//! replay and `reset_to_big_bang` restore them together with the topology.
//! Nothing in the reachability layer consumes them; they exist for inputs
//! whose third column is a real weight rather than an addition/removal sign.

use crate::dynamic::DynamicDiGraph;
use crate::errors::{GraphError, GraphResult};
use crate::operations::ArcOpId;
use crate::types::{Timestamp, VertexIdentifier, Weight};
use std::collections::HashMap;

pub struct DynamicWeightedDiGraph {
    dynamic: DynamicDiGraph,
    default_weight: Weight,
    /// Construction-side view of the latest weight per live arc.
    weights: HashMap<ArcOpId, Weight>,
}

impl Default for DynamicWeightedDiGraph {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DynamicWeightedDiGraph {
    pub fn new(default_weight: Weight) -> Self {
        Self { dynamic: DynamicDiGraph::new(), default_weight, weights: HashMap::new() }
    }

    pub fn default_weight(&self) -> Weight {
        self.default_weight
    }

    /// The underlying operation log and replay machinery.
    pub fn graph(&self) -> &DynamicDiGraph {
        &self.dynamic
    }

    pub fn graph_mut(&mut self) -> &mut DynamicDiGraph {
        &mut self.dynamic
    }

    /// Appends an arc addition carrying `weight`, bundled into one record.
    pub fn add_weighted_arc(
        &mut self,
        tail: VertexIdentifier,
        head: VertexIdentifier,
        weight: Weight,
        timestamp: Timestamp,
        antedate: bool,
    ) -> GraphResult<()> {
        let op = self.dynamic.record_arc_addition(tail, head, timestamp, antedate)?;
        self.dynamic.record_weight_change(op, weight, timestamp)?;
        self.dynamic.compact(2)?;
        self.weights.insert(op, weight);
        Ok(())
    }

    /// Appends a weight change for an existing arc; fails with `UnknownArc`
    /// otherwise.
    pub fn change_arc_weight(
        &mut self,
        tail: VertexIdentifier,
        head: VertexIdentifier,
        weight: Weight,
        timestamp: Timestamp,
    ) -> GraphResult<()> {
        let op = self.dynamic.find_construction_arc(tail, head).ok_or(GraphError::UnknownArc(tail, head))?;
        self.dynamic.record_weight_change(op, weight, timestamp)?;
        self.weights.insert(op, weight);
        Ok(())
    }

    /// Adds the arc with `weight` if it does not exist yet, otherwise
    /// re-weighs the existing one.
    pub fn add_weighted_arc_or_change_weight(
        &mut self,
        tail: VertexIdentifier,
        head: VertexIdentifier,
        weight: Weight,
        timestamp: Timestamp,
    ) -> GraphResult<()> {
        if self.dynamic.has_arc(tail, head) {
            self.change_arc_weight(tail, head, weight, timestamp)
        } else {
            self.add_weighted_arc(tail, head, weight, timestamp, false)
        }
    }

    /// Adjusts the arc's weight by `amount` up or down, creating the arc for
    /// an upward adjustment. A weight that drops to zero removes the arc
    /// when `remove_on_zero` is set.
    pub fn adjust_arc_weight(
        &mut self,
        tail: VertexIdentifier,
        head: VertexIdentifier,
        amount: Weight,
        increase: bool,
        remove_on_zero: bool,
        timestamp: Timestamp,
    ) -> GraphResult<()> {
        match self.dynamic.find_construction_arc(tail, head) {
            None if increase => self.add_weighted_arc(tail, head, amount, timestamp, false),
            None => Err(GraphError::UnknownArc(tail, head)),
            Some(op) => {
                let current = self.weights.get(&op).copied().unwrap_or(self.default_weight);
                let updated = if increase { current.saturating_add(amount) } else { current.saturating_sub(amount) };
                if updated == 0 && remove_on_zero {
                    self.weights.remove(&op);
                    self.dynamic.remove_arc(tail, head, timestamp)
                } else {
                    self.dynamic.record_weight_change(op, updated, timestamp)?;
                    self.weights.insert(op, updated);
                    Ok(())
                }
            }
        }
    }

    /// Appends the removal of the arc, dropping its weight record.
    pub fn remove_weighted_arc(&mut self, tail: VertexIdentifier, head: VertexIdentifier, timestamp: Timestamp) -> GraphResult<()> {
        if let Some(op) = self.dynamic.find_construction_arc(tail, head) {
            self.weights.remove(&op);
        }
        self.dynamic.remove_arc(tail, head, timestamp)
    }

    /// The weight of the arc as recorded so far (construction view).
    pub fn arc_weight(&self, tail: VertexIdentifier, head: VertexIdentifier) -> Option<Weight> {
        let op = self.dynamic.find_construction_arc(tail, head)?;
        Some(self.weights.get(&op).copied().unwrap_or(self.default_weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::GraphUpdate;

    #[test]
    fn test_weights_replay_with_the_log() {
        let mut weighted = DynamicWeightedDiGraph::new(1);
        weighted.add_weighted_arc(0, 1, 5, 0, false).unwrap();
        weighted.change_arc_weight(0, 1, 7, 1).unwrap();

        let mut seen = Vec::new();
        let dynamic = weighted.graph_mut();
        while dynamic.apply_next_delta_observed(|_, u| {
            if let GraphUpdate::ArcWeightChanged { weight, .. } = u {
                seen.push(weight);
            }
        }) {}
        assert_eq!(seen, vec![5, 7]);
        let v0 = dynamic.vertex_for_id(0).unwrap();
        let arc = dynamic.current_graph().find_arc(v0, dynamic.vertex_for_id(1).unwrap()).unwrap();
        assert_eq!(dynamic.current_arc_weight(arc), Some(7));

        // rewinding forgets the weights along with the arcs
        dynamic.reset_to_big_bang();
        assert!(dynamic.apply_next_op(false));
        let arc = dynamic.current_graph().find_arc(
            dynamic.vertex_for_id(0).unwrap(),
            dynamic.vertex_for_id(1).unwrap(),
        );
        assert_eq!(dynamic.current_arc_weight(arc.unwrap()), Some(5));
    }

    #[test]
    fn test_add_or_change() {
        let mut weighted = DynamicWeightedDiGraph::new(0);
        weighted.add_weighted_arc_or_change_weight(0, 1, 3, 0).unwrap();
        weighted.add_weighted_arc_or_change_weight(0, 1, 9, 1).unwrap();
        assert_eq!(weighted.arc_weight(0, 1), Some(9));
        assert_eq!(weighted.graph().count_arc_additions(0, 1), 1);
    }

    #[test]
    fn test_relative_adjustment_removes_at_zero() {
        let mut weighted = DynamicWeightedDiGraph::new(0);
        weighted.adjust_arc_weight(0, 1, 2, true, true, 0).unwrap();
        weighted.adjust_arc_weight(0, 1, 1, false, true, 1).unwrap();
        assert_eq!(weighted.arc_weight(0, 1), Some(1));
        weighted.adjust_arc_weight(0, 1, 1, false, true, 2).unwrap();
        assert!(!weighted.graph().has_arc(0, 1));
        // downward adjustment of a missing arc is an error
        assert!(matches!(weighted.adjust_arc_weight(0, 1, 1, false, true, 3), Err(GraphError::UnknownArc(0, 1))));
    }
}
