use crate::types::{VertexIdentifier, Weight};

/// Serial number of an arc-addition record. Arc removals reference the
/// addition they undo through this id rather than through `(tail, head)`,
/// which keeps the log unambiguous in the presence of parallel arcs and of
/// vertex-id reuse.
pub type ArcOpId = usize;

/// A single record of the dynamic graph's operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddVertex { id: VertexIdentifier },
    RemoveVertex { id: VertexIdentifier },
    AddArc { op: ArcOpId, tail: VertexIdentifier, head: VertexIdentifier },
    RemoveArc { op: ArcOpId, tail: VertexIdentifier, head: VertexIdentifier },
    ChangeArcWeight { op: ArcOpId, weight: Weight },
    NoOp,
    /// Operations applied back-to-back under one log position, e.g. the
    /// vertex additions implied by an arc addition, or a `compact` merge.
    Multiple(Vec<Operation>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    VertexAddition,
    VertexRemoval,
    ArcAddition,
    ArcRemoval,
    ArcWeightChange,
    NoOp,
    Multiple,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::AddVertex { .. } => OperationKind::VertexAddition,
            Operation::RemoveVertex { .. } => OperationKind::VertexRemoval,
            Operation::AddArc { .. } => OperationKind::ArcAddition,
            Operation::RemoveArc { .. } => OperationKind::ArcRemoval,
            Operation::ChangeArcWeight { .. } => OperationKind::ArcWeightChange,
            Operation::NoOp => OperationKind::NoOp,
            Operation::Multiple(_) => OperationKind::Multiple,
        }
    }

    /// Number of operations of `kind` contained in this record, looking one
    /// level into `Multiple` records (the log never nests them deeper).
    pub fn count(&self, kind: OperationKind) -> usize {
        match self {
            Operation::Multiple(ops) => ops.iter().filter(|op| op.kind() == kind).count(),
            _ => usize::from(self.kind() == kind),
        }
    }

    /// The kind of this record, where a `Multiple` is represented by its
    /// final nested operation.
    pub fn effective_kind(&self) -> OperationKind {
        match self {
            Operation::Multiple(ops) => ops.last().map_or(OperationKind::Multiple, |op| op.kind()),
            _ => self.kind(),
        }
    }
}
