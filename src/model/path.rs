//! Relationship path: the ordered walk from one person to another.

use serde::{Deserialize, Serialize};

use super::{ParentRole, RecordId};

/// How a path arrived at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "step", content = "role", rename_all = "lowercase")]
pub enum Step {
    /// First node of the path.
    Start,
    /// To a parent.
    Up(ParentRole),
    /// To a child.
    Down(ParentRole),
    Spouse,
    Sibling,
}

impl Step {
    /// The same edge walked the other way.
    pub fn inverse(self) -> Step {
        match self {
            Step::Up(role) => Step::Down(role),
            Step::Down(role) => Step::Up(role),
            other => other,
        }
    }

    pub fn is_spouse(self) -> bool {
        matches!(self, Step::Spouse)
    }
}

/// One `(node, step)` pair of a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub node: RecordId,
    pub step: Step,
}

/// A path in the family graph: start, then one entry per edge walked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipPath {
    /// Always has at least one element, the first being `Step::Start`.
    pub steps: Vec<PathStep>,
}

impl RelationshipPath {
    pub fn single(node: RecordId) -> Self {
        Self { steps: vec![PathStep { node, step: Step::Start }] }
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start(&self) -> &RecordId {
        &self.steps[0].node
    }

    pub fn end(&self) -> &RecordId {
        &self.steps[self.steps.len() - 1].node
    }

    /// Extend the path with one step.
    pub fn append(&mut self, step: Step, node: RecordId) {
        self.steps.push(PathStep { node, step });
    }

    /// Step kinds without the leading `Start`.
    pub fn moves(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps.iter().skip(1).map(|s| s.step)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RecordId> {
        self.steps.iter().map(|s| &s.node)
    }

    pub fn spouse_steps(&self) -> usize {
        self.moves().filter(|s| s.is_spouse()).count()
    }

    /// The same path walked from the other end.
    pub fn reversed(&self) -> Self {
        let n = self.steps.len();
        let mut out = Self::single(self.steps[n - 1].node.clone());
        for k in (1..n).rev() {
            out.append(self.steps[k].step.inverse(), self.steps[k - 1].node.clone());
        }
        out
    }
}
