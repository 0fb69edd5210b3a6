//! Shape analysis: from the step sequence of a shortest path to a kinship term.
//!
//! Everything is read from the point of view of the path's first node:
//! the result says what the *last* node is to the first.

use serde::Serialize;

use crate::model::{ParentRole, Step};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Kinship {
    Same,
    Spouse,
    /// `generations` up. `role` qualifies a direct non-biological parent.
    Ancestor { generations: u32, role: Option<ParentRole> },
    Descendant { generations: u32, role: Option<ParentRole> },
    Sibling { half: bool },
    /// 1 = uncle/aunt, 2 = great-uncle/aunt, ...
    AuntUncle { generations: u32, half: bool },
    NieceNephew { generations: u32, half: bool },
    Cousin { degree: u32, removal: u32, half: bool },
    /// Spouse of an ancestor `generations` up who is not that ancestor's
    /// co-parent on the path: 1 = step-parent, 2 = step-grandparent.
    StepParent { generations: u32 },
    StepChild { generations: u32 },
    StepSibling,
    InLaw { of: Box<Kinship> },
    /// Reachable, but the path has no genealogical name.
    Connected,
}

impl Kinship {
    /// The same relationship seen from the other end.
    pub fn inverse(&self) -> Kinship {
        match self {
            Kinship::Ancestor { generations, role } => Kinship::Descendant { generations: *generations, role: *role },
            Kinship::Descendant { generations, role } => Kinship::Ancestor { generations: *generations, role: *role },
            Kinship::AuntUncle { generations, half } => Kinship::NieceNephew { generations: *generations, half: *half },
            Kinship::NieceNephew { generations, half } => Kinship::AuntUncle { generations: *generations, half: *half },
            Kinship::StepParent { generations } => Kinship::StepChild { generations: *generations },
            Kinship::StepChild { generations } => Kinship::StepParent { generations: *generations },
            Kinship::InLaw { of } => Kinship::InLaw { of: Box::new(of.inverse()) },
            other => other.clone(),
        }
    }

    pub fn is_half(&self) -> bool {
        match self {
            Kinship::Sibling { half }
            | Kinship::AuntUncle { half, .. }
            | Kinship::NieceNephew { half, .. }
            | Kinship::Cousin { half, .. } => *half,
            Kinship::InLaw { of } => of.is_half(),
            _ => false,
        }
    }

    pub(crate) fn mark_half(&mut self) {
        match self {
            Kinship::Sibling { half }
            | Kinship::AuntUncle { half, .. }
            | Kinship::NieceNephew { half, .. }
            | Kinship::Cousin { half, .. } => *half = true,
            Kinship::InLaw { of } => of.mark_half(),
            _ => {}
        }
    }
}

/// Result of shape analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kinship: Kinship,
    /// Path positions of the two nodes either side of the pivot, whose
    /// shared parents decide full versus half.
    pub pivot: Option<(usize, usize)>,
    /// Generations from the first node up to the pivot and down to the last.
    pub up: u32,
    pub down: u32,
}

impl Classified {
    fn plain(kinship: Kinship) -> Self {
        Self { kinship, pivot: None, up: 0, down: 0 }
    }
}

pub fn classify(moves: &[Step]) -> Classified {
    use Step::*;
    match moves {
        [] => return Classified::plain(Kinship::Same),
        [Spouse] => return Classified::plain(Kinship::Spouse),
        [Up(_), Spouse, Down(_)] => return Classified::plain(Kinship::StepSibling),
        [ups @ .., Spouse] if ups.iter().all(|s| matches!(s, Up(_))) => {
            return Classified::plain(Kinship::StepParent { generations: ups.len() as u32 });
        }
        [Spouse, downs @ ..] if downs.iter().all(|s| matches!(s, Down(_))) => {
            return Classified::plain(Kinship::StepChild { generations: downs.len() as u32 });
        }
        _ => {}
    }

    let lead = usize::from(moves[0] == Spouse);
    let trail = usize::from(moves.len() > lead && moves[moves.len() - 1] == Spouse);
    let core = &moves[lead..moves.len() - trail];
    let Some(mut found) = blood(core, lead) else {
        return Classified::plain(Kinship::Connected);
    };
    if lead + trail > 0 {
        found.kinship = Kinship::InLaw { of: Box::new(found.kinship) };
    }
    found
}

/// `Up* [Sibling] Down*`, or nothing. A sibling step stands for one
/// generation up and one down through unrecorded parents.
fn blood(core: &[Step], offset: usize) -> Option<Classified> {
    let ups = core.iter().take_while(|s| matches!(s, Step::Up(_))).count();
    let rest = &core[ups..];
    let sib = usize::from(rest.first() == Some(&Step::Sibling));
    let rest = &rest[sib..];
    let downs = rest.iter().take_while(|s| matches!(s, Step::Down(_))).count();
    if core.is_empty() || downs != rest.len() {
        return None;
    }

    let (u, d) = ((ups + sib) as u32, (downs + sib) as u32);
    let direct = |step: &Step| match step {
        Step::Up(role) | Step::Down(role) if *role != ParentRole::Biological => Some(*role),
        _ => None,
    };
    let kinship = match (u, d) {
        (u, 0) => Kinship::Ancestor { generations: u, role: if u == 1 { direct(&core[0]) } else { None } },
        (0, d) => Kinship::Descendant { generations: d, role: if d == 1 { direct(&core[0]) } else { None } },
        (1, 1) => Kinship::Sibling { half: false },
        (u, 1) => Kinship::AuntUncle { generations: u - 1, half: false },
        (1, d) => Kinship::NieceNephew { generations: d - 1, half: false },
        (u, d) => Kinship::Cousin { degree: u.min(d) - 1, removal: u.abs_diff(d), half: false },
    };
    let pivot = match (u > 0 && d > 0, sib == 1) {
        (false, _) => None,
        (true, true) => Some((offset + ups, offset + ups + 1)),
        (true, false) => Some((offset + ups - 1, offset + ups + 1)),
    };
    Some(Classified { kinship, pivot, up: u, down: d })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const UP: Step = Step::Up(ParentRole::Biological);
    const DOWN: Step = Step::Down(ParentRole::Biological);

    fn kin(moves: &[Step]) -> Kinship {
        classify(moves).kinship
    }

    #[test]
    fn test_direct_line() {
        assert_eq!(kin(&[UP]), Kinship::Ancestor { generations: 1, role: None });
        assert_eq!(kin(&[UP, UP, UP]), Kinship::Ancestor { generations: 3, role: None });
        assert_eq!(kin(&[DOWN, DOWN]), Kinship::Descendant { generations: 2, role: None });
        assert_eq!(
            kin(&[Step::Up(ParentRole::Adoptive)]),
            Kinship::Ancestor { generations: 1, role: Some(ParentRole::Adoptive) }
        );
    }

    #[test]
    fn test_collateral() {
        assert_eq!(kin(&[UP, DOWN]), Kinship::Sibling { half: false });
        assert_eq!(kin(&[Step::Sibling]), Kinship::Sibling { half: false });
        assert_eq!(kin(&[UP, UP, DOWN]), Kinship::AuntUncle { generations: 1, half: false });
        assert_eq!(kin(&[UP, DOWN, DOWN]), Kinship::NieceNephew { generations: 1, half: false });
        assert_eq!(kin(&[UP, UP, DOWN, DOWN]), Kinship::Cousin { degree: 1, removal: 0, half: false });
        assert_eq!(kin(&[UP, Step::Sibling, DOWN]), Kinship::Cousin { degree: 1, removal: 0, half: false });
        // Child of a first cousin: up three, down two.
        assert_eq!(kin(&[UP, UP, UP, DOWN, DOWN]), Kinship::Cousin { degree: 1, removal: 1, half: false });
    }

    #[test]
    fn test_pivot_positions() {
        let c = classify(&[UP, UP, DOWN, DOWN]);
        assert_eq!(c.pivot, Some((1, 3)));
        assert_eq!((c.up, c.down), (2, 2));
        assert_eq!(classify(&[UP, Step::Sibling, DOWN]).pivot, Some((1, 2)));
        assert_eq!(classify(&[Step::Spouse, UP, DOWN]).pivot, Some((1, 3)));
        assert_eq!(classify(&[UP]).pivot, None);
    }

    #[test]
    fn test_marriage_shapes() {
        assert_eq!(kin(&[Step::Spouse]), Kinship::Spouse);
        assert_eq!(kin(&[UP, Step::Spouse]), Kinship::StepParent { generations: 1 });
        assert_eq!(kin(&[Step::Spouse, DOWN]), Kinship::StepChild { generations: 1 });
        assert_eq!(kin(&[UP, UP, Step::Spouse]), Kinship::StepParent { generations: 2 });
        assert_eq!(kin(&[Step::Spouse, DOWN, DOWN, DOWN]), Kinship::StepChild { generations: 3 });
        assert_eq!(kin(&[UP, Step::Spouse, DOWN]), Kinship::StepSibling);
        assert_eq!(kin(&[Step::Spouse, UP]), Kinship::InLaw { of: Box::new(Kinship::Ancestor { generations: 1, role: None }) });
        assert_eq!(kin(&[Step::Spouse, Step::Sibling]), Kinship::InLaw { of: Box::new(Kinship::Sibling { half: false }) });
        assert_eq!(
            kin(&[UP, UP, DOWN, Step::Spouse]),
            Kinship::InLaw { of: Box::new(Kinship::AuntUncle { generations: 1, half: false }) }
        );
        assert_eq!(kin(&[Step::Spouse, Step::Spouse]), Kinship::Connected);
        // Co-parents share a child but are not kin.
        assert_eq!(kin(&[DOWN, UP]), Kinship::Connected);
    }

    #[test]
    fn test_inverse_matches_reversed_shape() {
        let shapes: &[&[Step]] = &[
            &[UP],
            &[UP, UP, DOWN],
            &[UP, UP, UP, DOWN, DOWN],
            &[Step::Spouse, UP],
            &[UP, Step::Spouse],
            &[UP, UP, Step::Spouse],
        ];
        for moves in shapes {
            let reversed: Vec<Step> = moves.iter().rev().map(|s| s.inverse()).collect();
            assert_eq!(kin(&reversed), kin(moves).inverse(), "{moves:?}");
        }
    }
}
