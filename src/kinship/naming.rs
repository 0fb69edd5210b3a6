//! English kinship terms.

use crate::model::{ParentRole, Sex};

use super::classify::Kinship;

/// Neutral, male and female forms of one term.
struct Terms {
    neutral: String,
    male: String,
    female: String,
}

impl Terms {
    fn new(neutral: impl Into<String>, male: impl Into<String>, female: impl Into<String>) -> Self {
        Self { neutral: neutral.into(), male: male.into(), female: female.into() }
    }

    fn same(term: impl Into<String>) -> Self {
        let term = term.into();
        Self::new(term.clone(), term.clone(), term)
    }

    fn map(self, f: impl Fn(String) -> String) -> Self {
        Self { neutral: f(self.neutral), male: f(self.male), female: f(self.female) }
    }

    fn pick(self, sex: Sex) -> String {
        match sex {
            Sex::Male => self.male,
            Sex::Female => self.female,
            Sex::Unknown => self.neutral,
        }
    }
}

impl Kinship {
    /// Sex-neutral label, e.g. `first cousin once removed`, `uncle/aunt-in-law`.
    pub fn label(&self) -> String {
        self.terms().neutral
    }

    /// Label using the sex of the person being described.
    pub fn gendered_label(&self, sex: Sex) -> String {
        self.terms().pick(sex)
    }

    fn terms(&self) -> Terms {
        match self {
            Kinship::Same => Terms::same("self"),
            Kinship::Spouse => Terms::new("spouse", "husband", "wife"),
            Kinship::Ancestor { generations: 1, role } => parent_terms(*role),
            Kinship::Ancestor { generations, .. } => {
                let g = greats(generations.saturating_sub(2));
                Terms::new(format!("{g}grandparent"), format!("{g}grandfather"), format!("{g}grandmother"))
            }
            Kinship::Descendant { generations: 1, role } => child_terms(*role),
            Kinship::Descendant { generations, .. } => {
                let g = greats(generations.saturating_sub(2));
                Terms::new(format!("{g}grandchild"), format!("{g}grandson"), format!("{g}granddaughter"))
            }
            Kinship::Sibling { half } => {
                let h = if *half { "half-" } else { "" };
                Terms::new(format!("{h}sibling"), format!("{h}brother"), format!("{h}sister"))
            }
            Kinship::AuntUncle { generations, half } => {
                let p = prefix(*half, generations.saturating_sub(1));
                Terms::new(format!("{p}uncle/aunt"), format!("{p}uncle"), format!("{p}aunt"))
            }
            Kinship::NieceNephew { generations, half } => {
                let p = prefix(*half, generations.saturating_sub(1));
                Terms::new(format!("{p}nephew/niece"), format!("{p}nephew"), format!("{p}niece"))
            }
            Kinship::Cousin { degree, removal, half } => {
                let h = if *half { "half " } else { "" };
                let mut term = format!("{h}{} cousin", ordinal_word(*degree));
                if *removal > 0 {
                    term.push(' ');
                    term.push_str(&times(*removal));
                    term.push_str(" removed");
                }
                Terms::same(term)
            }
            Kinship::StepParent { generations: 1 } => parent_terms(Some(ParentRole::Step)),
            Kinship::StepParent { generations } => {
                let g = greats(generations.saturating_sub(2));
                Terms::new(format!("step-{g}grandparent"), format!("step-{g}grandfather"), format!("step-{g}grandmother"))
            }
            Kinship::StepChild { generations: 1 } => child_terms(Some(ParentRole::Step)),
            Kinship::StepChild { generations } => {
                let g = greats(generations.saturating_sub(2));
                Terms::new(format!("step-{g}grandchild"), format!("step-{g}grandson"), format!("step-{g}granddaughter"))
            }
            Kinship::StepSibling => Terms::new("step-sibling", "stepbrother", "stepsister"),
            Kinship::InLaw { of } => of.terms().map(|t| format!("{t}-in-law")),
            Kinship::Connected => Terms::same("relative"),
        }
    }
}

fn parent_terms(role: Option<ParentRole>) -> Terms {
    match role {
        None | Some(ParentRole::Biological) => Terms::new("parent", "father", "mother"),
        Some(ParentRole::Adoptive) => Terms::new("adoptive parent", "adoptive father", "adoptive mother"),
        Some(ParentRole::Step) => Terms::new("step-parent", "stepfather", "stepmother"),
        Some(ParentRole::Foster) => Terms::new("foster parent", "foster father", "foster mother"),
        Some(ParentRole::Guardian) => Terms::same("guardian"),
    }
}

fn child_terms(role: Option<ParentRole>) -> Terms {
    match role {
        None | Some(ParentRole::Biological) => Terms::new("child", "son", "daughter"),
        Some(ParentRole::Adoptive) => Terms::new("adopted child", "adopted son", "adopted daughter"),
        Some(ParentRole::Step) => Terms::new("stepchild", "stepson", "stepdaughter"),
        Some(ParentRole::Foster) => Terms::new("foster child", "foster son", "foster daughter"),
        Some(ParentRole::Guardian) => Terms::same("ward"),
    }
}

fn prefix(half: bool, greats_count: u32) -> String {
    let h = if half { "half-" } else { "" };
    format!("{h}{}", greats(greats_count))
}

/// `""`, `"great-"`, `"great-great-"`, then `"3rd great-"`, ...
pub fn greats(n: u32) -> String {
    match n {
        0..=2 => "great-".repeat(n as usize),
        n => format!("{} great-", ordinal_number(n)),
    }
}

/// `first` .. `tenth`, then `11th`, `21st`, ...
pub fn ordinal_word(n: u32) -> String {
    const WORDS: [&str; 10] =
        ["first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth"];
    match n {
        1..=10 => WORDS[n as usize - 1].to_owned(),
        n => ordinal_number(n),
    }
}

pub fn ordinal_number(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// `once`, `twice`, `thrice`, then `4 times`.
pub fn times(n: u32) -> String {
    match n {
        1 => "once".to_owned(),
        2 => "twice".to_owned(),
        3 => "thrice".to_owned(),
        n => format!("{n} times"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cousin_labels() {
        let k = Kinship::Cousin { degree: 1, removal: 1, half: false };
        assert_eq!(k.label(), "first cousin once removed");
        let k = Kinship::Cousin { degree: 2, removal: 0, half: false };
        assert_eq!(k.label(), "second cousin");
        let k = Kinship::Cousin { degree: 12, removal: 4, half: true };
        assert_eq!(k.label(), "half 12th cousin 4 times removed");
    }

    #[test]
    fn test_generational_labels() {
        let k = Kinship::Ancestor { generations: 1, role: None };
        assert_eq!(k.label(), "parent");
        assert_eq!(k.gendered_label(Sex::Female), "mother");
        let k = Kinship::Ancestor { generations: 3, role: None };
        assert_eq!(k.gendered_label(Sex::Male), "great-grandfather");
        let k = Kinship::Descendant { generations: 5, role: None };
        assert_eq!(k.label(), "3rd great-grandchild");
        let k = Kinship::Descendant { generations: 1, role: Some(ParentRole::Adoptive) };
        assert_eq!(k.gendered_label(Sex::Male), "adopted son");
        let k = Kinship::AuntUncle { generations: 2, half: false };
        assert_eq!(k.gendered_label(Sex::Female), "great-aunt");
    }

    #[test]
    fn test_sibling_and_in_law_labels() {
        assert_eq!(Kinship::Sibling { half: true }.label(), "half-sibling");
        assert_eq!(Kinship::Sibling { half: true }.gendered_label(Sex::Male), "half-brother");
        let k = Kinship::InLaw { of: Box::new(Kinship::AuntUncle { generations: 1, half: false }) };
        assert_eq!(k.label(), "uncle/aunt-in-law");
        assert_eq!(k.gendered_label(Sex::Male), "uncle-in-law");
        let k = Kinship::InLaw { of: Box::new(Kinship::Descendant { generations: 1, role: None }) };
        assert_eq!(k.gendered_label(Sex::Female), "daughter-in-law");
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(Kinship::StepParent { generations: 1 }.gendered_label(Sex::Female), "stepmother");
        assert_eq!(Kinship::StepParent { generations: 2 }.label(), "step-grandparent");
        assert_eq!(Kinship::StepParent { generations: 3 }.gendered_label(Sex::Male), "step-great-grandfather");
        assert_eq!(Kinship::StepChild { generations: 2 }.gendered_label(Sex::Female), "step-granddaughter");
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal_number(11), "11th");
        assert_eq!(ordinal_number(22), "22nd");
        assert_eq!(ordinal_number(103), "103rd");
        assert_eq!(greats(0), "");
        assert_eq!(greats(2), "great-great-");
    }
}
