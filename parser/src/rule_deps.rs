//! Checks code written against particular versions of grammar rules.
//!
//! Each [`RuleDependency`] says "this code was written for version N of
//! rule R, and also relies on these related rules". When a rule (or one of
//! the related rules) has a higher version than declared, the code is out
//! of date. This runs offline, e.g. from a test, never while parsing.

use std::fmt::Write;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{api::GrammarInfo, atn::Atn, atn::TransitionKind, context::AltSet};

/// Which rules related to the declared one the dependency covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dependents {
    #[serde(rename = "self")]
    SelfRule,
    Parents,
    Children,
    Ancestors,
    Descendants,
    Siblings,
    PrecedingSiblings,
    FollowingSiblings,
    Preceding,
    Following,
}

impl Dependents {
    fn is_implemented(&self) -> bool {
        matches!(
            self,
            Dependents::SelfRule
                | Dependents::Parents
                | Dependents::Children
                | Dependents::Ancestors
                | Dependents::Descendants
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDependency {
    pub rule: usize,
    pub version: i32,
    #[serde(default)]
    pub dependents: Vec<Dependents>,
}

impl RuleDependency {
    pub fn new(rule: usize, version: i32, dependents: &[Dependents]) -> Self {
        RuleDependency {
            rule,
            version,
            dependents: dependents.to_vec(),
        }
    }
}

/// Caller/callee relation between rules, as seen in rule transitions.
pub struct RuleRelations {
    parents: Vec<AltSet>,
    children: Vec<AltSet>,
}

impl RuleRelations {
    pub fn new(num_rules: usize) -> Self {
        RuleRelations {
            parents: (0..num_rules)
                .map(|_| AltSet::with_capacity(num_rules))
                .collect(),
            children: (0..num_rules)
                .map(|_| AltSet::with_capacity(num_rules))
                .collect(),
        }
    }

    pub fn from_atn(atn: &Atn) -> Self {
        let mut rel = Self::new(atn.num_rules());
        for s in &atn.states {
            if !s.epsilon_only_transitions {
                continue;
            }
            let caller = match s.rule_index {
                Some(r) => r,
                None => continue,
            };
            for t in &s.transitions {
                if let TransitionKind::Rule { rule_index, .. } = t.kind {
                    rel.add_rule_invocation(caller, rule_index);
                }
            }
        }
        rel
    }

    /// Returns false if the invocation was already known.
    pub fn add_rule_invocation(&mut self, caller: usize, callee: usize) -> bool {
        if self.children[caller].contains(callee) {
            return false;
        }
        self.children[caller].insert(callee);
        self.parents[callee].insert(caller);
        true
    }

    pub fn parents(&self, rule: usize) -> &AltSet {
        &self.parents[rule]
    }

    pub fn children(&self, rule: usize) -> &AltSet {
        &self.children[rule]
    }

    pub fn ancestors(&self, rule: usize) -> AltSet {
        closure(&self.parents, rule)
    }

    pub fn descendants(&self, rule: usize) -> AltSet {
        closure(&self.children, rule)
    }
}

fn closure(edges: &[AltSet], rule: usize) -> AltSet {
    let mut result = edges[rule].clone();
    loop {
        let before = result.len();
        let current: Vec<usize> = result.iter().collect();
        for r in current {
            result.union_with(&edges[r]);
        }
        if result.len() == before {
            return result;
        }
    }
}

/// Validates `dependencies` against the rule versions in `info`. All
/// problems are collected into a single error, one per line.
pub fn check_dependencies(
    atn: &Atn,
    info: &GrammarInfo,
    dependencies: &[RuleDependency],
) -> Result<()> {
    let relations = RuleRelations::from_atn(atn);
    let num_rules = info.rule_names.len();
    let version = |r: usize| info.rule_versions.get(r).copied().unwrap_or(0);
    let mut errors = String::new();

    for dep in dependencies {
        if dep.rule >= num_rules {
            writeln!(
                errors,
                "Rule dependency on unknown rule {}@{} in {}",
                dep.rule, dep.version, info.name
            )?;
            continue;
        }
        let rule_name = info.rule_name(dep.rule);

        let unimplemented: Vec<String> = dep
            .dependents
            .iter()
            .filter(|d| !d.is_implemented())
            .map(|d| format!("{:?}", d))
            .collect();
        if !unimplemented.is_empty() {
            writeln!(
                errors,
                "Cannot validate the following dependents of rule {}: [{}]",
                dep.rule,
                unimplemented.join(", ")
            )?;
        }

        let check = |errors: &mut String, related: usize, relation: Option<&str>| {
            let path = match relation {
                None => rule_name.to_string(),
                Some(rel) => format!("rule {} ({} of {})", info.rule_name(related), rel, rule_name),
            };
            let actual = version(related);
            if actual > dep.version {
                let _ = writeln!(
                    errors,
                    "Rule dependency version mismatch: {} has version {} (expected <= {}) in {}",
                    path, actual, dep.version, info.name
                );
            }
            actual
        };

        let mut highest = check(&mut errors, dep.rule, None);
        let mut checked = AltSet::with_capacity(num_rules);
        let related: [(Dependents, AltSet, &str); 4] = [
            (
                Dependents::Parents,
                relations.parents(dep.rule).clone(),
                "parent",
            ),
            (
                Dependents::Children,
                relations.children(dep.rule).clone(),
                "child",
            ),
            (
                Dependents::Ancestors,
                relations.ancestors(dep.rule),
                "ancestor",
            ),
            (
                Dependents::Descendants,
                relations.descendants(dep.rule),
                "descendant",
            ),
        ];
        for (kind, rules, relation) in related.iter() {
            if !dep.dependents.contains(kind) {
                continue;
            }
            for r in rules.iter() {
                if r >= num_rules || checked.contains(r) {
                    continue;
                }
                checked.insert(r);
                highest = highest.max(check(&mut errors, r, Some(*relation)));
            }
        }

        if dep.version > highest {
            writeln!(
                errors,
                "Rule dependency version mismatch: {} has maximum dependency version {} (expected {}) in {}",
                rule_name, highest, dep.version, info.name
            )?;
        }
    }

    if !errors.is_empty() {
        bail!("{}", errors.trim_end());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::{
        builder::{rule, tok, AtnBuilder},
        deserializer::AtnDeserializer,
    };

    fn grammar(versions: &[(&str, i32)]) -> (Atn, GrammarInfo) {
        let mut l = AtnBuilder::lexer("L");
        l.rule("A", crate::atn::builder::lit("a"));
        let l = l.build().unwrap();
        let mut p = AtnBuilder::parser("P", &l.info);
        p.rule("s", rule("t")).rule("t", rule("u")).rule("u", tok("A"));
        for (name, v) in versions {
            p.set_version(name, *v);
        }
        let g = p.build().unwrap();
        let atn = AtnDeserializer::new().deserialize(&g.serialized_atn).unwrap();
        (atn, g.info)
    }

    #[test]
    fn relations() {
        let (atn, _) = grammar(&[]);
        let rel = RuleRelations::from_atn(&atn);
        assert_eq!(rel.children(0).iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(rel.parents(2).iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(rel.descendants(0).iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rel.ancestors(2).iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn version_checks() {
        let (atn, info) = grammar(&[("s", 1), ("u", 3)]);
        assert!(check_dependencies(&atn, &info, &[RuleDependency::new(0, 1, &[])]).is_ok());
        assert!(check_dependencies(
            &atn,
            &info,
            &[RuleDependency::new(0, 3, &[Dependents::Descendants])]
        )
        .is_ok());

        let err = check_dependencies(
            &atn,
            &info,
            &[RuleDependency::new(0, 1, &[Dependents::Descendants])],
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("rule u (descendant of s) has version 3"), "{}", err);

        let err = check_dependencies(
            &atn,
            &info,
            &[
                RuleDependency::new(0, 2, &[Dependents::Siblings]),
                RuleDependency::new(9, 0, &[]),
            ],
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("Cannot validate"), "{}", err);
        assert!(err.contains("maximum dependency version 1 (expected 2)"), "{}", err);
        assert!(err.contains("unknown rule 9@0"), "{}", err);
    }
}
