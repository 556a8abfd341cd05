//! Opening classifier: flag vector to the set of matching rule indices.
//!
//! Pure and stateless. Safe to share across threads.

use crate::{
    opening::{OpeningRule, OpeningRuleTable},
    types::OpeningIndex,
};
use std::sync::Arc;

/// Non-empty, ascending set of rule indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpeningSet(Vec<OpeningIndex>);

impl OpeningSet {
    pub fn single(index: OpeningIndex) -> Self {
        Self(vec![index])
    }

    pub fn as_slice(&self) -> &[OpeningIndex] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = OpeningIndex> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, index: OpeningIndex) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// True if any inclusion group has all of its bits set.
pub fn inclusion_satisfied(rule: &OpeningRule, flags: u32) -> bool {
    rule.inclusion_groups.iter().any(|&group| flags & group == group)
}

/// True if any bit of any exclusion group is set.
pub fn exclusion_violated(rule: &OpeningRule, flags: u32) -> bool {
    flags & rule.exclusion_mask() != 0
}

pub fn rule_matches(rule: &OpeningRule, flags: u32) -> bool {
    inclusion_satisfied(rule, flags) && !exclusion_violated(rule, flags)
}

#[derive(Debug, Clone)]
pub struct OpeningClassifier {
    table: Arc<OpeningRuleTable>,
}

impl OpeningClassifier {
    pub fn new(table: Arc<OpeningRuleTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &OpeningRuleTable {
        &self.table
    }

    /// Every rule the flags satisfy, or `{Unknown}` when none do.
    pub fn classify(&self, flags: u32) -> OpeningSet {
        let matched: Vec<OpeningIndex> = self
            .table
            .evaluable()
            .iter()
            .filter(|rule| rule_matches(rule, flags))
            .map(|rule| rule.index)
            .collect();
        if matched.is_empty() {
            OpeningSet::single(self.table.unknown_index())
        } else {
            OpeningSet(matched)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opening::OpeningFlag::{self, *};
    use crate::rng::{CorpusRng, RngSlot};

    fn classifier() -> OpeningClassifier {
        OpeningClassifier::new(Arc::new(OpeningRuleTable::standard()))
    }

    fn flags(set: &[OpeningFlag]) -> u32 {
        set.iter().fold(0, |acc, f| acc | f.mask())
    }

    fn idx(c: &OpeningClassifier, name: &str) -> usize {
        c.table().index_of(name).expect("rule exists")
    }

    #[test]
    fn maa_without_drush_matches_only_maa_any() {
        let c = classifier();
        // A scout follow-up keeps MAA_No_Feudal_Followup out.
        let got = c.classify(flags(&[Maa, FeudalScoutFollowup]));
        assert_eq!(got.as_slice(), &[idx(&c, "MAA_Any")]);
    }

    #[test]
    fn maa_range_followup_also_matches_parent() {
        let c = classifier();
        let got = c.classify(flags(&[Maa, FeudalArcherFollowup]));
        assert_eq!(
            got.as_slice(),
            &[idx(&c, "MAA_Any"), idx(&c, "MAA_Range_Followup")]
        );
    }

    #[test]
    fn drush_excludes_maa() {
        let c = classifier();
        let got = c.classify(flags(&[Maa, PremillDrush]));
        assert!(!got.contains(idx(&c, "MAA_Any")));
        assert!(got.contains(idx(&c, "Premill_Drush_Any")));
    }

    #[test]
    fn empty_flags_fall_back_to_unknown() {
        let c = classifier();
        assert_eq!(c.classify(0).as_slice(), &[c.table().unknown_index()]);
    }

    #[test]
    fn sentinel_bit_alone_is_unknown() {
        let c = classifier();
        let got = c.classify(Unused.mask());
        assert_eq!(got.as_slice(), &[c.table().unknown_index()]);
    }

    #[test]
    fn straight_fc_only_without_feudal_commitment() {
        let c = classifier();
        let fc = idx(&c, "Straight_FC");
        assert_eq!(c.classify(FastCastle.mask()).as_slice(), &[fc]);
        assert!(!c.classify(flags(&[FastCastle, Maa])).contains(fc));
    }

    #[test]
    fn any_inclusion_group_is_enough() {
        let c = classifier();
        let range = idx(&c, "Range_Opener_Any");
        assert!(c.classify(FeudalArcherOpening.mask()).contains(range));
        assert!(c.classify(FeudalSkirmOpening.mask()).contains(range));
    }

    #[test]
    fn unknown_iff_no_other_rule_matches() {
        let c = classifier();
        let unknown = c.table().unknown_index();
        let mut rng = CorpusRng::new(0xC1A5_5111, RngSlot::Flags as u64);
        for _ in 0..5_000 {
            let f = (rng.next_u64() as u32) & 0x0FFE;
            let any = c.table().evaluable().iter().any(|r| rule_matches(r, f));
            let got = c.classify(f);
            assert_eq!(got.as_slice() == [unknown], !any, "flags={f:#b}");
            assert!(!got.is_empty());
        }
    }

    #[test]
    fn inclusion_group_order_does_not_change_result() {
        let table = OpeningRuleTable::standard();
        let mut reversed_rules: Vec<OpeningRule> = table.rules().to_vec();
        for rule in &mut reversed_rules {
            rule.inclusion_groups.reverse();
            rule.exclusion_groups.reverse();
        }
        let reversed = OpeningRuleTable::new(table.version, table.basic_count, reversed_rules)
            .expect("valid table");
        let a = OpeningClassifier::new(Arc::new(table));
        let b = OpeningClassifier::new(Arc::new(reversed));
        for f in 0u32..(1 << 12) {
            assert_eq!(a.classify(f), b.classify(f), "flags={f:#b}");
        }
    }
}
