//! The seven-element dominance table.
//!
//! Neutral never modifies. Holy and Shadow are each other's maximal
//! weakness, in both directions. The four natural elements form a cycle
//! (Fire > Wind > Earth > Water > Fire) at the configured advantage /
//! disadvantage rates. Configuration may override any specific pair.

use gatefall_core::{CombatConfig, Element, ElementPairRule};

/// Damage modifier in basis points for `attacker` hitting `defender`.
#[must_use]
pub fn modifier_bp(
    config: &CombatConfig,
    overrides: &[ElementPairRule],
    attacker: Element,
    defender: Element,
) -> u32 {
    if let Some(rule) = overrides
        .iter()
        .find(|r| r.attacker == attacker && r.defender == defender)
    {
        return rule.modifier_bp;
    }
    if attacker == Element::Neutral || defender == Element::Neutral {
        return 10_000;
    }
    match (attacker, defender) {
        (Element::Holy, Element::Shadow) | (Element::Shadow, Element::Holy) => {
            config.holy_shadow_bp
        }
        _ if dominates(attacker, defender) => config.element_advantage_bp,
        _ if dominates(defender, attacker) => config.element_disadvantage_bp,
        _ => 10_000,
    }
}

/// The natural cycle: Fire > Wind > Earth > Water > Fire.
const fn dominates(attacker: Element, defender: Element) -> bool {
    matches!(
        (attacker, defender),
        (Element::Fire, Element::Wind)
            | (Element::Wind, Element::Earth)
            | (Element::Earth, Element::Water)
            | (Element::Water, Element::Fire)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CombatConfig {
        CombatConfig::default()
    }

    #[test]
    fn neutral_is_flat_both_ways() {
        let c = config();
        for element in Element::ALL {
            assert_eq!(modifier_bp(&c, &[], Element::Neutral, element), 10_000);
            assert_eq!(modifier_bp(&c, &[], element, Element::Neutral), 10_000);
        }
    }

    #[test]
    fn holy_shadow_mutual_weakness() {
        let c = config();
        assert_eq!(
            modifier_bp(&c, &[], Element::Holy, Element::Shadow),
            c.holy_shadow_bp
        );
        assert_eq!(
            modifier_bp(&c, &[], Element::Shadow, Element::Holy),
            c.holy_shadow_bp
        );
    }

    #[test]
    fn natural_cycle_advantage_and_disadvantage() {
        let c = config();
        assert_eq!(
            modifier_bp(&c, &[], Element::Fire, Element::Wind),
            c.element_advantage_bp
        );
        assert_eq!(
            modifier_bp(&c, &[], Element::Wind, Element::Fire),
            c.element_disadvantage_bp
        );
        // Non-adjacent natural pair is flat.
        assert_eq!(modifier_bp(&c, &[], Element::Fire, Element::Earth), 10_000);
    }

    #[test]
    fn override_wins_over_defaults() {
        let c = config();
        let rules = [ElementPairRule {
            attacker: Element::Fire,
            defender: Element::Wind,
            modifier_bp: 9_999,
        }];
        assert_eq!(modifier_bp(&c, &rules, Element::Fire, Element::Wind), 9_999);
        // Reverse direction untouched.
        assert_eq!(
            modifier_bp(&c, &rules, Element::Wind, Element::Fire),
            c.element_disadvantage_bp
        );
    }
}
