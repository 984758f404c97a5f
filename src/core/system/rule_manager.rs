use super::*;
use crate::{base::RampartRule, logging, utils};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

pub type RuleMap = HashMap<MetricType, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: RwLock<RuleMap> = RwLock::new(RuleMap::new());
    static ref CURRENT_RULES: Mutex<Vec<Arc<Rule>>> = Mutex::new(Vec::new());
}

/// `get_rules` returns all the system protection rules currently in effect.
// This func acquires a read lock on the global `RULE_MAP`,
// please release the lock before calling this func
pub fn get_rules() -> Vec<Arc<Rule>> {
    let rule_map = RULE_MAP.read().unwrap();
    let mut rules = Vec::with_capacity(rule_map.len());
    for set in rule_map.values() {
        rules.extend(set.iter().cloned());
    }
    rules
}

/// `append_rule` adds a single rule without touching the other ones.
/// Returns false if an equal rule is already loaded.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    if RULE_MAP
        .read()
        .unwrap()
        .get(&rule.metric_type)
        .map(|set| set.contains(&rule))
        .unwrap_or(false)
    {
        return false;
    }

    match rule.is_valid() {
        Ok(_) => {
            RULE_MAP
                .write()
                .unwrap()
                .entry(rule.metric_type)
                .or_default()
                .insert(Arc::clone(&rule));
            CURRENT_RULES.lock().unwrap().push(rule);
        }
        Err(err) => {
            logging::warn!(
                "[System append_rule] Ignoring invalid rule {:?}, reason: {:?}",
                rule,
                err
            );
            return false;
        }
    };
    true
}

/// `remove_rule` removes one previously appended or loaded rule.
/// Returns false if no equal rule was loaded.
pub fn remove_rule(rule: &Arc<Rule>) -> bool {
    let mut removed = false;
    if let Some(set) = RULE_MAP.write().unwrap().get_mut(&rule.metric_type) {
        removed = set.remove(rule);
    }
    if removed {
        CURRENT_RULES.lock().unwrap().retain(|r| r != rule);
    }
    removed
}

/// `load_rules` replaces all previously loaded system rules with the given ones.
// This func acquires the lock on global `CURRENT_RULES`,
// please release the lock before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut current_rules = CURRENT_RULES.lock().unwrap();
    if *current_rules == rules {
        logging::info!(
            "[System] Load rules is the same with current rules, so ignore load operation."
        );
        return;
    }

    // invalid rules are dropped here
    let m = build_rule_map(rules.clone());

    let start = utils::curr_time_nanos();
    let mut rule_map = RULE_MAP.write().unwrap();
    *rule_map = m;

    logging::debug!(
        "[System load_rules] Time statistic(ns) for updating system rules, timeCost {:?}",
        utils::curr_time_nanos() - start
    );
    logging::info!("[SystemRuleManager] System rules loaded, rules {:?}", rule_map);
    *current_rules = rules;
}

/// `clear_rules` clears all the loaded system rules.
// This func acquires the locks on global `CURRENT_RULES` and `RULE_MAP`,
// please release the locks before calling this func
pub fn clear_rules() {
    CURRENT_RULES.lock().unwrap().clear();
    RULE_MAP.write().unwrap().clear();
}

fn build_rule_map(rules: Vec<Arc<Rule>>) -> RuleMap {
    let mut m = RuleMap::new();
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[System build_rule_map] Ignoring invalid system rule, rule: {:?}, error: {:?}",
                rule,
                err
            );
            continue;
        }
        m.entry(rule.metric_type).or_default().insert(rule);
    }
    m
}

#[cfg(test)]
mod test {
    //! These tests share the global rule map, hence the `#[ignore]` attribute
    //! on the ones that must not interleave with each other.
    use super::*;

    #[test]
    fn invalid_build_map() {
        let rules = vec![Arc::new(Rule {
            metric_type: MetricType::InboundQPS,
            threshold: -1.0,
            ..Default::default()
        })];
        let map = build_rule_map(rules);
        assert_eq!(0, map.len());
    }

    #[test]
    fn valid_build_map() {
        let rules = vec![
            Arc::new(Rule {
                metric_type: MetricType::InboundQPS,
                threshold: 1.0,
                ..Default::default()
            }),
            Arc::new(Rule {
                metric_type: MetricType::Concurrency,
                threshold: 2.0,
                ..Default::default()
            }),
        ];
        let map = build_rule_map(rules);
        assert_eq!(2, map.len());
    }

    #[test]
    fn duplicate_metric_types_merge() {
        let rules = vec![
            Arc::new(Rule {
                metric_type: MetricType::AvgRT,
                threshold: 1.0,
                ..Default::default()
            }),
            Arc::new(Rule {
                metric_type: MetricType::AvgRT,
                threshold: 2.0,
                ..Default::default()
            }),
        ];
        let map = build_rule_map(rules);
        assert_eq!(1, map.len());
        assert_eq!(2, map[&MetricType::AvgRT].len());
    }

    #[test]
    #[ignore]
    fn load_append_remove() {
        load_rules(vec![Arc::new(Rule {
            metric_type: MetricType::InboundQPS,
            threshold: 10.0,
            ..Default::default()
        })]);
        assert_eq!(1, get_rules().len());

        let extra = Arc::new(Rule {
            metric_type: MetricType::Concurrency,
            threshold: 8.0,
            ..Default::default()
        });
        assert!(append_rule(Arc::clone(&extra)));
        assert!(!append_rule(Arc::clone(&extra)));
        assert_eq!(2, get_rules().len());

        assert!(remove_rule(&extra));
        assert!(!remove_rule(&extra));
        assert_eq!(1, get_rules().len());

        clear_rules();
        assert_eq!(0, get_rules().len());
        assert_eq!(0, CURRENT_RULES.lock().unwrap().len());
    }
}
