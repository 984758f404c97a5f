use super::*;
use crate::{base::RampartRule, logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// `BreakerGenFn` builds one circuit breaker from a rule, optionally around
/// an existing outcome window taken from a stat-compatible predecessor.
pub type BreakerGenFn =
    dyn Send + Sync + Fn(Arc<Rule>, Option<Arc<CounterLeapArray>>) -> Arc<dyn CircuitBreakerTrait>;

pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<BreakerStrategy, Box<BreakerGenFn>>> = {
        let mut gen_fun_map: HashMap<BreakerStrategy, Box<BreakerGenFn>> = HashMap::new();
        gen_fun_map.insert(
            BreakerStrategy::SlowRequestRatio,
            Box::new(gen_slow_request),
        );
        gen_fun_map.insert(BreakerStrategy::ErrorCount, Box::new(gen_error_count));
        gen_fun_map.insert(BreakerStrategy::ErrorRatio, Box::new(gen_error_ratio));
        RwLock::new(gen_fun_map)
    };
    static ref BREAKER_MAP: RwLock<HashMap<String, Vec<Arc<dyn CircuitBreakerTrait>>>> =
        RwLock::new(HashMap::new());
    static ref STATE_CHANGE_LISTENERS: Mutex<Vec<Arc<dyn StateChangeListener>>> =
        Mutex::new(Vec::new());
    static ref CURRENT_RULES: Mutex<RuleMap> = Mutex::new(HashMap::new());
    static ref BREAKER_RULES: RwLock<RuleMap> = RwLock::new(HashMap::new());
}

pub fn state_change_listeners() -> &'static Mutex<Vec<Arc<dyn StateChangeListener>>> {
    &STATE_CHANGE_LISTENERS
}

use gen_fns::*;
mod gen_fns {
    use super::*;

    pub(super) fn gen_slow_request(
        rule: Arc<Rule>,
        stat: Option<Arc<CounterLeapArray>>,
    ) -> Arc<dyn CircuitBreakerTrait> {
        match stat {
            Some(stat) => Arc::new(SlowRtBreaker::new_with_stat(rule, stat)),
            None => Arc::new(SlowRtBreaker::new(rule)),
        }
    }

    pub(super) fn gen_error_count(
        rule: Arc<Rule>,
        stat: Option<Arc<CounterLeapArray>>,
    ) -> Arc<dyn CircuitBreakerTrait> {
        match stat {
            Some(stat) => Arc::new(ErrorCountBreaker::new_with_stat(rule, stat)),
            None => Arc::new(ErrorCountBreaker::new(rule)),
        }
    }

    pub(super) fn gen_error_ratio(
        rule: Arc<Rule>,
        stat: Option<Arc<CounterLeapArray>>,
    ) -> Arc<dyn CircuitBreakerTrait> {
        match stat {
            Some(stat) => Arc::new(ErrorRatioBreaker::new_with_stat(rule, stat)),
            None => Arc::new(ErrorRatioBreaker::new(rule)),
        }
    }
}

/// `get_rules_of_resource` returns specific resource's rules.
// This func acquires the read lock on global `BREAKER_RULES`,
// please release your write locks on it before calling this func
pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    let breaker_rules = BREAKER_RULES.read().unwrap();
    breaker_rules.get(res).cloned().unwrap_or_default()
}

/// `get_rules` returns all the rules.
// This func acquires the read lock on global `BREAKER_RULES`,
// please release your write locks on it before calling this func
pub fn get_rules() -> Vec<Arc<Rule>> {
    let mut rules = Vec::new();
    let breaker_rules = BREAKER_RULES.read().unwrap();
    for res_rules in breaker_rules.values() {
        for r in res_rules {
            rules.push(Arc::clone(r));
        }
    }
    rules
}

/// `clear_rules` clears all the previous rules.
// This func acquires locks on global `CURRENT_RULES`, `BREAKER_RULES` and `BREAKER_MAP`,
// please release your locks on them before calling this func
pub fn clear_rules() {
    CURRENT_RULES.lock().unwrap().clear();
    BREAKER_RULES.write().unwrap().clear();
    BREAKER_MAP.write().unwrap().clear();
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[CircuitBreakerRuleManager] Circuit breaking rules were cleared")
    } else {
        logging::info!(
            "[CircuitBreakerRuleManager] Circuit breaking rules were loaded: {:?}",
            map.values()
        )
    }
}

/// load_rules replaces old rules with the given circuit breaking rules.
/// The returned `bool` indicates whether the internal maps have been changed.
// This func acquires locks on global `CURRENT_RULES`, `BREAKER_RULES` and `BREAKER_MAP`,
// please release your locks on them before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        let entry = rule_map.entry(rule.resource.clone()).or_default();
        entry.push(rule);
    }

    let mut global_rule_map = CURRENT_RULES.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[CircuitBreaker] Loaded rules is the same with current rules, so ignore load operation."
        );
        return false;
    }

    let valid_rules_map: RuleMap = rule_map
        .iter()
        .map(|(res, rules)| (res.clone(), retain_valid_rules("load_rules", rules)))
        .filter(|(_, rules)| !rules.is_empty())
        .collect();

    let start = utils::curr_time_nanos();
    {
        let mut global_breaker_map = BREAKER_MAP.write().unwrap();
        let mut valid_breaker_map = HashMap::with_capacity(valid_rules_map.len());

        for (res, rules) in valid_rules_map.iter() {
            let mut placeholder = Vec::new();
            let new_cbs_of_res = build_resource_circuit_breaker(
                res,
                rules,
                global_breaker_map.get_mut(res).unwrap_or(&mut placeholder),
            );
            if !new_cbs_of_res.is_empty() {
                valid_breaker_map.insert(res.clone(), new_cbs_of_res);
            }
        }
        log_rule_update(&valid_rules_map);
        *BREAKER_RULES.write().unwrap() = valid_rules_map;
        *global_breaker_map = valid_breaker_map;
        *global_rule_map = rule_map;
    }
    logging::debug!(
        "[CircuitBreaker load_rules] Time statistic(ns) for updating circuit breaking rules, time cost {}",
        utils::curr_time_nanos() - start
    );

    true
}

fn retain_valid_rules(label: &str, rules: &[Arc<Rule>]) -> Vec<Arc<Rule>> {
    rules
        .iter()
        .filter(|rule| match rule.is_valid() {
            Ok(_) => true,
            Err(err) => {
                logging::warn!(
                    "[CircuitBreaker {}] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
                    label,
                    rule,
                    err
                );
                false
            }
        })
        .cloned()
        .collect()
}

/// `load_rules_of_resource` loads the given resource's circuit breaking rules, replacing all
/// previous rules of the resource. The returned `bool` indicates whether a real load happened.
// This func acquires locks on global `CURRENT_RULES`, `BREAKER_RULES` and `BREAKER_MAP`,
// please release your locks on them before calling this func
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let mut global_rule_map = CURRENT_RULES.lock().unwrap();
    let mut global_breaker_map = BREAKER_MAP.write().unwrap();
    // clear resource rules
    if rules.is_empty() {
        global_rule_map.remove(res);
        global_breaker_map.remove(res);
        BREAKER_RULES.write().unwrap().remove(res);
        logging::info!(
            "[CircuitBreaker] clear resource level rules, resource {}",
            res
        );
        return Ok(true);
    }
    if global_rule_map.get(res).unwrap_or(&Vec::new()) == &rules {
        logging::info!("[CircuitBreaker] Load resource level rules is the same with current resource level rules, so ignore load operation.");
        return Ok(false);
    }

    let valid_res_rules = retain_valid_rules("load_rules_of_resource", &rules);
    // the `res` related rules changed, have to update
    let start = utils::curr_time_nanos();
    let mut placeholder = Vec::new();
    let old_res_cbs = global_breaker_map.get_mut(res).unwrap_or(&mut placeholder);

    let valid_res_rules_string = format!("{:?}", &valid_res_rules);
    let new_res_cbs = build_resource_circuit_breaker(res, &valid_res_rules, old_res_cbs);

    if new_res_cbs.is_empty() {
        global_breaker_map.remove(res);
        BREAKER_RULES.write().unwrap().remove(res);
    } else {
        global_breaker_map.insert(res.into(), new_res_cbs);
        BREAKER_RULES
            .write()
            .unwrap()
            .insert(res.into(), valid_res_rules);
    }

    global_rule_map.insert(res.into(), rules);
    logging::debug!(
        "[CircuitBreaker load_rules_of_resource] Time statistic(ns) for updating circuit breaking rules, timeCost: {}",
        utils::curr_time_nanos() - start
    );
    logging::info!(
        "[CircuitBreaker] load resource level rules, resource: {}, valid_res_rules: {}",
        res,
        valid_res_rules_string
    );

    Ok(true)
}

// This func acquires the read lock on global `BREAKER_MAP`,
// please release your write locks on it before calling this func
pub fn get_breakers_of_resource(resource: &str) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    let breakers_map = BREAKER_MAP.read().unwrap();
    breakers_map.get(resource).cloned().unwrap_or_default()
}

/// register_state_change_listeners registers global state change listeners for all circuit breakers.
/// Note: this function is not thread-safe.
pub fn register_state_change_listeners(mut listeners: Vec<Arc<dyn StateChangeListener>>) {
    if listeners.is_empty() {
        return;
    }
    STATE_CHANGE_LISTENERS
        .lock()
        .unwrap()
        .append(&mut listeners);
}

/// clear_state_change_listeners clears all the StateChangeListeners.
/// Note: this function is not thread-safe.
pub fn clear_state_change_listeners() {
    STATE_CHANGE_LISTENERS.lock().unwrap().clear();
}

/// set_circuit_breaker_generator sets the circuit breaker generator for the given strategy.
/// Note that modifying the generator of a built-in strategy is not allowed.
pub fn set_circuit_breaker_generator(
    s: BreakerStrategy,
    generator: Box<BreakerGenFn>,
) -> Result<()> {
    match s {
        BreakerStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().insert(s, generator);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be modified.",
        )),
    }
}

pub fn remove_circuit_breaker_generator(s: BreakerStrategy) -> Result<()> {
    match s {
        BreakerStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().remove(&s);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be modified.",
        )),
    }
}

/// `clear_rules_of_resource` clears resource level rules in the circuitbreaker module.
pub fn clear_rules_of_resource(res: &str) {
    BREAKER_RULES.write().unwrap().remove(res);
    CURRENT_RULES.lock().unwrap().remove(res);
    BREAKER_MAP.write().unwrap().remove(res);
}

/// build_resource_circuit_breaker builds a circuit breaker slice from rules. The resource of the rules must equal `res`.
pub fn build_resource_circuit_breaker(
    res: &str,
    rules_of_res: &[Arc<Rule>],
    old_res_cbs: &mut Vec<Arc<dyn CircuitBreakerTrait>>,
) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    let mut new_res_cbs = Vec::with_capacity(rules_of_res.len());
    for rule in rules_of_res {
        if res != rule.resource {
            logging::error!("unmatched resource name expect: {}, actual: {}. Unmatched resource name in circuitbreaker::build_resource_circuit_breaker(), rule: {:?}", res, rule.resource, rule);
            continue;
        }

        // a value-equal rule keeps its breaker, state and stats included
        if let Some(idx) = old_res_cbs.iter().position(|cb| cb.bound_rule() == rule) {
            new_res_cbs.push(old_res_cbs.remove(idx));
            continue;
        }

        let gen_fun_map = GEN_FUN_MAP.read().unwrap();
        let generator = match gen_fun_map.get(&rule.strategy) {
            Some(generator) => generator,
            None => {
                logging::error!("[CircuitBreaker build_resource_circuit_breaker] Ignoring the rule due to unsupported circuit breaking strategy, rule {:?}", rule);
                continue;
            }
        };

        // a stat-compatible rule rebuilds the breaker around the old window
        let reused_stat = old_res_cbs
            .iter()
            .position(|cb| cb.bound_rule().is_stat_reusable(rule));
        let stat = reused_stat.map(|idx| Arc::clone(old_res_cbs[idx].stat()));
        new_res_cbs.push(generator(Arc::clone(rule), stat));
        if let Some(idx) = reused_stat {
            old_res_cbs.remove(idx);
        }
    }
    new_res_cbs
}
