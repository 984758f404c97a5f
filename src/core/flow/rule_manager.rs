use super::*;
use crate::base::RampartRule;
use crate::{logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// ControllerGenfn represents the Controller generator function of a specific control strategy.
pub type ControllerGenfn = dyn Send + Sync + Fn(Arc<Rule>) -> Result<Arc<Controller>>;

/// ControllerMap represents the map storage for Controller.
pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;
pub type RuleMap = HashMap<String, HashSet<Arc<Rule>>>;

macro_rules! insert_flow_generator {
    ($map:expr, $strategy:expr, $calculator:ident, $checker:ident) => {
        $map.insert(
            $strategy,
            Box::new(|rule: Arc<Rule>| -> Result<Arc<Controller>> {
                let calculator = Arc::new($calculator::new(Arc::clone(&rule)));
                let checker = Arc::new($checker::new(Arc::clone(&rule)));
                Ok(Arc::new(Controller::new(rule, calculator, checker)))
            }),
        );
    };
}

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<ControlStrategy, Box<ControllerGenfn>>> = {
        let mut gen_fun_map: HashMap<ControlStrategy, Box<ControllerGenfn>> = HashMap::new();

        insert_flow_generator!(
            gen_fun_map,
            ControlStrategy::Reject,
            DirectCalculator,
            RejectChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            ControlStrategy::Throttling,
            DirectCalculator,
            ThrottlingChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            ControlStrategy::WarmUp,
            WarmUpCalculator,
            RejectChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            ControlStrategy::WarmUpThrottling,
            WarmUpCalculator,
            ThrottlingChecker
        );

        RwLock::new(gen_fun_map)
    };
    static ref CONTROLLER_MAP: Mutex<ControllerMap> = Mutex::new(HashMap::new());
    static ref GLOBAL_CONTROLLER_MAP: Mutex<ControllerMap> = Mutex::new(HashMap::new());
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(HashMap::new());
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[FlowRuleManager] Flow rules were cleared")
    } else {
        logging::info!(
            "[FlowRuleManager] Flow rules were loaded: {:?}",
            map.values()
        )
    }
}

/// `append_rule` appends one rule to the rule manager, returning `false` when
/// a value-equal rule is already loaded.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    if RULE_MAP
        .lock()
        .unwrap()
        .get(&rule.resource)
        .unwrap_or(&HashSet::new())
        .contains(&rule)
    {
        return false;
    }
    match rule.is_valid() {
        Ok(_) => {
            RULE_MAP
                .lock()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .insert(Arc::clone(&rule));
        }
        Err(err) => {
            logging::warn!(
                "[Flow append_rule] Ignoring invalid flow rule {:?}, reason: {:?}",
                rule,
                err
            );
            return false;
        }
    }
    let rule_map = RULE_MAP.lock().unwrap();
    let rules_of_res = rule_map.get(&rule.resource).unwrap();
    rebuild_controllers_of_resource(&rule.resource, rules_of_res);
    true
}

/// `remove_rule` removes one rule from the rule manager, returning `false`
/// when no value-equal rule was loaded.
pub fn remove_rule(rule: Arc<Rule>) -> bool {
    let mut rule_map = RULE_MAP.lock().unwrap();
    let removed = match rule_map.get_mut(&rule.resource) {
        Some(rules) => rules.remove(&rule),
        None => false,
    };
    if !removed {
        return false;
    }
    if rule_map
        .get(&rule.resource)
        .map(HashSet::is_empty)
        .unwrap_or(true)
    {
        rule_map.remove(&rule.resource);
        CONTROLLER_MAP.lock().unwrap().remove(&rule.resource);
        GLOBAL_CONTROLLER_MAP.lock().unwrap().remove(&rule.resource);
        return true;
    }
    let rules_of_res = rule_map.get(&rule.resource).unwrap();
    rebuild_controllers_of_resource(&rule.resource, rules_of_res);
    true
}

/// `load_rules` loads the given flow rules to the rule manager, while all previous rules will be replaced.
/// The returned `bool` indicates whether a real load happened, loading an identical rule set returns false.
// This func acquires locks on global `RULE_MAP` and the controller maps,
// please release your locks on them before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        let entry = rule_map.entry(rule.resource.clone()).or_default();
        entry.insert(rule);
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[Flow] Load rules is the same with current rules, so ignore load operation."
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
        let mut controller_map = CONTROLLER_MAP.lock().unwrap();
        let mut global_controller_map = GLOBAL_CONTROLLER_MAP.lock().unwrap();
        let mut new_controller_map = HashMap::with_capacity(valid_rules_map.len());
        let mut new_global_controller_map = HashMap::with_capacity(valid_rules_map.len());

        for (res, rules) in valid_rules_map.iter() {
            let (normal, global) = split_rules_by_scope(rules);
            rebuild_into(&mut controller_map, &mut new_controller_map, res, &normal);
            rebuild_into(
                &mut global_controller_map,
                &mut new_global_controller_map,
                res,
                &global,
            );
        }
        *controller_map = new_controller_map;
        *global_controller_map = new_global_controller_map;
        *global_rule_map = rule_map;
    }
    logging::debug!(
        "[Flow load_rules] Time statistic(ns) for updating flow rule, time cost {}",
        utils::curr_time_nanos() - start
    );
    log_rule_update(&valid_rules_map);
    true
}

fn retain_valid_rules(label: &str, rules: &HashSet<Arc<Rule>>) -> HashSet<Arc<Rule>> {
    rules
        .iter()
        .filter(|rule| match rule.is_valid() {
            Ok(_) => true,
            Err(err) => {
                logging::warn!(
                    "[Flow {}] Ignoring invalid flow rule {:?}, reason: {:?}",
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

// Rebuilds `res` into `new`, reusing controllers from `old` where the rule
// survived the reload unchanged.
fn rebuild_into(
    old: &mut ControllerMap,
    new: &mut ControllerMap,
    res: &str,
    rules: &HashSet<Arc<Rule>>,
) {
    let mut placeholder = Vec::new();
    let tcs = build_resource_traffic_shaping_controller(
        res,
        rules,
        old.get_mut(res).unwrap_or(&mut placeholder),
    );
    if !tcs.is_empty() {
        new.insert(res.into(), tcs);
    }
}

/// `load_rules_of_resource` loads the given resource's flow rules to the rule manager, while all previous rules of the resource will be replaced.
/// The returned `bool` indicates whether a real load happened, loading an identical rule set returns false.
// This func acquires locks on global `RULE_MAP` and the controller maps,
// please release your locks on them before calling this func
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let rules: HashSet<_> = rules.into_iter().collect();
    let mut global_rule_map = RULE_MAP.lock().unwrap();
    // clear resource rules
    if rules.is_empty() {
        global_rule_map.remove(res);
        CONTROLLER_MAP.lock().unwrap().remove(res);
        GLOBAL_CONTROLLER_MAP.lock().unwrap().remove(res);
        logging::info!("[Flow] clear resource level rules, resource {}", res);
        return Ok(true);
    }
    if global_rule_map.get(res).unwrap_or(&HashSet::new()) == &rules {
        logging::info!("[Flow] Load resource level rules is the same with current resource level rules, so ignore load operation.");
        return Ok(false);
    }

    let valid_res_rules = retain_valid_rules("load_rules_of_resource", &rules);

    let start = utils::curr_time_nanos();
    let valid_res_rules_string = format!("{:?}", &valid_res_rules);
    rebuild_controllers_of_resource(res, &valid_res_rules);

    global_rule_map.insert(res.into(), rules);
    logging::debug!(
        "[Flow load_rules_of_resource] Time statistic(ns) for updating flow rule, timeCost: {}",
        utils::curr_time_nanos() - start
    );
    logging::info!(
        "[Flow] load resource level rules, resource: {}, valid_res_rules: {}",
        res,
        valid_res_rules_string
    );

    Ok(true)
}

/// `get_rules` returns the rules of all the built controllers.
// This func acquires the locks on the global controller maps,
// please release your locks on them before calling this func
pub fn get_rules() -> Vec<Arc<Rule>> {
    let mut rules = Vec::new();
    for map in [&*CONTROLLER_MAP, &*GLOBAL_CONTROLLER_MAP] {
        let controller_map = map.lock().unwrap();
        for controllers in controller_map.values() {
            for c in controllers {
                rules.push(Arc::clone(c.rule()));
            }
        }
    }
    rules
}

/// `get_rules_of_resource` returns specific resource's rules.
// This func acquires the locks on the global controller maps,
// please release your locks on them before calling this func
pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    get_traffic_controller_list_for(res)
        .iter()
        .map(|c| Arc::clone(c.rule()))
        .collect()
}

/// clear_rules clears all the rules in flow module.
// This func acquires locks on global `RULE_MAP` and the controller maps,
// please release your locks on them before calling this func
pub fn clear_rules() {
    RULE_MAP.lock().unwrap().clear();
    CONTROLLER_MAP.lock().unwrap().clear();
    GLOBAL_CONTROLLER_MAP.lock().unwrap().clear();
}

/// `clear_rules_of_resource` clears resource level rules in flow module.
// This func acquires locks on global `RULE_MAP` and the controller maps,
// please release your locks on them before calling this func
pub fn clear_rules_of_resource(res: &str) {
    RULE_MAP.lock().unwrap().remove(res);
    CONTROLLER_MAP.lock().unwrap().remove(res);
    GLOBAL_CONTROLLER_MAP.lock().unwrap().remove(res);
}

/// `get_traffic_controller_list_for` returns the controllers gating `name`,
/// resource level controllers first, then global mode controllers.
// This func acquires the locks on the global controller maps,
// please release your locks on them before calling this func
pub fn get_traffic_controller_list_for(name: &str) -> Vec<Arc<Controller>> {
    let mut controllers = CONTROLLER_MAP
        .lock()
        .unwrap()
        .get(name)
        .cloned()
        .unwrap_or_default();
    if let Some(global) = GLOBAL_CONTROLLER_MAP.lock().unwrap().get(name) {
        controllers.extend(global.iter().cloned());
    }
    controllers
}

/// `set_traffic_shaping_generator` sets the controller generator for the given ControlStrategy.
/// Note that modifying the generator of a built-in control strategy is not allowed.
// This func acquires the lock on global `GEN_FUN_MAP`,
// please release your lock on it before calling this func
pub fn set_traffic_shaping_generator(
    control_strategy: ControlStrategy,
    generator: Box<ControllerGenfn>,
) -> Result<()> {
    match control_strategy {
        ControlStrategy::Custom(_) => {
            GEN_FUN_MAP
                .write()
                .unwrap()
                .insert(control_strategy, generator);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default control behaviors are not allowed to be modified.",
        )),
    }
}

// This func acquires the lock on global `GEN_FUN_MAP`,
// please release your lock on it before calling this func
pub fn remove_traffic_shaping_generator(control_strategy: ControlStrategy) -> Result<()> {
    match control_strategy {
        ControlStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().remove(&control_strategy);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default control behaviors are not allowed to be removed.",
        )),
    }
}

fn split_rules_by_scope(rules: &HashSet<Arc<Rule>>) -> (HashSet<Arc<Rule>>, HashSet<Arc<Rule>>) {
    let mut normal = HashSet::new();
    let mut global = HashSet::new();
    for rule in rules {
        if rule.global_mode {
            global.insert(Arc::clone(rule));
        } else {
            normal.insert(Arc::clone(rule));
        }
    }
    (normal, global)
}

// Rebuilds both controller vectors of one resource from its valid rules,
// reusing old controllers whose rule is value-equal.
fn rebuild_controllers_of_resource(res: &str, rules_of_res: &HashSet<Arc<Rule>>) {
    let (normal, global) = split_rules_by_scope(rules_of_res);
    for (map, rules) in [(&*CONTROLLER_MAP, normal), (&*GLOBAL_CONTROLLER_MAP, global)] {
        let mut controller_map = map.lock().unwrap();
        let mut placeholder = Vec::new();
        let tcs = build_resource_traffic_shaping_controller(
            res,
            &rules,
            controller_map.get_mut(res).unwrap_or(&mut placeholder),
        );
        if tcs.is_empty() {
            controller_map.remove(res);
        } else {
            controller_map.insert(res.into(), tcs);
        }
    }
}

/// build_resource_traffic_shaping_controller builds a Controller slice from rules. The resource of the rules must equal `res`.
pub fn build_resource_traffic_shaping_controller(
    res: &str,
    rules_of_res: &HashSet<Arc<Rule>>,
    old_res_tcs: &mut Vec<Arc<Controller>>,
) -> Vec<Arc<Controller>> {
    let mut new_res_tcs = Vec::with_capacity(rules_of_res.len());
    for rule in rules_of_res {
        if res != rule.resource {
            logging::error!("unmatched resource name expect: {}, actual: {}. Unmatched resource name in flow::build_resource_traffic_shaping_controller(), rule: {:?}", res, rule.resource, rule);
            continue;
        }

        // a value-equal rule survived the reload, keep its controller and
        // thereby its shaping state
        if let Some(idx) = old_res_tcs.iter().position(|old_tc| old_tc.rule() == rule) {
            new_res_tcs.push(old_res_tcs.remove(idx));
            continue;
        }

        let gen_fun_map = GEN_FUN_MAP.read().unwrap();
        match gen_fun_map.get(&rule.control_strategy) {
            Some(generator) => match generator(Arc::clone(rule)) {
                Ok(tc) => new_res_tcs.push(tc),
                Err(err) => {
                    logging::error!("[FlowRuleManager build_resource_traffic_shaping_controller] Bad generated traffic controller. Ignoring the rule, rule: {:?}, error: {:?}", rule, err);
                }
            },
            None => {
                logging::error!("[FlowRuleManager build_resource_traffic_shaping_controller] Unsupported flow control strategy. Ignoring the rule, rule: {}", rule);
            }
        }
    }
    new_res_tcs
}

#[cfg(test)]
mod test {
    //! Some tests cannot run in parallel, since we cannot promise that
    //! the global data structs are not modified before assertion.
    #![allow(clippy::vtable_address_comparisons)]

    use super::*;

    #[test]
    #[should_panic(expected = "Default control behaviors are not allowed to be modified.")]
    fn illegal_set() {
        set_traffic_shaping_generator(
            ControlStrategy::Reject,
            Box::new(|rule: Arc<Rule>| -> Result<Arc<Controller>> {
                let calculator = Arc::new(DirectCalculator::new(Arc::clone(&rule)));
                let checker = Arc::new(RejectChecker::new(Arc::clone(&rule)));
                Ok(Arc::new(Controller::new(rule, calculator, checker)))
            }),
        )
        .unwrap();
    }

    #[test]
    fn custom_generator_roundtrip() {
        set_traffic_shaping_generator(
            ControlStrategy::Custom(42),
            Box::new(|rule: Arc<Rule>| -> Result<Arc<Controller>> {
                let calculator = Arc::new(DirectCalculator::new(Arc::clone(&rule)));
                let checker = Arc::new(RejectChecker::new(Arc::clone(&rule)));
                Ok(Arc::new(Controller::new(rule, calculator, checker)))
            }),
        )
        .unwrap();
        assert!(GEN_FUN_MAP
            .read()
            .unwrap()
            .contains_key(&ControlStrategy::Custom(42)));
        remove_traffic_shaping_generator(ControlStrategy::Custom(42)).unwrap();
        assert!(!GEN_FUN_MAP
            .read()
            .unwrap()
            .contains_key(&ControlStrategy::Custom(42)));
    }

    #[test]
    fn load_and_split_by_scope() {
        let res = String::from("rule_manager_scope");
        let normal = Arc::new(Rule {
            resource: res.clone(),
            threshold: 100.0,
            ..Default::default()
        });
        let global = Arc::new(Rule {
            resource: res.clone(),
            threshold: 200.0,
            global_mode: true,
            ..Default::default()
        });
        assert!(load_rules_of_resource(&res, vec![normal, global]).unwrap());

        let tcs = get_traffic_controller_list_for(&res);
        assert_eq!(2, tcs.len());
        // resource level controllers come first
        assert!(!tcs[0].rule().global_mode);
        assert!(tcs[1].rule().global_mode);

        clear_rules_of_resource(&res);
        assert!(get_traffic_controller_list_for(&res).is_empty());
    }

    #[test]
    fn reload_keeps_equal_controllers() {
        let res = String::from("rule_manager_reuse");
        let r1 = Arc::new(Rule {
            resource: res.clone(),
            threshold: 10.0,
            ..Default::default()
        });
        let r2 = Arc::new(Rule {
            resource: res.clone(),
            threshold: 20.0,
            control_strategy: ControlStrategy::Throttling,
            ..Default::default()
        });
        assert!(load_rules_of_resource(&res, vec![Arc::clone(&r1), r2]).unwrap());
        let tcs_before = get_traffic_controller_list_for(&res);
        assert_eq!(2, tcs_before.len());

        // a value-equal rule with another id still reuses its controller
        let r1_clone = Arc::new(Rule {
            id: String::from("another-id"),
            resource: res.clone(),
            threshold: 10.0,
            ..Default::default()
        });
        let r3 = Arc::new(Rule {
            resource: res.clone(),
            threshold: 30.0,
            control_strategy: ControlStrategy::Throttling,
            ..Default::default()
        });
        assert!(load_rules_of_resource(&res, vec![r1_clone, r3]).unwrap());
        let tcs_after = get_traffic_controller_list_for(&res);
        assert_eq!(2, tcs_after.len());

        let reused = tcs_before.iter().any(|old| {
            tcs_after
                .iter()
                .any(|new| Arc::ptr_eq(old, new) && old.rule() == &r1)
        });
        assert!(reused);

        clear_rules_of_resource(&res);
    }

    #[test]
    fn append_and_remove() {
        let res = String::from("rule_manager_append");
        let rule = Arc::new(Rule {
            resource: res.clone(),
            threshold: 5.0,
            ..Default::default()
        });
        assert!(append_rule(Arc::clone(&rule)));
        // value-equal rules are deduplicated
        assert!(!append_rule(Arc::clone(&rule)));
        assert_eq!(1, get_traffic_controller_list_for(&res).len());

        assert!(remove_rule(Arc::clone(&rule)));
        assert!(!remove_rule(rule));
        assert!(get_traffic_controller_list_for(&res).is_empty());
    }

    #[test]
    fn invalid_rules_are_skipped() {
        let res = String::from("rule_manager_invalid");
        let bad = Arc::new(Rule {
            resource: res.clone(),
            threshold: -4.0,
            ..Default::default()
        });
        assert!(load_rules_of_resource(&res, vec![bad]).unwrap());
        assert!(get_traffic_controller_list_for(&res).is_empty());
        clear_rules_of_resource(&res);
    }
}
