use rampart::base::{ConcurrencyStat, MetricEvent, ReadStat};
use rampart::{flow, EntryBuilder};
use std::sync::Arc;

#[test]
fn direct_reject_admits_up_to_threshold() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));
    let resource_name = String::from("it_flow_direct_reject");

    flow::load_rules_of_resource(
        &resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.clone(),
            threshold: 1.0,
            control_strategy: flow::ControlStrategy::Reject,
            ..Default::default()
        })],
    )
    .unwrap();

    let first = EntryBuilder::new(resource_name.clone()).build();
    assert!(first.is_ok());
    let second = EntryBuilder::new(resource_name.clone()).build();
    assert!(second.is_err());
    first.unwrap().exit().unwrap();

    flow::clear_rules_of_resource(&resource_name);
}

#[test]
fn no_rules_admit_everything() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));
    let resource_name = String::from("it_flow_unguarded");

    for _ in 0..50 {
        let entry = EntryBuilder::new(resource_name.clone()).build().unwrap();
        entry.exit().unwrap();
    }
}

#[test]
fn invalid_rules_are_ignored() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));
    let resource_name = String::from("it_flow_invalid_rule");

    // negative threshold never loads, the resource stays unguarded
    flow::load_rules_of_resource(
        &resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.clone(),
            threshold: -1.0,
            ..Default::default()
        })],
    )
    .unwrap();
    assert_eq!(0, flow::get_rules_of_resource(&resource_name).len());

    for _ in 0..10 {
        let entry = EntryBuilder::new(resource_name.clone()).build().unwrap();
        entry.exit().unwrap();
    }
}

#[test]
fn throttling_spaces_requests_out() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));
    let resource_name = String::from("it_flow_throttling");

    flow::load_rules_of_resource(
        &resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.clone(),
            threshold: 100.0,
            control_strategy: flow::ControlStrategy::Throttling,
            max_queueing_time_ms: 1000,
            ..Default::default()
        })],
    )
    .unwrap();

    // 100/s means one admission every 10ms, so a burst of 5 takes
    // roughly 40ms of queueing in total
    let start = rampart::utils::curr_time_millis();
    for _ in 0..5 {
        let entry = EntryBuilder::new(resource_name.clone()).build().unwrap();
        entry.exit().unwrap();
    }
    let elapsed = rampart::utils::curr_time_millis() - start;
    assert!(elapsed >= 30, "burst finished too fast: {}ms", elapsed);

    flow::clear_rules_of_resource(&resource_name);
}

#[test]
fn throttled_entries_keep_statistics_balanced() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));
    let resource_name = String::from("it_flow_throttling_stats");

    flow::load_rules_of_resource(
        &resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.clone(),
            threshold: 100.0,
            control_strategy: flow::ControlStrategy::Throttling,
            max_queueing_time_ms: 1000,
            ..Default::default()
        })],
    )
    .unwrap();

    // paced entries count as passes, and every exit releases the
    // concurrency slot its admission took
    for _ in 0..3 {
        let entry = EntryBuilder::new(resource_name.clone()).build().unwrap();
        entry.exit().unwrap();
    }
    let node = rampart::stat::get_cluster_node(&resource_name).unwrap();
    assert_eq!(0, node.current_concurrency());
    assert_eq!(3, node.sum(MetricEvent::Pass));

    flow::clear_rules_of_resource(&resource_name);
}

#[test]
fn reload_keeps_counting_against_new_threshold() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));
    let resource_name = String::from("it_flow_reload");

    flow::load_rules_of_resource(
        &resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.clone(),
            threshold: 1.0,
            ..Default::default()
        })],
    )
    .unwrap();
    let entry = EntryBuilder::new(resource_name.clone()).build().unwrap();
    entry.exit().unwrap();
    assert!(EntryBuilder::new(resource_name.clone()).build().is_err());

    // raising the threshold takes effect without dropping the window
    flow::load_rules_of_resource(
        &resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.clone(),
            threshold: 100.0,
            ..Default::default()
        })],
    )
    .unwrap();
    let entry = EntryBuilder::new(resource_name.clone()).build().unwrap();
    entry.exit().unwrap();

    flow::clear_rules_of_resource(&resource_name);
}

#[test]
fn origin_scoped_rule_only_hits_that_origin() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));
    let resource_name = String::from("it_flow_origin");

    // block service-b outright, leave everyone else alone
    flow::load_rules_of_resource(
        &resource_name,
        vec![Arc::new(flow::Rule {
            resource: resource_name.clone(),
            limit_app: "service-b".into(),
            threshold: 0.0,
            ..Default::default()
        })],
    )
    .unwrap();

    let ok = EntryBuilder::new(resource_name.clone())
        .with_origin("service-a".into())
        .build();
    assert!(ok.is_ok());
    ok.unwrap().exit().unwrap();

    let blocked = EntryBuilder::new(resource_name.clone())
        .with_origin("service-b".into())
        .build();
    assert!(blocked.is_err());

    flow::clear_rules_of_resource(&resource_name);
}
