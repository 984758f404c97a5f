use rampart::{base, EntryBuilder};

#[test]
fn entries_exit_last_in_first_out() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));

    let outer = EntryBuilder::new("it_tree_outer".into()).build().unwrap();
    let inner = EntryBuilder::new("it_tree_inner".into()).build().unwrap();

    let current = base::current_entry().unwrap();
    assert_eq!(
        "it_tree_inner",
        current.context().read().unwrap().resource().name()
    );

    inner.exit().unwrap();
    let current = base::current_entry().unwrap();
    assert_eq!(
        "it_tree_outer",
        current.context().read().unwrap().resource().name()
    );

    outer.exit().unwrap();
    assert!(base::current_entry().is_none());
}

#[test]
fn out_of_order_exit_force_unwinds() {
    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));

    let outer = EntryBuilder::new("it_tree_unwind_outer".into())
        .build()
        .unwrap();
    let inner = EntryBuilder::new("it_tree_unwind_inner".into())
        .build()
        .unwrap();

    // exiting the outer entry first force-exits the inner one and reports it
    assert!(outer.exit().is_err());
    assert!(inner.is_exited());
    assert!(base::current_entry().is_none());

    // a second exit on an already exited entry is a no-op
    inner.exit().unwrap();
}

#[test]
fn exit_hooks_run_once() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    rampart::init_default().unwrap_or_else(|err| rampart::logging::error!("{:?}", err));

    let entry = EntryBuilder::new("it_tree_hooks".into()).build().unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let hook_hits = Arc::clone(&hits);
    entry.when_exit(Box::new(move |_entry, _ctx| {
        hook_hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    entry.exit().unwrap();
    entry.exit().unwrap();
    assert_eq!(1, hits.load(Ordering::SeqCst));
}
