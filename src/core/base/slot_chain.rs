use super::{BlockError, ContextPtr, EntryContext, TokenResult, SLOT_INIT};
use crate::logging;
use crate::utils::AsAny;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Slots sort ascending by this key inside their bucket. A plain numeric
/// key because `PartialOrd` is not object safe.
pub trait BaseSlot: Any + AsAny + Sync + Send {
    fn order(&self) -> u32 {
        0
    }
}

/// Runs before any rule check and attaches statistic state (nodes and the
/// like) to the context.
pub trait StatPrepareSlot: BaseSlot {
    fn prepare(&self, _ctx: &mut EntryContext) {}
}

/// A rule based admission check. The first blocked result short-circuits
/// the checks that follow it.
pub trait RuleCheckSlot: BaseSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        ctx.result().clone()
    }
}

/// Observes the outcome of rule checking.
pub trait StatSlot: BaseSlot {
    /// invoked once when no rule check blocked the entry
    fn on_entry_pass(&self, _ctx: &EntryContext) {}
    /// invoked once with the block detail when a rule check blocked the entry
    fn on_entry_blocked(&self, _ctx: &EntryContext, _block_error: BlockError) {}
    /// invoked when an admitted entry exits, never for blocked ones
    fn on_completed(&self, _ctx: &mut EntryContext) {}
}

// Keeps the bucket ascending by order. Not thread safe, chains are built
// before they are shared.
fn insert_ordered<T: BaseSlot + ?Sized>(bucket: &mut Vec<Arc<T>>, slot: Arc<T>) {
    let at = bucket
        .iter()
        .position(|s| s.order() > slot.order())
        .unwrap_or(bucket.len());
    bucket.insert(at, slot);
}

/// SlotChain is the admission pipeline of one resource: prepare slots, then
/// rule check slots, then statistic slots. Custom slots can be added next
/// to the built-in ones.
pub struct SlotChain {
    pub(self) stat_pres: Vec<Arc<dyn StatPrepareSlot>>,
    pub(self) rule_checks: Vec<Arc<dyn RuleCheckSlot>>,
    pub(self) stats: Vec<Arc<dyn StatSlot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self {
            stat_pres: Vec::with_capacity(SLOT_INIT),
            rule_checks: Vec::with_capacity(SLOT_INIT),
            stats: Vec::with_capacity(SLOT_INIT),
        }
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_stat_prepare_slot(&mut self, s: Arc<dyn StatPrepareSlot>) {
        insert_ordered(&mut self.stat_pres, s);
    }

    pub fn add_rule_check_slot(&mut self, s: Arc<dyn RuleCheckSlot>) {
        insert_ordered(&mut self.rule_checks, s);
    }

    pub fn add_stat_slot(&mut self, s: Arc<dyn StatSlot>) {
        insert_ordered(&mut self.stats, s);
    }

    /// Runs the pipeline for one admission and returns the verdict. A slot
    /// that panics is logged and skipped, it never blocks the entry.
    pub fn entry(&self, ctx_ptr: ContextPtr) -> TokenResult {
        let mut ctx = ctx_ptr.write().unwrap();
        for s in &self.stat_pres {
            if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| s.prepare(&mut ctx))) {
                logging::error!("prepare slot panicked in SlotChain.entry(): {:?}", cause);
            }
        }

        ctx.reset_result_to_pass();
        // past the context cap the entry is admitted unchecked and unrecorded
        if ctx.is_untracked() {
            return ctx.result().clone();
        }

        for s in &self.rule_checks {
            match panic::catch_unwind(AssertUnwindSafe(|| s.check(&mut ctx))) {
                Ok(res) => {
                    if res.is_blocked() {
                        ctx.set_result(res);
                        break;
                    }
                }
                Err(cause) => {
                    logging::error!(
                        "rule check slot panicked in SlotChain.entry(), admitting: {:?}",
                        cause
                    );
                    ctx.reset_result_to_pass();
                }
            }
        }

        // a waiting verdict has already served its delay inside the check,
        // only a block keeps the entry out of the pass statistics
        match ctx.result().block_err() {
            Some(block_err) => {
                for s in &self.stats {
                    if let Err(cause) =
                        panic::catch_unwind(AssertUnwindSafe(|| s.on_entry_blocked(&ctx, block_err.clone())))
                    {
                        logging::error!("stat slot panicked in SlotChain.entry(): {:?}", cause);
                    }
                }
            }
            None => {
                for s in &self.stats {
                    if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| s.on_entry_pass(&ctx))) {
                        logging::error!("stat slot panicked in SlotChain.entry(): {:?}", cause);
                    }
                }
            }
        }
        ctx.result().clone()
    }

    /// Completion pass, skipped for entries that were blocked or untracked.
    pub fn exit(&self, ctx_ptr: ContextPtr) {
        let mut ctx = ctx_ptr.write().unwrap();
        if ctx.entry().is_none() {
            logging::error!("RampartEntry is missing in SlotChain.exit()");
            return;
        }
        if ctx.is_blocked() || ctx.is_untracked() {
            return;
        }
        for s in &self.stats {
            if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| s.on_completed(&mut ctx))) {
                logging::error!("stat slot panicked in SlotChain.exit(): {:?}", cause);
            }
        }
    }
}

#[cfg(test)]
pub(crate) use test::mocks::{MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot};

#[cfg(test)]
mod test {
    use super::super::{
        BlockType, RampartEntry, ResourceType, ResourceWrapper, TrafficType,
    };
    use super::*;
    use std::sync::RwLock;

    pub(crate) mod mocks {
        use super::*;
        use mockall::mock;

        // mock! needs the signatures spelled out, otherwise the expect_xx()
        // helpers are not generated
        mock! {
            pub(crate) StatPrepareSlot {}
            impl BaseSlot for StatPrepareSlot {}
            impl StatPrepareSlot for StatPrepareSlot { fn prepare(&self, ctx: &mut EntryContext); }
        }

        mock! {
            pub(crate) RuleCheckSlot {}
            impl BaseSlot for RuleCheckSlot {}
            impl RuleCheckSlot for RuleCheckSlot { fn check(&self, ctx: &mut EntryContext) -> TokenResult; }
        }

        mock! {
            pub(crate) StatSlot {}
            impl BaseSlot for StatSlot {}
            impl StatSlot for StatSlot {
                fn on_entry_pass(&self, ctx: &EntryContext);
                fn on_entry_blocked(&self, ctx: &EntryContext, block_error: BlockError);
                fn on_completed(&self, ctx: &mut EntryContext);
            }
        }
    }
    use mocks::*;

    struct OrderedSlot {
        order: u32,
    }
    impl BaseSlot for OrderedSlot {
        fn order(&self) -> u32 {
            self.order
        }
    }
    impl StatPrepareSlot for OrderedSlot {}
    impl RuleCheckSlot for OrderedSlot {}
    impl StatSlot for OrderedSlot {}

    struct UntrackingPrepareSlot {}
    impl BaseSlot for UntrackingPrepareSlot {}
    impl StatPrepareSlot for UntrackingPrepareSlot {
        fn prepare(&self, ctx: &mut EntryContext) {
            ctx.set_untracked();
        }
    }

    struct PanickingCheckSlot {}
    impl BaseSlot for PanickingCheckSlot {}
    impl RuleCheckSlot for PanickingCheckSlot {
        fn check(&self, _ctx: &mut EntryContext) -> TokenResult {
            panic!("broken check slot");
        }
    }

    fn chain_ctx(sc: &Arc<SlotChain>) -> ContextPtr {
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            "chain_test".into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        let ctx = Arc::new(RwLock::new(ctx));
        let entry = Arc::new(RwLock::new(RampartEntry::new(ctx.clone(), sc.clone())));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));
        ctx
    }

    #[test]
    fn buckets_stay_sorted() {
        let mut sc = SlotChain::new();
        for order in [30u32, 10, 50, 20, 40, 20] {
            sc.add_stat_prepare_slot(Arc::new(OrderedSlot { order }));
            sc.add_rule_check_slot(Arc::new(OrderedSlot { order }));
            sc.add_stat_slot(Arc::new(OrderedSlot { order }));
        }
        assert_eq!(sc.stat_pres.len(), 6);
        assert!(sc.stat_pres.windows(2).all(|w| w[0].order() <= w[1].order()));
        assert!(sc.rule_checks.windows(2).all(|w| w[0].order() <= w[1].order()));
        assert!(sc.stats.windows(2).all(|w| w[0].order() <= w[1].order()));
    }

    #[test]
    fn pass_runs_stats_and_completion() {
        let mut ps = Arc::new(MockStatPrepareSlot::new());
        let mut rcs = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        Arc::get_mut(&mut ps)
            .unwrap()
            .expect_prepare()
            .once()
            .return_const(());
        Arc::get_mut(&mut rcs)
            .unwrap()
            .expect_check()
            .once()
            .returning(|_ctx| TokenResult::new_pass());
        let ssm_mut = Arc::get_mut(&mut ssm).unwrap();
        ssm_mut.expect_on_entry_pass().once().return_const(());
        ssm_mut.expect_on_entry_blocked().never().return_const(());
        ssm_mut.expect_on_completed().once().return_const(());

        let mut sc = SlotChain::new();
        sc.add_stat_prepare_slot(ps);
        sc.add_rule_check_slot(rcs);
        sc.add_stat_slot(ssm);
        let sc = Arc::new(sc);

        let ctx = chain_ctx(&sc);
        assert!(sc.entry(ctx.clone()).is_pass());
        sc.exit(ctx);
    }

    #[test]
    fn block_short_circuits() {
        let mut first = Arc::new(MockRuleCheckSlot::new());
        let mut second = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        Arc::get_mut(&mut first)
            .unwrap()
            .expect_check()
            .once()
            .returning(|_ctx| TokenResult::new_blocked(BlockType::Flow));
        Arc::get_mut(&mut second)
            .unwrap()
            .expect_check()
            .never()
            .returning(|_ctx| TokenResult::new_pass());
        let ssm_mut = Arc::get_mut(&mut ssm).unwrap();
        ssm_mut.expect_on_entry_pass().never().return_const(());
        ssm_mut.expect_on_entry_blocked().once().return_const(());
        ssm_mut.expect_on_completed().never().return_const(());

        let mut sc = SlotChain::new();
        sc.add_rule_check_slot(first);
        sc.add_rule_check_slot(second);
        sc.add_stat_slot(ssm);
        let sc = Arc::new(sc);

        let ctx = chain_ctx(&sc);
        let r = sc.entry(ctx.clone());
        assert!(r.is_blocked());
        assert_eq!(BlockType::Flow, r.block_err().unwrap().block_type());
        sc.exit(ctx);
    }

    #[test]
    fn waiting_verdict_counts_as_pass() {
        let mut rcs = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        Arc::get_mut(&mut rcs)
            .unwrap()
            .expect_check()
            .once()
            .returning(|ctx| {
                ctx.set_result(TokenResult::new_should_wait(1));
                ctx.result().clone()
            });
        let ssm_mut = Arc::get_mut(&mut ssm).unwrap();
        ssm_mut.expect_on_entry_pass().once().return_const(());
        ssm_mut.expect_on_entry_blocked().never().return_const(());
        ssm_mut.expect_on_completed().once().return_const(());

        let mut sc = SlotChain::new();
        sc.add_rule_check_slot(rcs);
        sc.add_stat_slot(ssm);
        let sc = Arc::new(sc);

        let ctx = chain_ctx(&sc);
        assert!(!sc.entry(ctx.clone()).is_blocked());
        sc.exit(ctx);
    }

    #[test]
    fn panicking_check_fails_open() {
        let mut after = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        // the broken slot is skipped, the next check still runs
        Arc::get_mut(&mut after)
            .unwrap()
            .expect_check()
            .once()
            .returning(|_ctx| TokenResult::new_pass());
        let ssm_mut = Arc::get_mut(&mut ssm).unwrap();
        ssm_mut.expect_on_entry_pass().once().return_const(());
        ssm_mut.expect_on_entry_blocked().never().return_const(());
        ssm_mut.expect_on_completed().once().return_const(());

        let mut sc = SlotChain::new();
        sc.add_rule_check_slot(Arc::new(PanickingCheckSlot {}));
        sc.add_rule_check_slot(after);
        sc.add_stat_slot(ssm);
        let sc = Arc::new(sc);

        let ctx = chain_ctx(&sc);
        assert!(sc.entry(ctx.clone()).is_pass());
        sc.exit(ctx);
    }

    #[test]
    fn untracked_context_skips_checks_and_stats() {
        let mut rcs = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        Arc::get_mut(&mut rcs)
            .unwrap()
            .expect_check()
            .never()
            .returning(|_ctx| TokenResult::new_pass());
        let ssm_mut = Arc::get_mut(&mut ssm).unwrap();
        ssm_mut.expect_on_entry_pass().never().return_const(());
        ssm_mut.expect_on_entry_blocked().never().return_const(());
        ssm_mut.expect_on_completed().never().return_const(());

        let mut sc = SlotChain::new();
        sc.add_stat_prepare_slot(Arc::new(UntrackingPrepareSlot {}));
        sc.add_rule_check_slot(rcs);
        sc.add_stat_slot(ssm);
        let sc = Arc::new(sc);

        let ctx = chain_ctx(&sc);
        assert!(sc.entry(ctx.clone()).is_pass());
        sc.exit(ctx);
    }
}
