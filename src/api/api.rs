use super::{pass_through_slot_chain, resource_slot_chain};
use crate::base::{
    self, EntryContext, EntryStrongPtr, ResourceType, ResourceWrapper, RampartEntry,
    RampartInput, SlotChain, TokenResult, TrafficType,
};
use crate::{utils, Error, Result};
use std::sync::Arc;
use std::sync::RwLock;

/// EntryBuilder creates an admission entry for one guarded invocation.
pub struct EntryBuilder {
    resource_name: String,
    resource_type: ResourceType,
    traffic_type: TrafficType,
    ctx_name: Option<String>,
    origin: Option<String>,
    batch_count: u32,
    flag: i32,
    args: Option<Vec<String>>,
    slot_chain: Option<Arc<SlotChain>>,
}

impl EntryBuilder {
    pub fn new(resource_name: String) -> Self {
        EntryBuilder {
            resource_name,
            resource_type: ResourceType::default(),
            traffic_type: TrafficType::default(),
            ctx_name: None,
            origin: None,
            batch_count: 1,
            flag: 0,
            args: None,
            slot_chain: None,
        }
    }

    /// `build()` consumes the builder and runs the admission pipeline.
    /// On pass the returned entry is linked under the current entry of this
    /// thread and becomes the current one.
    pub fn build(self) -> Result<EntryStrongPtr> {
        let (entry, result) = self.admit()?;
        match result {
            TokenResult::Wait(nanos) => {
                utils::sleep_for_ns(nanos);
            }
            _ => {}
        }
        base::entry::attach(Arc::clone(&entry));
        Ok(EntryStrongPtr::new(entry))
    }

    /// `build_async()` runs the same admission but leaves the call tree of
    /// this thread untouched, so the entry can be exited from another task.
    pub async fn build_async(self) -> Result<EntryStrongPtr> {
        let (entry, result) = self.admit()?;
        if let TokenResult::Wait(nanos) = result {
            utils::sleep_for_ns(nanos);
        }
        Ok(EntryStrongPtr::new(entry))
    }

    fn admit(self) -> Result<(Arc<RwLock<RampartEntry>>, TokenResult)> {
        let sc = match self.slot_chain {
            Some(ref sc) => Arc::clone(sc),
            None => resource_slot_chain(&self.resource_name)
                .unwrap_or_else(pass_through_slot_chain),
        };

        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            self.resource_name,
            self.resource_type,
            self.traffic_type,
        ));
        if let Some(ctx_name) = self.ctx_name {
            ctx.set_ctx_name(ctx_name);
        }
        if let Some(origin) = self.origin {
            ctx.set_origin(origin);
        }
        let mut input = RampartInput::new(self.batch_count, self.flag);
        if let Some(args) = self.args {
            input.set_args(args);
        }
        ctx.set_input(input);

        let ctx = Arc::new(RwLock::new(ctx));
        let entry = Arc::new(RwLock::new(RampartEntry::new(Arc::clone(&ctx), Arc::clone(&sc))));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));

        let r = sc.entry(Arc::clone(&ctx));
        if let TokenResult::Blocked(_) = r {
            // the slot chain already notified the stat slots of the block,
            // mark the entry exited and hand the block back as an error
            let msg = r.to_string();
            let _ = EntryStrongPtr::new(entry).exit();
            return Err(Error::msg(msg));
        }
        Ok((entry, r))
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_traffic_type(mut self, traffic_type: TrafficType) -> Self {
        self.traffic_type = traffic_type;
        self
    }

    pub fn with_ctx_name(mut self, ctx_name: String) -> Self {
        self.ctx_name = Some(ctx_name);
        self
    }

    pub fn with_origin(mut self, origin: String) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_batch_count(mut self, batch_count: u32) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn with_flag(mut self, flag: i32) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_slot_chain(mut self, slot_chain: Arc<SlotChain>) -> Self {
        self.slot_chain = Some(slot_chain);
        self
    }
}

/// trace_error attaches a business error to the entry, feeding the
/// error based circuit breakers on exit.
pub fn trace_error(entry: &EntryStrongPtr, err: Error) {
    entry.set_err(err);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{BlockType, MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot};
    use mockall::*;

    fn mock_chain(check_result: TokenResult) -> Arc<SlotChain> {
        let mut ps = Arc::new(MockStatPrepareSlot::new());
        let mut rcs = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        let blocked = check_result.is_blocked();

        let mut seq = Sequence::new();
        Arc::get_mut(&mut ps)
            .unwrap()
            .expect_prepare()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        Arc::get_mut(&mut rcs)
            .unwrap()
            .expect_check()
            .once()
            .in_sequence(&mut seq)
            .returning(move |ctx| {
                ctx.set_result(check_result.clone());
                ctx.result().clone()
            });
        if blocked {
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_pass()
                .never()
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_blocked()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_completed()
                .never()
                .return_const(());
        } else {
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_pass()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_blocked()
                .never()
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_completed()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
        }

        let mut sc = SlotChain::new();
        sc.add_stat_prepare_slot(ps);
        sc.add_rule_check_slot(rcs);
        sc.add_stat_slot(ssm);
        Arc::new(sc)
    }

    #[test]
    fn pass() {
        let sc = mock_chain(TokenResult::new_pass());
        let entry = EntryBuilder::new("api_pass".into())
            .with_slot_chain(sc)
            .build()
            .unwrap();
        assert_eq!(
            "api_pass",
            entry.context().read().unwrap().resource().name()
        );
        entry.exit().unwrap();
    }

    #[test]
    fn block() {
        let sc = mock_chain(TokenResult::new_blocked(BlockType::Flow));
        let r = EntryBuilder::new("api_block".into())
            .with_slot_chain(sc)
            .build();
        assert!(r.is_err());
    }

    #[test]
    fn nested_entries_exit_in_order() {
        let outer = EntryBuilder::new("api_nested_outer".into())
            .with_slot_chain(mock_chain(TokenResult::new_pass()))
            .build()
            .unwrap();
        let inner = EntryBuilder::new("api_nested_inner".into())
            .with_slot_chain(mock_chain(TokenResult::new_pass()))
            .build()
            .unwrap();
        inner.exit().unwrap();
        outer.exit().unwrap();
    }

    #[tokio::test]
    async fn async_entry_leaves_call_tree_alone() {
        let entry = EntryBuilder::new("api_async".into())
            .with_slot_chain(mock_chain(TokenResult::new_pass()))
            .build_async()
            .await
            .unwrap();
        assert!(base::current_entry().is_none());
        entry.exit().unwrap();
    }
}
