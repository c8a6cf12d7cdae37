// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use cid::Cid;

use super::{ActorContext, ActorProcessor};
use crate::actors::builtin;
use crate::actors::init::InitState;
use crate::ipld::diff::{ChangeKind, diff_map};
use crate::model::{self, Record};
use crate::shim::ActorID;
use crate::shim::address::Address;
use crate::state_tree::{ActorChange, ChangeType};

/// One row per actor whose state changed.
pub struct ActorTask;

impl ActorProcessor for ActorTask {
    fn accepts(&self, _code: &Cid) -> bool {
        true
    }

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(actor) = change.new.as_ref() else {
            return Ok(vec![]);
        };
        Ok(vec![
            model::Actor {
                height: ctx.height(),
                id: change.address.to_string(),
                code: actor.code.to_string(),
                head: actor.state.to_string(),
                nonce: actor.sequence,
                balance: actor.balance.atto().to_string(),
                state_root: ctx.state_root(),
            }
            .into(),
        ])
    }
}

/// Address-to-ID assignments made by the init actor.
pub struct IdAddressesTask;

impl IdAddressesTask {
    fn record(ctx: &ActorContext<'_>, id: ActorID, address: &Address) -> Record {
        model::IdAddress {
            height: ctx.height(),
            id: Address::new_id(id).to_string(),
            address: address.to_string(),
            state_root: ctx.state_root(),
        }
        .into()
    }
}

impl ActorProcessor for IdAddressesTask {
    fn accepts(&self, code: &Cid) -> bool {
        builtin::is_init_code(code)
    }

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(new) = change.new.as_ref() else {
            return Ok(vec![]);
        };
        let cur = ctx.loader.init_state(new)?;
        let prev: Option<InitState> = match (&change.old, change.change_type) {
            (Some(old), ChangeType::Modified | ChangeType::Unknown) => {
                Some(ctx.loader.init_state(old)?)
            }
            _ => None,
        };

        let mut records = Vec::new();
        let Some(prev) = prev else {
            cur.for_each_actor(|id, address| {
                records.push(Self::record(ctx, id, &address));
                Ok(())
            })?;
            return Ok(records);
        };

        let changes = diff_map(ctx.loader.store(), &prev.address_map(), &cur.address_map())
            .context("diffing init address map")?;
        for change in changes {
            match change.kind {
                // a re-assigned address is reported under its new ID
                ChangeKind::Add | ChangeKind::Modify => {
                    let address = Address::from_bytes(&change.key)?;
                    let id: ActorID = change
                        .after_as()?
                        .with_context(|| format!("no ID for address {address}"))?;
                    records.push(Self::record(ctx, id, &address));
                }
                ChangeKind::Remove => {}
            }
        }
        Ok(records)
    }
}
