// crates/bulwark-core/src/manager.rs

use std::sync::Arc;

use crate::identity::Address;
use crate::traits::{DripModel, Manager};

/// A fixed-parameter manager: one set of caps and one fee drip model for
/// every module it oversees.
#[derive(Clone)]
pub struct StaticManager {
    id: Address,
    allowed_reserve_pools: usize,
    allowed_reward_pools: usize,
    fee_drip_model: Arc<dyn DripModel>,
}

impl StaticManager {
    pub fn new(
        id: Address,
        allowed_reserve_pools: usize,
        allowed_reward_pools: usize,
        fee_drip_model: Arc<dyn DripModel>,
    ) -> Self {
        Self {
            id,
            allowed_reserve_pools,
            allowed_reward_pools,
            fee_drip_model,
        }
    }
}

impl Manager for StaticManager {
    fn id(&self) -> Address {
        self.id
    }

    fn allowed_reserve_pools(&self) -> usize {
        self.allowed_reserve_pools
    }

    fn allowed_reward_pools(&self) -> usize {
        self.allowed_reward_pools
    }

    fn fee_drip_model(&self, _module: &Address) -> Arc<dyn DripModel> {
        self.fee_drip_model.clone()
    }
}
