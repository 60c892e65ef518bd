// crates/bulwark-module/src/state.rs
//
// Module state machine: trigger, pause and unpause.
//
// Valid transitions:
//   Active    -> Triggered   (trigger fires)
//   Active    -> Paused      (pause)
//   Triggered -> Paused      (pause)
//   Triggered -> Active      (last pending slash executed)
//   Paused    -> Triggered   (unpause with pending slashes)
//   Paused    -> Active      (unpause without pending slashes)

use std::fmt;

use serde::{Deserialize, Serialize};

use bulwark_core::math::{BulwarkResult, SafeMath};
use bulwark_core::{BulwarkError, Trigger, TriggerState};

use crate::module::{CallContext, SafetyModule};

/// Global state of a safety module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SafetyModuleState {
    /// Deposits, stakes and redemptions all open.
    Active,
    /// At least one trigger fired and its slash has not executed yet.
    Triggered,
    /// Deposits closed, drips frozen, redemptions complete immediately.
    Paused,
}

impl fmt::Display for SafetyModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyModuleState::Active => write!(f, "Active"),
            SafetyModuleState::Triggered => write!(f, "Triggered"),
            SafetyModuleState::Paused => write!(f, "Paused"),
        }
    }
}

impl SafetyModuleState {
    pub fn can_transition_to(&self, next: SafetyModuleState) -> bool {
        use SafetyModuleState::*;
        matches!(
            (self, next),
            (Active, Triggered)
                | (Active, Paused)
                | (Triggered, Paused)
                | (Triggered, Active)
                | (Paused, Triggered)
                | (Paused, Active)
        )
    }
}

impl SafetyModule {
    pub(crate) fn transition(&mut self, next: SafetyModuleState) -> BulwarkResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(BulwarkError::InvalidStateTransition(format!(
                "{} -> {}",
                self.state, next
            )));
        }
        tracing::info!("State transition: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Pause the module. Owner, pauser or manager.
    ///
    /// Rewards and fees are dripped up to `now` before drips freeze. If
    /// that pass fails the module pauses without it.
    pub fn pause(&mut self, ctx: &CallContext) -> BulwarkResult<()> {
        self.transact("pause", |m| {
            if ctx.caller != m.owner && ctx.caller != m.pauser && !m.is_manager(&ctx.caller) {
                return Err(BulwarkError::Unauthorized(format!(
                    "{} may not pause",
                    ctx.caller.short()
                )));
            }
            if m.state == SafetyModuleState::Paused {
                return Err(BulwarkError::InvalidStateTransition(
                    "module is already paused".to_string(),
                ));
            }
            // A failing drip pass must not keep the module from pausing.
            let mut dripped = m.clone();
            match dripped.drip_all(ctx.now) {
                Ok(()) => *m = dripped,
                Err(e) => tracing::warn!("Pausing without a final drip: {}", e),
            }
            m.transition(SafetyModuleState::Paused)
        })
    }

    /// Unpause the module. Owner or manager.
    ///
    /// Returns to Triggered if slashes are still pending, else Active.
    /// Drip clocks restart at `now`.
    pub fn unpause(&mut self, ctx: &CallContext) -> BulwarkResult<()> {
        self.transact("unpause", |m| {
            m.require_owner_or_manager(ctx)?;
            if m.state != SafetyModuleState::Paused {
                return Err(BulwarkError::InvalidStateTransition(format!(
                    "cannot unpause from {}",
                    m.state
                )));
            }
            let next = if m.num_pending_slashes > 0 {
                SafetyModuleState::Triggered
            } else {
                SafetyModuleState::Active
            };
            m.transition(next)?;
            m.reset_drip_clocks(ctx.now);
            Ok(())
        })
    }

    /// Record that `trigger` fired against this module. Callable by anyone.
    ///
    /// The trigger must be registered, unused, and report Triggered. It
    /// authorizes one slash by its payout handler. A paused module stays
    /// paused.
    pub fn trigger(&mut self, ctx: &CallContext, trigger: &dyn Trigger) -> BulwarkResult<()> {
        self.transact("trigger", |m| {
            let id = trigger.id();
            let data = m.triggers.get(&id).copied().ok_or_else(|| {
                BulwarkError::InvalidTrigger(format!("{} is not registered", id.short()))
            })?;
            if !data.exists {
                return Err(BulwarkError::InvalidTrigger(format!(
                    "{} is no longer registered",
                    id.short()
                )));
            }
            if data.triggered {
                return Err(BulwarkError::InvalidTrigger(format!(
                    "{} already fired against this module",
                    id.short()
                )));
            }
            if trigger.state() != TriggerState::Triggered {
                return Err(BulwarkError::InvalidTrigger(format!(
                    "{} reports {}",
                    id.short(),
                    trigger.state()
                )));
            }

            if let Some(entry) = m.triggers.get_mut(&id) {
                entry.triggered = true;
            }
            m.num_pending_slashes = m.num_pending_slashes.safe_add(1)?;
            let handler_count = m
                .payout_handler_num_pending_slashes
                .entry(data.payout_handler)
                .or_insert(0);
            *handler_count = handler_count.safe_add(1)?;

            tracing::info!(
                "Trigger {} fired at {}; payout handler {} authorized ({} pending slashes)",
                id.short(),
                ctx.now,
                data.payout_handler.short(),
                m.num_pending_slashes
            );

            if m.state == SafetyModuleState::Active {
                m.transition(SafetyModuleState::Triggered)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Fixture;
    use bulwark_core::{Address, WAD};

    #[test]
    fn test_transition_table() {
        use SafetyModuleState::*;
        assert!(Active.can_transition_to(Triggered));
        assert!(Triggered.can_transition_to(Active));
        assert!(Paused.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
        assert!(!Paused.can_transition_to(Paused));
        assert!(!Triggered.can_transition_to(Triggered));
    }

    #[test]
    fn test_pause_roles() {
        let mut f = Fixture::new();
        let stranger = f.ctx(Address::from_label("stranger"));
        assert!(matches!(
            f.module.pause(&stranger),
            Err(BulwarkError::Unauthorized(_))
        ));

        let pauser = f.ctx(f.pauser);
        f.module.pause(&pauser).unwrap();
        assert_eq!(f.module.state(), SafetyModuleState::Paused);

        // The pauser cannot unpause.
        assert!(matches!(
            f.module.unpause(&pauser),
            Err(BulwarkError::Unauthorized(_))
        ));
        assert!(matches!(
            f.module.pause(&pauser),
            Err(BulwarkError::InvalidStateTransition(_))
        ));

        let manager = f.ctx(f.manager);
        f.module.unpause(&manager).unwrap();
        assert_eq!(f.module.state(), SafetyModuleState::Active);
    }

    #[test]
    fn test_unpause_requires_paused() {
        let mut f = Fixture::new();
        let owner = f.ctx(f.owner);
        assert!(matches!(
            f.module.unpause(&owner),
            Err(BulwarkError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_trigger_is_one_shot() {
        let mut f = Fixture::new();
        let anyone = f.ctx(f.alice);
        f.trigger.set_state(TriggerState::Triggered);

        f.module.trigger(&anyone, f.trigger.as_ref()).unwrap();
        assert_eq!(f.module.state(), SafetyModuleState::Triggered);
        assert_eq!(f.module.num_pending_slashes(), 1);
        assert_eq!(f.module.payout_handler_num_pending_slashes(&f.payout_handler), 1);
        assert!(f.module.trigger_data(&f.trigger.id()).unwrap().triggered);

        assert!(matches!(
            f.module.trigger(&anyone, f.trigger.as_ref()),
            Err(BulwarkError::InvalidTrigger(_))
        ));
        assert_eq!(f.module.num_pending_slashes(), 1);
    }

    #[test]
    fn test_trigger_requires_triggered_oracle() {
        let mut f = Fixture::new();
        let anyone = f.ctx(f.alice);
        assert!(matches!(
            f.module.trigger(&anyone, f.trigger.as_ref()),
            Err(BulwarkError::InvalidTrigger(_))
        ));
        assert_eq!(f.module.state(), SafetyModuleState::Active);
        assert!(!f.module.trigger_data(&f.trigger.id()).unwrap().triggered);
    }

    #[test]
    fn test_trigger_while_paused_stays_paused_and_unpause_returns_triggered() {
        let mut f = Fixture::new();
        let owner = f.ctx(f.owner);
        f.module.pause(&owner).unwrap();

        f.trigger.set_state(TriggerState::Triggered);
        f.module.trigger(&owner, f.trigger.as_ref()).unwrap();
        assert_eq!(f.module.state(), SafetyModuleState::Paused);

        f.module.unpause(&owner).unwrap();
        assert_eq!(f.module.state(), SafetyModuleState::Triggered);
    }

    #[test]
    fn test_pause_survives_failing_drip() {
        let mut f = Fixture::new();
        f.fund_rewards(10_000);
        f.reward_model.set_factor(WAD + 1);
        f.advance(1);

        let pauser = f.ctx(f.pauser);
        f.module.pause(&pauser).unwrap();
        assert_eq!(f.module.state(), SafetyModuleState::Paused);
        let pool = f.module.reward_pool(0).unwrap();
        assert_eq!(pool.undripped_rewards, 10_000);
        assert_eq!(pool.last_drip_time, 1_000);
    }
}
