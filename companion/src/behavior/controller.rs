//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Behavior controller state machine

use super::events::{CompanionEvent, EventBus};
use super::state::BehaviorState;
use crate::assets::{AssetProvider, FrameSet};
use crate::ledger::FavorabilityLedger;
use crate::scheduler::FrameScheduler;
use deskpet_common::{
    Action, AdvancePolicy, CHAT_REPLY_REWARD, CLONE_MIN_FAVORABILITY, StageDefinition,
};
use metrics::counter;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Number of generated frames the idle loop runs on when its assets are missing
const IDLE_PLACEHOLDER_FRAMES: usize = 4;

/// Events the controller schedules on its own frame scheduler.
///
/// Each carries the epoch of the stage binding that scheduled it; anything from an
/// older binding is dropped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Tick { epoch: u64 },
    StageComplete { epoch: u64 },
}

/// Errors returned by controller requests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BehaviorError {
    #[error("No frames for {action} stage {stage} ({key})")]
    AssetLoad {
        action: Action,
        stage: usize,
        key: &'static str,
    },

    #[error("Shutdown in progress")]
    ShutdownInProgress,

    #[error("Clone blocked: favorability {score} is below {required}")]
    CloneBlocked { score: i64, required: i64 },

    #[error("{action} has no stage {stage}")]
    NoSuchStage { action: Action, stage: usize },

    #[error("{0} cannot be requested directly")]
    NotDirectlyRequestable(Action),
}

/// Sequencer for one companion instance
pub struct BehaviorController {
    id: Uuid,
    parent: Option<Uuid>,
    assets: Arc<dyn AssetProvider>,
    ledger: FavorabilityLedger,
    scheduler: FrameScheduler<SchedulerEvent>,
    state: BehaviorState,
    events: EventBus,
    epoch: u64,
    startup_played: bool,
    terminated: bool,
    children: Vec<Uuid>,
}

impl BehaviorController {
    /// Create a companion whose clock starts at `now_ms`. The startup clip begins
    /// immediately, followed by the idle loop.
    pub fn new(
        assets: Arc<dyn AssetProvider>,
        ledger: FavorabilityLedger,
        events: EventBus,
        now_ms: u64,
    ) -> Self {
        Self::build(None, assets, ledger, events, now_ms)
    }

    fn build(
        parent: Option<Uuid>,
        assets: Arc<dyn AssetProvider>,
        ledger: FavorabilityLedger,
        events: EventBus,
        now_ms: u64,
    ) -> Self {
        let mut controller = Self {
            id: Uuid::new_v4(),
            parent,
            assets,
            ledger,
            scheduler: FrameScheduler::starting_at(now_ms),
            state: BehaviorState::default(),
            events,
            epoch: 0,
            startup_played: false,
            terminated: false,
            children: Vec::new(),
        };
        tracing::info!(
            "Companion {} created with favorability {}",
            controller.id,
            controller.ledger.value()
        );
        controller.enter_idle();
        controller
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The companion that spawned this one, if it is a clone
    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    pub fn state(&self) -> &BehaviorState {
        &self.state
    }

    pub fn favorability(&self) -> i64 {
        self.ledger.value()
    }

    /// Clones spawned by this companion that are still running
    pub fn children(&self) -> &[Uuid] {
        &self.children
    }

    /// Drop a clone that has left; returns false when `child` was not ours
    pub fn forget_child(&mut self, child: Uuid) -> bool {
        let before = self.children.len();
        self.children.retain(|id| *id != child);
        self.children.len() != before
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        if self.terminated {
            return None;
        }
        self.scheduler.next_deadline()
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_ticking()
    }

    /// Number of outstanding one-shot calls
    pub fn pending_calls(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run every scheduler event due up to `now_ms`. Returns how many fired.
    pub fn advance_to(&mut self, now_ms: u64) -> usize {
        let mut fired = 0;
        while !self.terminated {
            let Some(event) = self.scheduler.pop_due(now_ms) else {
                break;
            };
            fired += 1;
            match event {
                SchedulerEvent::Tick { epoch } => self.on_tick(epoch),
                SchedulerEvent::StageComplete { epoch } => self.on_stage_complete(epoch),
            }
        }
        self.scheduler.advance_clock(now_ms);
        fired
    }

    /// Drop frame ticks missed by more than one interval before `now_ms`.
    ///
    /// Used after the host has been starved (suspend, stalled runtime) so the next
    /// [`BehaviorController::advance_to`] steps the animation once instead of replaying
    /// every missed frame. Stage completions still fire.
    pub fn skip_missed_ticks(&mut self, now_ms: u64) -> u64 {
        let dropped = self.scheduler.skip_missed_ticks(now_ms);
        if dropped > 0 {
            tracing::debug!("Companion {} dropped {} missed ticks", self.id, dropped);
        }
        dropped
    }

    /// Begin `action` from its first stage. Requesting the running action restarts it.
    #[tracing::instrument(skip(self), fields(companion = %self.id))]
    pub fn request_action(&mut self, action: Action) -> Result<(), BehaviorError> {
        self.ensure_unlocked(action)?;
        match action {
            Action::Shutdown => self.request_shutdown(),
            Action::Clone | Action::Startup => Err(BehaviorError::NotDirectlyRequestable(action)),
            Action::Idle => {
                self.stop();
                Ok(())
            }
            _ => {
                let (stage, frames) = self.load_stage(action, 0)?;
                if self.state.current_action == action {
                    tracing::debug!("Restarting {} from its first stage", action);
                }
                self.end_action(false);
                self.bind_stage(action, 0, stage, frames);
                Ok(())
            }
        }
    }

    /// End the running action early without its reward.
    ///
    /// A sustain loop plays its exit clip first; a one-shot stage returns to idle at once.
    #[tracing::instrument(skip(self), fields(companion = %self.id))]
    pub fn interrupt(&mut self) -> Result<(), BehaviorError> {
        self.ensure_unlocked(self.state.current_action)?;
        if self.state.is_idle() {
            return Ok(());
        }
        if self.state.in_loop_stage() {
            self.leave_loop(true)
        } else {
            tracing::debug!(
                "Interrupting {} during one-shot stage {}",
                self.state.current_action,
                self.state.current_stage_index
            );
            self.end_action(false);
            self.enter_idle();
            Ok(())
        }
    }

    /// End a sustain loop by playing its exit clip; the reward applies when it completes.
    /// Does nothing outside a sustain loop.
    #[tracing::instrument(skip(self), fields(companion = %self.id))]
    pub fn finish(&mut self) -> Result<(), BehaviorError> {
        self.ensure_unlocked(self.state.current_action)?;
        if self.state.is_idle() || !self.state.in_loop_stage() {
            tracing::trace!("Nothing to finish");
            return Ok(());
        }
        self.leave_loop(false)
    }

    /// Spawn an independent companion starting from the current score, then charge
    /// the clone cost.
    #[tracing::instrument(skip(self), fields(companion = %self.id))]
    pub fn request_clone(&mut self) -> Result<BehaviorController, BehaviorError> {
        self.ensure_unlocked(Action::Clone)?;
        let score = self.ledger.value();
        if score < CLONE_MIN_FAVORABILITY {
            let error = BehaviorError::CloneBlocked {
                score,
                required: CLONE_MIN_FAVORABILITY,
            };
            tracing::info!("{}", error);
            self.events.publish(CompanionEvent::ActionBlocked {
                companion: self.id,
                action: Action::Clone,
                reason: error.to_string(),
            });
            return Err(error);
        }

        let child = BehaviorController::build(
            Some(self.id),
            Arc::clone(&self.assets),
            self.ledger.fork(),
            self.events.clone(),
            self.scheduler.now(),
        );
        self.children.push(child.id);
        self.events.publish(CompanionEvent::CloneSpawned {
            parent: self.id,
            child: child.id,
        });
        self.apply_delta(Action::Clone.reward());
        counter!("deskpet_actions_completed_total", "action" => Action::Clone.as_str())
            .increment(1);
        Ok(child)
    }

    /// Lock the companion and play the shutdown clip; termination follows its completion.
    #[tracing::instrument(skip(self), fields(companion = %self.id))]
    pub fn request_shutdown(&mut self) -> Result<(), BehaviorError> {
        self.ensure_unlocked(Action::Shutdown)?;
        self.end_action(false);
        self.state.is_shutdown_locked = true;
        self.scheduler.cancel_pending();
        self.scheduler.clear_tick_handler();
        self.events
            .publish(CompanionEvent::ShutdownStarted { companion: self.id });

        match self.load_stage(Action::Shutdown, 0) {
            Ok((stage, frames)) => self.bind_stage(Action::Shutdown, 0, stage, frames),
            Err(e) => {
                tracing::warn!("{}, terminating immediately", e);
                self.terminate();
            }
        }
        Ok(())
    }

    /// Tear the companion down without playing anything
    pub fn close(&mut self) {
        self.terminate();
    }

    /// Write the current score to the ledger store
    pub fn persist(&self) {
        if let Err(e) = self.ledger.persist() {
            tracing::warn!("Failed to persist favorability: {}", e);
        }
    }

    /// Reward for a successful chat reply
    pub fn apply_chat_reward(&mut self) -> i64 {
        self.apply_delta(CHAT_REPLY_REWARD);
        self.ledger.value()
    }

    fn ensure_unlocked(&self, action: Action) -> Result<(), BehaviorError> {
        if !self.state.is_shutdown_locked {
            return Ok(());
        }
        tracing::debug!("Rejecting {} while shutdown is in progress", action);
        self.events.publish(CompanionEvent::ActionBlocked {
            companion: self.id,
            action,
            reason: BehaviorError::ShutdownInProgress.to_string(),
        });
        Err(BehaviorError::ShutdownInProgress)
    }

    fn load_stage(
        &self,
        action: Action,
        index: usize,
    ) -> Result<(&'static StageDefinition, FrameSet), BehaviorError> {
        let stage = action.stage(index).ok_or(BehaviorError::NoSuchStage {
            action,
            stage: index,
        })?;
        let frames = self.assets.load(stage.asset_key);
        if frames.is_empty() {
            let error = BehaviorError::AssetLoad {
                action,
                stage: index,
                key: stage.asset_key,
            };
            tracing::warn!("{}", error);
            return Err(error);
        }
        Ok((stage, frames))
    }

    fn enter_stage(&mut self, action: Action, index: usize) -> Result<(), BehaviorError> {
        let (stage, frames) = self.load_stage(action, index)?;
        self.bind_stage(action, index, stage, frames);
        Ok(())
    }

    /// Make `stage` current and rebind the scheduler to it
    fn bind_stage(
        &mut self,
        action: Action,
        index: usize,
        stage: &'static StageDefinition,
        frames: FrameSet,
    ) {
        self.scheduler.cancel_pending();
        self.epoch += 1;

        let frame_count = frames.len();
        if index == 0 {
            self.state.interrupted = false;
        }
        self.state.current_action = action;
        self.state.current_stage_index = index;
        self.state.current_frame_index = 0;
        self.state.current_frame_set = frames;

        if index == 0 {
            self.events.publish(CompanionEvent::ActionStarted {
                companion: self.id,
                action,
            });
        }
        self.events.publish(CompanionEvent::StageEntered {
            companion: self.id,
            action,
            stage: index,
            frame_count,
        });
        self.show_current_frame();

        let epoch = self.epoch;
        self.scheduler
            .set_tick_handler(SchedulerEvent::Tick { epoch }, stage.interval_ms);
        if stage.policy == AdvancePolicy::Once {
            self.scheduler.schedule_once(
                stage.duration_ms(frame_count),
                SchedulerEvent::StageComplete { epoch },
            );
        }
        tracing::debug!(
            "{} entered {} stage {} ({}, {} frames)",
            self.id,
            action,
            index,
            stage.asset_key,
            frame_count
        );
    }

    /// Return to the idle loop, playing the startup clip the first time
    fn enter_idle(&mut self) {
        self.scheduler.cancel_pending();
        if !self.startup_played {
            self.startup_played = true;
            match self.enter_stage(Action::Startup, 0) {
                Ok(()) => return,
                Err(e) => tracing::warn!("Skipping startup clip: {}", e),
            }
        }

        let stage = &Action::Idle.stages()[0];
        let frames = match self.load_stage(Action::Idle, 0) {
            Ok((_, frames)) => frames,
            Err(_) => {
                tracing::warn!("Idle loop running on placeholder frames");
                FrameSet::placeholder(IDLE_PLACEHOLDER_FRAMES)
            }
        };
        self.bind_stage(Action::Idle, 0, stage, frames);
    }

    /// Hard stop back to idle
    fn stop(&mut self) {
        if self.state.is_idle() {
            return;
        }
        self.end_action(false);
        self.enter_idle();
    }

    fn leave_loop(&mut self, interrupted: bool) -> Result<(), BehaviorError> {
        let action = self.state.current_action;
        if action == Action::Sleep {
            let (stage, frames) = self.load_stage(Action::WakeUp, 0)?;
            self.end_action(!interrupted);
            self.bind_stage(Action::WakeUp, 0, stage, frames);
            return Ok(());
        }

        match action.exit_stage(self.state.current_stage_index) {
            Some(exit) => {
                self.enter_stage(action, exit)?;
                self.state.interrupted |= interrupted;
                Ok(())
            }
            None => {
                self.end_action(false);
                self.enter_idle();
                Ok(())
            }
        }
    }

    /// Report the running action as over, unless the companion is idle
    fn end_action(&mut self, natural: bool) {
        if self.state.is_idle() {
            return;
        }
        self.events.publish(CompanionEvent::ActionFinished {
            companion: self.id,
            action: self.state.current_action,
            natural,
        });
    }

    fn show_current_frame(&self) {
        if let Some(frame) = self.state.current_frame() {
            self.events.publish(CompanionEvent::FrameChanged {
                companion: self.id,
                frame: frame.clone(),
                index: self.state.current_frame_index,
            });
        }
    }

    fn on_tick(&mut self, epoch: u64) {
        if epoch != self.epoch {
            tracing::trace!("Dropping tick from epoch {} (current {})", epoch, self.epoch);
            return;
        }
        let Some(stage) = self.state.stage() else {
            self.scheduler.clear_tick_handler();
            return;
        };
        let len = self.state.current_frame_set.len();
        if len == 0 {
            tracing::warn!("Tick with no frames loaded, stopping timer");
            self.scheduler.clear_tick_handler();
            return;
        }

        match stage.policy {
            AdvancePolicy::Loop => {
                let mut index = self.state.current_frame_index;
                if index >= len {
                    tracing::warn!(
                        "Invalid frame index {} for {} frames in {} stage {}, clamping",
                        index,
                        len,
                        self.state.current_action,
                        self.state.current_stage_index
                    );
                    index = len - 1;
                }
                self.state.current_frame_index = (index + 1) % len;
                self.show_current_frame();
            }
            AdvancePolicy::Once => {
                self.state.current_frame_index += 1;
                if self.state.current_frame_index >= len {
                    self.scheduler.clear_tick_handler();
                } else {
                    self.show_current_frame();
                }
            }
        }
    }

    fn on_stage_complete(&mut self, epoch: u64) {
        if epoch != self.epoch {
            tracing::trace!(
                "Dropping stage completion from epoch {} (current {})",
                epoch,
                self.epoch
            );
            return;
        }
        self.scheduler.clear_tick_handler();

        let action = self.state.current_action;
        if action == Action::Shutdown {
            self.terminate();
            return;
        }

        let next = self.state.current_stage_index + 1;
        if next < action.stages().len() {
            if let Err(e) = self.enter_stage(action, next) {
                tracing::warn!("Aborting {}: {}", action, e);
                self.end_action(false);
                self.enter_idle();
            }
            return;
        }

        let natural = !self.state.interrupted;
        if natural {
            self.apply_delta(action.reward());
            counter!("deskpet_actions_completed_total", "action" => action.as_str())
                .increment(1);
        }
        self.end_action(natural);
        self.enter_idle();
    }

    fn apply_delta(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        let old = self.ledger.value();
        if let Err(e) = self.ledger.apply(delta) {
            tracing::warn!("Failed to persist favorability: {}", e);
        }
        let new = self.ledger.value();
        tracing::info!("Favorability {} -> {} ({:+})", old, new, delta);
        self.events.publish(CompanionEvent::FavorabilityChanged {
            companion: self.id,
            old,
            new,
            delta,
        });
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.state.is_shutdown_locked = true;
        self.scheduler.clear_tick_handler();
        self.scheduler.cancel_pending();
        self.epoch += 1;
        if let Err(e) = self.ledger.persist() {
            tracing::warn!("Failed to persist favorability at teardown: {}", e);
        }
        self.events
            .publish(CompanionEvent::Terminated { companion: self.id });
        tracing::info!("Companion {} terminated", self.id);
    }
}
