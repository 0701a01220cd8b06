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

//! Behavior controller integration tests

use deskpet_companion::assets::InMemoryAssetProvider;
use deskpet_companion::behavior::{BehaviorController, BehaviorError, CompanionEvent, EventBus};
use deskpet_companion::common::Action;
use deskpet_companion::ledger::{FavorabilityLedger, MemoryLedgerStore};
use std::sync::Arc;

fn full_assets() -> InMemoryAssetProvider {
    InMemoryAssetProvider::new()
        .with_frames("StartUP/Happy", 2)
        .with_frames("BDay/B", 4)
        .with_frames("WORK/RopeSkipping/Happy/A", 4)
        .with_frames("WORK/RopeSkipping/Happy/B/1", 3)
        .with_frames("WORK/RopeSkipping/Happy/C", 2)
        .with_frames("WORK/Study/A_Nomal", 3)
        .with_frames("WORK/Study/B_1_Nomal", 3)
        .with_frames("WORK/Study/C_Nomal", 3)
        .with_frames("WORK/WorkTWO/A_Nomal", 4)
        .with_frames("WORK/WorkTWO/B_2_Nomal", 2)
        .with_frames("WORK/WorkTWO/C_Nomal", 2)
        .with_frames("Eat/Nomal/back_lay", 5)
        .with_frames("Sleep/A_Happy", 2)
        .with_frames("Sleep/B_Nomal", 2)
        .with_frames("Sleep/C_PoorCondition", 3)
        .with_frames("Shutdown/Happy_1", 2)
}

struct Fixture {
    controller: BehaviorController,
    store: Arc<MemoryLedgerStore>,
    events: EventBus,
}

fn fixture_with(assets: InMemoryAssetProvider, score: i64) -> Fixture {
    let store = Arc::new(MemoryLedgerStore::with_value(score));
    let events = EventBus::new();
    let mut controller = BehaviorController::new(
        Arc::new(assets),
        FavorabilityLedger::open(store.clone()),
        events.clone(),
        0,
    );
    // Startup clip is two frames at 100ms
    controller.advance_to(200);
    assert_eq!(controller.state().current_action, Action::Idle);
    events.clear();
    Fixture {
        controller,
        store,
        events,
    }
}

fn fixture(score: i64) -> Fixture {
    fixture_with(full_assets(), score)
}

/// Advance in small steps until the controller reaches its sustain loop
fn run_until_loop(controller: &mut BehaviorController) {
    let mut now = controller.now();
    for _ in 0..100 {
        if controller.state().in_loop_stage() {
            return;
        }
        now += 10;
        controller.advance_to(now);
    }
    panic!("{} never reached its sustain loop", controller.state().current_action);
}

/// Advance in small steps until the controller is idle again
fn run_until_idle(controller: &mut BehaviorController) {
    let mut now = controller.now();
    for _ in 0..200 {
        if controller.state().is_idle() {
            return;
        }
        now += 10;
        controller.advance_to(now);
    }
    panic!("{} never returned to idle", controller.state().current_action);
}

fn stages_entered(events: &[CompanionEvent], wanted: Action) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            CompanionEvent::StageEntered { action, stage, .. } if *action == wanted => Some(*stage),
            _ => None,
        })
        .collect()
}

#[test]
fn test_exercise_full_play_through_awards_three() {
    let mut f = fixture(100);
    f.controller.request_action(Action::Exercise).unwrap();

    // Enter clip: 4 frames at 100ms
    f.controller.advance_to(599);
    assert_eq!(f.controller.state().current_stage_index, 0);
    f.controller.advance_to(600);
    assert_eq!(f.controller.state().current_stage_index, 1);

    // The sustain loop never ends on its own
    f.controller.advance_to(5_000);
    assert_eq!(f.controller.state().current_action, Action::Exercise);
    assert_eq!(f.controller.state().current_stage_index, 1);
    assert_eq!(f.controller.favorability(), 100);

    f.controller.finish().unwrap();
    assert_eq!(f.controller.state().current_stage_index, 2);
    f.controller.advance_to(5_200);

    assert!(f.controller.state().is_idle());
    assert_eq!(f.controller.favorability(), 103);
    assert_eq!(f.store.stored(), Some(103));

    let events = f.events.drain();
    assert_eq!(stages_entered(&events, Action::Exercise), vec![0, 1, 2]);
    assert!(events.iter().any(|e| matches!(
        e,
        CompanionEvent::ActionFinished {
            action: Action::Exercise,
            natural: true,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        CompanionEvent::FavorabilityChanged {
            old: 100,
            new: 103,
            delta: 3,
            ..
        }
    )));
}

#[test]
fn test_interrupt_work_loop_plays_exit_without_reward() {
    let mut f = fixture(100);
    f.controller.request_action(Action::Work).unwrap();
    run_until_loop(&mut f.controller);

    f.controller.interrupt().unwrap();
    assert_eq!(f.controller.state().current_action, Action::Work);
    assert_eq!(f.controller.state().current_stage_index, 2);

    run_until_idle(&mut f.controller);
    assert_eq!(f.controller.favorability(), 100);
    assert_eq!(f.store.write_count(), 0);

    let events = f.events.drain();
    assert_eq!(stages_entered(&events, Action::Work), vec![0, 1, 2]);
    assert!(events.iter().any(|e| matches!(
        e,
        CompanionEvent::ActionFinished {
            action: Action::Work,
            natural: false,
            ..
        }
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, CompanionEvent::FavorabilityChanged { .. })));
}

#[test]
fn test_interrupt_in_loop_always_passes_through_exit() {
    for action in [Action::Exercise, Action::Study, Action::Work] {
        let mut f = fixture(50);
        f.controller.request_action(action).unwrap();
        run_until_loop(&mut f.controller);
        f.controller.interrupt().unwrap();
        run_until_idle(&mut f.controller);

        let events = f.events.drain();
        assert_eq!(stages_entered(&events, action), vec![0, 1, 2], "{}", action);
        assert_eq!(f.controller.favorability(), 50, "{}", action);
    }
}

#[test]
fn test_natural_completion_deltas_are_exact() {
    for (action, expected) in [
        (Action::Exercise, 3),
        (Action::Study, 5),
        (Action::Work, 4),
        (Action::Eat, 2),
    ] {
        let mut f = fixture(60);
        f.controller.request_action(action).unwrap();
        if action != Action::Eat {
            run_until_loop(&mut f.controller);
            f.controller.finish().unwrap();
        }
        run_until_idle(&mut f.controller);
        assert_eq!(f.controller.favorability(), 60 + expected, "{}", action);
    }
}

#[test]
fn test_reward_applied_once_per_completion() {
    let mut f = fixture(10);
    f.controller.request_action(Action::Eat).unwrap();
    run_until_idle(&mut f.controller);
    f.controller.advance_to(f.controller.now() + 10_000);

    assert_eq!(f.controller.favorability(), 12);
    let changes = f
        .events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, CompanionEvent::FavorabilityChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn test_clone_blocked_below_threshold() {
    let mut f = fixture(3);
    let result = f.controller.request_clone();

    assert!(matches!(
        result,
        Err(BehaviorError::CloneBlocked {
            score: 3,
            required: 5
        })
    ));
    assert_eq!(f.controller.favorability(), 3);
    assert!(f.controller.children().is_empty());
    assert_eq!(f.store.write_count(), 0);

    let events = f.events.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        CompanionEvent::ActionBlocked {
            action: Action::Clone,
            ..
        }
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, CompanionEvent::CloneSpawned { .. })));
}

#[test]
fn test_clone_succeeds_and_clamps_at_zero() {
    let mut f = fixture(10);
    let child = f.controller.request_clone().unwrap();

    assert_eq!(f.controller.favorability(), 0);
    assert_eq!(f.store.stored(), Some(0));
    assert_eq!(child.favorability(), 10);
    assert_eq!(child.state().current_action, Action::Startup);

    let events = f.events.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        CompanionEvent::CloneSpawned { parent, child: spawned }
            if *parent == f.controller.id() && *spawned == child.id()
    )));
}

#[test]
fn test_clone_is_independent_of_parent() {
    let mut f = fixture(40);
    let mut child = f.controller.request_clone().unwrap();
    // The clone plays its own startup clip
    child.advance_to(400);
    assert!(child.state().is_idle());

    child.request_action(Action::Eat).unwrap();
    f.controller.request_action(Action::Sleep).unwrap();
    run_until_idle(&mut child);

    assert_eq!(child.favorability(), 42);
    assert_eq!(f.controller.favorability(), 30);
    assert_eq!(f.controller.state().current_action, Action::Sleep);
}

#[test]
fn test_missing_eat_assets_keep_idle() {
    let assets = full_assets().with_frames("Eat/Nomal/back_lay", 0);
    let mut f = fixture_with(assets, 100);

    let result = f.controller.request_action(Action::Eat);
    assert!(matches!(result, Err(BehaviorError::AssetLoad { .. })));
    assert!(f.controller.state().is_idle());
    assert_eq!(f.controller.state().current_stage_index, 0);
    assert_eq!(f.controller.pending_calls(), 0);
    assert_eq!(stages_entered(&f.events.drain(), Action::Eat), Vec::<usize>::new());

    f.controller.advance_to(2_000);
    assert!(f.controller.state().is_idle());
    assert_eq!(f.controller.favorability(), 100);
}

#[test]
fn test_missing_assets_during_action_leave_it_running() {
    let assets = full_assets().with_frames("Eat/Nomal/back_lay", 0);
    let mut f = fixture_with(assets, 100);
    f.controller.request_action(Action::Study).unwrap();
    run_until_loop(&mut f.controller);

    assert!(f.controller.request_action(Action::Eat).is_err());
    assert_eq!(f.controller.state().current_action, Action::Study);
    assert_eq!(f.controller.state().current_stage_index, 1);
}

#[test]
fn test_rerequest_restarts_from_first_stage() {
    let mut f = fixture(100);
    f.controller.request_action(Action::Work).unwrap();
    run_until_loop(&mut f.controller);

    f.controller.request_action(Action::Work).unwrap();
    assert_eq!(f.controller.state().current_stage_index, 0);
    assert_eq!(f.controller.state().current_frame_index, 0);
    assert_eq!(f.controller.pending_calls(), 1);
}

#[test]
fn test_superseded_completion_never_fires() {
    let mut f = fixture(100);
    // Eat would complete at 700
    f.controller.request_action(Action::Eat).unwrap();
    f.controller.advance_to(400);
    f.controller.request_action(Action::Sleep).unwrap();

    f.controller.advance_to(700);
    assert_eq!(f.controller.state().current_action, Action::Sleep);
    assert_eq!(f.controller.favorability(), 100);
}

#[test]
fn test_sleep_wakes_through_recovery_clip() {
    let mut f = fixture(100);
    f.controller.request_action(Action::Sleep).unwrap();
    run_until_loop(&mut f.controller);
    f.controller.advance_to(f.controller.now() + 3_000);
    assert_eq!(f.controller.state().current_action, Action::Sleep);

    f.controller.request_action(Action::WakeUp).unwrap();
    assert_eq!(f.controller.state().current_action, Action::WakeUp);
    run_until_idle(&mut f.controller);
    assert_eq!(f.controller.favorability(), 100);
}

#[test]
fn test_hard_stop_returns_to_idle_without_reward() {
    let mut f = fixture(100);
    f.controller.request_action(Action::Exercise).unwrap();
    run_until_loop(&mut f.controller);

    f.controller.request_action(Action::Idle).unwrap();
    assert!(f.controller.state().is_idle());
    f.controller.advance_to(f.controller.now() + 1_000);
    assert_eq!(f.controller.favorability(), 100);
}

#[test]
fn test_shutdown_rejects_everything_then_terminates() {
    let mut f = fixture(100);
    f.controller.request_action(Action::Work).unwrap();
    f.controller.request_shutdown().unwrap();

    assert_eq!(
        f.controller.request_action(Action::Eat),
        Err(BehaviorError::ShutdownInProgress)
    );
    assert_eq!(f.controller.finish(), Err(BehaviorError::ShutdownInProgress));
    assert_eq!(
        f.controller.request_shutdown(),
        Err(BehaviorError::ShutdownInProgress)
    );
    assert_eq!(f.controller.state().current_action, Action::Shutdown);

    f.controller.advance_to(400);
    assert!(f.controller.is_terminated());
    assert_eq!(f.store.stored(), Some(100));

    let events = f.events.drain();
    assert!(matches!(
        events.last(),
        Some(CompanionEvent::Terminated { .. })
    ));
}

#[test]
fn test_loop_frames_are_reported_in_order() {
    let mut f = fixture(100);
    f.controller.advance_to(700);

    let indices: Vec<usize> = f
        .events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            CompanionEvent::FrameChanged { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![1, 2, 3, 0, 1]);
}
