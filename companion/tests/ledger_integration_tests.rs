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

//! File-backed favorability ledger integration tests

use deskpet_companion::assets::InMemoryAssetProvider;
use deskpet_companion::behavior::{BehaviorController, EventBus};
use deskpet_companion::common::Action;
use deskpet_companion::ledger::{FavorabilityLedger, FileLedgerStore, LedgerStore};
use std::sync::Arc;

fn eat_assets() -> Arc<InMemoryAssetProvider> {
    Arc::new(
        InMemoryAssetProvider::new()
            .with_frames("BDay/B", 2)
            .with_frames("Eat/Nomal/back_lay", 2),
    )
}

#[test]
fn test_malformed_ledger_loads_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".deskpet_config.json");
    std::fs::write(&path, "not json at all").unwrap();

    let store = Arc::new(FileLedgerStore::new(&path));
    let controller = BehaviorController::new(
        eat_assets(),
        FavorabilityLedger::open(store),
        EventBus::new(),
        0,
    );
    assert_eq!(controller.favorability(), 100);
}

#[test]
fn test_save_load_clamps_any_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileLedgerStore::new(dir.path().join("ledger.json"));

    for value in [-1_000, -1, 0, 1, 99, 100, 12_345] {
        store.save(value).unwrap();
        assert_eq!(store.load(), value.max(0), "saved {}", value);
    }
}

#[test]
fn test_score_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");

    {
        let store = Arc::new(FileLedgerStore::new(&path));
        let mut controller = BehaviorController::new(
            eat_assets(),
            FavorabilityLedger::open(store),
            EventBus::new(),
            0,
        );
        // No startup clip in this asset set, so idle begins at once
        assert!(controller.state().is_idle());
        controller.request_action(Action::Eat).unwrap();
        controller.advance_to(200);
        assert_eq!(controller.favorability(), 102);
        controller.close();
    }

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        r#"{"favorability":102}"#
    );

    let store = Arc::new(FileLedgerStore::new(&path));
    let controller = BehaviorController::new(
        eat_assets(),
        FavorabilityLedger::open(store),
        EventBus::new(),
        0,
    );
    assert_eq!(controller.favorability(), 102);
}

#[test]
fn test_negative_record_loads_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, r#"{"favorability": -7}"#).unwrap();

    assert_eq!(FileLedgerStore::new(&path).load(), 0);
}
