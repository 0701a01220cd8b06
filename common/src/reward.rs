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

//! Favorability reward table

use crate::action::Action;

/// Score of a companion with no persisted ledger
pub const DEFAULT_FAVORABILITY: i64 = 100;

/// Minimum score required to spawn a clone
pub const CLONE_MIN_FAVORABILITY: i64 = 5;

/// Added for every successful chat reply
pub const CHAT_REPLY_REWARD: i64 = 1;

impl Action {
    /// Favorability delta applied when this action completes naturally.
    ///
    /// `Clone` is charged on every successful spawn instead.
    pub fn reward(&self) -> i64 {
        match self {
            Action::Exercise => 3,
            Action::Study => 5,
            Action::Work => 4,
            Action::Eat => 2,
            Action::Clone => -10,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_table() {
        assert_eq!(Action::Exercise.reward(), 3);
        assert_eq!(Action::Study.reward(), 5);
        assert_eq!(Action::Work.reward(), 4);
        assert_eq!(Action::Eat.reward(), 2);
        assert_eq!(Action::Clone.reward(), -10);

        for action in [
            Action::Idle,
            Action::Startup,
            Action::Sleep,
            Action::WakeUp,
            Action::Shutdown,
        ] {
            assert_eq!(action.reward(), 0, "{action}");
        }
    }
}
