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

//! Chat persona tiers

use serde::{Deserialize, Serialize};

/// Personality the companion speaks with, chosen by favorability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaTier {
    /// Below 30: terse and cold
    Aloof,
    /// 30 up to 70: neutral and friendly
    Friendly,
    /// 70 and above: warm and expressive
    Affectionate,
}

impl PersonaTier {
    pub fn for_favorability(favorability: i64) -> Self {
        if favorability < 30 {
            PersonaTier::Aloof
        } else if favorability < 70 {
            PersonaTier::Friendly
        } else {
            PersonaTier::Affectionate
        }
    }

    /// System prompt sent with every chat request in this tier
    pub fn system_prompt(&self) -> &'static str {
        match self {
            PersonaTier::Aloof => {
                "You are an aloof desk cat named Mikan. Your replies are short and cool, \
                 and now and then you answer with nothing more than 'meow'."
            }
            PersonaTier::Friendly => {
                "You are Mikan, a friendly desk cat. You answer your owner warmly and \
                 with a gentle tone."
            }
            PersonaTier::Affectionate => {
                "You are Mikan, a lively desk cat who adores your owner. You purr ~meow meow~, \
                 sprinkle in kaomoji like (=^･ω･^=), and love to be fussed over!"
            }
        }
    }

    /// In-character text shown when a chat request fails
    pub fn failure_message(error: &str) -> String {
        format!("Mrrp... something went wrong, meow~ ({})", error)
    }
}
