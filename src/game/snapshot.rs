//! Match views - full and player-scoped exports of match state

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::r#match::{GameMatch, MatchStatus};
use super::world::{GameObject, Location, LocationId, Player, PlayerId};

/// Serializable picture of a match as one caller may see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub name: String,
    pub status: MatchStatus,
    pub players: BTreeMap<PlayerId, Player>,
    pub locations: Vec<Location>,
    pub objects: Vec<GameObject>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MatchView {
    /// Locations where `player` has at least one object
    pub fn occupied_by(&self, player: &PlayerId) -> HashSet<LocationId> {
        occupied(&self.objects, player)
    }
}

fn occupied(objects: &[GameObject], player: &PlayerId) -> HashSet<LocationId> {
    objects
        .iter()
        .filter(|o| o.owner == *player)
        .map(|o| o.location)
        .collect()
}

impl GameMatch {
    /// Everything, unfiltered
    pub fn export_all(&self) -> MatchView {
        self.view(self.players.clone(), self.objects.clone())
    }

    /// What `player` may see. Running matches hide other players' records
    /// and every object outside the locations `player` occupies.
    pub fn export_for(&self, player: &PlayerId) -> MatchView {
        if self.status != MatchStatus::Running {
            return self.export_all();
        }

        let players = self
            .players
            .get_key_value(player)
            .map(|(id, p)| BTreeMap::from([(id.clone(), p.clone())]))
            .unwrap_or_default();

        let visible = occupied(&self.objects, player);
        let objects = self
            .objects
            .iter()
            .filter(|o| visible.contains(&o.location))
            .cloned()
            .collect();

        self.view(players, objects)
    }

    fn view(&self, players: BTreeMap<PlayerId, Player>, objects: Vec<GameObject>) -> MatchView {
        MatchView {
            name: self.name.clone(),
            status: self.status,
            players,
            locations: self.locations.clone(),
            objects,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}
