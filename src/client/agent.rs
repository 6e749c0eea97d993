//! Client-side mirror of the relay registry.
//!
//! The agent owns exactly one craft. It flies that craft with the local
//! controls and keeps every other craft in step with what the relay says.

use tracing::{debug, info};

use crate::game::craft::{Craft, CraftId};
use crate::game::registry::CraftRegistry;
use crate::game::systems::burn::{apply_burns, ControlState};
use crate::game::systems::orbit::{self, CraftPose};
use crate::net::protocol::Message;

/// Mirror of the relay registry plus the locally owned craft
pub struct SyncAgent {
    own_id: CraftId,
    mirror: CraftRegistry,
    controls: ControlState,
}

impl SyncAgent {
    /// Start mirroring with our own craft already present
    pub fn new(craft: Craft) -> Self {
        let own_id = craft.id.clone();
        let mut mirror = CraftRegistry::new();
        mirror.register(craft);

        Self {
            own_id,
            mirror,
            controls: ControlState::default(),
        }
    }

    pub fn own_id(&self) -> &str {
        &self.own_id
    }

    pub fn own_craft(&self) -> Option<&Craft> {
        self.mirror.get(&self.own_id)
    }

    /// `craftRegistration` announcing our craft, sent once on connect
    pub fn registration_message(&self) -> Option<Message> {
        self.own_craft().cloned().map(Message::registration)
    }

    /// `craftUpdate` with the current state of our craft
    pub fn update_message(&self) -> Option<Message> {
        self.own_craft().cloned().map(Message::update)
    }

    /// Apply one message from the relay.
    ///
    /// Our own craft is never replaced from the wire; we are the only writer
    /// of its elements and fuel.
    pub fn handle(&mut self, message: Message) {
        match message {
            Message::Welcome { message } => {
                info!("Server: {}", message);
            }
            Message::CraftRegistration { craft_data } => {
                if craft_data.id != self.own_id && !self.mirror.contains(&craft_data.id) {
                    debug!("Craft {} ({}) joined", craft_data.id, craft_data.name);
                    self.mirror.register(craft_data);
                }
            }
            Message::CraftUpdate { craft_data } => {
                if craft_data.id != self.own_id {
                    self.mirror.update(craft_data);
                }
            }
            Message::CraftUpdateAll { craft_data } => {
                self.mirror.reconcile(craft_data, &self.own_id);
            }
            Message::CraftRemoval { craft_id } => {
                if craft_id != self.own_id {
                    debug!("Craft {} left", craft_id);
                    self.mirror.remove(&craft_id);
                }
            }
        }
    }

    pub fn controls(&self) -> ControlState {
        self.controls
    }

    pub fn set_controls(&mut self, controls: ControlState) {
        self.controls = controls;
    }

    /// One simulation step: burn our craft, then move every craft along its orbit
    pub fn tick(&mut self, dt: f64) {
        let controls = self.controls;
        if controls.any() {
            if let Some(own) = self.mirror.get_mut(&self.own_id) {
                apply_burns(own, &controls, dt);
            }
        }

        for craft in self.mirror.iter_mut() {
            orbit::advance(craft);
        }
    }

    /// Current pose of every mirrored craft, ordered by id
    pub fn poses(&self) -> Vec<(CraftId, CraftPose)> {
        let mut poses: Vec<_> = self
            .mirror
            .iter()
            .map(|craft| (craft.id.clone(), orbit::pose(craft)))
            .collect();
        poses.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        poses
    }

    pub fn craft_count(&self) -> usize {
        self.mirror.len()
    }

    pub fn mirror(&self) -> &CraftRegistry {
        &self.mirror
    }
}
