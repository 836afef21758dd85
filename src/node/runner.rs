//! Host loop tying the protocol engine to the node's entities
//!
//! Each [`Node::poll`] call receives at most one packet, applies config
//! changes and service calls right away, and answers outstanding report
//! requests once the duty cycle allows it. Requests that arrive while the
//! limit is reached are merged and answered later.

use crate::config::addresses::BROADCAST_ENTITY;
use crate::config::protocol::MAX_PAYLOAD;
use crate::node::entity::Entity;
use crate::protocol::cipher::{PayloadCipher, Plaintext};
use crate::protocol::engine::{ProtocolEngine, ReceiveOutcome};
use crate::protocol::error::ProtocolError;
use crate::protocol::message::{ConfigList, RequestHandler};
use crate::protocol::records::{ConfigDescriptor, ConfigItem, EntityDescriptor, ValueItem, WireRecord};
use crate::radio::{Clock, Transceiver};
use crate::storage::ConfigStore;
use heapless::Vec;

/// Merge a request for `entity_id` into a pending slot.
///
/// Two different entities collapse into a broadcast.
fn merge(slot: &mut Option<u8>, entity_id: u8) {
    *slot = match *slot {
        None => Some(entity_id),
        Some(current) if current == entity_id => Some(current),
        Some(_) => Some(BROADCAST_ENTITY),
    };
}

fn matches(entity: &dyn Entity, entity_id: u8) -> bool {
    entity_id == BROADCAST_ENTITY || entity.entity_id() == entity_id
}

/// Requests received but not yet acted on
#[derive(Debug, Default)]
struct PendingRequests {
    discovery: Option<u8>,
    values: Option<u8>,
    configs: Option<u8>,
    config_set: Option<ConfigList>,
    service: Option<(u8, u8)>,
}

impl PendingRequests {
    fn has_reports(&self) -> bool {
        self.discovery.is_some() || self.values.is_some() || self.configs.is_some()
    }
}

impl RequestHandler for PendingRequests {
    fn discovery_requested(&mut self, entity_id: u8) {
        merge(&mut self.discovery, entity_id);
    }

    fn values_requested(&mut self, entity_id: u8) {
        merge(&mut self.values, entity_id);
    }

    fn configs_requested(&mut self, entity_id: u8) {
        merge(&mut self.configs, entity_id);
    }

    fn config_set(&mut self, entity_id: u8, items: &[ConfigItem]) {
        let mut list = ConfigList {
            entity_id,
            items: Vec::new(),
        };
        // Decoded lists never exceed the capacity
        let _ = list.items.extend_from_slice(items);
        self.config_set = Some(list);
    }

    fn service_requested(&mut self, entity_id: u8, service_code: u8) {
        self.service = Some((entity_id, service_code));
    }
}

/// A radio node: protocol engine, config store and request bookkeeping
pub struct Node<R, K, S, C = Plaintext> {
    engine: ProtocolEngine<R, K, C>,
    store: S,
    pending: PendingRequests,
}

impl<R, K, S, C> Node<R, K, S, C>
where
    R: Transceiver,
    K: Clock,
    S: ConfigStore,
    C: PayloadCipher,
{
    pub fn new(engine: ProtocolEngine<R, K, C>, store: S) -> Self {
        Self {
            engine,
            store,
            pending: PendingRequests::default(),
        }
    }

    pub fn engine(&self) -> &ProtocolEngine<R, K, C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine<R, K, C> {
        &mut self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Initialise the radio and restore every config from the store.
    pub async fn init(&mut self, entities: &mut [&mut dyn Entity]) -> Result<(), ProtocolError> {
        self.engine.radio_mut().init().await?;
        self.load_configs(entities);
        log::info!("Node {:#04x} ready, {} entities", self.engine.address(), entities.len());
        Ok(())
    }

    /// Restore every config parameter from the store.
    pub fn load_configs(&mut self, entities: &mut [&mut dyn Entity]) {
        for entity in entities.iter_mut() {
            for index in 0..entity.config_count() {
                if let Some(config) = entity.config_mut(index) {
                    if let Err(e) = config.load(&mut self.store) {
                        log::warn!("Config {}: store write failed ({:?})", config.config_id(), e);
                    }
                }
            }
        }
    }

    /// Queue a value report for every entity, e.g. from a periodic timer.
    pub fn request_value_report(&mut self) {
        self.pending.values_requested(BROADCAST_ENTITY);
    }

    /// Run one receive/act/report cycle.
    ///
    /// A failed receive does not stall pending work: config changes,
    /// services and held-back reports are still processed before the
    /// receive error is returned.
    pub async fn poll(&mut self, entities: &mut [&mut dyn Entity]) -> Result<ReceiveOutcome, ProtocolError> {
        let received = self.engine.receive(&mut self.pending).await;
        if let Err(e) = &received {
            log::warn!("Node receive failed: {:?}", e);
        }

        self.apply_config_set(entities);
        self.call_service(entities);
        self.flush(entities).await?;

        received
    }

    /// Poll forever, logging failed cycles.
    pub async fn run(&mut self, entities: &mut [&mut dyn Entity]) {
        loop {
            if let Err(e) = self.poll(entities).await {
                log::warn!("Node poll failed: {:?}", e);
            }
        }
    }

    fn apply_config_set(&mut self, entities: &mut [&mut dyn Entity]) {
        let Some(list) = self.pending.config_set.take() else {
            return;
        };

        let Some(entity) = entities
            .iter_mut()
            .find(|entity| entity.entity_id() == list.entity_id)
        else {
            log::warn!("configSet for unknown entity {}", list.entity_id);
            return;
        };

        for item in &list.items {
            let Some(index) = entity.find_config(item.config_id) else {
                log::warn!("Entity {}: unknown config {}", list.entity_id, item.config_id);
                continue;
            };

            if let Some(config) = entity.config_mut(index) {
                if let Err(e) = config.apply(item.value, &mut self.store) {
                    log::warn!("Config {}: store write failed ({:?})", item.config_id, e);
                }
            }
        }

        // Report the values actually in effect after clamping
        self.pending.configs_requested(list.entity_id);
    }

    fn call_service(&mut self, entities: &mut [&mut dyn Entity]) {
        let Some((entity_id, service_code)) = self.pending.service.take() else {
            return;
        };

        for entity in entities.iter_mut().filter(|entity| matches(&***entity, entity_id)) {
            if !entity.call_service(service_code) {
                log::warn!("Entity {}: unknown service {}", entity.entity_id(), service_code);
            }
        }
    }

    async fn flush(&mut self, entities: &mut [&mut dyn Entity]) -> Result<(), ProtocolError> {
        if !self.pending.has_reports() {
            return Ok(());
        }

        if self.engine.is_limit_reached() {
            log::info!(
                "Duty cycle limit reached ({} ppm), holding back reports",
                self.engine.duty_cycle_ppm()
            );
            return Ok(());
        }

        if let Some(entity_id) = self.pending.discovery.take() {
            self.send_discovery(entities, entity_id).await?;
        }
        if let Some(entity_id) = self.pending.values.take() {
            self.send_values(entities, entity_id).await?;
        }
        if let Some(entity_id) = self.pending.configs.take() {
            self.send_configs(entities, entity_id).await?;
        }

        Ok(())
    }

    /// Entities with their config descriptors, packed as tightly as fits.
    async fn send_discovery(
        &mut self,
        entities: &mut [&mut dyn Entity],
        entity_id: u8,
    ) -> Result<(), ProtocolError> {
        let mut open = false;

        for entity in entities.iter().filter(|entity| matches(&***entity, entity_id)) {
            let needed =
                EntityDescriptor::LEN + 1 + entity.config_count() * ConfigDescriptor::LEN;
            if open && self.engine.payload_len() + needed > MAX_PAYLOAD {
                self.engine.end_msg().await?;
                open = false;
            }
            if !open {
                self.engine.begin_discovery_msg();
                open = true;
            }

            self.engine.add_discovery_entity(&entity.descriptor())?;
            for index in 0..entity.config_count() {
                if let Some(config) = entity.config(index) {
                    self.engine.add_discovery_config(&config.descriptor())?;
                }
            }
        }

        if open {
            self.engine.end_msg().await?;
        }
        Ok(())
    }

    async fn send_values(
        &mut self,
        entities: &mut [&mut dyn Entity],
        entity_id: u8,
    ) -> Result<(), ProtocolError> {
        let mut open = false;

        for entity in entities.iter_mut().filter(|entity| matches(&***entity, entity_id)) {
            let item = ValueItem {
                entity_id: entity.entity_id(),
                value: entity.value(),
            };

            if !open {
                self.engine.begin_values_msg();
                open = true;
            }

            match self.engine.add_value_item(&item) {
                Ok(()) => {}
                Err(ProtocolError::PayloadFull) => {
                    self.engine.end_msg().await?;
                    self.engine.begin_values_msg();
                    self.engine.add_value_item(&item)?;
                }
                Err(e) => return Err(e),
            }
        }

        if open {
            self.engine.end_msg().await?;
        }
        Ok(())
    }

    /// One config report per entity, continued in a new packet when full.
    async fn send_configs(
        &mut self,
        entities: &mut [&mut dyn Entity],
        entity_id: u8,
    ) -> Result<(), ProtocolError> {
        for entity in entities.iter().filter(|entity| matches(&***entity, entity_id)) {
            if entity.config_count() == 0 {
                continue;
            }

            let id = entity.entity_id();
            self.engine.begin_configs_msg(id);

            for index in 0..entity.config_count() {
                let Some(config) = entity.config(index) else {
                    continue;
                };
                let item = config.config_item();

                match self.engine.add_config_item(&item) {
                    Ok(()) => {}
                    Err(ProtocolError::PayloadFull) => {
                        self.engine.end_msg().await?;
                        self.engine.begin_configs_msg(id);
                        self.engine.add_config_item(&item)?;
                    }
                    Err(e) => return Err(e),
                }
            }

            self.engine.end_msg().await?;
        }
        Ok(())
    }
}
