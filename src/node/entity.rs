//! Capability interfaces of the things a node exposes
//!
//! Concrete sensors, binary sensors and covers live in the firmware. The
//! node loop only sees them through [`Entity`] and their tunables through
//! [`ConfigParameter`].

use crate::protocol::records::{ConfigDescriptor, ConfigItem, EntityDescriptor};
use crate::storage::{ConfigScalar, ConfigStore, PersistedConfigValue, StoreError};

/// A persisted tunable of an entity, type-erased over its scalar width
pub trait ConfigParameter {
    fn config_id(&self) -> u8;

    fn descriptor(&self) -> ConfigDescriptor;

    /// Current value in wire encoding
    fn config_item(&self) -> ConfigItem;

    /// Restore from the store, repairing the slot if needed
    fn load(&mut self, store: &mut dyn ConfigStore) -> Result<(), StoreError>;

    /// Apply a raw wire value (clamped) and write it through
    fn apply(&mut self, raw: u32, store: &mut dyn ConfigStore) -> Result<(), StoreError>;
}

impl<T: ConfigScalar> ConfigParameter for PersistedConfigValue<T> {
    fn config_id(&self) -> u8 {
        PersistedConfigValue::config_id(self)
    }

    fn descriptor(&self) -> ConfigDescriptor {
        PersistedConfigValue::descriptor(self)
    }

    fn config_item(&self) -> ConfigItem {
        PersistedConfigValue::config_item(self)
    }

    fn load(&mut self, store: &mut dyn ConfigStore) -> Result<(), StoreError> {
        PersistedConfigValue::load(self, store)
    }

    fn apply(&mut self, raw: u32, store: &mut dyn ConfigStore) -> Result<(), StoreError> {
        self.set_from_wire(raw, store)
    }
}

/// Something the gateway can discover, read and configure
pub trait Entity {
    fn descriptor(&self) -> EntityDescriptor;

    fn entity_id(&self) -> u8 {
        self.descriptor().entity_id
    }

    /// Current reading in wire encoding
    fn value(&mut self) -> u32;

    fn config_count(&self) -> usize {
        0
    }

    fn config(&self, _index: usize) -> Option<&dyn ConfigParameter> {
        None
    }

    fn config_mut(&mut self, _index: usize) -> Option<&mut dyn ConfigParameter> {
        None
    }

    /// Run a service. Returns false for codes the entity does not know.
    fn call_service(&mut self, _service_code: u8) -> bool {
        false
    }

    /// Index of the config with `config_id`
    fn find_config(&self, config_id: u8) -> Option<usize> {
        (0..self.config_count()).find(|&i| {
            self.config(i)
                .is_some_and(|config| config.config_id() == config_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::records::{ComponentType, ValueType};
    use crate::storage::traits::mock::MemoryStore;

    struct Dimmer {
        level: u8,
        fade_ms: PersistedConfigValue<u16>,
        step: PersistedConfigValue<i8>,
    }

    impl Entity for Dimmer {
        fn descriptor(&self) -> EntityDescriptor {
            EntityDescriptor {
                entity_id: 9,
                component: ComponentType::Sensor,
                device_class: 0,
                unit: 0,
                value_type: ValueType::new(1, false, 0),
            }
        }

        fn value(&mut self) -> u32 {
            self.level as u32
        }

        fn config_count(&self) -> usize {
            2
        }

        fn config(&self, index: usize) -> Option<&dyn ConfigParameter> {
            match index {
                0 => Some(&self.fade_ms),
                1 => Some(&self.step),
                _ => None,
            }
        }

        fn config_mut(&mut self, index: usize) -> Option<&mut dyn ConfigParameter> {
            match index {
                0 => Some(&mut self.fade_ms),
                1 => Some(&mut self.step),
                _ => None,
            }
        }
    }

    #[test]
    fn test_configs_through_trait_objects() {
        let mut store = MemoryStore::<16>::new();
        let mut dimmer = Dimmer {
            level: 40,
            fade_ms: PersistedConfigValue::new(1, 0, 0, 5000, 250),
            step: PersistedConfigValue::new(2, 3, -10, 10, 1),
        };

        assert_eq!(dimmer.entity_id(), 9);
        assert_eq!(dimmer.find_config(2), Some(1));
        assert_eq!(dimmer.find_config(3), None);

        let step = dimmer.config_mut(1).unwrap();
        step.apply((-20i32) as u32, &mut store).unwrap();
        assert_eq!(step.config_item().value as i32, -10);

        let fade = dimmer.config(0).unwrap();
        assert_eq!(fade.descriptor().value_type, ValueType::new(2, false, 0));
        assert!(!dimmer.call_service(1));
    }
}
