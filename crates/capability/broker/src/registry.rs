//! broker 注册表：按名称选择实现（编译期注册）。

use crate::error::BrokerError;
use crate::padi::{BrokerConfig, PadiBroker};
use crate::ContextBroker;

/// broker 构造函数。
pub type BrokerConstructor = fn(BrokerConfig) -> Box<dyn ContextBroker>;

/// broker 注册表。
#[derive(Clone)]
pub struct BrokerRegistry {
    entries: Vec<(&'static str, BrokerConstructor)>,
}

impl BrokerRegistry {
    /// 空注册表。
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 内置 broker（`padi`）。
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("padi", padi);
        registry
    }

    /// 注册（同名覆盖）。
    pub fn register(&mut self, name: &'static str, constructor: BrokerConstructor) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((name, constructor)),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    /// 按名称构造 broker。
    pub fn create(
        &self,
        name: &str,
        config: BrokerConfig,
    ) -> Result<Box<dyn ContextBroker>, BrokerError> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, constructor)| constructor(config))
            .ok_or_else(|| BrokerError::UnknownBroker(name.to_string()))
    }
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn padi(config: BrokerConfig) -> Box<dyn ContextBroker> {
    Box::new(PadiBroker::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_padi() {
        let registry = BrokerRegistry::builtin();
        assert_eq!(registry.names(), vec!["padi"]);
        let broker = registry
            .create("padi", BrokerConfig::default())
            .expect("padi broker");
        assert_eq!(broker.name(), "padi");
    }

    #[test]
    fn unknown_broker_is_rejected() {
        let registry = BrokerRegistry::builtin();
        let err = registry
            .create("acme", BrokerConfig::default())
            .err()
            .expect("unknown broker");
        assert!(matches!(err, BrokerError::UnknownBroker(ref name) if name == "acme"));
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = BrokerRegistry::new();
        registry.register("padi", padi);
        registry.register("padi", padi);
        assert_eq!(registry.names().len(), 1);
    }
}
