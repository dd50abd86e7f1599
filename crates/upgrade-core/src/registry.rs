use std::collections::HashMap;
use std::sync::Arc;

use crate::config::InfoConfig;
use crate::error::{Result, UpgradeError};
use crate::runner::{ActionRunner, ConsoleRunner, ScriptRunner, DEFAULT_INTERPRETER};

pub type RunnerFactory =
    Box<dyn Fn(&InfoConfig) -> Result<Arc<dyn ActionRunner>> + Send + Sync>;

/// Handler tag → runner factory, keyed case-insensitively.
pub struct RunnerRegistry {
    factories: HashMap<String, RunnerFactory>,
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("handlers", &self.handlers())
            .finish()
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RunnerRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// `SCRIPT` and `CONSOLE`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("SCRIPT", |cfg: &InfoConfig| {
            let interpreter = cfg.interpreter.as_deref().unwrap_or(DEFAULT_INTERPRETER);
            Ok(Arc::new(ScriptRunner::new(interpreter)?) as Arc<dyn ActionRunner>)
        });
        registry.register("CONSOLE", |cfg: &InfoConfig| {
            let console = cfg.console.as_deref().ok_or_else(|| {
                UpgradeError::InvalidDefinition(
                    "handler CONSOLE requires a 'console' program".to_string(),
                )
            })?;
            Ok(Arc::new(ConsoleRunner::new(console)?) as Arc<dyn ActionRunner>)
        });
        registry
    }

    /// Register `factory` under `tag`, replacing any previous one.
    pub fn register<F>(&mut self, tag: &str, factory: F)
    where
        F: Fn(&InfoConfig) -> Result<Arc<dyn ActionRunner>> + Send + Sync + 'static,
    {
        let tag = tag.trim().to_ascii_uppercase();
        tracing::debug!(handler = %tag, "runner registered");
        self.factories.insert(tag, Box::new(factory));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories
            .contains_key(&tag.trim().to_ascii_uppercase())
    }

    /// Registered tags, sorted.
    pub fn handlers(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.factories.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Build the runner for an Info configured with `config`.
    pub fn create(&self, config: &InfoConfig) -> Result<Arc<dyn ActionRunner>> {
        let tag = config.handler.trim().to_ascii_uppercase();
        let factory = self
            .factories
            .get(&tag)
            .ok_or_else(|| UpgradeError::UnknownHandler(config.handler.clone()))?;
        factory(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    #[test]
    fn defaults_are_registered() {
        let registry = RunnerRegistry::with_defaults();
        assert_eq!(registry.handlers(), vec!["CONSOLE", "SCRIPT"]);
        assert!(registry.contains("script"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = RunnerRegistry::with_defaults();
        let cfg = InfoConfig {
            handler: "script".into(),
            ..InfoConfig::default()
        };
        assert_eq!(registry.create(&cfg).unwrap().kind(), "SCRIPT");
    }

    #[test]
    fn unknown_handler_is_definition_error() {
        let registry = RunnerRegistry::with_defaults();
        let cfg = InfoConfig {
            handler: "GROOVY".into(),
            ..InfoConfig::default()
        };
        let err = registry.create(&cfg).unwrap_err();
        assert!(matches!(err, UpgradeError::UnknownHandler(_)));
        assert!(err.is_definition_error());
    }

    #[test]
    fn console_requires_program() {
        let registry = RunnerRegistry::with_defaults();
        let cfg = InfoConfig {
            handler: "CONSOLE".into(),
            ..InfoConfig::default()
        };
        assert!(registry.create(&cfg).unwrap_err().is_definition_error());
    }

    #[test]
    fn custom_runner_replaces_nothing_else() {
        let mut registry = RunnerRegistry::with_defaults();
        let runner = Arc::new(RecordingRunner::new());
        let shared = runner.clone();
        registry.register("recording", move |_| Ok(shared.clone() as Arc<dyn ActionRunner>));
        let cfg = InfoConfig {
            handler: "Recording".into(),
            ..InfoConfig::default()
        };
        assert_eq!(registry.create(&cfg).unwrap().kind(), "RECORDING");
        assert_eq!(registry.handlers().len(), 3);
    }
}
