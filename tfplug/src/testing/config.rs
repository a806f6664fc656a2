//! Test configurations built as values instead of HCL

use crate::types::Dynamic;

/// One `provider`, `resource` or `data` block
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBlock {
    pub type_name: String,
    pub name: String,
    pub attributes: Dynamic,
}

impl ConfigBlock {
    /// State address, `type.name`
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }

    /// Name of the provider serving this block's type
    pub fn provider(&self) -> &str {
        provider_name(&self.type_name)
    }
}

/// Configuration for one test step
///
/// ```rust,ignore
/// let config = Config::new().resource(
///     "corner_user",
///     "foo",
///     [("email", Dynamic::from("ford@prefect.co")), ("age", Dynamic::from(200))],
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub providers: Vec<ConfigBlock>,
    pub resources: Vec<ConfigBlock>,
    pub data_sources: Vec<ConfigBlock>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit provider block. Providers used without one get an empty
    /// configuration
    pub fn provider<K, V, I>(mut self, name: &str, attributes: I) -> Self
    where
        K: Into<String>,
        V: Into<Dynamic>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.providers.push(ConfigBlock {
            type_name: name.to_string(),
            name: name.to_string(),
            attributes: Dynamic::object(attributes),
        });
        self
    }

    pub fn resource<K, V, I>(mut self, type_name: &str, name: &str, attributes: I) -> Self
    where
        K: Into<String>,
        V: Into<Dynamic>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.resources.push(ConfigBlock {
            type_name: type_name.to_string(),
            name: name.to_string(),
            attributes: Dynamic::object(attributes),
        });
        self
    }

    pub fn data<K, V, I>(mut self, type_name: &str, name: &str, attributes: I) -> Self
    where
        K: Into<String>,
        V: Into<Dynamic>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.data_sources.push(ConfigBlock {
            type_name: type_name.to_string(),
            name: name.to_string(),
            attributes: Dynamic::object(attributes),
        });
        self
    }

    /// Configuration of a provider, empty when it has no block
    pub fn provider_config(&self, name: &str) -> Dynamic {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.attributes.clone())
            .unwrap_or_else(|| Dynamic::object(Vec::<(String, Dynamic)>::new()))
    }

    /// Every provider referenced by a block, in first-use order
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let blocks = self
            .providers
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.data_sources.iter().map(ConfigBlock::provider))
            .chain(self.resources.iter().map(ConfigBlock::provider));

        for name in blocks {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

/// Provider part of a type name: everything before the first underscore
pub fn provider_name(type_name: &str) -> &str {
    type_name
        .split_once('_')
        .map(|(provider, _)| provider)
        .unwrap_or(type_name)
}
