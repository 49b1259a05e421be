use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml_ng as serde_yaml;
use vapp_core::error::{LaunchError, Result};

fn default_cpu() -> u64 {
    1
}

fn default_memory() -> u64 {
    1024
}

fn default_disk() -> u64 {
    10240
}

/// What exists on the simulated control plane before a launch starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulatedWorld {
    #[serde(default)]
    pub vdcs: Vec<VdcConfig>,
    #[serde(default)]
    pub catalogs: Vec<CatalogConfig>,
    /// Largest disk, in MB, the platform accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_disk_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VdcConfig {
    pub name: String,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub storage_profiles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    pub name: String,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// Template sizing new VMs start from. Sizes in MB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogItem {
    pub name: String,
    #[serde(default = "default_cpu")]
    pub cpu: u64,
    #[serde(default = "default_memory")]
    pub memory: u64,
    #[serde(default = "default_disk")]
    pub disk_size: u64,
}

impl CatalogItem {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cpu: default_cpu(),
            memory: default_memory(),
            disk_size: default_disk(),
        }
    }
}

impl SimulatedWorld {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LaunchError::Config(format!("Cannot read world file {}: {e}", path.display()))
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn with_vdc(mut self, name: &str, networks: &[&str], storage_profiles: &[&str]) -> Self {
        self.vdcs.push(VdcConfig {
            name: name.to_string(),
            networks: networks.iter().map(|n| n.to_string()).collect(),
            storage_profiles: storage_profiles.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    pub fn with_catalog(mut self, name: &str, items: &[&str]) -> Self {
        self.catalogs.push(CatalogConfig {
            name: name.to_string(),
            items: items.iter().map(|item| CatalogItem::named(item)).collect(),
        });
        self
    }

    pub fn with_max_disk_size(mut self, size_mb: u64) -> Self {
        self.max_disk_size = Some(size_mb);
        self
    }

    pub fn vdc(&self, name: &str) -> Option<&VdcConfig> {
        self.vdcs.iter().find(|vdc| vdc.name == name)
    }

    pub fn catalog_item(&self, catalog: &str, item: &str) -> Option<&CatalogItem> {
        self.catalogs
            .iter()
            .find(|c| c.name == catalog)
            .and_then(|c| c.items.iter().find(|i| i.name == item))
    }
}
