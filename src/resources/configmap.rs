//! ConfigMap generation for Dragonfly.
//!
//! Renders `spec.config` into a Dragonfly flag file. The StatefulSet mounts
//! it and starts dragonfly with `--flagfile`.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use crate::crd::DragonflyDb;
use crate::resources::FactoryError;
use crate::resources::common::{ParentMeta, child_metadata, config_map_name};

/// Key of the flag file inside the ConfigMap.
pub const FLAGFILE_KEY: &str = "dragonfly.conf";

/// Flags the operator owns; users may not set them through `spec.config`.
const RESERVED_FLAGS: &[&str] = &["port", "flagfile"];

/// Generate the ConfigMap holding the Dragonfly flag file.
pub fn generate_configmap(
    resource: &DragonflyDb,
    parent: &ParentMeta,
) -> Result<ConfigMap, FactoryError> {
    let flagfile = render_flagfile(resource.spec.port, &resource.spec.config)?;

    Ok(ConfigMap {
        metadata: child_metadata(resource, parent, config_map_name(&parent.name)),
        data: Some(BTreeMap::from([(FLAGFILE_KEY.to_string(), flagfile)])),
        ..Default::default()
    })
}

/// Render a flag file: the port first, then each entry in key order.
pub fn render_flagfile(
    port: i32,
    config: &BTreeMap<String, String>,
) -> Result<String, FactoryError> {
    let mut out = format!("--port={port}\n");
    for (key, value) in config {
        validate_flag_name(key)?;
        if value.contains('\n') {
            return Err(FactoryError::Validation(format!(
                "config value for '{key}' must be a single line"
            )));
        }
        out.push_str(&format!("--{key}={value}\n"));
    }
    Ok(out)
}

fn validate_flag_name(key: &str) -> Result<(), FactoryError> {
    let valid = !key.is_empty()
        && !key.starts_with('-')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(FactoryError::Validation(format!(
            "invalid config key '{key}': expected a flag name without leading dashes"
        )));
    }
    if RESERVED_FLAGS.contains(&key) {
        return Err(FactoryError::Validation(format!(
            "config key '{key}' is managed by the operator"
        )));
    }
    Ok(())
}
