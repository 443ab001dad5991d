//! This module contains the macros used in the project.

/// Override a configuration value with a non-empty variable from the environment lookup
macro_rules! env_override {
    ($lookup:ident, $config_data:ident . $section:ident . $key:ident, $env_name:literal) => {
        if let Some(value) = $lookup($env_name).filter(|value: &String| !value.is_empty()) {
            $config_data.$section.$key = Some(value);
        }
    };
}

pub(crate) use env_override;
