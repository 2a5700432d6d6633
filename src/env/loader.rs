use std::{fs, io::Cursor, path::Path};

use anyhow::{Context, Result};

use crate::model::Environment;

pub fn load_env_file(path: &Path, name: &str) -> Result<Environment> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading env file {}", path.display()))?;

    let mut environment = Environment::new(name);
    for item in dotenvy::from_read_iter(Cursor::new(content)) {
        let (key, value) = item.with_context(|| format!("parsing env file {}", path.display()))?;
        environment.variables.insert(key, value);
    }

    tracing::debug!(
        environment = name,
        variables = environment.variables.len(),
        "loaded env file"
    );
    Ok(environment)
}
