//! Shader programs and shader folder loading.
//!
//! A shader folder `shaders/basic/` holds one file per stage named after the
//! folder: `basic.vs` and `basic.fs` are required, `basic.gs`, `basic.ts` and
//! `basic.tes` are picked up when present.

use std::fmt;
use std::rc::Rc;

use futures::future::join5;

use super::Fetch;
use crate::error::LoadError;
use crate::gpu::{ProgramId, ShaderSources};

/// A linked program owned by the resource cache. Cheap to clone; materials
/// hold these.
#[derive(Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    id: ProgramId,
    name: Rc<str>,
}

impl ShaderProgram {
    pub fn new(id: ProgramId, name: impl Into<Rc<str>>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// The folder the program was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderProgram({} {})", self.id, self.name)
    }
}

/// Cache key of a shader folder: the URL without trailing slashes.
pub fn normalize_folder(folder: &str) -> &str {
    folder.trim_end_matches('/')
}

/// Last non-empty path segment of a folder URL.
pub fn folder_basename(folder: &str) -> Option<&str> {
    folder.split('/').rev().find(|s| !s.is_empty())
}

/// Fetch every stage of the folder `folder` (already normalised).
pub async fn load_shader_sources(
    fetcher: &dyn Fetch,
    folder: &str,
) -> Result<ShaderSources, LoadError> {
    let Some(base) = folder_basename(folder) else {
        return Err(LoadError::Fetch {
            url: folder.to_owned(),
            reason: "the folder URL has no name".to_owned(),
        });
    };
    let stage = |ext: &str| fetcher.fetch_text(&format!("{folder}/{base}.{ext}"));
    let (vertex, fragment, geometry, tess_control, tess_eval) =
        join5(stage("vs"), stage("fs"), stage("gs"), stage("ts"), stage("tes")).await;

    let required = |result: anyhow::Result<String>, stage: &'static str| {
        result.map_err(|e| {
            log::warn!("{stage} stage of {folder}: {e:#}");
            LoadError::MissingStage {
                folder: folder.to_owned(),
                stage,
            }
        })
    };
    let optional = |result: anyhow::Result<String>, stage: &str| match result {
        Ok(source) => Some(source),
        Err(e) => {
            log::debug!("no {stage} stage in {folder}: {e:#}");
            None
        }
    };

    Ok(ShaderSources {
        vertex: required(vertex, "vertex")?,
        fragment: required(fragment, "fragment")?,
        geometry: optional(geometry, "geometry"),
        tess_control: optional(tess_control, "tessellation control"),
        tess_eval: optional(tess_eval, "tessellation evaluation"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names() {
        assert_eq!(normalize_folder("shaders/basic//"), "shaders/basic");
        assert_eq!(folder_basename("shaders/basic/"), Some("basic"));
        assert_eq!(folder_basename("/"), None);
    }
}
