//! Shader Objects
//!
//! A [`Shader`] is a compiled shader blob plus the metadata the cache needs for
//! pipeline identity. Identity is the **content hash** (xxh3-128 of the
//! bytecode) together with the stage, never the allocation address: the
//! front end may free and re-create a shader object with identical bytecode,
//! and both must resolve to the same cached pipeline.
//!
//! Shaders are shared as [`ShaderRef`] (`Arc<Shader>`), so descriptors and
//! in-flight compile tasks keep them alive without manual reference counting.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_128;

/// Pipeline stage a shader is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
    RayGen,
    Miss,
    ClosestHit,
}

impl ShaderStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "Vertex",
            Self::Hull => "Hull",
            Self::Domain => "Domain",
            Self::Geometry => "Geometry",
            Self::Pixel => "Pixel",
            Self::Compute => "Compute",
            Self::RayGen => "RayGen",
            Self::Miss => "Miss",
            Self::ClosestHit => "ClosestHit",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to a shader object.
pub type ShaderRef = Arc<Shader>;

/// An immutable compiled shader.
pub struct Shader {
    name: String,
    stage: ShaderStage,
    bytecode: Arc<[u8]>,
    content_hash: u128,
}

impl Shader {
    /// Creates a shader and computes its content hash.
    #[must_use]
    pub fn new(name: impl Into<String>, stage: ShaderStage, bytecode: impl Into<Arc<[u8]>>) -> Self {
        let bytecode = bytecode.into();
        let content_hash = xxh3_128(&bytecode);
        Self {
            name: name.into(),
            stage,
            bytecode,
            content_hash,
        }
    }

    /// Convenience constructor returning a [`ShaderRef`].
    #[must_use]
    pub fn shared(name: impl Into<String>, stage: ShaderStage, bytecode: impl Into<Arc<[u8]>>) -> ShaderRef {
        Arc::new(Self::new(name, stage, bytecode))
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// xxh3-128 of the bytecode.
    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> u128 {
        self.content_hash
    }
}

impl PartialEq for Shader {
    fn eq(&self, other: &Self) -> bool {
        self.stage == other.stage && self.content_hash == other.content_hash
    }
}

impl Eq for Shader {}

impl Hash for Shader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stage.hash(state);
        self.content_hash.hash(state);
    }
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("content_hash", &format_args!("{:032x}", self.content_hash))
            .finish_non_exhaustive()
    }
}
