//! Prompt template loading and rendering via `minijinja`.
//!
//! Every prompt has a built-in template compiled into the binary. An
//! operator can point the engine at a directory and override any subset
//! of them by dropping a `<name>.j2` file there, which lets prompt wording
//! be tuned without recompiling.

use std::path::Path;

use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

use crate::error::SimError;

/// The prompts the simulation core renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Single-community culture evolution.
    Evolution,
    /// Single-community interference.
    Interference,
    /// Two-community diplomacy.
    Diplomacy,
    /// Two-community interference.
    InterferencePair,
    /// Two-community merge.
    Merge,
    /// Second-phase synthesis over merged backend answers.
    Synthesis,
}

impl PromptKind {
    /// Every prompt kind.
    pub const ALL: [Self; 6] = [
        Self::Evolution,
        Self::Interference,
        Self::Diplomacy,
        Self::InterferencePair,
        Self::Merge,
        Self::Synthesis,
    ];

    /// Template name inside the engine.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Evolution => "evolution",
            Self::Interference => "interference",
            Self::Diplomacy => "diplomacy",
            Self::InterferencePair => "interference_pair",
            Self::Merge => "merge",
            Self::Synthesis => "synthesis",
        }
    }

    const fn builtin(self) -> &'static str {
        match self {
            Self::Evolution => include_str!("../templates/evolution.j2"),
            Self::Interference => include_str!("../templates/interference.j2"),
            Self::Diplomacy => include_str!("../templates/diplomacy.j2"),
            Self::InterferencePair => include_str!("../templates/interference_pair.j2"),
            Self::Merge => include_str!("../templates/merge.j2"),
            Self::Synthesis => include_str!("../templates/synthesis.j2"),
        }
    }
}

/// Renders simulation prompts.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for PromptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptEngine").finish_non_exhaustive()
    }
}

impl PromptEngine {
    /// An engine with only the built-in templates.
    pub fn builtin() -> Result<Self, SimError> {
        Self::new(None)
    }

    /// An engine whose templates may be overridden from `templates_dir`.
    ///
    /// Files missing from the directory fall back to the built-in template.
    /// A directory that does not exist is a configuration error.
    pub fn new(templates_dir: Option<&Path>) -> Result<Self, SimError> {
        if let Some(dir) = templates_dir
            && !dir.is_dir()
        {
            return Err(SimError::Config(format!(
                "templates directory {} does not exist",
                dir.display()
            )));
        }

        let mut env = Environment::new();
        for kind in PromptKind::ALL {
            let source = match templates_dir.map(|dir| dir.join(format!("{}.j2", kind.name()))) {
                Some(path) if path.is_file() => {
                    debug!(template = kind.name(), path = %path.display(), "loading template override");
                    std::fs::read_to_string(&path).map_err(|e| {
                        SimError::Template(format!("failed to read {}: {e}", path.display()))
                    })?
                }
                _ => kind.builtin().to_owned(),
            };
            env.add_template_owned(kind.name(), source).map_err(|e| {
                SimError::Template(format!("failed to add {} template: {e}", kind.name()))
            })?;
        }

        Ok(Self { env })
    }

    /// Render one prompt against a serializable context.
    pub fn render<S: Serialize>(&self, kind: PromptKind, ctx: S) -> Result<String, SimError> {
        self.env
            .get_template(kind.name())
            .map_err(|e| SimError::Template(format!("missing {} template: {e}", kind.name())))?
            .render(ctx)
            .map_err(|e| SimError::Template(format!("{} render failed: {e}", kind.name())))
    }
}
