//! JSON scenario scripts.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use audiofocus_ipc::EngineCommand;

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    List(Vec<EngineCommand>),
    Named { commands: Vec<EngineCommand> },
}

/// An ordered list of engine commands.
#[derive(Debug)]
pub struct Script {
    commands: Vec<EngineCommand>,
}

impl Script {
    /// Parse a script given either as a bare array or as `{"commands": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ScriptFile = serde_json::from_str(json).context("invalid script")?;
        let commands = match file {
            ScriptFile::List(commands) | ScriptFile::Named { commands } => commands,
        };
        Ok(Self { commands })
    }

    /// Read and parse a script file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Commands in order, always ending with a shutdown.
    pub fn into_commands(mut self) -> Vec<EngineCommand> {
        if let Some(at) = self
            .commands
            .iter()
            .position(|c| matches!(c, EngineCommand::Shutdown))
        {
            self.commands.truncate(at);
        }
        self.commands.push(EngineCommand::Shutdown);
        self.commands
    }
}
