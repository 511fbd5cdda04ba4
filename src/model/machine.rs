//! The compiled state table

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::block::TransitionBlock;
use super::{ModelError, FINISH_STATE};

/// A compiled state table: ordered transition blocks plus the start state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateMachine {
    blocks: Vec<TransitionBlock>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    /// Top-level `name = value` assignments. Reserved syntax, not interpreted.
    variables: BTreeMap<String, String>,
    /// SHA-256 of the source text, empty when built programmatically
    source_hash: String,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile DSL text into a machine
    pub fn compile(source: &str) -> Result<Self, crate::parser::ParseError> {
        crate::parser::parse_state_table(source)
    }

    /// Add a block; the first block added defines the start state.
    pub fn add_transition_block(&mut self, block: TransitionBlock) -> Result<(), ModelError> {
        if self.index.len() != self.blocks.len() {
            self.reindex();
        }
        if let Some(&idx) = self.index.get(block.state()) {
            return Err(ModelError::DuplicateBlock {
                state: block.state().to_string(),
                first_line: self.blocks[idx].line(),
            });
        }
        self.index.insert(block.state().to_string(), self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    pub fn transition_block(&self, state: &str) -> Result<&TransitionBlock, ModelError> {
        self.lookup(state).ok_or_else(|| ModelError::MissingBlock {
            state: state.to_string(),
        })
    }

    pub fn has_block(&self, state: &str) -> bool {
        self.lookup(state).is_some()
    }

    /// True for `finish` and any state with its own block
    pub fn is_known_state(&self, state: &str) -> bool {
        state == FINISH_STATE || self.has_block(state)
    }

    pub fn blocks(&self) -> &[TransitionBlock] {
        &self.blocks
    }

    /// State names in declaration order
    pub fn all_states(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.state()).collect()
    }

    /// Distinct transition selector method names in declaration order
    pub fn all_transition_methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = Vec::new();
        for block in &self.blocks {
            if !methods.contains(&block.method()) {
                methods.push(block.method());
            }
        }
        methods
    }

    pub fn start_state(&self) -> Result<&str, ModelError> {
        self.blocks
            .first()
            .map(|b| b.state())
            .ok_or(ModelError::NoStartState)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    pub(crate) fn set_source(&mut self, source: &str) {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        self.source_hash = format!("{:x}", hasher.finalize());
    }

    /// Rebuild the name index, required after deserialization
    pub fn reindex(&mut self) {
        self.index = self
            .blocks
            .iter()
            .enumerate()
            .map(|(idx, b)| (b.state().to_string(), idx))
            .collect();
    }

    fn lookup(&self, state: &str) -> Option<&TransitionBlock> {
        match self.index.get(state) {
            Some(&idx) => self.blocks.get(idx),
            // Deserialized machines may not be indexed yet
            None if self.index.len() != self.blocks.len() => {
                self.blocks.iter().find(|b| b.state() == state)
            }
            None => None,
        }
    }
}
