// ABOUTME: Executor configuration and execution resource settings
// ABOUTME: Controls skip-on-existing, clobber, known-error termination, and resource pass-through

/// Resources available to a quantum's I/O context. Opaque to the executor
/// beyond pass-through; enforcement is the embedding scheduler's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResources {
    pub num_cores: usize,
    pub max_mem_bytes: Option<u64>,
}

impl Default for ExecutionResources {
    fn default() -> Self {
        Self {
            num_cores: 1,
            max_mem_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Collection name patterns searched for existing outputs. Skipping is
    /// enabled when the full store's run collection is among them.
    pub skip_existing_in: Vec<String>,

    /// Skip quanta whose metadata datasets are already stored. Works with
    /// restricted stores as well as full stores.
    pub skip_existing: bool,

    /// Remove pre-existing outputs before re-executing a quantum.
    pub clobber_outputs: bool,

    /// Terminate the process with the designated exit code on known failure
    /// kinds instead of propagating. Invalid-quantum failures always
    /// terminate regardless of this flag.
    pub exit_on_known_error: bool,

    pub resources: ExecutionResources,
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_existing_in(mut self, patterns: Vec<String>) -> Self {
        self.skip_existing_in = patterns;
        self
    }

    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn with_clobber_outputs(mut self, clobber: bool) -> Self {
        self.clobber_outputs = clobber;
        self
    }

    pub fn with_exit_on_known_error(mut self, exit: bool) -> Self {
        self.exit_on_known_error = exit;
        self
    }

    pub fn with_resources(mut self, resources: ExecutionResources) -> Self {
        self.resources = resources;
        self
    }
}
