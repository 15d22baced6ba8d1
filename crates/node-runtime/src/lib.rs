use anyhow::Result;
use std::sync::Mutex;

/// Which half of the participant pairing this process runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeRole {
    Validator,
    Miner,
}

impl NodeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validator => "validator",
            Self::Miner => "miner",
        }
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).map(str::to_ascii_lowercase) {
            Some(role) if role == "validator" => Self::Validator,
            _ => Self::Miner,
        }
    }
}

impl Default for NodeRole {
    fn default() -> Self {
        Self::Miner
    }
}

pub type ShutdownHook = Box<dyn FnOnce() -> Result<()> + Send>;

#[derive(Default)]
pub struct NodeRuntimeBuilder {
    role: NodeRole,
    startup: Option<Box<dyn FnOnce() -> Result<Option<ShutdownHook>> + Send>>,
}

impl NodeRuntimeBuilder {
    pub fn from_env() -> Result<Self> {
        let role = NodeRole::parse(std::env::var("FAREPULSE_ROLE").ok().as_deref());
        Ok(Self {
            role,
            startup: None,
        })
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn with_startup<F>(mut self, startup: F) -> Self
    where
        F: FnOnce() -> Result<Option<ShutdownHook>> + Send + 'static,
    {
        self.startup = Some(Box::new(startup));
        self
    }

    pub fn build(self) -> Result<NodeRuntime> {
        let shutdown = match self.startup {
            Some(startup) => startup()?,
            None => None,
        };
        Ok(NodeRuntime::new(self.role, shutdown))
    }
}

pub struct NodeRuntime {
    role: NodeRole,
    shutdown: Mutex<Option<ShutdownHook>>,
}

impl NodeRuntime {
    pub fn new(role: NodeRole, shutdown: Option<ShutdownHook>) -> Self {
        Self {
            role,
            shutdown: Mutex::new(shutdown),
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub async fn shutdown(self) -> Result<()> {
        let hook = self.shutdown.into_inner().ok().flatten();
        if let Some(hook) = hook {
            hook()?;
        }
        Ok(())
    }
}
