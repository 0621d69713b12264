//! Declarative container specifications.

/// Everything the engine needs to materialize one container.
///
/// A specification is immutable once handed to the harness: the harness
/// clones it to apply defaults (image fallback, coverage wiring) and never
/// mutates the caller's value. Environment entries are order-preserving
/// `KEY=value` strings; duplicates are allowed and last-wins resolution is
/// the engine's business, not ours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image reference; empty means "use the harness default image".
    pub image: String,
    /// Environment entries in `KEY=value` form, in submission order.
    pub env: Vec<String>,
    /// Optional container hostname.
    pub hostname: Option<String>,
    /// Optional entrypoint override (argv), used for one-shot runs and
    /// failure injection.
    pub entrypoint: Option<Vec<String>>,
    /// Linux capabilities to add (e.g. `SYS_ADMIN`).
    pub cap_add: Vec<String>,
    /// Bind mounts in `host-path:container-path` form.
    pub binds: Vec<String>,
    /// Exposed ports in `port/proto` form (e.g. `1414/tcp`).
    pub exposed_ports: Vec<String>,
}

impl ContainerSpec {
    /// Creates a specification for the given image.
    ///
    /// An empty image reference is valid and defers to the harness default.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Appends one `KEY=value` environment entry.
    #[must_use]
    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }

    /// Sets the container hostname.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Overrides the image entrypoint.
    #[must_use]
    pub fn with_entrypoint(mut self, argv: &[&str]) -> Self {
        self.entrypoint = Some(argv.iter().map(ToString::to_string).collect());
        self
    }

    /// Adds a Linux capability.
    #[must_use]
    pub fn with_cap(mut self, cap: impl Into<String>) -> Self {
        self.cap_add.push(cap.into());
        self
    }

    /// Appends a `host-path:container-path` bind mount.
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.binds.push(bind.into());
        self
    }

    /// Exposes a `port/proto` port.
    #[must_use]
    pub fn with_exposed_port(mut self, port: impl Into<String>) -> Self {
        self.exposed_ports.push(port.into());
        self
    }
}
