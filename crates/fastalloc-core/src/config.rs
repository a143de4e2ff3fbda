//! Collector-selection and tuning knobs consumed by the host runtime.
//!
//! Parsing a host configuration file or CLI flags into this struct is out of
//! scope for the core; a runtime wires its own config surface to these
//! fields.

/// Tunables the host passes to the allocator core at startup.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Selection string a runtime matches against its configured collector
    /// name before initializing this core.
    pub selector: &'static str,
    /// Capacity hint (in page-table entries) each pool's [`crate::paged_vec::PagedVec`]
    /// reserves on first growth. A hint of 0 defers to the container's own
    /// default growth.
    pub initial_page_table_capacity: usize,
    /// Whether medium size classes (4096..=65536 bytes) are constructed in
    /// the pool matrix. Disabled by default; see [`crate::size_class`].
    ///
    /// This flag only takes effect if the crate was also built with the
    /// `medium-classes` cargo feature: that feature gates whether the medium
    /// pools exist in the binary at all, while this flag gates whether a
    /// request is allowed to route into them at runtime. Setting this to
    /// `true` without the feature compiled in leaves every medium-sized
    /// request reporting out-of-memory, same as leaving it `false`.
    pub enable_medium_classes: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            selector: "fastalloc",
            initial_page_table_capacity: 0,
            enable_medium_classes: false,
        }
    }
}
