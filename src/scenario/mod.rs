//! Named test scenarios and the runner that drives them.

pub mod report;
pub mod runner;

pub use report::Report;
pub use runner::ScenarioRunner;

use clap::ValueEnum;

/// The named scenarios the dispatcher can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Two requests to a cacheable resource; the second should be served
    /// from the proxy's cache.
    CacheHit,
    /// Two cacheable requests plus an origin request-count probe; the second
    /// cacheable request must never reach the origin.
    NoExtraRequests,
    /// Two requests to an uncacheable resource; both must reach the origin.
    NoInvalidCaching,
    /// Verifies the proxy's request-header rewriting, including
    /// `x-forwarded-for` extension.
    HeaderForwarding,
    /// Requests to a block-listed host must never get through.
    BlockList,
    /// N parallel long-poll requests must all stay in flight through the
    /// hold interval; early completion means the proxy serialized them.
    ConcurrencyBound,
    /// Unrelated requests must succeed while long-running requests pend.
    NoHeadOfLineBlocking,
    /// Many parallel static-file fetches; all must load.
    Load,
    /// A duplicate request to an in-flight resource must not spawn a second
    /// origin fetch.
    Simultaneous,
    /// Single static HTML fetch, hashed body.
    StaticHtml,
    /// Single static image fetch, hashed body.
    StaticImage,
    /// Single static plaintext fetch, hashed body.
    StaticText,
    /// Two mutually-forwarding proxies; one request must come back as a
    /// gateway timeout, proving the cycle was detected.
    ChainCycleDetection,
}

impl Scenario {
    /// Whether this scenario runs against a deliberately cyclic two-host
    /// chain instead of a forward chain.
    #[must_use]
    pub fn wants_cycle(self) -> bool {
        matches!(self, Self::ChainCycleDetection)
    }

    /// Kebab-case name as accepted on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CacheHit => "cache-hit",
            Self::NoExtraRequests => "no-extra-requests",
            Self::NoInvalidCaching => "no-invalid-caching",
            Self::HeaderForwarding => "header-forwarding",
            Self::BlockList => "block-list",
            Self::ConcurrencyBound => "concurrency-bound",
            Self::NoHeadOfLineBlocking => "no-head-of-line-blocking",
            Self::Load => "load",
            Self::Simultaneous => "simultaneous",
            Self::StaticHtml => "static-html",
            Self::StaticImage => "static-image",
            Self::StaticText => "static-text",
            Self::ChainCycleDetection => "chain-cycle-detection",
        }
    }
}
