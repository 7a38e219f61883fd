//! The call-site cache.
//!
//! Each call site owns an immutable [`ChainState`]: its tier and the rules
//! it has learned. Readers load the current chain without locking and test
//! guards most-recently-added first. Writers build a complete new chain and
//! publish it with a compare-and-swap; a writer that loses the race reloads
//! the chain and first checks whether the winner already covers its shapes.
//!
//! Tier transitions on a miss:
//!
//! | tier            | miss                                              |
//! |-----------------|---------------------------------------------------|
//! | Uninitialized   | Monomorphic with the new rule                     |
//! | Monomorphic     | Polymorphic, chain of two                         |
//! | Polymorphic < K | append                                            |
//! | Polymorphic = K | evict least-recently-hit, or Megamorphic once the |
//! |                 | full-chain miss streak reaches the threshold      |
//! | Megamorphic     | nothing; every call is resolved afresh            |

mod registry;
mod stats;

pub use registry::CallSiteRegistry;
pub use stats::{SiteStats, StatsSnapshot};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::InternalError;
use crate::operation::OperationDescriptor;
use crate::rule::Rule;
use crate::shape::Shape;

/// Identifies a call site within a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSiteId(u64);

impl CallSiteId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Cache state of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Never bound.
    Uninitialized,
    /// One rule.
    Monomorphic,
    /// Two or more rules, up to the chain bound.
    Polymorphic,
    /// Too volatile to cache. Terminal.
    Megamorphic,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Uninitialized => "uninitialized",
            Tier::Monomorphic => "monomorphic",
            Tier::Polymorphic => "polymorphic",
            Tier::Megamorphic => "megamorphic",
        };
        f.write_str(name)
    }
}

/// A rule in a site's chain, with its last-hit stamp.
#[derive(Debug)]
pub struct CachedRule {
    pub rule: Rule,
    last_hit: AtomicU64,
}

impl CachedRule {
    fn new(rule: Rule, stamp: u64) -> Self {
        Self {
            rule,
            last_hit: AtomicU64::new(stamp),
        }
    }

    pub fn last_hit(&self) -> u64 {
        self.last_hit.load(Ordering::Relaxed)
    }
}

/// An immutable snapshot of a site's cache.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub tier: Tier,
    /// Oldest first; lookups walk it in reverse.
    pub rules: Vec<Arc<CachedRule>>,
    /// Consecutive misses while the chain was full.
    pub full_misses: u32,
}

impl ChainState {
    fn uninitialized() -> Self {
        Self {
            tier: Tier::Uninitialized,
            rules: Vec::new(),
            full_misses: 0,
        }
    }

    fn find(&self, receiver: &Shape, args: &[Shape]) -> Option<&Arc<CachedRule>> {
        self.rules.iter().rev().find(|cached| cached.rule.guard.check(receiver, args))
    }
}

/// What happened to a rule offered to [`CallSite::install`].
#[derive(Debug, Clone)]
pub enum Installed {
    /// The rule joined the chain.
    Added(Arc<CachedRule>),
    /// A concurrent writer already installed a rule admitting these shapes.
    Covered(Arc<CachedRule>),
    /// The site is megamorphic and caches nothing.
    Skipped,
}

/// A call site: a static operation plus its learned rules.
pub struct CallSite {
    id: CallSiteId,
    descriptor: OperationDescriptor,
    state: ArcSwap<ChainState>,
    clock: AtomicU64,
    stats: SiteStats,
    max_chain_length: usize,
    megamorphic_threshold: u32,
    faulted: AtomicBool,
    fault: Mutex<Option<InternalError>>,
}

impl CallSite {
    pub fn new(id: CallSiteId, descriptor: OperationDescriptor, cache: &CacheConfig) -> Self {
        Self {
            id,
            descriptor,
            state: ArcSwap::from_pointee(ChainState::uninitialized()),
            clock: AtomicU64::new(0),
            stats: SiteStats::default(),
            max_chain_length: cache.max_chain_length.max(1),
            megamorphic_threshold: cache.megamorphic_threshold.max(1),
            faulted: AtomicBool::new(false),
            fault: Mutex::new(None),
        }
    }

    pub fn id(&self) -> CallSiteId {
        self.id
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    pub fn stats(&self) -> &SiteStats {
        &self.stats
    }

    pub fn tier(&self) -> Tier {
        self.state.load().tier
    }

    /// The current chain.
    pub fn chain(&self) -> Arc<ChainState> {
        self.state.load_full()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Find the newest cached rule whose guard admits the shapes.
    pub fn lookup(&self, receiver: &Shape, args: &[Shape]) -> Option<Arc<CachedRule>> {
        let state = self.state.load();
        let hit = state.find(receiver, args)?.clone();
        hit.last_hit.store(self.tick(), Ordering::Relaxed);

        if state.full_misses != 0 {
            // Best effort: a lost race means another writer published a
            // chain, which carries its own streak.
            let reset = ChainState {
                full_misses: 0,
                ..ChainState::clone(&state)
            };
            self.state.compare_and_swap(&*state, Arc::new(reset));
        }
        Some(hit)
    }

    /// Offer a freshly compiled rule for the shapes that missed.
    pub fn install(&self, rule: Rule, receiver: &Shape, args: &[Shape]) -> Installed {
        let cached = Arc::new(CachedRule::new(rule, self.tick()));

        loop {
            let current = self.state.load_full();
            if current.tier == Tier::Megamorphic {
                return Installed::Skipped;
            }
            if let Some(existing) = current.find(receiver, args) {
                return Installed::Covered(existing.clone());
            }

            let (next, evicted) = self.next_state(&current, &cached);
            let tier = next.tier;
            let prev = self.state.compare_and_swap(&current, Arc::new(next));
            if !Arc::ptr_eq(&*prev, &current) {
                debug!(site = %self.id, "chain changed during install, retrying");
                continue;
            }

            if evicted {
                self.stats.record_eviction();
            }
            if tier != current.tier {
                info!(site = %self.id, from = %current.tier, to = %tier, "call site tier transition");
            }
            return if tier == Tier::Megamorphic {
                Installed::Skipped
            } else {
                Installed::Added(cached)
            };
        }
    }

    fn next_state(&self, current: &ChainState, cached: &Arc<CachedRule>) -> (ChainState, bool) {
        if current.rules.len() < self.max_chain_length {
            let mut rules = current.rules.clone();
            rules.push(cached.clone());
            let tier = if rules.len() == 1 {
                Tier::Monomorphic
            } else {
                Tier::Polymorphic
            };
            return (
                ChainState {
                    tier,
                    rules,
                    full_misses: 0,
                },
                false,
            );
        }

        let streak = current.full_misses + 1;
        if streak >= self.megamorphic_threshold {
            return (
                ChainState {
                    tier: Tier::Megamorphic,
                    rules: Vec::new(),
                    full_misses: streak,
                },
                false,
            );
        }

        let mut rules = current.rules.clone();
        if let Some(victim) = rules
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| r.last_hit())
            .map(|(i, _)| i)
        {
            rules.remove(victim);
        }
        rules.push(cached.clone());
        (
            ChainState {
                tier: current.tier,
                rules,
                full_misses: streak,
            },
            true,
        )
    }

    /// Record an internal fault. The site refuses further dispatch.
    pub fn record_fault(&self, error: InternalError) {
        warn!(site = %self.id, %error, "call site faulted");
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(error);
        }
        self.faulted.store(true, Ordering::Release);
    }

    /// The fault that disabled this site, if any.
    pub fn fault(&self) -> Option<InternalError> {
        if !self.faulted.load(Ordering::Acquire) {
            return None;
        }
        self.fault.lock().clone()
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        f.debug_struct("CallSite")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor.to_string())
            .field("tier", &state.tier)
            .field("rules", &state.rules.len())
            .finish()
    }
}
