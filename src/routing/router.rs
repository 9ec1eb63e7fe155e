//! Route registry and lookup.
//!
//! # Responsibilities
//! - Store handlers keyed by (method, path template)
//! - Replace a route's handler on re-registration
//! - Resolve a concrete request to one handler and its bound parameters
//! - Reset every route together with the call ledger
//!
//! # Design Decisions
//! - The route table is an immutable snapshot behind `ArcSwap`
//! - Writers serialize on a mutex and publish a whole new table
//! - Lookups never block on the table; they see the old one or the new one
//! - Most specific template wins, then earliest registration
//! - A reset epoch fences recording: a request resolved before `reset_all`
//!   never lands in the cleared ledger

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use arc_swap::ArcSwap;
use axum::http::Method;

use crate::http::handler::Handler;
use crate::recording::{CallLedger, CallRecord};
use crate::routing::matcher::{PathParams, PathTemplate, TemplateError};

/// Identity of a registrable endpoint.
///
/// Templates compare verbatim: `/a/{id}` and `/a/:id` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    method: Method,
    template: String,
}

impl RouteKey {
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: template.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

struct Route {
    key: RouteKey,
    template: PathTemplate,
    handler: Arc<dyn Handler>,
    /// Registration order, kept across handler replacement.
    seq: u64,
}

#[derive(Clone, Default)]
struct RouteTable {
    by_method: HashMap<Method, Vec<Arc<Route>>>,
}

/// Result of a successful lookup.
pub struct ResolvedRoute {
    pub key: RouteKey,
    pub handler: Arc<dyn Handler>,
    pub params: PathParams,
    /// Reset epoch the route was resolved in.
    epoch: u64,
}

impl std::fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("key", &self.key)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Owns the live routing table and the call ledger it feeds.
pub struct RouteRegistry {
    table: ArcSwap<RouteTable>,
    /// Next registration sequence number; held while publishing a table.
    writer: Mutex<u64>,
    /// Bumped by `reset_all`. Recording holds the read side.
    epoch: RwLock<u64>,
    ledger: CallLedger,
}

impl RouteRegistry {
    pub fn new(ledger: CallLedger) -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            writer: Mutex::new(0),
            epoch: RwLock::new(0),
            ledger,
        }
    }

    pub fn ledger(&self) -> &CallLedger {
        &self.ledger
    }

    fn lock_writer(&self) -> MutexGuard<'_, u64> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `handler` for `(method, template)`, replacing any previous one.
    pub fn register(
        &self,
        method: Method,
        template: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), TemplateError> {
        let parsed = PathTemplate::parse(template)?;
        let duplicates = parsed.duplicate_params();
        if !duplicates.is_empty() {
            tracing::warn!(
                template = %template,
                params = ?duplicates,
                "Template declares a parameter more than once; last segment wins"
            );
        }

        let key = RouteKey::new(method.clone(), template);
        let mut next_seq = self.lock_writer();
        let mut table = RouteTable::clone(&self.table.load());
        let routes = table.by_method.entry(method).or_default();

        for other in routes.iter().filter(|r| r.key != key) {
            if other.template.overlaps(&parsed) {
                tracing::warn!(
                    route = %key,
                    other = %other.key,
                    "Ambiguous templates; the most specific one wins"
                );
            }
        }

        match routes.iter().position(|r| r.key == key) {
            Some(idx) => {
                let seq = routes[idx].seq;
                routes[idx] = Arc::new(Route {
                    key: key.clone(),
                    template: parsed,
                    handler,
                    seq,
                });
                tracing::debug!(route = %key, "Handler replaced");
            }
            None => {
                let seq = *next_seq;
                *next_seq += 1;
                routes.push(Arc::new(Route {
                    key: key.clone(),
                    template: parsed,
                    handler,
                    seq,
                }));
                tracing::debug!(route = %key, "Handler registered");
            }
        }

        self.table.store(Arc::new(table));
        Ok(())
    }

    /// Remove one route. Its call history stays in the ledger.
    ///
    /// Returns false when the route was not registered.
    pub fn unregister(&self, method: &Method, template: &str) -> bool {
        let _guard = self.lock_writer();
        let mut table = RouteTable::clone(&self.table.load());
        let Some(routes) = table.by_method.get_mut(method) else {
            return false;
        };
        let before = routes.len();
        routes.retain(|r| r.key.template() != template);
        if routes.len() == before {
            return false;
        }
        if routes.is_empty() {
            table.by_method.remove(method);
        }
        self.table.store(Arc::new(table));
        tracing::debug!(method = %method, template = %template, "Handler unregistered");
        true
    }

    /// Find the handler for a concrete request path.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<ResolvedRoute> {
        // Read the epoch and the table together so they agree.
        let (epoch, table) = {
            let epoch = self.epoch.read().unwrap_or_else(PoisonError::into_inner);
            (*epoch, self.table.load())
        };
        let routes = table.by_method.get(method)?;

        let mut best: Option<(&Arc<Route>, PathParams)> = None;
        for route in routes {
            let Some(params) = route.template.matches(path) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((current, _)) => {
                    let candidate = route.template.specificity();
                    let incumbent = current.template.specificity();
                    candidate > incumbent || (candidate == incumbent && route.seq < current.seq)
                }
            };
            if better {
                best = Some((route, params));
            }
        }

        best.map(|(route, params)| ResolvedRoute {
            key: route.key.clone(),
            handler: Arc::clone(&route.handler),
            params,
            epoch,
        })
    }

    /// Count and store a call for `route`.
    ///
    /// Returns false, recording nothing, when `reset_all` ran after the route
    /// was resolved.
    pub fn record(&self, route: &ResolvedRoute, record: CallRecord) -> bool {
        let epoch = self.epoch.read().unwrap_or_else(PoisonError::into_inner);
        if *epoch != route.epoch {
            return false;
        }
        self.ledger.record(&route.key, record);
        true
    }

    /// Drop every route and all call history.
    pub fn reset_all(&self) {
        let _guard = self.lock_writer();
        let mut epoch = self.epoch.write().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        self.table.store(Arc::new(RouteTable::default()));
        self.ledger.clear();
        tracing::debug!("Routes and call history cleared");
    }

    /// Registered keys in registration order.
    pub fn routes(&self) -> Vec<RouteKey> {
        let table = self.table.load();
        let mut routes: Vec<_> = table.by_method.values().flatten().collect();
        routes.sort_by_key(|r| r.seq);
        routes.into_iter().map(|r| r.key.clone()).collect()
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new(CallLedger::new())
    }
}
