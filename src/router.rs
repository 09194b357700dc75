//! Topic-based dispatch of inbound publications
//!
//! The reader loop hands every inbound PUBLISH to the session's router,
//! which resolves topic aliases and invokes the handlers whose patterns
//! match the publication topic.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::debug;

use crate::protocol::Publish;

/// Handler invoked for each matching inbound publication
pub type MessageHandler = Arc<dyn Fn(&Publish) + Send + Sync>;

/// Dispatches inbound publications to registered handlers.
///
/// `route` is called concurrently from the reader's dispatch tasks;
/// implementations guard their own state.
pub trait Router: Send + Sync {
    /// Register a handler under a topic pattern. Multiple handlers may
    /// share a pattern; they are invoked in registration order.
    fn register_handler(&self, pattern: &str, handler: MessageHandler);

    /// Remove every handler registered under the exact pattern string.
    fn unregister_handler(&self, pattern: &str);

    /// Resolve the publication topic and invoke all matching handlers.
    fn route(&self, publish: Publish);
}

/// Default router: one handler list per pattern, with a per-session topic
/// alias table.
#[derive(Default)]
pub struct StandardRouter {
    subscriptions: RwLock<AHashMap<String, Vec<MessageHandler>>>,
    aliases: Mutex<AHashMap<u16, String>>,
}

impl StandardRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Router for StandardRouter {
    fn register_handler(&self, pattern: &str, handler: MessageHandler) {
        self.subscriptions
            .write()
            .entry(pattern.to_string())
            .or_default()
            .push(handler);
    }

    fn unregister_handler(&self, pattern: &str) {
        self.subscriptions.write().remove(pattern);
    }

    fn route(&self, mut publish: Publish) {
        if let Some(topic) = resolve_alias(&self.aliases, &publish) {
            publish.topic = topic;
        }
        if publish.topic.is_empty() {
            debug!("dropping publish with unresolvable topic alias");
            return;
        }

        let subscriptions = self.subscriptions.read();
        for (pattern, handlers) in subscriptions.iter() {
            if matches(pattern, &publish.topic) {
                for handler in handlers {
                    handler(&publish);
                }
            }
        }
    }
}

/// Router that funnels every publication into a single handler while still
/// resolving topic aliases.
pub struct SingleHandlerRouter {
    aliases: Mutex<AHashMap<u16, String>>,
    handler: Mutex<MessageHandler>,
}

impl SingleHandlerRouter {
    pub fn new(handler: MessageHandler) -> Self {
        Self {
            aliases: Mutex::new(AHashMap::new()),
            handler: Mutex::new(handler),
        }
    }
}

impl Router for SingleHandlerRouter {
    fn register_handler(&self, _pattern: &str, handler: MessageHandler) {
        *self.handler.lock() = handler;
    }

    fn unregister_handler(&self, _pattern: &str) {}

    fn route(&self, mut publish: Publish) {
        if let Some(topic) = resolve_alias(&self.aliases, &publish) {
            publish.topic = topic;
        }
        let handler = self.handler.lock().clone();
        handler(&publish);
    }
}

/// Update and consult the alias table for one publication. Returns the
/// resolved topic when the packet carries an alias, `None` otherwise.
fn resolve_alias(aliases: &Mutex<AHashMap<u16, String>>, publish: &Publish) -> Option<String> {
    let alias = publish.properties.topic_alias?;
    let mut aliases = aliases.lock();
    if !publish.topic.is_empty() {
        aliases.insert(alias, publish.topic.clone());
    }
    // Unknown aliases resolve to the empty topic and the packet goes unrouted.
    Some(aliases.get(&alias).cloned().unwrap_or_default())
}

/// Whether a subscription pattern matches a concrete topic.
///
/// `+` consumes exactly one level, `#` consumes all remaining levels
/// (including none). A `$share/<group>/` head is stripped before matching.
pub fn matches(pattern: &str, topic: &str) -> bool {
    pattern == topic || match_levels(&pattern_levels(pattern), &topic_levels(topic))
}

fn match_levels(pattern: &[&str], topic: &[&str]) -> bool {
    if pattern.is_empty() {
        return topic.is_empty();
    }
    if topic.is_empty() {
        return pattern[0] == "#";
    }
    if pattern[0] == "#" {
        return true;
    }
    if pattern[0] == "+" || pattern[0] == topic[0] {
        return match_levels(&pattern[1..], &topic[1..]);
    }
    false
}

fn pattern_levels(pattern: &str) -> SmallVec<[&str; 8]> {
    if pattern.is_empty() {
        return SmallVec::new();
    }
    let levels: SmallVec<[&str; 8]> = pattern.split('/').collect();
    if pattern.starts_with("$share/") && levels.len() > 2 {
        // Drop the "$share/<group>" head; the remainder is the real filter.
        levels[2..].into()
    } else {
        levels
    }
}

fn topic_levels(topic: &str) -> SmallVec<[&str; 8]> {
    if topic.is_empty() {
        return SmallVec::new();
    }
    topic.split('/').collect()
}
