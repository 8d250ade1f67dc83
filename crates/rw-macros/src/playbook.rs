//! Playbook integration.
//!
//! [`MacrosExtension`] is handed the parsed playbook once per build and
//! expands macros in a fixed sequence of top-level sections. The
//! `asciidoc.attributes` mapping goes first so that later sections looking up
//! attributes see already-expanded values.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::resolver::{MacroResolver, MacroValue};
use crate::substitute::substitute;

/// Top-level playbook sections expanded after the attributes, in order.
pub const SECTION_ORDER: &[&str] = &[
    "asciidoc", "site", "urls", "content", "output", "ui", "antora",
];

/// Expands macros in a documentation playbook.
#[derive(Debug)]
pub struct MacrosExtension {
    resolver: MacroResolver,
}

impl MacrosExtension {
    /// Create an extension with a static macro table.
    pub fn new<I, K, V>(macros: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MacroValue>,
    {
        Self::with_resolver(MacroResolver::new(macros))
    }

    /// Create an extension around a preconfigured resolver.
    #[must_use]
    pub fn with_resolver(resolver: MacroResolver) -> Self {
        Self { resolver }
    }

    /// Resolver used for expansion.
    #[must_use]
    pub fn resolver(&self) -> &MacroResolver {
        &self.resolver
    }

    /// Consume the extension, returning its resolver.
    #[must_use]
    pub fn into_resolver(self) -> MacroResolver {
        self.resolver
    }

    /// Expand macros in `playbook` in place.
    ///
    /// Sections that are absent are skipped; keys outside [`SECTION_ORDER`]
    /// are left untouched.
    pub fn on_playbook_read(&mut self, playbook: &mut Value) {
        self.expand_attributes(playbook);
        let mut attributes = current_attributes(playbook);

        for &section in SECTION_ORDER {
            if let Some(node) = playbook.get_mut(section) {
                debug!(section, "Expanding playbook section");
                substitute(&mut self.resolver, node, attributes.as_ref());
                // The asciidoc pass walks the attributes again, so later
                // sections must read them back from the tree.
                if section == "asciidoc" {
                    attributes = current_attributes(playbook);
                }
            }
        }
    }

    /// Expand `asciidoc.attributes` one entry at a time.
    ///
    /// Each entry is resolved against the mapping as it stands when the entry
    /// is reached, so earlier entries are already expanded and later ones are
    /// still raw.
    fn expand_attributes(&mut self, playbook: &mut Value) {
        let Some(attributes) = playbook
            .get_mut("asciidoc")
            .and_then(|asciidoc| asciidoc.get_mut("attributes"))
            .and_then(Value::as_mapping_mut)
        else {
            return;
        };
        debug!(count = attributes.len(), "Expanding asciidoc attributes");

        let keys: Vec<Value> = attributes.keys().cloned().collect();
        for key in keys {
            let Some(mut value) = attributes.get(&key).cloned() else {
                continue;
            };
            substitute(&mut self.resolver, &mut value, Some(&*attributes));
            if let Some(slot) = attributes.get_mut(&key) {
                *slot = value;
            }
        }
    }
}

/// Copy of the `asciidoc.attributes` mapping as it currently stands.
fn current_attributes(playbook: &Value) -> Option<Mapping> {
    playbook
        .get("asciidoc")?
        .get("attributes")?
        .as_mapping()
        .cloned()
}
