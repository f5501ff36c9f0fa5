//! Log messages built from `{}` templates
//!
//! A [`ReusableMessage`] carries one log call's template, its rendered
//! arguments and the final text. All three live in buffers that keep their
//! capacity across uses, so a recycled message formats without allocating
//! once it has warmed up.

mod flow;

pub use flow::FlowMessageFactory;

use crate::recycler::{
    DummyRecyclerFactory, Loan, RecyclerFactory, RecyclerMetrics, TypedRecycler,
};
use serde::Serialize;
use std::fmt::{self, Write};
use std::ops::Range;
use std::sync::Arc;

/// Initial capacity of the text buffers of a new message
pub const MESSAGE_CAPACITY: usize = 256;

/// Buffers grown past this are shrunk back on reset
pub const MAX_RETAINED_CAPACITY: usize = 4 * 1024;

/// How a context produces message handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFactoryKind {
    /// Handles come from the context's recycler and must be copied before
    /// they leave the call
    Reusable,
    /// Every call gets a fresh handle that callers may keep
    Parameterized,
}

impl MessageFactoryKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            MessageFactoryKind::Reusable => "reusable",
            MessageFactoryKind::Parameterized => "parameterized",
        }
    }

    pub fn is_reusable(&self) -> bool {
        matches!(self, MessageFactoryKind::Reusable)
    }
}

impl fmt::Display for MessageFactoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Hands out message handles according to a [`MessageFactoryKind`]
///
/// Reusable handles come from the context's recycler factory. Parameterized
/// handles are built fresh for every call and dropped afterwards.
pub struct MessageSource {
    kind: MessageFactoryKind,
    recycler: TypedRecycler<ReusableMessage>,
}

impl MessageSource {
    pub fn new(kind: MessageFactoryKind, factory: &Arc<dyn RecyclerFactory>) -> Self {
        let recycler = match kind {
            MessageFactoryKind::Reusable => {
                factory.create(ReusableMessage::new, ReusableMessage::reset)
            }
            MessageFactoryKind::Parameterized => {
                let fresh: Arc<dyn RecyclerFactory> = Arc::new(DummyRecyclerFactory);
                fresh.create(ReusableMessage::new, ReusableMessage::reset)
            }
        };
        Self { kind, recycler }
    }

    pub fn kind(&self) -> MessageFactoryKind {
        self.kind
    }

    /// Name of the factory backing the handles
    pub fn factory_name(&self) -> &str {
        self.recycler.factory_name()
    }

    #[inline]
    pub fn lease(&self) -> Loan<'_, ReusableMessage> {
        self.recycler.lease()
    }

    pub fn metrics(&self) -> &RecyclerMetrics {
        self.recycler.metrics()
    }
}

impl fmt::Debug for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSource")
            .field("kind", &self.kind)
            .field("factory", &self.factory_name())
            .finish()
    }
}

/// Mutable message handle
///
/// # Example
///
/// ```
/// use recycling_logger::message::ReusableMessage;
///
/// let mut message = ReusableMessage::new();
/// message.set("user {} logged in from {}", &[&"alice", &"10.0.0.1"]);
/// assert_eq!(message.formatted(), "user alice logged in from 10.0.0.1");
///
/// message.reset();
/// assert!(message.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ReusableMessage {
    template: String,
    args: String,
    arg_ranges: Vec<Range<usize>>,
    formatted: String,
}

impl ReusableMessage {
    pub fn new() -> Self {
        Self {
            template: String::with_capacity(MESSAGE_CAPACITY),
            args: String::with_capacity(MESSAGE_CAPACITY),
            arg_ranges: Vec::with_capacity(8),
            formatted: String::with_capacity(MESSAGE_CAPACITY),
        }
    }

    /// Replace the content with `template` rendered against `args`
    pub fn set(&mut self, template: &str, args: &[&dyn fmt::Display]) {
        self.clear();
        self.template.push_str(template);
        for arg in args {
            let start = self.args.len();
            // Writing into a String cannot fail.
            let _ = write!(self.args, "{}", arg);
            self.arg_ranges.push(start..self.args.len());
        }

        let args = &self.args;
        let ranges = &self.arg_ranges;
        render_template(&mut self.formatted, &self.template, |index| {
            ranges.get(index).and_then(|range| args.get(range.clone()))
        });
    }

    /// Replace the content with text produced by `render`, tagged with `template`
    pub fn set_with(&mut self, template: &str, render: impl FnOnce(&mut String)) {
        self.clear();
        self.template.push_str(template);
        render(&mut self.formatted);
    }

    /// The template as given by the caller
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn arg_count(&self) -> usize {
        self.arg_ranges.len()
    }

    /// Rendered text of argument `index`
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.arg_ranges
            .get(index)
            .and_then(|range| self.args.get(range.clone()))
    }

    /// The final message text
    pub fn formatted(&self) -> &str {
        &self.formatted
    }

    /// Move the final text out, leaving an empty buffer behind
    pub fn take_formatted(&mut self) -> String {
        std::mem::take(&mut self.formatted)
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty() && self.formatted.is_empty() && self.arg_ranges.is_empty()
    }

    /// Return to the freshly-constructed state
    ///
    /// Buffers keep their capacity unless they grew past
    /// [`MAX_RETAINED_CAPACITY`].
    pub fn reset(&mut self) {
        self.clear();
        shrink(&mut self.template);
        shrink(&mut self.args);
        shrink(&mut self.formatted);
        if self.arg_ranges.capacity() > MAX_RETAINED_CAPACITY / 16 {
            self.arg_ranges.shrink_to(8);
        }
        if self.formatted.capacity() == 0 {
            self.formatted.reserve(MESSAGE_CAPACITY);
        }
    }

    fn clear(&mut self) {
        self.template.clear();
        self.args.clear();
        self.arg_ranges.clear();
        self.formatted.clear();
    }
}

impl Default for ReusableMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReusableMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted)
    }
}

fn shrink(buffer: &mut String) {
    if buffer.capacity() > MAX_RETAINED_CAPACITY {
        buffer.shrink_to(MESSAGE_CAPACITY);
    }
}

/// Substitute `{}` placeholders in order
///
/// Placeholders without a matching argument stay literal, surplus arguments
/// are ignored, and `\{}` renders a literal `{}`.
pub fn render_template<'a>(
    out: &mut String,
    template: &str,
    arg: impl Fn(usize) -> Option<&'a str>,
) {
    let bytes = template.as_bytes();
    let mut next_arg = 0;
    let mut copied = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'\\', b'{') if bytes.get(i + 2) == Some(&b'}') => {
                out.push_str(&template[copied..i]);
                out.push_str("{}");
                i += 3;
                copied = i;
            }
            (b'{', b'}') => match arg(next_arg) {
                Some(value) => {
                    out.push_str(&template[copied..i]);
                    out.push_str(value);
                    next_arg += 1;
                    i += 2;
                    copied = i;
                }
                None => i += 2,
            },
            _ => i += 1,
        }
    }

    out.push_str(&template[copied..]);
}

/// Render `template` against `args` into a new string
pub fn format_template(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut message = ReusableMessage::new();
    message.set(template, args);
    message.take_formatted()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_in_order() {
        let mut message = ReusableMessage::new();
        message.set("{} + {} = {}", &[&1, &2, &3]);
        assert_eq!(message.formatted(), "1 + 2 = 3");
        assert_eq!(message.arg_count(), 3);
        assert_eq!(message.arg(1), Some("2"));
        assert_eq!(message.arg(3), None);
        assert_eq!(message.template(), "{} + {} = {}");
    }

    #[test]
    fn test_missing_arguments_keep_placeholder() {
        assert_eq!(format_template("a={} b={}", &[&"x"]), "a=x b={}");
    }

    #[test]
    fn test_surplus_arguments_ignored() {
        assert_eq!(format_template("only {}", &[&1, &2]), "only 1");
    }

    #[test]
    fn test_escaped_placeholder() {
        assert_eq!(format_template(r"literal \{} then {}", &[&7]), "literal {} then 7");
    }

    #[test]
    fn test_non_ascii_template() {
        assert_eq!(format_template("héllo {} ✓", &[&"wörld"]), "héllo wörld ✓");
    }

    #[test]
    fn test_lone_braces_untouched() {
        assert_eq!(format_template("{ } {x} {", &[&1]), "{ } {x} {");
    }

    #[test]
    fn test_set_replaces_previous_content() {
        let mut message = ReusableMessage::new();
        message.set("first {}", &[&"call"]);
        message.set("second", &[]);
        assert_eq!(message.formatted(), "second");
        assert_eq!(message.arg_count(), 0);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut message = ReusableMessage::new();
        message.set("some {}", &[&"text"]);
        let capacity = message.formatted.capacity();

        message.reset();
        assert!(message.is_empty());
        assert_eq!(message.formatted.capacity(), capacity);
    }

    #[test]
    fn test_reset_shrinks_oversized_buffers() {
        let mut message = ReusableMessage::new();
        let big = "x".repeat(MAX_RETAINED_CAPACITY * 2);
        message.set("{}", &[&big]);
        assert!(message.formatted.capacity() > MAX_RETAINED_CAPACITY);

        message.reset();
        assert!(message.formatted.capacity() <= MAX_RETAINED_CAPACITY);
        assert!(message.args.capacity() <= MAX_RETAINED_CAPACITY);
    }

    #[test]
    fn test_take_formatted() {
        let mut message = ReusableMessage::new();
        message.set("moved {}", &[&"out"]);
        assert_eq!(message.take_formatted(), "moved out");
        assert_eq!(message.formatted(), "");
    }

    #[test]
    fn test_reusable_source_recycles_handles() {
        let factory: Arc<dyn RecyclerFactory> =
            Arc::new(crate::recycler::ThreadLocalRecyclerFactory);
        let source = MessageSource::new(MessageFactoryKind::Reusable, &factory);

        for i in 0..3 {
            let mut message = source.lease();
            assert!(message.is_empty());
            message.set("call {}", &[&i]);
        }

        assert_eq!(source.factory_name(), "threadlocal");
        assert_eq!(source.metrics().created(), 1);
        assert_eq!(source.metrics().reused(), 2);
    }

    #[test]
    fn test_parameterized_source_never_pools() {
        let factory: Arc<dyn RecyclerFactory> =
            Arc::new(crate::recycler::ThreadLocalRecyclerFactory);
        let source = MessageSource::new(MessageFactoryKind::Parameterized, &factory);

        for _ in 0..3 {
            source.lease().set("fresh", &[]);
        }

        assert_eq!(source.factory_name(), "dummy");
        assert_eq!(source.metrics().created(), 3);
        assert_eq!(source.metrics().retained(), 0);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MessageFactoryKind::Reusable.to_string(), "reusable");
        assert_eq!(MessageFactoryKind::Parameterized.to_string(), "parameterized");
        assert!(MessageFactoryKind::Reusable.is_reusable());
    }
}
