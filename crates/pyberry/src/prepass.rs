//! Literal rewriting applied to raw source text before parsing.
//!
//! Replacement is plain substring substitution, applied in table order.
//! It does not look at token boundaries, so a name such as `floaty`
//! becomes `realy`; scripts fed to the translator are written with that
//! in mind.

/// Builtin substitutions, in application order.
pub const BUILTIN_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("json.loads", "json.load"),
    ("float", "real"),
    ("None", "nil"),
    ("True", "true"),
    ("False", "false"),
];

/// Ordered list of `(from, to)` substitutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepass {
    substitutions: Vec<(String, String)>,
}

impl Default for Prepass {
    fn default() -> Self {
        Self {
            substitutions: BUILTIN_SUBSTITUTIONS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

impl Prepass {
    /// Append substitutions that run after the builtin ones.
    pub fn extend<I>(&mut self, extra: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.substitutions
            .extend(extra.into_iter().filter(|(from, _)| !from.is_empty()));
    }

    pub fn substitutions(&self) -> &[(String, String)] {
        &self.substitutions
    }

    pub fn apply(&self, source: &str) -> String {
        let mut text = source.to_string();
        for (from, to) in &self.substitutions {
            if text.contains(from.as_str()) {
                text = text.replace(from.as_str(), to);
            }
        }
        text
    }
}

/// Apply the builtin substitutions.
pub fn rewrite(source: &str) -> String {
    Prepass::default().apply(source)
}
