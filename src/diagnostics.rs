//! Diagnostics
//!
//! Collects warnings and errors raised while a model is built from MDF.
//! Nothing here aborts a build: every item is logged as it is recorded and
//! the collection decides afterwards whether the build succeeded.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing build problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Model ===
    /// Neither the caller nor the MDF supplied a model handle
    MissingHandle,

    // === Terms ===
    /// Term spec has no `Value`
    MissingTermValue,
    /// Term spec has no `Origin`; the model handle was used
    MissingTermOrigin,

    // === Edges ===
    /// Ends entry names a node that is not in `Nodes`
    UndefinedEndpoint,
    /// Edge has no multiplicity at End or relationship level
    MissingMultiplicity,
    /// Edge multiplicity is not one of the four canonical values
    NonStandardMultiplicity,
    /// A second Ends entry with the same Src/Dst pair
    DuplicateEnds,

    // === Properties ===
    /// Entity declares a property with no matching definition
    MissingPropDefinition,
    /// Property definitions not claimed by any entity
    UnusedPropDefinitions,
    /// Type descriptor not recognized; default domain applied
    DefaultDomain,
    /// Enum reference could not be loaded or holds no values
    EnumReference,

    // === Nodes ===
    /// Composite key entry does not resolve to a node property
    UnresolvedCompositeKey,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingHandle => "E001",
            Self::MissingTermValue => "E002",
            Self::UndefinedEndpoint => "E003",
            Self::DuplicateEnds => "E004",
            Self::EnumReference => "E005",
            Self::UnresolvedCompositeKey => "E006",
            Self::MissingTermOrigin => "W001",
            Self::MissingMultiplicity => "W002",
            Self::NonStandardMultiplicity => "W003",
            Self::MissingPropDefinition => "W004",
            Self::UnusedPropDefinitions => "W005",
            Self::DefaultDomain => "W006",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingHandle
            | Self::MissingTermValue
            | Self::UndefinedEndpoint
            | Self::DuplicateEnds
            | Self::EnumReference
            | Self::UnresolvedCompositeKey => Severity::Error,

            Self::MissingTermOrigin
            | Self::MissingMultiplicity
            | Self::NonStandardMultiplicity
            | Self::MissingPropDefinition
            | Self::UnusedPropDefinitions
            | Self::DefaultDomain => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Entity (or MDF section) the problem was found in
    pub subject: String,
    /// Diagnostic code
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (e.g., offending keys)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.subject
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one model build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an item and log it at its severity
    pub fn push(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Error => tracing::error!(code = %item.code, subject = %item.subject, "{}", item.message),
            Severity::Warning => tracing::warn!(code = %item.code, subject = %item.subject, "{}", item.message),
        }
        self.items.push(item);
    }

    /// Record a problem under `code`; severity comes from the code
    pub fn report(
        &mut self,
        subject: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) {
        self.push(DiagnosticItem::new(subject, code, message));
    }

    /// Record the property definitions nobody claimed, as one item
    pub fn unused_prop_definitions(&mut self, names: &[String]) {
        let mut item = DiagnosticItem::new(
            "PropDefinitions",
            DiagnosticCode::UnusedPropDefinitions,
            format!(
                "No properties in model correspond to {} property definition(s)",
                names.len()
            ),
        );
        for name in names {
            item = item.with_context(name.clone());
        }
        self.push(item);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    /// True when no error-severity item was recorded
    pub fn is_success(&self) -> bool {
        !self.has_errors()
    }

    /// Get all errors
    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    /// Get all warnings
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Items carrying a given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    /// Get all items
    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
